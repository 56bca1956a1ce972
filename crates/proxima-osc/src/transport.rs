use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::Receiver;
use proxima_engine::EngineHandle;

use crate::codec::{OscArg, OscMessage, encode};
use crate::config::OscConfig;
use crate::dispatch::{Dispatcher, Shared, TransportEvent};
use crate::route::Router;

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_DATAGRAM: usize = 65_536;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug)]
pub enum TransportError {
    Bind { addr: String, source: io::Error },
    Resolve { addr: String, source: Option<io::Error> },
    Spawn(io::Error),
    NotConnected,
    Send { addr: String, source: io::Error },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Bind { addr, source } => write!(f, "bind {}: {}", addr, source),
            TransportError::Resolve { addr, source: Some(e) } => {
                write!(f, "resolve {}: {}", addr, e)
            }
            TransportError::Resolve { addr, source: None } => {
                write!(f, "resolve {}: no addresses", addr)
            }
            TransportError::Spawn(e) => write!(f, "spawn receive thread: {}", e),
            TransportError::NotConnected => write!(f, "transport is not connected"),
            TransportError::Send { addr, source } => write!(f, "send to {}: {}", addr, source),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Bind { source, .. } | TransportError::Send { source, .. } => {
                Some(source)
            }
            TransportError::Resolve { source: Some(e), .. } | TransportError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Snapshot of the link for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportStatus {
    pub state: ConnectionState,
    pub local_user_id: String,
    /// Address the receive socket is bound to while connected.
    pub listen_addr: Option<SocketAddr>,
    pub known_users: usize,
    pub received: u64,
    pub dropped: u64,
    pub sent: u64,
    pub send_failures: u64,
}

/// Fire-and-forget outbound half. Cheap to clone; every call fails with
/// [`TransportError::NotConnected`] once the transport has disconnected.
#[derive(Clone)]
pub struct OscSender {
    socket: Weak<UdpSocket>,
    target: SocketAddr,
    parameter_prefix: String,
    shared: Arc<Shared>,
}

impl OscSender {
    pub fn send(&self, msg: &OscMessage) -> Result<(), TransportError> {
        let socket = self.socket.upgrade().ok_or(TransportError::NotConnected)?;
        match socket.send_to(&encode(msg), self.target) {
            Ok(_) => {
                self.shared.sent.fetch_add(1, Ordering::Relaxed);
                log::trace!(target: "osc", "-> {} {:?}", msg.addr, msg.args);
                Ok(())
            }
            Err(source) => {
                self.shared.send_failures.fetch_add(1, Ordering::Relaxed);
                Err(TransportError::Send {
                    addr: self.target.to_string(),
                    source,
                })
            }
        }
    }

    /// `/user/<id>/visible`, followed by `/user/<id>/alpha` for a partial fade.
    pub fn send_visibility(&self, id: &str, visible: bool, alpha: f32) -> Result<(), TransportError> {
        self.send(&OscMessage::new(
            format!("/user/{}/visible", id),
            vec![OscArg::Bool(visible)],
        ))?;
        if visible && alpha < 1.0 {
            self.send(&OscMessage::new(
                format!("/user/{}/alpha", id),
                vec![OscArg::Float(alpha.clamp(0.0, 1.0))],
            ))?;
        }
        Ok(())
    }

    pub fn set_parameter(&self, name: &str, value: OscArg) -> Result<(), TransportError> {
        self.send(&OscMessage::new(
            format!("{}{}", self.parameter_prefix, name),
            vec![value],
        ))
    }
}

struct Link {
    send_socket: Arc<UdpSocket>,
    target: SocketAddr,
    listen_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

/// UDP link to the OSC peer: a receive thread feeding the engine and a sender for
/// visibility commands and parameters.
pub struct OscTransport {
    config: OscConfig,
    engine: EngineHandle,
    shared: Arc<Shared>,
    link: Option<Link>,
}

fn resolve(addr: &str) -> Result<SocketAddr, TransportError> {
    let mut addrs = addr.to_socket_addrs().map_err(|e| TransportError::Resolve {
        addr: addr.to_string(),
        source: Some(e),
    })?;
    addrs.next().ok_or_else(|| TransportError::Resolve {
        addr: addr.to_string(),
        source: None,
    })
}

fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl OscTransport {
    pub fn new(mut config: OscConfig, engine: EngineHandle) -> Self {
        if !config.parameter_prefix.ends_with('/') {
            config.parameter_prefix.push('/');
        }
        Self {
            config,
            engine,
            shared: Arc::new(Shared::default()),
            link: None,
        }
    }

    pub fn config(&self) -> &OscConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        if self.link.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Bind both sockets, start the receive thread and ping the peer. A no-op when
    /// already connected.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        if self.link.is_some() {
            return Ok(());
        }
        let target = resolve(&self.config.send_addr())?;
        let recv_addr = self.config.receive_addr();
        let recv_socket = UdpSocket::bind(&recv_addr).map_err(|source| TransportError::Bind {
            addr: recv_addr.clone(),
            source,
        })?;
        let bind_err = |source| TransportError::Bind {
            addr: recv_addr.clone(),
            source,
        };
        recv_socket
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(bind_err)?;
        let listen_addr = recv_socket.local_addr().map_err(bind_err)?;

        let any: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let send_socket = UdpSocket::bind(any).map_err(|source| TransportError::Bind {
            addr: any.to_string(),
            source,
        })?;
        let send_socket = Arc::new(send_socket);

        let stop = Arc::new(AtomicBool::new(false));
        let sender = OscSender {
            socket: Arc::downgrade(&send_socket),
            target,
            parameter_prefix: self.config.parameter_prefix.clone(),
            shared: self.shared.clone(),
        };
        let dispatcher = Dispatcher::new(
            self.engine.clone(),
            Router::new(self.config.parameter_prefix.as_str()),
            self.config.local_user_id.clone(),
            self.config.enable_avatar_parameters,
            self.shared.clone(),
        );
        let poll = self
            .config
            .enable_position_tracking
            .then(|| self.config.position_request_interval());
        let ctx = ReceiveLoop {
            socket: recv_socket,
            sender: sender.clone(),
            dispatcher,
            shared: self.shared.clone(),
            stop: stop.clone(),
            poll,
        };
        let join = thread::Builder::new()
            .name("proxima-osc-rx".to_string())
            .spawn(move || ctx.run())
            .map_err(TransportError::Spawn)?;

        self.link = Some(Link {
            send_socket,
            target,
            listen_addr,
            stop,
            join: Some(join),
        });
        log::info!(
            target: "osc",
            "connected: listening on {}, sending to {}",
            listen_addr,
            target
        );

        // Liveness ping and initial requests; nobody waits for answers.
        let greetings = [
            OscMessage::new("/ping", vec![OscArg::Double(unix_seconds())]),
            OscMessage::new("/instance/users/request", Vec::new()),
            OscMessage::new("/world/info/request", Vec::new()),
        ];
        for msg in &greetings {
            if let Err(e) = sender.send(msg) {
                log::warn!(target: "osc", "{}: {}", msg.addr, e);
            }
        }
        if self.config.enable_position_tracking {
            if let Err(e) = sender.send(&OscMessage::new("/tracking/enable", vec![OscArg::Bool(true)])) {
                log::warn!(target: "osc", "/tracking/enable: {}", e);
            }
        }
        Ok(())
    }

    /// Stop the receive thread and release both sockets. Returns once the thread has exited.
    pub fn disconnect(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        link.stop.store(true, Ordering::Release);
        if let Some(join) = link.join.take() {
            if join.join().is_err() {
                log::error!(target: "osc", "receive thread panicked");
            }
        }
        drop(link);
        log::info!(target: "osc", "disconnected");
    }

    /// Outbound handle bound to the current connection.
    pub fn sender(&self) -> Result<OscSender, TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::NotConnected)?;
        Ok(OscSender {
            socket: Arc::downgrade(&link.send_socket),
            target: link.target,
            parameter_prefix: self.config.parameter_prefix.clone(),
            shared: self.shared.clone(),
        })
    }

    pub fn send_visibility(&self, id: &str, visible: bool, alpha: f32) -> Result<(), TransportError> {
        self.sender()?.send_visibility(id, visible, alpha)
    }

    pub fn set_parameter(&self, name: &str, value: OscArg) -> Result<(), TransportError> {
        self.sender()?.set_parameter(name, value)
    }

    pub fn subscribe(&self) -> Receiver<TransportEvent> {
        self.shared.subscribe()
    }

    pub fn known_users(&self) -> Vec<String> {
        self.shared.known_users()
    }

    pub fn status(&self) -> TransportStatus {
        TransportStatus {
            state: self.state(),
            local_user_id: self.config.local_user_id.clone(),
            listen_addr: self.link.as_ref().map(|l| l.listen_addr),
            known_users: self.shared.known_user_count(),
            received: self.shared.received.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            sent: self.shared.sent.load(Ordering::Relaxed),
            send_failures: self.shared.send_failures.load(Ordering::Relaxed),
        }
    }
}

impl Drop for OscTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct ReceiveLoop {
    socket: UdpSocket,
    sender: OscSender,
    dispatcher: Dispatcher,
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    poll: Option<Duration>,
}

impl ReceiveLoop {
    fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut last_poll = Instant::now();
        while !self.stop.load(Ordering::Acquire) {
            match self.socket.recv_from(&mut buf) {
                Ok((n, _from)) => self.dispatcher.handle_datagram(&buf[..n], Instant::now()),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) => {}
                // ICMP port-unreachable from an earlier send surfaces here on some platforms.
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {}
                Err(e) => {
                    log::warn!(target: "osc", "receive failed: {}", e);
                    thread::sleep(READ_TIMEOUT);
                }
            }

            if let Some(every) = self.poll {
                if last_poll.elapsed() >= every {
                    last_poll = Instant::now();
                    for id in self.shared.known_users() {
                        let req = OscMessage::new(format!("/user/{}/position/request", id), Vec::new());
                        if let Err(e) = self.sender.send(&req) {
                            log::debug!(target: "osc", "position request for {}: {}", id, e);
                        }
                    }
                }
            }
        }
        log::debug!(target: "osc", "receive loop exiting");
    }
}
