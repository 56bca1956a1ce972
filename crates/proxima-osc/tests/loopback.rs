use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use proxima_engine::{EngineHandle, VisibilitySettings, VisibilityState};
use proxima_osc::codec::{decode, encode};
use proxima_osc::{
    ConnectionState, OscArg, OscConfig, OscMessage, OscTransport, TransportError, TransportEvent,
};

fn peer() -> UdpSocket {
    let sock = UdpSocket::bind("127.0.0.1:0").expect("bind peer");
    sock.set_read_timeout(Some(Duration::from_secs(2)))
        .expect("peer timeout");
    sock
}

fn config_for(peer: &UdpSocket) -> OscConfig {
    OscConfig {
        receive_port: 0,
        send_port: peer.local_addr().expect("peer addr").port(),
        ..OscConfig::default()
    }
}

/// Next message from `sock` that is not a periodic position request.
fn next_message(sock: &UdpSocket) -> OscMessage {
    let mut buf = [0u8; 2048];
    loop {
        let (n, _) = sock.recv_from(&mut buf).expect("datagram from transport");
        for msg in decode(&buf[..n]).expect("well-formed datagram") {
            if !msg.addr.ends_with("/position/request") {
                return msg;
            }
        }
    }
}

fn send(sock: &UdpSocket, to: SocketAddr, addr: &str, args: Vec<OscArg>) {
    sock.send_to(&encode(&OscMessage::new(addr, args)), to)
        .expect("send to transport");
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn join_and_position_reach_the_engine() {
    let peer = peer();
    let engine = EngineHandle::new(VisibilitySettings::default());
    let mut transport = OscTransport::new(config_for(&peer), engine.clone());
    let events = transport.subscribe();
    assert_eq!(transport.state(), ConnectionState::Disconnected);

    transport.connect().expect("connect");
    let status = transport.status();
    assert_eq!(status.state, ConnectionState::Connected);
    let listen = status.listen_addr.expect("listen addr");

    let ping = next_message(&peer);
    assert_eq!(ping.addr, "/ping");
    assert!(matches!(ping.args[..], [OscArg::Double(t)] if t > 0.0));
    assert_eq!(next_message(&peer).addr, "/instance/users/request");
    assert_eq!(next_message(&peer).addr, "/world/info/request");
    assert_eq!(
        next_message(&peer),
        OscMessage::new("/tracking/enable", vec![OscArg::Bool(true)])
    );

    send(&peer, listen, "/user/abc/join", vec![OscArg::Str("Alice".into())]);
    send(
        &peer,
        listen,
        "/user/abc/position",
        vec![OscArg::Float(1.0), OscArg::Float(0.0), OscArg::Float(2.0)],
    );
    send(
        &peer,
        listen,
        "/tracking/head/position",
        vec![OscArg::Float(0.0), OscArg::Float(0.0), OscArg::Float(0.0)],
    );
    assert!(wait_for(|| engine.participant("abc").is_some() && engine.observer().is_some()));

    engine.tick(Instant::now());
    let rec = engine.record("abc").expect("record after tick");
    assert_eq!(rec.state, VisibilityState::Visible);
    assert_eq!(engine.participant("abc").map(|p| p.name), Some("Alice".to_string()));
    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).expect("join event"),
        TransportEvent::Joined {
            id: "abc".into(),
            name: "Alice".into()
        }
    );

    transport
        .send_visibility("abc", true, 0.5)
        .expect("send visibility");
    assert_eq!(
        next_message(&peer),
        OscMessage::new("/user/abc/visible", vec![OscArg::Bool(true)])
    );
    assert_eq!(
        next_message(&peer),
        OscMessage::new("/user/abc/alpha", vec![OscArg::Float(0.5)])
    );
    transport
        .set_parameter("ProximityCount", OscArg::Int(1))
        .expect("set parameter");
    assert_eq!(
        next_message(&peer),
        OscMessage::new("/avatar/parameters/ProximityCount", vec![OscArg::Int(1)])
    );

    transport.disconnect();
    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert!(matches!(
        transport.send_visibility("abc", false, 0.0),
        Err(TransportError::NotConnected)
    ));
    // Port is free again once disconnect returns.
    UdpSocket::bind(listen).expect("rebind released port");
}

#[test]
fn position_requests_are_polled_for_known_users() {
    let peer = peer();
    let engine = EngineHandle::new(VisibilitySettings::default());
    let mut transport = OscTransport::new(config_for(&peer), engine);
    transport.connect().expect("connect");
    let listen = transport.status().listen_addr.expect("listen addr");

    send(&peer, listen, "/user/u1/join", vec![]);
    let mut buf = [0u8; 2048];
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut seen = false;
    while Instant::now() < deadline && !seen {
        let (n, _) = peer.recv_from(&mut buf).expect("datagram");
        seen = decode(&buf[..n])
            .expect("well-formed")
            .iter()
            .any(|m| m.addr == "/user/u1/position/request");
    }
    assert!(seen);
    assert_eq!(transport.known_users(), vec!["u1".to_string()]);
}

#[test]
fn malformed_datagrams_are_dropped_and_counted() {
    let peer = peer();
    let engine = EngineHandle::new(VisibilitySettings::default());
    let mut transport = OscTransport::new(config_for(&peer), engine.clone());
    transport.connect().expect("connect");
    let listen = transport.status().listen_addr.expect("listen addr");

    peer.send_to(b"\xff\xfe not osc", listen).expect("send junk");
    send(&peer, listen, "/user/abc/position", vec![OscArg::Str("x".into())]);
    send(&peer, listen, "/world/scale", vec![OscArg::Float(2.0)]);

    assert!(wait_for(|| engine.stats().world_scale == 2.0));
    let status = transport.status();
    assert_eq!(status.dropped, 2);
    assert!(engine.record("abc").is_none());
    assert!(transport.is_connected());
}

#[test]
fn bind_failure_leaves_transport_disconnected() {
    let peer = peer();
    let taken = UdpSocket::bind("127.0.0.1:0").expect("bind blocker");
    let config = OscConfig {
        receive_port: taken.local_addr().expect("addr").port(),
        ..config_for(&peer)
    };
    let mut transport = OscTransport::new(config, EngineHandle::new(VisibilitySettings::default()));
    assert!(matches!(transport.connect(), Err(TransportError::Bind { .. })));
    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert!(matches!(transport.sender(), Err(TransportError::NotConnected)));
}

#[test]
fn connect_twice_is_a_no_op() {
    let peer = peer();
    let mut transport = OscTransport::new(
        config_for(&peer),
        EngineHandle::new(VisibilitySettings::default()),
    );
    transport.connect().expect("connect");
    let first = transport.status().listen_addr;
    transport.connect().expect("second connect");
    assert_eq!(transport.status().listen_addr, first);
}
