mod bridge;
mod capabilities;
mod cli;
mod config;
mod logging;
mod watch;

use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{Receiver, after, never, select};
use proxima_engine::{EngineHandle, ProximityEngine, TickLoop};
use proxima_osc::{OscTransport, TransportEvent};

use crate::bridge::Bridge;
use crate::capabilities::Capabilities;
use crate::cli::Cli;
use crate::config::{AppConfig, load_config_from_path};
use crate::watch::ConfigWatcher;

const DEFAULT_CONFIG: &str = "proxima.toml";

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()));
    let mut cfg = match &config_path {
        Some(path) => load_config_from_path(path)
            .map_err(|e| format!("loading {}: {}", path.display(), e))?,
        None => AppConfig::default(),
    };
    cli.apply_overrides(&mut cfg)?;
    logging::init(&cfg.log_level, cli.log_file.as_deref())?;
    if let Some(path) = &config_path {
        log::info!("config loaded from {}", path.display());
    }

    let mut engine = ProximityEngine::new(cfg.visibility);
    engine.set_stale_after(cfg.stale_after());
    let engine = EngineHandle::from_engine(engine);
    let tick_loop = TickLoop::spawn(engine.clone())?;

    let mut transport = None;
    if cli.offline {
        log::info!("offline: OSC transport disabled");
    } else {
        let mut t = OscTransport::new(cfg.osc.clone(), engine.clone());
        match t.connect() {
            Ok(()) => transport = Some(t),
            Err(e) => log::warn!("OSC transport unavailable: {}", e),
        }
    }
    let caps = Capabilities::resolve(&cfg.osc, transport.is_some());
    log::info!(
        "capabilities: transport={} position_tracking={} avatar_parameters={}",
        caps.transport,
        caps.position_tracking,
        caps.avatar_parameters
    );

    let mut bridge = None;
    let mut transport_events = None;
    if let (true, Some(t)) = (caps.transport, transport.as_ref()) {
        bridge = Some(Bridge::spawn(&engine, t.sender()?, cfg.visibility.update_interval())?);
        transport_events = Some(t.subscribe());
    }

    let watcher = match (&config_path, cli.watch_config) {
        (Some(path), true) => match ConfigWatcher::new(path) {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("cannot watch {}: {}", path.display(), e);
                None
            }
        },
        (None, true) => {
            log::warn!("--watch-config needs a config file");
            None
        }
        _ => None,
    };

    let deadline = cli.run_for().and_then(|d| Instant::now().checked_add(d));
    let stats_every = cli.stats_every();

    run_until(
        &engine,
        transport.as_ref(),
        watcher.as_ref(),
        transport_events,
        stats_every,
        deadline,
    );

    if let Some(b) = bridge {
        b.stop();
    }
    if let Some(mut t) = transport {
        t.disconnect();
    }
    tick_loop.stop();
    Ok(())
}

fn run_until(
    engine: &EngineHandle,
    transport: Option<&OscTransport>,
    watcher: Option<&ConfigWatcher>,
    transport_events: Option<Receiver<TransportEvent>>,
    stats_every: Option<Duration>,
    deadline: Option<Instant>,
) {
    let config_events = watcher.map(|w| w.events().clone()).unwrap_or_else(never);
    let transport_events = transport_events.unwrap_or_else(never);
    let mut next_stats = stats_every.and_then(|d| Instant::now().checked_add(d));

    loop {
        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            log::info!("run time elapsed, shutting down");
            break;
        }
        // Wake for whichever comes first: stats, deadline or a channel message.
        let wake = [next_stats, deadline].into_iter().flatten().min();
        let timeout = match wake {
            Some(at) => after(at.saturating_duration_since(now)),
            None => never(),
        };

        select! {
            recv(config_events) -> _ => {
                if let Some(w) = watcher {
                    match w.reload() {
                        Ok(cfg) => watch::apply(engine, &cfg),
                        Err(e) => log::warn!("config reload failed: {}", e),
                    }
                }
            },
            recv(transport_events) -> ev => match ev {
                Ok(TransportEvent::Parameter { name, value }) => {
                    log::debug!("avatar parameter {} = {}", name, value);
                }
                Ok(other) => log::debug!("{:?}", other),
                Err(_) => {}
            },
            recv(timeout) -> _ => {}
        }

        if let (Some(at), Some(every)) = (next_stats, stats_every) {
            if Instant::now() >= at {
                log_stats(engine, transport);
                next_stats = at.checked_add(every);
            }
        }
    }
}

fn log_stats(engine: &EngineHandle, transport: Option<&OscTransport>) {
    let s = engine.stats();
    log::info!(
        target: "stats",
        "tracked {} visible {} hidden {} sight {:.1}m scale {} observer {}",
        s.total,
        s.visible,
        s.hidden,
        s.effective_sight_distance,
        s.world_scale,
        if s.observer_set { "set" } else { "missing" }
    );
    if let Some(t) = transport {
        let st = t.status();
        log::info!(
            target: "stats",
            "osc {:?}: users {} rx {} dropped {} tx {} tx-failed {}",
            st.state,
            st.known_users,
            st.received,
            st.dropped,
            st.sent,
            st.send_failures
        );
    }
}
