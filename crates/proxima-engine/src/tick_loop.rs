use std::io;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::handle::EngineHandle;

/// Background thread that ticks the engine every `update_rate` seconds until stopped.
pub struct TickLoop {
    shutdown_tx: Option<Sender<()>>,
    join: Option<JoinHandle<u64>>,
}

impl TickLoop {
    pub fn spawn(engine: EngineHandle) -> io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let join = thread::Builder::new()
            .name("proxima-tick".into())
            .spawn(move || run(engine, shutdown_rx))?;
        log::info!(target: "engine", "tick loop started");
        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        })
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Signal the loop and wait for it; a tick already in progress finishes first.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(join) = self.join.take() {
            match join.join() {
                Ok(ticks) => log::info!(target: "engine", "tick loop stopped after {} ticks", ticks),
                Err(_) => log::error!(target: "engine", "tick loop panicked"),
            }
        }
    }
}

impl Drop for TickLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(engine: EngineHandle, shutdown_rx: Receiver<()>) -> u64 {
    let mut ticks = 0u64;
    loop {
        // Re-read every pass so a settings swap changes the cadence.
        let interval = engine.settings().update_interval();
        match shutdown_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let batch = engine.tick(Instant::now());
        ticks += 1;
        if !batch.is_empty() {
            log::trace!(
                target: "engine",
                "tick {}: {} changed, {} removed",
                batch.tick,
                batch.changed.len(),
                batch.removed.len()
            );
        }
    }
    ticks
}
