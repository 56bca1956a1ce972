use std::collections::HashMap;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use proxima_engine::{EngineHandle, VisibilityBatch};
use proxima_osc::{OscSender, TransportError};

/// Where visibility commands go. Implemented by the OSC sender; tests record calls.
pub trait VisibilitySink: Send + 'static {
    fn send_visibility(&self, id: &str, visible: bool, alpha: f32) -> Result<(), TransportError>;
}

impl VisibilitySink for OscSender {
    fn send_visibility(&self, id: &str, visible: bool, alpha: f32) -> Result<(), TransportError> {
        OscSender::send_visibility(self, id, visible, alpha)
    }
}

/// Alpha most recently sent per participant id.
pub type SentAlpha = HashMap<String, f32>;

/// Forwards engine batches to a sink on its own thread, and every `resync_every` resends
/// alphas that drifted without showing up in a batch.
pub struct Bridge {
    shutdown_tx: Option<Sender<()>>,
    join: Option<JoinHandle<u64>>,
}

impl Bridge {
    pub fn spawn<S: VisibilitySink>(
        engine: &EngineHandle,
        sink: S,
        resync_every: Duration,
    ) -> io::Result<Self> {
        let batches = engine.subscribe();
        let engine = engine.clone();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let join = thread::Builder::new()
            .name("proxima-bridge".into())
            .spawn(move || run(batches, shutdown_rx, engine, sink, resync_every))?;
        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(join) = self.join.take() {
            match join.join() {
                Ok(sent) => log::info!("bridge stopped after {} commands", sent),
                Err(_) => log::error!("bridge thread panicked"),
            }
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<S: VisibilitySink>(
    batches: Receiver<VisibilityBatch>,
    shutdown_rx: Receiver<()>,
    engine: EngineHandle,
    sink: S,
    resync_every: Duration,
) -> u64 {
    let resync_tick = tick(resync_every);
    let mut last_sent = SentAlpha::new();
    let mut sent = 0u64;
    loop {
        select! {
            recv(batches) -> batch => match batch {
                Ok(batch) => sent += forward(&batch, &sink, &mut last_sent),
                Err(_) => break,
            },
            recv(resync_tick) -> _ => sent += resync(&engine, &sink, &mut last_sent),
            recv(shutdown_rx) -> _ => break,
        }
    }
    sent
}

/// Send one command per changed or removed participant. Failures are logged and skipped.
pub fn forward<S: VisibilitySink + ?Sized>(
    batch: &VisibilityBatch,
    sink: &S,
    last_sent: &mut SentAlpha,
) -> u64 {
    let mut sent = 0;
    for rec in &batch.changed {
        last_sent.insert(rec.id.clone(), rec.fraction);
        sent += send(sink, &rec.id, rec.fraction);
    }
    for id in &batch.removed {
        last_sent.remove(id);
        sent += send(sink, id, 0.0);
    }
    sent
}

/// Resend the current alpha of every tracked participant whose fraction differs from the
/// last one sent. Fades slower than the per-tick change threshold only reach the sink here.
pub fn resync<S: VisibilitySink + ?Sized>(
    engine: &EngineHandle,
    sink: &S,
    last_sent: &mut SentAlpha,
) -> u64 {
    let drifted: Vec<(String, f32)> = engine.with(|e| {
        last_sent
            .iter()
            .filter_map(|(id, alpha)| {
                let rec = e.record(id)?;
                (rec.fraction != *alpha).then(|| (id.clone(), rec.fraction))
            })
            .collect()
    });
    let mut sent = 0;
    for (id, alpha) in drifted {
        sent += send(sink, &id, alpha);
        last_sent.insert(id, alpha);
    }
    sent
}

fn send<S: VisibilitySink + ?Sized>(sink: &S, id: &str, alpha: f32) -> u64 {
    match sink.send_visibility(id, alpha > 0.0, alpha) {
        Ok(()) => 1,
        Err(TransportError::NotConnected) => {
            log::debug!("dropping visibility for {}: not connected", id);
            0
        }
        Err(e) => {
            log::warn!("visibility for {}: {}", id, e);
            0
        }
    }
}
