use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use quanta::Instant;
use tracing::{debug, error};

use crate::monitoring::Inner;

/// How often the scheduler wakes up to check its cadences, by default.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// A recurring action, due once `interval` has passed since it last fired.
pub(crate) struct Cadence {
    interval: Duration,
    last_fire: Instant,
}

impl Cadence {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Cadence { interval, last_fire: now }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Returns `true`, and restarts the cadence, if it is due at `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_fire) >= self.interval {
            self.last_fire = now;
            true
        } else {
            false
        }
    }
}

/// Background thread driving process sampling and auto-push.
///
/// The thread wakes up on every tick and lets the engine check both cadences. Dropping the `Scheduler` wakes the
/// thread immediately and blocks until it has exited.
pub(crate) struct Scheduler {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn spawn(inner: Arc<Inner>, tick: Duration) -> io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("monitoring-scheduler".to_string())
            .spawn(move || run(&inner, &shutdown_rx, tick))?;

        debug!(?tick, "Scheduler started.");
        Ok(Scheduler { shutdown: Some(shutdown_tx), handle: Some(handle) })
    }
}

fn run(inner: &Inner, shutdown: &Receiver<()>, tick: Duration) {
    loop {
        match shutdown.recv_timeout(tick) {
            Err(RecvTimeoutError::Timeout) => inner.tick(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Disconnecting the channel is the cancellation signal.
        drop(self.shutdown.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Scheduler thread panicked.");
            } else {
                debug!("Scheduler stopped.");
            }
        }
    }
}
