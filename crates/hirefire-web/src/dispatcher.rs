//! Web engine and its dispatcher scheduler.
//!
//! [`Web`] owns the buffer, the tunables, and the background tick task.
//! One tick flushes the buffer, submits the snapshot, and on failure merges
//! the snapshot back subject to the TTL. Ticks run one at a time: the loop
//! waits for a submission to finish before sleeping for the next interval,
//! so a slow collector stretches the cadence instead of stacking requests.
//! The engine's tick lock extends this across restarts and manual ticks:
//! a tick spawned after `stop_dispatcher` waits for the previous loop's
//! in-flight submission before it flushes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use hirefire_core::Settings;

use crate::buffer::{count_samples, Buffer, Snapshot};
use crate::clock::{Clock, SystemClock};
use crate::error::DispatchError;
use crate::submitter::Submitter;
use crate::transport::{HttpsTransport, Transport};
use crate::tunables::{Tunables, TunablesSnapshot};

/// What a single dispatch tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The buffer was empty; nothing was sent.
    Idle,
    /// The collector accepted the snapshot.
    Delivered { samples: usize },
    /// Delivery failed; unexpired samples went back into the buffer.
    Recovered {
        error: DispatchError,
        kept: usize,
        dropped: usize,
    },
}

/// State shared with the background tick task.
struct Engine {
    buffer: Buffer,
    tunables: Tunables,
    submitter: Submitter,
    settings: Settings,
    clock: Arc<dyn Clock>,
    /// Held for a whole tick, submission included.
    tick_lock: Mutex<()>,
}

impl Engine {
    async fn tick(&self) -> TickOutcome {
        let _tick = self.tick_lock.lock().await;

        let buffer = self.buffer.flush();
        if buffer.is_empty() {
            return TickOutcome::Idle;
        }

        let samples = count_samples(&buffer);
        if self.settings.verbose() {
            let payload = serde_json::to_string(&buffer).unwrap_or_default();
            info!(%payload, "dispatching web metrics");
        } else {
            debug!(buckets = buffer.len(), samples, "dispatching web metrics");
        }

        match self.submitter.submit(&buffer, &self.tunables).await {
            Ok(()) => TickOutcome::Delivered { samples },
            Err(error) => self.recover(buffer, error),
        }
    }

    fn recover(&self, buffer: Snapshot, error: DispatchError) -> TickOutcome {
        let now = self.clock.now_secs();
        let result = self.buffer.repopulate(buffer, now, self.tunables.ttl_secs());
        error!(
            error = %error,
            kept = result.kept,
            dropped = result.dropped,
            "error while dispatching web metrics"
        );
        TickOutcome::Recovered {
            error,
            kept: result.kept,
            dropped: result.dropped,
        }
    }
}

/// Handle to the running tick task.
struct DispatcherSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Request queue time engine for a web dyno.
pub struct Web {
    engine: Arc<Engine>,
    slot: Mutex<Option<DispatcherSlot>>,
    running: AtomicBool,
}

impl Web {
    /// Engine posting over HTTPS and using the system clock.
    pub fn new(settings: Settings) -> Self {
        Self::with_parts(settings, Arc::new(HttpsTransport::new()), Arc::new(SystemClock))
    }

    /// Engine with a custom transport and clock.
    pub fn with_parts(settings: Settings, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let engine = Engine {
            buffer: Buffer::new(),
            tunables: Tunables::new(),
            submitter: Submitter::new(settings.clone(), transport),
            settings,
            clock,
            tick_lock: Mutex::new(()),
        };
        Self {
            engine: Arc::new(engine),
            slot: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Start the background dispatcher. Returns `false` if it was already running.
    pub async fn start_dispatcher(&self) -> bool {
        if self.running.load(Ordering::Acquire) {
            return false;
        }

        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Arc::clone(&self.engine);
        let handle = tokio::spawn(run_dispatcher(engine, shutdown_rx));

        *slot = Some(DispatcherSlot {
            handle,
            shutdown_tx,
        });
        self.running.store(true, Ordering::Release);

        info!(
            interval_secs = self.engine.tunables.snapshot().interval_secs,
            "starting web metrics dispatcher"
        );
        true
    }

    /// Stop the background dispatcher. Returns `false` if it was not running.
    ///
    /// No further ticks are scheduled. A submission already in flight is
    /// left to finish or time out on its own; a restarted dispatcher does
    /// not submit until it has. The buffer is flushed once more and those
    /// samples are discarded, not submitted.
    pub async fn stop_dispatcher(&self) -> bool {
        let mut slot = self.slot.lock().await;
        let Some(current) = slot.take() else {
            return false;
        };
        self.running.store(false, Ordering::Release);
        drop(slot);

        let _ = current.shutdown_tx.send(true);
        drop(current.handle);

        let discarded = count_samples(&self.engine.buffer.flush());
        info!(discarded_samples = discarded, "web metrics dispatcher stopped");
        true
    }

    pub fn dispatcher_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Record one request's queue time in milliseconds.
    pub fn add_to_buffer(&self, queue_time_ms: u64) {
        let now = self.engine.clock.now_millis();
        self.engine.buffer.add_sample(queue_time_ms, now);
    }

    /// Take the buffered samples, leaving an empty buffer behind.
    pub fn flush_buffer(&self) -> Snapshot {
        self.engine.buffer.flush()
    }

    /// Copy of the buffered samples.
    pub fn buffered(&self) -> Snapshot {
        self.engine.buffer.contents()
    }

    /// Run one tick now: flush, submit, then adapt or recover.
    ///
    /// Failures are logged and recovered exactly as in a scheduled tick.
    pub async fn dispatch_buffer(&self) -> TickOutcome {
        self.engine.tick().await
    }

    /// Submit `buffer` directly, surfacing any failure to the caller.
    ///
    /// Nothing is flushed or recovered; the caller owns `buffer`.
    pub async fn submit_buffer(&self, buffer: &Snapshot) -> Result<(), DispatchError> {
        self.engine
            .submitter
            .submit(buffer, &self.engine.tunables)
            .await
    }

    pub fn tunables(&self) -> TunablesSnapshot {
        self.engine.tunables.snapshot()
    }

    /// Current time in milliseconds according to the engine's clock.
    pub fn now_millis(&self) -> u64 {
        self.engine.clock.now_millis()
    }
}

/// The tick loop. Re-reads the interval before every wait so an adjusted
/// cadence applies from the next tick.
async fn run_dispatcher(engine: Arc<Engine>, mut shutdown: watch::Receiver<bool>) {
    debug!("web metrics dispatcher loop starting");

    loop {
        let interval = engine.tunables.interval();

        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                debug!("web metrics dispatcher loop shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                engine.tick().await;
            }
        }
    }
}
