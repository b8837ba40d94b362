//! Engine tunables and the adaptive parameter controller.
//!
//! The collector may answer a successful dispatch with headers that change
//! the dispatch interval, the submission timeout, and the buffer TTL. Only
//! [`Tunables::adjust`] writes these values; it is called from the success
//! path of the submitter and takes effect from the next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use http::HeaderMap;
use tracing::{debug, warn};

use hirefire_core::version::{
    HEADER_BUFFER_TTL, HEADER_DISPATCHER_INTERVAL, HEADER_DISPATCHER_TIMEOUT,
};

pub const DEFAULT_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_TTL_SECS: u64 = 60;

#[derive(Debug)]
pub struct Tunables {
    interval_secs: AtomicU64,
    timeout_secs: AtomicU64,
    ttl_secs: AtomicU64,
}

/// Point-in-time copy of the tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunablesSnapshot {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub ttl_secs: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            interval_secs: AtomicU64::new(DEFAULT_INTERVAL_SECS),
            timeout_secs: AtomicU64::new(DEFAULT_TIMEOUT_SECS),
            ttl_secs: AtomicU64::new(DEFAULT_TTL_SECS),
        }
    }
}

impl Tunables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.load(Ordering::Relaxed))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.load(Ordering::Relaxed))
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TunablesSnapshot {
        TunablesSnapshot {
            interval_secs: self.interval_secs.load(Ordering::Relaxed),
            timeout_secs: self.timeout_secs.load(Ordering::Relaxed),
            ttl_secs: self.ttl_secs.load(Ordering::Relaxed),
        }
    }

    /// Apply the adaptive headers of a successful response.
    ///
    /// Absent headers leave the current value untouched. Values that do not
    /// parse as whole seconds are ignored, and so is a zero interval or
    /// timeout.
    pub fn adjust(&self, headers: &HeaderMap) {
        apply(headers, HEADER_DISPATCHER_INTERVAL, &self.interval_secs, 1);
        apply(headers, HEADER_DISPATCHER_TIMEOUT, &self.timeout_secs, 1);
        apply(headers, HEADER_BUFFER_TTL, &self.ttl_secs, 0);
    }
}

fn apply(headers: &HeaderMap, name: &str, slot: &AtomicU64, min: u64) {
    let Some(raw) = headers.get(name) else {
        return;
    };

    let parsed = raw
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|v| *v >= min);

    match parsed {
        Some(value) => {
            let previous = slot.swap(value, Ordering::Relaxed);
            if previous != value {
                debug!(header = name, from = previous, to = value, "dispatcher parameter adjusted");
            }
        }
        None => {
            warn!(header = name, value = ?raw, "ignoring invalid dispatcher parameter");
        }
    }
}
