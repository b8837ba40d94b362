//! Named job queue metric sources.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::WorkerError;

/// Procfile process names: a letter followed by up to 29 letters, digits,
/// underscores or dashes.
static PROCESS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]{0,29}$").expect("process name pattern is valid")
});

pub type MetricFuture = Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send>>;

type MetricFn = dyn Fn() -> MetricFuture + Send + Sync;

/// A worker dyno and the callable that measures its job queue.
#[derive(Clone)]
pub struct Worker {
    name: String,
    measure: Arc<MetricFn>,
}

impl Worker {
    /// Register `measure` under the Procfile process `name`.
    ///
    /// ```ignore
    /// let worker = Worker::new("worker", || async { Ok(42) })?;
    /// ```
    pub fn new<F, Fut>(name: impl Into<String>, measure: F) -> Result<Self, WorkerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<u64>> + Send + 'static,
    {
        let name = name.into();
        if !PROCESS_NAME.is_match(&name) {
            return Err(WorkerError::InvalidName(name));
        }

        Ok(Self {
            name,
            measure: Arc::new(move || Box::pin(measure()) as MetricFuture),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the callable and return the current metric.
    pub async fn value(&self) -> anyhow::Result<u64> {
        (self.measure)().await
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("name", &self.name).finish_non_exhaustive()
    }
}
