//! Agent configuration: which dynos this process reports for.

use std::future::Future;
use std::sync::Arc;

use hirefire_core::Settings;
use hirefire_web::Web;
use hirefire_worker::{Worker, WorkerError};

/// The configured agent. Build it once at startup and share it behind an
/// `Arc` with the request adapters.
pub struct HireFire {
    settings: Settings,
    web: Option<Arc<Web>>,
    workers: Vec<Worker>,
}

impl HireFire {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            web: None,
            workers: Vec::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(Settings::from_process_env())
    }

    /// Report request queue time for the `web` dyno.
    pub fn dyno_web(self) -> Self {
        let web = Arc::new(Web::new(self.settings.clone()));
        self.with_web(web)
    }

    /// Use a pre-built web engine, e.g. one with a custom transport.
    pub fn with_web(mut self, web: Arc<Web>) -> Self {
        self.web = Some(web);
        self
    }

    /// Report the job queue metric of the worker dyno `name`.
    ///
    /// The name `web` belongs to the web dyno: it enables request queue time
    /// reporting like [`HireFire::dyno_web`] and `measure` is not registered.
    pub fn dyno_worker<F, Fut>(self, name: &str, measure: F) -> Result<Self, WorkerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<u64>> + Send + 'static,
    {
        if name == "web" {
            return Ok(self.dyno_web());
        }

        let worker = Worker::new(name, measure)?;
        Ok(self.with_worker(worker))
    }

    pub fn with_worker(mut self, worker: Worker) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn web(&self) -> Option<&Arc<Web>> {
        self.web.as_ref()
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }
}
