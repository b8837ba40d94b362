//! Environment-backed settings.
//!
//! The hosting process owns the environment; the agent only reads it. Tests
//! and embedders that do not want to touch process state use [`MapEnv`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Name of the variable holding the dispatch token.
pub const ENV_TOKEN: &str = "HIREFIRE_TOKEN";
/// Optional override of the collector host.
pub const ENV_DISPATCH_URL: &str = "HIREFIRE_DISPATCH_URL";
/// When set, dispatched payloads are logged at info level.
pub const ENV_VERBOSE: &str = "HIREFIRE_VERBOSE";

/// Collector host used when `HIREFIRE_DISPATCH_URL` is unset.
pub const DEFAULT_DISPATCH_HOST: &str = "logdrain.hirefire.io";

/// A source of configuration variables.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory variables. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: Arc<RwLock<HashMap<String, String>>>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set a variable.
    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: &str) {
        self.vars.write().insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.vars.write().remove(key);
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.read().get(key).cloned()
    }
}

/// Typed view over an [`EnvSource`].
#[derive(Clone)]
pub struct Settings {
    source: Arc<dyn EnvSource>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("token_set", &self.token().is_some())
            .field("dispatch_host", &self.dispatch_host())
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_process_env()
    }
}

impl Settings {
    pub fn new(source: Arc<dyn EnvSource>) -> Self {
        Self { source }
    }

    pub fn from_process_env() -> Self {
        Self::new(Arc::new(ProcessEnv))
    }

    /// Look up a variable, treating an empty value as unset.
    pub fn var(&self, key: &str) -> Option<String> {
        self.source.var(key).filter(|v| !v.is_empty())
    }

    /// The dispatch token, if configured.
    pub fn token(&self) -> Option<String> {
        self.var(ENV_TOKEN)
    }

    /// Collector host without scheme or trailing slash.
    pub fn dispatch_host(&self) -> String {
        let raw = self
            .var(ENV_DISPATCH_URL)
            .unwrap_or_else(|| DEFAULT_DISPATCH_HOST.to_string());
        strip_scheme(&raw).to_string()
    }

    pub fn verbose(&self) -> bool {
        self.var(ENV_VERBOSE).is_some()
    }
}

fn strip_scheme(url: &str) -> &str {
    let url = url.trim();
    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    host.trim_end_matches('/')
}
