//! hirefire.toml: which dynos this host reports for.
//!
//! ```toml
//! web = true
//!
//! [[worker]]
//! name = "worker"
//! queues = ["default", "mailer"]
//! connection = "redis://localhost:6379/0"   # optional
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use hirefire_core::Settings;
use hirefire_middleware::HireFire;
use hirefire_worker::{bullmq, BullMqOptions, WorkerError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("worker {0} lists no queues")]
    EmptyQueues(String),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Report request queue time for the web dyno.
    #[serde(default)]
    pub web: bool,

    #[serde(default, rename = "worker")]
    pub workers: Vec<WorkerConfig>,
}

/// A worker dyno measured with the BullMQ job queue size macro.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    pub name: String,
    pub queues: Vec<String>,
    pub connection: Option<String>,
}

impl AgentConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        if let Some(worker) = config.workers.iter().find(|w| w.queues.is_empty()) {
            return Err(ConfigError::EmptyQueues(worker.name.clone()));
        }
        Ok(config)
    }

    /// Build the agent, registering one BullMQ worker per `[[worker]]`.
    pub fn build(&self, settings: Settings) -> Result<HireFire, ConfigError> {
        let mut hirefire = HireFire::new(settings);
        if self.web {
            hirefire = hirefire.dyno_web();
        }

        for worker in &self.workers {
            let queues = worker.queues.clone();
            let options = BullMqOptions {
                connection: worker.connection.clone(),
            };
            hirefire = hirefire.dyno_worker(&worker.name, move || {
                let queues = queues.clone();
                let options = options.clone();
                async move { Ok(bullmq::job_queue_size(&queues, options).await?) }
            })?;
        }
        Ok(hirefire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hirefire_core::MapEnv;

    #[test]
    fn parses_full_config() {
        let config = AgentConfig::parse(
            r#"
web = true

[[worker]]
name = "worker"
queues = ["default", "mailer"]

[[worker]]
name = "reports"
queues = ["reports"]
connection = "redis://cache:6379/1"
"#,
        )
        .unwrap();

        assert!(config.web);
        assert_eq!(config.workers.len(), 2);
        assert_eq!(config.workers[0].queues, vec!["default", "mailer"]);
        assert_eq!(config.workers[0].connection, None);
        assert_eq!(
            config.workers[1].connection.as_deref(),
            Some("redis://cache:6379/1")
        );
    }

    #[test]
    fn empty_config_reports_nothing() {
        let config = AgentConfig::parse("").unwrap();
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = AgentConfig::parse("webb = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_worker_without_queues() {
        let err = AgentConfig::parse(
            r#"
[[worker]]
name = "worker"
queues = []
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyQueues(ref name) if name == "worker"));
    }

    #[test]
    fn missing_file() {
        let err = AgentConfig::from_file(Path::new("/nonexistent/hirefire.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn builds_agent() {
        let config = AgentConfig::parse(
            r#"
web = true

[[worker]]
name = "worker"
queues = ["default"]
"#,
        )
        .unwrap();

        let hirefire = config.build(Settings::new(Arc::new(MapEnv::new()))).unwrap();
        assert!(hirefire.web().is_some());
        assert_eq!(hirefire.workers()[0].name(), "worker");
    }

    #[test]
    fn invalid_worker_name_fails_build() {
        let config = AgentConfig::parse(
            r#"
[[worker]]
name = "not valid"
queues = ["default"]
"#,
        )
        .unwrap();

        let result = config.build(Settings::new(Arc::new(MapEnv::new())));
        assert!(matches!(result, Err(ConfigError::Worker(_))));
    }
}
