use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(
        "Invalid name for Worker({0}). Ensure it matches the Procfile process name (i.e. web, worker)."
    )]
    InvalidName(String),
}

/// Failures raised by the job queue macros.
#[derive(Debug, Error)]
pub enum MacroError {
    #[error("No queue was specified. Please specify at least one queue.")]
    MissingQueue,

    #[error("{0} currently does not support job queue latency measurements.")]
    JobQueueLatencyUnsupported(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            WorkerError::InvalidName("1web".into()).to_string(),
            "Invalid name for Worker(1web). Ensure it matches the Procfile process name (i.e. web, worker)."
        );
        assert_eq!(
            MacroError::MissingQueue.to_string(),
            "No queue was specified. Please specify at least one queue."
        );
        assert_eq!(
            MacroError::JobQueueLatencyUnsupported("BullMQ".into()).to_string(),
            "BullMQ currently does not support job queue latency measurements."
        );
    }
}
