use thiserror::Error;

#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("Worker({name}) failed to report its job queue metric: {source}")]
    Worker {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unable to encode info response: {0}")]
    Encode(#[from] serde_json::Error),
}
