use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("no ingestion endpoint at {0}")]
    UnknownEndpoint(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
