// error.rs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashError>;

#[derive(Debug, Error)]
pub enum DashError {
    /// Bad user input. Shown as a warning, nothing is mutated.
    #[error("{0}")]
    Validation(String),

    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown storage key `{0}`")]
    UnknownKey(String),

    #[error("value stored under `{key}` has the wrong shape: {source}")]
    Shape {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[cfg(test)]
    #[error("storage write rejected: {0}")]
    WriteRejected(String),

    #[error("could not open {url}: {source}")]
    Launch {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start background mediator: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("background mediator is not running")]
    MediatorGone,
}

impl DashError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        DashError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DashError::Validation(_))
    }
}
