use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{path} not found")]
    NotFound { path: String },
    #[error("write to {path} rejected: {reason}")]
    Rejected { path: String, reason: String },
    #[error("invalid storage path {0:?}")]
    InvalidPath(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
