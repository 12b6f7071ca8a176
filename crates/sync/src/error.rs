use snippets_remote::RemoteError;
use thiserror::Error;

use crate::builders::LocationUnavailable;

/// A remote write (set or delete) that did not go through.
#[derive(Debug, Error)]
#[error("failed to write {path}: {source}")]
pub struct WriteError {
    pub path: String,
    #[source]
    pub source: RemoteError,
}

/// Building a fragment failed; nothing was appended.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("not a decodable image: {0}")]
    Decode(String),
    #[error("image upload failed: {0}")]
    Upload(#[source] RemoteError),
    #[error(transparent)]
    LocationUnavailable(#[from] LocationUnavailable),
}

/// The editor task has shut down.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("snippet editor is closed")]
pub struct EditorClosed;
