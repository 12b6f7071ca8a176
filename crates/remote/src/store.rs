use async_trait::async_trait;
use serde_json::Value;
use snippets_core::BlobRef;

use crate::error::Result;
use crate::path::DocPath;
use crate::query::Query;

/// A stored document.  Always a JSON object.
pub type Document = Value;

/// Hierarchical key-value document store with ordered collection queries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document does not exist.
    async fn get(&self, path: &DocPath) -> Result<Option<Document>>;

    /// Create or fully replace.
    async fn set(&self, path: &DocPath, doc: Document) -> Result<()>;

    /// Deleting a document that does not exist succeeds.
    async fn delete(&self, path: &DocPath) -> Result<()>;

    /// Direct children of `collection` that satisfy `query`.
    async fn list(&self, collection: &DocPath, query: &Query) -> Result<Vec<Document>>;
}

/// Opaque object storage addressed by key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &DocPath, bytes: Vec<u8>) -> Result<BlobRef>;

    /// A URL the presentation layer can fetch the blob from.
    /// `RemoteError::NotFound` when the key is unknown.
    async fn resolve_url(&self, blob: &BlobRef) -> Result<String>;
}
