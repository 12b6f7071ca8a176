//! Process-local backends.  Used for `backend = "memory"` and as the
//! storage double in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use snippets_core::BlobRef;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{RemoteError, Result};
use crate::path::DocPath;
use crate::query::Query;
use crate::store::{BlobStore, Document, DocumentStore};

/// Snapshot of the call counters of a [`MemoryDocumentStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOps {
    pub gets: usize,
    pub sets: usize,
    pub deletes: usize,
    pub lists: usize,
}

impl StoreOps {
    pub fn writes(&self) -> usize {
        self.sets + self.deletes
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<BTreeMap<DocPath, Document>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> StoreOps {
        StoreOps {
            gets: self.gets.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            lists: self.lists.load(Ordering::Relaxed),
        }
    }

    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.lock().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.docs.lock().await.get(path).cloned())
    }

    async fn set(&self, path: &DocPath, doc: Document) -> Result<()> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        if !doc.is_object() {
            return Err(RemoteError::Rejected {
                path: path.to_string(),
                reason: "documents must be JSON objects".to_string(),
            });
        }
        self.docs.lock().await.insert(path.clone(), doc);
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.docs.lock().await.remove(path);
        Ok(())
    }

    async fn list(&self, collection: &DocPath, query: &Query) -> Result<Vec<Document>> {
        self.lists.fetch_add(1, Ordering::Relaxed);
        let docs = self.docs.lock().await;
        let children = docs
            .iter()
            .filter(|(path, _)| path.parent().as_ref() == Some(collection))
            .filter_map(|(path, doc)| Some((path.last()?.to_string(), doc.clone())))
            .collect();
        Ok(query.apply(children))
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    max_bytes: Option<usize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject uploads larger than `max_bytes`.
    pub fn with_size_limit(max_bytes: usize) -> Self {
        Self {
            blobs: Mutex::default(),
            max_bytes: Some(max_bytes),
        }
    }

    pub async fn bytes(&self, blob: &BlobRef) -> Option<Vec<u8>> {
        self.blobs.lock().await.get(blob.as_str()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &DocPath, bytes: Vec<u8>) -> Result<BlobRef> {
        if let Some(limit) = self.max_bytes {
            if bytes.len() > limit {
                return Err(RemoteError::Rejected {
                    path: path.to_string(),
                    reason: format!("{} bytes exceeds the {limit} byte limit", bytes.len()),
                });
            }
        }
        let key = path.to_string();
        debug!(path = %key, bytes = bytes.len(), "memory blob stored");
        self.blobs.lock().await.insert(key.clone(), bytes);
        Ok(BlobRef::new(key))
    }

    async fn resolve_url(&self, blob: &BlobRef) -> Result<String> {
        if !self.blobs.lock().await.contains_key(blob.as_str()) {
            return Err(RemoteError::NotFound {
                path: blob.to_string(),
            });
        }
        Ok(format!("memory://{blob}"))
    }
}
