use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use snippets_core::{BlobRef, Day, FragmentId, Identity, SnippetKey};
use tracing::debug;

use crate::error::{RemoteError, Result};
use crate::memory::{MemoryBlobStore, MemoryDocumentStore};
use crate::path::DocPath;
use crate::query::Query;
use crate::store::{BlobStore, DocumentStore};

const USERS: &str = "users";
const WEEKLY_SNIPPETS: &str = "weekly-snippets";
const DAILY: &str = "daily";
const FRAGMENTS: &str = "fragments";
const IMAGES: &str = "images";

/// Capability-style client for one signed-in principal.
///
/// Stateless: every method is a single remote call.  Cloning is cheap and
/// clones share the underlying stores.  Every path it touches must live
/// under `users/{identity}`; anything else is rejected before reaching the
/// backend.
#[derive(Clone)]
pub struct RemoteAccessor {
    identity: Identity,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for RemoteAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAccessor")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl RemoteAccessor {
    pub fn new(identity: Identity, documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            identity,
            documents,
            blobs,
        }
    }

    /// Accessor over fresh process-local stores.
    pub fn in_memory(identity: Identity) -> Self {
        Self::new(
            identity,
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryBlobStore::new()),
        )
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    // ── Path shapes ──────────────────────────────────────────────────────────

    pub fn user_root(&self) -> DocPath {
        DocPath::new([USERS, self.identity.as_str()])
    }

    pub fn snippets_collection(&self) -> DocPath {
        self.user_root().join(WEEKLY_SNIPPETS)
    }

    /// `users/{identity}/weekly-snippets/{year}-W{ww}`
    pub fn snippet_path(&self, key: SnippetKey) -> DocPath {
        self.snippets_collection().join(key.iso_label())
    }

    /// `users/{identity}/daily/{date}/fragments`
    pub fn fragments_collection(&self, day: Day) -> DocPath {
        self.user_root().join(DAILY).join(day.to_string()).join(FRAGMENTS)
    }

    pub fn fragment_path(&self, day: Day, id: &FragmentId) -> DocPath {
        self.fragments_collection(day).join(id.as_str())
    }

    /// `users/{identity}/images/{id}.jpg`
    pub fn image_blob_path(&self, id: &FragmentId) -> DocPath {
        self.user_root().join(IMAGES).join(format!("{id}.jpg"))
    }

    fn ensure_scoped(&self, path: &DocPath) -> Result<()> {
        if path.starts_with(&self.user_root()) && path.segments().len() > 2 {
            Ok(())
        } else {
            Err(RemoteError::Rejected {
                path: path.to_string(),
                reason: format!("outside the namespace of {}", self.identity),
            })
        }
    }

    // ── Documents ────────────────────────────────────────────────────────────

    /// `Ok(None)` for an absent document.
    pub async fn get_document<T: DeserializeOwned>(&self, path: &DocPath) -> Result<Option<T>> {
        self.ensure_scoped(path)?;
        debug!(%path, "get document");
        match self.documents.get(path).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn set_document<T: Serialize>(&self, path: &DocPath, value: &T) -> Result<()> {
        self.ensure_scoped(path)?;
        debug!(%path, "set document");
        let doc = serde_json::to_value(value)?;
        self.documents.set(path, doc).await
    }

    pub async fn delete_document(&self, path: &DocPath) -> Result<()> {
        self.ensure_scoped(path)?;
        debug!(%path, "delete document");
        self.documents.delete(path).await
    }

    pub async fn list_collection<T: DeserializeOwned>(&self, collection: &DocPath, query: &Query) -> Result<Vec<T>> {
        self.ensure_scoped(collection)?;
        debug!(%collection, ?query, "list collection");
        self.documents
            .list(collection, query)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(RemoteError::from))
            .collect()
    }

    // ── Blobs ────────────────────────────────────────────────────────────────

    pub async fn upload_blob(&self, path: &DocPath, bytes: Vec<u8>) -> Result<BlobRef> {
        self.ensure_scoped(path)?;
        debug!(%path, bytes = bytes.len(), "upload blob");
        self.blobs.upload(path, bytes).await
    }

    /// Blobs outside this identity's namespace resolve as `NotFound`, the
    /// same as unknown keys.
    pub async fn resolve_blob_url(&self, blob: &BlobRef) -> Result<String> {
        if self.ensure_scoped(&DocPath::parse(blob.as_str())).is_err() {
            return Err(RemoteError::NotFound {
                path: blob.to_string(),
            });
        }
        self.blobs.resolve_url(blob).await
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        body: String,
    }

    fn accessor(user: &str) -> RemoteAccessor {
        RemoteAccessor::in_memory(Identity::new(user).unwrap())
    }

    #[test]
    fn path_shapes() {
        let remote = accessor("u1");
        let key = SnippetKey::new(2024, 3).unwrap();
        assert_eq!(remote.snippet_path(key).to_string(), "users/u1/weekly-snippets/2024-W03");

        let day: Day = "2024-03-05".parse().unwrap();
        let id = FragmentId::from("abc");
        assert_eq!(
            remote.fragment_path(day, &id).to_string(),
            "users/u1/daily/2024-03-05/fragments/abc"
        );
        assert_eq!(remote.image_blob_path(&id).to_string(), "users/u1/images/abc.jpg");
    }

    #[tokio::test]
    async fn typed_document_roundtrip_and_absence() {
        let remote = accessor("u1");
        let path = remote.snippets_collection().join("n");
        assert_eq!(remote.get_document::<Note>(&path).await.unwrap(), None);

        let note = Note { body: "x".into() };
        remote.set_document(&path, &note).await.unwrap();
        assert_eq!(remote.get_document::<Note>(&path).await.unwrap(), Some(note));

        remote.delete_document(&path).await.unwrap();
        assert_eq!(remote.get_document::<Note>(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn paths_outside_the_identity_are_rejected() {
        let remote = accessor("u1");
        let foreign = DocPath::parse("users/u2/weekly-snippets/2024-W01");
        let err = remote.set_document(&foreign, &Note { body: "x".into() }).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { .. }));
        assert!(remote.get_document::<Note>(&remote.user_root()).await.is_err());
    }

    #[tokio::test]
    async fn blob_resolution_is_scoped() {
        let remote = accessor("u1");
        let id = FragmentId::from("pic");
        let blob = remote.upload_blob(&remote.image_blob_path(&id), vec![1]).await.unwrap();
        assert_eq!(remote.resolve_blob_url(&blob).await.unwrap(), "memory://users/u1/images/pic.jpg");

        let foreign = BlobRef::new("users/u2/images/pic.jpg");
        assert!(remote.resolve_blob_url(&foreign).await.unwrap_err().is_not_found());
    }
}
