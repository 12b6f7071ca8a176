//! Directory-backed stores.
//!
//! | Kind      | Location                         |
//! |-----------|----------------------------------|
//! | document  | `{root}/documents/{path}.json`   |
//! | blob      | `{root}/blobs/{path}`            |
//!
//! Documents are replaced atomically: written to a `.tmp` sibling, synced,
//! then renamed over the original.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use snippets_core::BlobRef;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::error::{RemoteError, Result};
use crate::path::DocPath;
use crate::query::Query;
use crate::store::{BlobStore, Document, DocumentStore};

const DOCUMENT_EXT: &str = "json";

fn checked(path: &DocPath) -> Result<&DocPath> {
    if path.is_well_formed() {
        Ok(path)
    } else {
        Err(RemoteError::InvalidPath(path.to_string()))
    }
}

fn under(base: &Path, path: &DocPath) -> PathBuf {
    path.segments()
        .iter()
        .fold(base.to_path_buf(), |acc, segment| acc.join(segment))
}

#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    base: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            base: root.as_ref().join("documents"),
        }
    }

    fn file_for(&self, path: &DocPath) -> Result<PathBuf> {
        let path = checked(path)?;
        let dir = match path.parent() {
            Some(parent) => under(&self.base, &parent),
            None => self.base.clone(),
        };
        let name = path.last().unwrap_or_default();
        Ok(dir.join(format!("{name}.{DOCUMENT_EXT}")))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        let file = self.file_for(path)?;
        match tokio::fs::read(&file).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, path: &DocPath, doc: Document) -> Result<()> {
        if !doc.is_object() {
            return Err(RemoteError::Rejected {
                path: path.to_string(),
                reason: "documents must be JSON objects".to_string(),
            });
        }
        let file = self.file_for(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = file.with_extension(format!("{DOCUMENT_EXT}.tmp"));
        let rendered = serde_json::to_vec_pretty(&doc)?;
        let write_result: Result<()> = async {
            let mut out = tokio::fs::File::create(&tmp).await?;
            out.write_all(&rendered).await?;
            out.flush().await?;
            out.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }
        if let Err(err) = tokio::fs::rename(&tmp, &file).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        debug!(path = %file.display(), "document written");
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<()> {
        let file = self.file_for(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, collection: &DocPath, query: &Query) -> Result<Vec<Document>> {
        let dir = under(&self.base, checked(collection)?);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXT) {
                continue;
            }
            let Some(id) = file.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let raw = tokio::fs::read(&file).await?;
            match serde_json::from_slice::<Document>(&raw) {
                Ok(doc) => docs.push((id, doc)),
                Err(err) => {
                    warn!(path = %file.display(), error = %err, "skipping unreadable document");
                }
            }
        }
        Ok(query.apply(docs))
    }
}

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            base: root.as_ref().join("blobs"),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, path: &DocPath, bytes: Vec<u8>) -> Result<BlobRef> {
        let file = under(&self.base, checked(path)?);
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, &bytes).await?;
        debug!(path = %file.display(), bytes = bytes.len(), "blob written");
        Ok(BlobRef::new(path.to_string()))
    }

    async fn resolve_url(&self, blob: &BlobRef) -> Result<String> {
        let path = DocPath::parse(blob.as_str());
        let file = under(&self.base, checked(&path)?);
        let absolute = match tokio::fs::canonicalize(&file).await {
            Ok(absolute) => absolute,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RemoteError::NotFound {
                    path: blob.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        Url::from_file_path(&absolute)
            .map(String::from)
            .map_err(|()| RemoteError::Unavailable(format!("no file URL for {}", absolute.display())))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::query::{Direction, FieldFilter};

    #[tokio::test]
    async fn documents_roundtrip_through_files() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let path = DocPath::parse("users/u/weekly-snippets/2024-W10");

        assert_eq!(store.get(&path).await.unwrap(), None);
        store
            .set(&path, json!({ "year": 2024, "week": 10, "content": "hi" }))
            .await
            .unwrap();
        assert!(dir.path().join("documents/users/u/weekly-snippets/2024-W10.json").exists());
        assert_eq!(
            store.get(&path).await.unwrap(),
            Some(json!({ "year": 2024, "week": 10, "content": "hi" }))
        );

        store.delete(&path).await.unwrap();
        store.delete(&path).await.unwrap();
        assert_eq!(store.get(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_applies_query_and_ignores_missing_collection() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let coll = DocPath::parse("users/u/daily/2024-03-05/fragments");
        assert!(store.list(&coll, &Query::all()).await.unwrap().is_empty());

        for (id, t) in [("b", 20), ("a", 30), ("c", 10)] {
            store.set(&coll.join(id), json!({ "id": id, "createdAt": t })).await.unwrap();
        }
        let ids: Vec<_> = store
            .list(&coll, &Query::all().order_by("createdAt", Direction::Ascending))
            .await
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["c", "b", "a"]);

        let only = store
            .list(&coll, &Query::all().filter(FieldFilter::eq("id", "a")))
            .await
            .unwrap();
        assert_eq!(only.len(), 1);
    }

    #[tokio::test]
    async fn traversal_paths_are_refused() {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let err = store
            .set(&DocPath::new(["users", "..", "x"]), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn blobs_resolve_to_file_urls() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path());
        let blob = blobs
            .upload(&DocPath::parse("users/u/images/f.jpg"), vec![9, 9])
            .await
            .unwrap();
        let url = blobs.resolve_url(&blob).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/blobs/users/u/images/f.jpg"));

        let missing = BlobRef::new("users/u/images/nope.jpg");
        assert!(blobs.resolve_url(&missing).await.unwrap_err().is_not_found());
    }
}
