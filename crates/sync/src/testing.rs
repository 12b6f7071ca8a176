//! Storage doubles shared by the unit tests.

use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use snippets_remote::{DocPath, Document, DocumentStore, MemoryDocumentStore, Query, RemoteError, StoreOps};

/// Memory store whose reads and writes can be switched to fail, and whose
/// writes can be slowed down.
#[derive(Default)]
pub struct FlakyDocuments {
    inner: MemoryDocumentStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_delay: Mutex<Duration>,
}

impl FlakyDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = delay;
    }

    pub fn ops(&self) -> StoreOps {
        self.inner.ops()
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), RemoteError> {
        if flag.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("backend offline".to_string()))
        } else {
            Ok(())
        }
    }

    async fn before_write(&self) -> Result<(), RemoteError> {
        let delay = *self.write_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check(&self.fail_writes)
    }
}

#[async_trait]
impl DocumentStore for FlakyDocuments {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, RemoteError> {
        self.check(&self.fail_reads)?;
        self.inner.get(path).await
    }

    async fn set(&self, path: &DocPath, doc: Document) -> Result<(), RemoteError> {
        self.before_write().await?;
        self.inner.set(path, doc).await
    }

    async fn delete(&self, path: &DocPath) -> Result<(), RemoteError> {
        self.before_write().await?;
        self.inner.delete(path).await
    }

    async fn list(&self, collection: &DocPath, query: &Query) -> Result<Vec<Document>, RemoteError> {
        self.check(&self.fail_reads)?;
        self.inner.list(collection, query).await
    }
}

/// A black PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
