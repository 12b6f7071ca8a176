//! Identity-scoped access to the remote document and blob stores.
//!
//! The engine only ever talks to storage through [`RemoteAccessor`], which
//! owns nothing but an [`Identity`](snippets_core::Identity) and two
//! capability objects.  Backends implement [`DocumentStore`] and
//! [`BlobStore`]; this crate ships an in-memory pair (also used as test
//! doubles) and a directory-backed pair.

mod accessor;
mod error;
pub mod fs;
pub mod memory;
mod path;
mod query;
mod store;

pub use accessor::RemoteAccessor;
pub use error::{RemoteError, Result};
pub use fs::{FsBlobStore, FsDocumentStore};
pub use memory::{MemoryBlobStore, MemoryDocumentStore, StoreOps};
pub use path::DocPath;
pub use query::{Direction, FieldFilter, OrderBy, Query};
pub use store::{BlobStore, Document, DocumentStore};
