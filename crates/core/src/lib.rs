//! Shared data model for weekly snippets and daily fragment logs.

pub mod fragment;
pub mod identity;
pub mod snippet;

pub use fragment::{BlobRef, DailyFragment, Day, FragmentContent, FragmentId, FragmentKind, sort_fragments};
pub use identity::{Identity, IdentityError};
pub use snippet::{KeyError, Snippet, SnippetKey, YearKey, weeks_in_year};
