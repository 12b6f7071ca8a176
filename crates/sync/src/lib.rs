//! Optimistic synchronization on top of the revalidating cache.
//!
//! * [`SnippetRepository`]: weekly snippets and their per-year rollups.
//! * [`SnippetEditor`]: debounced editor for one snippet at a time.
//! * [`FragmentLog`]: append/remove semantics for a day's fragments.
//! * [`FragmentBuilder`]: turns raw images, location fixes and text into
//!   fragments ready to append.
//! * [`ImageResolver`]: per-view download URLs for image fragments.

pub mod builders;
pub mod editor;
mod error;
mod fragments;
mod images;
mod snippets;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod testing;

pub use builders::{Coordinates, FragmentBuilder, FragmentClock, LocationProvider, LocationUnavailable, geohash};
pub use editor::{EditorSnapshot, EditorState, EditorStatus, Flush, SnippetEditor};
pub use error::{BuildError, EditorClosed, WriteError};
pub use fragments::FragmentLog;
pub use images::{ImageResolver, ResolvedImage};
pub use snippets::SnippetRepository;

pub use snippets_cache::{FetchError, Lookup};
