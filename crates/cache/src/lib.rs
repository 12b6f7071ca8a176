//! Keyed stale-while-revalidate cache of asynchronously fetched values.

mod cache;
mod fetch;
mod lookup;

pub use cache::{CacheStats, RevalidatingCache};
pub use fetch::{FetchError, Fetcher, FnFetcher, fetch_fn};
pub use lookup::Lookup;
