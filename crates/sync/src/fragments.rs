use async_trait::async_trait;
use snippets_cache::{FetchError, Fetcher, Lookup, RevalidatingCache};
use snippets_core::{DailyFragment, Day, FragmentId, sort_fragments};
use snippets_remote::{Direction, Query, RemoteAccessor};
use tracing::info;

use crate::error::WriteError;

const CREATED_AT: &str = "createdAt";

struct DayFetcher {
    remote: RemoteAccessor,
}

#[async_trait]
impl Fetcher<Day, Vec<DailyFragment>> for DayFetcher {
    async fn fetch(&self, day: &Day) -> Result<Vec<DailyFragment>, FetchError> {
        let query = Query::all().order_by(CREATED_AT, Direction::Ascending);
        let mut fragments = self
            .remote
            .list_collection::<DailyFragment>(&self.remote.fragments_collection(*day), &query)
            .await
            .map_err(FetchError::new)?;
        sort_fragments(&mut fragments);
        Ok(fragments)
    }
}

/// Append-only log of fragments per calendar day.
///
/// Fragments are never edited in place; removing one and appending a new
/// one is the only way to change a day.
#[derive(Clone)]
pub struct FragmentLog {
    remote: RemoteAccessor,
    days: RevalidatingCache<Day, Vec<DailyFragment>>,
}

impl FragmentLog {
    pub fn new(remote: RemoteAccessor) -> Self {
        let days = RevalidatingCache::new(DayFetcher { remote: remote.clone() });
        Self { remote, days }
    }

    /// Fragments of `day`, oldest first.
    pub async fn list(&self, day: Day) -> Lookup<Vec<DailyFragment>> {
        self.days.get(&day).await
    }

    pub fn peek(&self, day: Day) -> Lookup<Vec<DailyFragment>> {
        self.days.peek(&day)
    }

    pub async fn append(&self, day: Day, fragment: &DailyFragment) -> Result<(), WriteError> {
        let path = self.remote.fragment_path(day, &fragment.id);
        self.remote
            .set_document(&path, fragment)
            .await
            .map_err(|source| WriteError {
                path: path.to_string(),
                source,
            })?;
        info!(%day, id = %fragment.id, kind = fragment.kind().slug(), "fragment appended");
        self.days.invalidate(&day);
        Ok(())
    }

    /// Removing an id that is not there succeeds.
    pub async fn remove(&self, day: Day, id: &FragmentId) -> Result<(), WriteError> {
        let path = self.remote.fragment_path(day, id);
        self.remote
            .delete_document(&path)
            .await
            .map_err(|source| WriteError {
                path: path.to_string(),
                source,
            })?;
        info!(%day, %id, "fragment removed");
        self.days.invalidate(&day);
        Ok(())
    }

    pub fn days(&self) -> &RevalidatingCache<Day, Vec<DailyFragment>> {
        &self.days
    }
}
