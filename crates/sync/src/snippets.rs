use async_trait::async_trait;
use snippets_cache::{FetchError, Fetcher, Lookup, RevalidatingCache};
use snippets_core::{Snippet, SnippetKey, YearKey};
use snippets_remote::{Direction, FieldFilter, Query, RemoteAccessor};
use tracing::{debug, info};

use crate::error::WriteError;

struct SnippetFetcher {
    remote: RemoteAccessor,
}

#[async_trait]
impl Fetcher<SnippetKey, Snippet> for SnippetFetcher {
    async fn fetch(&self, key: &SnippetKey) -> Result<Snippet, FetchError> {
        let path = self.remote.snippet_path(*key);
        let stored = self
            .remote
            .get_document::<Snippet>(&path)
            .await
            .map_err(FetchError::new)?;
        // Absent and empty are the same state; the key always comes from
        // the request, never from the document body.
        Ok(match stored {
            Some(snippet) => Snippet::new(*key, snippet.content),
            None => Snippet::empty(*key),
        })
    }
}

struct AnnualFetcher {
    remote: RemoteAccessor,
}

#[async_trait]
impl Fetcher<YearKey, Vec<Snippet>> for AnnualFetcher {
    async fn fetch(&self, year: &YearKey) -> Result<Vec<Snippet>, FetchError> {
        let query = Query::all()
            .filter(FieldFilter::eq("year", year.0))
            .order_by("week", Direction::Descending);
        let mut snippets = self
            .remote
            .list_collection::<Snippet>(&self.remote.snippets_collection(), &query)
            .await
            .map_err(FetchError::new)?;
        snippets.retain(|snippet| !snippet.is_empty());
        snippets.sort_by(|a, b| b.week.cmp(&a.week));
        Ok(snippets)
    }
}

/// Weekly snippets and the per-year rollup, both behind revalidating
/// caches.  Clones share the caches.
#[derive(Clone)]
pub struct SnippetRepository {
    remote: RemoteAccessor,
    snippets: RevalidatingCache<SnippetKey, Snippet>,
    annual: RevalidatingCache<YearKey, Vec<Snippet>>,
}

impl SnippetRepository {
    pub fn new(remote: RemoteAccessor) -> Self {
        let snippets = RevalidatingCache::new(SnippetFetcher { remote: remote.clone() });
        let annual = RevalidatingCache::new(AnnualFetcher { remote: remote.clone() });
        Self {
            remote,
            snippets,
            annual,
        }
    }

    pub fn remote(&self) -> &RemoteAccessor {
        &self.remote
    }

    /// The snippet for `key`; a week nobody wrote yields empty content.
    pub async fn snippet(&self, key: SnippetKey) -> Lookup<Snippet> {
        self.snippets.get(&key).await
    }

    pub fn peek_snippet(&self, key: SnippetKey) -> Lookup<Snippet> {
        self.snippets.peek(&key)
    }

    /// Every non-empty snippet of `year`, latest week first.
    pub async fn annual(&self, year: YearKey) -> Lookup<Vec<Snippet>> {
        self.annual.get(&year).await
    }

    pub fn peek_annual(&self, year: YearKey) -> Lookup<Vec<Snippet>> {
        self.annual.peek(&year)
    }

    /// Persist `content` for `key`.  Empty content deletes the document.
    ///
    /// On success the snippet and its year are revalidated; on failure
    /// neither cache is touched.
    pub async fn save(&self, key: SnippetKey, content: &str) -> Result<(), WriteError> {
        let path = self.remote.snippet_path(key);
        let result = if content.is_empty() {
            self.remote.delete_document(&path).await
        } else {
            self.remote
                .set_document(&path, &Snippet::new(key, content))
                .await
        };
        result.map_err(|source| WriteError {
            path: path.to_string(),
            source,
        })?;

        info!(%key, bytes = content.len(), "snippet saved");
        self.snippets.invalidate(&key);
        self.annual.invalidate(&key.year_key());
        Ok(())
    }

    /// Re-fetch `key`, e.g. to retry after a failed load.
    pub fn reload(&self, key: SnippetKey) {
        debug!(%key, "reload requested");
        self.snippets.invalidate(&key);
    }

    pub fn snippets(&self) -> &RevalidatingCache<SnippetKey, Snippet> {
        &self.snippets
    }

    pub fn annuals(&self) -> &RevalidatingCache<YearKey, Vec<Snippet>> {
        &self.annual
    }
}
