use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// A failed fetch.  Cheap to clone so one failure can be handed to every
/// caller that was waiting on the same fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    message: Arc<str>,
}

impl FetchError {
    pub fn new(err: impl fmt::Display) -> Self {
        Self {
            message: err.to_string().into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Loads the value for one key from the source of truth.
#[async_trait]
pub trait Fetcher<K, V>: Send + Sync + 'static {
    async fn fetch(&self, key: &K) -> Result<V, FetchError>;
}

/// Adapter that turns an async closure into a [`Fetcher`].
pub struct FnFetcher<F, K> {
    f: F,
    _key: PhantomData<fn(K)>,
}

pub fn fetch_fn<F, K>(f: F) -> FnFetcher<F, K> {
    FnFetcher { f, _key: PhantomData }
}

#[async_trait]
impl<F, Fut, K, V> Fetcher<K, V> for FnFetcher<F, K>
where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    K: Clone + Send + Sync + 'static,
    V: Send + 'static,
{
    async fn fetch(&self, key: &K) -> Result<V, FetchError> {
        (self.f)(key.clone()).await
    }
}
