use crate::fetch::FetchError;

/// What the cache currently knows about a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    /// Never requested.
    Unresolved,
    /// First fetch still in flight; nothing to show yet.
    Pending,
    Ready(V),
    /// The last fetch failed.  Sticks until the key is invalidated.
    Failed(FetchError),
}

impl<V> Lookup<V> {
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> Lookup<U> {
        match self {
            Self::Unresolved => Lookup::Unresolved,
            Self::Pending => Lookup::Pending,
            Self::Ready(v) => Lookup::Ready(f(v)),
            Self::Failed(err) => Lookup::Failed(err),
        }
    }
}

impl<V> From<Result<V, FetchError>> for Lookup<V> {
    fn from(value: Result<V, FetchError>) -> Self {
        match value {
            Ok(v) => Self::Ready(v),
            Err(err) => Self::Failed(err),
        }
    }
}
