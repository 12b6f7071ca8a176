use async_trait::async_trait;
use snippets_cache::{FetchError, Fetcher, Lookup, RevalidatingCache};
use snippets_core::{BlobRef, DailyFragment, FragmentContent};
use snippets_remote::RemoteAccessor;

struct UrlFetcher {
    remote: RemoteAccessor,
}

#[async_trait]
impl Fetcher<BlobRef, String> for UrlFetcher {
    async fn fetch(&self, blob: &BlobRef) -> Result<String, FetchError> {
        self.remote.resolve_blob_url(blob).await.map_err(FetchError::new)
    }
}

/// Everything a view needs to lay out an image fragment.  Width and height
/// are known before the URL resolves so space can be reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub url: Option<String>,
    pub error: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// Resolves blob references to download URLs, caching per reference.
#[derive(Clone)]
pub struct ImageResolver {
    urls: RevalidatingCache<BlobRef, String>,
}

impl ImageResolver {
    pub fn new(remote: RemoteAccessor) -> Self {
        Self {
            urls: RevalidatingCache::new(UrlFetcher { remote }),
        }
    }

    /// `None` for fragments that are not images.
    pub async fn resolve(&self, fragment: &DailyFragment) -> Option<ResolvedImage> {
        let (blob, width, height) = image_parts(fragment)?;
        let lookup = self.urls.get(blob).await;
        Some(resolved(lookup, width, height))
    }

    /// Current state without waiting; `url` and `error` are both `None`
    /// while unresolved.
    pub fn peek(&self, fragment: &DailyFragment) -> Option<ResolvedImage> {
        let (blob, width, height) = image_parts(fragment)?;
        Some(resolved(self.urls.peek(blob), width, height))
    }
}

fn image_parts(fragment: &DailyFragment) -> Option<(&BlobRef, u32, u32)> {
    match &fragment.content {
        FragmentContent::Image { blob_ref, width, height } => Some((blob_ref, *width, *height)),
        _ => None,
    }
}

fn resolved(lookup: Lookup<String>, width: u32, height: u32) -> ResolvedImage {
    let (url, error) = match lookup {
        Lookup::Ready(url) => (Some(url), None),
        Lookup::Failed(err) => (None, Some(err.message().to_string())),
        Lookup::Unresolved | Lookup::Pending => (None, None),
    };
    ResolvedImage {
        url,
        error,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use snippets_core::{FragmentId, Identity};

    use super::*;

    fn image(blob: &BlobRef) -> DailyFragment {
        DailyFragment {
            id: FragmentId::from("img"),
            created_at: DateTime::from_timestamp_micros(1).unwrap(),
            content: FragmentContent::Image {
                blob_ref: blob.clone(),
                width: 640,
                height: 480,
            },
        }
    }

    #[tokio::test]
    async fn resolves_uploaded_images() {
        let remote = RemoteAccessor::in_memory(Identity::new("u1").unwrap());
        let id = FragmentId::from("img");
        let blob = remote.upload_blob(&remote.image_blob_path(&id), vec![1, 2]).await.unwrap();
        let resolver = ImageResolver::new(remote);

        let fragment = image(&blob);
        assert_eq!(
            resolver.peek(&fragment),
            Some(ResolvedImage {
                url: None,
                error: None,
                width: 640,
                height: 480,
            })
        );
        let resolved = resolver.resolve(&fragment).await.unwrap();
        assert_eq!(resolved.url.as_deref(), Some("memory://users/u1/images/img.jpg"));
        assert_eq!(resolved.error, None);
    }

    #[tokio::test]
    async fn missing_blob_reports_an_error_with_dimensions() {
        let remote = RemoteAccessor::in_memory(Identity::new("u1").unwrap());
        let resolver = ImageResolver::new(remote);
        let resolved = resolver
            .resolve(&image(&BlobRef::new("users/u1/images/gone.jpg")))
            .await
            .unwrap();
        assert!(resolved.url.is_none());
        assert!(resolved.error.is_some());
        assert_eq!((resolved.width, resolved.height), (640, 480));
    }

    #[tokio::test]
    async fn text_fragments_are_not_images() {
        let resolver = ImageResolver::new(RemoteAccessor::in_memory(Identity::new("u1").unwrap()));
        let text = DailyFragment {
            id: FragmentId::from("t"),
            created_at: DateTime::from_timestamp_micros(1).unwrap(),
            content: FragmentContent::Text { text: "hi".into() },
        };
        assert!(resolver.resolve(&text).await.is_none());
    }
}
