//! Construction of fragments from raw inputs.
//!
//! Builders either hand back a complete [`DailyFragment`] or an error; the
//! caller appends it to a [`FragmentLog`](crate::FragmentLog) separately, so
//! a failed build never leaves anything half-written in a day.

pub mod geohash;

use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use image::ImageReader;
use snippets_core::{DailyFragment, FragmentContent, FragmentId};
use snippets_remote::RemoteAccessor;
use thiserror::Error;
use tracing::debug;

use crate::error::BuildError;

/// Hands out fragment timestamps: microsecond precision (what the store
/// keeps) and strictly increasing within one clock.
#[derive(Debug, Default)]
pub struct FragmentClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl FragmentClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let mut now = Utc::now().trunc_subsecs(6);
        if let Some(previous) = *last {
            if now <= previous {
                now = previous + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("location unavailable: {reason}")]
pub struct LocationUnavailable {
    pub reason: String,
}

impl LocationUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Source of the device position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationUnavailable>;
}

/// A provider that always reports the same fix, e.g. one given on the
/// command line.
#[async_trait]
impl LocationProvider for Coordinates {
    async fn current_position(&self) -> Result<Coordinates, LocationUnavailable> {
        Ok(*self)
    }
}

pub struct FragmentBuilder {
    remote: RemoteAccessor,
    clock: Arc<FragmentClock>,
    geohash_precision: usize,
}

impl FragmentBuilder {
    pub fn new(remote: RemoteAccessor, clock: Arc<FragmentClock>, geohash_precision: usize) -> Self {
        Self {
            remote,
            clock,
            geohash_precision,
        }
    }

    pub fn text(&self, text: impl Into<String>) -> DailyFragment {
        DailyFragment {
            id: FragmentId::generate(),
            created_at: self.clock.now(),
            content: FragmentContent::Text { text: text.into() },
        }
    }

    /// Decode the dimensions of `bytes`, upload them under the fragment's
    /// id and return the image fragment.  Nothing is uploaded when the
    /// bytes are not an image.
    pub async fn image(&self, bytes: Vec<u8>) -> Result<DailyFragment, BuildError> {
        let created_at = self.clock.now();
        let (width, height) = image_dimensions(&bytes)?;
        let id = FragmentId::generate();
        let path = self.remote.image_blob_path(&id);
        let blob_ref = self
            .remote
            .upload_blob(&path, bytes)
            .await
            .map_err(BuildError::Upload)?;
        debug!(%id, width, height, "image uploaded");
        Ok(DailyFragment {
            id,
            created_at,
            content: FragmentContent::Image {
                blob_ref,
                width,
                height,
            },
        })
    }

    pub async fn location(&self, provider: &dyn LocationProvider) -> Result<DailyFragment, BuildError> {
        let created_at = self.clock.now();
        let Coordinates { latitude, longitude } = provider.current_position().await?;
        let geohash = geohash::encode(latitude, longitude, self.geohash_precision)
            .ok_or_else(|| LocationUnavailable::new(format!("invalid fix ({latitude}, {longitude})")))?;
        Ok(DailyFragment {
            id: FragmentId::generate(),
            created_at,
            content: FragmentContent::Location {
                geohash,
                latitude,
                longitude,
            },
        })
    }
}

/// Width and height from the image header, without decoding pixels.
fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), BuildError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| BuildError::Decode(err.to_string()))?
        .into_dimensions()
        .map_err(|err| BuildError::Decode(err.to_string()))
}
