use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A calendar day; the collection key of a fragment log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Day(NaiveDate);

impl Day {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today in the local timezone.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for Day {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Self)
    }
}

/// Client-assigned, globally unique fragment id.  Never regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(String);

impl FragmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FragmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage key of an uploaded blob (`users/{identity}/images/{id}.jpg`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Text,
    Image,
    Location,
}

impl FragmentKind {
    pub fn slug(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Location => "location",
        }
    }
}

/// Payload of a fragment, tagged on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FragmentContent {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        blob_ref: BlobRef,
        width: u32,
        height: u32,
    },
    Location {
        geohash: String,
        latitude: f64,
        longitude: f64,
    },
}

impl FragmentContent {
    pub fn kind(&self) -> FragmentKind {
        match self {
            Self::Text { .. } => FragmentKind::Text,
            Self::Image { .. } => FragmentKind::Image,
            Self::Location { .. } => FragmentKind::Location,
        }
    }
}

/// One immutable, timestamped entry of a day's log.
///
/// `createdAt` is stored as integer microseconds since the epoch so the
/// document store can order a collection numerically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFragment {
    pub id: FragmentId,
    #[serde(rename = "createdAt", with = "chrono::serde::ts_microseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub content: FragmentContent,
}

impl DailyFragment {
    pub fn kind(&self) -> FragmentKind {
        self.content.kind()
    }

    pub fn blob_ref(&self) -> Option<&BlobRef> {
        match &self.content {
            FragmentContent::Image { blob_ref, .. } => Some(blob_ref),
            _ => None,
        }
    }
}

/// Ascending `created_at`; equal timestamps keep their input order.
pub fn sort_fragments(fragments: &mut [DailyFragment]) {
    fragments.sort_by_key(|fragment| fragment.created_at);
}
