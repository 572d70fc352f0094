use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier assigned to a review by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ReviewId(String);

impl ReviewId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReviewId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// Stores hand out either text (uuid) or integer (serial) keys.
impl<'de> Deserialize<'de> for ReviewId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => ReviewId(s),
            RawId::Number(n) => ReviewId(n.to_string()),
        })
    }
}

/// WGS84 coordinates in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A user-submitted map pin
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: ReviewId,
    pub location: LatLng,
    pub text: String,
    /// Path inside the blob store, resolved to a URL only when displayed
    pub photo_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub likes: u64,
}

/// Review row as returned by the remote store
#[derive(Debug, Clone, Deserialize)]
pub struct StoredReview {
    pub id: ReviewId,
    pub text: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: Vec<LikeAggregate>,
}

/// One entry of the embedded `likes` relation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LikeAggregate {
    #[serde(default)]
    pub count: Option<u64>,
}

impl StoredReview {
    /// Entries carrying a `count` contribute it; bare rows count as one
    pub fn like_count(&self) -> u64 {
        self.likes.iter().map(|l| l.count.unwrap_or(1)).sum()
    }

    pub fn into_review(self) -> Review {
        let likes = self.like_count();
        Review {
            id: self.id,
            location: LatLng::new(self.latitude, self.longitude),
            text: self.text,
            photo_path: self.photo_url,
            created_at: self.created_at,
            likes,
        }
    }
}

/// Insert payload for a review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReview {
    pub text: String,
    pub photo_url: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Insert payload for a like
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLike {
    pub review_id: ReviewId,
}

const MAX_EXTENSION_LEN: usize = 8;

/// Photo attached to a submission
#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// File extension for the stored blob name.
    ///
    /// The name's extension is used only when it is short ASCII alphanumeric,
    /// since it ends up unencoded in the object path and public URL.
    pub fn extension(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((stem, ext))
                if !stem.is_empty()
                    && (1..=MAX_EXTENSION_LEN).contains(&ext.len())
                    && ext.bytes().all(|b| b.is_ascii_alphanumeric()) =>
            {
                ext.to_ascii_lowercase()
            }
            _ => match self.content_type.to_ascii_lowercase().as_str() {
                "image/jpeg" => "jpg".to_string(),
                "image/png" => "png".to_string(),
                "image/gif" => "gif".to_string(),
                "image/webp" => "webp".to_string(),
                _ => "bin".to_string(),
            },
        }
    }
}

/// Order of list projections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Newest,
    MostLiked,
}

impl FromStr for SortMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" | "date" => Ok(SortMode::Newest),
            "most_liked" | "most-liked" | "rating" => Ok(SortMode::MostLiked),
            other => anyhow::bail!("Unknown sort mode: {}", other),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortMode::Newest => f.write_str("newest"),
            SortMode::MostLiked => f.write_str("most_liked"),
        }
    }
}
