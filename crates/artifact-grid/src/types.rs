//! Core identity and status types shared by the compiler and the store.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Media kind of a backend artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArtifactKind {
    Image,
    Video,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// Backend identity of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub bucket: String,
    pub name: String,
    pub kind: ArtifactKind,
}

impl ArtifactRef {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn image(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(bucket, name, ArtifactKind::Image)
    }

    pub fn video(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(bucket, name, ArtifactKind::Video)
    }

    pub fn frontend_id(&self) -> FrontendId {
        FrontendId::from_ref(self)
    }
}

/// Cache key derived from an [`ArtifactRef`].
///
/// Bucket and name are percent-encoded so the `:` separators can never
/// appear inside a component, which keeps the mapping injective.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrontendId(String);

impl FrontendId {
    pub fn from_ref(artifact: &ArtifactRef) -> Self {
        Self(format!(
            "{}:{}:{}",
            artifact.kind.as_str(),
            urlencoding::encode(&artifact.bucket),
            urlencoding::encode(&artifact.name)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrontendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ArtifactRef> for FrontendId {
    fn from(artifact: &ArtifactRef) -> Self {
        Self::from_ref(artifact)
    }
}

/// Loading status of a single entity facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStatus {
    NotLoaded,
    Loading,
    Loaded,
}

/// Independently tracked facet of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Thumbnail,
    Image,
    Metadata,
}

/// Byte facet requested from the fetch API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFacet {
    Thumbnail,
    Full,
}

impl AssetFacet {
    pub fn facet(self) -> Facet {
        match self {
            Self::Thumbnail => Facet::Thumbnail,
            Self::Full => Facet::Image,
        }
    }
}

/// Directly addressable URLs exposed for video artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoUrls {
    pub preview_url: String,
    pub streamable_url: String,
}

/// Structured metadata record attached to an artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ArtifactMetadata {
    /// Overlays every populated field of `update` onto this record.
    pub fn apply(&mut self, update: &ArtifactMetadata) {
        fn overlay<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if let Some(value) = source {
                *target = Some(value.clone());
            }
        }

        overlay(&mut self.name, &update.name);
        overlay(&mut self.notes, &update.notes);
        overlay(&mut self.camera, &update.camera);
        overlay(&mut self.session, &update.session);
        overlay(&mut self.platform, &update.platform);
        overlay(&mut self.capture_date, &update.capture_date);
        for (key, value) in &update.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Textual fields in suggestion priority order.
    pub fn text_fields(&self) -> [Option<&str>; 4] {
        [
            self.name.as_deref(),
            self.notes.as_deref(),
            self.camera.as_deref(),
            self.session.as_deref(),
        ]
    }
}

/// Bulk operation tracked by a [`RequestState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Query,
    Download,
    Delete,
    MetadataEdit,
}

/// Lifecycle of a request local to one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed(String),
}

impl RequestState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}
