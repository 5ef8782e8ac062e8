//! Cached artifact entity and its per-facet slots.
//!
//! Each byte facet is a [`FacetSlot`] whose `Loaded` variant owns the
//! resource handle, so a URL exists exactly when the facet is loaded.

use crate::resource::ResourceHandle;
use crate::types::{ArtifactKind, ArtifactMetadata, ArtifactRef, Facet, LoadStatus, VideoUrls};

#[derive(Debug, Default)]
pub enum FacetSlot {
    #[default]
    NotLoaded,
    /// Waiting on the fetch that holds this claim ticket.
    Loading(u64),
    Loaded(ResourceHandle),
}

impl FacetSlot {
    pub fn status(&self) -> LoadStatus {
        match self {
            Self::NotLoaded => LoadStatus::NotLoaded,
            Self::Loading(_) => LoadStatus::Loading,
            Self::Loaded(_) => LoadStatus::Loaded,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Loaded(handle) => Some(handle.url()),
            _ => None,
        }
    }

    /// Resets to `NotLoaded`, yielding the handle if one was held.
    pub(super) fn take_loaded(&mut self) -> Option<ResourceHandle> {
        match std::mem::take(self) {
            Self::Loaded(handle) => Some(handle),
            other => {
                *self = other;
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum MetadataSlot {
    #[default]
    NotLoaded,
    Loading,
    Loaded(ArtifactMetadata),
}

impl MetadataSlot {
    pub fn status(&self) -> LoadStatus {
        match self {
            Self::NotLoaded => LoadStatus::NotLoaded,
            Self::Loading => LoadStatus::Loading,
            Self::Loaded(_) => LoadStatus::Loaded,
        }
    }
}

#[derive(Debug)]
pub struct ArtifactEntity {
    pub(super) backend_ref: ArtifactRef,
    pub(super) thumbnail: FacetSlot,
    pub(super) image: FacetSlot,
    pub(super) metadata: MetadataSlot,
    pub(super) video: Option<VideoUrls>,
    pub(super) is_selected: bool,
}

impl ArtifactEntity {
    pub(super) fn new(backend_ref: ArtifactRef) -> Self {
        Self {
            backend_ref,
            thumbnail: FacetSlot::NotLoaded,
            image: FacetSlot::NotLoaded,
            metadata: MetadataSlot::NotLoaded,
            video: None,
            is_selected: false,
        }
    }

    pub fn backend_ref(&self) -> &ArtifactRef {
        &self.backend_ref
    }

    pub fn kind(&self) -> ArtifactKind {
        self.backend_ref.kind
    }

    pub fn status(&self, facet: Facet) -> LoadStatus {
        match facet {
            Facet::Thumbnail => self.thumbnail.status(),
            Facet::Image => self.image.status(),
            Facet::Metadata => self.metadata.status(),
        }
    }

    pub fn thumbnail_status(&self) -> LoadStatus {
        self.thumbnail.status()
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail.url()
    }

    pub fn image_status(&self) -> LoadStatus {
        self.image.status()
    }

    pub fn artifact_url(&self) -> Option<&str> {
        self.image.url()
    }

    pub fn metadata_status(&self) -> LoadStatus {
        self.metadata.status()
    }

    pub fn metadata(&self) -> Option<&ArtifactMetadata> {
        match &self.metadata {
            MetadataSlot::Loaded(metadata) => Some(metadata),
            _ => None,
        }
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.video.as_ref().map(|urls| urls.preview_url.as_str())
    }

    pub fn streamable_url(&self) -> Option<&str> {
        self.video.as_ref().map(|urls| urls.streamable_url.as_str())
    }

    pub fn is_selected(&self) -> bool {
        self.is_selected
    }

    pub(super) fn slot_mut(&mut self, facet: Facet) -> Option<&mut FacetSlot> {
        match facet {
            Facet::Thumbnail => Some(&mut self.thumbnail),
            Facet::Image => Some(&mut self.image),
            Facet::Metadata => None,
        }
    }

    /// Takes every loaded byte-facet handle, leaving both facets `NotLoaded`.
    pub(super) fn take_handles(&mut self) -> Vec<ResourceHandle> {
        [self.thumbnail.take_loaded(), self.image.take_loaded()]
            .into_iter()
            .flatten()
            .collect()
    }
}
