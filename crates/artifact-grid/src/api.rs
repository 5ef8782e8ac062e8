//! Backend boundary: query, fetch, metadata, delete and archive collaborators.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Ordering;
use crate::error::Result;
use crate::query::ArtifactQuery;
use crate::types::{ArtifactMetadata, ArtifactRef, AssetFacet, VideoUrls};

pub use memory::{FailPoint, MemoryBackend};

/// A paginated query against the artifact index.
///
/// `predicates` is a disjunction: an artifact matches if any query matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub predicates: Vec<ArtifactQuery>,
    pub orderings: Vec<Ordering>,
    pub results_per_page: u32,
    pub page_num: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub refs: Vec<ArtifactRef>,
    pub page_num: u32,
    pub is_last_page: bool,
}

/// One entry handed to the archive collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveItem {
    pub artifact: ArtifactRef,
    pub metadata: Option<ArtifactMetadata>,
}

#[async_trait]
pub trait QueryApi: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse>;
}

#[async_trait]
pub trait FetchApi: Send + Sync {
    async fn fetch(&self, artifact: &ArtifactRef, facet: AssetFacet) -> Result<Vec<u8>>;

    /// Directly addressable URLs; `None` for artifacts that are not videos.
    fn video_urls(&self, artifact: &ArtifactRef) -> Option<VideoUrls>;
}

#[async_trait]
pub trait MetadataApi: Send + Sync {
    async fn get(&self, refs: &[ArtifactRef]) -> Result<Vec<(ArtifactRef, ArtifactMetadata)>>;
    async fn update(&self, update: &ArtifactMetadata, refs: &[ArtifactRef]) -> Result<()>;
}

#[async_trait]
pub trait DeleteApi: Send + Sync {
    async fn delete(&self, refs: &[ArtifactRef]) -> Result<()>;
}

/// Streams selected artifacts into a bundle (zip or otherwise).
#[async_trait]
pub trait ArchiveWriter: Send + Sync {
    async fn write_archive(&self, items: Vec<ArchiveItem>) -> Result<()>;
}

/// The set of collaborators the store talks to.
#[derive(Clone)]
pub struct GridBackend {
    pub query: Arc<dyn QueryApi>,
    pub fetch: Arc<dyn FetchApi>,
    pub metadata: Arc<dyn MetadataApi>,
    pub delete: Arc<dyn DeleteApi>,
    pub archive: Arc<dyn ArchiveWriter>,
}

impl GridBackend {
    /// Uses one shared value for every collaborator.
    pub fn from_shared<B>(backend: Arc<B>) -> Self
    where
        B: QueryApi + FetchApi + MetadataApi + DeleteApi + ArchiveWriter + 'static,
    {
        Self {
            query: backend.clone(),
            fetch: backend.clone(),
            metadata: backend.clone(),
            delete: backend.clone(),
            archive: backend,
        }
    }
}

impl std::fmt::Debug for GridBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridBackend").finish_non_exhaustive()
    }
}
