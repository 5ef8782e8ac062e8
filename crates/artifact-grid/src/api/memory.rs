//! In-memory backend implementing every collaborator trait.
//!
//! Keeps artifacts in insertion order and counts calls per operation, which
//! makes it suitable for tests and offline demos. Individual operations can
//! be made to fail, and fetches can be held behind a semaphore gate.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{
    ArchiveItem, ArchiveWriter, DeleteApi, FetchApi, MetadataApi, QueryApi, QueryRequest,
    QueryResponse,
};
use crate::error::{GridError, Result};
use crate::types::{ArtifactKind, ArtifactMetadata, ArtifactRef, AssetFacet, VideoUrls};

/// Operation that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Query,
    Fetch,
    MetadataGet,
    MetadataUpdate,
    Delete,
    Archive,
}

#[derive(Debug, Default)]
struct CallCounters {
    query: AtomicUsize,
    thumbnail_fetch: AtomicUsize,
    full_fetch: AtomicUsize,
    metadata_get: AtomicUsize,
    metadata_update: AtomicUsize,
    delete: AtomicUsize,
    archive: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    artifacts: Mutex<Vec<(ArtifactRef, ArtifactMetadata)>>,
    failures: Mutex<HashSet<FailPoint>>,
    archives: Mutex<Vec<Vec<ArchiveItem>>>,
    fetch_gate: Mutex<Option<Arc<Semaphore>>>,
    calls: CallCounters,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifacts(
        artifacts: impl IntoIterator<Item = (ArtifactRef, ArtifactMetadata)>,
    ) -> Self {
        let backend = Self::new();
        backend.artifacts.lock().extend(artifacts);
        backend
    }

    pub fn insert(&self, artifact: ArtifactRef, metadata: ArtifactMetadata) {
        self.artifacts.lock().push((artifact, metadata));
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }

    pub fn metadata_of(&self, artifact: &ArtifactRef) -> Option<ArtifactMetadata> {
        self.artifacts
            .lock()
            .iter()
            .find(|(candidate, _)| candidate == artifact)
            .map(|(_, metadata)| metadata.clone())
    }

    pub fn fail(&self, point: FailPoint) {
        self.failures.lock().insert(point);
    }

    pub fn recover(&self, point: FailPoint) {
        self.failures.lock().remove(&point);
    }

    /// Holds every subsequent fetch until the gate hands out a permit.
    pub fn gate_fetches(&self, gate: Arc<Semaphore>) {
        *self.fetch_gate.lock() = Some(gate);
    }

    pub fn archives(&self) -> Vec<Vec<ArchiveItem>> {
        self.archives.lock().clone()
    }

    pub fn query_calls(&self) -> usize {
        self.calls.query.load(AtomicOrdering::SeqCst)
    }

    pub fn fetch_calls(&self, facet: AssetFacet) -> usize {
        match facet {
            AssetFacet::Thumbnail => self.calls.thumbnail_fetch.load(AtomicOrdering::SeqCst),
            AssetFacet::Full => self.calls.full_fetch.load(AtomicOrdering::SeqCst),
        }
    }

    pub fn metadata_get_calls(&self) -> usize {
        self.calls.metadata_get.load(AtomicOrdering::SeqCst)
    }

    pub fn metadata_update_calls(&self) -> usize {
        self.calls.metadata_update.load(AtomicOrdering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.calls.delete.load(AtomicOrdering::SeqCst)
    }

    pub fn archive_calls(&self) -> usize {
        self.calls.archive.load(AtomicOrdering::SeqCst)
    }

    /// Highest number of fetches observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(AtomicOrdering::SeqCst)
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.failures.lock().contains(&point) {
            return Err(GridError::backend(format!("{point:?} unavailable")));
        }
        Ok(())
    }

    fn contains(&self, artifact: &ArtifactRef) -> bool {
        self.artifacts
            .lock()
            .iter()
            .any(|(candidate, _)| candidate == artifact)
    }
}

#[async_trait]
impl QueryApi for MemoryBackend {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.calls.query.fetch_add(1, AtomicOrdering::SeqCst);
        self.check(FailPoint::Query)?;
        if request.results_per_page == 0 {
            return Err(GridError::InvalidInput(
                "results_per_page must be positive".to_string(),
            ));
        }

        let matches = self
            .artifacts
            .lock()
            .iter()
            .filter(|(_, metadata)| {
                request.predicates.is_empty()
                    || request
                        .predicates
                        .iter()
                        .any(|predicate| predicate.matches(metadata))
            })
            .map(|(artifact, _)| artifact.clone())
            .collect::<Vec<_>>();

        let per_page = request.results_per_page as usize;
        let start = (request.page_num as usize).saturating_mul(per_page);
        let end = start.saturating_add(per_page).min(matches.len());
        let refs = if start < matches.len() {
            matches[start..end].to_vec()
        } else {
            Vec::new()
        };

        Ok(QueryResponse {
            refs,
            page_num: request.page_num,
            is_last_page: end >= matches.len(),
        })
    }
}

#[async_trait]
impl FetchApi for MemoryBackend {
    async fn fetch(&self, artifact: &ArtifactRef, facet: AssetFacet) -> Result<Vec<u8>> {
        match facet {
            AssetFacet::Thumbnail => {
                self.calls.thumbnail_fetch.fetch_add(1, AtomicOrdering::SeqCst)
            }
            AssetFacet::Full => self.calls.full_fetch.fetch_add(1, AtomicOrdering::SeqCst),
        };

        let running = self.in_flight.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, AtomicOrdering::SeqCst);

        let gate = self.fetch_gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);

        self.check(FailPoint::Fetch)?;
        if !self.contains(artifact) {
            return Err(GridError::backend(format!(
                "no such artifact {}/{}",
                artifact.bucket, artifact.name
            )));
        }
        Ok(format!("{facet:?}:{}/{}", artifact.bucket, artifact.name).into_bytes())
    }

    fn video_urls(&self, artifact: &ArtifactRef) -> Option<VideoUrls> {
        if artifact.kind != ArtifactKind::Video {
            return None;
        }
        let base = format!(
            "memory://{}/{}",
            urlencoding::encode(&artifact.bucket),
            urlencoding::encode(&artifact.name)
        );
        Some(VideoUrls {
            preview_url: format!("{base}/preview"),
            streamable_url: format!("{base}/stream"),
        })
    }
}

#[async_trait]
impl MetadataApi for MemoryBackend {
    async fn get(&self, refs: &[ArtifactRef]) -> Result<Vec<(ArtifactRef, ArtifactMetadata)>> {
        self.calls.metadata_get.fetch_add(1, AtomicOrdering::SeqCst);
        self.check(FailPoint::MetadataGet)?;
        let artifacts = self.artifacts.lock();
        Ok(refs
            .iter()
            .filter_map(|wanted| {
                artifacts
                    .iter()
                    .find(|(candidate, _)| candidate == wanted)
                    .cloned()
            })
            .collect())
    }

    async fn update(&self, update: &ArtifactMetadata, refs: &[ArtifactRef]) -> Result<()> {
        self.calls.metadata_update.fetch_add(1, AtomicOrdering::SeqCst);
        self.check(FailPoint::MetadataUpdate)?;
        let mut artifacts = self.artifacts.lock();
        for (candidate, metadata) in artifacts.iter_mut() {
            if refs.contains(candidate) {
                metadata.apply(update);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DeleteApi for MemoryBackend {
    async fn delete(&self, refs: &[ArtifactRef]) -> Result<()> {
        self.calls.delete.fetch_add(1, AtomicOrdering::SeqCst);
        self.check(FailPoint::Delete)?;
        self.artifacts
            .lock()
            .retain(|(candidate, _)| !refs.contains(candidate));
        Ok(())
    }
}

#[async_trait]
impl ArchiveWriter for MemoryBackend {
    async fn write_archive(&self, items: Vec<ArchiveItem>) -> Result<()> {
        self.calls.archive.fetch_add(1, AtomicOrdering::SeqCst);
        self.check(FailPoint::Archive)?;
        self.archives.lock().push(items);
        Ok(())
    }
}
