//! Chunked facet fetching.
//!
//! Targets are fetched in fixed-size chunks; the fetches of one chunk run
//! concurrently and the next chunk starts only after all of them settle.

use futures_util::future::join_all;
use serde::Serialize;

use crate::api::FetchApi;
use crate::error::Result;
use crate::types::{ArtifactRef, AssetFacet, FrontendId};

/// Tally of one facet load call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    /// Ids passed in by the caller.
    pub requested: usize,
    /// Fetches whose bytes were stored on the entity.
    pub loaded: usize,
    pub failed: usize,
    /// Ids already loading or loaded, missing, or whose result was discarded.
    pub skipped: usize,
}

impl FetchSummary {
    pub fn is_noop(&self) -> bool {
        self.loaded == 0 && self.failed == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FetchScheduler {
    chunk_size: usize,
}

impl FetchScheduler {
    /// A zero chunk size is treated as one.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fetches `targets` chunk by chunk, handing every result to `settle` in
    /// target order once its chunk has finished. `K` identifies the target
    /// to the caller, usually its claim.
    pub async fn run<K, F>(
        &self,
        fetch: &dyn FetchApi,
        facet: AssetFacet,
        targets: Vec<(K, ArtifactRef)>,
        mut settle: F,
    ) where
        K: Clone,
        F: FnMut(K, Result<Vec<u8>>),
    {
        for chunk in targets.chunks(self.chunk_size) {
            let results = join_all(
                chunk
                    .iter()
                    .map(|(_, artifact)| fetch.fetch(artifact, facet)),
            )
            .await;
            for ((id, _), result) in chunk.iter().zip(results) {
                settle(id.clone(), result);
            }
        }
    }
}
