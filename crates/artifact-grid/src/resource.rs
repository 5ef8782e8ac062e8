//! Resource handles for fetched artifact bytes.
//!
//! A [`ResourceHandle`] stands in for a local object URL: it is created from
//! fetched bytes, owned by exactly one entity facet, and must be handed back
//! to the [`ResourceRegistry`] to be released. Handles are neither `Clone`
//! nor `Copy`, and `release` consumes them, so a handle cannot be released twice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::types::Facet;

const URL_SCHEME: &str = "blob:artifact-grid";

/// Unique owner of a registered byte buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct ResourceHandle {
    id: Uuid,
    url: String,
}

impl ResourceHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug)]
struct RegisteredResource {
    facet: Facet,
    bytes: Arc<[u8]>,
}

/// Registry of live resources with creation and release accounting.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    live: Mutex<HashMap<Uuid, RegisteredResource>>,
    created: AtomicU64,
    released: AtomicU64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` and returns the handle that owns them.
    pub fn create(&self, facet: Facet, bytes: Vec<u8>) -> ResourceHandle {
        let id = Uuid::new_v4();
        let url = format!("{URL_SCHEME}/{id}");
        self.live.lock().insert(
            id,
            RegisteredResource {
                facet,
                bytes: Arc::from(bytes),
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        ResourceHandle { id, url }
    }

    pub fn release(&self, handle: ResourceHandle) {
        if self.live.lock().remove(&handle.id).is_none() {
            tracing::warn!("released unknown resource {}", handle.url);
            return;
        }
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    pub fn release_all(&self, handles: impl IntoIterator<Item = ResourceHandle>) {
        for handle in handles {
            self.release(handle);
        }
    }

    /// Looks up the bytes behind a live resource URL.
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        let id = url
            .strip_prefix(URL_SCHEME)
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|raw| Uuid::parse_str(raw).ok())?;
        self.live.lock().get(&id).map(|resource| resource.bytes.clone())
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn live_count_for(&self, facet: Facet) -> usize {
        self.live
            .lock()
            .values()
            .filter(|resource| resource.facet == facet)
            .count()
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}
