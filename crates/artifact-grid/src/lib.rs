//! State engine for a media-artifact browsing grid.
//!
//! This crate provides:
//! - A search-string compiler producing flattened backend queries, with autocomplete
//! - A normalized artifact store with per-facet loading, pagination and selection
//! - A chunked fetch scheduler bounding in-flight thumbnail requests
//! - Text-completion suggestions mined from matching metadata
//! - A visibility window tracker deciding which items are materialized

pub mod api;
pub mod bus;
pub mod config;
pub mod error;
pub mod generation;
pub mod query;
pub mod resource;
pub mod store;
pub mod suggest;
pub mod types;
pub mod visibility;

// Re-export main types
pub use api::{GridBackend, MemoryBackend};
pub use bus::{Bus, GridEvent};
pub use config::GridConfig;
pub use error::{GridError, Result};
pub use query::{queries_from_search_string, ArtifactQuery, AutocompleteMenu, DateRangeQuery};
pub use resource::{ResourceHandle, ResourceRegistry};
pub use store::{ArtifactEntity, ArtifactStore, FetchSummary, GridState};
pub use suggest::SuggestionEngine;
pub use types::{
    ArtifactKind, ArtifactMetadata, ArtifactRef, AssetFacet, Facet, FrontendId, LoadStatus,
    RequestKind, RequestState,
};
pub use visibility::{VisibilityChange, VisibilityTracker};
