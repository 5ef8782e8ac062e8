use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

pub const DEFAULT_RESULTS_PER_PAGE: u32 = 50;
pub const DEFAULT_THUMBNAIL_CHUNK_SIZE: usize = 10;
pub const DEFAULT_VISIBILITY_BUFFER_RATIO: f64 = 0.5;

/// Sort direction for a backend ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A single ordering clause sent with every query request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ordering {
    pub field: String,
    pub direction: SortDirection,
}

/// Tunables for the grid engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub results_per_page: u32,
    pub thumbnail_chunk_size: usize,
    /// Number of query matches mined for text completions.
    pub suggestion_limit: u32,
    /// Target character length of a completion snippet.
    pub snippet_length: usize,
    pub suggestion_cache_capacity: u64,
    pub suggestion_cache_ttl_seconds: u64,
    /// Fraction of the viewport extent added to both ends of the visibility test.
    pub visibility_buffer_ratio: f64,
    pub event_bus_capacity: usize,
    pub orderings: Vec<Ordering>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            results_per_page: DEFAULT_RESULTS_PER_PAGE,
            thumbnail_chunk_size: DEFAULT_THUMBNAIL_CHUNK_SIZE,
            suggestion_limit: 10,
            snippet_length: 40,
            suggestion_cache_capacity: 64,
            suggestion_cache_ttl_seconds: 300,
            visibility_buffer_ratio: DEFAULT_VISIBILITY_BUFFER_RATIO,
            event_bus_capacity: 256,
            orderings: vec![Ordering {
                field: "captureDate".to_string(),
                direction: SortDirection::Desc,
            }],
        }
    }
}

impl GridConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.results_per_page == 0 {
            return Err(GridError::Config(
                "results_per_page must be positive".to_string(),
            ));
        }
        if self.thumbnail_chunk_size == 0 {
            return Err(GridError::Config(
                "thumbnail_chunk_size must be positive".to_string(),
            ));
        }
        if self.snippet_length == 0 {
            return Err(GridError::Config(
                "snippet_length must be positive".to_string(),
            ));
        }
        if !self.visibility_buffer_ratio.is_finite() || self.visibility_buffer_ratio < 0.0 {
            return Err(GridError::Config(format!(
                "visibility_buffer_ratio must be a non-negative number, got {}",
                self.visibility_buffer_ratio
            )));
        }
        if self.event_bus_capacity == 0 {
            return Err(GridError::Config(
                "event_bus_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
