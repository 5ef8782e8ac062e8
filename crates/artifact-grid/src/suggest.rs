//! Text-completion suggestions mined from matching metadata.

use std::time::Duration;

use moka::sync::Cache;

use crate::api::{GridBackend, QueryRequest};
use crate::config::{GridConfig, Ordering};
use crate::error::Result;
use crate::query::{extract_snippet, CompiledSearch};
use crate::types::ArtifactMetadata;

/// Completion source with a per-search-string cache.
#[derive(Debug, Clone)]
pub struct SuggestionEngine {
    cache: Cache<String, Vec<String>>,
    limit: u32,
    snippet_length: usize,
    orderings: Vec<Ordering>,
}

impl SuggestionEngine {
    pub fn new(config: &GridConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.suggestion_cache_capacity.max(1))
            .time_to_live(Duration::from_secs(config.suggestion_cache_ttl_seconds))
            .build();
        Self {
            cache,
            limit: config.suggestion_limit,
            snippet_length: config.snippet_length,
            orderings: config.orderings.clone(),
        }
    }

    /// Returns completions for `search`, querying the backend on a cache miss.
    pub async fn suggest(&self, backend: &GridBackend, search: &str) -> Result<Vec<String>> {
        let key = search.trim().to_string();
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("suggestion cache hit for {key:?}");
            return Ok(cached);
        }

        let compiled = CompiledSearch::compile(search);
        let fragments = compiled.free_text_fragments();
        if fragments.is_empty() || self.limit == 0 {
            return Ok(Vec::new());
        }

        let response = backend
            .query
            .query(QueryRequest {
                predicates: compiled.queries,
                orderings: self.orderings.clone(),
                results_per_page: self.limit,
                page_num: 0,
            })
            .await?;
        if response.refs.is_empty() {
            self.cache.insert(key, Vec::new());
            return Ok(Vec::new());
        }

        let records = backend.metadata.get(&response.refs).await?;
        let metadata: Vec<ArtifactMetadata> =
            records.into_iter().map(|(_, metadata)| metadata).collect();
        let completions = completions_from_records(&fragments, &metadata, self.snippet_length);

        self.cache.insert(key, completions.clone());
        Ok(completions)
    }

    /// Drops every cached completion, e.g. after metadata changed.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

/// Snippets for every fragment, record and text field, first-seen order.
pub fn completions_from_records(
    fragments: &[String],
    records: &[ArtifactMetadata],
    snippet_length: usize,
) -> Vec<String> {
    let mut completions: Vec<String> = Vec::new();
    for fragment in fragments {
        for record in records {
            for text in record.text_fields().into_iter().flatten() {
                let Some(snippet) = extract_snippet(text, fragment, snippet_length) else {
                    continue;
                };
                if !completions.contains(&snippet) {
                    completions.push(snippet);
                }
            }
        }
    }
    completions
}
