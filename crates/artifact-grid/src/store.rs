//! Normalized artifact store.
//!
//! [`GridState`] holds the entities and applies pure transitions.
//! [`ArtifactStore`] is the command layer on top: it claims work under the
//! state lock, talks to the backend without holding it, folds results back
//! in, releases evicted resources and publishes [`GridEvent`]s.

mod entity;
mod scheduler;
mod state;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{ArchiveItem, GridBackend, QueryRequest};
use crate::bus::{Bus, GridEvent};
use crate::config::GridConfig;
use crate::error::{GridError, Result};
use crate::generation::GenerationToken;
use crate::query::{
    complete_search, complete_token, select_menu, tokenize, ArtifactQuery, AutocompleteMenu,
    CompiledSearch,
};
use crate::resource::ResourceRegistry;
use crate::suggest::SuggestionEngine;
use crate::types::{
    ArtifactKind, ArtifactMetadata, ArtifactRef, AssetFacet, FrontendId, RequestKind,
    RequestState, VideoUrls,
};
use crate::visibility::{VisibilityChange, VisibilityTracker, Viewport};

pub use entity::{ArtifactEntity, FacetSlot, MetadataSlot};
pub use scheduler::{FetchScheduler, FetchSummary};
pub use state::{
    ActiveQuery, AssetClaim, ClearedView, GridState, MergedPage, RequestStates, Suggestions,
};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    state: Arc<Mutex<GridState>>,
    backend: GridBackend,
    resources: Arc<ResourceRegistry>,
    suggestions: SuggestionEngine,
    bus: Bus,
    config: Arc<GridConfig>,
}

impl ArtifactStore {
    pub fn new(backend: GridBackend, config: GridConfig) -> Result<Self> {
        Self::with_resources(backend, config, Arc::new(ResourceRegistry::new()))
    }

    /// Builds a store that registers fetched bytes in a shared registry.
    pub fn with_resources(
        backend: GridBackend,
        config: GridConfig,
        resources: Arc<ResourceRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(Mutex::new(GridState::new())),
            backend,
            resources,
            suggestions: SuggestionEngine::new(&config),
            bus: Bus::new(config.event_bus_capacity),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<GridEvent> {
        self.bus.subscribe()
    }

    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    /// Runs `f` against the current state under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&GridState) -> R) -> R {
        f(&*self.state.lock())
    }

    /// A tracker using the configured buffer ratio.
    pub fn visibility_tracker(&self, viewport: Viewport) -> VisibilityTracker<FrontendId> {
        VisibilityTracker::with_buffer_ratio(viewport, self.config.visibility_buffer_ratio)
    }

    fn emit(&self, event: GridEvent) {
        self.bus.publish(event);
    }

    fn set_request(&self, request: RequestKind, state: RequestState) {
        let changed = self.state.lock().set_request(request, state.clone());
        if changed {
            self.emit(GridEvent::RequestStateChanged { request, state });
        }
    }

    fn fail_request(&self, request: RequestKind, error: &GridError) {
        tracing::warn!("{request:?} request failed: {error}");
        self.set_request(request, RequestState::Failed(error.to_string()));
    }

    // -----------------------------------------------------------------------
    // Registration and queries
    // -----------------------------------------------------------------------

    /// Registers refs directly, returning the ids that were new.
    pub fn register_artifacts(&self, refs: &[ArtifactRef]) -> Vec<FrontendId> {
        let added = self.state.lock().register(refs);
        if !added.is_empty() {
            self.emit(GridEvent::EntitiesAdded { ids: added.clone() });
        }
        added
    }

    /// Runs `queries` from `start_page` (default 0), registering the matches
    /// and loading their metadata.
    pub async fn start_query(
        &self,
        queries: Vec<ArtifactQuery>,
        start_page: Option<u32>,
    ) -> Result<Vec<FrontendId>> {
        let page_num = start_page.unwrap_or(0);
        let token = self.state.lock().begin_query(queries.clone(), page_num);
        tracing::info!(
            "starting query with {} predicates at page {page_num}",
            queries.len()
        );
        self.run_query_page(queries, page_num, token).await
    }

    /// Fetches the next page of the active query. A no-op unless a query is
    /// active, more pages remain and `page_num` is past every stored or
    /// requested page.
    pub async fn continue_query(&self, page_num: u32) -> Result<Vec<FrontendId>> {
        let claimed = self.state.lock().begin_continuation(page_num);
        let Some((queries, token)) = claimed else {
            tracing::debug!("skipping continuation to page {page_num}");
            return Ok(Vec::new());
        };
        self.run_query_page(queries, page_num, token).await
    }

    async fn run_query_page(
        &self,
        queries: Vec<ArtifactQuery>,
        page_num: u32,
        token: GenerationToken,
    ) -> Result<Vec<FrontendId>> {
        self.set_request(RequestKind::Query, RequestState::Loading);
        let request = QueryRequest {
            predicates: queries,
            orderings: self.config.orderings.clone(),
            results_per_page: self.config.results_per_page,
            page_num,
        };

        let response = match self.backend.query.query(request).await {
            Ok(response) => response,
            Err(error) => {
                let current = self.state.lock().fail_query_page(token);
                if current {
                    self.fail_request(RequestKind::Query, &error);
                } else {
                    tracing::warn!("stale query page {page_num} failed: {error}");
                }
                return Err(error);
            }
        };

        let merged = self.state.lock().finish_query_page(token, &response);
        let Some(merged) = merged else {
            tracing::warn!("discarding stale results for query page {page_num}");
            return Ok(Vec::new());
        };
        tracing::info!(
            "query page {} added {} artifacts, more pages: {}",
            merged.page_num,
            merged.added.len(),
            merged.has_more_pages
        );
        if !merged.added.is_empty() {
            self.emit(GridEvent::EntitiesAdded {
                ids: merged.added.clone(),
            });
        }
        self.emit(GridEvent::QueryUpdated {
            page_num: merged.page_num,
            has_more_pages: merged.has_more_pages,
        });

        if let Err(error) = self.load_metadata(&merged.added).await {
            self.fail_request(RequestKind::Query, &error);
            return Err(error);
        }
        self.set_request(RequestKind::Query, RequestState::Succeeded);
        Ok(merged.added)
    }

    /// Clears the view, keeping the active query, and re-runs it from page 0.
    pub async fn refresh(&self) -> Result<Vec<FrontendId>> {
        let Some(queries) = self.active_queries() else {
            tracing::debug!("refresh without an active query");
            return Ok(Vec::new());
        };
        self.clear_view(true);
        self.start_query(queries, None).await
    }

    fn active_queries(&self) -> Option<Vec<ArtifactQuery>> {
        self.state
            .lock()
            .current_query()
            .map(|query| query.queries.clone())
    }

    /// Drops every entity and releases their resources. An in-flight query
    /// request goes back to `Idle`, as its results will be discarded.
    pub fn clear_view(&self, preserve_query: bool) {
        let cleared = self.state.lock().clear_view(preserve_query);
        self.resources.release_all(cleared.handles);
        self.emit(GridEvent::ViewCleared {
            query_preserved: preserve_query,
        });
        if cleared.query_settled {
            self.emit(GridEvent::RequestStateChanged {
                request: RequestKind::Query,
                state: RequestState::Idle,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Facet loading
    // -----------------------------------------------------------------------

    pub async fn load_thumbnails(&self, ids: &[FrontendId], chunk_size: usize) -> FetchSummary {
        self.load_assets(AssetFacet::Thumbnail, ids, chunk_size).await
    }

    pub async fn load_image(&self, id: &FrontendId) -> Result<FetchSummary> {
        if !self.state.lock().contains(id) {
            return Err(GridError::NotFound(id.clone()));
        }
        Ok(self
            .load_assets(AssetFacet::Full, std::slice::from_ref(id), 1)
            .await)
    }

    async fn load_assets(
        &self,
        facet: AssetFacet,
        ids: &[FrontendId],
        chunk_size: usize,
    ) -> FetchSummary {
        let targets = self.state.lock().claim_assets(facet, ids);
        let mut summary = FetchSummary {
            requested: ids.len(),
            skipped: ids.len().saturating_sub(targets.len()),
            ..FetchSummary::default()
        };
        if targets.is_empty() {
            tracing::debug!("all {} {facet:?} requests already satisfied", ids.len());
            return summary;
        }

        let scheduler = FetchScheduler::new(chunk_size);
        scheduler
            .run(self.backend.fetch.as_ref(), facet, targets, |claim, result| {
                match result {
                    Ok(bytes) => {
                        let stored = self.state.lock().finish_asset(facet, &claim, || {
                            self.resources.create(facet.facet(), bytes)
                        });
                        if stored {
                            summary.loaded += 1;
                            self.emit(GridEvent::FacetLoaded {
                                id: claim.id,
                                facet: facet.facet(),
                            });
                        } else {
                            summary.skipped += 1;
                            tracing::warn!(
                                "discarding {facet:?} for {}, claim superseded",
                                claim.id
                            );
                        }
                    }
                    Err(error) => {
                        if !self.state.lock().abort_asset(facet, &claim) {
                            tracing::debug!("ignoring stale {facet:?} failure for {}", claim.id);
                        }
                        summary.failed += 1;
                        tracing::warn!("failed to fetch {facet:?} for {}: {error}", claim.id);
                    }
                }
            })
            .await;
        summary
    }

    /// Loads metadata for every id whose metadata is not loaded or loading.
    pub async fn load_metadata(&self, ids: &[FrontendId]) -> Result<Vec<FrontendId>> {
        let claimed = self.state.lock().claim_metadata(ids);
        if claimed.is_empty() {
            return Ok(Vec::new());
        }
        let (claimed_ids, refs): (Vec<FrontendId>, Vec<ArtifactRef>) =
            claimed.into_iter().unzip();

        let records = match self.backend.metadata.get(&refs).await {
            Ok(records) => records,
            Err(error) => {
                self.state.lock().abort_metadata(&claimed_ids);
                tracing::warn!("failed to load metadata for {} artifacts: {error}", refs.len());
                return Err(error);
            }
        };

        let loaded = self.state.lock().finish_metadata(&claimed_ids, records);
        if !loaded.is_empty() {
            self.emit(GridEvent::MetadataLoaded {
                ids: loaded.clone(),
            });
        }
        Ok(loaded)
    }

    pub fn clear_thumbnails(&self, ids: &[FrontendId]) -> usize {
        self.clear_assets(AssetFacet::Thumbnail, ids)
    }

    pub fn clear_full_sized_images(&self, ids: &[FrontendId]) -> usize {
        self.clear_assets(AssetFacet::Full, ids)
    }

    fn clear_assets(&self, facet: AssetFacet, ids: &[FrontendId]) -> usize {
        let (cleared, handles) = self.state.lock().clear_assets(facet, ids);
        self.resources.release_all(handles);
        if cleared.is_empty() {
            return 0;
        }
        let count = cleared.len();
        self.emit(GridEvent::FacetCleared {
            ids: cleared,
            facet: facet.facet(),
        });
        count
    }

    /// Releases thumbnails that scrolled out and loads the ones that scrolled in.
    pub async fn apply_visibility(&self, change: VisibilityChange<FrontendId>) -> FetchSummary {
        self.clear_thumbnails(&change.exited);
        self.load_thumbnails(&change.entered, self.config.thumbnail_chunk_size)
            .await
    }

    // -----------------------------------------------------------------------
    // Selection and bulk operations
    // -----------------------------------------------------------------------

    pub fn select_all(&self, flag: bool) -> bool {
        self.apply_selection(None, flag)
    }

    pub fn select_images(&self, ids: &[FrontendId], flag: bool) -> bool {
        self.apply_selection(Some(ids), flag)
    }

    fn apply_selection(&self, ids: Option<&[FrontendId]>, flag: bool) -> bool {
        let (changed, selection_count) = {
            let mut state = self.state.lock();
            let changed = state.set_selected(ids, flag);
            (changed, state.selection_count())
        };
        if changed.is_empty() {
            return false;
        }
        self.emit(GridEvent::SelectionChanged {
            ids: changed,
            selected: flag,
            selection_count,
        });
        true
    }

    fn begin_bulk(&self, request: RequestKind) -> Option<Vec<(FrontendId, ArtifactRef)>> {
        let targets = self.state.lock().begin_bulk(request);
        match targets {
            Some(targets) => {
                self.emit(GridEvent::RequestStateChanged {
                    request,
                    state: RequestState::Loading,
                });
                Some(targets)
            }
            None => {
                tracing::debug!("skipping {request:?}: already running or nothing selected");
                None
            }
        }
    }

    /// Archives the selection and deselects it. Returns `false` without
    /// doing anything while a download runs or nothing is selected.
    pub async fn download_selected(&self) -> Result<bool> {
        let Some(targets) = self.begin_bulk(RequestKind::Download) else {
            return Ok(false);
        };
        let items = {
            let state = self.state.lock();
            targets
                .iter()
                .map(|(id, artifact)| ArchiveItem {
                    artifact: artifact.clone(),
                    metadata: state
                        .entity(id)
                        .and_then(|entity| entity.metadata().cloned()),
                })
                .collect::<Vec<_>>()
        };
        let ids: Vec<FrontendId> = targets.into_iter().map(|(id, _)| id).collect();
        self.select_images(&ids, false);

        match self.backend.archive.write_archive(items).await {
            Ok(()) => {
                tracing::info!("archived {} artifacts", ids.len());
                self.set_request(RequestKind::Download, RequestState::Succeeded);
                Ok(true)
            }
            Err(error) => {
                self.fail_request(RequestKind::Download, &error);
                Err(error)
            }
        }
    }

    /// Deletes the selection on the backend, then evicts it locally.
    pub async fn delete_selected(&self) -> Result<Vec<FrontendId>> {
        let Some(targets) = self.begin_bulk(RequestKind::Delete) else {
            return Ok(Vec::new());
        };
        let (ids, refs): (Vec<FrontendId>, Vec<ArtifactRef>) = targets.into_iter().unzip();

        if let Err(error) = self.backend.delete.delete(&refs).await {
            self.fail_request(RequestKind::Delete, &error);
            return Err(error);
        }

        let (removed, handles) = self.state.lock().remove(&ids);
        let released = handles.len();
        self.resources.release_all(handles);
        self.suggestions.invalidate_all();
        tracing::info!(
            "deleted {} artifacts, released {released} resources",
            removed.len()
        );

        if !removed.is_empty() {
            let selection_count = self.state.lock().selection_count();
            self.emit(GridEvent::EntitiesRemoved {
                ids: removed.clone(),
            });
            self.emit(GridEvent::SelectionChanged {
                ids: removed.clone(),
                selected: false,
                selection_count,
            });
        }
        self.set_request(RequestKind::Delete, RequestState::Succeeded);
        Ok(removed)
    }

    pub fn open_edit_dialog(&self) -> bool {
        self.set_edit_dialog(true)
    }

    pub fn close_edit_dialog(&self) -> bool {
        self.set_edit_dialog(false)
    }

    fn set_edit_dialog(&self, open: bool) -> bool {
        let changed = self.state.lock().set_edit_dialog(open);
        if changed {
            self.emit(GridEvent::EditDialogChanged { open });
        }
        changed
    }

    /// Writes `update` to every selected artifact, then rebuilds the view
    /// from the active query and patches the update onto the touched ids.
    pub async fn edit_selected_metadata(
        &self,
        update: ArtifactMetadata,
    ) -> Result<Vec<FrontendId>> {
        let Some(targets) = self.begin_bulk(RequestKind::MetadataEdit) else {
            return Ok(Vec::new());
        };
        let (ids, refs): (Vec<FrontendId>, Vec<ArtifactRef>) = targets.into_iter().unzip();

        if let Err(error) = self.backend.metadata.update(&update, &refs).await {
            self.fail_request(RequestKind::MetadataEdit, &error);
            return Err(error);
        }

        self.close_edit_dialog();
        self.suggestions.invalidate_all();
        let all_ids = self.state.lock().ordered_ids().to_vec();
        self.clear_thumbnails(&all_ids);
        self.clear_full_sized_images(&all_ids);
        // The view is dropped even without a query to rebuild it from.
        self.clear_view(true);
        if let Some(queries) = self.active_queries() {
            if let Err(error) = self.start_query(queries, None).await {
                tracing::warn!("re-running query after metadata edit failed: {error}");
            }
        }

        let patched = self.state.lock().patch_metadata(&ids, &update);
        if !patched.is_empty() {
            self.emit(GridEvent::MetadataLoaded {
                ids: patched.clone(),
            });
        }
        self.set_request(RequestKind::MetadataEdit, RequestState::Succeeded);
        Ok(patched)
    }

    // -----------------------------------------------------------------------
    // Video URLs
    // -----------------------------------------------------------------------

    /// Exposes the direct URLs of a video. A no-op for images.
    pub fn set_video_url(&self, id: &FrontendId) -> bool {
        let artifact = self
            .state
            .lock()
            .entity(id)
            .filter(|entity| entity.kind() == ArtifactKind::Video)
            .map(|entity| entity.backend_ref().clone());
        let Some(urls) = artifact.and_then(|artifact| self.backend.fetch.video_urls(&artifact))
        else {
            return false;
        };
        self.store_video_urls(id, Some(urls))
    }

    pub fn clear_video_url(&self, id: &FrontendId) -> bool {
        self.store_video_urls(id, None)
    }

    fn store_video_urls(&self, id: &FrontendId, urls: Option<VideoUrls>) -> bool {
        let changed = self.state.lock().set_video_urls(id, urls);
        if changed {
            self.emit(GridEvent::VideoUrlChanged { id: id.clone() });
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Search string
    // -----------------------------------------------------------------------

    /// Updates the search string and picks the autocomplete menu for it.
    pub fn set_search_string(&self, search: &str) -> bool {
        let menu = select_menu(&tokenize(search));
        let event = {
            let mut state = self.state.lock();
            let changed = state.set_search(search, menu);
            changed.then(|| search_event(&state))
        };
        match event {
            Some(event) => {
                self.emit(event);
                true
            }
            None => false,
        }
    }

    /// Merges a picked completion into the search string. Directive menus
    /// complete the trailing token; text completions replace the last
    /// free-text fragment.
    pub fn apply_completion(&self, completion: &str) -> bool {
        let (current, menu) = self.read(|state| {
            (
                state.search_string().to_string(),
                state.suggestions().menu,
            )
        });
        let next = match menu {
            AutocompleteMenu::None => complete_search(&current, completion),
            AutocompleteMenu::Date | AutocompleteMenu::Platform => {
                complete_token(&current, completion)
            }
        };
        self.set_search_string(&next)
    }

    /// Recomputes text completions for the current search string.
    pub async fn refresh_suggestions(&self) -> Result<Vec<String>> {
        let search = self.read(|state| state.search_string().to_string());
        let completions = self.suggestions.suggest(&self.backend, &search).await?;

        let event = {
            let mut state = self.state.lock();
            let current = state.search_string() == search;
            (current && state.set_completions(completions.clone())).then(|| search_event(&state))
        };
        if let Some(event) = event {
            self.emit(event);
        }
        Ok(completions)
    }

    /// Compiles the search string, clears the view and starts its query.
    pub async fn submit_search(&self) -> Result<Vec<FrontendId>> {
        let search = self.read(|state| state.search_string().to_string());
        let compiled = CompiledSearch::compile(&search);
        tracing::info!(
            "submitting search {search:?} as {} queries",
            compiled.queries.len()
        );
        self.clear_view(false);
        self.start_query(compiled.queries, None).await
    }
}

fn search_event(state: &GridState) -> GridEvent {
    GridEvent::SearchUpdated {
        search_string: state.search_string().to_string(),
        menu: state.suggestions().menu,
        completions: state.suggestions().completions.clone(),
    }
}
