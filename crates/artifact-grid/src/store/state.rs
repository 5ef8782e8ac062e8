//! Synchronous grid state and its transitions.
//!
//! Nothing here performs I/O. Transitions that evict resources hand the
//! handles back so the caller can release them outside the lock.

use std::collections::{HashMap, HashSet};

use super::entity::{ArtifactEntity, FacetSlot, MetadataSlot};
use crate::api::QueryResponse;
use crate::generation::{GenerationToken, ViewGeneration};
use crate::query::{ArtifactQuery, AutocompleteMenu};
use crate::resource::ResourceHandle;
use crate::types::{
    ArtifactKind, ArtifactMetadata, ArtifactRef, AssetFacet, FrontendId, RequestKind,
    RequestState, VideoUrls,
};

// ---------------------------------------------------------------------------
// Query bookkeeping
// ---------------------------------------------------------------------------

/// The query the grid is currently paging through.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveQuery {
    pub queries: Vec<ArtifactQuery>,
    /// Last page merged into the view.
    pub page_num: u32,
    pub has_more_pages: bool,
    /// Highest page handed to the backend, merged or not.
    requested_page: u32,
}

impl ActiveQuery {
    pub fn requested_page(&self) -> u32 {
        self.requested_page
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestStates {
    pub query: RequestState,
    pub download: RequestState,
    pub delete: RequestState,
    pub metadata_edit: RequestState,
}

impl RequestStates {
    pub fn get(&self, kind: RequestKind) -> &RequestState {
        match kind {
            RequestKind::Query => &self.query,
            RequestKind::Download => &self.download,
            RequestKind::Delete => &self.delete,
            RequestKind::MetadataEdit => &self.metadata_edit,
        }
    }

    /// Returns whether the stored state changed.
    pub fn set(&mut self, kind: RequestKind, state: RequestState) -> bool {
        let slot = match kind {
            RequestKind::Query => &mut self.query,
            RequestKind::Download => &mut self.download,
            RequestKind::Delete => &mut self.delete,
            RequestKind::MetadataEdit => &mut self.metadata_edit,
        };
        if *slot == state {
            return false;
        }
        *slot = state;
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suggestions {
    pub menu: AutocompleteMenu,
    pub completions: Vec<String>,
}

/// A pending byte-facet fetch. Only the claim that moved the slot to
/// `Loading` can settle it; a later claim on the same id supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetClaim {
    pub id: FrontendId,
    ticket: u64,
}

/// What a view clear evicted.
#[derive(Debug, Default)]
pub struct ClearedView {
    pub handles: Vec<ResourceHandle>,
    /// Set when an in-flight query request was reset to `Idle`.
    pub query_settled: bool,
}

/// Outcome of delivering a query page.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedPage {
    pub added: Vec<FrontendId>,
    pub page_num: u32,
    pub has_more_pages: bool,
}

// ---------------------------------------------------------------------------
// Grid state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct GridState {
    entities: HashMap<FrontendId, ArtifactEntity>,
    ordered_ids: Vec<FrontendId>,
    current_query: Option<ActiveQuery>,
    selection_count: usize,
    requests: RequestStates,
    search_string: String,
    suggestions: Suggestions,
    edit_dialog_open: bool,
    generation: ViewGeneration,
    last_claim: u64,
}

impl GridState {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Read access -------------------------------------------------------

    pub fn entity(&self, id: &FrontendId) -> Option<&ArtifactEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &FrontendId) -> bool {
        self.entities.contains_key(id)
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = (&FrontendId, &ArtifactEntity)> {
        self.ordered_ids
            .iter()
            .filter_map(|id| self.entities.get(id).map(|entity| (id, entity)))
    }

    pub fn ordered_ids(&self) -> &[FrontendId] {
        &self.ordered_ids
    }

    pub fn len(&self) -> usize {
        self.ordered_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_ids.is_empty()
    }

    pub fn selection_count(&self) -> usize {
        self.selection_count
    }

    pub fn selected_ids(&self) -> Vec<FrontendId> {
        self.entities()
            .filter(|(_, entity)| entity.is_selected)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn current_query(&self) -> Option<&ActiveQuery> {
        self.current_query.as_ref()
    }

    pub fn request(&self, kind: RequestKind) -> &RequestState {
        self.requests.get(kind)
    }

    pub fn requests(&self) -> &RequestStates {
        &self.requests
    }

    pub fn search_string(&self) -> &str {
        &self.search_string
    }

    pub fn suggestions(&self) -> &Suggestions {
        &self.suggestions
    }

    pub fn is_edit_dialog_open(&self) -> bool {
        self.edit_dialog_open
    }

    pub fn generation(&self) -> &ViewGeneration {
        &self.generation
    }

    // -- Registration ------------------------------------------------------

    /// Adds unseen refs in order, returning the ids that were new.
    pub fn register(&mut self, refs: &[ArtifactRef]) -> Vec<FrontendId> {
        let mut added = Vec::new();
        for artifact in refs {
            let id = artifact.frontend_id();
            if self.entities.contains_key(&id) {
                continue;
            }
            self.entities
                .insert(id.clone(), ArtifactEntity::new(artifact.clone()));
            self.ordered_ids.push(id.clone());
            added.push(id);
        }
        added
    }

    /// Removes entities, returning the removed ids and their loaded handles.
    pub fn remove(&mut self, ids: &[FrontendId]) -> (Vec<FrontendId>, Vec<ResourceHandle>) {
        let mut removed = Vec::new();
        let mut handles = Vec::new();
        for id in ids {
            if let Some(mut entity) = self.entities.remove(id) {
                handles.extend(entity.take_handles());
                removed.push(id.clone());
            }
        }
        if !removed.is_empty() {
            let gone: HashSet<&FrontendId> = removed.iter().collect();
            self.ordered_ids.retain(|id| !gone.contains(id));
            self.recount_selection();
        }
        (removed, handles)
    }

    /// Drops every entity and starts a new view generation.
    ///
    /// The active query survives only when `preserve_query` is set. A query
    /// request still loading is reset to `Idle`, since its page will be
    /// discarded.
    pub fn clear_view(&mut self, preserve_query: bool) -> ClearedView {
        let handles = self
            .entities
            .drain()
            .flat_map(|(_, mut entity)| entity.take_handles())
            .collect();
        self.ordered_ids.clear();
        self.selection_count = 0;
        if !preserve_query {
            self.current_query = None;
        }
        self.generation.advance();
        let query_settled = self.requests.query.is_loading()
            && self.requests.set(RequestKind::Query, RequestState::Idle);
        ClearedView {
            handles,
            query_settled,
        }
    }

    // -- Query lifecycle ---------------------------------------------------

    /// Installs a new active query and returns the token its results must carry.
    pub fn begin_query(&mut self, queries: Vec<ArtifactQuery>, start_page: u32) -> GenerationToken {
        self.generation.advance();
        self.current_query = Some(ActiveQuery {
            queries,
            page_num: start_page,
            has_more_pages: false,
            requested_page: start_page,
        });
        self.generation.token()
    }

    /// Claims `page_num` for a continuation, or `None` when the guard rejects it.
    pub fn begin_continuation(
        &mut self,
        page_num: u32,
    ) -> Option<(Vec<ArtifactQuery>, GenerationToken)> {
        let token = self.generation.token();
        let query = self.current_query.as_mut()?;
        if !query.has_more_pages || page_num <= query.page_num || page_num <= query.requested_page
        {
            return None;
        }
        query.requested_page = page_num;
        Some((query.queries.clone(), token))
    }

    /// Merges a delivered page. Returns `None` when the token is stale.
    pub fn finish_query_page(
        &mut self,
        token: GenerationToken,
        response: &QueryResponse,
    ) -> Option<MergedPage> {
        token.is_current(&self.generation)?;
        let added = self.register(&response.refs);
        let query = self.current_query.as_mut()?;
        query.page_num = query.page_num.max(response.page_num);
        query.requested_page = query.requested_page.max(query.page_num);
        query.has_more_pages = !response.is_last_page;
        Some(MergedPage {
            added,
            page_num: query.page_num,
            has_more_pages: query.has_more_pages,
        })
    }

    /// Rolls back a failed page request. Returns `false` when the token is stale.
    pub fn fail_query_page(&mut self, token: GenerationToken) -> bool {
        if token.is_current(&self.generation).is_none() {
            return false;
        }
        if let Some(query) = self.current_query.as_mut() {
            query.requested_page = query.page_num;
        }
        true
    }

    // -- Byte facets -------------------------------------------------------

    /// Marks every present, unloaded id as `Loading` and returns what to fetch.
    pub fn claim_assets(
        &mut self,
        facet: AssetFacet,
        ids: &[FrontendId],
    ) -> Vec<(AssetClaim, ArtifactRef)> {
        let mut claimed = Vec::new();
        for id in ids {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let artifact = entity.backend_ref.clone();
            let Some(slot) = entity.slot_mut(facet.facet()) else {
                continue;
            };
            if matches!(slot, FacetSlot::NotLoaded) {
                self.last_claim += 1;
                *slot = FacetSlot::Loading(self.last_claim);
                let claim = AssetClaim {
                    id: id.clone(),
                    ticket: self.last_claim,
                };
                claimed.push((claim, artifact));
            }
        }
        claimed
    }

    /// Stores a fetched facet if the slot is still waiting on this claim.
    ///
    /// `create` runs only when the result is accepted, so discarded results
    /// never allocate a handle.
    pub fn finish_asset<F>(&mut self, facet: AssetFacet, claim: &AssetClaim, create: F) -> bool
    where
        F: FnOnce() -> ResourceHandle,
    {
        let Some(slot) = self.claimed_slot(facet, claim) else {
            return false;
        };
        *slot = FacetSlot::Loaded(create());
        true
    }

    /// Returns a failed facet to `NotLoaded` so it can be retried. Ignored
    /// when a newer claim owns the slot.
    pub fn abort_asset(&mut self, facet: AssetFacet, claim: &AssetClaim) -> bool {
        let Some(slot) = self.claimed_slot(facet, claim) else {
            return false;
        };
        *slot = FacetSlot::NotLoaded;
        true
    }

    /// Resets loaded facets, returning the affected ids and evicted handles.
    pub fn clear_assets(
        &mut self,
        facet: AssetFacet,
        ids: &[FrontendId],
    ) -> (Vec<FrontendId>, Vec<ResourceHandle>) {
        let mut cleared = Vec::new();
        let mut handles = Vec::new();
        for id in ids {
            let handle = self
                .entities
                .get_mut(id)
                .and_then(|entity| entity.slot_mut(facet.facet()))
                .and_then(FacetSlot::take_loaded);
            if let Some(handle) = handle {
                cleared.push(id.clone());
                handles.push(handle);
            }
        }
        (cleared, handles)
    }

    fn claimed_slot(&mut self, facet: AssetFacet, claim: &AssetClaim) -> Option<&mut FacetSlot> {
        self.entities
            .get_mut(&claim.id)
            .and_then(|entity| entity.slot_mut(facet.facet()))
            .filter(|slot| matches!(slot, FacetSlot::Loading(ticket) if *ticket == claim.ticket))
    }

    // -- Metadata ----------------------------------------------------------

    pub fn claim_metadata(&mut self, ids: &[FrontendId]) -> Vec<(FrontendId, ArtifactRef)> {
        let mut claimed = Vec::new();
        for id in ids {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            if matches!(entity.metadata, MetadataSlot::NotLoaded) {
                entity.metadata = MetadataSlot::Loading;
                claimed.push((id.clone(), entity.backend_ref.clone()));
            }
        }
        claimed
    }

    /// Stores fetched records. Claimed ids the backend did not return go
    /// back to `NotLoaded`.
    pub fn finish_metadata(
        &mut self,
        claimed: &[FrontendId],
        records: Vec<(ArtifactRef, ArtifactMetadata)>,
    ) -> Vec<FrontendId> {
        let mut loaded = Vec::new();
        for (artifact, metadata) in records {
            let id = artifact.frontend_id();
            if let Some(entity) = self.entities.get_mut(&id) {
                if matches!(entity.metadata, MetadataSlot::Loading) {
                    entity.metadata = MetadataSlot::Loaded(metadata);
                    loaded.push(id);
                }
            }
        }
        self.abort_metadata(claimed);
        loaded
    }

    pub fn abort_metadata(&mut self, ids: &[FrontendId]) {
        for id in ids {
            if let Some(entity) = self.entities.get_mut(id) {
                if matches!(entity.metadata, MetadataSlot::Loading) {
                    entity.metadata = MetadataSlot::NotLoaded;
                }
            }
        }
    }

    /// Overlays `update` onto loaded metadata of the given ids.
    pub fn patch_metadata(
        &mut self,
        ids: &[FrontendId],
        update: &ArtifactMetadata,
    ) -> Vec<FrontendId> {
        let mut patched = Vec::new();
        for id in ids {
            if let Some(entity) = self.entities.get_mut(id) {
                if let MetadataSlot::Loaded(metadata) = &mut entity.metadata {
                    metadata.apply(update);
                    patched.push(id.clone());
                }
            }
        }
        patched
    }

    // -- Selection ---------------------------------------------------------

    /// Sets `is_selected` on the given ids, or on every entity for `None`.
    /// Returns only the ids whose flag actually changed.
    pub fn set_selected(&mut self, ids: Option<&[FrontendId]>, flag: bool) -> Vec<FrontendId> {
        let targets: Vec<FrontendId> = match ids {
            Some(ids) => ids.to_vec(),
            None => self.ordered_ids.clone(),
        };
        let mut changed = Vec::new();
        for id in targets {
            if let Some(entity) = self.entities.get_mut(&id) {
                if entity.is_selected != flag {
                    entity.is_selected = flag;
                    changed.push(id);
                }
            }
        }
        if !changed.is_empty() {
            self.recount_selection();
        }
        changed
    }

    fn recount_selection(&mut self) {
        self.selection_count = self
            .entities
            .values()
            .filter(|entity| entity.is_selected)
            .count();
    }

    // -- Requests, video, search, dialog -----------------------------------

    pub fn set_request(&mut self, kind: RequestKind, state: RequestState) -> bool {
        self.requests.set(kind, state)
    }

    /// Marks a bulk request `Loading` and returns the selected entities it
    /// covers. `None` while the request is already running or nothing is
    /// selected.
    pub fn begin_bulk(&mut self, kind: RequestKind) -> Option<Vec<(FrontendId, ArtifactRef)>> {
        if self.requests.get(kind).is_loading() {
            return None;
        }
        let targets: Vec<(FrontendId, ArtifactRef)> = self
            .entities()
            .filter(|(_, entity)| entity.is_selected)
            .map(|(id, entity)| (id.clone(), entity.backend_ref.clone()))
            .collect();
        if targets.is_empty() {
            return None;
        }
        self.requests.set(kind, RequestState::Loading);
        Some(targets)
    }

    /// Sets or clears the video URLs of a video entity. Returns whether
    /// anything changed.
    pub fn set_video_urls(&mut self, id: &FrontendId, urls: Option<VideoUrls>) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        if entity.kind() != ArtifactKind::Video || entity.video == urls {
            return false;
        }
        entity.video = urls;
        true
    }

    /// Updates the search string and menu, dropping completions computed
    /// for an older string.
    pub fn set_search(&mut self, search: &str, menu: AutocompleteMenu) -> bool {
        if self.search_string == search && self.suggestions.menu == menu {
            return false;
        }
        if self.search_string != search {
            self.suggestions.completions.clear();
        }
        self.search_string = search.to_string();
        self.suggestions.menu = menu;
        true
    }

    pub fn set_completions(&mut self, completions: Vec<String>) -> bool {
        if self.suggestions.completions == completions {
            return false;
        }
        self.suggestions.completions = completions;
        true
    }

    pub fn set_edit_dialog(&mut self, open: bool) -> bool {
        if self.edit_dialog_open == open {
            return false;
        }
        self.edit_dialog_open = open;
        true
    }
}
