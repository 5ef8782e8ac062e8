use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::broadcast::Receiver;
use tokio::sync::{Notify, Semaphore};

use super::*;
use crate::api::{FailPoint, MemoryBackend, QueryApi, QueryResponse};
use crate::query::queries_from_search_string;
use crate::types::{Facet, LoadStatus};

fn artifacts(count: usize) -> Vec<(ArtifactRef, ArtifactMetadata)> {
    (0..count)
        .map(|index| {
            (
                ArtifactRef::image("dives", format!("shot-{index}.jpg")),
                ArtifactMetadata {
                    name: Some(format!("shot {index}")),
                    notes: Some(if index % 2 == 0 { "reef" } else { "wreck" }.to_string()),
                    capture_date: NaiveDate::from_ymd_opt(2022, 3, index as u32 + 1),
                    ..Default::default()
                },
            )
        })
        .collect()
}

fn setup_with(count: usize, config: GridConfig) -> (Arc<MemoryBackend>, ArtifactStore) {
    let memory = Arc::new(MemoryBackend::with_artifacts(artifacts(count)));
    let store =
        ArtifactStore::new(GridBackend::from_shared(memory.clone()), config).expect("store");
    (memory, store)
}

fn setup(count: usize) -> (Arc<MemoryBackend>, ArtifactStore) {
    setup_with(count, GridConfig::default())
}

/// Registers every backend artifact directly and returns their ids.
fn register_all(memory: &MemoryBackend, store: &ArtifactStore) -> Vec<FrontendId> {
    let refs: Vec<ArtifactRef> = (0..memory.len())
        .map(|index| ArtifactRef::image("dives", format!("shot-{index}.jpg")))
        .collect();
    store.register_artifacts(&refs)
}

/// Query backend that suspends once before answering, so a caller can act
/// while the page is in flight.
struct YieldingQuery(Arc<MemoryBackend>);

#[async_trait]
impl QueryApi for YieldingQuery {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        tokio::task::yield_now().await;
        self.0.query(request).await
    }
}

fn drain(rx: &mut Receiver<GridEvent>) -> Vec<GridEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn assert_urls_match_status(store: &ArtifactStore) {
    store.read(|state| {
        for (id, entity) in state.entities() {
            assert_eq!(
                entity.thumbnail_url().is_some(),
                entity.thumbnail_status() == LoadStatus::Loaded,
                "thumbnail of {id}"
            );
            assert_eq!(
                entity.artifact_url().is_some(),
                entity.image_status() == LoadStatus::Loaded,
                "image of {id}"
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_query_registers_and_loads_metadata() {
    let config = GridConfig {
        results_per_page: 2,
        ..GridConfig::default()
    };
    let (memory, store) = setup_with(5, config);

    let added = store.start_query(Vec::new(), None).await.expect("query");
    assert_eq!(added.len(), 2);
    assert_eq!(memory.query_calls(), 1);
    assert_eq!(memory.metadata_get_calls(), 1);

    store.read(|state| {
        assert_eq!(state.ordered_ids(), added.as_slice());
        assert!(state
            .entities()
            .all(|(_, entity)| entity.metadata_status() == LoadStatus::Loaded));
        let query = state.current_query().expect("active query");
        assert_eq!(query.page_num, 0);
        assert!(query.has_more_pages);
        assert_eq!(state.request(RequestKind::Query), &RequestState::Succeeded);
    });
}

#[tokio::test]
async fn continue_query_is_guarded() {
    let config = GridConfig {
        results_per_page: 2,
        ..GridConfig::default()
    };
    let (memory, store) = setup_with(5, config);

    assert!(store.continue_query(1).await.expect("no query").is_empty());
    assert_eq!(memory.query_calls(), 0);

    store.start_query(Vec::new(), None).await.expect("page 0");
    assert_eq!(store.continue_query(1).await.expect("page 1").len(), 2);
    assert!(store.continue_query(1).await.expect("repeat").is_empty());
    assert!(store.continue_query(0).await.expect("behind").is_empty());
    assert_eq!(store.continue_query(2).await.expect("page 2").len(), 1);
    assert!(store.continue_query(3).await.expect("exhausted").is_empty());

    assert_eq!(memory.query_calls(), 3);
    assert_eq!(store.read(GridState::len), 5);
    assert!(!store.read(|state| state.current_query().expect("query").has_more_pages));
}

#[tokio::test]
async fn query_failure_marks_request_failed() {
    let (memory, store) = setup(3);
    memory.fail(FailPoint::Query);

    assert!(store.start_query(Vec::new(), None).await.is_err());
    store.read(|state| {
        assert!(state.is_empty());
        assert!(matches!(
            state.request(RequestKind::Query),
            RequestState::Failed(_)
        ));
    });

    memory.recover(FailPoint::Query);
    assert_eq!(store.refresh().await.expect("retry").len(), 3);
    assert_eq!(
        store.read(|state| state.request(RequestKind::Query).clone()),
        RequestState::Succeeded
    );
}

#[tokio::test]
async fn search_submission_runs_compiled_queries() {
    let (memory, store) = setup(5);

    assert!(store.set_search_string("reef"));
    assert!(!store.set_search_string("reef"));
    let added = store.submit_search().await.expect("search");

    // Even-numbered shots carry "reef" in their notes.
    assert_eq!(added.len(), 3);
    assert_eq!(memory.query_calls(), 1);
    assert_eq!(
        store.read(|state| state.current_query().map(|query| query.queries.clone())),
        Some(queries_from_search_string("reef"))
    );
}

#[tokio::test]
async fn date_directive_narrows_search() {
    let (_, store) = setup(5);

    store.set_search_string("before:2022-03-02 reef");
    let added = store.submit_search().await.expect("search");

    // Only shot 0 is both before March 2nd and a reef shot.
    assert_eq!(
        added,
        vec![ArtifactRef::image("dives", "shot-0.jpg").frontend_id()]
    );
}

#[tokio::test]
async fn clearing_view_settles_in_flight_query() {
    let memory = Arc::new(MemoryBackend::with_artifacts(artifacts(3)));
    let backend = GridBackend {
        query: Arc::new(YieldingQuery(memory.clone())),
        ..GridBackend::from_shared(memory.clone())
    };
    let store = ArtifactStore::new(backend, GridConfig::default()).expect("store");
    let mut rx = store.subscribe();

    let (added, _) = tokio::join!(store.start_query(Vec::new(), None), async {
        store.clear_view(false);
    });

    assert!(added.expect("stale page is not an error").is_empty());
    store.read(|state| {
        assert!(state.is_empty());
        assert!(state.current_query().is_none());
        assert_eq!(state.request(RequestKind::Query), &RequestState::Idle);
    });
    assert!(drain(&mut rx).iter().any(|event| matches!(
        event,
        GridEvent::RequestStateChanged {
            request: RequestKind::Query,
            state: RequestState::Idle,
        }
    )));
}

#[tokio::test]
async fn refresh_rebuilds_view_and_releases_resources() {
    let (memory, store) = setup(3);
    let ids = store.start_query(Vec::new(), None).await.expect("query");
    store.load_thumbnails(&ids, 10).await;
    store.load_image(&ids[0]).await.expect("image");

    let again = store.refresh().await.expect("refresh");
    assert_eq!(again, ids);
    assert_eq!(memory.query_calls(), 2);

    let resources = store.resources();
    assert_eq!(resources.created_count(), 4);
    assert_eq!(resources.released_count(), 4);
    assert_eq!(resources.live_count(), 0);
}

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn thumbnails_are_fetched_once() {
    let (memory, store) = setup(3);
    let ids = register_all(&memory, &store);

    let first = store.load_thumbnails(&ids, 10).await;
    assert_eq!(first.loaded, 3);
    let second = store.load_thumbnails(&ids, 10).await;
    assert_eq!(second.loaded, 0);
    assert_eq!(second.skipped, 3);

    assert_eq!(memory.fetch_calls(AssetFacet::Thumbnail), 3);
    assert_urls_match_status(&store);
}

#[tokio::test]
async fn concurrent_loads_share_one_fetch() {
    let (memory, store) = setup(3);
    let ids = register_all(&memory, &store);
    let gate = Arc::new(Semaphore::new(0));
    memory.gate_fetches(gate.clone());

    let (first, second, _) = tokio::join!(
        store.load_thumbnails(&ids, 10),
        store.load_thumbnails(&ids, 10),
        async {
            tokio::task::yield_now().await;
            gate.add_permits(ids.len());
        }
    );

    assert_eq!(first.loaded + second.loaded, 3);
    assert!(first.is_noop() || second.is_noop());
    assert_eq!(memory.fetch_calls(AssetFacet::Thumbnail), 3);
}

#[tokio::test]
async fn chunking_bounds_in_flight_fetches() {
    let (memory, store) = setup(25);
    let ids = register_all(&memory, &store);

    let summary = store.load_thumbnails(&ids, 4).await;
    assert_eq!(summary.loaded, 25);
    assert!(memory.peak_in_flight() <= 4);
    assert_eq!(store.resources().live_count_for(Facet::Thumbnail), 25);
}

#[tokio::test]
async fn failed_fetch_can_be_retried() {
    let (memory, store) = setup(3);
    let ids = register_all(&memory, &store);
    memory.fail(FailPoint::Fetch);

    let failed = store.load_thumbnails(&ids, 10).await;
    assert_eq!(failed.failed, 3);
    store.read(|state| {
        assert!(state
            .entities()
            .all(|(_, entity)| entity.thumbnail_status() == LoadStatus::NotLoaded));
    });
    assert_urls_match_status(&store);

    memory.recover(FailPoint::Fetch);
    assert_eq!(store.load_thumbnails(&ids, 10).await.loaded, 3);
    assert_eq!(memory.fetch_calls(AssetFacet::Thumbnail), 6);
}

#[tokio::test]
async fn results_for_cleared_view_are_discarded() {
    let (memory, store) = setup(3);
    let ids = register_all(&memory, &store);
    let gate = Arc::new(Semaphore::new(0));
    memory.gate_fetches(gate.clone());

    let (summary, _) = tokio::join!(store.load_thumbnails(&ids, 10), async {
        tokio::task::yield_now().await;
        store.clear_view(false);
        gate.add_permits(ids.len());
    });

    assert_eq!(summary.loaded, 0);
    assert_eq!(summary.skipped, 3);
    assert_eq!(store.resources().created_count(), 0);
    assert!(store.read(GridState::is_empty));
}

#[tokio::test]
async fn late_result_from_cleared_view_leaves_new_claim_alone() {
    let (memory, store) = setup(1);
    let ids = register_all(&memory, &store);
    let refs = vec![ArtifactRef::image("dives", "shot-0.jpg")];
    let gate = Arc::new(Semaphore::new(0));
    memory.gate_fetches(gate.clone());
    let old_settled = Notify::new();

    let (old, new) = tokio::join!(
        async {
            let summary = store.load_thumbnails(&ids, 10).await;
            old_settled.notify_one();
            summary
        },
        async {
            tokio::task::yield_now().await;
            store.clear_view(true);
            store.register_artifacts(&refs);
            let (new, _) = tokio::join!(store.load_thumbnails(&ids, 10), async {
                // The old fetch is first in line at the gate and fails.
                memory.fail(FailPoint::Fetch);
                gate.add_permits(1);
                old_settled.notified().await;
                memory.recover(FailPoint::Fetch);
                gate.add_permits(1);
            });
            new
        }
    );

    assert_eq!(old.failed, 1);
    assert_eq!(new.loaded, 1);
    assert_eq!(memory.fetch_calls(AssetFacet::Thumbnail), 2);
    assert_eq!(
        store.read(|state| state.entity(&ids[0]).map(ArtifactEntity::thumbnail_status)),
        Some(LoadStatus::Loaded)
    );
    assert_eq!(store.resources().live_count_for(Facet::Thumbnail), 1);
    assert_urls_match_status(&store);
}

#[tokio::test]
async fn clearing_releases_each_handle_once() {
    let (memory, store) = setup(3);
    let ids = register_all(&memory, &store);
    store.load_thumbnails(&ids, 10).await;
    let mut rx = store.subscribe();

    assert_eq!(store.clear_thumbnails(&ids[..2]), 2);
    assert_eq!(store.clear_thumbnails(&ids[..2]), 0);
    assert_eq!(store.clear_full_sized_images(&ids), 0);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(store.resources().released_count(), 2);
    assert_eq!(store.resources().live_count(), 1);
    assert_urls_match_status(&store);
}

#[tokio::test]
async fn image_for_unknown_id_is_not_found() {
    let (_, store) = setup(1);
    let missing = ArtifactRef::image("dives", "nope.jpg").frontend_id();
    assert!(matches!(
        store.load_image(&missing).await,
        Err(GridError::NotFound(_))
    ));
}

#[tokio::test]
async fn visibility_changes_drive_thumbnails() {
    let (memory, store) = setup(4);
    let ids = register_all(&memory, &store);

    let entered = store
        .apply_visibility(VisibilityChange {
            entered: ids[..2].to_vec(),
            exited: Vec::new(),
        })
        .await;
    assert_eq!(entered.loaded, 2);

    let scrolled = store
        .apply_visibility(VisibilityChange {
            entered: vec![ids[2].clone()],
            exited: vec![ids[0].clone()],
        })
        .await;
    assert_eq!(scrolled.loaded, 1);

    let resources = store.resources();
    assert_eq!(resources.live_count_for(Facet::Thumbnail), 2);
    assert_eq!(resources.released_count(), 1);
    assert_urls_match_status(&store);
}

#[tokio::test]
async fn tracker_feeds_visibility_changes() {
    let (memory, store) = setup(10);
    let ids = register_all(&memory, &store);
    let row = |id: &FrontendId, bounds: &crate::visibility::VisibleBounds| {
        ids.iter()
            .position(|candidate| candidate == id)
            .map(|index| bounds.overlaps(index as f64 * 100.0, (index + 1) as f64 * 100.0))
            .unwrap_or(false)
    };

    // Default buffer of half the extent: bounds [-100, 300) cover rows 0..=2.
    let mut tracker = store.visibility_tracker(Viewport::new(0.0, 200.0));
    let mut change = VisibilityChange::new();
    tracker.update(&ids, &row, &mut change);
    assert_eq!(store.apply_visibility(change).await.loaded, 3);

    // Bounds [400, 800) cover rows 4..=7.
    tracker.set_viewport(Viewport::new(500.0, 200.0));
    let mut change = VisibilityChange::new();
    tracker.update(&ids, &row, &mut change);
    assert_eq!(change.exited.len(), 3);
    assert_eq!(store.apply_visibility(change).await.loaded, 4);

    assert_eq!(store.resources().live_count_for(Facet::Thumbnail), 4);
    assert_urls_match_status(&store);
}

// ---------------------------------------------------------------------------
// Selection and bulk operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn select_all_twice_emits_once() {
    let (memory, store) = setup(3);
    register_all(&memory, &store);
    let mut rx = store.subscribe();

    assert!(store.select_all(true));
    assert!(!store.select_all(true));

    let selections = drain(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, GridEvent::SelectionChanged { .. }))
        .count();
    assert_eq!(selections, 1);
    assert_eq!(store.read(GridState::selection_count), 3);
}

#[tokio::test]
async fn delete_removes_selection_and_releases_handles() {
    let (memory, store) = setup(3);
    let ids = register_all(&memory, &store);
    store.load_thumbnails(&ids, 10).await;
    store.select_images(&ids[..2], true);

    let removed = store.delete_selected().await.expect("delete");
    assert_eq!(removed, ids[..2].to_vec());

    store.read(|state| {
        assert_eq!(state.len(), 1);
        assert_eq!(state.selection_count(), 0);
        assert_eq!(state.request(RequestKind::Delete), &RequestState::Succeeded);
    });
    assert_eq!(store.resources().released_count(), 2);
    assert_eq!(memory.len(), 1);
}

#[tokio::test]
async fn failed_delete_leaves_entities_intact() {
    let (memory, store) = setup(2);
    let ids = register_all(&memory, &store);
    store.load_thumbnails(&ids, 10).await;
    store.select_images(&ids[..1], true);
    memory.fail(FailPoint::Delete);

    assert!(store.delete_selected().await.is_err());
    store.read(|state| {
        assert_eq!(state.len(), 2);
        assert_eq!(state.selection_count(), 1);
        assert!(matches!(
            state.request(RequestKind::Delete),
            RequestState::Failed(_)
        ));
        let entity = state.entity(&ids[0]).expect("entity");
        assert_eq!(entity.thumbnail_status(), LoadStatus::Loaded);
    });
    assert_eq!(store.resources().released_count(), 0);
}

#[tokio::test]
async fn download_archives_and_deselects() {
    let (memory, store) = setup(3);
    let ids = store.start_query(Vec::new(), None).await.expect("query");

    assert!(!store.download_selected().await.expect("nothing selected"));
    assert_eq!(memory.archive_calls(), 0);

    store.select_images(&ids[1..], true);
    assert!(store.download_selected().await.expect("download"));

    let archives = memory.archives();
    assert_eq!(archives.len(), 1);
    assert_eq!(archives[0].len(), 2);
    assert!(archives[0].iter().all(|item| item.metadata.is_some()));
    store.read(|state| {
        assert_eq!(state.selection_count(), 0);
        assert_eq!(state.request(RequestKind::Download), &RequestState::Succeeded);
    });
}

#[tokio::test]
async fn failed_download_is_reported() {
    let (memory, store) = setup(1);
    let ids = register_all(&memory, &store);
    store.select_images(&ids, true);
    memory.fail(FailPoint::Archive);

    assert!(store.download_selected().await.is_err());
    assert!(matches!(
        store.read(|state| state.request(RequestKind::Download).clone()),
        RequestState::Failed(_)
    ));
}

#[tokio::test]
async fn metadata_edit_rebuilds_view_and_patches() {
    let (memory, store) = setup(3);
    let ids = store.start_query(Vec::new(), None).await.expect("query");
    store.load_thumbnails(&ids, 10).await;
    store.select_images(&ids[..2], true);
    assert!(store.open_edit_dialog());

    let update = ArtifactMetadata {
        camera: Some("drone".to_string()),
        ..Default::default()
    };
    let patched = store
        .edit_selected_metadata(update)
        .await
        .expect("edit");
    assert_eq!(patched, ids[..2].to_vec());

    assert_eq!(memory.metadata_update_calls(), 1);
    assert_eq!(memory.query_calls(), 2);
    assert_eq!(
        memory
            .metadata_of(&ArtifactRef::image("dives", "shot-0.jpg"))
            .and_then(|metadata| metadata.camera),
        Some("drone".to_string())
    );
    store.read(|state| {
        assert!(!state.is_edit_dialog_open());
        assert_eq!(state.len(), 3);
        let camera = state
            .entity(&ids[1])
            .and_then(ArtifactEntity::metadata)
            .and_then(|metadata| metadata.camera.clone());
        assert_eq!(camera.as_deref(), Some("drone"));
        assert_eq!(
            state.request(RequestKind::MetadataEdit),
            &RequestState::Succeeded
        );
    });
    assert_eq!(store.resources().live_count(), 0);
}

#[tokio::test]
async fn metadata_edit_without_query_still_clears_view() {
    let (memory, store) = setup(2);
    let ids = register_all(&memory, &store);
    store.load_thumbnails(&ids, 10).await;
    store.select_images(&ids, true);

    let update = ArtifactMetadata {
        session: Some("night".to_string()),
        ..Default::default()
    };
    let patched = store.edit_selected_metadata(update).await.expect("edit");

    assert!(patched.is_empty());
    assert_eq!(memory.query_calls(), 0);
    store.read(|state| {
        assert!(state.is_empty());
        assert_eq!(
            state.request(RequestKind::MetadataEdit),
            &RequestState::Succeeded
        );
    });
    assert_eq!(store.resources().live_count(), 0);
}

#[tokio::test]
async fn failed_metadata_edit_keeps_dialog_open() {
    let (memory, store) = setup(2);
    let ids = store.start_query(Vec::new(), None).await.expect("query");
    store.select_images(&ids, true);
    store.open_edit_dialog();
    memory.fail(FailPoint::MetadataUpdate);

    assert!(store
        .edit_selected_metadata(ArtifactMetadata::default())
        .await
        .is_err());
    store.read(|state| {
        assert!(state.is_edit_dialog_open());
        assert_eq!(state.len(), 2);
        assert!(matches!(
            state.request(RequestKind::MetadataEdit),
            RequestState::Failed(_)
        ));
    });
    assert_eq!(memory.query_calls(), 1);
}

// ---------------------------------------------------------------------------
// Video URLs and search state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn video_urls_only_apply_to_videos() {
    let (_, store) = setup(0);
    let image = ArtifactRef::image("dives", "still.jpg");
    let video = ArtifactRef::video("dives", "clip.mp4");
    store.register_artifacts(&[image.clone(), video.clone()]);

    assert!(!store.set_video_url(&image.frontend_id()));
    assert!(store.set_video_url(&video.frontend_id()));
    assert!(!store.set_video_url(&video.frontend_id()));

    let preview = store.read(|state| {
        state
            .entity(&video.frontend_id())
            .and_then(ArtifactEntity::preview_url)
            .map(str::to_string)
    });
    assert_eq!(preview.as_deref(), Some("memory://dives/clip.mp4/preview"));

    assert!(store.clear_video_url(&video.frontend_id()));
    assert!(!store.clear_video_url(&video.frontend_id()));
}

#[tokio::test]
async fn search_string_selects_menu_and_completions() {
    let (_, store) = setup(3);

    store.set_search_string("bef");
    assert_eq!(
        store.read(|state| state.suggestions().menu),
        AutocompleteMenu::Date
    );
    store.apply_completion("before:2022-03-05");
    assert_eq!(
        store.read(|state| state.search_string().to_string()),
        "before:2022-03-05"
    );

    store.set_search_string("ree");
    assert_eq!(
        store.read(|state| state.suggestions().menu),
        AutocompleteMenu::None
    );
    let mut rx = store.subscribe();
    let completions = store.refresh_suggestions().await.expect("suggestions");
    assert_eq!(completions, vec!["reef"]);
    assert!(drain(&mut rx)
        .iter()
        .any(|event| matches!(event, GridEvent::SearchUpdated { .. })));

    store.apply_completion("reef");
    assert_eq!(store.read(|state| state.search_string().to_string()), "reef");
    assert!(store.read(|state| state.suggestions().completions.is_empty()));
}

#[test]
fn invalid_config_is_rejected() {
    let memory = Arc::new(MemoryBackend::new());
    let config = GridConfig {
        thumbnail_chunk_size: 0,
        ..GridConfig::default()
    };
    assert!(matches!(
        ArtifactStore::new(GridBackend::from_shared(memory), config),
        Err(GridError::Config(_))
    ));
}
