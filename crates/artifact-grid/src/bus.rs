use serde::Serialize;
use tokio::sync::broadcast;

use crate::query::AutocompleteMenu;
use crate::types::{Facet, FrontendId, RequestKind, RequestState};

/// State change published by the store. No-op operations publish nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum GridEvent {
    EntitiesAdded {
        ids: Vec<FrontendId>,
    },
    EntitiesRemoved {
        ids: Vec<FrontendId>,
    },
    FacetLoaded {
        id: FrontendId,
        facet: Facet,
    },
    FacetCleared {
        ids: Vec<FrontendId>,
        facet: Facet,
    },
    MetadataLoaded {
        ids: Vec<FrontendId>,
    },
    SelectionChanged {
        ids: Vec<FrontendId>,
        selected: bool,
        selection_count: usize,
    },
    RequestStateChanged {
        request: RequestKind,
        state: RequestState,
    },
    QueryUpdated {
        page_num: u32,
        has_more_pages: bool,
    },
    ViewCleared {
        query_preserved: bool,
    },
    SearchUpdated {
        search_string: String,
        menu: AutocompleteMenu,
        completions: Vec<String>,
    },
    EditDialogChanged {
        open: bool,
    },
    VideoUrlChanged {
        id: FrontendId,
    },
}

#[derive(Clone, Debug)]
pub struct Bus {
    sender: broadcast::Sender<GridEvent>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.sender.subscribe()
    }

    /// Publishes to current subscribers. Having none is not an error.
    pub fn publish(&self, event: GridEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}
