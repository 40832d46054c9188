//! Per-viewport wiring: the coordinator/cache pair and its ownership plumbing.
//!
//! A [`DisplayView`] is what a UI layer actually drives: it owns the strong
//! reference to its [`FoldCoordinator`] and the [`ScreenLineCache`] sized to
//! its viewport, and routes every notification in the mandated order --
//! visibility-map mutation and anchor flagging first, cache invalidation
//! second, client callbacks last.
//!
//! Ownership is explicit, never global: a viewport keeps coordinators for
//! the documents it has shown in a [`CoordinatorPool`] (so fold state
//! survives switching away and back), while a document keeps only weak
//! back-references in a [`CoordinatorRegistry`] it uses to broadcast edit
//! notifications to every viewport currently showing it.

use crate::{
    fold_coordinator::FoldCoordinator,
    screen_line_cache::{RowSlot, ScreenLineCache},
    traits::{Document, DocumentId, EditRecord, LineLayout, LineMetrics, ViewportClient},
};
use rustc_hash::FxHashMap;
use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};
use tracing::trace;

/// The engine-side object for one viewport attached to one document.
pub struct DisplayView {
    coordinator: Rc<RefCell<FoldCoordinator>>,
    cache: ScreenLineCache,
    client: Rc<dyn ViewportClient>,
    /// Last total handed to the client, to publish only real changes.
    published_total: Option<u32>,
}

impl DisplayView {
    pub fn new(
        coordinator: Rc<RefCell<FoldCoordinator>>,
        layout: Rc<dyn LineLayout>,
        client: Rc<dyn ViewportClient>,
    ) -> Self {
        let rows = client.viewport_rows();
        let cache = ScreenLineCache::new(coordinator.clone(), layout, rows);
        // Baseline for change detection; the embedder reads the initial
        // total itself when it sizes the scrollbar at attach.
        let total = coordinator.borrow_mut().total_rows();
        Self {
            coordinator,
            cache,
            client,
            published_total: Some(total),
        }
    }

    pub fn coordinator(&self) -> &Rc<RefCell<FoldCoordinator>> {
        &self.coordinator
    }

    /// The screen-line cache, for inspection.
    pub fn cache(&self) -> &ScreenLineCache {
        &self.cache
    }

    /// The layout descriptor for screen row `row`, recomputing as needed.
    /// Raises the client's repaint signal when the recompute discovers a
    /// changed row layout at the bottom of the requested range.
    pub fn row(&mut self, row: usize) -> &RowSlot {
        self.cache.ensure_through(row);
        if self.cache.take_full_redraw() {
            self.client.repaint_requested();
        }
        self.cache.get_row(row)
    }

    /// Re-read the viewport height from the client (after a window resize).
    pub fn viewport_resized(&mut self) {
        self.cache.set_viewport_rows(self.client.viewport_rows());
    }

    /// Scroll by `delta` rows, shifting the retained cache prefix/suffix by
    /// however far the anchor actually moved (the scrollable range may clamp
    /// the request).
    pub fn scroll_rows(&mut self, delta: i64) {
        let moved = {
            let mut coordinator = self.coordinator.borrow_mut();
            let before = coordinator.top_row();
            coordinator.scroll_rows(delta);
            coordinator.top_row() as i64 - before as i64
        };
        let moved = moved.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        self.cache.scroll_by(moved);
        self.sync();
    }

    // ------------------------------------------------------------------
    // Fold operations, routed through the coordinator

    pub fn collapse_fold(&mut self, line: u32) -> bool {
        let collapsed = self.coordinator.borrow_mut().collapse_fold(line);
        self.sync();
        collapsed
    }

    pub fn expand_fold(&mut self, line: u32, fully: bool) -> Option<u32> {
        let sub_fold = self.coordinator.borrow_mut().expand_fold(line, fully);
        self.sync();
        sub_fold
    }

    pub fn expand_all_folds(&mut self) {
        self.coordinator.borrow_mut().expand_all_folds();
        self.sync();
    }

    pub fn expand_folds_to_level(&mut self, level: u32) {
        self.coordinator.borrow_mut().expand_folds_to_level(level);
        self.sync();
    }

    pub fn narrow(&mut self, start: u32, end: u32) {
        self.coordinator.borrow_mut().narrow(start, end);
        self.sync();
    }

    // ------------------------------------------------------------------
    // Document notifications, for embedders driving a single view directly
    // (multi-view embedders broadcast through a `CoordinatorRegistry` and
    // then call `sync` on each view).

    pub fn transaction_begun(&mut self) {
        self.coordinator.borrow_mut().transaction_begun();
    }

    pub fn transaction_ended(&mut self) {
        self.coordinator.borrow_mut().transaction_ended();
        self.sync();
    }

    pub fn content_inserted(&mut self, edit: &EditRecord) {
        self.coordinator.borrow_mut().content_inserted(edit);
        self.sync();
    }

    pub fn pre_content_removed(&mut self, edit: &EditRecord) {
        self.coordinator.borrow_mut().pre_content_removed(edit);
    }

    pub fn content_removed(&mut self, edit: &EditRecord) {
        self.coordinator.borrow_mut().content_removed(edit);
        self.sync();
    }

    pub fn row_count_changed(&mut self, line: u32, old_rows: u32) {
        self.coordinator.borrow_mut().row_count_changed(line, old_rows);
        self.sync();
    }

    pub fn metrics_invalidated(&mut self) {
        self.coordinator.borrow_mut().metrics_invalidated();
        self.sync();
    }

    pub fn folds_invalidated(&mut self) {
        self.coordinator.borrow_mut().folds_invalidated();
        self.sync();
    }

    /// Drain the coordinator's damage into cache invalidation and client
    /// signals. Mid-transaction, only the cache is invalidated; the client
    /// hears about totals once the batch reconciles.
    pub fn sync(&mut self) {
        let (damage, total) = {
            let mut coordinator = self.coordinator.borrow_mut();
            let damage = coordinator.take_damage();
            let total = if coordinator.in_transaction() {
                None
            } else {
                Some(coordinator.total_rows())
            };
            (damage, total)
        };
        if let Some(line) = damage {
            self.cache.invalidate_from(line);
            trace!(line, "view invalidated");
        }
        if let Some(total) = total {
            if self.published_total != Some(total) {
                self.published_total = Some(total);
                self.client.scroll_range_changed(total);
            }
            if damage.is_some() {
                self.client.repaint_requested();
            }
        }
    }
}

/// Viewport-side pool of coordinators, keyed by document.
///
/// Fold state lives here across document switches: reattaching a document
/// the viewport has shown before hands back the same coordinator.
#[derive(Default)]
pub struct CoordinatorPool {
    coordinators: FxHashMap<DocumentId, Rc<RefCell<FoldCoordinator>>>,
}

impl CoordinatorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The coordinator for `document`, creating and registering one on first
    /// attach.
    pub fn attach(
        &mut self,
        document: Rc<dyn Document>,
        metrics: Rc<dyn LineMetrics>,
        registry: &mut CoordinatorRegistry,
    ) -> Rc<RefCell<FoldCoordinator>> {
        let id = document.id();
        if let Some(existing) = self.coordinators.get(&id) {
            return existing.clone();
        }
        let coordinator = Rc::new(RefCell::new(FoldCoordinator::new(document, metrics)));
        registry.register(&coordinator);
        self.coordinators.insert(id, coordinator.clone());
        trace!(document = id.0, "coordinator created");
        coordinator
    }

    /// Drop the pooled fold state for a closed document.
    pub fn discard(&mut self, id: DocumentId) {
        self.coordinators.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }
}

/// Document-side list of weak coordinator references.
///
/// The document layer broadcasts its edit notifications through this;
/// entries whose viewports went away are pruned opportunistically.
#[derive(Default)]
pub struct CoordinatorRegistry {
    entries: Vec<Weak<RefCell<FoldCoordinator>>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, coordinator: &Rc<RefCell<FoldCoordinator>>) {
        self.entries.push(Rc::downgrade(coordinator));
    }

    /// Run `notify` on every live coordinator, dropping dead entries.
    pub fn broadcast(&mut self, mut notify: impl FnMut(&mut FoldCoordinator)) {
        self.entries.retain(|entry| match entry.upgrade() {
            Some(coordinator) => {
                notify(&mut coordinator.borrow_mut());
                true
            }
            None => false,
        });
    }

    /// Number of live coordinators (prunes dead entries).
    pub fn live_count(&mut self) -> usize {
        self.entries.retain(|entry| entry.strong_count() > 0);
        self.entries.len()
    }
}
