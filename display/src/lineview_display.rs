//! Line virtualization for document display.
//!
//! This crate tracks which document lines are currently visible (folding and
//! narrowing), how many screen rows each visible line occupies (soft wrap),
//! and caches the exact screen-row to document-line mapping for the rows on
//! screen, invalidating and recomputing only the minimal affected region as
//! the document or the fold/wrap structure changes.
//!
//! # Architecture
//!
//! Three structures form the core, leaves first:
//!
//! ```text
//! VisibilityMap        run-length visible/hidden map over physical lines
//!   | owned by
//! FoldCoordinator      fold operations + edit-robust scroll anchors
//!   | consulted by
//! ScreenLineCache      per-row layout descriptors behind a validity frontier
//! ```
//!
//! Document edits and fold operations notify the [`FoldCoordinator`], which
//! updates the [`VisibilityMap`] and its anchors and reports which physical
//! lines' display changed; a [`DisplayView`] feeds that into
//! [`ScreenLineCache`] invalidation and asks the cache for row descriptors
//! on demand, which pulls wrap shapes from the [`LineLayout`] collaborator
//! as needed.
//!
//! Everything is single-threaded and synchronous: one coordinator/cache pair
//! per viewport, exclusively owned, with the underlying document shared
//! read-only across viewports (see [`CoordinatorRegistry`]).
//!
//! # Collaborators
//!
//! The engine renders nothing and tokenizes nothing. It consumes the
//! interfaces in [`traits`]: [`Document`] (line count, fold depths, edit
//! notifications), [`LineMetrics`] (wrap-row counts), [`LineLayout`] (wrap
//! subregion shapes and end-of-line contexts), and [`ViewportClient`]
//! (viewport geometry, scrollbar and repaint signals). The [`simple`]
//! module provides in-memory reference implementations.

mod anchor;
mod fold_coordinator;
mod screen_line_cache;
pub mod simple;
mod traits;
mod view;
mod visibility_map;

pub use anchor::{AnchorState, RowsAnchor, TopAnchor};
pub use fold_coordinator::FoldCoordinator;
pub use screen_line_cache::{RowSlot, ScreenLineCache, SlotState};
pub use traits::{
    Chunk, ContextId, Document, DocumentId, EditRecord, LineLayout, LineMetrics, LineShape,
    SubLine, ViewportClient,
};
pub use view::{CoordinatorPool, CoordinatorRegistry, DisplayView};
pub use visibility_map::VisibilityMap;
