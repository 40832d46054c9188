//! Lazy per-row layout cache for one viewport.
//!
//! The cache holds one [`RowSlot`] per viewport row, describing which
//! physical line and wrap subregion occupies that row. A single integer
//! frontier partitions the slot array: rows before `valid_frontier` are
//! trustworthy, rows at or after it are stale -- even when their contents
//! happen to still be correct. The frontier, not per-slot state, is
//! authoritative; that is what keeps every invalidation O(1).
//!
//! Queries beyond the frontier trigger a bounded recompute: resume from the
//! last row still anchored to a known physical line (backing up to that
//! line's first cached row when resuming mid-line), then walk forward one
//! visible line at a time, consuming one row per wrap subregion and carrying
//! the tokenizer's end-of-line context along. Small same-direction scrolls
//! shift the retained slots in place and only invalidate the newly exposed
//! rows.

use crate::{
    fold_coordinator::FoldCoordinator,
    traits::{Chunk, ContextId, LineLayout, LineShape},
};
use smallvec::SmallVec;
use std::{cell::RefCell, mem, rc::Rc};
use tracing::trace;

/// Per-slot lifecycle. `Stale` slots have never held real content (or were
/// wiped by a scroll/resize) and are excluded from change detection; the
/// frontier decides trust for everything else.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SlotState {
    #[default]
    Stale,
    InProgress,
    Valid,
}

/// Layout of one screen row.
#[derive(Clone, Debug, Default)]
pub struct RowSlot {
    /// Physical line occupying this row; `None` past the end of the document.
    pub line: Option<u32>,
    /// Offset of the wrap subregion within the physical line.
    pub start: u32,
    /// Length of the wrap subregion.
    pub len: u32,
    /// Whether this row shows the first subregion of its line.
    pub first_subregion: bool,
    /// Whether this row shows the last subregion of its line.
    pub last_subregion: bool,
    /// Styled chunks covering the subregion.
    pub chunks: SmallVec<[Chunk; 4]>,
    /// Tokenizer state at the end of the line.
    pub end_context: ContextId,
    pub state: SlotState,
}

impl RowSlot {
    /// Whether two slots describe the same display content. Chunks are
    /// derived from the same shape as the boundary fields, so comparing the
    /// boundary and context is sufficient.
    fn same_display(&self, other: &RowSlot) -> bool {
        self.line == other.line
            && self.start == other.start
            && self.len == other.len
            && self.first_subregion == other.first_subregion
            && self.last_subregion == other.last_subregion
            && self.end_context == other.end_context
    }
}

/// Screen-row to document-line mapping for the rows currently on screen.
pub struct ScreenLineCache {
    coordinator: Rc<RefCell<FoldCoordinator>>,
    layout: Rc<dyn LineLayout>,
    slots: Vec<RowSlot>,
    valid_frontier: usize,
    full_redraw: bool,
}

impl ScreenLineCache {
    pub fn new(
        coordinator: Rc<RefCell<FoldCoordinator>>,
        layout: Rc<dyn LineLayout>,
        viewport_rows: usize,
    ) -> Self {
        Self {
            coordinator,
            layout,
            slots: vec![RowSlot::default(); viewport_rows],
            valid_frontier: 0,
            full_redraw: false,
        }
    }

    /// Number of rows the cache is sized for.
    pub fn rows(&self) -> usize {
        self.slots.len()
    }

    /// Boundary below which cached rows are trusted.
    pub fn valid_frontier(&self) -> usize {
        self.valid_frontier
    }

    /// Resize for a new viewport height, preserving the overlapping prefix.
    pub fn set_viewport_rows(&mut self, viewport_rows: usize) {
        if viewport_rows == self.slots.len() {
            return;
        }
        self.slots.resize_with(viewport_rows, RowSlot::default);
        self.valid_frontier = self.valid_frontier.min(viewport_rows);
    }

    /// The descriptor for screen row `row`, recomputing stale rows up to and
    /// including it first. `row` must be inside the viewport.
    pub fn get_row(&mut self, row: usize) -> &RowSlot {
        self.ensure_through(row);
        &self.slots[row]
    }

    /// Recompute `[valid_frontier, row]` if `row` is not yet trusted.
    pub fn ensure_through(&mut self, row: usize) {
        assert!(
            row < self.slots.len(),
            "screen row {row} out of range (viewport has {} rows)",
            self.slots.len()
        );
        if row >= self.valid_frontier {
            self.recompute_through(row);
        }
    }

    /// Mark every row stale.
    pub fn invalidate_all(&mut self) {
        self.valid_frontier = 0;
    }

    /// Mark stale every cached row at or below the first row whose physical
    /// line is `>= line` (rows past the document end count as affected).
    pub fn invalidate_from(&mut self, line: u32) {
        let cut = self.slots[..self.valid_frontier]
            .iter()
            .position(|slot| slot.line.is_none_or(|l| l >= line));
        if let Some(cut) = cut {
            self.valid_frontier = cut;
        }
    }

    /// Shift the cache for a viewport scroll of `delta` rows (positive =
    /// scrolling down). The retained slots move in place and only the newly
    /// exposed rows become stale, so a small same-direction scroll costs
    /// O(delta) recompute instead of a full viewport pass. Scrolling up
    /// resets the frontier: the valid-prefix model cannot certify freshly
    /// exposed top rows.
    pub fn scroll_by(&mut self, delta: i32) {
        let rows = self.slots.len();
        if rows == 0 || delta == 0 {
            return;
        }
        if delta.unsigned_abs() as usize >= rows {
            self.invalidate_all();
            return;
        }
        if delta > 0 {
            let shift = delta as usize;
            self.slots.rotate_left(shift);
            for slot in &mut self.slots[rows - shift..] {
                *slot = RowSlot::default();
            }
            self.valid_frontier = self.valid_frontier.saturating_sub(shift);
        } else {
            let shift = (-delta) as usize;
            self.slots.rotate_right(shift);
            for slot in &mut self.slots[..shift] {
                *slot = RowSlot::default();
            }
            self.valid_frontier = 0;
        }
        trace!(delta, frontier = self.valid_frontier, "scroll_by");
    }

    /// Drain the full-redraw latch. Set when a recompute found that the row
    /// layout at the bottom of the requested range no longer matches what
    /// was cached there -- everything downstream needs repainting, not just
    /// recaching.
    pub fn take_full_redraw(&mut self) -> bool {
        mem::take(&mut self.full_redraw)
    }

    /// Resume position for a recompute: the physical line to lay out, the
    /// subregion index to emit next, and the row to start filling at.
    fn resume_point(&mut self) -> (Option<u32>, usize, usize) {
        if self.valid_frontier == 0 {
            let (line, skew) = self.anchor();
            return (line, skew, 0);
        }
        let prev = &self.slots[self.valid_frontier - 1];
        match prev.line {
            None => (None, 0, self.valid_frontier),
            Some(line) if prev.last_subregion => {
                let next = self.coordinator.borrow().next_visible_line(line);
                (next, 0, self.valid_frontier)
            }
            Some(line) => {
                // Mid-line: back up to the line's first cached row and lay
                // the whole line out again, the bounded way to recover the
                // subregion position.
                let mut row = self.valid_frontier - 1;
                while row > 0 && self.slots[row - 1].line == Some(line) {
                    row -= 1;
                }
                if row == 0 {
                    let (line, skew) = self.anchor();
                    (line, skew, 0)
                } else {
                    (Some(line), 0, row)
                }
            }
        }
    }

    /// The viewport's top physical line and skew, reconciled.
    fn anchor(&self) -> (Option<u32>, usize) {
        let mut coordinator = self.coordinator.borrow_mut();
        if coordinator.first_visible_line().is_none() {
            return (None, 0);
        }
        let (line, skew) = coordinator.top_line();
        (Some(line), skew as usize)
    }

    fn recompute_through(&mut self, target: usize) {
        let mut target = target;
        let (mut line, mut sub, mut row) = self.resume_point();
        trace!(from = row, target, line = ?line, "recompute");

        while row <= target {
            match line {
                None => {
                    if self.fill_blank(row) && row == target {
                        target = self.request_extension(target);
                    }
                    row += 1;
                }
                Some(current) => {
                    let shape = self.layout.shape(current);
                    debug_assert!(
                        !shape.rows.is_empty(),
                        "layout produced no subregions for line {current}"
                    );
                    // A shrunken shape can leave the resume subregion past
                    // the end; clamping keeps the walk on the last row, and
                    // the change detection below handles the repaint.
                    let subregions = shape.rows.len().max(1);
                    sub = sub.min(subregions - 1);
                    while sub < subregions && row <= target {
                        if self.fill(row, current, &shape, sub) && row == target {
                            target = self.request_extension(target);
                        }
                        row += 1;
                        sub += 1;
                    }
                    if sub >= subregions {
                        line = self.coordinator.borrow().next_visible_line(current);
                        sub = 0;
                    }
                }
            }
        }
        self.valid_frontier = row;
    }

    /// Extend the working frontier one row past `target` when possible, and
    /// latch the full-redraw request either way.
    fn request_extension(&mut self, target: usize) -> usize {
        self.full_redraw = true;
        if target + 1 < self.slots.len() {
            target + 1
        } else {
            target
        }
    }

    /// Write the descriptor for subregion `sub` of `line` into `row`.
    /// Returns whether previously cached content changed.
    fn fill(&mut self, row: usize, line: u32, shape: &LineShape, sub: usize) -> bool {
        let subline = &shape.rows[sub];
        let slot = RowSlot {
            line: Some(line),
            start: subline.start,
            len: subline.len,
            first_subregion: sub == 0,
            last_subregion: sub + 1 == shape.rows.len(),
            chunks: subline.chunks.clone(),
            end_context: shape.end_context,
            state: SlotState::Valid,
        };
        self.replace_slot(row, slot)
    }

    /// Write a past-end-of-document descriptor into `row`.
    fn fill_blank(&mut self, row: usize) -> bool {
        let slot = RowSlot {
            state: SlotState::Valid,
            ..RowSlot::default()
        };
        self.replace_slot(row, slot)
    }

    /// Install a freshly computed slot, reporting whether previously valid
    /// content changed. Never-computed slots don't count as changes.
    fn replace_slot(&mut self, row: usize, slot: RowSlot) -> bool {
        let old = &mut self.slots[row];
        let was_valid = old.state == SlotState::Valid;
        old.state = SlotState::InProgress;
        let changed = was_valid && !old.same_display(&slot);
        self.slots[row] = slot;
        changed
    }
}
