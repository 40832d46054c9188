//! Fold/scroll coordination for one document-viewport pairing.
//!
//! The [`FoldCoordinator`] owns the [`VisibilityMap`] plus the two anchors
//! that make scrolling exact without rescanning the document on every
//! keystroke: the top-of-viewport [`TopAnchor`] and the [`RowsAnchor`]
//! holding the total scrollable row count. Fold operations and edit
//! notifications mutate the map, record cheap signed deltas measured against
//! the *old* visibility state, and escalate the anchors' repair states; a
//! single [`reconcile`](FoldCoordinator::reconcile) pass drains the pending
//! work, at transaction end or on the first row-math query.
//!
//! Moving the viewport by rows walks the visible line sequence, consuming
//! and producing per-line row counts with an intra-line skew remainder --
//! carry propagation in mixed-radix arithmetic, where each visible physical
//! line is a digit of variable base equal to its wrap-row count.

use crate::{
    anchor::{AnchorState, RowsAnchor, TopAnchor},
    traits::{Document, EditRecord, LineMetrics},
    visibility_map::VisibilityMap,
};
use std::rc::Rc;
use tracing::{debug, trace};

/// Fold state, visibility queries, and scroll-row math for one viewport
/// looking at one document.
pub struct FoldCoordinator {
    document: Rc<dyn Document>,
    metrics: Rc<dyn LineMetrics>,
    visibility: VisibilityMap,
    top: TopAnchor,
    total: RowsAnchor,
    /// Pending adjustment to `top.scroll_row`, drained by reconciliation.
    scroll_delta: i64,
    /// Pending adjustment to `total.rows`, drained by reconciliation.
    rows_delta: i64,
    txn_depth: u32,
    /// A removal swallowed the entire visible range; visibility must be
    /// rebuilt from the post-edit document before the next reconciliation.
    pending_visibility_reset: bool,
    /// Lowest physical line whose display changed since the last drain.
    damage_from: Option<u32>,
}

impl FoldCoordinator {
    pub fn new(document: Rc<dyn Document>, metrics: Rc<dyn LineMetrics>) -> Self {
        let line_count = document.line_count();
        let mut coordinator = Self {
            document,
            metrics,
            visibility: VisibilityMap::new(line_count),
            top: TopAnchor::default(),
            total: RowsAnchor::default(),
            scroll_delta: 0,
            rows_delta: 0,
            txn_depth: 0,
            pending_visibility_reset: false,
            damage_from: None,
        };
        coordinator.total.state.request(AnchorState::NeedsReset);
        coordinator.reconcile();
        coordinator
    }

    // ------------------------------------------------------------------
    // Visibility queries (map only; never touch the anchors)

    pub fn is_line_visible(&self, line: u32) -> bool {
        self.assert_line(line);
        self.visibility.is_visible(line)
    }

    pub fn first_visible_line(&self) -> Option<u32> {
        self.visibility.first()
    }

    pub fn last_visible_line(&self) -> Option<u32> {
        self.visibility.last()
    }

    pub fn next_visible_line(&self, line: u32) -> Option<u32> {
        self.assert_line(line);
        self.visibility.next(line)
    }

    pub fn prev_visible_line(&self, line: u32) -> Option<u32> {
        self.assert_line(line);
        self.visibility.prev(line)
    }

    /// The visibility map itself, for diagnostics and tests.
    pub fn visibility(&self) -> &VisibilityMap {
        &self.visibility
    }

    /// Wrap-row count of a physical line, delegated to the metrics cache.
    pub fn row_count(&self, line: u32) -> u32 {
        self.assert_line(line);
        let rows = self.metrics.row_count(line);
        debug_assert!(rows >= 1, "line {line} reports zero rows");
        rows
    }

    // ------------------------------------------------------------------
    // Row math (reconciles on entry)

    /// Total scrollable row count: the sum of row counts over every visible
    /// line. Exact after every public operation.
    pub fn total_rows(&mut self) -> u32 {
        self.reconcile();
        self.total.rows
    }

    /// The top-of-viewport physical line and its intra-line skew.
    pub fn top_line(&mut self) -> (u32, u32) {
        self.reconcile();
        (self.top.line, self.top.skew)
    }

    /// The viewport's first displayed row index.
    pub fn top_row(&mut self) -> u32 {
        self.reconcile();
        self.top.scroll_row + self.top.skew
    }

    /// Scroll so that row `row` (clamped to the scrollable range) becomes the
    /// viewport's first displayed row.
    ///
    /// Walks the visible line sequence from the current anchor, carrying row
    /// counts like mixed-radix digits, so a short move costs a few lines
    /// rather than a document scan.
    pub fn set_top_row(&mut self, row: u32) {
        self.reconcile();
        if self.total.rows == 0 {
            self.top = TopAnchor::default();
            return;
        }
        let mut target = row.min(self.total.rows - 1);

        let mut line = self.top.line;
        let mut line_start = self.top.scroll_row;
        while target < line_start {
            let prev = self
                .visibility
                .prev(line)
                .expect("rows exist above the current anchor");
            line = prev;
            line_start -= self.row_count(line);
        }
        loop {
            let rows = self.row_count(line);
            if target < line_start + rows {
                break;
            }
            match self.visibility.next(line) {
                Some(next) => {
                    line_start += rows;
                    line = next;
                }
                None => {
                    // Clamp to the last row of the last visible line.
                    target = line_start + rows - 1;
                    break;
                }
            }
        }
        self.top.line = line;
        self.top.scroll_row = line_start;
        self.top.skew = target - line_start;
        trace!(
            line = self.top.line,
            skew = self.top.skew,
            row = target,
            "set_top_row"
        );
    }

    /// Scroll the viewport by a signed number of rows.
    pub fn scroll_rows(&mut self, delta: i64) {
        let current = self.top_row() as i64;
        let max = self.total.rows.saturating_sub(1) as i64;
        let target = (current + delta).clamp(0, max);
        self.set_top_row(target as u32);
    }

    // ------------------------------------------------------------------
    // Fold operations

    /// Collapse the fold at (or enclosing) `line`, hiding its body.
    ///
    /// Returns `false` when `line` belongs to no fold.
    pub fn collapse_fold(&mut self, line: u32) -> bool {
        self.assert_line(line);
        let Some((start, end)) = self.fold_body(line) else {
            return false;
        };
        self.hide_range(start, end);
        self.maybe_reconcile();
        debug!(line, start, end, "collapse_fold");
        true
    }

    /// Expand the fold at (or enclosing) `line`.
    ///
    /// With `fully`, every line of the body (sub-folds included) becomes
    /// visible. Otherwise only the first layer is revealed and the start
    /// line of the first sub-fold left collapsed is returned, so a UI can
    /// step into folds one level at a time.
    pub fn expand_fold(&mut self, line: u32, fully: bool) -> Option<u32> {
        self.assert_line(line);
        let (start, end) = self.fold_body(line)?;
        let mut first_sub_fold = None;
        if fully {
            self.show_range(start, end);
        } else {
            let threshold = self.document.fold_level(start);
            let mut run_start: Option<u32> = None;
            for l in start..=end {
                if self.document.fold_level(l) <= threshold {
                    run_start.get_or_insert(l);
                } else {
                    if first_sub_fold.is_none() {
                        first_sub_fold = Some(l - 1);
                    }
                    if let Some(s) = run_start.take() {
                        self.show_range(s, l - 1);
                    }
                }
            }
            if let Some(s) = run_start {
                self.show_range(s, end);
            }
        }
        self.maybe_reconcile();
        debug!(line, start, end, fully, ?first_sub_fold, "expand_fold");
        first_sub_fold
    }

    /// Make every line of the document visible again.
    pub fn expand_all_folds(&mut self) {
        self.visibility.reset(self.document.line_count());
        self.total.state.request(AnchorState::NeedsReset);
        self.top.state.request(AnchorState::NeedsReset);
        self.note_damage(0);
        self.maybe_reconcile();
        debug!("expand_all_folds");
    }

    /// Rebuild visibility in one pass: a line is visible iff its fold level
    /// is below `level`. Line 0 is forced visible.
    pub fn expand_folds_to_level(&mut self, level: u32) {
        let count = self.document.line_count();
        self.visibility.reset(count);
        let mut hidden_start: Option<u32> = None;
        for l in 0..count {
            let visible = l == 0 || self.document.fold_level(l) < level;
            match (visible, hidden_start) {
                (false, None) => hidden_start = Some(l),
                (true, Some(s)) => {
                    self.visibility.hide(s, l - 1);
                    hidden_start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = hidden_start {
            self.visibility.hide(s, count - 1);
        }
        self.total.state.request(AnchorState::NeedsReset);
        self.top.state.request(AnchorState::NeedsReset);
        self.note_damage(0);
        self.maybe_reconcile();
        debug!(level, "expand_folds_to_level");
    }

    /// Restrict the display to `start..=end`, hiding everything outside.
    ///
    /// Overlapping narrows are resolved by expanding everything first and
    /// then hiding outside the new range. Narrowing to the whole document is
    /// a caller error.
    pub fn narrow(&mut self, start: u32, end: u32) {
        let count = self.document.line_count();
        assert!(
            start <= end && end < count,
            "malformed narrow range {start}..={end} (document has {count} lines)"
        );
        assert!(
            !(start == 0 && end + 1 == count),
            "narrow range {start}..={end} spans the whole document"
        );
        self.visibility.reset(count);
        if start > 0 {
            self.visibility.hide(0, start - 1);
        }
        if end + 1 < count {
            self.visibility.hide(end + 1, count - 1);
        }
        self.total.state.request(AnchorState::NeedsReset);
        self.top.state.request(AnchorState::NeedsReset);
        self.note_damage(0);
        self.maybe_reconcile();
        debug!(start, end, "narrow");
    }

    // ------------------------------------------------------------------
    // Edit notifications

    pub fn transaction_begun(&mut self) {
        self.txn_depth += 1;
    }

    /// End of an edit transaction: drain all deferred anchor work in one
    /// reconciliation pass.
    pub fn transaction_ended(&mut self) {
        debug_assert!(self.txn_depth > 0, "transaction_ended without begin");
        self.txn_depth = self.txn_depth.saturating_sub(1);
        if self.txn_depth == 0 {
            self.drain_pending_reset();
            self.reconcile();
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.txn_depth > 0
    }

    /// Post-edit notification: `num_lines` lines were inserted into the run
    /// containing `start_line` (they adopt that run's visibility).
    pub fn content_inserted(&mut self, edit: &EditRecord) {
        let EditRecord {
            start_line,
            num_lines,
            ..
        } = *edit;
        self.note_damage(start_line);
        if num_lines == 0 {
            // Intra-line edit; row-count changes arrive via
            // `row_count_changed` from the metrics owner.
            self.maybe_reconcile();
            return;
        }
        let was_empty = self.visibility.is_degenerate();
        let inserted_visible = was_empty || self.visibility.is_visible(start_line);
        self.visibility.content_inserted(start_line, num_lines);

        if inserted_visible {
            let added: i64 = (start_line..start_line + num_lines)
                .map(|l| self.row_count(l) as i64)
                .sum();
            self.rows_delta += added;
            self.total.state.request(AnchorState::NeedsIncremental);
            if !was_empty && start_line <= self.top.line {
                self.top.line += num_lines;
                self.scroll_delta += added;
                self.top.state.request(AnchorState::NeedsIncremental);
            }
        } else if start_line <= self.top.line {
            // Hidden insertion above the anchor shifts its line number but
            // contributes no rows.
            self.top.line += num_lines;
            self.top.state.request(AnchorState::NeedsIncremental);
        }
        trace!(start_line, num_lines, "content_inserted");
        self.maybe_reconcile();
    }

    /// Pre-edit notification: lines `start_line..start_line + num_lines` are
    /// about to be removed. Row deltas are measured against the old
    /// visibility state and the old metrics, both still intact here.
    pub fn pre_content_removed(&mut self, edit: &EditRecord) {
        let EditRecord {
            start_line,
            num_lines,
            ..
        } = *edit;
        self.note_damage(start_line);
        if num_lines == 0 {
            self.maybe_reconcile();
            return;
        }
        let removed: i64 = self.visible_rows_in(start_line, start_line + num_lines - 1) as i64;
        let top = self.top.line;
        let full_reset = self.visibility.pre_content_removed(start_line, num_lines);

        if full_reset {
            // The map's seam line may not even exist once the lines are
            // gone; rebuild visibility from the post-edit document instead.
            self.pending_visibility_reset = true;
            self.total.state.request(AnchorState::NeedsReset);
            self.top.state.request(AnchorState::NeedsReset);
            self.top.line = start_line;
        } else {
            self.rows_delta -= removed;
            self.total.state.request(AnchorState::NeedsIncremental);
            if start_line + num_lines <= top {
                self.top.line -= num_lines;
                self.scroll_delta -= removed;
                self.top.state.request(AnchorState::NeedsIncremental);
            } else if start_line <= top {
                // The removal swallows the anchor line; re-derive from the
                // first surviving line at the seam.
                self.top.line = start_line;
                self.top.state.request(AnchorState::NeedsReset);
            }
        }
        // No reconciliation here: a reset scan would read the metrics of
        // lines that are about to disappear. The paired post-edit
        // notification (or the transaction end) drains the flags.
        trace!(start_line, num_lines, full_reset, "pre_content_removed");
    }

    /// Post-edit counterpart of [`pre_content_removed`](Self::pre_content_removed).
    /// The map and anchors were already adjusted; this drains any deferred
    /// structural reset and gives standalone (non-transactional) callers
    /// their reconciliation point.
    pub fn content_removed(&mut self, _edit: &EditRecord) {
        if self.txn_depth == 0 {
            self.drain_pending_reset();
        }
        self.maybe_reconcile();
    }

    fn drain_pending_reset(&mut self) {
        if self.pending_visibility_reset {
            self.pending_visibility_reset = false;
            self.visibility.reset(self.document.line_count());
            self.note_damage(0);
        }
    }

    /// A line's wrap-row count changed (content edit or wrap-width change).
    /// `old_rows` is the count before the metrics entry was invalidated.
    pub fn row_count_changed(&mut self, line: u32, old_rows: u32) {
        self.assert_line(line);
        self.note_damage(line);
        if self.visibility.is_visible(line) {
            let delta = self.row_count(line) as i64 - old_rows as i64;
            if delta != 0 {
                self.rows_delta += delta;
                self.total.state.request(AnchorState::NeedsIncremental);
                if line < self.top.line {
                    self.scroll_delta += delta;
                    self.top.state.request(AnchorState::NeedsIncremental);
                } else if line == self.top.line {
                    // The anchor's own line changed height; its skew may now
                    // point past the end.
                    self.top.state.request(AnchorState::NeedsIncremental);
                }
            }
        }
        self.maybe_reconcile();
    }

    /// Every row count changed at once (wrap width or font change, after
    /// `LineMetrics::invalidate_all`). Both anchors re-derive; visibility is
    /// untouched.
    pub fn metrics_invalidated(&mut self) {
        self.total.state.request(AnchorState::NeedsReset);
        self.top.state.request(AnchorState::NeedsReset);
        self.note_damage(0);
        self.maybe_reconcile();
        debug!("metrics_invalidated");
    }

    /// The fold-producing analysis was rebuilt wholesale; visibility resets
    /// to all-visible and both anchors re-derive.
    pub fn folds_invalidated(&mut self) {
        self.visibility.reset(self.document.line_count());
        self.total.state.request(AnchorState::NeedsReset);
        self.top.state.request(AnchorState::NeedsReset);
        self.note_damage(0);
        self.maybe_reconcile();
        debug!("folds_invalidated");
    }

    /// Lowest physical line whose display changed since the last call, for
    /// the owning view to feed into cache invalidation.
    pub fn take_damage(&mut self) -> Option<u32> {
        self.damage_from.take()
    }

    // ------------------------------------------------------------------
    // Reconciliation

    /// Drain both anchors' deferred repair work. Idempotent; called at
    /// transaction end and on entry to every row-math query.
    pub fn reconcile(&mut self) {
        match self.total.state.take() {
            AnchorState::Clean => {}
            AnchorState::NeedsIncremental => {
                self.total.rows = (self.total.rows as i64 + self.rows_delta).max(0) as u32;
            }
            AnchorState::NeedsReset => {
                self.total.rows = self.scan_total_rows();
            }
        }
        self.rows_delta = 0;

        match self.top.state.take() {
            AnchorState::Clean => {}
            AnchorState::NeedsIncremental => {
                self.top.scroll_row = (self.top.scroll_row as i64 + self.scroll_delta).max(0) as u32;
                self.clamp_top_skew();
            }
            AnchorState::NeedsReset => self.reset_top(),
        }
        self.scroll_delta = 0;
        trace!(
            total_rows = self.total.rows,
            top_line = self.top.line,
            top_skew = self.top.skew,
            "reconciled"
        );
    }

    fn maybe_reconcile(&mut self) {
        if self.txn_depth == 0 {
            self.reconcile();
        }
    }

    fn scan_total_rows(&self) -> u32 {
        self.visibility
            .runs()
            .flatten()
            .map(|l| self.row_count(l))
            .sum()
    }

    /// Re-derive the top anchor by scanning from the first visible line.
    fn reset_top(&mut self) {
        let Some(first) = self.visibility.first() else {
            self.top = TopAnchor::default();
            return;
        };
        let mut line = self.top.line.min(self.document.line_count() - 1);
        if !self.visibility.is_visible(line) {
            line = self
                .visibility
                .next(line)
                .or_else(|| self.visibility.prev(line))
                .unwrap_or(first);
        }
        let mut row = 0u32;
        let mut cursor = Some(first);
        while let Some(l) = cursor {
            if l >= line {
                break;
            }
            row += self.row_count(l);
            cursor = self.visibility.next(l);
        }
        self.top.line = line;
        self.top.scroll_row = row;
        self.clamp_top_skew();
    }

    fn clamp_top_skew(&mut self) {
        let count = self.document.line_count();
        if count == 0 {
            self.top.skew = 0;
            return;
        }
        let rows = self.row_count(self.top.line.min(count - 1));
        self.top.skew = self.top.skew.min(rows.saturating_sub(1));
    }

    // ------------------------------------------------------------------
    // Fold-bound discovery

    /// The body of the fold at (or enclosing) `line`, as an inclusive line
    /// range. A fold's body is the maximal contiguous run after the fold
    /// start whose level exceeds the start line's level; when `line` sits
    /// inside a deeper body, the enclosing lower-level boundary is located
    /// by scanning backward first.
    fn fold_body(&self, line: u32) -> Option<(u32, u32)> {
        let count = self.document.line_count();
        if count == 0 {
            return None;
        }
        let mut anchor = line;
        let mut level = self.document.fold_level(line);
        let starts_fold = line + 1 < count && self.document.fold_level(line + 1) > level;
        if !starts_fold {
            if level == 0 {
                return None;
            }
            let mut l = line;
            loop {
                if l == 0 {
                    return None;
                }
                l -= 1;
                let fl = self.document.fold_level(l);
                if fl < level {
                    anchor = l;
                    level = fl;
                    break;
                }
            }
        }
        let start = anchor + 1;
        if start >= count || self.document.fold_level(start) <= level {
            return None;
        }
        let mut end = count - 1;
        for l in start..count {
            if self.document.fold_level(l) <= level {
                end = l - 1;
                break;
            }
        }
        Some((start, end))
    }

    // ------------------------------------------------------------------
    // Shared mutation helpers

    /// Hide `start..=end`, measuring the row delta against the old state.
    fn hide_range(&mut self, start: u32, end: u32) {
        let removed = self.visible_rows_in(start, end) as i64;
        let top = self.top.line;
        self.visibility.hide(start, end);
        self.rows_delta -= removed;
        self.total.state.request(AnchorState::NeedsIncremental);
        if (start..=end).contains(&top) {
            self.top.state.request(AnchorState::NeedsReset);
        } else if end < top {
            self.scroll_delta -= removed;
            self.top.state.request(AnchorState::NeedsIncremental);
        }
        self.note_damage(start);
    }

    /// Show `start..=end`, measuring the row delta against the old state.
    fn show_range(&mut self, start: u32, end: u32) {
        let already_visible = self.visible_rows_in(start, end) as i64;
        self.visibility.show(start, end);
        let now_visible = self.visible_rows_in(start, end) as i64;
        self.rows_delta += now_visible - already_visible;
        self.total.state.request(AnchorState::NeedsIncremental);
        let top = self.top.line;
        if end < top {
            self.scroll_delta += now_visible - already_visible;
            self.top.state.request(AnchorState::NeedsIncremental);
        } else if (start..=end).contains(&top) {
            // The anchor line may have been hidden; its scroll row must be
            // re-derived against the new surroundings.
            self.top.state.request(AnchorState::NeedsReset);
        }
        self.note_damage(start);
    }

    /// Sum of row counts over the *visible* lines in `start..=end`.
    fn visible_rows_in(&self, start: u32, end: u32) -> u32 {
        let mut rows = 0;
        let mut cursor = if self.visibility.is_visible(start) {
            Some(start)
        } else {
            self.visibility.next(start)
        };
        while let Some(l) = cursor {
            if l > end {
                break;
            }
            rows += self.row_count(l);
            cursor = self.visibility.next(l);
        }
        rows
    }

    fn note_damage(&mut self, line: u32) {
        self.damage_from = Some(self.damage_from.map_or(line, |d| d.min(line)));
    }

    #[track_caller]
    fn assert_line(&self, line: u32) {
        let count = self.document.line_count();
        assert!(
            line < count,
            "line {line} out of range (document has {count} lines)"
        );
    }
}
