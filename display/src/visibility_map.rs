//! Run-length visibility map over physical line indices.
//!
//! The map stores only the *boundaries* between visible and hidden runs, as a
//! strictly increasing vector of line indices. Even/odd position determines
//! meaning: `[bounds[2i], bounds[2i+1])` is a visible run, the gap up to the
//! next even boundary is hidden, and everything before `bounds[0]` or at and
//! after the last boundary is hidden. A fresh map over `n` lines is the
//! single visible run `[0, n)`, stored as `[0, n]`.
//!
//! ```text
//! lines:   0 1 2 | 3 4 5 6 | 7 8 9
//! state:   v v v   h h h h   v v v
//! bounds:  [0,        3,  7,      10]
//! ```
//!
//! # Invariants
//!
//! - `bounds.len()` is even and at least 2.
//! - `bounds` is strictly increasing. The one sanctioned exception is the
//!   empty-document map `[0, 0]`, which has no lines to describe.
//! - `bounds[0]` is the first visible line; `bounds[len-1] - 1` is the last.
//!
//! All mutating operations preserve these invariants by construction: range
//! toggles splice the boundary vector so that adjacent runs of equal
//! visibility coalesce and zero-length runs never appear, including at the
//! vector's physical ends.

use smallvec::SmallVec;
use std::cell::Cell;

/// Locality cache for [`VisibilityMap::run_index`].
///
/// Stores the boundary index of the last hit so sequential scans resolve in
/// O(1). Purely a performance hint: it is cleared by every structural
/// mutation and the search is correct with the cache disabled.
#[derive(Debug)]
struct SearchCache {
    last_run: Cell<usize>,
}

impl SearchCache {
    const NONE: usize = usize::MAX;

    fn new() -> Self {
        Self {
            last_run: Cell::new(Self::NONE),
        }
    }

    fn reset(&self) {
        self.last_run.set(Self::NONE);
    }
}

/// Interval-coded visible/hidden map over `[0, line_count)`.
#[derive(Debug)]
pub struct VisibilityMap {
    bounds: Vec<u32>,
    search: SearchCache,
}

impl VisibilityMap {
    /// A fresh map with every one of `line_count` lines visible.
    pub fn new(line_count: u32) -> Self {
        Self {
            bounds: vec![0, line_count],
            search: SearchCache::new(),
        }
    }

    /// Reset to the fresh all-visible state (the fold-producing analysis was
    /// rebuilt wholesale).
    pub fn reset(&mut self, line_count: u32) {
        self.bounds.clear();
        self.bounds.extend_from_slice(&[0, line_count]);
        self.search.reset();
    }

    /// The raw boundary vector. Exposed for assertions and diagnostics.
    pub fn boundaries(&self) -> &[u32] {
        &self.bounds
    }

    /// True for the degenerate empty-document map `[0, 0]`.
    pub fn is_degenerate(&self) -> bool {
        self.bounds[0] == self.bounds[1]
    }

    /// First visible line, or `None` for an empty document.
    pub fn first(&self) -> Option<u32> {
        if self.is_degenerate() {
            None
        } else {
            Some(self.bounds[0])
        }
    }

    /// Last visible line, or `None` for an empty document.
    pub fn last(&self) -> Option<u32> {
        if self.is_degenerate() {
            None
        } else {
            Some(self.bounds[self.bounds.len() - 1] - 1)
        }
    }

    /// Index of the run containing `line`: the largest `i` with
    /// `bounds[i] <= line`, or `None` when `line` precedes the first
    /// boundary. Even indices are visible runs, odd indices hidden ones
    /// (the index `len - 1` covers the hidden tail).
    fn run_index(&self, line: u32) -> Option<usize> {
        if line < self.bounds[0] {
            return None;
        }
        let hint = self.search.last_run.get();
        // Try the cached run and its successor before binary searching;
        // sequential scans hit one of the two almost every time.
        for i in [hint, hint.wrapping_add(1)] {
            if self.probe(i, line) {
                self.search.last_run.set(i);
                return Some(i);
            }
        }
        let i = self.bounds.partition_point(|&b| b <= line) - 1;
        self.search.last_run.set(i);
        Some(i)
    }

    /// Whether `i` is the run containing `line`.
    fn probe(&self, i: usize, line: u32) -> bool {
        i < self.bounds.len()
            && self.bounds[i] <= line
            && self.bounds.get(i + 1).is_none_or(|&b| line < b)
    }

    /// Whether `line` is currently visible.
    pub fn is_visible(&self, line: u32) -> bool {
        if self.is_degenerate() {
            return false;
        }
        matches!(self.run_index(line), Some(i) if i % 2 == 0)
    }

    /// The next visible line after `line` (itself excluded), or `None`.
    pub fn next(&self, line: u32) -> Option<u32> {
        if self.is_degenerate() {
            return None;
        }
        match self.run_index(line) {
            None => self.first(),
            Some(i) if i % 2 == 0 => {
                if line + 1 < self.bounds[i + 1] {
                    Some(line + 1)
                } else {
                    self.bounds.get(i + 2).copied()
                }
            }
            Some(i) => self.bounds.get(i + 1).copied(),
        }
    }

    /// The previous visible line before `line` (itself excluded), or `None`.
    pub fn prev(&self, line: u32) -> Option<u32> {
        if self.is_degenerate() {
            return None;
        }
        match self.run_index(line) {
            None => None,
            Some(i) if i % 2 == 0 => {
                if line > self.bounds[i] {
                    Some(line - 1)
                } else if i >= 2 {
                    Some(self.bounds[i - 1] - 1)
                } else {
                    None
                }
            }
            // A hidden run always follows a visible one, so `bounds[i] >= 1`.
            Some(i) => Some(self.bounds[i] - 1),
        }
    }

    /// The visible runs, as half-open line ranges.
    pub fn runs(&self) -> impl Iterator<Item = std::ops::Range<u32>> + '_ {
        self.bounds
            .chunks_exact(2)
            .map(|pair| pair[0]..pair[1])
            .filter(|r| !r.is_empty())
    }

    /// Make every line in `start..=end` visible.
    pub fn show(&mut self, start: u32, end: u32) {
        self.set_visibility(start, end, true);
    }

    /// Make every line in `start..=end` hidden.
    ///
    /// Hiding every remaining visible line is a caller error: the map must
    /// always describe at least one visible line for a non-empty document.
    pub fn hide(&mut self, start: u32, end: u32) {
        self.set_visibility(start, end, false);
    }

    /// Generalized splice behind [`show`](Self::show) and [`hide`](Self::hide).
    ///
    /// Boundaries strictly below `start` are kept, boundaries in
    /// `[start, end + 1]` are dropped, and `start` and/or `end + 1` are
    /// inserted depending on the visibility parity on each side. Coalescing
    /// with equal-visibility neighbors falls out of the parity rule.
    fn set_visibility(&mut self, start: u32, end: u32, visible: bool) {
        assert!(
            start <= end,
            "malformed visibility range {start}..={end} (start > end)"
        );
        let upper = end + 1;
        let lo = self.bounds.partition_point(|&b| b < start);
        let hi = self.bounds.partition_point(|&b| b <= upper);
        // State toggles at every boundary, starting hidden before bounds[0]:
        // an odd number of boundaries at or below a position means visible.
        let left_visible = lo % 2 == 1;
        let right_visible = hi % 2 == 1;

        let mut insert: SmallVec<[u32; 2]> = SmallVec::new();
        if left_visible != visible {
            insert.push(start);
        }
        if right_visible != visible {
            insert.push(upper);
        }

        assert!(
            !(lo == 0 && hi == self.bounds.len() && insert.is_empty()),
            "hide({start}, {end}) covers every visible line"
        );
        self.bounds.splice(lo..hi, insert);
        self.search.reset();
        self.assert_invariants();
    }

    /// Shift the map for `num_lines` lines inserted into the run containing
    /// `start_line`: every boundary after that run moves up, so the inserted
    /// lines adopt the run's visibility.
    pub fn content_inserted(&mut self, start_line: u32, num_lines: u32) {
        if num_lines == 0 {
            return;
        }
        if self.is_degenerate() {
            // Empty document: the insertion is the whole document now.
            self.reset(num_lines);
            return;
        }
        let from = match self.run_index(start_line) {
            None => 0,
            Some(i) => i + 1,
        };
        for b in &mut self.bounds[from..] {
            *b += num_lines;
        }
        self.search.reset();
        self.assert_invariants();
    }

    /// Collapse the map for a pending deletion of
    /// `[start_line, start_line + num_lines)`.
    ///
    /// Returns `true` when the deletion swallows the entire visible range --
    /// the caller's anchors must fully reset, and the map is left showing the
    /// single line at the deletion seam. Otherwise boundaries inside the span
    /// are clamped to the seam, zero-length runs cancel pairwise, the tail
    /// shifts down, and `false` is returned.
    pub fn pre_content_removed(&mut self, start_line: u32, num_lines: u32) -> bool {
        if num_lines == 0 || self.is_degenerate() {
            return false;
        }
        let end = start_line + num_lines;
        let (first, last) = (self.bounds[0], self.bounds[self.bounds.len() - 1] - 1);
        if start_line <= first && end > last {
            self.bounds.clear();
            self.bounds.extend_from_slice(&[start_line, start_line + 1]);
            self.search.reset();
            return true;
        }

        let mut out: Vec<u32> = Vec::with_capacity(self.bounds.len());
        for &b in &self.bounds {
            let nb = if b <= start_line {
                b
            } else if b <= end {
                start_line
            } else {
                b - num_lines
            };
            // Two equal adjacent boundaries toggle twice: a zero-length run
            // that merges its neighbors. Cancel the pair.
            if out.last() == Some(&nb) {
                out.pop();
            } else {
                out.push(nb);
            }
        }
        self.bounds = out;
        self.search.reset();
        self.assert_invariants();
        false
    }

    #[track_caller]
    fn assert_invariants(&self) {
        debug_assert!(
            self.bounds.len() >= 2 && self.bounds.len() % 2 == 0,
            "boundary vector must be even and non-empty: {:?}",
            self.bounds
        );
        debug_assert!(
            self.is_degenerate() || self.bounds.windows(2).all(|w| w[0] < w[1]),
            "boundary vector must be strictly increasing: {:?}",
            self.bounds
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible_lines(map: &VisibilityMap, line_count: u32) -> Vec<u32> {
        (0..line_count).filter(|&l| map.is_visible(l)).collect()
    }

    #[test]
    fn fresh_map_is_single_visible_run() {
        let map = VisibilityMap::new(10);
        assert_eq!(map.boundaries(), &[0, 10]);
        assert_eq!(map.first(), Some(0));
        assert_eq!(map.last(), Some(9));
        assert!((0..10).all(|l| map.is_visible(l)));
        assert!(!map.is_visible(10), "line 10 is past the end");
    }

    #[test]
    fn empty_document_has_no_visible_lines() {
        let map = VisibilityMap::new(0);
        assert_eq!(map.boundaries(), &[0, 0]);
        assert_eq!(map.first(), None);
        assert_eq!(map.last(), None);
        assert_eq!(map.next(0), None);
        assert_eq!(map.prev(0), None);
        assert!(!map.is_visible(0));
    }

    #[test]
    fn hide_middle_splits_run() {
        // Scenario: 10 lines, hide 3..=6.
        let mut map = VisibilityMap::new(10);
        map.hide(3, 6);
        assert_eq!(map.boundaries(), &[0, 3, 7, 10]);
        assert!(!map.is_visible(5), "line 5 is in the hidden run");
        assert_eq!(map.next(5), Some(7));
        assert_eq!(map.prev(5), Some(2));
    }

    #[test]
    fn show_rejoins_adjacent_runs() {
        let mut map = VisibilityMap::new(10);
        map.hide(3, 6);
        map.show(3, 6);
        assert_eq!(map.boundaries(), &[0, 10], "runs must coalesce back");
    }

    #[test]
    fn hide_at_document_start() {
        let mut map = VisibilityMap::new(10);
        map.hide(0, 4);
        assert_eq!(map.boundaries(), &[5, 10]);
        assert_eq!(map.first(), Some(5));
        assert_eq!(map.next(2), Some(5), "next from inside the hidden prefix");
        assert_eq!(map.prev(5), None);
    }

    #[test]
    fn hide_at_document_end() {
        let mut map = VisibilityMap::new(10);
        map.hide(7, 9);
        assert_eq!(map.boundaries(), &[0, 7]);
        assert_eq!(map.last(), Some(6));
        assert_eq!(map.next(6), None);
        assert_eq!(map.prev(8), Some(6), "prev from inside the hidden tail");
    }

    #[test]
    fn hide_merges_into_existing_hidden_neighbors() {
        let mut map = VisibilityMap::new(20);
        map.hide(3, 6);
        map.hide(10, 12);
        // Hiding the visible gap merges all three hidden spans into one.
        map.hide(7, 9);
        assert_eq!(map.boundaries(), &[0, 3, 13, 20]);
    }

    #[test]
    fn show_inside_hidden_run_splits_it() {
        let mut map = VisibilityMap::new(20);
        map.hide(5, 14);
        map.show(8, 10);
        assert_eq!(map.boundaries(), &[0, 5, 8, 11, 15, 20]);
        assert_eq!(map.next(5), Some(8));
        assert_eq!(map.prev(14), Some(10));
    }

    #[test]
    #[should_panic(expected = "start > end")]
    fn reversed_range_is_a_caller_error() {
        let mut map = VisibilityMap::new(10);
        map.hide(6, 3);
    }

    #[test]
    #[should_panic(expected = "covers every visible line")]
    fn hiding_everything_is_a_caller_error() {
        let mut map = VisibilityMap::new(10);
        map.hide(0, 9);
    }

    #[test]
    fn next_prev_roundtrip_on_visible_lines() {
        let mut map = VisibilityMap::new(16);
        map.hide(2, 4);
        map.hide(9, 12);
        for line in (0..16).filter(|&l| map.is_visible(l)) {
            if let Some(p) = map.prev(line) {
                assert_eq!(map.next(p), Some(line), "next(prev({line}))");
            }
            if let Some(n) = map.next(line) {
                assert_eq!(map.prev(n), Some(line), "prev(next({line}))");
            }
        }
    }

    #[test]
    fn content_inserted_shifts_later_boundaries() {
        // Scenario: boundaries [0,3,7,10], insert 2 lines at line 8.
        let mut map = VisibilityMap::new(10);
        map.hide(3, 6);
        map.content_inserted(8, 2);
        assert_eq!(map.boundaries(), &[0, 3, 7, 12]);
    }

    #[test]
    fn content_inserted_at_run_start_extends_the_run() {
        let mut map = VisibilityMap::new(10);
        map.hide(3, 6);
        // Inserting at the start of the visible run [7, 10) keeps the new
        // lines visible: only boundaries after that run shift.
        map.content_inserted(7, 3);
        assert_eq!(map.boundaries(), &[0, 3, 7, 13]);
        assert!(map.is_visible(7) && map.is_visible(9));
    }

    #[test]
    fn content_inserted_inside_hidden_run_stays_hidden() {
        let mut map = VisibilityMap::new(10);
        map.hide(3, 6);
        map.content_inserted(4, 2);
        assert_eq!(map.boundaries(), &[0, 3, 9, 12]);
        assert!(!map.is_visible(4) && !map.is_visible(8));
    }

    #[test]
    fn content_inserted_zero_lines_is_a_noop() {
        let mut map = VisibilityMap::new(10);
        map.hide(3, 6);
        map.content_inserted(5, 0);
        assert_eq!(map.boundaries(), &[0, 3, 7, 10]);
    }

    #[test]
    fn content_inserted_into_empty_document() {
        let mut map = VisibilityMap::new(0);
        map.content_inserted(0, 5);
        assert_eq!(map.boundaries(), &[0, 5]);
    }

    #[test]
    fn removal_inside_one_run_shrinks_it() {
        let mut map = VisibilityMap::new(10);
        map.hide(3, 6);
        // Remove lines 8..10 (inside the visible run [7, 10)).
        assert!(!map.pre_content_removed(8, 2));
        assert_eq!(map.boundaries(), &[0, 3, 7, 8]);
    }

    #[test]
    fn removal_spanning_runs_merges_them() {
        let mut map = VisibilityMap::new(10);
        map.hide(3, 6);
        // Remove lines 2..9: eats the tail of the first visible run, the
        // whole hidden run, and most of the second visible run.
        assert!(!map.pre_content_removed(2, 7));
        assert_eq!(map.boundaries(), &[0, 3]);
        assert_eq!(visible_lines(&map, 3), vec![0, 1, 2]);
    }

    #[test]
    fn removal_of_exactly_a_hidden_run() {
        let mut map = VisibilityMap::new(10);
        map.hide(3, 6);
        assert!(!map.pre_content_removed(3, 4));
        assert_eq!(map.boundaries(), &[0, 6], "visible neighbors coalesce");
    }

    #[test]
    fn removal_covering_all_visible_lines_requests_reset() {
        let mut map = VisibilityMap::new(10);
        map.hide(0, 2);
        map.hide(8, 9);
        // Visible range is [3, 8); deleting lines 1..9 swallows it whole.
        assert!(map.pre_content_removed(1, 8));
        assert_eq!(map.boundaries(), &[1, 2], "seam line stays visible");
    }

    #[test]
    fn hide_show_roundtrip_preserves_outside_state() {
        // Sweep all inclusive (start, end) pairs over a map with a hidden run
        // already present; hide-then-show must restore visibility for every
        // line outside the range and force it inside.
        const N: u32 = 12;
        for start in 0..N {
            for end in start..N {
                if start == 0 && end == N - 1 {
                    continue; // would hide everything
                }
                let mut map = VisibilityMap::new(N);
                map.hide(4, 6);
                let before = visible_lines(&map, N);
                map.hide(start, end);
                map.show(start, end);
                let after = visible_lines(&map, N);
                for l in 0..N {
                    let was = before.contains(&l);
                    let is = after.contains(&l);
                    if (start..=end).contains(&l) {
                        assert!(is, "line {l} inside shown range ({start},{end})");
                    } else {
                        assert_eq!(was, is, "line {l} outside range ({start},{end})");
                    }
                }
                // Invariants hold after every step.
                let b = map.boundaries();
                assert!(b.len() % 2 == 0);
                assert!(b.windows(2).all(|w| w[0] < w[1]), "{b:?}");
            }
        }
    }

    #[test]
    fn search_cache_is_only_a_hint() {
        let mut map = VisibilityMap::new(32);
        map.hide(5, 9);
        map.hide(20, 24);
        // Sequential forward scan primes the cache...
        for l in 0..32 {
            let _ = map.is_visible(l);
        }
        // ...and random-order queries must still answer correctly.
        for &l in &[31, 0, 22, 7, 15, 4, 25, 10, 19, 5] {
            let expected = !((5..=9).contains(&l) || (20..=24).contains(&l));
            assert_eq!(map.is_visible(l), expected, "line {l}");
        }
        // Clearing the hint never changes answers.
        map.search.reset();
        assert!(map.is_visible(15));
        map.search.reset();
        assert_eq!(map.next(9), Some(10));
        map.search.reset();
        assert_eq!(map.prev(20), Some(19));
    }
}
