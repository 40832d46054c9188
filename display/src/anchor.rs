//! Deferred-recompute anchors for the fold/scroll coordinator.
//!
//! An anchor is a cached scroll quantity that must stay correct as the
//! document and the fold/wrap structure change. Rather than rescanning on
//! every keystroke, each anchor carries an explicit repair state that the
//! coordinator drains once per notification batch:
//!
//! ```text
//! Clean -> NeedsIncremental -> NeedsReset
//! ```
//!
//! `NeedsIncremental` means a cheap local fix suffices (apply an accumulated
//! signed delta, clamp the skew); `NeedsReset` means the structure changed
//! too much to patch and the value is re-derived by scanning from the first
//! visible line. Reset dominates: once requested, later incremental requests
//! cannot downgrade it.

use std::mem;

/// Repair state of an anchor. Ordering encodes dominance.
#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub enum AnchorState {
    /// The cached value is exact.
    #[default]
    Clean,
    /// A pending signed delta must be applied.
    NeedsIncremental,
    /// The cached value must be re-derived from scratch.
    NeedsReset,
}

impl AnchorState {
    /// Escalate to `requested` unless the current state already dominates.
    pub fn request(&mut self, requested: AnchorState) {
        *self = (*self).max(requested);
    }

    /// Drain the state back to `Clean`, returning what was pending.
    pub fn take(&mut self) -> AnchorState {
        mem::take(self)
    }

    pub fn is_clean(&self) -> bool {
        *self == AnchorState::Clean
    }
}

/// The top-of-viewport anchor.
///
/// `scroll_row` is the sum of wrap-row counts over all visible lines strictly
/// before `line`; `skew` counts how many of `line`'s own wrap rows have
/// already scrolled past. The viewport's first displayed row is therefore
/// `scroll_row + skew`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TopAnchor {
    pub line: u32,
    pub scroll_row: u32,
    pub skew: u32,
    pub state: AnchorState,
}

/// The total scrollable-row-count anchor: the sum of wrap-row counts over
/// every visible line.
#[derive(Clone, Copy, Debug, Default)]
pub struct RowsAnchor {
    pub rows: u32,
    pub state: AnchorState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_dominates_incremental() {
        let mut state = AnchorState::Clean;
        state.request(AnchorState::NeedsReset);
        state.request(AnchorState::NeedsIncremental);
        assert_eq!(state, AnchorState::NeedsReset);
    }

    #[test]
    fn incremental_escalates_from_clean() {
        let mut state = AnchorState::Clean;
        state.request(AnchorState::NeedsIncremental);
        assert_eq!(state, AnchorState::NeedsIncremental);
        state.request(AnchorState::NeedsReset);
        assert_eq!(state, AnchorState::NeedsReset);
    }

    #[test]
    fn take_drains_to_clean() {
        let mut state = AnchorState::NeedsReset;
        assert_eq!(state.take(), AnchorState::NeedsReset);
        assert!(state.is_clean());
        assert_eq!(state.take(), AnchorState::Clean);
    }
}
