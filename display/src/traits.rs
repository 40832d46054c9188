//! Collaborator interfaces consumed by the virtualization engine.
//!
//! The engine never renders, tokenizes, or edits text itself. Everything it
//! needs from the surrounding application arrives through the traits in this
//! module: line counts and fold depths from [`Document`], wrap-row counts from
//! [`LineMetrics`], wrap-subregion shapes from [`LineLayout`], and viewport
//! geometry plus repaint signalling from [`ViewportClient`].
//!
//! # Invariants
//!
//! Implementations must uphold:
//!
//! 1. **Fold monotonicity**: [`Document::fold_level`] is monotone within a
//!    fold body and strictly lower outside it. A fold's body is the maximal
//!    contiguous run of lines after the fold start whose level exceeds the
//!    start line's level.
//!
//! 2. **Row count floor**: [`LineMetrics::row_count`] is `>= 1` for every
//!    line, including empty ones. A physical line always occupies at least
//!    one screen row.
//!
//! 3. **Shape agreement**: for any line, `LineLayout::shape(line).rows.len()`
//!    equals `LineMetrics::row_count(line)` whenever the metrics entry is
//!    valid. The cache repairs transient disagreement during live editing,
//!    but steady-state divergence is a collaborator bug.

use smallvec::SmallVec;

/// Identity of a document, used to key per-document coordinator pooling.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialOrd, PartialEq, Hash)]
pub struct DocumentId(pub u64);

/// Opaque tokenizer state at the end of a line.
///
/// The engine only ever compares contexts for equality: a changed context at
/// the bottom of the viewport means everything downstream must be retokenized
/// and repainted.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ContextId(pub u64);

/// One styled run within a wrap subregion.
///
/// `start` is an offset within the physical line; `style` is an opaque id the
/// UI layer maps to visual attributes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Chunk {
    pub start: u32,
    pub len: u32,
    pub style: u32,
}

/// One wrap subregion of a physical line: the slice of the line occupying a
/// single screen row, plus its chunk list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubLine {
    /// Offset of the subregion within the physical line.
    pub start: u32,
    /// Length of the subregion.
    pub len: u32,
    /// Styled runs covering the subregion.
    pub chunks: SmallVec<[Chunk; 4]>,
}

/// The full wrap shape of one physical line.
///
/// `rows` is never empty: a line with no content still produces one empty
/// subregion (it occupies one screen row).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LineShape {
    pub rows: Vec<SubLine>,
    /// Tokenizer state carried past this line's end.
    pub end_context: ContextId,
}

impl LineShape {
    /// Shape of a line that occupies a single unwrapped row.
    pub fn single(len: u32, chunks: SmallVec<[Chunk; 4]>, end_context: ContextId) -> Self {
        Self {
            rows: vec![SubLine {
                start: 0,
                len,
                chunks,
            }],
            end_context,
        }
    }
}

/// A document edit, in the shape the document layer reports it.
///
/// The engine consumes the line fields; the char fields ride along for UI
/// layers that track offsets through the same notification stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EditRecord {
    /// First line touched by the edit.
    pub start_line: u32,
    /// Char offset of the edit within the document.
    pub char_offset: usize,
    /// Number of whole lines inserted or removed.
    pub num_lines: u32,
    /// Number of chars inserted or removed.
    pub char_len: usize,
}

impl EditRecord {
    /// A purely line-shaped edit record, for callers that don't track offsets.
    pub fn lines(start_line: u32, num_lines: u32) -> Self {
        Self {
            start_line,
            char_offset: 0,
            num_lines,
            char_len: 0,
        }
    }
}

/// Read-only view of the document the engine virtualizes.
///
/// Edit notifications do not flow through this trait; the document layer
/// pushes them into each [`FoldCoordinator`](crate::FoldCoordinator), usually
/// via a [`CoordinatorRegistry`](crate::CoordinatorRegistry) broadcast.
pub trait Document {
    fn id(&self) -> DocumentId;

    /// Total physical line count.
    fn line_count(&self) -> u32;

    /// Fold depth of a line, monotone within a fold body.
    fn fold_level(&self, line: u32) -> u32;

    /// Whether a fold body begins immediately after `line`.
    fn is_fold_start(&self, line: u32) -> bool {
        line + 1 < self.line_count() && self.fold_level(line + 1) > self.fold_level(line)
    }
}

/// Per-line wrap-row counts, with per-line cache validity.
///
/// This trait *is* the row-count cache: `row_count` may compute lazily, and
/// the owning application invalidates entries when content or wrap width
/// changes. The engine treats it as cheap to call.
pub trait LineMetrics {
    /// Number of screen rows `line` occupies when wrapped. Always `>= 1`.
    fn row_count(&self, line: u32) -> u32;

    /// Whether the cached count for `line` is current.
    fn is_row_count_valid(&self, line: u32) -> bool;

    /// Drop every cached count (wrap width or font changed).
    fn invalidate_all(&self);
}

/// Produces the wrap/tokenization shape of a physical line.
///
/// The engine consumes only the *shape* of the result -- subregion offsets,
/// row count, context equality -- never its visual rendering.
pub trait LineLayout {
    fn shape(&self, line: u32) -> LineShape;
}

/// The viewport owner: supplies geometry and receives repaint signals.
pub trait ViewportClient {
    /// Current viewport height in rows, used to size the screen-line cache.
    fn viewport_rows(&self) -> usize;

    /// The total scrollable row count changed; update the scrollbar.
    fn scroll_range_changed(&self, total_rows: u32);

    /// Displayed content moved in a way partial recaching cannot describe;
    /// repaint everything.
    fn repaint_requested(&self);
}
