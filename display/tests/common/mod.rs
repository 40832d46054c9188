//! Shared harness for the integration suites: the simple collaborators wired
//! together, edit helpers that emit notifications the way a document layer
//! would, and a recording viewport client.

use lineview_display::{
    simple::{SimpleDocument, SimpleLayout, SimpleMetrics},
    FoldCoordinator, LineMetrics, ViewportClient,
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

pub struct Fixture {
    pub document: Rc<SimpleDocument>,
    pub metrics: Rc<SimpleMetrics>,
    pub layout: Rc<SimpleLayout>,
}

impl Fixture {
    /// `wrap_width == 0` disables soft wrap.
    pub fn new(text: &str, wrap_width: u32) -> Self {
        lineview_log::test();
        let document = SimpleDocument::new(1, text);
        let metrics = SimpleMetrics::new(document.clone(), wrap_width);
        let layout = SimpleLayout::new(metrics.clone());
        Self {
            document,
            metrics,
            layout,
        }
    }

    pub fn coordinator(&self) -> FoldCoordinator {
        FoldCoordinator::new(self.document.clone(), self.metrics.clone())
    }

    pub fn shared_coordinator(&self) -> Rc<RefCell<FoldCoordinator>> {
        Rc::new(RefCell::new(self.coordinator()))
    }

    /// Insert lines and send the post-edit notification.
    pub fn insert_lines(&self, coordinator: &mut FoldCoordinator, at: u32, lines: &[&str]) {
        self.document.insert_lines(at, lines);
        self.metrics.invalidate_all();
        coordinator.content_inserted(&lineview_display::EditRecord::lines(
            at,
            lines.len() as u32,
        ));
    }

    /// Send the pre-edit notification, remove the lines, send the post-edit
    /// notification.
    pub fn remove_lines(&self, coordinator: &mut FoldCoordinator, at: u32, count: u32) {
        let edit = lineview_display::EditRecord::lines(at, count);
        coordinator.pre_content_removed(&edit);
        self.document.remove_lines(at, count);
        self.metrics.invalidate_all();
        coordinator.content_removed(&edit);
    }

    /// Replace one line's text and send the row-count-change notification.
    pub fn edit_line(&self, coordinator: &mut FoldCoordinator, line: u32, text: &str) {
        let old_rows = self.metrics.row_count(line);
        self.document.set_line(line, text);
        self.metrics.invalidate_line(line);
        coordinator.row_count_changed(line, old_rows);
    }

    /// Independent recomputation of the total row count, for cross-checks.
    pub fn scan_total(&self, coordinator: &FoldCoordinator) -> u32 {
        (0..self.document_line_count())
            .filter(|&l| coordinator.is_line_visible(l))
            .map(|l| self.metrics.row_count(l))
            .sum()
    }

    /// Independent recomputation of a line's scroll row, for cross-checks.
    pub fn scan_scroll_row(&self, coordinator: &FoldCoordinator, line: u32) -> u32 {
        (0..line)
            .filter(|&l| coordinator.is_line_visible(l))
            .map(|l| self.metrics.row_count(l))
            .sum()
    }

    fn document_line_count(&self) -> u32 {
        use lineview_display::Document as _;
        self.document.line_count()
    }
}

/// Viewport client that records what it is told.
#[derive(Default)]
pub struct RecordingClient {
    pub rows: Cell<usize>,
    pub scroll_range_changes: RefCell<Vec<u32>>,
    pub repaints: Cell<usize>,
}

impl RecordingClient {
    pub fn new(rows: usize) -> Rc<Self> {
        Rc::new(Self {
            rows: Cell::new(rows),
            ..Self::default()
        })
    }
}

impl ViewportClient for RecordingClient {
    fn viewport_rows(&self) -> usize {
        self.rows.get()
    }

    fn scroll_range_changed(&self, total_rows: u32) {
        self.scroll_range_changes.borrow_mut().push(total_rows);
    }

    fn repaint_requested(&self) {
        self.repaints.set(self.repaints.get() + 1);
    }
}
