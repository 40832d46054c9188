//! Simple in-memory collaborators.
//!
//! Reference implementations of the collaborator traits, small enough to
//! read in one sitting: a line-vector document whose fold levels derive from
//! leading indentation, a metrics cache that wraps at a fixed column, and a
//! layout that cuts lines into fixed-width subregions. The workspace's own
//! tests run on these; embedders can start from them and swap in real
//! tokenization and pixel metrics later.

use crate::traits::{
    Chunk, ContextId, Document, DocumentId, LineLayout, LineMetrics, LineShape, SubLine,
};
use rustc_hash::FxHashMap;
use smallvec::smallvec;
use std::{
    cell::{Cell, RefCell},
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    rc::Rc,
};

/// In-memory document with indentation-derived fold levels.
///
/// The fold level of a line is its leading whitespace width (tabs expand to
/// `tab_width`); blank lines inherit the level of the following non-blank
/// line so they fold together with the block above them.
pub struct SimpleDocument {
    id: DocumentId,
    lines: RefCell<Vec<String>>,
    tab_width: u32,
}

impl SimpleDocument {
    pub fn new(id: u64, text: &str) -> Rc<Self> {
        Rc::new(Self {
            id: DocumentId(id),
            lines: RefCell::new(text.split('\n').map(str::to_owned).collect()),
            tab_width: 4,
        })
    }

    pub fn line(&self, line: u32) -> String {
        self.lines.borrow()[line as usize].clone()
    }

    pub fn set_line(&self, line: u32, text: &str) {
        self.lines.borrow_mut()[line as usize] = text.to_owned();
    }

    pub fn insert_lines(&self, at: u32, lines: &[&str]) {
        self.lines
            .borrow_mut()
            .splice(at as usize..at as usize, lines.iter().map(|l| (*l).to_owned()));
    }

    pub fn remove_lines(&self, at: u32, count: u32) {
        self.lines
            .borrow_mut()
            .drain(at as usize..(at + count) as usize);
    }

    fn indent_width(&self, text: &str) -> u32 {
        let mut width = 0;
        for ch in text.chars() {
            match ch {
                ' ' => width += 1,
                '\t' => width += self.tab_width,
                _ => break,
            }
        }
        width
    }
}

impl Document for SimpleDocument {
    fn id(&self) -> DocumentId {
        self.id
    }

    fn line_count(&self) -> u32 {
        self.lines.borrow().len() as u32
    }

    fn fold_level(&self, line: u32) -> u32 {
        let lines = self.lines.borrow();
        let mut l = line as usize;
        // Blank lines take the level of the next non-blank line.
        while l < lines.len() && lines[l].trim().is_empty() {
            l += 1;
        }
        match lines.get(l) {
            Some(text) => self.indent_width(text),
            None => 0,
        }
    }
}

/// Wrap-row counts at a fixed column, with per-line cache validity.
pub struct SimpleMetrics {
    document: Rc<SimpleDocument>,
    wrap_width: Cell<u32>,
    cache: RefCell<FxHashMap<u32, u32>>,
}

impl SimpleMetrics {
    /// `wrap_width == 0` disables wrapping: every line is one row.
    pub fn new(document: Rc<SimpleDocument>, wrap_width: u32) -> Rc<Self> {
        Rc::new(Self {
            document,
            wrap_width: Cell::new(wrap_width),
            cache: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn wrap_width(&self) -> u32 {
        self.wrap_width.get()
    }

    pub fn set_wrap_width(&self, wrap_width: u32) {
        self.wrap_width.set(wrap_width);
        self.invalidate_all();
    }

    /// Drop one line's cached count (its content changed).
    pub fn invalidate_line(&self, line: u32) {
        self.cache.borrow_mut().remove(&line);
    }

    fn compute(&self, line: u32) -> u32 {
        let len = self.document.line(line).chars().count() as u32;
        let wrap = self.wrap_width.get();
        if wrap == 0 || len == 0 {
            1
        } else {
            len.div_ceil(wrap)
        }
    }
}

impl LineMetrics for SimpleMetrics {
    fn row_count(&self, line: u32) -> u32 {
        if let Some(&rows) = self.cache.borrow().get(&line) {
            return rows;
        }
        let rows = self.compute(line);
        self.cache.borrow_mut().insert(line, rows);
        rows
    }

    fn is_row_count_valid(&self, line: u32) -> bool {
        self.cache.borrow().contains_key(&line)
    }

    fn invalidate_all(&self) {
        self.cache.borrow_mut().clear();
    }
}

/// Fixed-width wrap layout with one chunk per subregion and content-hashed
/// end-of-line contexts, so context equality behaves like a real
/// tokenizer's.
pub struct SimpleLayout {
    metrics: Rc<SimpleMetrics>,
}

impl SimpleLayout {
    pub fn new(metrics: Rc<SimpleMetrics>) -> Rc<Self> {
        Rc::new(Self { metrics })
    }
}

impl LineLayout for SimpleLayout {
    fn shape(&self, line: u32) -> LineShape {
        let text = self.metrics.document.line(line);
        let len = text.chars().count() as u32;
        let wrap = self.metrics.wrap_width();

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let end_context = ContextId(hasher.finish());

        if wrap == 0 || len == 0 {
            let chunks = if len == 0 {
                smallvec![]
            } else {
                smallvec![Chunk {
                    start: 0,
                    len,
                    style: 0,
                }]
            };
            return LineShape::single(len, chunks, end_context);
        }

        let rows = (0..len)
            .step_by(wrap as usize)
            .map(|start| {
                let sub_len = wrap.min(len - start);
                SubLine {
                    start,
                    len: sub_len,
                    chunks: smallvec![Chunk {
                        start,
                        len: sub_len,
                        style: 0,
                    }],
                }
            })
            .collect();
        LineShape { rows, end_context }
    }
}
