//! Source location tracking: byte-offset spans, source files and a
//! multi-file [`SourceMap`] used to turn offsets back into line/column
//! pairs for diagnostics.

use std::ops::Range;
use std::sync::Arc;

/// Identifies a source file registered with a [`SourceMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

impl FileId {
    pub const DUMMY: FileId = FileId(0);

    pub const fn index(&self) -> usize {
        self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::DUMMY
    }
}

/// A byte-offset range in a source file, with precomputed line/column for
/// cheap diagnostic rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
    pub file_id: FileId,
}

impl Span {
    pub const DUMMY: Span = Span {
        start: 0,
        end: 0,
        line: 0,
        column: 0,
        file_id: FileId::DUMMY,
    };

    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self { start, end, line, column, file_id: FileId::DUMMY }
    }

    pub fn with_file(start: usize, end: usize, file_id: FileId, line: u32, column: u32) -> Self {
        Self { start, end, line, column, file_id }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Smallest span covering both `self` and `other`. Assumes both spans
    /// belong to the same file; takes `self`'s `file_id`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line.min(other.line),
            column: if self.line <= other.line { self.column } else { other.column },
            file_id: self.file_id,
        }
    }

    pub fn with_file_id(mut self, file_id: FileId) -> Self {
        self.file_id = file_id;
        self
    }
}

/// An in-memory source file with precomputed line-start offsets so that
/// byte offset -> (line, column) lookups don't rescan the file.
#[derive(Clone)]
pub struct SourceFile {
    id: FileId,
    name: String,
    content: Arc<str>,
    line_starts: Arc<[usize]>,
}

impl SourceFile {
    pub fn new(id: usize, name: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        let content = content.into();
        let line_starts = Self::compute_line_starts(&content);
        Self { id: FileId(id), name: name.into(), content, line_starts }
    }

    fn compute_line_starts(content: &str) -> Arc<[usize]> {
        let mut starts = vec![0];
        for (i, ch) in content.char_indices() {
            if ch == '\n' {
                starts.push(i + 1);
            }
        }
        starts.into()
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Converts a byte offset into a 1-indexed (line, column) pair.
    pub fn offset_to_line_col(&self, offset: usize) -> (usize, usize) {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => (line + 1, 1),
            Err(0) => (1, offset + 1),
            Err(next) => {
                let line = next - 1;
                (line + 1, offset - self.line_starts[line] + 1)
            }
        }
    }

    pub fn line_at(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line)?;
        let end = self.line_starts.get(line + 1).copied().unwrap_or(self.content.len());
        Some(self.content[start..end].trim_end_matches('\n'))
    }

    pub fn extract(&self, range: Range<usize>) -> &str {
        &self.content[range]
    }
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("line_count", &self.line_count())
            .finish()
    }
}

/// Owns every [`SourceFile`] fed into a compilation and resolves spans
/// against them for error rendering.
#[derive(Default)]
pub struct SourceMap {
    files: Vec<Arc<SourceFile>>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, content: impl Into<Arc<str>>) -> FileId {
        let id = self.files.len();
        let file = SourceFile::new(id, name, content);
        self.files.push(Arc::new(file));
        FileId(id)
    }

    pub fn get(&self, id: FileId) -> Option<Arc<SourceFile>> {
        self.files.get(id.0).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Renders `file:line:column` for a span, or `None` if the file isn't
    /// registered.
    pub fn format_span(&self, span: Span) -> Option<String> {
        let file = self.get(span.file_id)?;
        Some(format!("{}:{}:{}", file.name(), span.line, span.column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_spans_widen_to_cover_both() {
        let a = Span::new(0, 5, 1, 1);
        let b = Span::new(10, 20, 2, 1);
        let m = a.merge(b);
        assert_eq!((m.start, m.end), (0, 20));
    }

    #[test]
    fn offset_to_line_col_finds_second_line() {
        let file = SourceFile::new(0, "t.vl", "abc\ndef\nghi");
        assert_eq!(file.offset_to_line_col(4), (2, 1));
        assert_eq!(file.offset_to_line_col(5), (2, 2));
    }

    #[test]
    fn line_at_strips_trailing_newline() {
        let file = SourceFile::new(0, "t.vl", "first\nsecond\n");
        assert_eq!(file.line_at(0), Some("first"));
        assert_eq!(file.line_at(1), Some("second"));
    }

    #[test]
    fn source_map_assigns_sequential_file_ids() {
        let mut map = SourceMap::new();
        let a = map.add_file("a.vl", "fn a() {}");
        let b = map.add_file("b.vl", "fn b() {}");
        assert_eq!(a, FileId(0));
        assert_eq!(b, FileId(1));
        assert_eq!(map.file_count(), 2);
    }
}
