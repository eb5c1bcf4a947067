//! Error types shared by the utility layer: interning, source maps, typed
//! arenas and diagnostics each get their own enum so callers can match on
//! what actually went wrong.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("failed to intern symbol: {0}")]
    InternFailed(String),
    #[error("symbol not found: index {index}")]
    NotFound { index: u32 },
}

#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("invalid span: start {start} > end {end}")]
    InvalidSpan { start: usize, end: usize },
    #[error("span out of bounds: file has {file_len} bytes, span is {span_start}..{span_end}")]
    SpanOutOfBounds { file_len: usize, span_start: usize, span_end: usize },
    #[error("invalid line number: {line} (file has {max_lines} lines)")]
    InvalidLineNumber { line: usize, max_lines: usize },
}

#[derive(Debug, Error)]
pub enum IndexVecError {
    #[error("index out of bounds: index {index}, length {length}")]
    OutOfBounds { index: usize, length: usize },
}

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("failed to format diagnostic: {0}")]
    FormatFailed(String),
    #[error("invalid diagnostic code: {0}")]
    InvalidCode(String),
}

pub type SymbolResult<T> = std::result::Result<T, SymbolError>;
pub type SourceMapResult<T> = std::result::Result<T, SourceMapError>;
pub type IndexVecResult<T> = std::result::Result<T, IndexVecError>;
pub type DiagnosticResult<T> = std::result::Result<T, DiagnosticError>;
