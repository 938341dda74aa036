//! Error types for opening, laying out and navigating documents

use std::path::PathBuf;
use thiserror::Error;

/// Failure to open or decode a document
#[derive(Debug, Error)]
pub enum OpenError {
    /// File does not exist
    #[error("Document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File exists but could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No decoder handles this format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoder rejected the content
    #[error("Corrupt document: {0}")]
    Corrupt(String),
}

/// Failure to flow a document into pages
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Page dimensions that cannot hold any content
    #[error("Invalid page geometry: {width}x{height}")]
    InvalidGeometry { width: f32, height: f32 },

    /// Font size that is zero, negative or not finite
    #[error("Invalid font size: {0}")]
    InvalidFontSize(f32),

    /// The decoder failed mid-flow
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// A newer relayout request replaced this one before it was applied
    #[error("Layout superseded by a newer request")]
    Superseded,
}

/// Out-of-range page or chapter index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("Page index {index} out of range (page count {count})")]
    Page { index: usize, count: usize },

    #[error("Chapter index {index} out of range (chapter count {count})")]
    Chapter { index: usize, count: usize },
}

/// Failure of the render adapter to produce a page
#[derive(Debug, Error)]
#[error("Render error: {0}")]
pub struct RenderError(pub String);

/// Any failure surfaced by the reader facade
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// No document is open
    #[error("No document is open")]
    NotOpen,

    /// A background layout worker could not be started
    #[error("Layout worker error: {0}")]
    Worker(std::io::Error),
}

impl ReaderError {
    /// True when a relayout lost to a newer request
    pub fn is_superseded(&self) -> bool {
        matches!(self, ReaderError::Layout(LayoutError::Superseded))
    }
}

/// Result alias for reader operations
pub type Result<T> = std::result::Result<T, ReaderError>;
