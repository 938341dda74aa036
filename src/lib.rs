//! Folio Reader: pagination and navigation core for an e-book reader
//!
//! This crate turns a decoded document into a deterministic sequence of
//! fixed-size pages and keeps that mapping consistent as the reader changes
//! font size or page geometry:
//! - Pagination of flowed text and fixed-layout pages into a chapter table
//! - Chapter/page navigation with a one-level chapter rollback slot
//! - Size-bounded LRU cache of rendered pages, shared across threads
//! - Background relayout where the most recent request wins

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod layout;
pub mod navigation;
pub mod reader;
pub mod wasm;

// Re-export WASM types for direct use
pub use wasm::WasmReader;

// Re-export primary types
pub use cache::{CacheStats, PageKey, PutOutcome, ResourceCache, CACHE_CAPACITY_BYTES};
pub use config::ReaderConfig;
pub use document::{
    Document, DocumentId, DocumentLoader, DocumentSource, FileLoader, FixedPageSource, FlowEvent,
    PageContent, RenderedPage, StyleSheet, TextLine, TextSource,
};
pub use error::{IndexError, LayoutError, OpenError, ReaderError, RenderError};
pub use layout::{paginate, FlowOptions, FontMetrics, PageGeometry, Pagination};
pub use navigation::{Chapter, ChapterTable, NavigationState, Navigator};
pub use reader::{LayoutTask, OpenOptions, Reader};

/// Page dimensions in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Both dimensions are finite and strictly positive
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}
