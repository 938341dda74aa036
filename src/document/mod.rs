//! Document handles and the decoder/render adapter interface

mod block;
mod fixed;
mod loader;
mod page;
mod text;

pub use block::{parse_blocks, Block, BlockKind};
pub use fixed::FixedPageSource;
pub use loader::FileLoader;
pub use page::{PageContent, RenderedPage, TextLine};
pub use text::TextSource;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{LayoutError, OpenError, RenderError};
use crate::layout::PageGeometry;

/// Process-unique identity of an opened document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

impl DocumentId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

/// Style sheet handed to the decoder untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StyleSheet(String);

impl StyleSheet {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Boundary events produced while a decoder flows content into pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// A new chapter begins at the current position
    ChapterStart { title: String },
    /// Content was placed on the current page
    Content,
    /// The current page is full; following content goes on the next page
    PageBreak,
}

/// Decoded document content: flows into pages and renders them.
///
/// Both operations must be pure functions of their inputs; pagination and
/// the page cache rely on identical inputs producing identical output.
pub trait DocumentSource: Send + Sync {
    /// Display name, used as the title of the implicit chapter
    fn name(&self) -> &str;

    /// Flow the content into pages of `geometry`
    fn flow(
        &self,
        geometry: &PageGeometry,
        style: Option<&StyleSheet>,
    ) -> Result<Vec<FlowEvent>, LayoutError>;

    /// Render one page laid out at `geometry`
    fn render(&self, page_index: usize, geometry: &PageGeometry) -> Result<RenderedPage, RenderError>;
}

/// Turns a file into a document source
pub trait DocumentLoader: Send + Sync {
    fn load(
        &self,
        path: &Path,
        style: Option<&StyleSheet>,
    ) -> Result<Arc<dyn DocumentSource>, OpenError>;
}

/// An opened document, owned by the reader
pub struct Document {
    id: DocumentId,
    path: Option<PathBuf>,
    style: Option<StyleSheet>,
    source: Arc<dyn DocumentSource>,
}

impl Document {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        path: Option<PathBuf>,
        style: Option<StyleSheet>,
    ) -> Self {
        Self {
            id: DocumentId::next(),
            path,
            style,
            source,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn style(&self) -> Option<&StyleSheet> {
        self.style.as_ref()
    }

    pub fn source(&self) -> &dyn DocumentSource {
        self.source.as_ref()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FlowOptions;

    #[test]
    fn test_document_ids_are_unique() {
        let source: Arc<dyn DocumentSource> =
            Arc::new(TextSource::new("A", "text", FlowOptions::default()));
        let first = Document::new(Arc::clone(&source), None, None);
        let second = Document::new(source, None, None);
        assert_ne!(first.id(), second.id());
        assert_eq!(first.name(), "A");
    }
}
