//! Loading documents from the filesystem

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::document::text::TextSource;
use crate::document::{DocumentLoader, DocumentSource, StyleSheet};
use crate::error::OpenError;
use crate::layout::FlowOptions;

/// Opens plain-text and Markdown files as reflowable documents
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    flow: FlowOptions,
}

impl FileLoader {
    pub fn new(flow: FlowOptions) -> Self {
        Self { flow }
    }
}

impl DocumentLoader for FileLoader {
    fn load(
        &self,
        path: &Path,
        _style: Option<&StyleSheet>,
    ) -> Result<Arc<dyn DocumentSource>, OpenError> {
        if !path.exists() {
            return Err(OpenError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !matches!(extension.as_str(), "txt" | "md" | "markdown") {
            return Err(OpenError::UnsupportedFormat(if extension.is_empty() {
                path.display().to_string()
            } else {
                extension
            }));
        }

        let bytes = fs::read(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| OpenError::Corrupt(format!("invalid UTF-8: {}", e)))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Untitled");

        tracing::debug!(path = %path.display(), bytes = text.len(), "Loaded text document");

        Ok(Arc::new(TextSource::new(name, &text, self.flow.clone())))
    }
}
