//! WASM bindings for the reader
//!
//! Only the synchronous operations are exposed: layout runs on the calling
//! thread since wasm32 has no worker threads here.

use std::sync::Arc;

use wasm_bindgen::prelude::*;

use crate::config::ReaderConfig;
use crate::document::TextSource;
use crate::error::ReaderError;
use crate::reader::{OpenOptions, Reader};

/// Initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WASM-exposed reader over an in-memory text document
#[wasm_bindgen]
pub struct WasmReader {
    reader: Reader,
}

#[wasm_bindgen]
impl WasmReader {
    /// Paginate `text` (Markdown-style `# ` headings start chapters)
    #[wasm_bindgen(constructor)]
    pub fn new(
        text: &str,
        page_width: f32,
        page_height: f32,
        font_size: f32,
    ) -> Result<WasmReader, JsValue> {
        Self::from_text(text, page_width, page_height, font_size)
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    #[wasm_bindgen(js_name = pageCount)]
    pub fn page_count(&self) -> usize {
        self.reader.page_count().unwrap_or(0)
    }

    #[wasm_bindgen(js_name = chapterCount)]
    pub fn chapter_count(&self) -> usize {
        self.reader.chapters().map(|c| c.len()).unwrap_or(0)
    }

    #[wasm_bindgen(js_name = chapterIndex)]
    pub fn chapter_index(&self) -> usize {
        self.reader.current_chapter().unwrap_or(0)
    }

    #[wasm_bindgen(js_name = pageIndex)]
    pub fn page_index(&self) -> usize {
        self.reader.current_page().unwrap_or(0)
    }

    /// Chapter titles in reading order
    #[wasm_bindgen(js_name = chapterTitles)]
    pub fn chapter_titles(&self) -> js_sys::Array {
        self.titles()
            .into_iter()
            .map(|title| JsValue::from_str(&title))
            .collect()
    }

    /// Returns false for an out-of-range chapter
    #[wasm_bindgen(js_name = switchChapter)]
    pub fn switch_chapter(&mut self, chapter: usize) -> bool {
        self.reader.switch_chapter(chapter).is_ok()
    }

    /// Returns false for an out-of-range page
    #[wasm_bindgen(js_name = switchToPage)]
    pub fn switch_to_page(&mut self, page: usize) -> bool {
        self.reader.switch_to_page(page).is_ok()
    }

    #[wasm_bindgen(js_name = nextPage)]
    pub fn next_page(&mut self) -> bool {
        self.reader.next_page().unwrap_or(false)
    }

    #[wasm_bindgen(js_name = previousPage)]
    pub fn previous_page(&mut self) -> bool {
        self.reader.previous_page().unwrap_or(false)
    }

    #[wasm_bindgen(js_name = recordCurrentChapter)]
    pub fn record_current_chapter(&mut self) -> bool {
        self.reader.record_current_chapter().is_ok()
    }

    #[wasm_bindgen(js_name = rollbackChapter)]
    pub fn rollback_chapter(&mut self) -> bool {
        self.reader.rollback_chapter().is_ok()
    }

    /// Relayout; on failure the previous layout stays
    #[wasm_bindgen(js_name = updateFontSize)]
    pub fn update_font_size(&mut self, font_size: f32) -> bool {
        self.reader.update_font_size(font_size).is_ok()
    }

    #[wasm_bindgen(js_name = readingProgress)]
    pub fn reading_progress(&self) -> f64 {
        self.reader.reading_progress().unwrap_or(0.0)
    }

    /// Lines of a page joined with newlines
    #[wasm_bindgen(js_name = pageText)]
    pub fn page_text(&self, page: usize) -> Option<String> {
        self.reader.page_view(page).ok().and_then(|view| view.text())
    }

    /// Positioned lines of a page as JSON
    #[wasm_bindgen(js_name = pageJson)]
    pub fn page_json(&self, page: usize) -> Option<String> {
        let view = self.reader.page_view(page).ok()?;
        serde_json::to_string(view.as_ref()).ok()
    }
}

impl WasmReader {
    fn from_text(
        text: &str,
        page_width: f32,
        page_height: f32,
        font_size: f32,
    ) -> Result<Self, ReaderError> {
        let config = ReaderConfig {
            page_width,
            page_height,
            font_size,
            ..ReaderConfig::default()
        };
        let source = Arc::new(TextSource::new("Untitled", text, config.flow.clone()));
        let reader = Reader::new(config);
        reader.open_source(source, OpenOptions::new())?;
        Ok(Self { reader })
    }

    fn titles(&self) -> Vec<String> {
        self.reader
            .chapters()
            .map(|chapters| chapters.into_iter().map(|c| c.title).collect())
            .unwrap_or_default()
    }
}
