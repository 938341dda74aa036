//! Rendered page resources

use serde::Serialize;

use crate::layout::PageGeometry;

/// A positioned line of text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub heading: bool,
}

/// Displayable content of one page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PageContent {
    /// Glyph runs for reflowed text
    Glyphs { lines: Vec<TextLine> },
    /// RGBA pixels for fixed-layout pages
    Raster {
        width: u32,
        height: u32,
        #[serde(skip)]
        pixels: Vec<u8>,
    },
}

/// Output of the render adapter for one page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    pub content: PageContent,
}

impl RenderedPage {
    /// A page with nothing on it
    pub fn blank(page_index: usize, geometry: &PageGeometry) -> Self {
        Self {
            page_index,
            width: geometry.page_size.width,
            height: geometry.page_size.height,
            content: PageContent::Glyphs { lines: Vec::new() },
        }
    }

    /// Approximate heap footprint, used for cache accounting
    pub fn size_bytes(&self) -> usize {
        let content = match &self.content {
            PageContent::Glyphs { lines } => lines
                .iter()
                .map(|l| std::mem::size_of::<TextLine>() + l.text.capacity())
                .sum(),
            PageContent::Raster { pixels, .. } => pixels.len(),
        };
        std::mem::size_of::<Self>() + content
    }

    /// Plain text of a glyph page, one line per row
    pub fn text(&self) -> Option<String> {
        match &self.content {
            PageContent::Glyphs { lines } => Some(
                lines
                    .iter()
                    .map(|l| l.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            PageContent::Raster { .. } => None,
        }
    }
}
