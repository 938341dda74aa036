//! Cache keys for rendered pages

use crate::document::DocumentId;
use crate::layout::PageGeometry;

/// Identity of a renderable page.
///
/// Sizes are stored in hundredths of a pixel so keys hash and compare
/// exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub document: DocumentId,
    pub page_index: usize,
    pub page_width: u32,
    pub page_height: u32,
    pub font_size: u32,
}

impl PageKey {
    pub fn new(document: DocumentId, page_index: usize, geometry: &PageGeometry) -> Self {
        Self {
            document,
            page_index,
            page_width: hundredths(geometry.page_size.width),
            page_height: hundredths(geometry.page_size.height),
            font_size: hundredths(geometry.font_size),
        }
    }
}

fn hundredths(value: f32) -> u32 {
    (value * 100.0).round() as u32
}
