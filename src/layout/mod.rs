//! Pagination engine: flows documents into fixed-size pages

mod flow;
pub mod font;
mod line_break;
mod pagination;

pub use flow::{flow_blocks, FlowOptions, FlowedPage, FlowedText};
pub use font::FontMetrics;
pub use line_break::LineBreaker;
pub use pagination::{paginate, Pagination};

use crate::error::LayoutError;
use crate::Size;

/// Inputs that determine how a document breaks into pages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_size: Size,
    pub font_size: f32,
}

impl PageGeometry {
    pub fn new(page_size: Size, font_size: f32) -> Self {
        Self {
            page_size,
            font_size,
        }
    }

    /// Reject geometry no document can be flowed into
    pub fn validate(&self) -> Result<(), LayoutError> {
        if !self.page_size.is_drawable() {
            return Err(LayoutError::InvalidGeometry {
                width: self.page_size.width,
                height: self.page_size.height,
            });
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(LayoutError::InvalidFontSize(self.font_size));
        }
        Ok(())
    }

    /// Same page size, different font size
    pub fn with_font_size(self, font_size: f32) -> Self {
        Self { font_size, ..self }
    }

    /// Same font size, different page size
    pub fn with_page_size(self, page_size: Size) -> Self {
        Self { page_size, ..self }
    }
}
