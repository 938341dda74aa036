//! Reflowable plain-text documents

use std::sync::Arc;

use parking_lot::Mutex;

use crate::document::block::{parse_blocks, Block};
use crate::document::page::{PageContent, RenderedPage};
use crate::document::{DocumentSource, FlowEvent, StyleSheet};
use crate::error::{LayoutError, RenderError};
use crate::layout::{flow_blocks, FlowOptions, FlowedText, PageGeometry};

/// Plain text with `#` chapter headings, reflowed for every geometry.
///
/// The most recent flow is kept so rendering pages of the current layout
/// does not reflow the whole document.
pub struct TextSource {
    name: String,
    blocks: Vec<Block>,
    options: FlowOptions,
    last_flow: Mutex<Option<(PageGeometry, Arc<FlowedText>)>>,
}

impl TextSource {
    pub fn new(name: impl Into<String>, text: &str, options: FlowOptions) -> Self {
        Self::from_blocks(name, parse_blocks(text), options)
    }

    pub fn from_blocks(name: impl Into<String>, blocks: Vec<Block>, options: FlowOptions) -> Self {
        Self {
            name: name.into(),
            blocks,
            options,
            last_flow: Mutex::new(None),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn flowed(&self, geometry: &PageGeometry) -> Result<Arc<FlowedText>, LayoutError> {
        if let Some((cached_geometry, flowed)) = self.last_flow.lock().as_ref() {
            if cached_geometry == geometry {
                return Ok(Arc::clone(flowed));
            }
        }

        // Flow without holding the lock; concurrent flows of the same
        // geometry produce identical results
        let flowed = Arc::new(flow_blocks(&self.blocks, geometry, &self.options)?);
        *self.last_flow.lock() = Some((*geometry, Arc::clone(&flowed)));
        Ok(flowed)
    }
}

impl DocumentSource for TextSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn flow(
        &self,
        geometry: &PageGeometry,
        _style: Option<&StyleSheet>,
    ) -> Result<Vec<FlowEvent>, LayoutError> {
        Ok(self.flowed(geometry)?.events.clone())
    }

    fn render(&self, page_index: usize, geometry: &PageGeometry) -> Result<RenderedPage, RenderError> {
        let flowed = self
            .flowed(geometry)
            .map_err(|e| RenderError(e.to_string()))?;
        let page = flowed
            .pages
            .get(page_index)
            .ok_or_else(|| RenderError(format!("page {} not in layout", page_index)))?;

        Ok(RenderedPage {
            page_index,
            width: geometry.page_size.width,
            height: geometry.page_size.height,
            content: PageContent::Glyphs {
                lines: page.lines.clone(),
            },
        })
    }
}
