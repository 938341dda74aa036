//! Fixed-layout (PDF-like) documents

use crate::document::page::{PageContent, RenderedPage};
use crate::document::{DocumentSource, FlowEvent, StyleSheet};
use crate::error::{LayoutError, OpenError, RenderError};
use crate::layout::PageGeometry;

/// Bytes per RGBA pixel
const BYTES_PER_PIXEL: usize = 4;

/// Largest raster a single page may render to: 256 MiB
const MAX_RASTER_BYTES: usize = 256 << 20;

/// A document whose pages are fixed by the file.
///
/// Font size does not change pagination; rendering rasterizes the page at
/// the requested page size.
pub struct FixedPageSource {
    name: String,
    page_count: usize,
    outline: Vec<(String, usize)>,
}

impl FixedPageSource {
    /// `outline` maps chapter titles to page indices
    pub fn new(
        name: impl Into<String>,
        page_count: usize,
        mut outline: Vec<(String, usize)>,
    ) -> Result<Self, OpenError> {
        if page_count == 0 {
            return Err(OpenError::Corrupt("document has no pages".into()));
        }
        if let Some((title, page)) = outline.iter().find(|(_, page)| *page >= page_count) {
            return Err(OpenError::Corrupt(format!(
                "outline entry {:?} points at page {} of {}",
                title, page, page_count
            )));
        }
        outline.sort_by_key(|(_, page)| *page);

        Ok(Self {
            name: name.into(),
            page_count,
            outline,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

impl DocumentSource for FixedPageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn flow(
        &self,
        _geometry: &PageGeometry,
        _style: Option<&StyleSheet>,
    ) -> Result<Vec<FlowEvent>, LayoutError> {
        let mut events = Vec::with_capacity(self.page_count * 2 + self.outline.len());
        let mut entries = self.outline.iter().peekable();

        for page in 0..self.page_count {
            if page > 0 {
                events.push(FlowEvent::PageBreak);
            }
            // Entries sharing a page each get content so none reads as empty
            while let Some((title, _)) = entries.next_if(|(_, start)| *start == page) {
                events.push(FlowEvent::ChapterStart {
                    title: title.clone(),
                });
                events.push(FlowEvent::Content);
            }
            events.push(FlowEvent::Content);
        }

        Ok(events)
    }

    fn render(&self, page_index: usize, geometry: &PageGeometry) -> Result<RenderedPage, RenderError> {
        if page_index >= self.page_count {
            return Err(RenderError(format!(
                "page {} out of {}",
                page_index, self.page_count
            )));
        }

        let width = geometry.page_size.width.ceil() as u32;
        let height = geometry.page_size.height.ceil() as u32;
        let byte_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .filter(|&bytes| bytes <= MAX_RASTER_BYTES)
            .ok_or_else(|| {
                RenderError(format!("page raster {}x{} is too large", width, height))
            })?;
        let pixels = vec![0xFF; byte_len];

        Ok(RenderedPage {
            page_index,
            width: geometry.page_size.width,
            height: geometry.page_size.height,
            content: PageContent::Raster {
                width,
                height,
                pixels,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Size;

    #[test]
    fn test_outline_validation() {
        assert!(FixedPageSource::new("x", 0, vec![]).is_err());
        assert!(FixedPageSource::new("x", 3, vec![("Late".into(), 3)]).is_err());
        assert!(FixedPageSource::new("x", 3, vec![("Ok".into(), 2)]).is_ok());
    }

    #[test]
    fn test_shared_page_entries() {
        let source = FixedPageSource::new(
            "x",
            2,
            vec![("Cover".into(), 0), ("Title".into(), 0), ("Body".into(), 1)],
        )
        .unwrap();
        let geometry = PageGeometry::new(Size::new(10.0, 10.0), 16.0);
        let events = source.flow(&geometry, None).unwrap();
        let breaks = events.iter().filter(|e| **e == FlowEvent::PageBreak).count();
        assert_eq!(breaks, 1);
    }

    #[test]
    fn test_render_rasterizes_page_size() {
        let source = FixedPageSource::new("x", 1, vec![]).unwrap();
        let geometry = PageGeometry::new(Size::new(20.0, 10.0), 16.0);
        let page = source.render(0, &geometry).unwrap();
        match page.content {
            PageContent::Raster { width, height, pixels } => {
                assert_eq!((width, height), (20, 10));
                assert_eq!(pixels.len(), 20 * 10 * 4);
            }
            PageContent::Glyphs { .. } => panic!("expected raster"),
        }
        assert!(source.render(1, &geometry).is_err());
    }

    #[test]
    fn test_oversized_raster_is_an_error() {
        let source = FixedPageSource::new("x", 1, vec![]).unwrap();
        for size in [Size::new(5e9, 5e9), Size::new(20_000.0, 20_000.0)] {
            let geometry = PageGeometry::new(size, 16.0);
            assert!(geometry.validate().is_ok());
            assert!(source.render(0, &geometry).is_err());
        }
    }
}
