//! Text flow: fills fixed-size pages with broken lines

use crate::document::{Block, FlowEvent, TextLine};
use crate::error::LayoutError;
use crate::layout::font::FontMetrics;
use crate::layout::line_break::LineBreaker;
use crate::layout::PageGeometry;
use serde::{Deserialize, Serialize};

/// Typesetting parameters for reflowable text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowOptions {
    /// Margin on every side of the page
    pub margin: f32,
    /// Line height multiplier
    pub line_spacing: f32,
    /// Space after a paragraph, in lines
    pub paragraph_spacing: f32,
    /// Start every chapter at the top of a page
    pub chapter_starts_new_page: bool,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            margin: 24.0,
            line_spacing: 1.0,
            paragraph_spacing: 0.5,
            chapter_starts_new_page: true,
        }
    }
}

/// Lines placed on one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowedPage {
    pub lines: Vec<TextLine>,
}

impl FlowedPage {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Result of flowing a text document
#[derive(Debug, Clone, PartialEq)]
pub struct FlowedText {
    pub pages: Vec<FlowedPage>,
    /// Boundary events in page order, consumed by the paginator
    pub events: Vec<FlowEvent>,
}

/// Flow blocks into pages of the given geometry
pub fn flow_blocks(
    blocks: &[Block],
    geometry: &PageGeometry,
    options: &FlowOptions,
) -> Result<FlowedText, LayoutError> {
    geometry.validate()?;

    let metrics = FontMetrics::for_size(geometry.font_size);
    let content_width = geometry.page_size.width - 2.0 * options.margin;
    let content_height = geometry.page_size.height - 2.0 * options.margin;
    let base_line_height = metrics.line_height * options.line_spacing;

    // A page must hold at least one line of one glyph
    if content_width < metrics.default_width || content_height < base_line_height {
        return Err(LayoutError::InvalidGeometry {
            width: geometry.page_size.width,
            height: geometry.page_size.height,
        });
    }

    let breaker = LineBreaker::new();
    let mut flow = PageFiller::new(content_height);

    for block in blocks {
        let block_metrics = metrics.scaled(block.kind.line_height_multiplier());
        let line_height = block_metrics.line_height * options.line_spacing;

        if block.kind.is_chapter_start() {
            if options.chapter_starts_new_page {
                flow.break_page();
            }
            flow.events.push(FlowEvent::ChapterStart {
                title: block.text.clone(),
            });
        }

        // Headings that don't fit are wrapped like any paragraph
        let max_width = content_width;
        for range in breaker.break_lines(&block.text, max_width, &block_metrics) {
            flow.ensure_room(line_height);
            flow.place(TextLine {
                text: block.text[range].trim_end().to_string(),
                x: options.margin,
                y: options.margin + flow.y,
                font_size: block_metrics.font_size,
                heading: block.kind.is_heading(),
            });
            flow.y += line_height;
        }

        flow.y += block.kind.spacing_after() * options.paragraph_spacing * base_line_height;
    }

    Ok(flow.finish())
}

/// Tracks the page being filled
struct PageFiller {
    content_height: f32,
    pages: Vec<FlowedPage>,
    current: FlowedPage,
    events: Vec<FlowEvent>,
    y: f32,
}

impl PageFiller {
    fn new(content_height: f32) -> Self {
        Self {
            content_height,
            pages: Vec::new(),
            current: FlowedPage::default(),
            events: Vec::new(),
            y: 0.0,
        }
    }

    /// Close the current page if it holds anything
    fn break_page(&mut self) {
        if self.current.is_empty() {
            self.y = 0.0;
            return;
        }
        self.pages.push(std::mem::take(&mut self.current));
        self.events.push(FlowEvent::PageBreak);
        self.y = 0.0;
    }

    fn ensure_room(&mut self, line_height: f32) {
        if self.y + line_height > self.content_height {
            self.break_page();
        }
    }

    fn place(&mut self, line: TextLine) {
        self.current.lines.push(line);
        self.events.push(FlowEvent::Content);
    }

    fn finish(mut self) -> FlowedText {
        // An empty document still has one (blank) page
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        FlowedText {
            pages: self.pages,
            events: self.events,
        }
    }
}
