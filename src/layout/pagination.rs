//! Pagination: page count and chapter boundaries for one geometry

use std::time::Instant;

use crate::document::{Document, FlowEvent};
use crate::error::LayoutError;
use crate::layout::PageGeometry;
use crate::navigation::{Chapter, ChapterTable};

/// Layout result for one (page size, font size) pair
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    geometry: PageGeometry,
    page_count: usize,
    chapters: ChapterTable,
    /// Decoder page shown on each page; `None` for pages the paginator
    /// added to give an empty chapter its own page
    source_pages: Vec<Option<usize>>,
}

impl Pagination {
    /// Build from raw parts. `chapters` must be non-empty, sorted by start
    /// page, and every start page must be below `page_count`.
    /// Page `i` shows decoder page `i`.
    pub fn new(
        geometry: PageGeometry,
        page_count: usize,
        chapters: ChapterTable,
    ) -> Result<Self, LayoutError> {
        Self::with_source_pages(geometry, (0..page_count).map(Some).collect(), chapters)
    }

    /// Build with an explicit page to decoder page mapping
    pub fn with_source_pages(
        geometry: PageGeometry,
        source_pages: Vec<Option<usize>>,
        chapters: ChapterTable,
    ) -> Result<Self, LayoutError> {
        let page_count = source_pages.len();
        if page_count == 0 || chapters.is_empty() {
            return Err(LayoutError::Decoder("layout produced no pages".into()));
        }
        if chapters.iter().any(|c| c.start_page >= page_count) {
            return Err(LayoutError::Decoder(
                "chapter starts past the last page".into(),
            ));
        }
        Ok(Self {
            geometry,
            page_count,
            chapters,
            source_pages,
        })
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn chapters(&self) -> &ChapterTable {
        &self.chapters
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Decoder page to render for `page`. `None` for blank pages and for
    /// out-of-range indices.
    pub fn source_page(&self, page: usize) -> Option<usize> {
        self.source_pages.get(page).copied().flatten()
    }
}

/// Flow `document` at `geometry` and record where each chapter lands.
///
/// The result depends only on the document and the geometry, so repeated
/// calls with the same inputs produce identical paginations.
pub fn paginate(document: &Document, geometry: &PageGeometry) -> Result<Pagination, LayoutError> {
    geometry.validate()?;

    let started = Instant::now();
    let events = document.source().flow(geometry, document.style())?;

    let mut counter = PageCounter::default();
    for event in events {
        counter.push(event);
    }
    let pagination = counter.finish(document.name(), *geometry)?;

    tracing::debug!(
        doc_id = %document.id(),
        font_size = geometry.font_size,
        pages = pagination.page_count(),
        chapters = pagination.chapter_count(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Paginated document"
    );

    Ok(pagination)
}

/// Folds flow events into page indices
#[derive(Debug, Default)]
struct PageCounter {
    current_page: usize,
    /// Page the decoder is currently filling
    decoder_page: usize,
    /// Decoder page whose content landed on `current_page`
    current_source: Option<usize>,
    /// Sources of the pages before `current_page`
    source_pages: Vec<Option<usize>>,
    page_has_content: bool,
    chapter_has_content: bool,
    content_before_first_chapter: bool,
    chapters: Vec<Chapter>,
}

impl PageCounter {
    fn push(&mut self, event: FlowEvent) {
        match event {
            FlowEvent::ChapterStart { title } => {
                // The previous chapter never received content: it keeps its
                // start page to itself
                if let Some(last) = self.chapters.last() {
                    if last.start_page == self.current_page && !self.chapter_has_content {
                        self.advance();
                    }
                }
                // A boundary mid-page attaches to the page it falls on
                self.chapters.push(Chapter::new(title, self.current_page));
                self.chapter_has_content = false;
            }
            FlowEvent::Content => {
                if self.chapters.is_empty() {
                    self.content_before_first_chapter = true;
                }
                self.page_has_content = true;
                self.chapter_has_content = true;
                self.current_source = Some(self.decoder_page);
            }
            FlowEvent::PageBreak => {
                if self.page_has_content || self.chapter_starts_on_current_page() {
                    self.advance();
                }
                self.decoder_page += 1;
            }
        }
    }

    fn advance(&mut self) {
        self.source_pages.push(self.current_source.take());
        self.current_page += 1;
        self.page_has_content = false;
    }

    fn chapter_starts_on_current_page(&self) -> bool {
        self.chapters
            .last()
            .map_or(false, |c| c.start_page == self.current_page)
    }

    fn finish(mut self, name: &str, geometry: PageGeometry) -> Result<Pagination, LayoutError> {
        // A trailing page with nothing on it is dropped unless it is the only one
        if self.page_has_content || self.chapter_starts_on_current_page() || self.current_page == 0
        {
            self.source_pages.push(self.current_source);
        }

        // Pages ahead of the first boundary get an implicit chapter named
        // after the document
        let needs_leading = match self.chapters.first() {
            None => true,
            Some(first) => first.start_page > 0 && self.content_before_first_chapter,
        };
        if needs_leading {
            self.chapters.insert(0, Chapter::new(name, 0));
        } else if let Some(first) = self.chapters.first_mut() {
            // Leading blank pages belong to the first chapter
            first.start_page = 0;
        }

        Pagination::with_source_pages(geometry, self.source_pages, ChapterTable::new(self.chapters))
    }
}
