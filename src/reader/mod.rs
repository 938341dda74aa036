//! Reader facade
//!
//! Owns the open document, its current pagination and the reading position.
//! Layout work (open, font or page size changes, outline rebuilds) runs
//! either on the calling thread or on a worker via the `*_in_background`
//! variants. Requests are numbered; a layout only takes effect if no newer
//! request arrived while it ran, so the latest requested geometry is the
//! one reflected once every completion has fired.
//!
//! Page views and queries may be called from any thread while a layout is
//! in flight. They observe the last applied pagination.

mod task;

pub use task::LayoutTask;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::cache::{CacheStats, PageKey, ResourceCache};
use crate::config::ReaderConfig;
use crate::document::{Document, DocumentLoader, DocumentSource, FileLoader, RenderedPage, StyleSheet};
use crate::error::{LayoutError, ReaderError, Result};
use crate::layout::{paginate, PageGeometry, Pagination};
use crate::navigation::{Chapter, NavigationState, Navigator};
use crate::Size;

/// Options for opening a document
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    style: Option<StyleSheet>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Style sheet handed to the decoder
    pub fn style(mut self, style: StyleSheet) -> Self {
        self.style = Some(style);
        self
    }
}

/// Cheaply cloneable handle; clones share the same document and cache.
#[derive(Clone)]
pub struct Reader {
    shared: Arc<Shared>,
}

struct Shared {
    loader: Arc<dyn DocumentLoader>,
    cache: ResourceCache,
    // Lock order: session, then requests
    session: RwLock<Option<Session>>,
    requests: Mutex<Requests>,
}

struct Session {
    document: Arc<Document>,
    navigator: Navigator,
}

/// Bookkeeping for latest-wins scheduling
struct Requests {
    open_generation: u64,
    layout_generation: u64,
    /// Geometry of the most recent request
    geometry: PageGeometry,
}

/// How the reading position survives a relayout
#[derive(Debug, Clone, Copy)]
enum Remap {
    /// Page boundaries moved: resolve to the current chapter's start
    ChapterStart,
    /// Same geometry: keep the page when it still exists
    KeepPage,
}

/// A relayout that has been requested but not yet applied
struct RelayoutTicket {
    generation: u64,
    document: Arc<Document>,
    geometry: PageGeometry,
    remap: Remap,
}

impl Reader {
    /// Reader opening `.txt` and `.md` files
    pub fn new(config: ReaderConfig) -> Self {
        let loader = Arc::new(FileLoader::new(config.flow.clone()));
        Self::with_loader(config, loader)
    }

    /// Reader opening files through a custom decoder
    pub fn with_loader(config: ReaderConfig, loader: Arc<dyn DocumentLoader>) -> Self {
        Self {
            shared: Arc::new(Shared {
                loader,
                cache: ResourceCache::new(config.cache_capacity_bytes),
                session: RwLock::new(None),
                requests: Mutex::new(Requests {
                    open_generation: 0,
                    layout_generation: 0,
                    geometry: config.geometry(),
                }),
            }),
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.shared.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.shared.cache.stats()
    }

    // ---- Opening ----

    /// Open and paginate a file, replacing any open document.
    ///
    /// On failure the previously open document stays open.
    pub fn open(&self, path: impl AsRef<Path>, options: OpenOptions) -> Result<()> {
        let generation = self.shared.next_open_generation();
        self.shared
            .load_and_install(path.as_ref(), options.style, generation)
    }

    /// Open on a worker. `on_complete` fires exactly once.
    pub fn open_in_background<F>(
        &self,
        path: impl Into<PathBuf>,
        options: OpenOptions,
        on_complete: F,
    ) -> LayoutTask
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let generation = self.shared.next_open_generation();
        let shared = Arc::clone(&self.shared);
        let path = path.into();
        task::spawn(
            "folio-open",
            move || shared.load_and_install(&path, options.style, generation),
            on_complete,
        )
    }

    /// Open an in-memory document
    pub fn open_source(&self, source: Arc<dyn DocumentSource>, options: OpenOptions) -> Result<()> {
        let generation = self.shared.next_open_generation();
        let document = Arc::new(Document::new(source, None, options.style));
        self.shared.install(document, generation)
    }

    /// Drop the open document and its cached pages. In-flight layouts are
    /// superseded.
    pub fn close(&self) {
        let previous = {
            let mut session = self.shared.session.write();
            let mut requests = self.shared.requests.lock();
            requests.open_generation += 1;
            requests.layout_generation += 1;
            session.take()
        };
        if let Some(previous) = previous {
            let purged = self.shared.cache.purge_document(previous.document.id());
            tracing::info!(doc_id = %previous.document.id(), purged, "Closed document");
        }
    }

    pub fn is_open(&self) -> bool {
        self.shared.session.read().is_some()
    }

    // ---- Relayout ----

    /// Re-paginate at a new font size. The position moves to the start of
    /// the current chapter.
    pub fn update_font_size(&self, font_size: f32) -> Result<()> {
        let ticket = self
            .shared
            .request_relayout(Remap::ChapterStart, |g| g.with_font_size(font_size))?;
        self.shared.run_relayout(ticket)
    }

    pub fn update_font_size_in_background<F>(&self, font_size: f32, on_complete: F) -> LayoutTask
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.relayout_in_background(Remap::ChapterStart, move |g| g.with_font_size(font_size), on_complete)
    }

    /// Re-paginate for a new viewport, remapping like [`Reader::update_font_size`]
    pub fn update_page_size(&self, page_size: Size) -> Result<()> {
        let ticket = self
            .shared
            .request_relayout(Remap::ChapterStart, |g| g.with_page_size(page_size))?;
        self.shared.run_relayout(ticket)
    }

    pub fn update_page_size_in_background<F>(&self, page_size: Size, on_complete: F) -> LayoutTask
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.relayout_in_background(Remap::ChapterStart, move |g| g.with_page_size(page_size), on_complete)
    }

    /// Rebuild the chapter table at the latest requested geometry
    pub fn layout_page_outlines(&self) -> Result<()> {
        let ticket = self.shared.request_relayout(Remap::KeepPage, |g| g)?;
        self.shared.run_relayout(ticket)
    }

    pub fn layout_page_outlines_in_background<F>(&self, on_complete: F) -> LayoutTask
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.relayout_in_background(Remap::KeepPage, |g| g, on_complete)
    }

    /// The request is numbered on the caller's thread, so call order decides
    /// which request wins. Request errors complete immediately.
    fn relayout_in_background<G, F>(&self, remap: Remap, change: G, on_complete: F) -> LayoutTask
    where
        G: FnOnce(PageGeometry) -> PageGeometry,
        F: FnOnce(Result<()>) + Send + 'static,
    {
        match self.shared.request_relayout(remap, change) {
            Ok(ticket) => {
                let shared = Arc::clone(&self.shared);
                task::spawn("folio-layout", move || shared.run_relayout(ticket), on_complete)
            }
            Err(err) => {
                on_complete(Err(err));
                LayoutTask::completed()
            }
        }
    }

    // ---- Pages ----

    /// Rendered page, from the cache when possible
    pub fn page_view(&self, page: usize) -> Result<Arc<RenderedPage>> {
        let (document, geometry, source_page) = {
            let session = self.shared.session.read();
            let session = session.as_ref().ok_or(ReaderError::NotOpen)?;
            session.navigator.check_page(page)?;
            let pagination = session.navigator.pagination();
            (
                Arc::clone(&session.document),
                *pagination.geometry(),
                pagination.source_page(page),
            )
        };

        let key = PageKey::new(document.id(), page, &geometry);
        let view = self.shared.cache.get_or_render(key, || match source_page {
            Some(source_page) => document
                .source()
                .render(source_page, &geometry)
                .map(|rendered| RenderedPage {
                    page_index: page,
                    ..rendered
                }),
            // Page of an empty chapter
            None => Ok(RenderedPage::blank(page, &geometry)),
        })?;
        Ok(view)
    }

    pub fn pagination(&self) -> Result<Arc<Pagination>> {
        self.with_navigator(|nav| Arc::clone(nav.pagination()))
    }

    pub fn page_count(&self) -> Result<usize> {
        self.with_navigator(Navigator::page_count)
    }

    /// Font size of the applied layout, or the configured default when
    /// nothing is open
    pub fn font_size(&self) -> f32 {
        self.geometry().font_size
    }

    pub fn page_size(&self) -> Size {
        self.geometry().page_size
    }

    fn geometry(&self) -> PageGeometry {
        let session = self.shared.session.read();
        match session.as_ref() {
            Some(session) => *session.navigator.pagination().geometry(),
            None => self.shared.requests.lock().geometry,
        }
    }

    // ---- Chapters and navigation ----

    pub fn chapter(&self, index: usize) -> Option<Chapter> {
        self.with_navigator(|nav| nav.chapter(index).cloned())
            .ok()
            .flatten()
    }

    pub fn chapters(&self) -> Result<Vec<Chapter>> {
        self.with_navigator(|nav| nav.pagination().chapters().as_slice().to_vec())
    }

    pub fn position(&self) -> Result<NavigationState> {
        self.with_navigator(Navigator::state)
    }

    pub fn current_chapter(&self) -> Result<usize> {
        self.with_navigator(Navigator::chapter_index)
    }

    pub fn current_page(&self) -> Result<usize> {
        self.with_navigator(Navigator::page_index)
    }

    pub fn switch_chapter(&self, chapter: usize) -> Result<()> {
        Ok(self.with_navigator_mut(|nav| nav.switch_chapter(chapter))??)
    }

    pub fn switch_to_page(&self, page: usize) -> Result<()> {
        Ok(self.with_navigator_mut(|nav| nav.switch_to_page(page))??)
    }

    /// Advance one page. False when already on the last page.
    pub fn next_page(&self) -> Result<bool> {
        self.with_navigator_mut(|nav| {
            let next = nav.page_index() + 1;
            nav.switch_to_page(next).is_ok()
        })
    }

    /// Go back one page. False when already on the first page.
    pub fn previous_page(&self) -> Result<bool> {
        self.with_navigator_mut(|nav| match nav.page_index().checked_sub(1) {
            Some(previous) => nav.switch_to_page(previous).is_ok(),
            None => false,
        })
    }

    pub fn record_current_chapter(&self) -> Result<()> {
        self.with_navigator_mut(Navigator::record_current_chapter)
    }

    pub fn rollback_chapter(&self) -> Result<()> {
        Ok(self.with_navigator_mut(Navigator::rollback_chapter)??)
    }

    // ---- Queries ----

    pub fn chapter_index_with_page_index(&self, page: usize) -> Result<usize> {
        Ok(self.with_navigator(|nav| nav.chapter_index_with_page_index(page))??)
    }

    pub fn chapter_index_with_progress(&self, progress: f64) -> Result<usize> {
        self.with_navigator(|nav| nav.chapter_index_with_progress(progress))
    }

    pub fn chapter_progress(&self, chapter: usize) -> Result<f64> {
        Ok(self.with_navigator(|nav| nav.chapter_progress(chapter))??)
    }

    pub fn reading_progress(&self) -> Result<f64> {
        self.with_navigator(Navigator::reading_progress)
    }

    /// False when nothing is open
    pub fn is_valid_page_index(&self, page: usize) -> bool {
        self.with_navigator(|nav| nav.is_valid_page_index(page))
            .unwrap_or(false)
    }

    /// False when nothing is open
    pub fn is_valid_chapter_index(&self, chapter: usize) -> bool {
        self.with_navigator(|nav| nav.is_valid_chapter_index(chapter))
            .unwrap_or(false)
    }

    fn with_navigator<T>(&self, f: impl FnOnce(&Navigator) -> T) -> Result<T> {
        let session = self.shared.session.read();
        let session = session.as_ref().ok_or(ReaderError::NotOpen)?;
        Ok(f(&session.navigator))
    }

    fn with_navigator_mut<T>(&self, f: impl FnOnce(&mut Navigator) -> T) -> Result<T> {
        let mut session = self.shared.session.write();
        let session = session.as_mut().ok_or(ReaderError::NotOpen)?;
        Ok(f(&mut session.navigator))
    }
}

impl Shared {
    fn next_open_generation(&self) -> u64 {
        let mut requests = self.requests.lock();
        requests.open_generation += 1;
        requests.open_generation
    }

    fn load_and_install(
        &self,
        path: &Path,
        style: Option<StyleSheet>,
        generation: u64,
    ) -> Result<()> {
        let source = self.loader.load(path, style.as_ref()).map_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "Failed to open document");
            err
        })?;
        let document = Arc::new(Document::new(source, Some(path.to_path_buf()), style));
        self.install(document, generation)
    }

    /// Paginate at the latest requested geometry and make `document` current.
    ///
    /// A relayout requested while this runs changes the target geometry, so
    /// pagination repeats until it matches.
    fn install(&self, document: Arc<Document>, generation: u64) -> Result<()> {
        let mut geometry = self.requests.lock().geometry;
        loop {
            let pagination = paginate(&document, &geometry).map_err(|err| {
                tracing::warn!(doc_id = %document.id(), error = %err, "Initial layout failed");
                err
            })?;

            let mut session = self.session.write();
            let requests = self.requests.lock();
            if requests.open_generation != generation {
                tracing::warn!(doc_id = %document.id(), "Open superseded by a newer request");
                return Err(LayoutError::Superseded.into());
            }
            if requests.geometry != geometry {
                geometry = requests.geometry;
                continue;
            }

            tracing::info!(
                doc_id = %document.id(),
                name = document.name(),
                pages = pagination.page_count(),
                chapters = pagination.chapter_count(),
                font_size = geometry.font_size,
                "Opened document"
            );

            let previous = session.replace(Session {
                document: Arc::clone(&document),
                navigator: Navigator::new(Arc::new(pagination)),
            });
            drop(requests);
            drop(session);

            if let Some(previous) = previous {
                self.cache.purge_document(previous.document.id());
            }
            return Ok(());
        }
    }

    /// Number a relayout of the open document. Invalid geometry is rejected
    /// here, before it can replace the target.
    fn request_relayout<G>(&self, remap: Remap, change: G) -> Result<RelayoutTicket>
    where
        G: FnOnce(PageGeometry) -> PageGeometry,
    {
        let session = self.session.read();
        let session = session.as_ref().ok_or(ReaderError::NotOpen)?;

        let mut requests = self.requests.lock();
        let geometry = change(requests.geometry);
        geometry.validate()?;

        requests.layout_generation += 1;
        requests.geometry = geometry;

        Ok(RelayoutTicket {
            generation: requests.layout_generation,
            document: Arc::clone(&session.document),
            geometry,
            remap,
        })
    }

    fn run_relayout(&self, ticket: RelayoutTicket) -> Result<()> {
        let result = paginate(&ticket.document, &ticket.geometry);

        let mut session = self.session.write();
        let mut requests = self.requests.lock();

        let session = match session.as_mut() {
            Some(session) if session.document.id() == ticket.document.id() => session,
            _ => {
                tracing::warn!(doc_id = %ticket.document.id(), "Relayout discarded, document closed");
                return Err(LayoutError::Superseded.into());
            }
        };
        if requests.layout_generation != ticket.generation {
            tracing::warn!(
                doc_id = %ticket.document.id(),
                font_size = ticket.geometry.font_size,
                "Relayout superseded by a newer request"
            );
            return Err(LayoutError::Superseded.into());
        }

        match result {
            Ok(pagination) => {
                let pagination = Arc::new(pagination);
                match ticket.remap {
                    Remap::ChapterStart => session.navigator.rebind(pagination),
                    Remap::KeepPage => session.navigator.rebind_keep_page(pagination),
                }
                tracing::info!(
                    doc_id = %ticket.document.id(),
                    pages = session.navigator.page_count(),
                    chapters = session.navigator.chapter_count(),
                    font_size = ticket.geometry.font_size,
                    chapter = session.navigator.chapter_index(),
                    page = session.navigator.page_index(),
                    "Relayout applied"
                );
                Ok(())
            }
            Err(err) => {
                // Latest request failed: the applied layout is the target again
                requests.geometry = *session.navigator.pagination().geometry();
                tracing::warn!(
                    doc_id = %ticket.document.id(),
                    font_size = ticket.geometry.font_size,
                    error = %err,
                    "Relayout failed, keeping previous layout"
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FlowEvent, PageContent, TextLine};
    use crate::error::{IndexError, OpenError, RenderError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    /// Source with a fixed page count and chapter starts per font size.
    /// Flows at a gated font size block until the gate is opened.
    struct ScriptedSource {
        layouts: Vec<(f32, usize, Vec<usize>)>,
        gates: Mutex<HashMap<u32, (mpsc::Sender<()>, mpsc::Receiver<()>)>>,
        renders: AtomicUsize,
    }

    /// Holds one flow of a `ScriptedSource` until opened
    struct Gate {
        entered: mpsc::Receiver<()>,
        release: mpsc::Sender<()>,
    }

    impl Gate {
        /// Block until the gated flow has started
        fn wait_entered(&self) {
            self.entered.recv().unwrap();
        }

        fn open(&self) {
            self.release.send(()).unwrap();
        }
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self::with_layouts(vec![
                (16.0, 30, vec![0, 10, 25]),
                (14.0, 36, vec![0, 12, 30]),
                (12.0, 45, vec![0, 15, 37]),
            ])
        }

        fn with_layouts(layouts: Vec<(f32, usize, Vec<usize>)>) -> Self {
            Self {
                layouts,
                gates: Mutex::new(HashMap::new()),
                renders: AtomicUsize::new(0),
            }
        }

        fn gate(&self, font_size: f32) -> Gate {
            let (entered_tx, entered) = mpsc::channel();
            let (release, release_rx) = mpsc::channel();
            self.gates
                .lock()
                .insert(font_size as u32, (entered_tx, release_rx));
            Gate { entered, release }
        }
    }

    impl DocumentSource for ScriptedSource {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn flow(
            &self,
            geometry: &PageGeometry,
            _style: Option<&StyleSheet>,
        ) -> std::result::Result<Vec<FlowEvent>, LayoutError> {
            let gate = self.gates.lock().remove(&(geometry.font_size as u32));
            if let Some((entered, release)) = gate {
                let _ = entered.send(());
                let _ = release.recv();
            }

            let (_, pages, starts) = self
                .layouts
                .iter()
                .find(|(size, _, _)| *size == geometry.font_size)
                .ok_or_else(|| LayoutError::Decoder("no layout for this font size".into()))?;

            let mut events = Vec::new();
            for page in 0..*pages {
                if page > 0 {
                    events.push(FlowEvent::PageBreak);
                }
                for (i, _) in starts.iter().enumerate().filter(|(_, s)| **s == page) {
                    events.push(FlowEvent::ChapterStart {
                        title: format!("Chapter {}", i + 1),
                    });
                }
                events.push(FlowEvent::Content);
            }
            Ok(events)
        }

        fn render(
            &self,
            page_index: usize,
            geometry: &PageGeometry,
        ) -> std::result::Result<RenderedPage, RenderError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            Ok(RenderedPage {
                page_index,
                width: geometry.page_size.width,
                height: geometry.page_size.height,
                content: PageContent::Glyphs {
                    lines: vec![TextLine {
                        text: format!("page {}", page_index),
                        x: 0.0,
                        y: 0.0,
                        font_size: geometry.font_size,
                        heading: false,
                    }],
                },
            })
        }
    }

    /// Opens `ScriptedSource`s by path
    struct ScriptedLoader {
        sources: HashMap<PathBuf, Arc<ScriptedSource>>,
    }

    impl ScriptedLoader {
        fn new(sources: Vec<(&str, Arc<ScriptedSource>)>) -> Self {
            Self {
                sources: sources
                    .into_iter()
                    .map(|(path, source)| (PathBuf::from(path), source))
                    .collect(),
            }
        }
    }

    impl DocumentLoader for ScriptedLoader {
        fn load(
            &self,
            path: &Path,
            _style: Option<&StyleSheet>,
        ) -> std::result::Result<Arc<dyn DocumentSource>, OpenError> {
            match self.sources.get(path) {
                Some(source) => Ok(Arc::clone(source) as Arc<dyn DocumentSource>),
                None => Err(OpenError::NotFound(path.to_path_buf())),
            }
        }
    }

    /// Replays fixed flow events over a list of decoder pages
    struct EventSource {
        events: Vec<FlowEvent>,
        pages: Vec<&'static str>,
    }

    impl DocumentSource for EventSource {
        fn name(&self) -> &str {
            "Events"
        }

        fn flow(
            &self,
            _geometry: &PageGeometry,
            _style: Option<&StyleSheet>,
        ) -> std::result::Result<Vec<FlowEvent>, LayoutError> {
            Ok(self.events.clone())
        }

        fn render(
            &self,
            page_index: usize,
            geometry: &PageGeometry,
        ) -> std::result::Result<RenderedPage, RenderError> {
            let text = self
                .pages
                .get(page_index)
                .ok_or_else(|| RenderError(format!("decoder has no page {}", page_index)))?;
            Ok(RenderedPage {
                page_index,
                width: geometry.page_size.width,
                height: geometry.page_size.height,
                content: PageContent::Glyphs {
                    lines: vec![TextLine {
                        text: text.to_string(),
                        x: 0.0,
                        y: 0.0,
                        font_size: geometry.font_size,
                        heading: false,
                    }],
                },
            })
        }
    }

    fn open_scripted() -> (Reader, Arc<ScriptedSource>) {
        let reader = Reader::new(ReaderConfig::default());
        let source = Arc::new(ScriptedSource::new());
        reader
            .open_source(source.clone(), OpenOptions::new())
            .unwrap();
        (reader, source)
    }

    #[test]
    fn test_open_starts_at_first_page() {
        let (reader, _) = open_scripted();
        assert_eq!(reader.page_count().unwrap(), 30);
        assert_eq!(reader.current_chapter().unwrap(), 0);
        assert_eq!(reader.current_page().unwrap(), 0);
        assert_eq!(reader.chapter(2).unwrap().start_page, 25);
        assert!(reader.chapter(3).is_none());
    }

    #[test]
    fn test_queries_on_three_chapter_document() {
        let (reader, _) = open_scripted();
        assert_eq!(reader.chapter_index_with_page_index(24).unwrap(), 1);
        assert!((reader.chapter_progress(2).unwrap() - 25.0 / 30.0).abs() < 1e-9);
        assert_eq!(reader.chapter_index_with_progress(0.5).unwrap(), 1);

        reader.switch_to_page(9).unwrap();
        assert_eq!(reader.current_chapter().unwrap(), 0);
        reader.switch_to_page(10).unwrap();
        assert_eq!(reader.current_chapter().unwrap(), 1);
        assert!((reader.reading_progress().unwrap() - 10.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_font_change_remaps_to_chapter_start() {
        let (reader, _) = open_scripted();
        reader.switch_to_page(12).unwrap();

        reader.update_font_size(12.0).unwrap();
        assert_eq!(reader.page_count().unwrap(), 45);
        assert_eq!(reader.current_chapter().unwrap(), 1);
        assert_eq!(reader.current_page().unwrap(), 15);
        assert_eq!(reader.font_size(), 12.0);
    }

    #[test]
    fn test_failed_update_preserves_state() {
        let (reader, _) = open_scripted();
        reader.switch_to_page(12).unwrap();

        let err = reader.update_font_size(99.0).unwrap_err();
        assert!(matches!(err, ReaderError::Layout(LayoutError::Decoder(_))));
        assert_eq!(reader.page_count().unwrap(), 30);
        assert_eq!(reader.current_page().unwrap(), 12);
        assert_eq!(reader.font_size(), 16.0);

        // The failed geometry is not the base of the next request
        reader.update_page_size(Size::new(600.0, 800.0)).unwrap();
        assert_eq!(reader.font_size(), 16.0);
    }

    #[test]
    fn test_invalid_font_size_rejected_up_front() {
        let (reader, _) = open_scripted();
        let err = reader.update_font_size(0.0).unwrap_err();
        assert!(matches!(err, ReaderError::Layout(LayoutError::InvalidFontSize(_))));
        assert_eq!(reader.page_count().unwrap(), 30);
    }

    #[test]
    fn test_operations_without_document() {
        let reader = Reader::new(ReaderConfig::default());
        assert!(matches!(reader.page_view(0), Err(ReaderError::NotOpen)));
        assert!(matches!(reader.switch_chapter(0), Err(ReaderError::NotOpen)));
        assert!(matches!(reader.update_font_size(12.0), Err(ReaderError::NotOpen)));
        assert!(!reader.is_valid_page_index(0));
        assert!(reader.chapter(0).is_none());
        assert_eq!(reader.font_size(), 16.0);
    }

    #[test]
    fn test_out_of_range_navigation_keeps_position() {
        let (reader, _) = open_scripted();
        reader.switch_to_page(12).unwrap();

        let err = reader.switch_to_page(30).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::Index(IndexError::Page { index: 30, count: 30 })
        ));
        assert!(reader.switch_chapter(3).is_err());
        assert_eq!(reader.current_page().unwrap(), 12);
    }

    #[test]
    fn test_next_and_previous_page() {
        let (reader, _) = open_scripted();
        assert!(!reader.previous_page().unwrap());
        assert!(reader.next_page().unwrap());
        assert_eq!(reader.current_page().unwrap(), 1);

        reader.switch_to_page(29).unwrap();
        assert!(!reader.next_page().unwrap());
        assert_eq!(reader.current_page().unwrap(), 29);
        assert_eq!(reader.current_chapter().unwrap(), 2);
    }

    #[test]
    fn test_record_and_rollback() {
        let (reader, _) = open_scripted();
        reader.switch_to_page(12).unwrap();
        reader.record_current_chapter().unwrap();
        reader.switch_chapter(2).unwrap();

        reader.rollback_chapter().unwrap();
        assert_eq!(reader.current_chapter().unwrap(), 1);
        assert_eq!(reader.current_page().unwrap(), 10);

        // Nothing saved: no-op
        reader.rollback_chapter().unwrap();
        assert_eq!(reader.current_page().unwrap(), 10);
    }

    #[test]
    fn test_page_view_is_cached() {
        let (reader, source) = open_scripted();
        let first = reader.page_view(3).unwrap();
        let second = reader.page_view(3).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.text().unwrap(), "page 3");
        assert_eq!(source.renders.load(Ordering::SeqCst), 1);
        assert_eq!(reader.cache_stats().hits, 1);

        assert!(matches!(reader.page_view(30), Err(ReaderError::Index(_))));
    }

    #[test]
    fn test_layout_page_outlines_keeps_page() {
        let (reader, _) = open_scripted();
        reader.switch_to_page(12).unwrap();
        reader.layout_page_outlines().unwrap();
        assert_eq!(reader.current_page().unwrap(), 12);
        assert_eq!(reader.current_chapter().unwrap(), 1);
    }

    #[test]
    fn test_later_request_supersedes_background_relayout() {
        let (reader, source) = open_scripted();
        let gate = source.gate(14.0);

        let outcome = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        let task = reader.update_font_size_in_background(14.0, move |result| {
            *slot.lock() = Some(result.map_err(|e| e.is_superseded()));
        });

        reader.update_font_size(12.0).unwrap();
        gate.open();

        assert!(!task.wait());
        assert_eq!(*outcome.lock(), Some(Err(true)));
        assert_eq!(reader.font_size(), 12.0);
        assert_eq!(reader.page_count().unwrap(), 45);
    }

    #[test]
    fn test_page_views_during_background_relayout() {
        let (reader, source) = open_scripted();
        reader.switch_to_page(12).unwrap();
        let gate = source.gate(12.0);

        let task = reader.update_font_size_in_background(12.0, |_| {});

        // Old layout still serves reads
        let view = reader.page_view(5).unwrap();
        assert_eq!(view.page_index, 5);
        assert_eq!(reader.page_count().unwrap(), 30);
        assert_eq!(reader.current_page().unwrap(), 12);

        gate.open();
        assert!(task.wait());
        assert_eq!(reader.page_count().unwrap(), 45);
        assert_eq!(reader.current_page().unwrap(), 15);
    }

    #[test]
    fn test_background_request_error_completes_once() {
        let reader = Reader::new(ReaderConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let task = reader.layout_page_outlines_in_background(move |result| {
            assert!(matches!(result, Err(ReaderError::NotOpen)));
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert!(task.is_finished());
        assert!(!task.wait());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_file_in_background() {
        let dir = std::env::temp_dir().join(format!("folio-reader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("book.md");
        std::fs::write(&path, "# One\n\nFirst.\n\n# Two\n\nSecond.").unwrap();

        let reader = Reader::new(ReaderConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let task = reader.open_in_background(path, OpenOptions::new(), move |result| {
            assert!(result.is_ok());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(task.wait());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let titles: Vec<String> = reader
            .chapters()
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["One", "Two"]);
        assert_eq!(reader.chapter(1).unwrap().start_page, 1);
    }

    #[test]
    fn test_failed_open_keeps_previous_document() {
        let (reader, _) = open_scripted();
        reader.switch_to_page(12).unwrap();

        let err = reader
            .open("/definitely/not/here.txt", OpenOptions::new())
            .unwrap_err();
        assert!(matches!(err, ReaderError::Open(OpenError::NotFound(_))));
        assert_eq!(reader.page_count().unwrap(), 30);
        assert_eq!(reader.current_page().unwrap(), 12);
    }

    #[test]
    fn test_close_purges_cached_pages() {
        let (reader, _) = open_scripted();
        reader.page_view(0).unwrap();
        reader.page_view(1).unwrap();
        assert_eq!(reader.cache_stats().entries, 2);

        reader.close();
        assert!(!reader.is_open());
        assert_eq!(reader.cache_stats().entries, 0);
        assert!(matches!(reader.page_count(), Err(ReaderError::NotOpen)));
    }

    #[test]
    fn test_geometry_persists_across_opens() {
        let (reader, _) = open_scripted();
        reader.update_font_size(12.0).unwrap();

        reader
            .open_source(Arc::new(ScriptedSource::new()), OpenOptions::new())
            .unwrap();
        assert_eq!(reader.font_size(), 12.0);
        assert_eq!(reader.page_count().unwrap(), 45);
    }

    #[test]
    fn test_empty_chapter_renders_blank_page() {
        let chapter = |title: &str| FlowEvent::ChapterStart {
            title: title.to_string(),
        };
        let source = EventSource {
            events: vec![
                chapter("A"),
                FlowEvent::Content,
                FlowEvent::PageBreak,
                chapter("B"),
                chapter("C"),
                FlowEvent::Content,
            ],
            pages: vec!["A body", "C body"],
        };
        let reader = Reader::new(ReaderConfig::default());
        reader
            .open_source(Arc::new(source), OpenOptions::new())
            .unwrap();

        assert_eq!(reader.page_count().unwrap(), 3);
        let starts: Vec<usize> = reader
            .chapters()
            .unwrap()
            .iter()
            .map(|c| c.start_page)
            .collect();
        assert_eq!(starts, vec![0, 1, 2]);

        assert_eq!(reader.page_view(0).unwrap().text().unwrap(), "A body");
        let blank = reader.page_view(1).unwrap();
        assert_eq!(blank.page_index, 1);
        assert_eq!(blank.text().unwrap(), "");
        let last = reader.page_view(2).unwrap();
        assert_eq!(last.page_index, 2);
        assert_eq!(last.text().unwrap(), "C body");
    }

    #[test]
    fn test_oversized_fixed_page_reports_render_error() {
        let reader = Reader::new(ReaderConfig::default());
        let source = crate::document::FixedPageSource::new("Scan", 2, vec![]).unwrap();
        reader
            .open_source(Arc::new(source), OpenOptions::new())
            .unwrap();

        reader.update_page_size(Size::new(5e9, 5e9)).unwrap();
        assert!(matches!(reader.page_view(0), Err(ReaderError::Render(_))));

        reader.update_page_size(Size::new(60.0, 80.0)).unwrap();
        assert!(reader.page_view(0).is_ok());
    }

    #[test]
    fn test_relayout_during_open_applies_to_new_document() {
        let first = Arc::new(ScriptedSource::new());
        let second = Arc::new(ScriptedSource::with_layouts(vec![
            (16.0, 20, vec![0, 5]),
            (12.0, 28, vec![0, 7]),
        ]));
        let gate = second.gate(16.0);
        let loader = ScriptedLoader::new(vec![("second.book", Arc::clone(&second))]);
        let reader = Reader::with_loader(ReaderConfig::default(), Arc::new(loader));
        reader.open_source(first, OpenOptions::new()).unwrap();

        let task = reader.open_in_background("second.book", OpenOptions::new(), |_| {});
        gate.wait_entered();

        // Applies to the open document and becomes the target for the new one
        reader.update_font_size(12.0).unwrap();
        assert_eq!(reader.page_count().unwrap(), 45);

        gate.open();
        assert!(task.wait());
        assert_eq!(reader.font_size(), 12.0);
        assert_eq!(reader.page_count().unwrap(), 28);
        assert_eq!(reader.chapter(1).unwrap().start_page, 7);
    }

    #[test]
    fn test_later_open_supersedes_background_open() {
        let slow = Arc::new(ScriptedSource::new());
        let fast = Arc::new(ScriptedSource::with_layouts(vec![(16.0, 20, vec![0, 5])]));
        let gate = slow.gate(16.0);
        let loader = ScriptedLoader::new(vec![("slow.book", slow), ("fast.book", fast)]);
        let reader = Reader::with_loader(ReaderConfig::default(), Arc::new(loader));

        let outcome = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        let first = reader.open_in_background("slow.book", OpenOptions::new(), move |result| {
            *slot.lock() = Some(result.map_err(|e| e.is_superseded()));
        });
        gate.wait_entered();

        let second = reader.open_in_background("fast.book", OpenOptions::new(), |_| {});
        assert!(second.wait());
        gate.open();

        assert!(!first.wait());
        assert_eq!(*outcome.lock(), Some(Err(true)));
        assert_eq!(reader.page_count().unwrap(), 20);
    }
}
