//! Navigation state machine: current chapter/page with one-level rollback

mod chapter;

pub use chapter::{Chapter, ChapterTable};

use std::sync::Arc;

use crate::error::IndexError;
use crate::layout::Pagination;
use serde::Serialize;

/// Reading position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub chapter_idx: usize,
    pub page_idx: usize,
    /// Chapter to return to on rollback
    pub saved_chapter_idx: Option<usize>,
}

/// Moves a reading position over one pagination.
///
/// `chapter_idx` is always the chapter whose page range contains
/// `page_idx`, except directly after `switch_chapter` onto a chapter that
/// shares its start page with a later one.
#[derive(Debug, Clone)]
pub struct Navigator {
    pagination: Arc<Pagination>,
    state: NavigationState,
}

impl Navigator {
    /// Start at page 0
    pub fn new(pagination: Arc<Pagination>) -> Self {
        let chapter_idx = pagination.chapters().chapter_for_page(0);
        Self {
            pagination,
            state: NavigationState {
                chapter_idx,
                page_idx: 0,
                saved_chapter_idx: None,
            },
        }
    }

    pub fn pagination(&self) -> &Arc<Pagination> {
        &self.pagination
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn chapter_index(&self) -> usize {
        self.state.chapter_idx
    }

    pub fn page_index(&self) -> usize {
        self.state.page_idx
    }

    pub fn page_count(&self) -> usize {
        self.pagination.page_count()
    }

    pub fn chapter_count(&self) -> usize {
        self.pagination.chapter_count()
    }

    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.pagination.chapters().get(index)
    }

    pub fn is_valid_page_index(&self, page: usize) -> bool {
        page < self.page_count()
    }

    pub fn is_valid_chapter_index(&self, chapter: usize) -> bool {
        chapter < self.chapter_count()
    }

    pub fn check_page(&self, page: usize) -> Result<(), IndexError> {
        if self.is_valid_page_index(page) {
            Ok(())
        } else {
            Err(IndexError::Page {
                index: page,
                count: self.page_count(),
            })
        }
    }

    pub fn check_chapter(&self, chapter: usize) -> Result<(), IndexError> {
        if self.is_valid_chapter_index(chapter) {
            Ok(())
        } else {
            Err(IndexError::Chapter {
                index: chapter,
                count: self.chapter_count(),
            })
        }
    }

    /// Move to a page; the chapter follows
    pub fn switch_to_page(&mut self, page: usize) -> Result<(), IndexError> {
        self.check_page(page)?;
        self.state.page_idx = page;
        self.state.chapter_idx = self.pagination.chapters().chapter_for_page(page);
        Ok(())
    }

    /// Move to the first page of a chapter
    pub fn switch_chapter(&mut self, chapter: usize) -> Result<(), IndexError> {
        self.check_chapter(chapter)?;
        self.state.chapter_idx = chapter;
        self.state.page_idx = self.pagination.chapters().as_slice()[chapter].start_page;
        Ok(())
    }

    /// Remember the current chapter, replacing anything saved before
    pub fn record_current_chapter(&mut self) {
        self.state.saved_chapter_idx = Some(self.state.chapter_idx);
    }

    /// Return to the recorded chapter. Nothing recorded is a no-op.
    ///
    /// The slot is consumed even when the recorded chapter no longer exists.
    pub fn rollback_chapter(&mut self) -> Result<(), IndexError> {
        match self.state.saved_chapter_idx.take() {
            Some(chapter) => self.switch_chapter(chapter),
            None => Ok(()),
        }
    }

    /// Chapter containing `page`, independent of the current position
    pub fn chapter_index_with_page_index(&self, page: usize) -> Result<usize, IndexError> {
        self.check_page(page)?;
        Ok(self.pagination.chapters().chapter_for_page(page))
    }

    /// Chapter at a fraction of the chapter list; `progress` is clamped to [0, 1]
    pub fn chapter_index_with_progress(&self, progress: f64) -> usize {
        let count = self.chapter_count();
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        ((progress * count as f64).floor() as usize).min(count.saturating_sub(1))
    }

    /// Fraction of the document before `chapter` starts, in [0, 1)
    pub fn chapter_progress(&self, chapter: usize) -> Result<f64, IndexError> {
        self.check_chapter(chapter)?;
        let start = self.pagination.chapters().as_slice()[chapter].start_page;
        Ok(start as f64 / self.page_count() as f64)
    }

    /// Fraction of the document before the current page, in [0, 1)
    pub fn reading_progress(&self) -> f64 {
        self.state.page_idx as f64 / self.page_count() as f64
    }

    /// Adopt a new pagination, keeping the reader in the same chapter.
    ///
    /// Page boundaries move when geometry changes, so the position resolves
    /// to the start page of the current chapter in the new layout.
    pub fn rebind(&mut self, pagination: Arc<Pagination>) {
        let last_chapter = pagination.chapter_count().saturating_sub(1);
        let chapter = self.state.chapter_idx.min(last_chapter);
        let saved = self
            .state
            .saved_chapter_idx
            .filter(|&c| c < pagination.chapter_count());

        self.pagination = pagination;
        self.state = NavigationState {
            chapter_idx: chapter,
            page_idx: self.pagination.chapters().as_slice()[chapter].start_page,
            saved_chapter_idx: saved,
        };
    }

    /// Adopt a rebuilt chapter table for the same geometry, keeping the page
    pub fn rebind_keep_page(&mut self, pagination: Arc<Pagination>) {
        if self.state.page_idx < pagination.page_count() {
            let page = self.state.page_idx;
            let saved = self
                .state
                .saved_chapter_idx
                .filter(|&c| c < pagination.chapter_count());
            self.pagination = pagination;
            self.state = NavigationState {
                chapter_idx: self.pagination.chapters().chapter_for_page(page),
                page_idx: page,
                saved_chapter_idx: saved,
            };
        } else {
            self.rebind(pagination);
        }
    }
}
