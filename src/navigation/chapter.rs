//! Chapter table: ordered chapter start pages

use serde::Serialize;

/// A chapter and the first page it occupies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub title: String,
    pub start_page: usize,
}

impl Chapter {
    pub fn new(title: impl Into<String>, start_page: usize) -> Self {
        Self {
            title: title.into(),
            start_page,
        }
    }
}

/// Chapters ordered by non-decreasing start page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChapterTable {
    chapters: Vec<Chapter>,
}

impl ChapterTable {
    /// Build a table, keeping start pages sorted
    pub fn new(mut chapters: Vec<Chapter>) -> Self {
        // Stable: chapters sharing a page keep decoder order
        chapters.sort_by_key(|c| c.start_page);
        Self { chapters }
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chapter> + '_ {
        self.chapters.iter()
    }

    pub fn as_slice(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Index of the last chapter starting at or before `page`
    pub fn chapter_for_page(&self, page: usize) -> usize {
        self.chapters
            .partition_point(|c| c.start_page <= page)
            .saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ChapterTable {
        ChapterTable::new(vec![
            Chapter::new("One", 0),
            Chapter::new("Two", 10),
            Chapter::new("Three", 25),
        ])
    }

    #[test]
    fn test_chapter_for_page() {
        let table = table();
        assert_eq!(table.chapter_for_page(0), 0);
        assert_eq!(table.chapter_for_page(9), 0);
        assert_eq!(table.chapter_for_page(10), 1);
        assert_eq!(table.chapter_for_page(24), 1);
        assert_eq!(table.chapter_for_page(29), 2);
    }

    #[test]
    fn test_shared_start_page_resolves_to_last() {
        let table = ChapterTable::new(vec![
            Chapter::new("Cover", 0),
            Chapter::new("Title", 0),
            Chapter::new("Body", 3),
        ]);
        assert_eq!(table.chapter_for_page(0), 1);
        assert_eq!(table.chapter_for_page(2), 1);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let table = ChapterTable::new(vec![Chapter::new("B", 5), Chapter::new("A", 0)]);
        assert_eq!(table.get(0).unwrap().title, "A");
    }
}
