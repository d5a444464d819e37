// Pagination model for extracted documents
// Pages are keyed by their number as returned by the OCR service; display order is numeric.

use std::collections::BTreeMap;

use crate::error::{ScholarError, ScholarResult};

/// Shown when the cursor points at a page with no text
pub const NO_CONTENT: &str = "No content";

/// Separator placed between pages when the whole document is needed at once
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Extracted text, one entry per page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    // numeric page -> (key as sent by the service, text)
    pages: BTreeMap<u32, (String, String)>,
}

impl ExtractionResult {
    /// Build from raw `page -> text` pairs.
    ///
    /// Keys must be positive integers, unique by value, and a non-empty result must
    /// contain page 1.
    pub fn from_pages<I, K, V>(raw: I) -> ScholarResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut pages = BTreeMap::new();

        for (key, text) in raw {
            let key = key.into();
            let number = key
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ScholarError::extraction(format!("invalid page number `{}`", key)))?;

            if pages.insert(number, (key.clone(), text.into())).is_some() {
                return Err(ScholarError::extraction(format!("duplicate page `{}`", key)));
            }
        }

        if !pages.is_empty() && !pages.contains_key(&1) {
            return Err(ScholarError::extraction("extraction result has no page 1"));
        }

        Ok(Self { pages })
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Pages in display order as `(key, text)`
    pub fn pages(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pages.values().map(|(key, text)| (key.as_str(), text.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let number = key.trim().parse::<u32>().ok()?;
        self.pages.get(&number).map(|(_, text)| text.as_str())
    }

    /// Every page in order, separated by a blank line
    pub fn all_text(&self) -> String {
        self.pages
            .values()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR)
    }

    fn key_at(&self, position: usize) -> Option<&str> {
        self.pages.values().nth(position).map(|(key, _)| key.as_str())
    }
}

/// Currently displayed page: its key and zero-based position in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub key: String,
    pub position: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Pagination {
    result: ExtractionResult,
    cursor: Option<PageCursor>,
}

impl Pagination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole result and move to the first page
    pub fn set_result(&mut self, result: ExtractionResult) {
        self.result = result;
        self.cursor = self.cursor_at(0);
    }

    pub fn clear(&mut self) {
        self.set_result(ExtractionResult::default());
    }

    pub fn result(&self) -> &ExtractionResult {
        &self.result
    }

    pub fn has_pages(&self) -> bool {
        !self.result.is_empty()
    }

    pub fn cursor(&self) -> Option<&PageCursor> {
        self.cursor.as_ref()
    }

    /// Move forward one page. Returns false at the last page.
    pub fn next(&mut self) -> bool {
        match self.cursor.as_ref().map(|c| c.position) {
            Some(position) if position + 1 < self.result.len() => {
                self.cursor = self.cursor_at(position + 1);
                true
            }
            _ => false,
        }
    }

    /// Move back one page. Returns false at the first page.
    pub fn previous(&mut self) -> bool {
        match self.cursor.as_ref().map(|c| c.position) {
            Some(position) if position > 0 => {
                self.cursor = self.cursor_at(position - 1);
                true
            }
            _ => false,
        }
    }

    /// Jump to a page by key; unknown keys leave the cursor where it is
    pub fn jump_to(&mut self, key: &str) -> bool {
        let Ok(number) = key.trim().parse::<u32>() else {
            return false;
        };

        match self.result.pages.keys().position(|n| *n == number) {
            Some(position) => {
                self.cursor = self.cursor_at(position);
                true
            }
            None => false,
        }
    }

    /// Raw text of the current page, if any
    pub fn current_page(&self) -> Option<&str> {
        self.cursor.as_ref().and_then(|c| self.result.get(&c.key))
    }

    pub fn current_text(&self) -> &str {
        self.current_page()
            .filter(|text| !text.is_empty())
            .unwrap_or(NO_CONTENT)
    }

    pub fn is_last(&self) -> bool {
        self.cursor
            .as_ref()
            .map(|c| c.position + 1 >= self.result.len())
            .unwrap_or(true)
    }

    /// "Page 3 of 10"
    pub fn page_label(&self) -> Option<String> {
        let cursor = self.cursor.as_ref()?;
        let (last, _) = self.result.pages().last()?;
        Some(format!("Page {} of {}", cursor.key, last))
    }

    fn cursor_at(&self, position: usize) -> Option<PageCursor> {
        self.result.key_at(position).map(|key| PageCursor {
            key: key.to_string(),
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ten_pages() -> ExtractionResult {
        ExtractionResult::from_pages((1..=10).rev().map(|n| (n.to_string(), format!("page {}", n))))
            .unwrap()
    }

    #[test]
    fn test_numeric_order_not_lexicographic() {
        let mut pagination = Pagination::new();
        pagination.set_result(ten_pages());

        let mut seen = vec![pagination.cursor().unwrap().key.clone()];
        while pagination.next() {
            seen.push(pagination.cursor().unwrap().key.clone());
        }

        let expected: Vec<String> = (1..=10).map(|n| n.to_string()).collect();
        assert_eq!(seen, expected);
        assert_eq!(pagination.page_label().unwrap(), "Page 10 of 10");
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut pagination = Pagination::new();
        pagination.set_result(
            ExtractionResult::from_pages([("1", "Hello"), ("2", "World")]).unwrap(),
        );

        assert_eq!(pagination.current_text(), "Hello");
        assert!(!pagination.previous());
        assert_eq!(pagination.cursor().unwrap().position, 0);

        assert!(pagination.next());
        assert_eq!(pagination.current_text(), "World");
        assert!(!pagination.next());
        assert_eq!(
            pagination.cursor(),
            Some(&PageCursor { key: "2".to_string(), position: 1 })
        );
    }

    #[test]
    fn test_round_trip_preserves_pages() {
        let mut pagination = Pagination::new();
        let result = ten_pages();
        pagination.set_result(result.clone());

        let mut texts = vec![pagination.current_text().to_string()];
        while pagination.next() {
            texts.push(pagination.current_text().to_string());
        }

        assert_eq!(texts.len(), result.len());
        let original: Vec<String> = result.pages().map(|(_, t)| t.to_string()).collect();
        assert_eq!(texts, original);
    }

    #[test]
    fn test_set_result_resets_cursor() {
        let mut pagination = Pagination::new();
        pagination.set_result(ten_pages());
        pagination.jump_to("7");
        assert_eq!(pagination.cursor().unwrap().key, "7");

        pagination.set_result(ExtractionResult::from_pages([("1", "fresh")]).unwrap());
        assert_eq!(pagination.cursor().unwrap().position, 0);
        assert_eq!(pagination.current_text(), "fresh");
    }

    #[test]
    fn test_empty_result_has_no_cursor() {
        let mut pagination = Pagination::new();
        pagination.set_result(ExtractionResult::default());
        assert!(pagination.cursor().is_none());
        assert_eq!(pagination.current_text(), NO_CONTENT);
        assert!(!pagination.next());
        assert!(!pagination.previous());
        assert!(pagination.page_label().is_none());
    }

    #[test]
    fn test_blank_page_reads_as_no_content() {
        let mut pagination = Pagination::new();
        pagination.set_result(ExtractionResult::from_pages([("1", "")]).unwrap());
        assert_eq!(pagination.current_text(), NO_CONTENT);
    }

    #[test]
    fn test_rejects_malformed_keys() {
        assert!(ExtractionResult::from_pages([("0", "x"), ("1", "y")]).is_err());
        assert!(ExtractionResult::from_pages([("one", "x")]).is_err());
        assert!(ExtractionResult::from_pages([("2", "x"), ("3", "y")]).is_err());
        assert!(ExtractionResult::from_pages([("1", "x"), ("01", "y")]).is_err());
    }

    #[test]
    fn test_all_text_joins_in_order() {
        let result = ExtractionResult::from_pages([("2", "B"), ("1", "A")]).unwrap();
        assert_eq!(result.all_text(), "A\n\nB");
    }
}
