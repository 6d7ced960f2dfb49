pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Fixed-size window over the working set. `page` is 1-based and is never
/// clamped here: a page past the end yields an empty slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: usize,
    pub page_size: usize,
    pub len: usize,
}

impl PageWindow {
    pub fn new(page: usize, page_size: usize, len: usize) -> Self {
        Self {
            page,
            page_size: page_size.max(1),
            len,
        }
    }

    pub fn last_index(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }

    pub fn first_index(&self) -> usize {
        self.last_index().saturating_sub(self.page_size)
    }

    pub fn total_pages(&self) -> usize {
        self.len.div_ceil(self.page_size)
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.first_index().min(items.len());
        let end = self.last_index().min(items.len());
        &items[start..end]
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Page after `next`; unchanged on the last page.
    pub fn next(&self) -> usize {
        if self.has_next() {
            self.page + 1
        } else {
            self.page
        }
    }

    /// Page after `prev`; unchanged on the first page.
    pub fn prev(&self) -> usize {
        if self.has_prev() {
            self.page - 1
        } else {
            self.page
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PAGE_SIZE, PageWindow};

    #[test]
    fn twelve_items_make_three_pages() {
        let items: Vec<u32> = (0..12).collect();
        let first = PageWindow::new(1, DEFAULT_PAGE_SIZE, items.len());
        assert_eq!(first.total_pages(), 3);
        assert_eq!(first.slice(&items), &[0, 1, 2, 3, 4]);
        assert_eq!(first.prev(), 1);

        let last = PageWindow::new(3, DEFAULT_PAGE_SIZE, items.len());
        assert_eq!(last.slice(&items), &[10, 11]);
        assert_eq!(last.next(), 3);
        assert_eq!(last.prev(), 2);
    }

    #[test]
    fn empty_collection_has_no_pages() {
        let items: Vec<u32> = Vec::new();
        let window = PageWindow::new(1, DEFAULT_PAGE_SIZE, 0);
        assert_eq!(window.total_pages(), 0);
        assert!(window.slice(&items).is_empty());
        assert_eq!(window.next(), 1);
        assert_eq!(window.prev(), 1);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let items: Vec<u32> = (0..4).collect();
        let window = PageWindow::new(2, DEFAULT_PAGE_SIZE, items.len());
        assert_eq!((window.first_index(), window.last_index()), (5, 10));
        assert!(window.slice(&items).is_empty());
        assert!(!window.has_next());
        assert_eq!(window.prev(), 1);
    }

    #[test]
    fn exact_multiple_does_not_add_a_page() {
        let window = PageWindow::new(1, 5, 10);
        assert_eq!(window.total_pages(), 2);
        assert_eq!(PageWindow::new(2, 5, 10).next(), 2);
    }

    #[test]
    fn zero_page_size_is_treated_as_one() {
        let window = PageWindow::new(1, 0, 3);
        assert_eq!(window.total_pages(), 3);
    }
}
