use crate::config::ApiConfig;
use serde::Serialize;

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNav {
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageLinks {
    pub pages: usize,
    pub page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl PageNav {
    pub fn new(page: Option<usize>, limit: Option<usize>, config: &ApiConfig) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size)
            .max(1);
        Self { page, limit }
    }

    /// Pulls the page back to the last page that holds any of `total` items.
    pub fn within(self, total: u64) -> Self {
        let last = self.total_pages(total).max(1);
        Self {
            page: self.page.min(last),
            limit: self.limit,
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> usize {
        usize::try_from(total)
            .unwrap_or(usize::MAX)
            .div_ceil(self.limit)
    }

    /// Links to neighbouring pages, or `None` when everything fits on one page.
    /// `link` renders the URL for a page number.
    pub fn links(&self, total: u64, link: impl Fn(usize) -> String) -> Option<PageLinks> {
        let pages = self.total_pages(total);
        if pages <= 1 {
            return None;
        }

        let prev = (self.page > 1).then(|| link((self.page - 1).min(pages)));
        let next = (self.page < pages).then(|| link(self.page + 1));

        Some(PageLinks {
            pages,
            page: self.page,
            prev,
            next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            base_url: String::new(),
            default_page_size: 20,
            max_page_size: 50,
        }
    }

    #[test]
    fn clamps_page_and_limit() {
        let nav = PageNav::new(Some(0), Some(500), &config());
        assert_eq!(nav, PageNav { page: 1, limit: 50 });

        let nav = PageNav::new(None, Some(0), &config());
        assert_eq!(nav.limit, 1);

        let nav = PageNav::new(Some(3), None, &config());
        assert_eq!(nav.limit, 20);
        assert_eq!(nav.offset(), 40);
    }

    #[test]
    fn single_page_has_no_links() {
        let nav = PageNav::new(None, Some(10), &config());
        assert_eq!(nav.links(10, |p| p.to_string()), None);
        assert_eq!(nav.links(0, |p| p.to_string()), None);
    }

    #[test]
    fn middle_page_links_both_ways() {
        let nav = PageNav::new(Some(2), Some(10), &config());
        let links = nav.links(25, |p| format!("/media?page={}", p)).unwrap();
        assert_eq!(links.pages, 3);
        assert_eq!(links.prev.as_deref(), Some("/media?page=1"));
        assert_eq!(links.next.as_deref(), Some("/media?page=3"));
    }

    #[test]
    fn edges_omit_missing_neighbours() {
        let first = PageNav::new(Some(1), Some(10), &config())
            .links(25, |p| p.to_string())
            .unwrap();
        assert!(first.prev.is_none());
        assert_eq!(first.next.as_deref(), Some("2"));

        let last = PageNav::new(Some(3), Some(10), &config())
            .links(25, |p| p.to_string())
            .unwrap();
        assert_eq!(last.prev.as_deref(), Some("2"));
        assert!(last.next.is_none());
    }

    #[test]
    fn out_of_range_page_is_pulled_back() {
        let nav = PageNav::new(Some(usize::MAX), Some(1), &config()).within(3);
        assert_eq!(nav.page, 3);
        assert_eq!(nav.offset(), 2);
        let links = nav.links(3, |p| p.to_string()).unwrap();
        assert_eq!(links.page, 3);
        assert!(links.next.is_none());

        let empty = PageNav::new(Some(5), None, &config()).within(0);
        assert_eq!(empty.page, 1);
        assert_eq!(empty.offset(), 0);
    }
}
