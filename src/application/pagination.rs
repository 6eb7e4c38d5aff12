//! Page-number pagination shared by every post listing.
//!
//! Listings count their rows first, resolve the requested page against that
//! count, then fetch a single `OFFSET/LIMIT` window. Unparseable input falls
//! back to the first page; out-of-range numbers clamp to the last page.

use std::num::NonZeroU32;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Raw `?page=` parameter after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedPage {
    /// Missing, empty or non-integer input.
    Default,
    Number(i64),
}

impl RequestedPage {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => value
                .parse::<i64>()
                .map(Self::Number)
                .unwrap_or(Self::Default),
            None => Self::Default,
        }
    }
}

/// Rows to fetch for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total_count: u64,
    per_page: NonZeroU32,
}

impl Paginator {
    pub fn new(total_count: u64, per_page: NonZeroU32) -> Self {
        Self {
            total_count,
            per_page,
        }
    }

    /// An empty collection still has one (empty) page.
    pub fn num_pages(&self) -> u32 {
        if self.total_count == 0 {
            return 1;
        }
        let per_page = u64::from(self.per_page.get());
        let pages = self.total_count.div_ceil(per_page);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn resolve(&self, requested: RequestedPage) -> u32 {
        match requested {
            RequestedPage::Default => 1,
            RequestedPage::Number(number) => {
                let last = self.num_pages();
                match u32::try_from(number) {
                    Ok(number) if (1..=last).contains(&number) => number,
                    _ => last,
                }
            }
        }
    }

    pub fn window(&self, number: u32) -> PageWindow {
        let per_page = self.per_page.get();
        PageWindow {
            offset: u64::from(number.saturating_sub(1)) * u64::from(per_page),
            limit: per_page,
        }
    }

    pub fn page<T>(&self, number: u32, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
            total_count: self.total_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_page_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next_page_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator(total: u64) -> Paginator {
        Paginator::new(total, NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap())
    }

    #[test]
    fn parse_falls_back_to_default_for_garbage() {
        assert_eq!(RequestedPage::parse(None), RequestedPage::Default);
        assert_eq!(RequestedPage::parse(Some("")), RequestedPage::Default);
        assert_eq!(RequestedPage::parse(Some("abc")), RequestedPage::Default);
        assert_eq!(RequestedPage::parse(Some("2.0")), RequestedPage::Default);
        assert_eq!(RequestedPage::parse(Some(" 3 ")), RequestedPage::Number(3));
        assert_eq!(RequestedPage::parse(Some("-1")), RequestedPage::Number(-1));
    }

    #[test]
    fn thirteen_items_span_two_pages() {
        let paginator = paginator(13);
        assert_eq!(paginator.num_pages(), 2);
        assert_eq!(
            paginator.window(1),
            PageWindow {
                offset: 0,
                limit: 10
            }
        );
        assert_eq!(
            paginator.window(2),
            PageWindow {
                offset: 10,
                limit: 10
            }
        );
    }

    #[test]
    fn empty_collection_has_one_page() {
        let paginator = paginator(0);
        assert_eq!(paginator.num_pages(), 1);
        assert_eq!(paginator.resolve(RequestedPage::Number(5)), 1);
    }

    #[test]
    fn out_of_range_numbers_clamp_to_last_page() {
        let paginator = paginator(25);
        assert_eq!(paginator.resolve(RequestedPage::Number(99)), 3);
        assert_eq!(paginator.resolve(RequestedPage::Number(0)), 3);
        assert_eq!(paginator.resolve(RequestedPage::Number(-4)), 3);
        assert_eq!(paginator.resolve(RequestedPage::Number(i64::MAX)), 3);
    }

    #[test]
    fn unparseable_input_resolves_to_first_page() {
        let paginator = paginator(25);
        assert_eq!(paginator.resolve(RequestedPage::Default), 1);
    }

    #[test]
    fn page_navigation_flags() {
        let paginator = paginator(25);
        let first = paginator.page(1, vec![(); 10]);
        assert!(!first.has_previous());
        assert_eq!(first.next_page_number(), Some(2));

        let last = paginator.page(3, vec![(); 5]);
        assert!(last.has_previous());
        assert!(!last.has_next());
        assert_eq!(last.previous_page_number(), Some(2));
    }

    #[test]
    fn windows_cover_every_row_once() {
        let total = 37_u64;
        let paginator = paginator(total);
        let mut covered = Vec::new();
        for number in 1..=paginator.num_pages() {
            let window = paginator.window(number);
            let end = (window.offset + u64::from(window.limit)).min(total);
            covered.extend(window.offset..end);
        }
        assert_eq!(covered, (0..total).collect::<Vec<_>>());
    }
}
