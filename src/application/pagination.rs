//! Page-number pagination over ordered listings.

use serde::{Deserialize, Serialize};

/// Number of posts shown on one listing page.
pub const POSTS_PER_PAGE: u32 = 10;

/// A one-based page request with a fixed page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    /// Page of [`POSTS_PER_PAGE`] items.
    pub fn posts(number: u32) -> Self {
        Self::new(number, POSTS_PER_PAGE)
    }

    /// Interpret a raw `?page=` value. Missing or unparsable input selects the
    /// first page.
    pub fn from_query(raw: Option<&str>, size: u32) -> Self {
        let number = raw
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(1);
        Self::new(number, size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::posts(1)
    }
}

/// Raw `?page=` query parameter.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::from_query(self.page.as_deref(), POSTS_PER_PAGE)
    }
}

/// One page of an ordered listing.
///
/// A request beyond the last page yields an empty page that still reports the
/// requested number; an empty listing has zero pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub size: u32,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        Self {
            items,
            number: request.number,
            size: request.size,
            total_count,
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }

    pub fn num_pages(&self) -> u32 {
        num_pages(self.total_count, self.size)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1 && self.number <= self.num_pages()
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages()
    }

    pub fn previous_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_count: self.total_count,
        }
    }
}

/// Whether `request` points past the last page of `total_count` items.
pub fn is_out_of_range(total_count: u64, request: PageRequest) -> bool {
    request.number > num_pages(total_count, request.size)
}

pub fn num_pages(total_count: u64, size: u32) -> u32 {
    let size = u64::from(size.max(1));
    let pages = total_count.div_ceil(size);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
