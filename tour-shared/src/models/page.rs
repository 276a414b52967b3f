use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Zero-based page request, as accepted on list endpoints (`?page=0&size=20`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }.clamped()
    }

    /// Size is forced into `1..=MAX_PAGE_SIZE`.
    pub fn clamped(self) -> Self {
        Self {
            page: self.page,
            size: self.size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }

    /// Slice an already-sorted collection into the requested page.
    pub fn paginate<T: Clone>(&self, items: &[T]) -> Page<T> {
        let total = items.len() as u64;
        let start = (self.offset() as usize).min(items.len());
        let end = (start + self.size as usize).min(items.len());
        Page {
            items: items[start..end].to_vec(),
            page: self.page,
            size: self.size,
            total,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(u64::from(self.size))
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
        }
    }
}
