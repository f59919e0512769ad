use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u64 = 100;
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Offset-based window over a listing. The limit is capped at
/// [`MAX_PAGE_SIZE`] regardless of what the caller asks for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl PageRequest {
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self { limit, offset }
    }

    pub fn effective_limit(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn effective_offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: &PageRequest) -> Self {
        Self {
            items,
            total,
            limit: page.effective_limit(),
            offset: page.effective_offset(),
        }
    }
}
