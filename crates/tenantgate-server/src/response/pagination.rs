//! Pagination support for list endpoints.

use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

/// Paginated response wrapper.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Current page number (1-indexed).
    pub page: u32,
    /// Items per page.
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationMeta {
    pub fn new(params: PaginationParams, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(params.limit)) as u32;
        Self {
            page: params.page,
            limit: params.limit,
            total,
            total_pages,
            has_next: params.page < total_pages,
            has_previous: params.page > 1,
        }
    }
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, params: PaginationParams, total: u64) -> Self {
        Self {
            items,
            pagination: PaginationMeta::new(params, total),
        }
    }

    /// Take the requested page out of a complete list.
    pub fn from_vec(all: Vec<T>, params: PaginationParams) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit as usize)
            .collect();
        Self::new(items, params, total)
    }
}

/// Normalised `page`/`limit` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: u32,
    pub limit: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PaginationParams {
    /// `page` is at least 1; `limit` is clamped to `1..=100`. Unparseable
    /// values fall back to the defaults.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let parse = |key: &str| query.get(key).and_then(|v| v.trim().parse::<u32>().ok());
        Self::new(parse("page"), parse("limit"))
    }

    /// Get the offset for database queries.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}
