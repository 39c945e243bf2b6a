//! Offset pagination for the admin listing endpoints.

use serde::Serialize;

/// Rows returned when the caller gives no `limit`.
pub const DEFAULT_LIMIT: i64 = 100;

/// Upper bound on `limit`.
pub const MAX_LIMIT: i64 = 1000;

/// Resolved `skip`/`limit` pair.
///
/// Negative values are clamped to zero and `limit` is capped at
/// [`MAX_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            offset: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(0, MAX_LIMIT),
        }
    }

    /// Apply this page to an already ordered sequence.
    pub fn slice<T>(self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(usize::try_from(self.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit).unwrap_or(0))
            .collect()
    }
}

/// One page of log rows plus the number of rows matching the filters.
#[derive(Debug, Clone, Serialize)]
pub struct LogPage<T> {
    pub total: i64,
    pub logs: Vec<T>,
}
