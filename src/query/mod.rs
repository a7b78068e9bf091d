//! Typed, read-only query facades over the relational read model.
//!
//! [PublicReads] serves cross-tenant queries; [ClubReads] is scoped to a
//! single club at construction time. Both see whatever prefix of the event
//! log the projection worker has applied so far: stale, but consistent.

pub mod club;
pub mod public;

use serde::Serialize;

pub use club::ClubReads;
pub use public::PublicReads;

/// A page of query results.
///
/// Pages are zero-based; `per_page` must be positive. `count` is the number
/// of results in this page, `total_count` the number of rows across all
/// pages.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub total_count: i64,
    pub total_pages: i64,
    pub count: usize,
    pub page: i64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    fn new(total_count: i64, page: i64, per_page: i64, results: Vec<T>) -> Self {
        Self {
            total_count,
            total_pages: (total_count + per_page - 1) / per_page,
            count: results.len(),
            page,
            results,
        }
    }
}

// LIKE-escapes a search term and wraps it for substring matching.
fn substring_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");

    format!("%{escaped}%")
}
