//! Page assembly.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::storage::RowCount;

use super::row::Row;
use super::seek::Cursor;
use super::sort::SortPlan;

/// Pagination metadata serialized with every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub per_page: u32,
    pub count: u64,
    pub is_estimated: bool,
    /// Flat cursor parameters for the next page.
    pub last_indexes: Option<BTreeMap<String, String>>,
    /// Opaque cursor token for the next page.
    pub next: Option<String>,
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub results: Vec<Row>,
    pub pagination: Pagination,
    #[serde(skip)]
    pub next_cursor: Option<Cursor>,
    #[serde(skip)]
    pub has_more: bool,
}

impl Page {
    /// Rows actually returned on this page.
    pub fn returned(&self) -> usize {
        self.results.len()
    }
}

pub struct PageAssembler;

impl PageAssembler {
    /// Package rows and pagination state. Row order is preserved; without a
    /// count from storage, `count` is the number of rows returned.
    pub fn assemble(
        rows: Vec<Row>,
        per_page: u32,
        next_cursor: Option<Cursor>,
        has_more: bool,
        count: Option<RowCount>,
        sort: &SortPlan,
    ) -> Page {
        let (count, is_estimated) = match count {
            Some(c) => (c.value(), c.is_estimated()),
            None => (rows.len() as u64, false),
        };
        let pagination = Pagination {
            per_page,
            count,
            is_estimated,
            last_indexes: next_cursor.as_ref().map(|c| c.to_last_indexes(sort)),
            next: next_cursor.as_ref().map(Cursor::encode),
        };
        Page {
            results: rows,
            pagination,
            next_cursor,
            has_more,
        }
    }
}
