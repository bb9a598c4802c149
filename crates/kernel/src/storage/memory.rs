//! In-memory storage.
//!
//! Evaluates plans directly against rows held in memory, with the same
//! ordering and null semantics as the PostgreSQL backend. Used for fixtures
//! and tests; tables can be mutated between page fetches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{FetchResult, RowCount, Storage, StorageError};
use crate::catalog::CountStrategy;
use crate::query::plan::{LookupPlan, QueryPlan};
use crate::query::row::Row;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    fetches: AtomicUsize,
    lookups: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style table registration.
    pub fn with_table(self, table: &str, rows: Vec<Row>) -> Self {
        self.tables.write().insert(table.to_string(), rows);
        self
    }

    pub fn insert(&self, table: &str, row: Row) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Remove matching rows. Returns how many were removed.
    pub fn delete_where(&self, table: &str, predicate: impl Fn(&Row) -> bool) -> usize {
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|row| !predicate(row));
        before - rows.len()
    }

    /// Number of plans executed.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of eager-load lookups executed.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

fn missing(table: &str) -> StorageError {
    StorageError::Unavailable(format!("table '{table}' does not exist"))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn fetch(&self, plan: &QueryPlan) -> Result<FetchResult, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read();
        let table = tables.get(&plan.table).ok_or_else(|| missing(&plan.table))?;

        let predicate = plan.where_predicate();
        let mut matched: Vec<&Row> = table.iter().filter(|r| predicate.matches(r)).collect();
        matched.sort_by(|a, b| plan.sort.compare_rows(a, b));

        let limit = usize::try_from(plan.limit).unwrap_or(usize::MAX);
        let columns = plan.column_names();
        let rows: Vec<Row> = matched
            .into_iter()
            .take(limit)
            .map(|row| row.project(&columns))
            .collect();

        let count = match plan.count {
            CountStrategy::Returned => None,
            CountStrategy::Exact | CountStrategy::Estimated { .. } => {
                let n = table.iter().filter(|r| plan.filter.matches(r)).count() as u64;
                match plan.count {
                    CountStrategy::Estimated { exact_below } if n >= exact_below => {
                        Some(RowCount::Estimated(n))
                    }
                    _ => Some(RowCount::Exact(n)),
                }
            }
        };

        let mut related = HashMap::new();
        for load in &plan.eager_loads {
            let Some(lookup) = LookupPlan::for_rows(load, &rows) else {
                related.insert(load.name.clone(), Vec::new());
                continue;
            };
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let target = tables
                .get(&load.target_table)
                .ok_or_else(|| missing(&load.target_table))?;
            let predicate = lookup.predicate();
            let names: Vec<String> = load.columns.iter().map(|c| c.name.clone()).collect();
            let found = target
                .iter()
                .filter(|r| predicate.matches(r))
                .map(|r| r.project(&names))
                .collect();
            related.insert(load.name.clone(), found);
        }

        Ok(FetchResult {
            rows,
            related,
            count,
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
