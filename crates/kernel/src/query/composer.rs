//! Query composer.
//!
//! Runs one request through the pipeline: filter predicate and sort plan,
//! seek bound from the incoming cursor, one storage round trip under a
//! deadline, then eager-load attachment, derived fields, and page assembly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::{Catalog, Dataset};
use crate::config::Config;
use crate::error::QueryError;
use crate::storage::{Storage, StorageError};

use super::intent::QueryIntent;
use super::page::{Page, PageAssembler};
use super::plan::QueryPlan;
use super::predicate::build_filter_predicate;
use super::row::Row;
use super::seek::{SeekPaginator, seek_predicate};
use super::sort;
use super::value::Value;

/// Engine settings passed explicitly to the composer.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_per_page: u32,
    pub max_per_page: u32,
    pub query_timeout: Duration,
    pub pdf_base_url: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_per_page: 20,
            max_per_page: 100,
            query_timeout: Duration::from_secs(10),
            pdf_base_url: "https://docquery.fec.gov/pdf".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_per_page: config.default_per_page,
            max_per_page: config.max_per_page,
            query_timeout: Duration::from_millis(config.query_timeout_ms),
            pdf_base_url: config.pdf_base_url.clone(),
        }
    }
}

/// A validated plan and the page size it was built for.
#[derive(Debug, Clone)]
pub struct ComposedQuery {
    pub plan: QueryPlan,
    pub page_size: u32,
}

pub struct QueryComposer {
    catalog: Arc<Catalog>,
    storage: Arc<dyn Storage>,
    settings: EngineSettings,
    paginator: SeekPaginator,
}

impl QueryComposer {
    pub fn new(catalog: Arc<Catalog>, storage: Arc<dyn Storage>, settings: EngineSettings) -> Self {
        let paginator = SeekPaginator::new(settings.default_per_page, settings.max_per_page);
        Self {
            catalog,
            storage,
            settings,
            paginator,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Validate `intent` and build its plan without touching storage.
    pub fn compose(&self, intent: &QueryIntent) -> Result<ComposedQuery, QueryError> {
        let dataset = self.catalog.dataset(intent.dataset())?;
        let filter = build_filter_predicate(dataset, intent.filters())?;
        let sort = sort::resolve(dataset, intent.sort(), intent.sort_reverse())?;
        let page_size = self.paginator.page_size(intent.per_page())?;
        let cursor = self.paginator.resolve_cursor(intent.cursor(), &sort)?;
        let seek = cursor.as_ref().map(|c| seek_predicate(&sort, c));

        let plan = QueryPlan::new(
            dataset,
            filter,
            seek,
            sort,
            self.paginator.fetch_limit(page_size),
        );
        Ok(ComposedQuery { plan, page_size })
    }

    /// Execute `intent` and return one page.
    pub async fn execute(&self, intent: &QueryIntent) -> Result<Page, QueryError> {
        let ComposedQuery { plan, page_size } = self.compose(intent)?;
        let dataset = self.catalog.dataset(&plan.dataset)?;

        tracing::debug!(
            dataset = %plan.dataset,
            backend = self.storage.backend(),
            sql = %plan.to_sql(),
            "executing query"
        );

        let started = Instant::now();
        let timeout = self.settings.query_timeout;
        let fetched = match tokio::time::timeout(timeout, self.storage.fetch(&plan)).await {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(StorageError::StatementTimeout)) | Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(
                    dataset = %plan.dataset,
                    timeout_ms,
                    "query exceeded deadline"
                );
                return Err(QueryError::Timeout {
                    dataset: plan.dataset.clone(),
                    timeout_ms,
                });
            }
            Ok(Err(e)) => {
                tracing::error!(dataset = %plan.dataset, error = %e, "query failed");
                return Err(e.into());
            }
        };

        let (mut rows, has_more) = self.paginator.split_probe(fetched.rows, page_size);
        attach_related(dataset, &mut rows, &fetched.related);
        self.apply_derived(dataset, &mut rows);
        let next_cursor = self.paginator.next_cursor(&plan.sort, &rows, has_more);

        tracing::debug!(
            dataset = %plan.dataset,
            rows = rows.len(),
            has_more,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query complete"
        );

        Ok(PageAssembler::assemble(
            rows,
            page_size,
            next_cursor,
            has_more,
            fetched.count,
            &plan.sort,
        ))
    }

    fn apply_derived(&self, dataset: &Dataset, rows: &mut [Row]) {
        for row in rows.iter_mut() {
            if let Some(reportable) = dataset.reportable() {
                reportable.annotate(row, &self.settings.pdf_base_url);
            }
            for decoded in dataset.decoded_columns() {
                decoded.decode(row);
            }
        }
    }
}

/// Attach each eager-loaded record to the rows referencing it. Rows whose
/// foreign id matches nothing get an explicit null relation.
fn attach_related(dataset: &Dataset, rows: &mut [Row], related: &HashMap<String, Vec<Row>>) {
    for load in dataset.eager_loads() {
        let by_key: HashMap<&Value, &Row> = related
            .get(&load.name)
            .into_iter()
            .flatten()
            .map(|r| (r.get(&load.target_column), r))
            .collect();
        for row in rows.iter_mut() {
            let found = by_key.get(row.get(&load.local_column)).map(|r| (*r).clone());
            row.set_related(load.name.clone(), found);
        }
    }
}
