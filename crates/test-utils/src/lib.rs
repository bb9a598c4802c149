//! Tally test utilities.
//!
//! Fixture builders for disclosure rows, storage test doubles, and a helper
//! that walks a query to exhaustion through its cursors.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use tally_kernel::QueryError;
use tally_kernel::catalog::datasets::builtin_catalog;
use tally_kernel::query::{
    CursorInput, EngineSettings, Page, QueryComposer, QueryIntent, QueryPlan, Row,
};
use tally_kernel::storage::{FetchResult, MemoryStorage, Storage, StorageError};

/// Table backing the `schedule_b` dataset.
pub const SCHED_B_TABLE: &str = "ofec_sched_b";
/// Table backing committee lookups.
pub const COMMITTEE_TABLE: &str = "ofec_committee_detail";

/// Build a calendar date, panicking on an invalid one.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// Create a disbursement with default values.
pub fn disbursement(sched_b_sk: i64) -> Disbursement {
    Disbursement {
        sched_b_sk,
        committee_id: Some("C00000001".to_string()),
        recipient_committee_id: None,
        recipient_name: Some(format!("RECIPIENT {sched_b_sk}")),
        recipient_city: Some("WASHINGTON".to_string()),
        recipient_state: Some("DC".to_string()),
        disbursement_description: Some("OPERATING EXPENSES".to_string()),
        disbursement_date: Some(date(2015, 1, 1)),
        disbursement_amount: Some(Decimal::new(10_000, 2)),
        image_number: Some(format!("2015{sched_b_sk:07}")),
        report_year: 2015,
    }
}

/// A Schedule B fixture builder.
#[derive(Debug, Clone)]
pub struct Disbursement {
    pub sched_b_sk: i64,
    pub committee_id: Option<String>,
    pub recipient_committee_id: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_city: Option<String>,
    pub recipient_state: Option<String>,
    pub disbursement_description: Option<String>,
    pub disbursement_date: Option<NaiveDate>,
    pub disbursement_amount: Option<Decimal>,
    pub image_number: Option<String>,
    pub report_year: i32,
}

impl Disbursement {
    pub fn committee(mut self, committee_id: &str) -> Self {
        self.committee_id = Some(committee_id.to_string());
        self
    }

    pub fn recipient_committee(mut self, committee_id: &str) -> Self {
        self.recipient_committee_id = Some(committee_id.to_string());
        self
    }

    pub fn recipient(mut self, name: &str) -> Self {
        self.recipient_name = Some(name.to_string());
        self
    }

    pub fn state(mut self, state: &str) -> Self {
        self.recipient_state = Some(state.to_string());
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.disbursement_description = Some(text.to_string());
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.disbursement_date = Some(date);
        self
    }

    /// Clear the disbursement date.
    pub fn undated(mut self) -> Self {
        self.disbursement_date = None;
        self
    }

    /// Amount in cents.
    pub fn amount_cents(mut self, cents: i64) -> Self {
        self.disbursement_amount = Some(Decimal::new(cents, 2));
        self
    }

    pub fn year(mut self, report_year: i32) -> Self {
        self.report_year = report_year;
        self
    }

    /// Render as a storage row, including the text-search columns.
    pub fn row(&self) -> Row {
        Row::new()
            .with("sched_b_sk", self.sched_b_sk)
            .with("committee_id", self.committee_id.clone())
            .with("recipient_committee_id", self.recipient_committee_id.clone())
            .with("recipient_name", self.recipient_name.clone())
            .with("recipient_name_text", self.recipient_name.clone())
            .with("recipient_city", self.recipient_city.clone())
            .with("recipient_state", self.recipient_state.clone())
            .with(
                "disbursement_description",
                self.disbursement_description.clone(),
            )
            .with(
                "disbursement_description_text",
                self.disbursement_description.clone(),
            )
            .with("disbursement_date", self.disbursement_date)
            .with("disbursement_amount", self.disbursement_amount)
            .with("image_number", self.image_number.clone())
            .with("report_year", self.report_year)
    }
}

/// A committee reference record.
pub fn committee(committee_id: &str, name: &str, committee_type: &str) -> Row {
    Row::new()
        .with("committee_id", committee_id)
        .with("name", name)
        .with("committee_type", committee_type)
        .with("designation", "P")
}

/// In-memory storage seeded with `schedule_b` rows and committees.
pub fn sched_b_storage(rows: &[Disbursement], committees: Vec<Row>) -> MemoryStorage {
    MemoryStorage::new()
        .with_table(SCHED_B_TABLE, rows.iter().map(Disbursement::row).collect())
        .with_table(COMMITTEE_TABLE, committees)
}

/// Composer over the built-in catalog.
pub fn composer(storage: Arc<dyn Storage>, settings: EngineSettings) -> QueryComposer {
    let catalog = builtin_catalog(2011).expect("built-in catalog is valid");
    QueryComposer::new(Arc::new(catalog), storage, settings)
}

/// Settings with the given page sizes and a generous deadline.
pub fn settings(default_per_page: u32, max_per_page: u32) -> EngineSettings {
    EngineSettings {
        default_per_page,
        max_per_page,
        ..EngineSettings::default()
    }
}

/// Follow opaque cursors from page 1 until exhaustion.
pub async fn collect_pages(
    composer: &QueryComposer,
    intent: &QueryIntent,
) -> Result<Vec<Page>, QueryError> {
    let mut pages = Vec::new();
    let mut current = intent.clone();
    loop {
        let page = composer.execute(&current).await?;
        let next = page.pagination.next.clone();
        pages.push(page);
        match next {
            Some(token) => current = intent.with_cursor(CursorInput::Token(token)),
            None => return Ok(pages),
        }
    }
}

/// Index values of every row across `pages`, in order.
pub fn indexes(pages: &[Page], column: &str) -> Vec<i64> {
    pages
        .iter()
        .flat_map(|p| p.results.iter())
        .filter_map(|r| r.get(column).as_i64())
        .collect()
}

// ---------------------------------------------------------------------------
// Storage doubles
// ---------------------------------------------------------------------------

/// Delays every fetch before delegating.
pub struct SlowStorage<S> {
    inner: S,
    delay: Duration,
}

impl<S> SlowStorage<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<S: Storage> Storage for SlowStorage<S> {
    async fn fetch(&self, plan: &QueryPlan) -> Result<FetchResult, StorageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch(plan).await
    }

    fn backend(&self) -> &'static str {
        "slow"
    }
}

/// Fails every fetch and counts attempts.
#[derive(Debug, Default)]
pub struct FailingStorage {
    attempts: AtomicUsize,
    cancelled: bool,
}

impl FailingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail as if the server cancelled the statement at its timeout.
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn fetch(&self, _plan: &QueryPlan) -> Result<FetchResult, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.cancelled {
            return Err(StorageError::StatementTimeout);
        }
        Err(StorageError::Unavailable("connection reset".to_string()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}
