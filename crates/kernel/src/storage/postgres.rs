//! PostgreSQL storage.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row as _, Transaction};
use tracing::debug;

use super::{FetchResult, RowCount, Storage, StorageError};
use crate::catalog::{ColumnDef, ColumnKind, CountStrategy};
use crate::query::plan::{LookupPlan, QueryPlan};
use crate::query::row::Row;
use crate::query::value::Value;

/// Executes plans on a PostgreSQL pool. Each fetch runs in its own
/// read-only, repeatable-read transaction so the page, the count, and the
/// eager-load lookups see one snapshot.
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgStorage {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    async fn count(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        plan: &QueryPlan,
    ) -> Result<Option<RowCount>, StorageError> {
        match plan.count {
            CountStrategy::Returned => Ok(None),
            CountStrategy::Exact => Ok(Some(RowCount::Exact(exact_count(tx, plan).await?))),
            CountStrategy::Estimated { exact_below } => {
                let explain: serde_json::Value = sqlx::query_scalar(&plan.estimate_sql())
                    .fetch_one(&mut **tx)
                    .await?;
                let estimate = explain[0]["Plan"]["Plan Rows"]
                    .as_f64()
                    .map(|rows| rows.max(0.0).round() as u64)
                    .ok_or_else(|| StorageError::Decode {
                        column: "Plan Rows".to_string(),
                        details: "missing from EXPLAIN output".to_string(),
                    })?;
                if estimate < exact_below {
                    Ok(Some(RowCount::Exact(exact_count(tx, plan).await?)))
                } else {
                    Ok(Some(RowCount::Estimated(estimate)))
                }
            }
        }
    }
}

async fn exact_count(
    tx: &mut Transaction<'_, Postgres>,
    plan: &QueryPlan,
) -> Result<u64, StorageError> {
    let total: i64 = sqlx::query_scalar(&plan.count_sql())
        .fetch_one(&mut **tx)
        .await?;
    Ok(u64::try_from(total).unwrap_or(0))
}

#[async_trait]
impl Storage for PgStorage {
    async fn fetch(&self, plan: &QueryPlan) -> Result<FetchResult, StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        // SET LOCAL resets when the transaction ends.
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = '{}ms'",
            self.statement_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await?;

        let sql = plan.to_sql();
        let pg_rows = sqlx::query(&sql).fetch_all(&mut *tx).await?;
        let rows = pg_rows
            .iter()
            .map(|r| decode_row(r, &plan.columns))
            .collect::<Result<Vec<_>, _>>()?;

        let count = self.count(&mut tx, plan).await?;

        let mut related = HashMap::new();
        for load in &plan.eager_loads {
            let Some(lookup) = LookupPlan::for_rows(load, &rows) else {
                related.insert(load.name.clone(), Vec::new());
                continue;
            };
            let found = sqlx::query(&lookup.to_sql())
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|r| decode_row(r, &load.columns))
                .collect::<Result<Vec<_>, _>>()?;
            debug!(
                relation = %load.name,
                keys = lookup.keys.len(),
                found = found.len(),
                "eager load"
            );
            related.insert(load.name.clone(), found);
        }

        tx.commit().await?;

        Ok(FetchResult {
            rows,
            related,
            count,
        })
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn decode_row(row: &PgRow, columns: &[ColumnDef]) -> Result<Row, StorageError> {
    let mut out = Row::new();
    for column in columns {
        out.insert(column.name.clone(), decode_value(row, column)?);
    }
    Ok(out)
}

fn decode_value(row: &PgRow, column: &ColumnDef) -> Result<Value, StorageError> {
    let name = column.name.as_str();
    let fail = |e: sqlx::Error| StorageError::Decode {
        column: name.to_string(),
        details: e.to_string(),
    };

    let value = match column.kind {
        // BIGINT, INTEGER and SMALLINT all widen to i64.
        ColumnKind::Integer => match row.try_get::<Option<i64>, _>(name) {
            Ok(v) => Value::from(v),
            Err(_) => match row.try_get::<Option<i32>, _>(name) {
                Ok(v) => Value::from(v),
                Err(_) => Value::from(
                    row.try_get::<Option<i16>, _>(name)
                        .map_err(fail)?
                        .map(i64::from),
                ),
            },
        },
        ColumnKind::Decimal => Value::from(row.try_get::<Option<Decimal>, _>(name).map_err(fail)?),
        ColumnKind::Text => Value::from(row.try_get::<Option<String>, _>(name).map_err(fail)?),
        ColumnKind::Date => Value::from(row.try_get::<Option<NaiveDate>, _>(name).map_err(fail)?),
        ColumnKind::Timestamp => match row.try_get::<Option<NaiveDateTime>, _>(name) {
            Ok(v) => Value::from(v),
            Err(_) => Value::from(
                row.try_get::<Option<DateTime<Utc>>, _>(name)
                    .map_err(fail)?
                    .map(|t| t.naive_utc()),
            ),
        },
        ColumnKind::Boolean => Value::from(row.try_get::<Option<bool>, _>(name).map_err(fail)?),
        ColumnKind::TextSearch => Value::Null,
    };
    Ok(value)
}
