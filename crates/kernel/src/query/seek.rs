//! Seek (keyset) pagination.
//!
//! A page boundary is the ordering-key tuple of the last row returned. The
//! next page is everything strictly after that tuple in the effective
//! ordering, expressed as a lexicographic chain of strict inequalities:
//!
//! ```text
//! (f1 > v1) OR (f1 = v1 AND f2 > v2) OR ... OR (f1 = v1 AND ... AND idx > idx_prev)
//! ```
//!
//! with `<` in place of `>` for descending keys. Nulls sort after every
//! value, so an ascending "after v" also admits nulls and a descending
//! "after null" admits every non-null value.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::catalog::SortDirection;
use crate::error::QueryError;

use super::intent::CursorInput;
use super::predicate::{CompareOp, Predicate};
use super::row::Row;
use super::sort::{SortKey, SortPlan};
use super::value::Value;

/// Boundary of a page: one value per key of the active ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    entries: Vec<(String, Value)>,
}

impl Cursor {
    /// Cursor positioned at `row`.
    pub fn from_row(plan: &SortPlan, row: &Row) -> Self {
        let entries = plan
            .keys()
            .iter()
            .map(|key| (key.field.clone(), row.get(&key.column).clone()))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.entries.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    /// Opaque transport form: URL-safe base64 of `[[field, value|null], ...]`.
    pub fn encode(&self) -> String {
        let pairs: Vec<(&str, Option<String>)> = self
            .entries
            .iter()
            .map(|(field, value)| (field.as_str(), value.to_cursor_string()))
            .collect();
        // Serializing strings and options cannot fail.
        let json = serde_json::to_vec(&pairs).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a token minted by [`Cursor::encode`] and check it against the
    /// active ordering.
    pub fn decode(token: &str, plan: &SortPlan) -> Result<Self, QueryError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| QueryError::cursor(format!("not valid base64: {e}")))?;
        let pairs: Vec<(String, Option<String>)> = serde_json::from_slice(&bytes)
            .map_err(|e| QueryError::cursor(format!("malformed cursor payload: {e}")))?;

        if pairs.len() != plan.keys().len()
            || pairs
                .iter()
                .zip(plan.keys())
                .any(|((field, _), key)| *field != key.field)
        {
            let found: Vec<&str> = pairs.iter().map(|(f, _)| f.as_str()).collect();
            return Err(QueryError::cursor(format!(
                "cursor fields [{}] do not match the active sort [{}]",
                found.join(", "),
                plan.fields().join(", ")
            )));
        }

        let entries = pairs
            .into_iter()
            .zip(plan.keys())
            .map(|((field, raw), key)| Ok((field, parse_entry(key, raw.as_deref())?)))
            .collect::<Result<_, QueryError>>()?;
        Ok(Self { entries })
    }

    /// Build from flat `last_index` / `last_<field>` parameters. With
    /// `sort_null_only`, a sort field without a `last_<field>` value is null.
    pub fn from_last_indexes(
        plan: &SortPlan,
        last_index: &str,
        last_values: &BTreeMap<String, String>,
        sort_null_only: bool,
    ) -> Result<Self, QueryError> {
        if let Some(extra) = last_values
            .keys()
            .find(|field| !plan.sort_keys().iter().any(|k| &k.field == *field))
        {
            return Err(QueryError::cursor(format!(
                "last_{extra} does not match the active sort [{}]",
                plan.fields().join(", ")
            )));
        }

        let mut entries = Vec::with_capacity(plan.keys().len());
        for key in plan.sort_keys() {
            let raw = match last_values.get(&key.field) {
                Some(raw) => Some(raw.as_str()),
                None if sort_null_only => None,
                None => {
                    return Err(QueryError::cursor(format!(
                        "last_{} is required with last_index",
                        key.field
                    )));
                }
            };
            entries.push((key.field.clone(), parse_entry(key, raw)?));
        }
        let index = plan.index_key();
        entries.push((index.field.clone(), parse_entry(index, Some(last_index))?));
        Ok(Self { entries })
    }

    /// Flat parameter form of this cursor.
    pub fn to_last_indexes(&self, plan: &SortPlan) -> BTreeMap<String, String> {
        let index_field = &plan.index_key().field;
        let mut out = BTreeMap::new();
        for (field, value) in &self.entries {
            let name = if field == index_field {
                "last_index".to_string()
            } else {
                format!("last_{field}")
            };
            match value.to_cursor_string() {
                Some(text) => {
                    out.insert(name, text);
                }
                None => {
                    out.insert("sort_null_only".to_string(), "true".to_string());
                }
            }
        }
        out
    }
}

fn parse_entry(key: &SortKey, raw: Option<&str>) -> Result<Value, QueryError> {
    match raw {
        None if key.nullable => Ok(Value::Null),
        None => Err(QueryError::cursor(format!(
            "'{}' cannot be null in a cursor",
            key.field
        ))),
        Some(raw) => Value::parse(key.kind, raw).map_err(|e| {
            QueryError::cursor(format!("value for '{}': {e}", key.field))
        }),
    }
}

/// The predicate selecting every row strictly after `cursor`.
pub fn seek_predicate(plan: &SortPlan, cursor: &Cursor) -> Predicate {
    let mut branches = Vec::with_capacity(plan.keys().len());
    let mut prefix: Vec<Predicate> = Vec::new();

    for (key, (_, value)) in plan.keys().iter().zip(cursor.entries()) {
        if let Some(after) = after(key, value) {
            let mut branch = prefix.clone();
            branch.push(after);
            branches.push(Predicate::All(branch));
        }
        prefix.push(equal(key, value));
    }

    Predicate::Any(branches)
}

fn equal(key: &SortKey, value: &Value) -> Predicate {
    if value.is_null() {
        Predicate::is_null(&key.column)
    } else {
        Predicate::compare(&key.column, CompareOp::Eq, value.clone())
    }
}

fn after(key: &SortKey, value: &Value) -> Option<Predicate> {
    match (key.direction, value.is_null()) {
        (SortDirection::Asc, true) => None,
        (SortDirection::Asc, false) => {
            let greater = Predicate::compare(&key.column, CompareOp::Gt, value.clone());
            if key.nullable {
                Some(Predicate::Any(vec![greater, Predicate::is_null(&key.column)]))
            } else {
                Some(greater)
            }
        }
        (SortDirection::Desc, true) => Some(Predicate::is_not_null(&key.column)),
        (SortDirection::Desc, false) => Some(Predicate::compare(
            &key.column,
            CompareOp::Lt,
            value.clone(),
        )),
    }
}

/// Page-size policy and cursor handling around one query.
#[derive(Debug, Clone, Copy)]
pub struct SeekPaginator {
    default_per_page: u32,
    max_per_page: u32,
}

impl SeekPaginator {
    pub fn new(default_per_page: u32, max_per_page: u32) -> Self {
        Self {
            default_per_page,
            max_per_page,
        }
    }

    /// Effective page size. Zero or anything above the maximum is rejected.
    pub fn page_size(&self, requested: Option<u32>) -> Result<u32, QueryError> {
        match requested {
            None => Ok(self.default_per_page),
            Some(n) if n == 0 || n > self.max_per_page => Err(QueryError::PageSize {
                requested: n,
                max: self.max_per_page,
            }),
            Some(n) => Ok(n),
        }
    }

    /// Rows to fetch: one more than the page, to detect a following page.
    pub fn fetch_limit(&self, page_size: u32) -> u64 {
        u64::from(page_size) + 1
    }

    pub fn resolve_cursor(
        &self,
        input: Option<&CursorInput>,
        plan: &SortPlan,
    ) -> Result<Option<Cursor>, QueryError> {
        match input {
            None => Ok(None),
            Some(CursorInput::Token(token)) => Cursor::decode(token, plan).map(Some),
            Some(CursorInput::LastIndexes {
                last_index,
                last_values,
                sort_null_only,
            }) => Cursor::from_last_indexes(plan, last_index, last_values, *sort_null_only)
                .map(Some),
        }
    }

    /// Drop the probe row. Returns the page and whether more rows follow.
    pub fn split_probe(&self, mut rows: Vec<Row>, page_size: u32) -> (Vec<Row>, bool) {
        let page_size = page_size as usize;
        let has_more = rows.len() > page_size;
        rows.truncate(page_size);
        (rows, has_more)
    }

    /// Cursor after the last returned row, when another page exists.
    pub fn next_cursor(&self, plan: &SortPlan, rows: &[Row], has_more: bool) -> Option<Cursor> {
        if !has_more {
            return None;
        }
        rows.last().map(|row| Cursor::from_row(plan, row))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ColumnKind, DatasetDef, SortSpec};
    use crate::query::sort::{SortRequest, resolve};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn catalog() -> Catalog {
        Catalog::builder()
            .register(
                DatasetDef::new("disb", "disb")
                    .index("sk")
                    .column("sk", ColumnKind::Integer)
                    .column("date", ColumnKind::Date)
                    .column("amount", ColumnKind::Decimal)
                    .sort(SortSpec::both("date"))
                    .sort(SortSpec::both("amount"))
                    .multi_sort(true),
            )
            .unwrap()
            .build()
    }

    fn plan(requests: &[SortRequest]) -> SortPlan {
        let catalog = catalog();
        resolve(catalog.dataset("disb").unwrap(), requests, false).unwrap()
    }

    fn row(sk: i64, date: Option<(i32, u32, u32)>, amount: &str) -> Row {
        Row::new()
            .with("sk", sk)
            .with(
                "date",
                date.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            )
            .with("amount", amount.parse::<Decimal>().unwrap())
    }

    #[test]
    fn token_round_trip_keeps_exact_values() {
        let plan = plan(&[SortRequest::desc("amount")]);
        let cursor = Cursor::from_row(&plan, &row(9_007_199_254_740_993, None, "1250.10"));
        let decoded = Cursor::decode(&cursor.encode(), &plan).unwrap();
        assert_eq!(decoded, cursor);
        assert_eq!(
            decoded.value("amount"),
            Some(&Value::Decimal("1250.10".parse().unwrap()))
        );
        assert_eq!(
            decoded.value("sk"),
            Some(&Value::Integer(9_007_199_254_740_993))
        );
    }

    #[test]
    fn token_is_url_safe() {
        let plan = plan(&[SortRequest::asc("date")]);
        let token = Cursor::from_row(&plan, &row(1, Some((2016, 1, 3)), "1")).encode();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn decode_rejects_mismatched_fields() {
        let by_date = plan(&[SortRequest::asc("date")]);
        let by_amount = plan(&[SortRequest::asc("amount")]);
        let token = Cursor::from_row(&by_date, &row(1, Some((2016, 1, 3)), "1")).encode();
        assert!(matches!(
            Cursor::decode(&token, &by_amount),
            Err(QueryError::CursorDecode { .. })
        ));
        assert!(matches!(
            Cursor::decode("!!!", &by_amount),
            Err(QueryError::CursorDecode { .. })
        ));
        assert!(matches!(
            Cursor::decode(&URL_SAFE_NO_PAD.encode(b"{}"), &by_amount),
            Err(QueryError::CursorDecode { .. })
        ));
    }

    #[test]
    fn decode_rejects_null_index_and_bad_values() {
        let plan = plan(&[SortRequest::asc("date")]);
        let token = URL_SAFE_NO_PAD.encode(br#"[["date","2016-01-03"],["sk",null]]"#);
        assert!(Cursor::decode(&token, &plan).is_err());
        let token = URL_SAFE_NO_PAD.encode(br#"[["date","yesterday"],["sk","4"]]"#);
        assert!(Cursor::decode(&token, &plan).is_err());
    }

    #[test]
    fn last_indexes_round_trip() {
        let plan = plan(&[SortRequest::asc("date")]);
        let cursor = Cursor::from_row(&plan, &row(42, Some((2016, 1, 3)), "5"));
        let params = cursor.to_last_indexes(&plan);
        assert_eq!(params.get("last_index").map(String::as_str), Some("42"));
        assert_eq!(
            params.get("last_date").map(String::as_str),
            Some("2016-01-03")
        );

        let mut values = params.clone();
        let last_index = values.remove("last_index").unwrap();
        let values: BTreeMap<String, String> = values
            .into_iter()
            .map(|(k, v)| (k.trim_start_matches("last_").to_string(), v))
            .collect();
        let rebuilt = Cursor::from_last_indexes(&plan, &last_index, &values, false).unwrap();
        assert_eq!(rebuilt, cursor);
    }

    #[test]
    fn sort_null_only_marks_null_primary() {
        let plan = plan(&[SortRequest::asc("date")]);
        let cursor = Cursor::from_row(&plan, &row(7, None, "5"));
        let params = cursor.to_last_indexes(&plan);
        assert_eq!(
            params.get("sort_null_only").map(String::as_str),
            Some("true")
        );
        assert!(!params.contains_key("last_date"));

        let rebuilt = Cursor::from_last_indexes(&plan, "7", &BTreeMap::new(), true).unwrap();
        assert_eq!(rebuilt, cursor);
        assert!(Cursor::from_last_indexes(&plan, "7", &BTreeMap::new(), false).is_err());
    }

    #[test]
    fn last_indexes_reject_foreign_fields() {
        let plan = plan(&[SortRequest::asc("date")]);
        let values = BTreeMap::from([("amount".to_string(), "5".to_string())]);
        assert!(Cursor::from_last_indexes(&plan, "7", &values, true).is_err());
    }

    #[test]
    fn seek_chain_ascending_nullable() {
        let plan = plan(&[SortRequest::asc("date")]);
        let cursor = Cursor::from_row(&plan, &row(10, Some((2016, 1, 3)), "5"));
        let seek = seek_predicate(&plan, &cursor);

        let later = row(1, Some((2016, 2, 1)), "1");
        let tie_after = row(11, Some((2016, 1, 3)), "1");
        let tie_before = row(9, Some((2016, 1, 3)), "1");
        let null_date = row(2, None, "1");
        let earlier = row(99, Some((2015, 1, 1)), "1");

        assert!(seek.matches(&later));
        assert!(seek.matches(&tie_after));
        assert!(!seek.matches(&tie_before));
        assert!(seek.matches(&null_date));
        assert!(!seek.matches(&earlier));
    }

    #[test]
    fn seek_chain_from_null_boundary() {
        let asc = plan(&[SortRequest::asc("date")]);
        let cursor = Cursor::from_row(&asc, &row(10, None, "5"));
        let seek = seek_predicate(&asc, &cursor);
        assert!(seek.matches(&row(11, None, "1")));
        assert!(!seek.matches(&row(9, None, "1")));
        assert!(!seek.matches(&row(99, Some((2030, 1, 1)), "1")));

        let desc = plan(&[SortRequest::desc("date")]);
        let cursor = Cursor::from_row(&desc, &row(10, None, "5"));
        let seek = seek_predicate(&desc, &cursor);
        assert!(seek.matches(&row(1, Some((2000, 1, 1)), "1")));
        assert!(seek.matches(&row(9, None, "1")));
        assert!(!seek.matches(&row(11, None, "1")));
    }

    #[test]
    fn seek_sql_is_lexicographic() {
        use sea_query::{Alias, PostgresQueryBuilder, Query};

        let plan = plan(&[SortRequest::desc("amount")]);
        let cursor = Cursor::from_row(&plan, &row(10, None, "250.00"));
        let cond = seek_predicate(&plan, &cursor).to_condition("disb").unwrap();
        let sql = Query::select()
            .column(Alias::new("sk"))
            .from(Alias::new("disb"))
            .cond_where(cond)
            .to_string(PostgresQueryBuilder);
        assert!(sql.contains(r#""disb"."amount" < 250.00"#), "{sql}");
        assert!(sql.contains(r#""disb"."amount" = 250.00"#), "{sql}");
        assert!(sql.contains(r#""disb"."sk" < 10"#), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn page_size_bounds() {
        let paginator = SeekPaginator::new(20, 100);
        assert_eq!(paginator.page_size(None).unwrap(), 20);
        assert_eq!(paginator.page_size(Some(100)).unwrap(), 100);
        assert!(matches!(
            paginator.page_size(Some(101)),
            Err(QueryError::PageSize { requested: 101, max: 100 })
        ));
        assert!(paginator.page_size(Some(0)).is_err());
        assert_eq!(paginator.fetch_limit(20), 21);
    }

    #[test]
    fn split_probe_and_next_cursor() {
        let plan = plan(&[]);
        let paginator = SeekPaginator::new(3, 10);
        let rows: Vec<Row> = (1..=4).rev().map(|i| row(i, None, "1")).collect();

        let (page, has_more) = paginator.split_probe(rows, 3);
        assert_eq!(page.len(), 3);
        assert!(has_more);
        let next = paginator.next_cursor(&plan, &page, has_more).unwrap();
        assert_eq!(next.value("sk"), Some(&Value::Integer(2)));

        let (page, has_more) = paginator.split_probe(page, 3);
        assert!(!has_more);
        assert!(paginator.next_cursor(&plan, &page, has_more).is_none());
    }
}
