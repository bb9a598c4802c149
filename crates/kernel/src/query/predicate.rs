//! Predicate builder.
//!
//! Translates bound filter values into a conjunction of predicates over
//! dataset columns. A [`Predicate`] renders to a sea-query condition for
//! PostgreSQL and can also be evaluated directly against a [`Row`] for the
//! in-memory backend.

use std::collections::BTreeMap;

use sea_query::{Alias, Cond, Condition, Expr, SimpleExpr};

use crate::catalog::{Dataset, FilterSpec};
use crate::error::QueryError;

use super::plan::sql_value;
use super::row::Row;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Gte => ordering != Less,
            CompareOp::Lt => ordering == Less,
            CompareOp::Lte => ordering != Greater,
        }
    }
}

/// A boolean condition over the columns of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column IN (values)`.
    In { column: String, values: Vec<Value> },
    /// Every term is a prefix of some word in the text-search column.
    TextMatch { column: String, terms: Vec<String> },
    /// Comparison against a non-null value. Null column values never match.
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    IsNull { column: String },
    IsNotNull { column: String },
    /// Conjunction; empty is always true.
    All(Vec<Predicate>),
    /// Disjunction; empty is always false.
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(column: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn is_null(column: &str) -> Self {
        Predicate::IsNull {
            column: column.to_string(),
        }
    }

    pub fn is_not_null(column: &str) -> Self {
        Predicate::IsNotNull {
            column: column.to_string(),
        }
    }

    /// Columns referenced anywhere in the predicate.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::In { column, .. }
            | Predicate::TextMatch { column, .. }
            | Predicate::Compare { column, .. }
            | Predicate::IsNull { column }
            | Predicate::IsNotNull { column } => out.push(column),
            Predicate::All(parts) | Predicate::Any(parts) => {
                for part in parts {
                    part.collect_columns(out);
                }
            }
        }
    }

    /// Render as a sea-query condition over `table`. `None` when trivially
    /// true.
    pub fn to_condition(&self, table: &str) -> Option<Condition> {
        let col = |column: &str| Expr::col((Alias::new(table), Alias::new(column)));

        let leaf: SimpleExpr = match self {
            Predicate::All(parts) => {
                let conds: Vec<Condition> =
                    parts.iter().filter_map(|p| p.to_condition(table)).collect();
                if conds.is_empty() {
                    return None;
                }
                return Some(conds.into_iter().fold(Cond::all(), |all, c| all.add(c)));
            }
            Predicate::Any(parts) => {
                if parts.is_empty() {
                    Expr::cust("FALSE")
                } else {
                    let mut any = Cond::any();
                    for part in parts {
                        // A trivially true branch makes the disjunction true.
                        match part.to_condition(table) {
                            Some(cond) => any = any.add(cond),
                            None => return None,
                        }
                    }
                    return Some(any);
                }
            }
            Predicate::In { column, values } => {
                if values.is_empty() {
                    Expr::cust("FALSE")
                } else {
                    col(column).is_in(values.iter().map(sql_value))
                }
            }
            Predicate::TextMatch { column, terms } => Expr::cust_with_values(
                format!("{table}.{column} @@ to_tsquery('english', $1)"),
                [to_tsquery(terms)],
            ),
            Predicate::Compare { column, op, value } => {
                let value = sql_value(value);
                match op {
                    CompareOp::Eq => col(column).eq(value),
                    CompareOp::Gt => col(column).gt(value),
                    CompareOp::Gte => col(column).gte(value),
                    CompareOp::Lt => col(column).lt(value),
                    CompareOp::Lte => col(column).lte(value),
                }
            }
            Predicate::IsNull { column } => col(column).is_null(),
            Predicate::IsNotNull { column } => col(column).is_not_null(),
        };

        Some(Cond::all().add(leaf))
    }

    /// Evaluate against a row with SQL semantics for null.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Predicate::In { column, values } => {
                let actual = row.get(column);
                !actual.is_null() && values.iter().any(|v| actual.sort_cmp(v).is_eq())
            }
            Predicate::TextMatch { column, terms } => {
                let Some(text) = row.get(column).as_text() else {
                    return false;
                };
                let words = fulltext_terms(text);
                terms
                    .iter()
                    .all(|term| words.iter().any(|w| w.starts_with(term.as_str())))
            }
            Predicate::Compare { column, op, value } => {
                let actual = row.get(column);
                !actual.is_null() && !value.is_null() && op.holds(actual.sort_cmp(value))
            }
            Predicate::IsNull { column } => row.get(column).is_null(),
            Predicate::IsNotNull { column } => !row.get(column).is_null(),
            Predicate::All(parts) => parts.iter().all(|p| p.matches(row)),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(row)),
        }
    }
}

/// Split free text into lowercase search terms on non-word characters.
pub fn fulltext_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// `term1:* & term2:*`
pub fn to_tsquery(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| format!("{t}:*"))
        .collect::<Vec<_>>()
        .join(" & ")
}

/// Build the conjunction of every filter bound in `filters`, preceded by the
/// dataset's base filter. Pure: validates fully before anything is queried.
pub fn build_filter_predicate(
    dataset: &Dataset,
    filters: &BTreeMap<String, Vec<Value>>,
) -> Result<Predicate, QueryError> {
    for field in filters.keys() {
        dataset.lookup_filter(field)?;
    }

    let mut parts = Vec::new();
    if let Some(base) = dataset.base_filter() {
        parts.push(base.clone());
    }

    for spec in dataset.filters() {
        match spec {
            FilterSpec::ExactMulti { field, column } => {
                let values: Vec<Value> = filters
                    .get(field)
                    .into_iter()
                    .flatten()
                    .filter(|v| !v.is_null())
                    .cloned()
                    .collect();
                if !values.is_empty() {
                    parts.push(Predicate::In {
                        column: column.clone(),
                        values,
                    });
                }
            }
            FilterSpec::Fulltext { field, column } => {
                let mut terms = Vec::new();
                for text in filters.get(field).into_iter().flatten().filter_map(Value::as_text) {
                    let words = fulltext_terms(text);
                    if words.is_empty() && !text.trim().is_empty() {
                        return Err(QueryError::InvalidValue {
                            field: field.clone(),
                            value: text.to_string(),
                            expected: "search text with at least one word".to_string(),
                        });
                    }
                    terms.extend(words);
                }
                if !terms.is_empty() {
                    parts.push(Predicate::TextMatch {
                        column: column.clone(),
                        terms,
                    });
                }
            }
            FilterSpec::Range {
                min_field,
                max_field,
                column,
            } => {
                let min = single_bound(filters, min_field)?;
                let max = single_bound(filters, max_field)?;
                if let (Some(min), Some(max)) = (min, max) {
                    if min.sort_cmp(max).is_gt() {
                        return Err(QueryError::InvalidRange {
                            min_field: min_field.clone(),
                            max_field: max_field.clone(),
                            min: min.to_string(),
                            max: max.to_string(),
                        });
                    }
                }
                if let Some(min) = min {
                    parts.push(Predicate::compare(column, CompareOp::Gte, min.clone()));
                }
                if let Some(max) = max {
                    parts.push(Predicate::compare(column, CompareOp::Lte, max.clone()));
                }
            }
        }
    }

    Ok(Predicate::All(parts))
}

fn single_bound<'a>(
    filters: &'a BTreeMap<String, Vec<Value>>,
    field: &str,
) -> Result<Option<&'a Value>, QueryError> {
    let values: Vec<&Value> = filters
        .get(field)
        .into_iter()
        .flatten()
        .filter(|v| !v.is_null())
        .collect();
    match values.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(*one)),
        _ => Err(QueryError::InvalidValue {
            field: field.to_string(),
            value: values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            expected: "a single bound".to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ColumnKind, DatasetDef};
    use rust_decimal::Decimal;
    use sea_query::{PostgresQueryBuilder, Query};

    fn catalog() -> Catalog {
        Catalog::builder()
            .register(
                DatasetDef::new("disbursements", "disb")
                    .index("disb_sk")
                    .column("disb_sk", ColumnKind::Integer)
                    .column("committee_id", ColumnKind::Text)
                    .column("payee_text", ColumnKind::TextSearch)
                    .column("amount", ColumnKind::Decimal)
                    .column("report_year", ColumnKind::Integer)
                    .filter(FilterSpec::exact("committee_id"))
                    .filter(FilterSpec::fulltext("payee", "payee_text"))
                    .filter(FilterSpec::range("amount", "amount"))
                    .base_filter(Predicate::compare(
                        "report_year",
                        CompareOp::Gte,
                        2011_i64,
                    )),
            )
            .unwrap()
            .build()
    }

    fn bind(pairs: &[(&str, Vec<Value>)]) -> BTreeMap<String, Vec<Value>> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn render(predicate: &Predicate) -> String {
        let mut query = Query::select();
        query.column(Alias::new("disb_sk")).from(Alias::new("disb"));
        if let Some(cond) = predicate.to_condition("disb") {
            query.cond_where(cond);
        }
        query.to_string(PostgresQueryBuilder)
    }

    fn dec(s: &str) -> Value {
        Value::Decimal(s.parse::<Decimal>().unwrap())
    }

    #[test]
    fn exact_multi_renders_in() {
        let catalog = catalog();
        let dataset = catalog.dataset("disbursements").unwrap();
        let predicate = build_filter_predicate(
            dataset,
            &bind(&[("committee_id", vec!["C001".into(), "C002".into()])]),
        )
        .unwrap();
        let sql = render(&predicate);
        assert!(
            sql.contains(r#""disb"."committee_id" IN ('C001', 'C002')"#),
            "{sql}"
        );
        assert!(sql.contains(r#""disb"."report_year" >= 2011"#), "{sql}");
    }

    #[test]
    fn empty_exact_filter_contributes_nothing() {
        let catalog = catalog();
        let dataset = catalog.dataset("disbursements").unwrap();
        let predicate =
            build_filter_predicate(dataset, &bind(&[("committee_id", vec![])])).unwrap();
        assert_eq!(predicate.columns(), vec!["report_year"]);
    }

    #[test]
    fn fulltext_uses_prefix_terms() {
        let catalog = catalog();
        let dataset = catalog.dataset("disbursements").unwrap();
        let predicate =
            build_filter_predicate(dataset, &bind(&[("payee", vec!["Acme, Consulting!".into()])]))
                .unwrap();
        let sql = render(&predicate);
        assert!(sql.contains("disb.payee_text @@ to_tsquery('english',"), "{sql}");
        assert!(sql.contains("acme:* & consulting:*"), "{sql}");
        assert!(!sql.contains('!'), "{sql}");
    }

    #[test]
    fn blank_fulltext_is_skipped() {
        let catalog = catalog();
        let dataset = catalog.dataset("disbursements").unwrap();
        let predicate =
            build_filter_predicate(dataset, &bind(&[("payee", vec!["   ".into()])])).unwrap();
        assert!(!render(&predicate).contains("to_tsquery"));
    }

    #[test]
    fn fulltext_without_words_is_rejected() {
        let catalog = catalog();
        let dataset = catalog.dataset("disbursements").unwrap();
        let err = build_filter_predicate(dataset, &bind(&[("payee", vec!["%%%".into()])]))
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidValue { ref field, ref value, .. } if field == "payee" && value == "%%%"
        ));
    }

    #[test]
    fn range_bounds() {
        let catalog = catalog();
        let dataset = catalog.dataset("disbursements").unwrap();
        let predicate = build_filter_predicate(
            dataset,
            &bind(&[("min_amount", vec![dec("50")]), ("max_amount", vec![dec("100.25")])]),
        )
        .unwrap();
        let sql = render(&predicate);
        assert!(sql.contains(r#""disb"."amount" >= 50"#), "{sql}");
        assert!(sql.contains(r#""disb"."amount" <= 100.25"#), "{sql}");
    }

    #[test]
    fn inverted_range_is_rejected() {
        let catalog = catalog();
        let dataset = catalog.dataset("disbursements").unwrap();
        let err = build_filter_predicate(
            dataset,
            &bind(&[("min_amount", vec![dec("100")]), ("max_amount", vec![dec("50")])]),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidRange { .. }));
    }

    #[test]
    fn repeated_range_bound_is_rejected() {
        let catalog = catalog();
        let dataset = catalog.dataset("disbursements").unwrap();
        let err =
            build_filter_predicate(dataset, &bind(&[("min_amount", vec![dec("1"), dec("2")])]))
                .unwrap_err();
        assert!(matches!(err, QueryError::InvalidValue { field, .. } if field == "min_amount"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let catalog = catalog();
        let dataset = catalog.dataset("disbursements").unwrap();
        let err =
            build_filter_predicate(dataset, &bind(&[("recipient_zip", vec!["1".into()])]))
                .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField { .. }));
    }

    #[test]
    fn empty_any_renders_false() {
        let sql = render(&Predicate::Any(vec![]));
        assert!(sql.contains("FALSE"), "{sql}");
    }

    #[test]
    fn matches_rows_with_null_semantics() {
        let row = Row::new()
            .with("committee_id", "C001")
            .with("amount", dec("75"))
            .with("payee_text", "ACME Consulting Group");

        assert!(Predicate::In {
            column: "committee_id".into(),
            values: vec!["C001".into()],
        }
        .matches(&row));
        assert!(Predicate::compare("amount", CompareOp::Gte, dec("50")).matches(&row));
        assert!(!Predicate::compare("missing", CompareOp::Lt, dec("50")).matches(&row));
        assert!(Predicate::is_null("missing").matches(&row));
        assert!(Predicate::TextMatch {
            column: "payee_text".into(),
            terms: vec!["cons".into(), "acme".into()],
        }
        .matches(&row));
        assert!(!Predicate::TextMatch {
            column: "payee_text".into(),
            terms: vec!["sulting".into()],
        }
        .matches(&row));
        assert!(!Predicate::Any(vec![]).matches(&row));
        assert!(Predicate::All(vec![]).matches(&row));
    }

    #[test]
    fn tsquery_format() {
        assert_eq!(
            to_tsquery(&fulltext_terms("O'Brien for Congress")),
            "o:* & brien:* & for:* & congress:*"
        );
    }
}
