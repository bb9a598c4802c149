//! Normalized query requests.

use std::collections::BTreeMap;

use crate::catalog::{Catalog, ColumnKind};
use crate::error::QueryError;

use super::sort::SortRequest;
use super::value::Value;

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorInput {
    /// Opaque token from a previous page's `next`.
    Token(String),
    /// Flat `last_index` / `last_<field>` parameters from a previous page's
    /// `last_indexes`. `last_values` is keyed by sort field name.
    LastIndexes {
        last_index: String,
        last_values: BTreeMap<String, String>,
        sort_null_only: bool,
    },
}

/// One request against one dataset. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIntent {
    dataset: String,
    filters: BTreeMap<String, Vec<Value>>,
    sort: Vec<SortRequest>,
    sort_reverse: bool,
    cursor: Option<CursorInput>,
    per_page: Option<u32>,
}

impl QueryIntent {
    pub fn builder(dataset: &str) -> QueryIntentBuilder {
        QueryIntentBuilder {
            intent: QueryIntent {
                dataset: dataset.to_string(),
                filters: BTreeMap::new(),
                sort: Vec::new(),
                sort_reverse: false,
                cursor: None,
                per_page: None,
            },
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn filters(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.filters
    }

    pub fn sort(&self) -> &[SortRequest] {
        &self.sort
    }

    pub fn sort_reverse(&self) -> bool {
        self.sort_reverse
    }

    pub fn cursor(&self) -> Option<&CursorInput> {
        self.cursor.as_ref()
    }

    pub fn per_page(&self) -> Option<u32> {
        self.per_page
    }

    /// The same request continued from `cursor`.
    pub fn with_cursor(&self, cursor: CursorInput) -> Self {
        Self {
            cursor: Some(cursor),
            ..self.clone()
        }
    }

    /// Decode flat request parameters for `dataset`.
    ///
    /// Recognized keys: filter fields (repeatable for exact filters),
    /// `sort` (comma separated, `-` prefix for descending), `sort_reverse`,
    /// `per_page`, `cursor`, `last_index`, `last_<field>`, `sort_null_only`.
    /// Empty values are ignored, except for `last_*` keys, which are kept
    /// as given. Filter values are parsed as the kind of the column they
    /// filter.
    pub fn from_params(
        catalog: &Catalog,
        dataset: &str,
        params: &[(String, String)],
    ) -> Result<Self, QueryError> {
        let definition = catalog.dataset(dataset)?;
        let mut builder = Self::builder(dataset);
        let mut token = None;
        let mut last_index = None;
        let mut last_values = BTreeMap::new();
        let mut sort_null_only = false;

        for (key, raw) in params {
            // Cursor values are carried verbatim; an empty text sort value is
            // distinct from a null one.
            if key == "last_index" {
                last_index = Some(raw.clone());
                continue;
            }
            if let Some(field) = key.strip_prefix("last_") {
                last_values.insert(field.to_string(), raw.clone());
                continue;
            }
            if raw.trim().is_empty() {
                continue;
            }
            match key.as_str() {
                "sort" => {
                    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
                        builder = builder.sort(SortRequest::parse(part));
                    }
                }
                "sort_reverse" => builder = builder.sort_reverse(parse_flag(key, raw)?),
                "sort_null_only" => sort_null_only = parse_flag(key, raw)?,
                "per_page" => {
                    let n = raw.trim().parse().map_err(|_| invalid(key, raw, "a page size"))?;
                    builder = builder.per_page(n);
                }
                "cursor" => token = Some(raw.clone()),
                other => {
                    let spec = definition.lookup_filter(other)?;
                    let kind = definition
                        .column(spec.column())
                        .map_or(ColumnKind::Text, |c| c.kind);
                    let value = Value::parse(kind, raw)
                        .map_err(|e| invalid(other, raw, e.kind.describe()))?;
                    builder = builder.filter(other, value);
                }
            }
        }

        match (token, last_index) {
            (Some(_), Some(_)) => {
                return Err(QueryError::cursor(
                    "use either cursor or last_index, not both",
                ));
            }
            (Some(token), None) => builder = builder.cursor(CursorInput::Token(token)),
            (None, Some(last_index)) => {
                builder = builder.cursor(CursorInput::LastIndexes {
                    last_index,
                    last_values,
                    sort_null_only,
                });
            }
            (None, None) => {
                if !last_values.is_empty() || sort_null_only {
                    return Err(QueryError::cursor(
                        "last_index is required with last_* parameters",
                    ));
                }
            }
        }

        Ok(builder.build())
    }
}

fn parse_flag(field: &str, raw: &str) -> Result<bool, QueryError> {
    match Value::parse(ColumnKind::Boolean, raw) {
        Ok(Value::Boolean(b)) => Ok(b),
        _ => Err(invalid(field, raw, ColumnKind::Boolean.describe())),
    }
}

fn invalid(field: &str, raw: &str, expected: &str) -> QueryError {
    QueryError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        expected: expected.to_string(),
    }
}

/// Builder for [`QueryIntent`].
#[derive(Debug, Clone)]
pub struct QueryIntentBuilder {
    intent: QueryIntent,
}

impl QueryIntentBuilder {
    /// Bind one more value to a filter field.
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.intent
            .filters
            .entry(field.to_string())
            .or_default()
            .push(value.into());
        self
    }

    pub fn sort(mut self, request: SortRequest) -> Self {
        self.intent.sort.push(request);
        self
    }

    pub fn sort_reverse(mut self, reverse: bool) -> Self {
        self.intent.sort_reverse = reverse;
        self
    }

    pub fn cursor(mut self, cursor: CursorInput) -> Self {
        self.intent.cursor = Some(cursor);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.intent.per_page = Some(per_page);
        self
    }

    pub fn build(self) -> QueryIntent {
        self.intent
    }
}
