//! Dataset catalog.
//!
//! Declares, per queryable dataset, its columns, which request fields filter
//! on which columns, which fields may be sorted on, and the reference
//! lookups attached to each page. Datasets are registered on a
//! [`CatalogBuilder`] at startup and frozen into an immutable [`Catalog`]
//! that is shared behind `Arc` for the rest of the process.

pub mod datasets;
pub mod decoders;
pub mod reports;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ConfigurationError, QueryError};
use crate::query::predicate::Predicate;
use crate::query::row::Row;
use crate::query::value::Value;

pub use crate::query::value::ColumnKind;
pub use reports::Reportable;

/// Request parameter names owned by the pipeline itself.
pub const RESERVED_PARAMS: &[&str] = &[
    "sort",
    "sort_reverse",
    "sort_null_only",
    "per_page",
    "cursor",
    "last_index",
];

/// A physical column of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// How one request field maps to a storage predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Set membership: `column IN (values)`.
    ExactMulti { field: String, column: String },
    /// Prefix full-text match over a text-search column.
    Fulltext { field: String, column: String },
    /// Inclusive bounds from a `min_*`/`max_*` field pair.
    Range {
        min_field: String,
        max_field: String,
        column: String,
    },
}

impl FilterSpec {
    /// Exact filter whose field name equals the column name.
    pub fn exact(column: &str) -> Self {
        Self::exact_as(column, column)
    }

    pub fn exact_as(field: &str, column: &str) -> Self {
        FilterSpec::ExactMulti {
            field: field.to_string(),
            column: column.to_string(),
        }
    }

    pub fn fulltext(field: &str, column: &str) -> Self {
        FilterSpec::Fulltext {
            field: field.to_string(),
            column: column.to_string(),
        }
    }

    /// Range filter over `column` exposed as `min_<name>` / `max_<name>`.
    pub fn range(name: &str, column: &str) -> Self {
        FilterSpec::Range {
            min_field: format!("min_{name}"),
            max_field: format!("max_{name}"),
            column: column.to_string(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            FilterSpec::ExactMulti { column, .. }
            | FilterSpec::Fulltext { column, .. }
            | FilterSpec::Range { column, .. } => column,
        }
    }

    /// Request field names this spec answers to.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            FilterSpec::ExactMulti { field, .. } | FilterSpec::Fulltext { field, .. } => {
                vec![field]
            }
            FilterSpec::Range {
                min_field,
                max_field,
                ..
            } => vec![min_field, max_field],
        }
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ascending"),
            SortDirection::Desc => f.write_str("descending"),
        }
    }
}

/// Directions a sortable field supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionCapability {
    Ascending,
    Descending,
    Both,
}

impl DirectionCapability {
    pub fn permits(self, direction: SortDirection) -> bool {
        matches!(
            (self, direction),
            (DirectionCapability::Both, _)
                | (DirectionCapability::Ascending, SortDirection::Asc)
                | (DirectionCapability::Descending, SortDirection::Desc)
        )
    }
}

/// One allow-listed sort field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub field: String,
    pub column: String,
    pub capability: DirectionCapability,
}

impl SortSpec {
    /// Sortable in both directions, field named after its column.
    pub fn both(column: &str) -> Self {
        Self {
            field: column.to_string(),
            column: column.to_string(),
            capability: DirectionCapability::Both,
        }
    }

    pub fn only(column: &str, capability: DirectionCapability) -> Self {
        Self {
            capability,
            ..Self::both(column)
        }
    }
}

// ---------------------------------------------------------------------------
// Eager loads, counts, decoded columns
// ---------------------------------------------------------------------------

/// A small reference lookup attached to every page: for the distinct values
/// of `local_column` on the page, fetch the matching `target_table` records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EagerLoad {
    /// Relation name the record appears under in each row.
    pub name: String,
    pub local_column: String,
    pub target_table: String,
    pub target_column: String,
    pub columns: Vec<ColumnDef>,
}

impl EagerLoad {
    pub fn new(name: &str, local_column: &str, target_table: &str, target_column: &str) -> Self {
        Self {
            name: name.to_string(),
            local_column: local_column.to_string(),
            target_table: target_table.to_string(),
            target_column: target_column.to_string(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, name: &str, kind: ColumnKind) -> Self {
        self.columns.push(ColumnDef::new(name, kind));
        self
    }
}

/// How the `count` reported with a page is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CountStrategy {
    /// Number of rows on the page. Issues no extra query.
    Returned,
    /// `SELECT count(*)` over the filtered set.
    Exact,
    /// Planner estimate; falls back to an exact count below `exact_below`.
    Estimated { exact_below: u64 },
}

/// A label column computed from a code column through a fixed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedColumn {
    pub name: String,
    pub source: String,
    pub labels: &'static [(&'static str, &'static str)],
}

impl DecodedColumn {
    pub fn new(
        name: &str,
        source: &str,
        labels: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            labels,
        }
    }

    pub fn decode(&self, row: &mut Row) {
        let label = row.get(&self.source).as_text().and_then(|code| {
            self.labels
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, label)| *label)
        });
        row.insert(self.name.clone(), Value::from(label));
    }
}

// ---------------------------------------------------------------------------
// Dataset definitions
// ---------------------------------------------------------------------------

/// Mutable dataset declaration, validated by [`CatalogBuilder::register`].
#[derive(Clone)]
pub struct DatasetDef {
    name: String,
    table: String,
    index_column: Option<String>,
    columns: Vec<ColumnDef>,
    filters: Vec<FilterSpec>,
    sorts: Vec<SortSpec>,
    default_sort: Vec<(String, SortDirection)>,
    multi_sort: bool,
    eager_loads: Vec<EagerLoad>,
    count: CountStrategy,
    reportable: Option<Arc<dyn Reportable>>,
    decoded: Vec<DecodedColumn>,
    base_filter: Option<Predicate>,
}

impl DatasetDef {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            index_column: None,
            columns: Vec::new(),
            filters: Vec::new(),
            sorts: Vec::new(),
            default_sort: Vec::new(),
            multi_sort: false,
            eager_loads: Vec::new(),
            count: CountStrategy::Returned,
            reportable: None,
            decoded: Vec::new(),
            base_filter: None,
        }
    }

    /// Unique integer surrogate key used as the final tie-breaker.
    pub fn index(mut self, column: &str) -> Self {
        self.index_column = Some(column.to_string());
        self
    }

    pub fn column(mut self, name: &str, kind: ColumnKind) -> Self {
        self.columns.push(ColumnDef::new(name, kind));
        self
    }

    pub fn required_column(mut self, name: &str, kind: ColumnKind) -> Self {
        self.columns.push(ColumnDef::new(name, kind).not_null());
        self
    }

    pub fn columns(mut self, kind: ColumnKind, names: &[&str]) -> Self {
        self.columns
            .extend(names.iter().map(|n| ColumnDef::new(*n, kind)));
        self
    }

    pub fn filter(mut self, spec: FilterSpec) -> Self {
        self.filters.push(spec);
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sorts.push(spec);
        self
    }

    /// Ordering applied when a request names none. The index column may
    /// be used here without being allow-listed.
    pub fn default_sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.default_sort.push((field.to_string(), direction));
        self
    }

    pub fn multi_sort(mut self, allowed: bool) -> Self {
        self.multi_sort = allowed;
        self
    }

    pub fn eager_load(mut self, load: EagerLoad) -> Self {
        self.eager_loads.push(load);
        self
    }

    pub fn count(mut self, strategy: CountStrategy) -> Self {
        self.count = strategy;
        self
    }

    pub fn reportable(mut self, reportable: impl Reportable + 'static) -> Self {
        self.reportable = Some(Arc::new(reportable));
        self
    }

    pub fn decoded(mut self, column: DecodedColumn) -> Self {
        self.decoded.push(column);
        self
    }

    /// Predicate applied to every query on this dataset.
    pub fn base_filter(mut self, predicate: Predicate) -> Self {
        self.base_filter = Some(predicate);
        self
    }
}

/// A validated, frozen dataset.
#[derive(Debug)]
pub struct Dataset {
    name: String,
    table: String,
    index_column: String,
    columns: Vec<ColumnDef>,
    column_index: HashMap<String, usize>,
    filters: Vec<FilterSpec>,
    filter_index: HashMap<String, usize>,
    sorts: Vec<SortSpec>,
    default_sort: Vec<(String, SortDirection)>,
    multi_sort: bool,
    eager_loads: Vec<EagerLoad>,
    count: CountStrategy,
    reportable: Option<Arc<dyn Reportable>>,
    decoded: Vec<DecodedColumn>,
    base_filter: Option<Predicate>,
}

impl fmt::Debug for DatasetDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl Dataset {
    fn from_def(def: DatasetDef) -> Result<Self, ConfigurationError> {
        let dataset = def.name.clone();
        let unknown = |column: &str, context: String| ConfigurationError::UnknownColumn {
            dataset: dataset.clone(),
            column: column.to_string(),
            context,
        };

        let mut column_index = HashMap::new();
        for (i, column) in def.columns.iter().enumerate() {
            if column_index.insert(column.name.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateColumn {
                    dataset: dataset.clone(),
                    column: column.name.clone(),
                });
            }
        }
        let kind_of = |column: &str| column_index.get(column).map(|&i| def.columns[i].kind);

        let index_column = def.index_column.clone().unwrap_or_default();
        if kind_of(&index_column) != Some(ColumnKind::Integer) {
            return Err(ConfigurationError::InvalidIndexColumn {
                dataset: dataset.clone(),
                column: index_column,
            });
        }
        let mut columns = def.columns.clone();
        if let Some(&i) = column_index.get(&index_column) {
            columns[i].nullable = false;
        }

        let mut filter_index = HashMap::new();
        for (i, spec) in def.filters.iter().enumerate() {
            let column = spec.column();
            let Some(kind) = kind_of(column) else {
                return Err(unknown(column, format!("filter '{}'", spec.fields()[0])));
            };
            let fits = match spec {
                FilterSpec::Fulltext { .. } => kind == ColumnKind::TextSearch,
                FilterSpec::ExactMulti { .. } => kind != ColumnKind::TextSearch,
                FilterSpec::Range { .. } => {
                    !matches!(kind, ColumnKind::TextSearch | ColumnKind::Boolean)
                }
            };
            if !fits {
                let expected = match spec {
                    FilterSpec::Fulltext { .. } => "text-search",
                    FilterSpec::ExactMulti { .. } => "comparable",
                    FilterSpec::Range { .. } => "ordered",
                };
                return Err(ConfigurationError::ColumnKindMismatch {
                    dataset: dataset.clone(),
                    field: spec.fields()[0].to_string(),
                    column: column.to_string(),
                    expected: expected.to_string(),
                });
            }
            for field in spec.fields() {
                let reserved = RESERVED_PARAMS.contains(&field) || field.starts_with("last_");
                if reserved || filter_index.insert(field.to_string(), i).is_some() {
                    return Err(ConfigurationError::DuplicateField {
                        dataset: dataset.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }

        let mut sort_fields = HashSet::new();
        for spec in &def.sorts {
            match kind_of(&spec.column) {
                None => return Err(unknown(&spec.column, format!("sort '{}'", spec.field))),
                Some(ColumnKind::TextSearch) => {
                    return Err(ConfigurationError::ColumnKindMismatch {
                        dataset: dataset.clone(),
                        field: spec.field.clone(),
                        column: spec.column.clone(),
                        expected: "ordered".to_string(),
                    });
                }
                Some(_) => {}
            }
            if !sort_fields.insert(spec.field.clone()) {
                return Err(ConfigurationError::DuplicateField {
                    dataset: dataset.clone(),
                    field: spec.field.clone(),
                });
            }
        }

        let mut default_sort = def.default_sort.clone();
        if default_sort.is_empty() {
            default_sort.push((index_column.clone(), SortDirection::Desc));
        }
        for (field, direction) in &default_sort {
            let allowed = *field == index_column
                || def
                    .sorts
                    .iter()
                    .any(|s| s.field == *field && s.capability.permits(*direction));
            if !allowed {
                return Err(ConfigurationError::InvalidDefaultSort {
                    dataset: dataset.clone(),
                    field: field.clone(),
                });
            }
        }

        let mut relations = HashSet::new();
        for load in &def.eager_loads {
            if kind_of(&load.local_column).is_none() {
                return Err(unknown(
                    &load.local_column,
                    format!("eager load '{}'", load.name),
                ));
            }
            if !load.columns.iter().any(|c| c.name == load.target_column) {
                return Err(unknown(
                    &load.target_column,
                    format!("eager load '{}' on {}", load.name, load.target_table),
                ));
            }
            if column_index.contains_key(&load.name) || !relations.insert(load.name.as_str()) {
                return Err(ConfigurationError::DuplicateField {
                    dataset: dataset.clone(),
                    field: load.name.clone(),
                });
            }
        }

        if let Some(relation) = def.reportable.as_ref().and_then(|r| r.relation()) {
            if !def.eager_loads.iter().any(|l| l.name == relation) {
                return Err(unknown(relation, "report eligibility relation".to_string()));
            }
        }

        for decoded in &def.decoded {
            if kind_of(&decoded.source).is_none() {
                return Err(unknown(
                    &decoded.source,
                    format!("decoded column '{}'", decoded.name),
                ));
            }
            if column_index.contains_key(&decoded.name)
                || relations.contains(decoded.name.as_str())
            {
                return Err(ConfigurationError::DuplicateField {
                    dataset: dataset.clone(),
                    field: decoded.name.clone(),
                });
            }
        }

        if let Some(predicate) = &def.base_filter {
            for column in predicate.columns() {
                if kind_of(column).is_none() {
                    return Err(unknown(column, "base filter".to_string()));
                }
            }
        }

        Ok(Self {
            name: def.name,
            table: def.table,
            index_column,
            columns,
            column_index,
            filters: def.filters,
            filter_index,
            sorts: def.sorts,
            default_sort,
            multi_sort: def.multi_sort,
            eager_loads: def.eager_loads,
            count: def.count,
            reportable: def.reportable,
            decoded: def.decoded,
            base_filter: def.base_filter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn index_column(&self) -> &str {
        &self.index_column
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.column_index.get(name).map(|&i| &self.columns[i])
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    /// The filter spec answering to request field `field`.
    pub fn lookup_filter(&self, field: &str) -> Result<&FilterSpec, QueryError> {
        self.filter_index
            .get(field)
            .map(|&i| &self.filters[i])
            .ok_or_else(|| QueryError::UnknownField {
                dataset: self.name.clone(),
                field: field.to_string(),
            })
    }

    pub fn sorts(&self) -> &[SortSpec] {
        &self.sorts
    }

    pub fn sort_spec(&self, field: &str) -> Option<&SortSpec> {
        self.sorts.iter().find(|s| s.field == field)
    }

    pub fn default_sort(&self) -> &[(String, SortDirection)] {
        &self.default_sort
    }

    pub fn multi_sort(&self) -> bool {
        self.multi_sort
    }

    pub fn eager_loads(&self) -> &[EagerLoad] {
        &self.eager_loads
    }

    pub fn count_strategy(&self) -> CountStrategy {
        self.count
    }

    pub fn reportable(&self) -> Option<&dyn Reportable> {
        self.reportable.as_deref()
    }

    pub fn decoded_columns(&self) -> &[DecodedColumn] {
        &self.decoded
    }

    pub fn base_filter(&self) -> Option<&Predicate> {
        self.base_filter.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Collects dataset registrations before serving begins.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    datasets: BTreeMap<String, Dataset>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a dataset.
    pub fn register(mut self, def: DatasetDef) -> Result<Self, ConfigurationError> {
        if self.datasets.contains_key(&def.name) {
            return Err(ConfigurationError::DuplicateDataset { dataset: def.name });
        }
        let dataset = Dataset::from_def(def)?;
        tracing::debug!(
            dataset = %dataset.name,
            filters = dataset.filters.len(),
            sorts = dataset.sorts.len(),
            "registered dataset"
        );
        self.datasets.insert(dataset.name.clone(), dataset);
        Ok(self)
    }

    pub fn build(self) -> Catalog {
        Catalog {
            datasets: self.datasets,
        }
    }
}

/// Immutable registry of every queryable dataset.
#[derive(Debug)]
pub struct Catalog {
    datasets: BTreeMap<String, Dataset>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    pub fn dataset(&self, name: &str) -> Result<&Dataset, QueryError> {
        self.datasets
            .get(name)
            .ok_or_else(|| QueryError::UnknownDataset {
                dataset: name.to_string(),
            })
    }

    pub fn lookup(&self, dataset: &str, field: &str) -> Result<&FilterSpec, QueryError> {
        self.dataset(dataset)?.lookup_filter(field)
    }

    /// Datasets in name order.
    pub fn datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.values()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn transactions() -> DatasetDef {
        DatasetDef::new("transactions", "txn")
            .index("txn_sk")
            .column("txn_sk", ColumnKind::Integer)
            .column("payee", ColumnKind::Text)
            .column("payee_text", ColumnKind::TextSearch)
            .column("amount", ColumnKind::Decimal)
            .filter(FilterSpec::exact("payee"))
            .filter(FilterSpec::fulltext("payee_name", "payee_text"))
            .filter(FilterSpec::range("amount", "amount"))
            .sort(SortSpec::both("amount"))
    }

    #[test]
    fn register_and_lookup() {
        let catalog = Catalog::builder()
            .register(transactions())
            .unwrap()
            .build();

        let spec = catalog.lookup("transactions", "max_amount").unwrap();
        assert!(matches!(spec, FilterSpec::Range { column, .. } if column == "amount"));

        let dataset = catalog.dataset("transactions").unwrap();
        assert_eq!(dataset.index_column(), "txn_sk");
        assert!(!dataset.column("txn_sk").unwrap().nullable);
        assert_eq!(
            dataset.default_sort(),
            &[("txn_sk".to_string(), SortDirection::Desc)]
        );
    }

    #[test]
    fn unknown_field_and_dataset() {
        let catalog = Catalog::builder()
            .register(transactions())
            .unwrap()
            .build();
        assert!(matches!(
            catalog.lookup("transactions", "bogus"),
            Err(QueryError::UnknownField { .. })
        ));
        assert!(matches!(
            catalog.lookup("nope", "payee"),
            Err(QueryError::UnknownDataset { .. })
        ));
    }

    #[test]
    fn rejects_field_collision() {
        let def = transactions().filter(FilterSpec::exact_as("payee", "amount"));
        let err = Catalog::builder().register(def).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateField { field, .. } if field == "payee"));
    }

    #[test]
    fn rejects_range_field_colliding_with_exact() {
        let def = transactions().filter(FilterSpec::exact_as("min_amount", "payee"));
        assert!(matches!(
            Catalog::builder().register(def),
            Err(ConfigurationError::DuplicateField { .. })
        ));
    }

    #[test]
    fn rejects_reserved_field_names() {
        let def = transactions().filter(FilterSpec::exact_as("per_page", "payee"));
        assert!(Catalog::builder().register(def).is_err());
        let def = transactions().filter(FilterSpec::exact_as("last_payee", "payee"));
        assert!(Catalog::builder().register(def).is_err());
    }

    #[test]
    fn rejects_derived_names_shadowing_columns() {
        let def = transactions().eager_load(
            EagerLoad::new("payee", "payee", "payees", "id").column("id", ColumnKind::Text),
        );
        assert!(matches!(
            Catalog::builder().register(def),
            Err(ConfigurationError::DuplicateField { field, .. }) if field == "payee"
        ));

        const LABELS: &[(&str, &str)] = &[("X", "Ten")];
        let def = transactions().decoded(DecodedColumn::new("amount", "payee", LABELS));
        assert!(matches!(
            Catalog::builder().register(def),
            Err(ConfigurationError::DuplicateField { field, .. }) if field == "amount"
        ));

        let def = transactions()
            .eager_load(
                EagerLoad::new("payee_record", "payee", "payees", "id")
                    .column("id", ColumnKind::Text),
            )
            .decoded(DecodedColumn::new("payee_record", "payee", LABELS));
        assert!(Catalog::builder().register(def).is_err());
    }

    #[test]
    fn rejects_unknown_column() {
        let def = transactions().filter(FilterSpec::exact("recipient_zip"));
        let err = Catalog::builder().register(def).unwrap_err();
        assert!(
            matches!(err, ConfigurationError::UnknownColumn { column, .. } if column == "recipient_zip")
        );
    }

    #[test]
    fn rejects_fulltext_on_plain_text() {
        let def = transactions().filter(FilterSpec::fulltext("payee_raw", "payee"));
        assert!(matches!(
            Catalog::builder().register(def),
            Err(ConfigurationError::ColumnKindMismatch { .. })
        ));
    }

    #[test]
    fn rejects_bad_index_column() {
        let def = DatasetDef::new("t", "t")
            .index("name")
            .column("name", ColumnKind::Text);
        assert!(matches!(
            Catalog::builder().register(def),
            Err(ConfigurationError::InvalidIndexColumn { .. })
        ));

        let def = DatasetDef::new("t", "t").column("id", ColumnKind::Integer);
        assert!(matches!(
            Catalog::builder().register(def),
            Err(ConfigurationError::InvalidIndexColumn { .. })
        ));
    }

    #[test]
    fn rejects_default_sort_outside_allow_list() {
        let def = transactions().default_sort("payee", SortDirection::Asc);
        assert!(matches!(
            Catalog::builder().register(def),
            Err(ConfigurationError::InvalidDefaultSort { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_dataset() {
        let err = Catalog::builder()
            .register(transactions())
            .unwrap()
            .register(transactions())
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateDataset {
                dataset: "transactions".into()
            }
        );
    }

    #[test]
    fn direction_capability() {
        assert!(DirectionCapability::Both.permits(SortDirection::Asc));
        assert!(DirectionCapability::Descending.permits(SortDirection::Desc));
        assert!(!DirectionCapability::Descending.permits(SortDirection::Asc));
    }

    #[test]
    fn decoded_column_labels_known_codes() {
        const LABELS: &[(&str, &str)] = &[("G", "General")];
        let decoded = DecodedColumn::new("type_full", "type", LABELS);
        let mut row = Row::new().with("type", "G");
        decoded.decode(&mut row);
        assert_eq!(row.get("type_full").as_text(), Some("General"));

        let mut row = Row::new().with("type", "ZZ");
        decoded.decode(&mut row);
        assert!(row.get("type_full").is_null());
    }
}
