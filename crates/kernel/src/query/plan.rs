//! Executable query plans and their SQL rendering.

use std::collections::HashSet;

use sea_query::{
    Alias, Asterisk, Expr, NullOrdering, Order, PostgresQueryBuilder, Query, SelectStatement,
};

use crate::catalog::{ColumnDef, CountStrategy, Dataset, EagerLoad, SortDirection};

use super::predicate::Predicate;
use super::row::Row;
use super::sort::SortPlan;
use super::value::Value;

/// Convert a pipeline value into a sea-query value.
pub fn sql_value(value: &Value) -> sea_query::Value {
    match value {
        Value::Null => sea_query::Value::String(None),
        Value::Boolean(b) => (*b).into(),
        Value::Integer(i) => (*i).into(),
        Value::Decimal(d) => (*d).into(),
        Value::Text(s) => s.clone().into(),
        Value::Date(d) => (*d).into(),
        Value::Timestamp(t) => (*t).into(),
    }
}

/// Everything needed to fetch one page.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub dataset: String,
    pub table: String,
    /// Selected columns. Text-search vectors are never selected.
    pub columns: Vec<ColumnDef>,
    /// Dataset base filter and request filters.
    pub filter: Predicate,
    /// Rows strictly after the incoming cursor.
    pub seek: Option<Predicate>,
    pub sort: SortPlan,
    /// Page size plus the probe row.
    pub limit: u64,
    pub eager_loads: Vec<EagerLoad>,
    pub count: CountStrategy,
}

impl QueryPlan {
    pub fn new(
        dataset: &Dataset,
        filter: Predicate,
        seek: Option<Predicate>,
        sort: SortPlan,
        limit: u64,
    ) -> Self {
        Self {
            dataset: dataset.name().to_string(),
            table: dataset.table().to_string(),
            columns: dataset
                .columns()
                .iter()
                .filter(|c| c.kind.is_selectable())
                .cloned()
                .collect(),
            filter,
            seek,
            sort,
            limit,
            eager_loads: dataset.eager_loads().to_vec(),
            count: dataset.count_strategy(),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Filter and seek bound combined.
    pub fn where_predicate(&self) -> Predicate {
        let mut parts = vec![self.filter.clone()];
        if let Some(seek) = &self.seek {
            parts.push(seek.clone());
        }
        Predicate::All(parts)
    }

    /// Main page query.
    pub fn to_sql(&self) -> String {
        let mut query = Query::select();
        for column in &self.columns {
            query.column((Alias::new(&self.table), Alias::new(&column.name)));
        }
        query.from(Alias::new(&self.table));
        if let Some(cond) = self.where_predicate().to_condition(&self.table) {
            query.cond_where(cond);
        }
        self.add_order(&mut query);
        query.limit(self.limit);
        query.to_string(PostgresQueryBuilder)
    }

    /// Exact count of the filtered set, ignoring the seek bound.
    pub fn count_sql(&self) -> String {
        let mut query = Query::select();
        query.expr(Expr::col(Asterisk).count());
        query.from(Alias::new(&self.table));
        self.add_filter(&mut query);
        query.to_string(PostgresQueryBuilder)
    }

    /// Planner estimate of the filtered set size (`Plan Rows`).
    pub fn estimate_sql(&self) -> String {
        let mut query = Query::select();
        query.column((
            Alias::new(&self.table),
            Alias::new(&self.sort.index_key().column),
        ));
        query.from(Alias::new(&self.table));
        self.add_filter(&mut query);
        format!(
            "EXPLAIN (FORMAT JSON) {}",
            query.to_string(PostgresQueryBuilder)
        )
    }

    fn add_filter(&self, query: &mut SelectStatement) {
        if let Some(cond) = self.filter.to_condition(&self.table) {
            query.cond_where(cond);
        }
    }

    fn add_order(&self, query: &mut SelectStatement) {
        for key in self.sort.keys() {
            let column = (Alias::new(&self.table), Alias::new(&key.column));
            let (order, nulls) = match key.direction {
                SortDirection::Asc => (Order::Asc, NullOrdering::Last),
                SortDirection::Desc => (Order::Desc, NullOrdering::First),
            };
            if key.nullable {
                query.order_by_with_nulls(column, order, nulls);
            } else {
                query.order_by(column, order);
            }
        }
    }
}

/// One batched reference lookup for a page.
#[derive(Debug, Clone)]
pub struct LookupPlan {
    pub load: EagerLoad,
    pub keys: Vec<Value>,
}

impl LookupPlan {
    /// Lookup keyed by the distinct non-null foreign ids in `rows`. `None`
    /// when the page references nothing.
    pub fn for_rows(load: &EagerLoad, rows: &[Row]) -> Option<Self> {
        let mut seen = HashSet::new();
        let keys: Vec<Value> = rows
            .iter()
            .map(|row| row.get(&load.local_column))
            .filter(|v| !v.is_null() && seen.insert(*v))
            .cloned()
            .collect();
        if keys.is_empty() {
            return None;
        }
        Some(Self {
            load: load.clone(),
            keys,
        })
    }

    pub fn predicate(&self) -> Predicate {
        Predicate::In {
            column: self.load.target_column.clone(),
            values: self.keys.clone(),
        }
    }

    pub fn to_sql(&self) -> String {
        let table = &self.load.target_table;
        let mut query = Query::select();
        for column in &self.load.columns {
            query.column((Alias::new(table), Alias::new(&column.name)));
        }
        query.from(Alias::new(table));
        if let Some(cond) = self.predicate().to_condition(table) {
            query.cond_where(cond);
        }
        query.to_string(PostgresQueryBuilder)
    }
}
