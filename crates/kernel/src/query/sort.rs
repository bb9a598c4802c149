//! Sort validation and the effective ordering key.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::catalog::{ColumnKind, Dataset, SortDirection};
use crate::error::QueryError;

use super::row::Row;

/// A requested sort field and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRequest {
    pub field: String,
    pub direction: SortDirection,
}

impl SortRequest {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Desc,
        }
    }

    /// `field` is ascending, `-field` is descending.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(raw),
        }
    }
}

/// One component of the effective ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Request-facing name, also the cursor field name.
    pub field: String,
    pub column: String,
    pub kind: ColumnKind,
    pub direction: SortDirection,
    pub nullable: bool,
}

/// The effective ordering: requested keys followed by the index column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPlan {
    keys: Vec<SortKey>,
}

impl SortPlan {
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// The index column key. Always last.
    pub fn index_key(&self) -> &SortKey {
        &self.keys[self.keys.len() - 1]
    }

    /// Keys before the index column.
    pub fn sort_keys(&self) -> &[SortKey] {
        &self.keys[..self.keys.len() - 1]
    }

    pub fn fields(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.field.as_str()).collect()
    }

    /// Order two rows the way the database orders them: nulls last when
    /// ascending, first when descending.
    pub fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        for key in &self.keys {
            let ordering = a.get(&key.column).sort_cmp(b.get(&key.column));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Validate `requests` against the dataset's allow-list and build the
/// effective ordering. An empty request uses the dataset default; `reverse`
/// flips every direction.
pub fn resolve(
    dataset: &Dataset,
    requests: &[SortRequest],
    reverse: bool,
) -> Result<SortPlan, QueryError> {
    let requested: Vec<SortRequest> = if requests.is_empty() {
        dataset
            .default_sort()
            .iter()
            .map(|(field, direction)| SortRequest {
                field: field.clone(),
                direction: *direction,
            })
            .collect()
    } else {
        requests.to_vec()
    };

    if requests.len() > 1 && !dataset.multi_sort() {
        return Err(QueryError::sort(
            &requests[1].field,
            format!("dataset '{}' sorts on a single field", dataset.name()),
        ));
    }

    let index = dataset.index_column();
    let mut seen = HashSet::new();
    let mut keys = Vec::with_capacity(requested.len() + 1);

    for (position, request) in requested.iter().enumerate() {
        let direction = if reverse {
            request.direction.reversed()
        } else {
            request.direction
        };
        if !seen.insert(request.field.as_str()) {
            return Err(QueryError::sort(&request.field, "listed more than once"));
        }

        let column = if request.field == index {
            if position + 1 != requested.len() {
                return Err(QueryError::sort(
                    &request.field,
                    "the index column can only be the last sort field",
                ));
            }
            index
        } else {
            let Some(spec) = dataset.sort_spec(&request.field) else {
                return Err(QueryError::sort(&request.field, "field is not sortable"));
            };
            if !spec.capability.permits(direction) {
                return Err(QueryError::sort(
                    &request.field,
                    format!("{direction} order is not supported"),
                ));
            }
            spec.column.as_str()
        };

        let Some(def) = dataset.column(column) else {
            return Err(QueryError::sort(&request.field, "field is not sortable"));
        };
        keys.push(SortKey {
            field: request.field.clone(),
            column: def.name.clone(),
            kind: def.kind,
            direction,
            nullable: def.nullable,
        });
    }

    if keys.last().is_none_or(|k| k.column != index) {
        let direction = keys.first().map_or(SortDirection::Desc, |k| k.direction);
        keys.push(SortKey {
            field: index.to_string(),
            column: index.to_string(),
            kind: ColumnKind::Integer,
            direction,
            nullable: false,
        });
    }

    Ok(SortPlan { keys })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, DatasetDef, DirectionCapability, SortSpec};

    fn catalog() -> Catalog {
        Catalog::builder()
            .register(
                DatasetDef::new("single", "single_t")
                    .index("sk")
                    .column("sk", ColumnKind::Integer)
                    .column("amount", ColumnKind::Decimal)
                    .column("date", ColumnKind::Date)
                    .sort(SortSpec::both("amount"))
                    .sort(SortSpec::both("date")),
            )
            .unwrap()
            .register(
                DatasetDef::new("multi", "multi_t")
                    .index("idx")
                    .column("idx", ColumnKind::Integer)
                    .column("year", ColumnKind::Integer)
                    .column("state", ColumnKind::Text)
                    .sort(SortSpec::only("year", DirectionCapability::Descending))
                    .sort(SortSpec::both("state"))
                    .multi_sort(true)
                    .default_sort("year", SortDirection::Desc),
            )
            .unwrap()
            .build()
    }

    #[test]
    fn default_is_index_descending() {
        let catalog = catalog();
        let plan = resolve(catalog.dataset("single").unwrap(), &[], false).unwrap();
        assert_eq!(plan.fields(), vec!["sk"]);
        assert_eq!(plan.index_key().direction, SortDirection::Desc);
        assert!(plan.sort_keys().is_empty());
    }

    #[test]
    fn index_tie_break_follows_primary_direction() {
        let catalog = catalog();
        let plan = resolve(
            catalog.dataset("single").unwrap(),
            &[SortRequest::parse("amount")],
            false,
        )
        .unwrap();
        assert_eq!(plan.fields(), vec!["amount", "sk"]);
        assert_eq!(plan.index_key().direction, SortDirection::Asc);
    }

    #[test]
    fn parse_prefix_and_reverse() {
        let catalog = catalog();
        let plan = resolve(
            catalog.dataset("single").unwrap(),
            &[SortRequest::parse("-date")],
            true,
        )
        .unwrap();
        assert_eq!(plan.keys()[0].direction, SortDirection::Asc);
    }

    #[test]
    fn single_key_dataset_rejects_multi() {
        let catalog = catalog();
        let err = resolve(
            catalog.dataset("single").unwrap(),
            &[SortRequest::asc("amount"), SortRequest::asc("date")],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidSort { field, .. } if field == "date"));
    }

    #[test]
    fn unknown_field_and_direction() {
        let catalog = catalog();
        let multi = catalog.dataset("multi").unwrap();
        assert!(matches!(
            resolve(multi, &[SortRequest::asc("bogus")], false),
            Err(QueryError::InvalidSort { .. })
        ));
        assert!(matches!(
            resolve(multi, &[SortRequest::asc("year")], false),
            Err(QueryError::InvalidSort { .. })
        ));
        assert!(matches!(
            resolve(multi, &[SortRequest::desc("year"), SortRequest::asc("year")], false),
            Err(QueryError::InvalidSort { .. })
        ));
    }

    #[test]
    fn multi_key_keeps_order() {
        let catalog = catalog();
        let plan = resolve(
            catalog.dataset("multi").unwrap(),
            &[SortRequest::parse("state"), SortRequest::parse("-year")],
            false,
        )
        .unwrap();
        assert_eq!(plan.fields(), vec!["state", "year", "idx"]);
    }

    #[test]
    fn index_only_allowed_last() {
        let catalog = catalog();
        let multi = catalog.dataset("multi").unwrap();
        assert!(resolve(multi, &[SortRequest::asc("idx"), SortRequest::asc("state")], false).is_err());
        let plan = resolve(multi, &[SortRequest::asc("state"), SortRequest::desc("idx")], false)
            .unwrap();
        assert_eq!(plan.fields(), vec!["state", "idx"]);
        assert_eq!(plan.index_key().direction, SortDirection::Desc);
    }

    #[test]
    fn compare_rows_puts_nulls_last_ascending_first_descending() {
        let catalog = catalog();
        let dataset = catalog.dataset("single").unwrap();
        let a = Row::new().with("sk", 1_i64).with("amount", rust_decimal::Decimal::ONE);
        let b = Row::new().with("sk", 2_i64);

        let asc = resolve(dataset, &[SortRequest::asc("amount")], false).unwrap();
        assert_eq!(asc.compare_rows(&a, &b), Ordering::Less);

        let desc = resolve(dataset, &[SortRequest::desc("amount")], false).unwrap();
        assert_eq!(desc.compare_rows(&a, &b), Ordering::Greater);
    }
}
