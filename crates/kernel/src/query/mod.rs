//! Query pipeline: intent → predicate + sort + seek → plan → page.

pub mod composer;
pub mod intent;
pub mod page;
pub mod plan;
pub mod predicate;
pub mod row;
pub mod seek;
pub mod sort;
pub mod value;

pub use composer::{ComposedQuery, EngineSettings, QueryComposer};
pub use intent::{CursorInput, QueryIntent, QueryIntentBuilder};
pub use page::{Page, PageAssembler, Pagination};
pub use plan::{LookupPlan, QueryPlan};
pub use predicate::{CompareOp, Predicate, build_filter_predicate};
pub use row::Row;
pub use seek::{Cursor, SeekPaginator, seek_predicate};
pub use sort::{SortKey, SortPlan, SortRequest};
pub use value::{ColumnKind, Value};
