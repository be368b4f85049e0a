//! Storage driver contract. One driver instance serves one collection and is shared by
//! all of that collection's concurrent requests.

mod memory;
mod postgres;

pub use memory::{MemoryDriver, MemoryStore};
pub use postgres::PgDriver;

use crate::config::SanitizedCollection;
use crate::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A validated row: column name to JSON value.
pub type Record = serde_json::Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: u32,
    pub offset: u32,
    pub search: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    /// `"name"` sorts ascending, `"-name"` descending.
    pub fn parse(raw: &str) -> Sort {
        match raw.strip_prefix('-') {
            Some(field) => Sort {
                field: field.to_string(),
                direction: SortDirection::Desc,
            },
            None => Sort {
                field: raw.to_string(),
                direction: SortDirection::Asc,
            },
        }
    }
}

/// Bare rows when pagination is disabled, `{results, count}` otherwise.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListResult {
    Rows(Vec<Value>),
    Page { results: Vec<Value>, count: u64 },
}

impl ListResult {
    pub fn rows(&self) -> &[Value] {
        match self {
            ListResult::Rows(rows) => rows,
            ListResult::Page { results, .. } => results,
        }
    }
}

/// What mutations hand back. Fixed when the driver is built, not checked per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturningMode {
    /// The full written row.
    Rows,
    /// Only `{queryKey: value}`.
    Ids,
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn returning(&self) -> ReturningMode {
        ReturningMode::Rows
    }

    async fn list(&self, query: &ListQuery) -> Result<ListResult, AppError>;

    /// Total rows, ignoring any search filter.
    async fn count(&self) -> Result<u64, AppError>;

    /// Check a raw payload against the collection schema. Fails with
    /// [`AppError::ValidationFailed`].
    async fn validate(&self, raw: Value) -> Result<Record, AppError>;

    async fn create(&self, data: Record) -> Result<Value, AppError>;

    async fn retrieve(&self, id: &str) -> Result<Option<Value>, AppError>;

    async fn update(&self, id: &str, data: Record) -> Result<Option<Value>, AppError>;

    async fn delete(&self, id: &str) -> Result<Option<Value>, AppError>;

    /// Delete every row whose query key is in `ids`; returns the number removed.
    async fn delete_many(&self, ids: &[Value]) -> Result<u64, AppError>;
}

type FactoryFn<D> = dyn Fn(&D, &SanitizedCollection<D>) -> Arc<dyn Driver> + Send + Sync;

/// Builds a collection's driver from the hub's database handle.
pub struct DriverFactory<D>(Arc<FactoryFn<D>>);

impl<D> Clone for DriverFactory<D> {
    fn clone(&self) -> Self {
        DriverFactory(self.0.clone())
    }
}

impl<D> DriverFactory<D> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&D, &SanitizedCollection<D>) -> Arc<dyn Driver> + Send + Sync + 'static,
    {
        DriverFactory(Arc::new(f))
    }

    pub fn build(&self, db: &D, collection: &SanitizedCollection<D>) -> Arc<dyn Driver> {
        (self.0)(db, collection)
    }
}

/// A database handle a hub can be built over. Supplies the driver used by collections
/// that do not name one.
pub trait Database: Clone + Send + Sync + 'static {
    fn default_driver() -> DriverFactory<Self>;
}

impl Database for sqlx::PgPool {
    fn default_driver() -> DriverFactory<Self> {
        DriverFactory::new(|pool: &sqlx::PgPool, collection| {
            Arc::new(PgDriver::new(pool.clone(), collection.shape())) as Arc<dyn Driver>
        })
    }
}

impl Database for MemoryStore {
    fn default_driver() -> DriverFactory<Self> {
        DriverFactory::new(|store: &MemoryStore, collection| {
            Arc::new(MemoryDriver::new(store.clone(), collection.shape())) as Arc<dyn Driver>
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_prefix_selects_direction() {
        assert_eq!(Sort::parse("-created").direction, SortDirection::Desc);
        assert_eq!(Sort::parse("-created").field, "created");
        assert_eq!(Sort::parse("name").direction, SortDirection::Asc);
    }

    #[test]
    fn list_result_serializes_untagged() {
        let rows = ListResult::Rows(vec![serde_json::json!({ "id": 1 })]);
        assert_eq!(serde_json::to_value(&rows).unwrap(), serde_json::json!([{ "id": 1 }]));
        let page = ListResult::Page {
            results: vec![],
            count: 15,
        };
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            serde_json::json!({ "results": [], "count": 15 })
        );
    }
}
