//! In-process driver over a shared map of tables. Used by tests and local demos; data
//! lives as long as the [`MemoryStore`] handle.

use crate::config::{CollectionShape, ColumnType};
use crate::driver::{Driver, ListQuery, ListResult, Record, ReturningMode, SortDirection};
use crate::error::AppError;
use crate::service::value_eq;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<Record>,
    next_id: i64,
}

/// Cloneable handle; clones share the same tables.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table directly, bypassing validation.
    pub async fn insert_rows(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.tables.write().await;
        let t = tables.entry(table.to_string()).or_default();
        for row in rows {
            if let Value::Object(record) = row {
                t.rows.push(record);
            }
        }
    }

    pub async fn rows(&self, table: &str) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| t.rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }
}

pub struct MemoryDriver {
    store: MemoryStore,
    shape: CollectionShape,
    returning: ReturningMode,
}

impl MemoryDriver {
    pub fn new(store: MemoryStore, shape: CollectionShape) -> Self {
        MemoryDriver {
            store,
            shape,
            returning: ReturningMode::Rows,
        }
    }

    pub fn with_returning(mut self, mode: ReturningMode) -> Self {
        self.returning = mode;
        self
    }

    fn table(&self) -> &str {
        &self.shape.schema.name
    }

    fn key_of<'a>(&self, row: &'a Record) -> Option<&'a Value> {
        row.get(&self.shape.query_key).filter(|v| !v.is_null())
    }

    fn respond(&self, row: Record) -> Value {
        let row = Value::Object(row);
        match self.returning {
            ReturningMode::Rows => row,
            ReturningMode::Ids => self.shape.id_only(&row),
        }
    }

    fn matches_search(&self, row: &Record, term: &str) -> bool {
        let term = term.to_lowercase();
        self.shape.search_columns().iter().any(|c| match row.get(&c.name) {
            Some(Value::String(s)) => s.to_lowercase().contains(&term),
            Some(Value::Null) | None => false,
            Some(other) => other.to_string().to_lowercase().contains(&term),
        })
    }

    /// Fill columns the caller omitted: database-style defaults where the column has one,
    /// NULL otherwise.
    fn fill_defaults(&self, table: &mut MemoryTable, mut data: Record) -> Record {
        for c in &self.shape.schema.columns {
            if data.contains_key(&c.name) {
                continue;
            }
            let v = if c.has_default {
                match c.column_type {
                    ColumnType::Integer | ColumnType::BigInt => {
                        let highest = table
                            .rows
                            .iter()
                            .filter_map(|r| r.get(&c.name).and_then(Value::as_i64))
                            .max()
                            .unwrap_or(0);
                        table.next_id = table.next_id.max(highest) + 1;
                        Value::from(table.next_id)
                    }
                    ColumnType::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
                    ColumnType::Timestamptz => Value::String(chrono::Utc::now().to_rfc3339()),
                    ColumnType::Timestamp => {
                        Value::String(chrono::Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string())
                    }
                    ColumnType::Date => Value::String(chrono::Utc::now().date_naive().to_string()),
                    _ => Value::Null,
                }
            } else {
                Value::Null
            };
            data.insert(c.name.clone(), v);
        }
        data
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn returning(&self) -> ReturningMode {
        self.returning
    }

    async fn list(&self, query: &ListQuery) -> Result<ListResult, AppError> {
        let paged = self.shape.pagination.is_enabled();
        if paged {
            self.shape.check_limit(query.limit)?;
        }
        let tables = self.store.tables.read().await;
        let all = tables.get(self.table()).map(|t| t.rows.as_slice()).unwrap_or_default();
        let total = all.len() as u64;

        let mut rows: Vec<&Record> = match query.search.as_deref().filter(|s| !s.is_empty()) {
            Some(term) => all.iter().filter(|r| self.matches_search(r, term)).collect(),
            None => all.iter().collect(),
        };
        if let Some(sort) = self.shape.sort_for(query.sort_by.as_deref()) {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&sort.field), b.get(&sort.field));
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        if !paged {
            return Ok(ListResult::Rows(rows.into_iter().map(|r| Value::Object(r.clone())).collect()));
        }
        let page: Vec<Value> = rows
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(|r| Value::Object(r.clone()))
            .collect();
        Ok(ListResult::Page { results: page, count: total })
    }

    async fn count(&self) -> Result<u64, AppError> {
        let tables = self.store.tables.read().await;
        Ok(tables.get(self.table()).map(|t| t.rows.len() as u64).unwrap_or(0))
    }

    async fn validate(&self, raw: Value) -> Result<Record, AppError> {
        self.shape.validate(raw)
    }

    async fn create(&self, data: Record) -> Result<Value, AppError> {
        let mut tables = self.store.tables.write().await;
        let table = tables.entry(self.table().to_string()).or_default();
        let row = self.fill_defaults(table, data);
        if let Some(key) = self.key_of(&row) {
            if table.rows.iter().any(|r| self.key_of(r).is_some_and(|k| value_eq(k, key))) {
                return Err(AppError::Conflict(format!(
                    "{} '{}' already exists",
                    self.shape.query_key, key
                )));
            }
        }
        table.rows.push(row.clone());
        Ok(self.respond(row))
    }

    async fn retrieve(&self, id: &str) -> Result<Option<Value>, AppError> {
        let id = self.shape.parse_id(id)?;
        let tables = self.store.tables.read().await;
        Ok(tables.get(self.table()).and_then(|t| {
            t.rows
                .iter()
                .find(|r| self.key_of(r).is_some_and(|k| value_eq(k, &id)))
                .map(|r| Value::Object(r.clone()))
        }))
    }

    async fn update(&self, id: &str, data: Record) -> Result<Option<Value>, AppError> {
        let id = self.shape.parse_id(id)?;
        let mut tables = self.store.tables.write().await;
        let Some(table) = tables.get_mut(self.table()) else {
            return Ok(None);
        };
        let Some(row) = table
            .rows
            .iter_mut()
            .find(|r| r.get(&self.shape.query_key).is_some_and(|k| value_eq(k, &id)))
        else {
            return Ok(None);
        };
        for (k, v) in data {
            if k != self.shape.query_key {
                row.insert(k, v);
            }
        }
        let row = row.clone();
        Ok(Some(self.respond(row)))
    }

    async fn delete(&self, id: &str) -> Result<Option<Value>, AppError> {
        let id = self.shape.parse_id(id)?;
        let mut tables = self.store.tables.write().await;
        let Some(table) = tables.get_mut(self.table()) else {
            return Ok(None);
        };
        let Some(pos) = table
            .rows
            .iter()
            .position(|r| self.key_of(r).is_some_and(|k| value_eq(k, &id)))
        else {
            return Ok(None);
        };
        let row = table.rows.remove(pos);
        Ok(Some(self.respond(row)))
    }

    async fn delete_many(&self, ids: &[Value]) -> Result<u64, AppError> {
        let ids: Vec<Value> = ids.iter().filter_map(|id| self.shape.parse_key_value(id).ok()).collect();
        let mut tables = self.store.tables.write().await;
        let Some(table) = tables.get_mut(self.table()) else {
            return Ok(0);
        };
        let before = table.rows.len();
        let key = self.shape.query_key.as_str();
        table
            .rows
            .retain(|r| !r.get(key).is_some_and(|k| ids.iter().any(|id| value_eq(k, id))));
        Ok((before - table.rows.len()) as u64)
    }
}
