//! PostgreSQL driver over a shared `PgPool`.

use crate::config::{CollectionShape, ColumnSchema, ColumnType};
use crate::driver::{Driver, ListQuery, ListResult, Record, ReturningMode};
use crate::error::AppError;
use crate::sql::{self, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

pub struct PgDriver {
    pool: PgPool,
    shape: CollectionShape,
    returning: ReturningMode,
}

impl PgDriver {
    pub fn new(pool: PgPool, shape: CollectionShape) -> Self {
        PgDriver {
            pool,
            shape,
            returning: ReturningMode::Rows,
        }
    }

    /// PostgreSQL always supports `RETURNING` rows; `Ids` trims responses to the key.
    pub fn with_returning(mut self, mode: ReturningMode) -> Self {
        self.returning = mode;
        self
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(collection = %self.shape.slug, sql = %q.sql, "query");
        let rows = bind(q).fetch_all(&self.pool).await.map_err(map_db_error)?;
        Ok(rows.iter().map(|r| row_to_json(r, &self.shape)).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(collection = %self.shape.slug, sql = %q.sql, "query");
        let row = bind(q).fetch_optional(&self.pool).await.map_err(map_db_error)?;
        Ok(row.map(|r| row_to_json(&r, &self.shape)))
    }
}

fn bind(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    q.params
        .iter()
        .fold(sqlx::query(&q.sql), |query, p| query.bind(p.clone()))
}

/// Constraint violations are the caller's fault; everything else is a server error.
fn map_db_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some("23505") => return AppError::Conflict(db.message().to_string()),
            Some("23502") | Some("23503") | Some("23514") | Some("22P02") | Some("22007") | Some("22008") => {
                return AppError::BadRequest(db.message().to_string())
            }
            _ => {}
        }
    }
    AppError::Db(e)
}

#[async_trait]
impl Driver for PgDriver {
    fn returning(&self) -> ReturningMode {
        self.returning
    }

    async fn list(&self, query: &ListQuery) -> Result<ListResult, AppError> {
        let paged = self.shape.pagination.is_enabled();
        if paged {
            self.shape.check_limit(query.limit)?;
        }
        let q = sql::select_list(
            &self.shape,
            query.search.as_deref(),
            query.sort_by.as_deref(),
            paged.then_some(query.limit),
            paged.then_some(query.offset),
        );
        if !paged {
            return Ok(ListResult::Rows(self.fetch_all(&q).await?));
        }
        let (rows, count) = tokio::try_join!(self.fetch_all(&q), self.count())?;
        Ok(ListResult::Page { results: rows, count })
    }

    async fn count(&self) -> Result<u64, AppError> {
        let q = sql::count(&self.shape);
        tracing::debug!(collection = %self.shape.slug, sql = %q.sql, "query");
        let n: i64 = sqlx::query_scalar(&q.sql)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(n.max(0) as u64)
    }

    async fn validate(&self, raw: Value) -> Result<Record, AppError> {
        self.shape.validate(raw)
    }

    async fn create(&self, data: Record) -> Result<Value, AppError> {
        let q = sql::insert(&self.shape, &data, self.returning);
        self.fetch_optional(&q)
            .await?
            .ok_or_else(|| AppError::Internal("insert returned no row".into()))
    }

    async fn retrieve(&self, id: &str) -> Result<Option<Value>, AppError> {
        let id = self.shape.parse_id(id)?;
        self.fetch_optional(&sql::select_by_key(&self.shape, &id)).await
    }

    async fn update(&self, id: &str, data: Record) -> Result<Option<Value>, AppError> {
        let id = self.shape.parse_id(id)?;
        let row = self
            .fetch_optional(&sql::update(&self.shape, &id, &data, self.returning))
            .await?;
        Ok(match self.returning {
            ReturningMode::Ids => row.map(|r| self.shape.id_only(&r)),
            ReturningMode::Rows => row,
        })
    }

    async fn delete(&self, id: &str) -> Result<Option<Value>, AppError> {
        let id = self.shape.parse_id(id)?;
        self.fetch_optional(&sql::delete(&self.shape, &id, self.returning)).await
    }

    async fn delete_many(&self, ids: &[Value]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let q = sql::delete_where_in(&self.shape, ids);
        tracing::debug!(collection = %self.shape.slug, sql = %q.sql, count = ids.len(), "query");
        let done = bind(&q).execute(&self.pool).await.map_err(map_db_error)?;
        Ok(done.rows_affected())
    }
}

/// Decode a row by the collection's column types; columns outside the schema are skipped.
fn row_to_json(row: &PgRow, shape: &CollectionShape) -> Value {
    let mut map = serde_json::Map::new();
    for col in &shape.schema.columns {
        if row.try_column(col.name.as_str()).is_err() {
            continue;
        }
        map.insert(col.name.clone(), cell_to_value(row, col));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, col: &ColumnSchema) -> Value {
    let name = col.name.as_str();
    let decoded = match col.column_type {
        ColumnType::Integer => row.try_get::<Option<i32>, _>(name).map(|v| v.map(Value::from)),
        ColumnType::BigInt => row.try_get::<Option<i64>, _>(name).map(|v| v.map(Value::from)),
        ColumnType::Double => row.try_get::<Option<f64>, _>(name).map(|v| v.map(Value::from)),
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(name).map(|v| v.map(Value::Bool)),
        ColumnType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        ColumnType::Timestamp => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(name)
            .map(|v| v.map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        ColumnType::Timestamptz => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)
            .map(|v| v.map(|t| Value::String(t.to_rfc3339()))),
        ColumnType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        ColumnType::Jsonb => row.try_get::<Option<Value>, _>(name),
        ColumnType::Text | ColumnType::Numeric => row.try_get::<Option<String>, _>(name).map(|v| v.map(Value::String)),
    };
    match decoded {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!(column = %name, error = %e, "column decode failed");
            Value::Null
        }
    }
}
