//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE for a collection's table.

use crate::config::{CollectionShape, ColumnSchema, ColumnType};
use crate::driver::{Record, ReturningMode, SortDirection};
use crate::sql::params::{escape_like, to_text};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(shape: &CollectionShape) -> String {
    format!("{}.{}", quoted(shape.schema.namespace()), quoted(&shape.schema.name))
}

pub struct QueryBuf {
    pub sql: String,
    /// Text-encoded values; `None` binds SQL NULL.
    pub params: Vec<Option<String>>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its cast placeholder.
    fn push(&mut self, v: &Value, column_type: ColumnType) -> String {
        self.params.push(to_text(v));
        format!("${}::{}", self.params.len(), column_type.pg_type())
    }
}

/// Numeric as text so the row decodes without a decimal crate.
fn select_column(c: &ColumnSchema) -> String {
    let q = quoted(&c.name);
    if c.column_type == ColumnType::Numeric {
        format!("{}::text AS {}", q, q)
    } else {
        q
    }
}

fn select_column_list(shape: &CollectionShape) -> String {
    shape
        .schema
        .columns
        .iter()
        .map(select_column)
        .collect::<Vec<_>>()
        .join(", ")
}

fn returning_list(shape: &CollectionShape, mode: ReturningMode) -> String {
    match mode {
        ReturningMode::Rows => select_column_list(shape),
        ReturningMode::Ids => shape
            .schema
            .column(&shape.query_key)
            .map(select_column)
            .unwrap_or_else(|| quoted(&shape.query_key)),
    }
}

fn key_placeholder(q: &mut QueryBuf, shape: &CollectionShape, id: &Value) -> String {
    q.push(id, shape.query_key_type())
}

/// SELECT with optional case-insensitive search across the searchable columns (OR),
/// ORDER BY the requested or default sort, then LIMIT/OFFSET when paging.
pub fn select_list(
    shape: &CollectionShape,
    search: Option<&str>,
    sort_by: Option<&str>,
    limit: Option<u32>,
    offset: Option<u32>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(shape);

    let columns = shape.search_columns();
    let where_clause = match search.filter(|s| !s.is_empty()) {
        Some(term) if !columns.is_empty() => {
            q.params.push(Some(format!("%{}%", escape_like(term))));
            let n = q.params.len();
            let parts: Vec<String> = columns
                .iter()
                .map(|c| format!("{}::text ILIKE ${}", quoted(&c.name), n))
                .collect();
            format!(" WHERE ({})", parts.join(" OR "))
        }
        _ => String::new(),
    };
    let order_clause = shape
        .sort_for(sort_by)
        .map(|s| {
            let dir = match s.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!(" ORDER BY {} {}", quoted(&s.field), dir)
        })
        .unwrap_or_default();

    let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(shape),
        table,
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    q
}

/// Total rows; search does not apply.
pub fn count(shape: &CollectionShape) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT COUNT(*) FROM {}", qualified_table(shape));
    q
}

pub fn select_by_key(shape: &CollectionShape, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = key_placeholder(&mut q, shape, id);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(shape),
        qualified_table(shape),
        quoted(&shape.query_key),
        ph
    );
    q
}

/// INSERT the record's columns in schema order. Omitted columns take their database default.
pub fn insert(shape: &CollectionShape, data: &Record, mode: ReturningMode) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(shape);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &shape.schema.columns {
        let Some(v) = data.get(&c.name) else { continue };
        placeholders.push(q.push(v, c.column_type));
        cols.push(quoted(&c.name));
    }
    let returning = returning_list(shape, mode);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by query key, setting only columns present in the record. The key itself is
/// never rewritten. With nothing to set this degrades to a keyed SELECT.
pub fn update(shape: &CollectionShape, id: &Value, data: &Record, mode: ReturningMode) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &shape.schema.columns {
        if c.name == shape.query_key {
            continue;
        }
        let Some(v) = data.get(&c.name) else { continue };
        let ph = q.push(v, c.column_type);
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    if sets.is_empty() {
        return select_by_key(shape, id);
    }
    let ph = key_placeholder(&mut q, shape, id);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(shape),
        sets.join(", "),
        quoted(&shape.query_key),
        ph,
        returning_list(shape, mode)
    );
    q
}

pub fn delete(shape: &CollectionShape, id: &Value, mode: ReturningMode) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = key_placeholder(&mut q, shape, id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(shape),
        quoted(&shape.query_key),
        ph,
        returning_list(shape, mode)
    );
    q
}

/// DELETE every row whose query key is in `ids`.
pub fn delete_where_in(shape: &CollectionShape, ids: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let placeholders: Vec<String> = ids.iter().map(|id| key_placeholder(&mut q, shape, id)).collect();
    let condition = if placeholders.is_empty() {
        "1 = 0".to_string()
    } else {
        format!("{} IN ({})", quoted(&shape.query_key), placeholders.join(", "))
    };
    q.sql = format!("DELETE FROM {} WHERE {}", qualified_table(shape), condition);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Pagination, TableSchema};
    use serde_json::json;
    use std::collections::HashMap;

    fn shape() -> CollectionShape {
        CollectionShape {
            slug: "todos".into(),
            schema: TableSchema::new(
                "todos",
                vec![
                    ColumnSchema::new("id", ColumnType::Integer).primary().with_default(),
                    ColumnSchema::new("message", ColumnType::Text).not_null(),
                    ColumnSchema::new("price", ColumnType::Numeric),
                ],
            ),
            query_key: "id".into(),
            default_sort: Some("-id".into()),
            list_searchable_fields: vec!["message".into()],
            pagination: Pagination::limit(10),
            fields: None,
            validation: HashMap::new(),
        }
    }

    #[test]
    fn list_searches_sorts_and_pages() {
        let q = select_list(&shape(), Some("50%"), None, Some(5), Some(10));
        assert_eq!(
            q.sql,
            r#"SELECT "id", "message", "price"::text AS "price" FROM "public"."todos" WHERE ("message"::text ILIKE $1) ORDER BY "id" DESC LIMIT 5 OFFSET 10"#
        );
        assert_eq!(q.params, vec![Some(r"%50\%%".to_string())]);
    }

    #[test]
    fn search_ors_every_searchable_column_with_one_param() {
        let mut s = shape();
        s.list_searchable_fields = vec!["message".into(), "price".into()];
        let q = select_list(&s, Some("milk"), None, Some(10), Some(0));
        assert!(q
            .sql
            .contains(r#"WHERE ("message"::text ILIKE $1 OR "price"::text ILIKE $1)"#));
        assert_eq!(q.params, vec![Some("%milk%".to_string())]);
        assert!(!q.sql.contains("$2"));
    }

    #[test]
    fn list_without_search_has_no_params() {
        let q = select_list(&shape(), Some(""), Some("message"), None, None);
        assert!(q.params.is_empty());
        assert!(q.sql.ends_with(r#"ORDER BY "message" ASC"#));
    }

    #[test]
    fn insert_casts_placeholders_and_honors_returning_mode() {
        let data = json!({ "message": "hi", "price": "1.50" });
        let Value::Object(data) = data else { unreachable!() };
        let q = insert(&shape(), &data, ReturningMode::Ids);
        assert_eq!(
            q.sql,
            r#"INSERT INTO "public"."todos" ("message", "price") VALUES ($1::text, $2::numeric) RETURNING "id""#
        );
        assert_eq!(q.params, vec![Some("hi".into()), Some("1.50".into())]);
    }

    #[test]
    fn update_skips_the_query_key() {
        let Value::Object(data) = json!({ "id": 9, "message": "x" }) else { unreachable!() };
        let q = update(&shape(), &json!(3), &data, ReturningMode::Rows);
        assert!(q.sql.starts_with(r#"UPDATE "public"."todos" SET "message" = $1::text WHERE "id" = $2::int4"#));
        assert_eq!(q.params, vec![Some("x".into()), Some("3".into())]);
    }

    #[test]
    fn delete_many_binds_every_key() {
        let q = delete_where_in(&shape(), &[json!(1), json!(2)]);
        assert_eq!(q.sql, r#"DELETE FROM "public"."todos" WHERE "id" IN ($1::int4, $2::int4)"#);
    }
}
