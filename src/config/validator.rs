//! Collection config validation: slug, query key and pagination constraints.

use crate::config::{Pagination, TableSchema};
use crate::error::{ConfigError, PaginationViolation};
use std::collections::HashSet;

/// Slugs become path segments, so they cannot carry separators or route syntax.
pub fn validate_slug(slug: &str) -> Result<(), ConfigError> {
    if slug.trim().is_empty() || slug.contains(['/', ':', '*', '{', '}']) {
        return Err(ConfigError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Explicit key if it is a schema column, else the schema's primary key.
pub fn resolve_query_key(schema: &TableSchema, explicit: Option<&str>) -> Result<String, ConfigError> {
    if let Some(column) = explicit.and_then(|k| schema.column(k)) {
        return Ok(column.name.clone());
    }
    schema
        .primary_key()
        .map(|c| c.name.clone())
        .ok_or_else(|| ConfigError::MissingPrimaryKey {
            table: schema.name.clone(),
        })
}

pub fn validate_pagination(slug: &str, pagination: &Pagination) -> Result<(), ConfigError> {
    let Pagination::Enabled {
        default_limit,
        max_limit,
    } = *pagination
    else {
        return Ok(());
    };
    let violation = if default_limit == 0 {
        Some(PaginationViolation::DefaultLimitNotPositive)
    } else {
        match max_limit {
            Some(0) => Some(PaginationViolation::MaxLimitNotPositive),
            Some(max) if max < default_limit => Some(PaginationViolation::MaxLimitBelowDefault),
            _ => None,
        }
    };
    match violation {
        Some(violation) => Err(ConfigError::InvalidPaginationConfig {
            slug: slug.to_string(),
            violation,
        }),
        None => Ok(()),
    }
}

pub fn ensure_unique_slugs<'a>(slugs: impl IntoIterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for slug in slugs {
        if !seen.insert(slug) {
            return Err(ConfigError::DuplicateSlug(slug.to_string()));
        }
    }
    Ok(())
}
