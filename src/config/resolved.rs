//! Sanitized collection: config fully defaulted and validated for runtime use.

use crate::access::Access;
use crate::action::CollectionAction;
use crate::config::{ColumnSchema, ColumnType, FieldSpec, Label, Pagination, TableSchema, ValidationRule, DEFAULT_LIMIT};
use crate::driver::{DriverFactory, Record, Sort};
use crate::error::AppError;
use crate::hooks::CollectionHooks;
use crate::plugin::CollectionPlugin;
use crate::service::RecordValidator;
use crate::sql::params::to_text;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub struct SanitizedAdmin<D> {
    pub label: Label,
    pub columns: Vec<FieldSpec>,
    pub fields: Option<Vec<FieldSpec>>,
    /// Built-in bulk delete first (unless actions are disabled), then user actions.
    pub actions: Vec<CollectionAction<D>>,
}

impl<D> Clone for SanitizedAdmin<D> {
    fn clone(&self) -> Self {
        SanitizedAdmin {
            label: self.label.clone(),
            columns: self.columns.clone(),
            fields: self.fields.clone(),
            actions: self.actions.clone(),
        }
    }
}

/// Read-only after sanitization; shared by the compiled routes as `Arc`.
pub struct SanitizedCollection<D> {
    pub slug: String,
    pub schema: TableSchema,
    pub query_key: String,
    pub access: Access,
    pub default_sort: Option<String>,
    pub list_searchable_fields: Vec<String>,
    pub pagination: Pagination,
    pub admin: SanitizedAdmin<D>,
    pub hooks: CollectionHooks,
    pub plugins: Vec<Arc<dyn CollectionPlugin<D>>>,
    pub driver: DriverFactory<D>,
    pub validation: HashMap<String, ValidationRule>,
}

impl<D> Clone for SanitizedCollection<D> {
    fn clone(&self) -> Self {
        SanitizedCollection {
            slug: self.slug.clone(),
            schema: self.schema.clone(),
            query_key: self.query_key.clone(),
            access: self.access.clone(),
            default_sort: self.default_sort.clone(),
            list_searchable_fields: self.list_searchable_fields.clone(),
            pagination: self.pagination,
            admin: self.admin.clone(),
            hooks: self.hooks.clone(),
            plugins: self.plugins.clone(),
            driver: self.driver.clone(),
            validation: self.validation.clone(),
        }
    }
}

impl<D> SanitizedCollection<D> {
    /// `limit` applied to list requests that do not pass one.
    pub fn default_limit(&self) -> u32 {
        match self.pagination {
            Pagination::Enabled { default_limit, .. } => default_limit,
            Pagination::Disabled => DEFAULT_LIMIT,
        }
    }

    pub fn action(&self, name: &str) -> Option<&CollectionAction<D>> {
        self.admin.actions.iter().find(|a| a.name == name)
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.admin.actions.iter().map(|a| a.name.as_str()).collect()
    }

    /// Data-only view handed to drivers.
    pub fn shape(&self) -> CollectionShape {
        CollectionShape {
            slug: self.slug.clone(),
            schema: self.schema.clone(),
            query_key: self.query_key.clone(),
            default_sort: self.default_sort.clone(),
            list_searchable_fields: self.list_searchable_fields.clone(),
            pagination: self.pagination,
            fields: self
                .admin
                .fields
                .as_ref()
                .map(|fields| fields.iter().map(|f| f.name().to_string()).collect()),
            validation: self.validation.clone(),
        }
    }
}

/// What a driver needs to know about its collection.
#[derive(Clone, Debug)]
pub struct CollectionShape {
    pub slug: String,
    pub schema: TableSchema,
    pub query_key: String,
    pub default_sort: Option<String>,
    pub list_searchable_fields: Vec<String>,
    pub pagination: Pagination,
    /// Writable fields; `None` means every column.
    pub fields: Option<Vec<String>>,
    pub validation: HashMap<String, ValidationRule>,
}

impl CollectionShape {
    pub fn query_key_type(&self) -> ColumnType {
        self.schema
            .column(&self.query_key)
            .map(|c| c.column_type)
            .unwrap_or(ColumnType::Text)
    }

    pub fn parse_id(&self, id: &str) -> Result<Value, AppError> {
        self.query_key_type().parse_id(id)
    }

    /// Key value from a request body, normalized like a path id (`"1"` and `1` agree).
    pub fn parse_key_value(&self, raw: &Value) -> Result<Value, AppError> {
        let text = to_text(raw).ok_or_else(|| AppError::BadRequest(format!("{} must not be null", self.query_key)))?;
        self.parse_id(text.trim())
    }

    /// Requested sort, else the default sort. A field outside the schema means no sort.
    pub fn sort_for(&self, sort_by: Option<&str>) -> Option<Sort> {
        let raw = sort_by.or(self.default_sort.as_deref())?;
        let sort = Sort::parse(raw);
        self.schema.column(&sort.field).map(|_| sort)
    }

    /// Searchable fields that exist in the schema.
    pub fn search_columns(&self) -> Vec<&ColumnSchema> {
        self.list_searchable_fields
            .iter()
            .filter_map(|f| self.schema.column(f))
            .collect()
    }

    pub fn check_limit(&self, limit: u32) -> Result<(), AppError> {
        match self.pagination.max_limit() {
            Some(max) if limit > max => Err(AppError::LimitExceeded { limit, max }),
            _ => Ok(()),
        }
    }

    /// Columns accepted in a write payload.
    pub fn writable_columns(&self) -> Vec<&ColumnSchema> {
        match &self.fields {
            Some(fields) => self
                .schema
                .columns
                .iter()
                .filter(|c| fields.iter().any(|f| *f == c.name))
                .collect(),
            None => self.schema.columns.iter().collect(),
        }
    }

    pub fn validate(&self, raw: Value) -> Result<Record, AppError> {
        RecordValidator::validate(self, raw)
    }

    /// `{queryKey: value}` for drivers returning ids only.
    pub fn id_only(&self, row: &Value) -> Value {
        let mut out = Record::new();
        out.insert(
            self.query_key.clone(),
            row.get(&self.query_key).cloned().unwrap_or(Value::Null),
        );
        Value::Object(out)
    }
}
