//! Raw collection config: the serializable definition plus the behavior (access, hooks,
//! actions, plugins, driver) attached in code.

use crate::access::Access;
use crate::action::CollectionAction;
use crate::driver::DriverFactory;
use crate::error::AppError;
use crate::hooks::{CollectionHooks, Hook, HookEvent};
use crate::plugin::CollectionPlugin;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Default page size when pagination is enabled without an explicit limit, and the list
/// limit used when pagination is disabled.
pub const DEFAULT_LIMIT: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[serde(alias = "varchar", alias = "string")]
    Text,
    #[serde(alias = "int", alias = "int4", alias = "serial")]
    Integer,
    #[serde(alias = "int8", alias = "bigserial")]
    BigInt,
    #[serde(alias = "float", alias = "float8", alias = "real")]
    Double,
    Numeric,
    #[serde(alias = "bool")]
    Boolean,
    Uuid,
    Timestamp,
    Timestamptz,
    Date,
    #[serde(alias = "json")]
    Jsonb,
}

impl ColumnType {
    /// PostgreSQL type name used for parameter casts.
    pub fn pg_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "int4",
            ColumnType::BigInt => "int8",
            ColumnType::Double => "float8",
            ColumnType::Numeric => "numeric",
            ColumnType::Boolean => "bool",
            ColumnType::Uuid => "uuid",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Timestamptz => "timestamptz",
            ColumnType::Date => "date",
            ColumnType::Jsonb => "jsonb",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::BigInt)
    }

    /// Parse an id taken from the request path into a typed JSON value.
    pub fn parse_id(&self, id: &str) -> Result<Value, AppError> {
        Ok(match self {
            t if t.is_integer() => {
                let n: i64 = id.parse().map_err(|_| AppError::BadRequest(format!("invalid id '{}'", id)))?;
                Value::Number(n.into())
            }
            ColumnType::Uuid => {
                let u = uuid::Uuid::parse_str(id).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
                Value::String(u.to_string())
            }
            _ => Value::String(id.to_string()),
        })
    }

    /// Coerce a form field (always text on the wire) into the column's JSON shape.
    /// Unparseable input stays a string so validation reports it against the field.
    pub fn coerce_form_value(&self, raw: &str) -> Value {
        match self {
            t if t.is_integer() => raw
                .trim()
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            ColumnType::Double => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            ColumnType::Boolean => match raw.trim().to_lowercase().as_str() {
                "true" | "on" | "1" => Value::Bool(true),
                "false" | "off" | "0" => Value::Bool(false),
                _ => Value::String(raw.to_string()),
            },
            ColumnType::Jsonb => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
            _ => Value::String(raw.to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Whether the database fills the column when omitted (serial, gen_random_uuid(), NOW()).
    #[serde(default)]
    pub has_default: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnSchema {
            name: name.into(),
            column_type,
            primary: false,
            nullable: true,
            has_default: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Required on insert: not null and not filled by the database.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default
    }
}

fn default_true() -> bool {
    true
}

/// Backing table of a collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// PostgreSQL namespace; `public` when absent.
    #[serde(default)]
    pub schema: Option<String>,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        TableSchema {
            name: name.into(),
            schema: None,
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.primary)
    }

    pub fn namespace(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }
}

/// `false` returns bare arrays; otherwise list responses are `{results, count}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pagination {
    #[default]
    Disabled,
    Enabled { default_limit: u32, max_limit: Option<u32> },
}

impl Pagination {
    pub fn limit(default_limit: u32) -> Self {
        Pagination::Enabled {
            default_limit,
            max_limit: None,
        }
    }

    pub fn bounded(default_limit: u32, max_limit: u32) -> Self {
        Pagination::Enabled {
            default_limit,
            max_limit: Some(max_limit),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Pagination::Enabled { .. })
    }

    pub fn max_limit(&self) -> Option<u32> {
        match self {
            Pagination::Enabled { max_limit, .. } => *max_limit,
            Pagination::Disabled => None,
        }
    }
}

impl Serialize for Pagination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Pagination::Disabled => serializer.serialize_bool(false),
            Pagination::Enabled {
                default_limit,
                max_limit,
            } => serde_json::json!({ "defaultLimit": default_limit, "maxLimit": max_limit }).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Pagination {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Value::deserialize(deserializer)?;
        match v {
            Value::Bool(false) | Value::Null => Ok(Pagination::Disabled),
            Value::Bool(true) => Ok(Pagination::limit(DEFAULT_LIMIT)),
            Value::Object(obj) => {
                let read = |key: &str| -> Result<Option<u32>, D::Error> {
                    match obj.get(key) {
                        None | Some(Value::Null) => Ok(None),
                        Some(n) => n
                            .as_u64()
                            .and_then(|n| u32::try_from(n).ok())
                            .map(Some)
                            .ok_or_else(|| {
                                serde::de::Error::custom(format!("pagination {} must be a non-negative integer", key))
                            }),
                    }
                };
                Ok(Pagination::Enabled {
                    default_limit: read("defaultLimit")?.unwrap_or(DEFAULT_LIMIT),
                    max_limit: read("maxLimit")?,
                })
            }
            other => Err(serde::de::Error::custom(format!(
                "pagination must be false, true or {{ \"defaultLimit\": n, \"maxLimit\": n }}; got {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Plain(String),
    Forms { singular: String, plural: String },
}

/// A column or form field shown by the admin UI: a bare name or a described entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    Name(String),
    Detailed {
        name: String,
        label: String,
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        field_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        required: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl FieldSpec {
    pub fn name(&self) -> &str {
        match self {
            FieldSpec::Name(n) => n,
            FieldSpec::Detailed { name, .. } => name,
        }
    }
}

impl From<&str> for FieldSpec {
    fn from(name: &str) -> Self {
        FieldSpec::Name(name.to_string())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDefinition {
    #[serde(default)]
    pub label: Option<Label>,
    #[serde(default)]
    pub columns: Vec<FieldSpec>,
    #[serde(default)]
    pub fields: Option<Vec<FieldSpec>>,
    /// `false` disables every action, including the built-in bulk delete.
    #[serde(default = "default_true")]
    pub actions: bool,
}

impl Default for AdminDefinition {
    fn default() -> Self {
        AdminDefinition {
            label: None,
            columns: Vec::new(),
            fields: None,
            actions: true,
        }
    }
}

/// Data-only part of a collection, loadable from JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub query_key: Option<String>,
    pub schema: TableSchema,
    #[serde(default)]
    pub default_sort: Option<String>,
    #[serde(default)]
    pub list_searchable_fields: Vec<String>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub admin: AdminDefinition,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

pub enum ActionsConfig<D> {
    Disabled,
    Enabled(Vec<CollectionAction<D>>),
}

pub struct AdminConfig<D> {
    pub label: Option<Label>,
    pub columns: Vec<FieldSpec>,
    pub fields: Option<Vec<FieldSpec>>,
    pub actions: ActionsConfig<D>,
}

impl<D> Default for AdminConfig<D> {
    fn default() -> Self {
        AdminConfig {
            label: None,
            columns: Vec::new(),
            fields: None,
            actions: ActionsConfig::Enabled(Vec::new()),
        }
    }
}

/// A collection as authored. Everything except `schema` is optional and defaulted by
/// [`crate::config::sanitize_collection`].
pub struct CollectionConfig<D> {
    pub slug: Option<String>,
    pub query_key: Option<String>,
    pub schema: TableSchema,
    pub access: Option<Access>,
    pub default_sort: Option<String>,
    pub list_searchable_fields: Vec<String>,
    pub admin: AdminConfig<D>,
    pub pagination: Pagination,
    pub hooks: CollectionHooks,
    pub plugins: Vec<Arc<dyn CollectionPlugin<D>>>,
    pub driver: Option<DriverFactory<D>>,
    pub validation: HashMap<String, ValidationRule>,
}

impl<D> CollectionConfig<D> {
    pub fn new(schema: TableSchema) -> Self {
        CollectionConfig {
            slug: None,
            query_key: None,
            schema,
            access: None,
            default_sort: None,
            list_searchable_fields: Vec::new(),
            admin: AdminConfig::default(),
            pagination: Pagination::Disabled,
            hooks: CollectionHooks::default(),
            plugins: Vec::new(),
            driver: None,
            validation: HashMap::new(),
        }
    }

    pub fn from_definition(def: CollectionDefinition) -> Self {
        let mut config = CollectionConfig::new(def.schema);
        config.slug = def.slug;
        config.query_key = def.query_key;
        config.default_sort = def.default_sort;
        config.list_searchable_fields = def.list_searchable_fields;
        config.pagination = def.pagination;
        config.validation = def.validation;
        config.admin = AdminConfig {
            label: def.admin.label,
            columns: def.admin.columns,
            fields: def.admin.fields,
            actions: if def.admin.actions {
                ActionsConfig::Enabled(Vec::new())
            } else {
                ActionsConfig::Disabled
            },
        };
        config
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn query_key(mut self, key: impl Into<String>) -> Self {
        self.query_key = Some(key.into());
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    pub fn default_sort(mut self, sort: impl Into<String>) -> Self {
        self.default_sort = Some(sort.into());
        self
    }

    pub fn searchable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.list_searchable_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn label(mut self, label: Label) -> Self {
        self.admin.label = Some(label);
        self
    }

    pub fn columns(mut self, columns: Vec<FieldSpec>) -> Self {
        self.admin.columns = columns;
        self
    }

    /// Restricts the writable fields; anything else in a request body is dropped.
    pub fn fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.admin.fields = Some(fields);
        self
    }

    pub fn action(mut self, action: CollectionAction<D>) -> Self {
        match &mut self.admin.actions {
            ActionsConfig::Enabled(actions) => actions.push(action),
            ActionsConfig::Disabled => self.admin.actions = ActionsConfig::Enabled(vec![action]),
        }
        self
    }

    pub fn disable_actions(mut self) -> Self {
        self.admin.actions = ActionsConfig::Disabled;
        self
    }

    pub fn hook(mut self, event: HookEvent, hook: Hook) -> Self {
        self.hooks.push(event, hook);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn CollectionPlugin<D>>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn driver(mut self, driver: DriverFactory<D>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn validation(mut self, field: impl Into<String>, rule: ValidationRule) -> Self {
        self.validation.insert(field.into(), rule);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_accepts_false_true_and_objects() {
        let p: Pagination = serde_json::from_value(serde_json::json!(false)).unwrap();
        assert_eq!(p, Pagination::Disabled);
        let p: Pagination = serde_json::from_value(serde_json::json!(true)).unwrap();
        assert_eq!(p, Pagination::limit(DEFAULT_LIMIT));
        let p: Pagination = serde_json::from_value(serde_json::json!({ "defaultLimit": 5, "maxLimit": 50 })).unwrap();
        assert_eq!(p, Pagination::bounded(5, 50));
        assert!(serde_json::from_value::<Pagination>(serde_json::json!({ "defaultLimit": -1 })).is_err());
    }

    #[test]
    fn definition_defaults_from_json() {
        let def: CollectionDefinition = serde_json::from_value(serde_json::json!({
            "schema": {
                "name": "todos",
                "columns": [
                    { "name": "id", "type": "serial", "primary": true, "has_default": true },
                    { "name": "message", "type": "text", "nullable": false }
                ]
            },
            "listSearchableFields": ["message"],
            "pagination": { "defaultLimit": 10 }
        }))
        .unwrap();
        assert!(def.admin.actions);
        assert_eq!(def.schema.columns[0].column_type, ColumnType::Integer);
        assert!(def.schema.columns[1].is_required());
        assert_eq!(def.pagination, Pagination::limit(10));
    }

    #[test]
    fn form_values_are_coerced_by_column_type() {
        assert_eq!(ColumnType::Integer.coerce_form_value("42"), serde_json::json!(42));
        assert_eq!(ColumnType::Boolean.coerce_form_value("on"), serde_json::json!(true));
        assert_eq!(ColumnType::Integer.coerce_form_value("x"), serde_json::json!("x"));
        assert_eq!(ColumnType::Text.coerce_form_value("7"), serde_json::json!("7"));
    }
}
