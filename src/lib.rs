//! HonoHub: collection definitions compiled into REST route groups over pluggable
//! storage drivers.

pub mod access;
pub mod action;
pub mod config;
pub mod driver;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod hub;
pub mod plugin;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;

pub use access::Access;
pub use action::{ActionArgs, ActionLevel, ActionReport, CollectionAction, SkippedItem, BULK_DELETE};
pub use config::{
    load_definitions, parse_definitions, sanitize_collection, CollectionConfig, CollectionDefinition, ColumnSchema,
    ColumnType, FieldSpec, Label, Pagination, SanitizedCollection, TableSchema, ValidationRule,
};
pub use driver::{
    Database, Driver, DriverFactory, ListQuery, ListResult, MemoryDriver, MemoryStore, PgDriver, Record, ReturningMode,
};
pub use error::{AppError, ConfigError, FieldError, PluginError};
pub use extractors::{Operation, RequestContext};
pub use hooks::{Hook, HookArgs, HookEvent};
pub use hub::{Hub, HubDefinition};
pub use plugin::{CollectionPlugin, HubPlugin, RequestLogger};
pub use settings::HubSettings;
