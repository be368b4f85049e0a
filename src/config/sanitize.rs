//! Turns an authored [`CollectionConfig`] into a [`SanitizedCollection`].

use crate::action::bulk_delete_action;
use crate::config::{
    resolve_query_key, validate_pagination, validate_slug, ActionsConfig, CollectionConfig, Label,
    SanitizedAdmin, SanitizedCollection,
};
use crate::driver::Database;
use crate::error::ConfigError;
use crate::plugin::register_collection_plugins;

/// Default every optional field, validate the result, then run collection plugins'
/// `register` in order.
pub fn sanitize_collection<D: Database>(config: CollectionConfig<D>) -> Result<SanitizedCollection<D>, ConfigError> {
    let CollectionConfig {
        slug,
        query_key,
        schema,
        access,
        default_sort,
        list_searchable_fields,
        admin,
        pagination,
        hooks,
        plugins,
        driver,
        validation,
    } = config;

    let query_key = resolve_query_key(&schema, query_key.as_deref())?;
    let slug = slug.unwrap_or_else(|| schema.name.clone());
    validate_slug(&slug)?;
    validate_pagination(&slug, &pagination)?;

    let actions = match admin.actions {
        ActionsConfig::Disabled => Vec::new(),
        ActionsConfig::Enabled(user_actions) => {
            let mut actions = Vec::with_capacity(user_actions.len() + 1);
            actions.push(bulk_delete_action());
            actions.extend(user_actions);
            actions
        }
    };

    let sanitized = SanitizedCollection {
        admin: SanitizedAdmin {
            label: admin.label.unwrap_or_else(|| Label::Plain(slug.clone())),
            columns: admin.columns,
            fields: admin.fields,
            actions,
        },
        slug,
        schema,
        query_key,
        access: access.unwrap_or_default(),
        default_sort,
        list_searchable_fields,
        pagination,
        hooks,
        plugins,
        driver: driver.unwrap_or_else(D::default_driver),
        validation,
    };
    tracing::debug!(collection = %sanitized.slug, query_key = %sanitized.query_key, "collection sanitized");
    let sanitized = register_collection_plugins(sanitized);
    check_sanitized(&sanitized)?;
    Ok(sanitized)
}

/// Re-check what sanitizing guarantees. Plugins return whole collections, so anything
/// they rewrite is checked again.
pub fn check_sanitized<D>(collection: &SanitizedCollection<D>) -> Result<(), ConfigError> {
    validate_slug(&collection.slug)?;
    validate_pagination(&collection.slug, &collection.pagination)?;
    if collection.schema.column(&collection.query_key).is_none() {
        return Err(ConfigError::UnknownQueryKey {
            slug: collection.slug.clone(),
            key: collection.query_key.clone(),
        });
    }
    Ok(())
}
