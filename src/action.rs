//! Collection actions: named bulk operations over a list of items, exposed at
//! `POST /actions/{name}`.

use crate::config::SanitizedCollection;
use crate::driver::Driver;
use crate::error::AppError;
use crate::extractors::RequestContext;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub const BULK_DELETE: &str = "bulk_delete";
pub const MIN_ACTION_ITEMS: usize = 1;
pub const MAX_ACTION_ITEMS: usize = 100;

pub struct ActionArgs<D> {
    pub items: Vec<Value>,
    pub context: Arc<RequestContext>,
    pub db: D,
    pub collection: Arc<SanitizedCollection<D>>,
    pub driver: Arc<dyn Driver>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub index: usize,
    pub reason: String,
}

/// Returned to the caller when an action completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub processed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedItem>,
}

impl ActionReport {
    pub fn processed(processed: usize) -> Self {
        ActionReport {
            processed,
            skipped: Vec::new(),
        }
    }
}

/// Whether the admin UI asks for confirmation before running the action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionLevel {
    Plain(bool),
    Confirm { title: String, message: String },
}

type ActionFn<D> = dyn Fn(ActionArgs<D>) -> BoxFuture<'static, Result<ActionReport, AppError>> + Send + Sync;

pub struct CollectionAction<D> {
    pub name: String,
    pub label: Option<String>,
    pub icon: Option<String>,
    pub level: ActionLevel,
    handler: Arc<ActionFn<D>>,
}

impl<D> Clone for CollectionAction<D> {
    fn clone(&self) -> Self {
        CollectionAction {
            name: self.name.clone(),
            label: self.label.clone(),
            icon: self.icon.clone(),
            level: self.level.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<D> CollectionAction<D> {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActionArgs<D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionReport, AppError>> + Send + 'static,
    {
        CollectionAction {
            name: name.into(),
            label: None,
            icon: None,
            level: ActionLevel::Plain(false),
            handler: Arc::new(move |args| Box::pin(f(args))),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn level(mut self, level: ActionLevel) -> Self {
        self.level = level;
        self
    }

    pub async fn run(&self, args: ActionArgs<D>) -> Result<ActionReport, AppError> {
        (self.handler)(args).await
    }
}

/// Deletes every item by its query key in one batch. Items without the key are skipped
/// and listed in the report; the rest of the batch still runs.
pub fn bulk_delete_action<D>() -> CollectionAction<D>
where
    D: Send + Sync + 'static,
{
    CollectionAction::new(BULK_DELETE, |args: ActionArgs<D>| async move {
        let shape = args.collection.shape();
        let key = shape.query_key.as_str();
        let mut ids = Vec::with_capacity(args.items.len());
        let mut skipped = Vec::new();
        for (index, item) in args.items.iter().enumerate() {
            let Some(raw) = item.as_object().and_then(|o| o.get(key)).filter(|v| !v.is_null()) else {
                tracing::warn!(collection = %shape.slug, index, key = %key, "bulk delete item has no query key, skipping");
                skipped.push(SkippedItem {
                    index,
                    reason: format!("unable to find the query key '{}' in the given entry", key),
                });
                continue;
            };
            match shape.parse_key_value(raw) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    tracing::warn!(collection = %shape.slug, index, key = %key, error = %e, "bulk delete item has an invalid key, skipping");
                    skipped.push(SkippedItem {
                        index,
                        reason: format!("invalid value for the query key '{}'", key),
                    });
                }
            }
        }
        let processed = if ids.is_empty() {
            0
        } else {
            args.driver.delete_many(&ids).await? as usize
        };
        Ok(ActionReport { processed, skipped })
    })
    .label("Bulk Delete")
    .icon("TrashIcon")
    .level(ActionLevel::Plain(true))
}

#[derive(Deserialize)]
struct ActionBody {
    items: Vec<Value>,
}

/// Parse `{ "items": [...] }` holding 1 to 100 entries.
pub fn parse_action_items(body: &[u8]) -> Result<Vec<Value>, AppError> {
    let parsed: ActionBody = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("action body must be {{ \"items\": [...] }}: {}", e)))?;
    let n = parsed.items.len();
    if n < MIN_ACTION_ITEMS {
        return Err(AppError::BadRequest(format!(
            "items must contain at least {} element",
            MIN_ACTION_ITEMS
        )));
    }
    if n > MAX_ACTION_ITEMS {
        return Err(AppError::BadRequest(format!(
            "items must contain at most {} elements",
            MAX_ACTION_ITEMS
        )));
    }
    Ok(parsed.items)
}
