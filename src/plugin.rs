//! Collection and hub plugins.
//!
//! Plugins are third-party extension points and run best-effort: a plugin that fails in
//! `register` or `bootstrap` is logged and skipped, and the pipeline continues with the
//! value it had before that plugin ran.

use crate::config::SanitizedCollection;
use crate::error::PluginError;
use crate::hub::HubDefinition;
use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::sync::Arc;
use std::time::Instant;

pub trait CollectionPlugin<D>: Send + Sync {
    fn name(&self) -> &str;

    /// Rewrite the sanitized collection. `Ok(None)` leaves it unchanged.
    fn register(&self, _collection: &SanitizedCollection<D>) -> Result<Option<SanitizedCollection<D>>, PluginError> {
        Ok(None)
    }

    /// Wrap or replace the collection's compiled router.
    fn bootstrap(&self, app: Router, _collection: &SanitizedCollection<D>) -> Result<Router, PluginError> {
        Ok(app)
    }
}

pub trait HubPlugin<D>: Send + Sync {
    fn name(&self) -> &str;

    fn register(&self, _hub: &HubDefinition<D>) -> Result<Option<HubDefinition<D>>, PluginError> {
        Ok(None)
    }

    /// Wrap or replace the whole hub application.
    fn bootstrap(&self, app: Router, _hub: &HubDefinition<D>) -> Result<Router, PluginError> {
        Ok(app)
    }
}

fn best_effort<T>(
    current: T,
    plugin: &str,
    stage: &'static str,
    f: impl FnOnce(&T) -> Result<Option<T>, PluginError>,
) -> T {
    match f(&current) {
        Ok(Some(next)) => next,
        Ok(None) => current,
        Err(e) => {
            tracing::error!(plugin = %plugin, stage, error = %e, "plugin failed, keeping previous state");
            current
        }
    }
}

/// Thread the collection through each plugin's `register` in declared order.
pub(crate) fn register_collection_plugins<D>(collection: SanitizedCollection<D>) -> SanitizedCollection<D> {
    let plugins = collection.plugins.clone();
    plugins.iter().fold(collection, |current, plugin| {
        best_effort(current, plugin.name(), "register", |c| plugin.register(c))
    })
}

pub(crate) fn bootstrap_collection_plugins<D>(app: Router, collection: &SanitizedCollection<D>) -> Router {
    collection.plugins.iter().fold(app, |current, plugin| {
        best_effort(current, plugin.name(), "bootstrap", |app| {
            plugin.bootstrap(app.clone(), collection).map(Some)
        })
    })
}

pub(crate) fn register_hub_plugins<D>(hub: HubDefinition<D>, plugins: &[Arc<dyn HubPlugin<D>>]) -> HubDefinition<D> {
    plugins.iter().fold(hub, |current, plugin| {
        best_effort(current, plugin.name(), "register", |h| plugin.register(h))
    })
}

pub(crate) fn bootstrap_hub_plugins<D>(app: Router, hub: &HubDefinition<D>, plugins: &[Arc<dyn HubPlugin<D>>]) -> Router {
    plugins.iter().fold(app, |current, plugin| {
        best_effort(current, plugin.name(), "bootstrap", |app| {
            plugin.bootstrap(app.clone(), hub).map(Some)
        })
    })
}

/// Logs method, path, status and latency of every request.
pub struct RequestLogger;

impl<D> HubPlugin<D> for RequestLogger {
    fn name(&self) -> &str {
        "request-logger"
    }

    fn bootstrap(&self, app: Router, _hub: &HubDefinition<D>) -> Result<Router, PluginError> {
        Ok(app.layer(middleware::from_fn(log_request)))
    }
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();
    let res = next.run(req).await;
    tracing::info!(
        %method,
        %uri,
        status = res.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    res
}
