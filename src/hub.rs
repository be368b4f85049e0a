//! Hub assembler: sanitizes every collection, runs global plugins, and mounts the
//! compiled route groups into one application.

use crate::config::{check_sanitized, ensure_unique_slugs, sanitize_collection, CollectionConfig, SanitizedCollection};
use crate::driver::Database;
use crate::error::ConfigError;
use crate::plugin::{bootstrap_hub_plugins, register_hub_plugins, HubPlugin};
use crate::routes::{collection_routes, meta_routes, HubMeta};
use axum::Router;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;
pub const DEFAULT_SERVER_URL: &str = "/";

/// What global plugins see and may rewrite.
pub struct HubDefinition<D> {
    pub db: D,
    /// Base URL used for collection endpoints in metadata; always ends with `/`.
    pub server_url: String,
    pub collections: Vec<SanitizedCollection<D>>,
}

impl<D: Clone> Clone for HubDefinition<D> {
    fn clone(&self) -> Self {
        HubDefinition {
            db: self.db.clone(),
            server_url: self.server_url.clone(),
            collections: self.collections.clone(),
        }
    }
}

impl<D> HubDefinition<D> {
    /// Later declarations are mounted first.
    pub fn mount_order(&self) -> impl Iterator<Item = &SanitizedCollection<D>> {
        self.collections.iter().rev()
    }
}

pub struct Hub<D> {
    db: D,
    server_url: String,
    collections: Vec<CollectionConfig<D>>,
    plugins: Vec<Arc<dyn HubPlugin<D>>>,
    body_limit: usize,
}

impl<D: Database> Hub<D> {
    pub fn new(db: D) -> Self {
        Hub {
            db,
            server_url: DEFAULT_SERVER_URL.to_string(),
            collections: Vec::new(),
            plugins: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.server_url = url;
        self
    }

    pub fn collection(mut self, collection: CollectionConfig<D>) -> Self {
        self.collections.push(collection);
        self
    }

    pub fn collections(mut self, collections: impl IntoIterator<Item = CollectionConfig<D>>) -> Self {
        self.collections.extend(collections);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn HubPlugin<D>>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Sanitize collections and run global plugins' `register`. Every collection is checked
    /// again after plugins, which may rewrite or add collections.
    pub fn definition(&mut self) -> Result<HubDefinition<D>, ConfigError> {
        let collections = std::mem::take(&mut self.collections)
            .into_iter()
            .map(sanitize_collection)
            .collect::<Result<Vec<_>, _>>()?;
        let hub = HubDefinition {
            db: self.db.clone(),
            server_url: self.server_url.clone(),
            collections,
        };
        let hub = register_hub_plugins(hub, &self.plugins);
        for c in &hub.collections {
            check_sanitized(c)?;
        }
        ensure_unique_slugs(hub.collections.iter().map(|c| c.slug.as_str()))?;
        Ok(hub)
    }

    pub fn build(mut self) -> Result<Router, ConfigError> {
        let hub = self.definition()?;

        let mut app = Router::new();
        for collection in hub.mount_order() {
            let driver = collection.driver.build(&hub.db, collection);
            let path = format!("/collections/{}", collection.slug);
            tracing::info!(collection = %collection.slug, path = %path, returning = ?driver.returning(), "mounting collection");
            app = app.nest(&path, collection_routes(Arc::new(collection.clone()), driver, hub.db.clone()));
        }
        app = app.merge(meta_routes(HubMeta::new(&hub.server_url, &hub.collections)));

        let app = bootstrap_hub_plugins(app, &hub, &self.plugins);
        tracing::info!(
            collections = hub.collections.len(),
            plugins = self.plugins.len(),
            body_limit = self.body_limit,
            "hub assembled"
        );
        Ok(app.layer(RequestBodyLimitLayer::new(self.body_limit)))
    }
}
