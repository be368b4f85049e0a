//! Hub-level routes: health and the collection metadata the admin UI reads.

use crate::action::ActionLevel;
use crate::config::{FieldSpec, Label, Pagination, SanitizedCollection};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub level: ActionLevel,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMeta {
    pub slug: String,
    pub label: Label,
    pub query_key: String,
    pub endpoint: String,
    pub columns: Vec<FieldSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldSpec>>,
    pub actions: Vec<ActionMeta>,
    pub pagination: Pagination,
    pub list_searchable_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_sort: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubMeta {
    pub server_url: String,
    pub collections: Vec<CollectionMeta>,
}

impl HubMeta {
    /// Collections are listed in declaration order.
    pub fn new<D>(server_url: &str, collections: &[SanitizedCollection<D>]) -> Self {
        HubMeta {
            server_url: server_url.to_string(),
            collections: collections
                .iter()
                .map(|c| CollectionMeta {
                    slug: c.slug.clone(),
                    label: c.admin.label.clone(),
                    query_key: c.query_key.clone(),
                    endpoint: format!("{}collections/{}", server_url, c.slug),
                    columns: c.admin.columns.clone(),
                    fields: c.admin.fields.clone(),
                    actions: c
                        .admin
                        .actions
                        .iter()
                        .map(|a| ActionMeta {
                            name: a.name.clone(),
                            label: a.label.clone(),
                            icon: a.icon.clone(),
                            level: a.level.clone(),
                        })
                        .collect(),
                    pagination: c.pagination,
                    list_searchable_fields: c.list_searchable_fields.clone(),
                    default_sort: c.default_sort.clone(),
                })
                .collect(),
        }
    }
}

async fn collections(State(meta): State<Arc<HubMeta>>) -> Json<HubMeta> {
    Json(meta.as_ref().clone())
}

/// GET /health, GET /collections.
pub fn meta_routes(meta: HubMeta) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/collections", get(collections))
        .with_state(Arc::new(meta))
}
