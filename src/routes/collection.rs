//! Compiles one sanitized collection into its route group.

use crate::config::SanitizedCollection;
use crate::driver::{Database, Driver};
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::handlers::collection::{count, create, delete, list, retrieve, run_action, update};
use crate::plugin::bootstrap_collection_plugins;
use crate::state::CollectionState;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Rejects the request before any hook or driver call when `access` says no.
async fn access_gate<D: Database>(
    State(state): State<CollectionState<D>>,
    ctx: RequestContext,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let operation = ctx.infer_operation();
    let ctx = match operation {
        Some(op) => ctx.with_operation(op),
        None => ctx,
    };
    if !state.collection.access.check(Arc::new(ctx)).await {
        tracing::debug!(collection = %state.collection.slug, operation = ?operation, "access denied");
        return Err(AppError::AccessDenied);
    }
    Ok(next.run(req).await)
}

/// Routes are relative to the collection mount point (`/collections/{slug}`).
pub fn collection_routes<D: Database>(collection: Arc<SanitizedCollection<D>>, driver: Arc<dyn Driver>, db: D) -> Router {
    let state = CollectionState {
        collection: collection.clone(),
        driver,
        db,
    };

    let mut router = Router::new()
        .route("/", get(list::<D>).post(create::<D>))
        .route("/count", get(count::<D>))
        .route("/:id", get(retrieve::<D>).put(update::<D>).delete(delete::<D>));
    if !collection.admin.actions.is_empty() {
        router = router.route("/actions/:name", post(run_action::<D>));
    }

    let router = router
        .route_layer(middleware::from_fn_with_state(state.clone(), access_gate::<D>))
        .with_state(state);

    tracing::info!(
        collection = %collection.slug,
        actions = ?collection.action_names(),
        "collection routes compiled"
    );
    bootstrap_collection_plugins(router, &collection)
}
