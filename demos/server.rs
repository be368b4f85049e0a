//! Demo server: loads collection definitions from JSON and serves them over PostgreSQL.
//!
//! Run: `cargo run --example server` with `DATABASE_URL` pointing at a database that
//! already has the tables named in `HONOHUB_COLLECTIONS` (default `demos/collections.json`).

use honohub::{load_definitions, Access, CollectionConfig, Hook, HookEvent, Hub, HubSettings, RequestLogger};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("honohub=info")),
        )
        .init();

    let mut settings = HubSettings::from_env()?;
    if std::env::var("HONOHUB_COLLECTIONS").is_err() {
        settings.collections_path = "demos/collections.json".into();
    }
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let definitions = load_definitions(&settings.collections_path).await?;
    let collections = definitions.into_iter().map(|def| {
        let config = CollectionConfig::from_definition(def);
        if config.schema.name == "users" {
            config.access(Access::require_header("x-admin-token", "demo"))
        } else {
            config.hook(
                HookEvent::AfterChange,
                Hook::observe(|args| async move {
                    tracing::info!(doc = %args.data, "todo changed");
                    Ok(())
                }),
            )
        }
    });

    let app = Hub::new(pool)
        .server_url(settings.server_url.clone())
        .collections(collections)
        .plugin(Arc::new(RequestLogger))
        .body_limit(settings.body_limit)
        .build()?;

    let listener = TcpListener::bind(&settings.bind).await?;
    tracing::info!("honohub listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
