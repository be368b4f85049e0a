//! Load collection definitions from a JSON file.

use crate::config::CollectionDefinition;
use crate::error::ConfigError;
use std::path::Path;

/// Parse a JSON array of collection definitions.
pub fn parse_definitions(json: &str) -> Result<Vec<CollectionDefinition>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read a JSON array of collection definitions from `path`.
pub async fn load_definitions(path: impl AsRef<Path>) -> Result<Vec<CollectionDefinition>, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let definitions = parse_definitions(&raw)?;
    tracing::debug!(path = %path.display(), count = definitions.len(), "collection definitions loaded");
    Ok(definitions)
}
