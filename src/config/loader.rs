//! Load resource documents from JSON text or files.

use std::path::Path;

use crate::config::{validate, ResourceConfig};
use crate::error::ConfigError;

/// Parse and validate a resource document.
pub fn load_from_str(text: &str) -> Result<ResourceConfig, ConfigError> {
    let config: ResourceConfig =
        serde_json::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))?;
    validate(&config)?;
    Ok(config)
}

/// Read, parse and validate a resource document from disk.
pub async fn load_file(path: impl AsRef<Path>) -> Result<ResourceConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading resource");
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&text)
}
