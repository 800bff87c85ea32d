use arcturus_core::{ArcturusError, Result, StyleEntry, TileserverConfig};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Parse tileserver-rs TOML text. Blank input yields an empty config.
pub fn parse_tileserver_config(input: &str) -> Result<TileserverConfig> {
    if input.trim().is_empty() {
        return Ok(TileserverConfig::default());
    }

    toml::from_str(input).map_err(|e| ArcturusError::InvalidConfig(e.to_string()))
}

/// Read and parse the tileserver-rs config at `config_path`
pub fn load_tileserver_config(config_path: &Path) -> Result<TileserverConfig> {
    if !config_path.exists() {
        return Err(ArcturusError::ConfigNotFound(config_path.to_path_buf()));
    }

    let raw_text = fs::read_to_string(config_path)?;
    parse_tileserver_config(&raw_text)
}

pub fn list_sources(config: &TileserverConfig) -> &[Value] {
    &config.sources
}

pub fn list_maps(config: &TileserverConfig) -> &[StyleEntry] {
    &config.styles
}

/// Resolve a style path relative to the directory holding the config file
fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    base.join(path)
}

/// Load the style JSON document for `map_id`
pub fn load_map_style(
    config_path: &Path,
    config: &TileserverConfig,
    map_id: &str,
) -> Result<Value> {
    let style = list_maps(config)
        .iter()
        .find(|style| style.id.as_deref() == Some(map_id))
        .ok_or_else(|| ArcturusError::MapNotFound(map_id.to_string()))?;

    let path_value = style
        .path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            ArcturusError::StyleNotFound(format!("Style path missing for map id: {}", map_id))
        })?;

    let style_path = resolve_path(config_path, path_value);
    if !style_path.exists() {
        return Err(ArcturusError::StyleNotFound(format!(
            "Style file not found: {}",
            style_path.display()
        )));
    }

    let raw_text = fs::read_to_string(&style_path)?;
    serde_json::from_str(&raw_text).map_err(|e| {
        ArcturusError::InvalidStyle(format!("{}: {}", style_path.display(), e))
    })
}
