//! # Config Loader
//!
//! This module provides the `ConfigLoader` struct, which merges an ordered list of
//! configuration files into the single document the value resolver reads from.
//! Layers are merged in order; a later layer wins key by key, and nested tables are
//! merged recursively rather than replaced.
//!
//! Supported formats are chosen by extension: `.toml` is parsed with `toml`, anything
//! else as JSON.
use serde_json::{Map, Value};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not parse config file '{path}': {reason}")]
    Parse { path: String, reason: String },
    #[error("Config file '{path}' must contain a table at the top level")]
    NotATable { path: String },
}

/// Orchestrates the loading of configuration layers.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    layers: Vec<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer. Layers added later take precedence.
    pub fn layer(mut self, path: impl Into<PathBuf>) -> Self {
        self.layers.push(path.into());
        self
    }

    pub fn layers(&self) -> &[PathBuf] {
        &self.layers
    }

    /// Loads and merges every existing layer.
    ///
    /// Returns `Ok(None)` when no layer exists on disk. Missing files are skipped;
    /// unreadable or malformed files are errors.
    pub fn load(&self) -> Result<Option<Value>, ConfigError> {
        let mut merged: Option<Value> = None;

        for path in &self.layers {
            let Some(document) = load_document(path)? else {
                log::trace!("Config layer {} not found, skipping", path.display());
                continue;
            };
            log::debug!("Loaded config layer {}", path.display());
            match merged.as_mut() {
                Some(base) => deep_merge(base, document),
                None => merged = Some(document),
            }
        }

        Ok(merged)
    }
}

/// Reads a single configuration file. `Ok(None)` if it does not exist.
pub fn load_document(path: &Path) -> Result<Option<Value>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            });
        }
    };

    let parse_err = |reason: String| ConfigError::Parse {
        path: path.display().to_string(),
        reason,
    };

    let document: Value = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
        toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?
    } else {
        serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?
    };

    if !document.is_object() {
        return Err(ConfigError::NotATable {
            path: path.display().to_string(),
        });
    }
    Ok(Some(document))
}

/// Merges `overlay` into `base`. Objects merge recursively; any other value replaces.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            merge_maps(base_map, overlay_map);
        }
        (base, overlay) => *base = overlay,
    }
}

fn merge_maps(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

/// Looks up a dotted key path (`server.port`) in a configuration document.
pub fn get_by_dot_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.as_object()?.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_dot_path_lookup() {
        let doc = json!({ "serve": { "port": 8080 }, "host": "localhost" });
        assert_eq!(get_by_dot_path(&doc, "serve.port"), Some(&json!(8080)));
        assert_eq!(get_by_dot_path(&doc, "host"), Some(&json!("localhost")));
        assert_eq!(get_by_dot_path(&doc, "serve.missing"), None);
        assert_eq!(get_by_dot_path(&doc, "host.deeper"), None);
    }

    #[test]
    fn test_deep_merge_later_layer_wins() {
        let mut base = json!({ "serve": { "port": 3000, "host": "localhost" }, "tags": ["a"] });
        deep_merge(&mut base, json!({ "serve": { "port": 4000 }, "tags": ["b"] }));
        assert_eq!(
            base,
            json!({ "serve": { "port": 4000, "host": "localhost" }, "tags": ["b"] })
        );
    }

    #[test]
    fn test_load_merges_json_and_toml_layers() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.json");
        let local = dir.path().join("local.toml");
        fs::write(&global, r#"{ "serve": { "port": 3000, "host": "0.0.0.0" } }"#).unwrap();
        fs::write(&local, "[serve]\nport = 9000\n").unwrap();

        let loader = ConfigLoader::new()
            .layer(&global)
            .layer(dir.path().join("missing.json"))
            .layer(&local);
        let doc = loader.load().unwrap().unwrap();

        assert_eq!(get_by_dot_path(&doc, "serve.port"), Some(&json!(9000)));
        assert_eq!(get_by_dot_path(&doc, "serve.host"), Some(&json!("0.0.0.0")));
    }

    #[test]
    fn test_load_without_files_is_none() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new().layer(dir.path().join("nothing.json"));
        assert!(loader.load().unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ConfigLoader::new().layer(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_top_level_must_be_a_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            load_document(&path).unwrap_err(),
            ConfigError::NotATable { .. }
        ));
    }
}
