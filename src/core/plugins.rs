// src/core/plugins.rs

//! # Plugin Composer
//!
//! Plugins live next to the commands they apply to: every directory the router walked
//! through may hold a `_plugins/` folder of descriptor files. A descriptor names a setup
//! function registered on the application; the setup returns the capabilities it
//! provides and, optionally, a middleware.
//!
//! Discovery order is root to leaf, then file name within a directory. Capabilities are
//! merged in that order (last writer wins) and middlewares are layered in that order,
//! so plugins closer to the root wrap the ones deeper in the tree.

use crate::{
    constants::{COMMAND_FILE_EXTENSION, PLUGINS_DIR_NAME},
    core::{
        middleware::{Extensions, Middleware},
        value_resolver::Env,
    },
    models::PluginDescriptor,
};
use anyhow::Result;
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Could not list plugins in '{path}': {source}")]
    List {
        path: String,
        #[source]
        source: walkdir::Error,
    },
    #[error("Could not read plugin '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not parse plugin '{path}': {reason}")]
    Parse { path: String, reason: String },
    #[error("Plugin '{path}' does not declare a `setup` entry point")]
    MissingSetup { path: String },
    #[error("Plugin '{path}' refers to setup '{name}', which is not registered")]
    UnknownSetup { path: String, name: String },
    #[error("Plugin '{path}' failed during setup: {source}")]
    Setup {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

/// What a plugin setup function receives.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub cli_name: String,
    /// The descriptor's `[options]` table, `null` when absent.
    pub options: Value,
    /// The descriptor file this setup was loaded from.
    pub source: PathBuf,
    /// The environment snapshot of the invocation.
    pub env: Env,
}

/// What a plugin contributes to an invocation.
#[derive(Default)]
pub struct PluginConfig {
    pub provide: Option<Extensions>,
    pub middleware: Option<Middleware>,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(mut self, extensions: Extensions) -> Self {
        self.provide = Some(extensions);
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware = Some(middleware);
        self
    }
}

impl fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginConfig")
            .field("provide", &self.provide)
            .field("middleware", &self.middleware.is_some())
            .finish()
    }
}

/// A plugin entry point.
pub type PluginSetup = Arc<dyn Fn(&PluginContext) -> Result<PluginConfig> + Send + Sync>;

/// Setup functions by the name descriptors refer to them with.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    setups: HashMap<String, PluginSetup>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, setup: F)
    where
        F: Fn(&PluginContext) -> Result<PluginConfig> + Send + Sync + 'static,
    {
        self.setups.insert(name.into(), Arc::new(setup));
    }

    pub fn get(&self, name: &str) -> Option<&PluginSetup> {
        self.setups.get(name)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.setups.keys().collect();
        names.sort();
        f.debug_struct("PluginRegistry").field("setups", &names).finish()
    }
}

/// The accumulated result of every plugin applying to one invocation.
#[derive(Default)]
pub struct ResolvedPlugins {
    pub extensions: Extensions,
    /// In discovery order; the first one is the outermost layer.
    pub middlewares: Vec<Middleware>,
    /// Descriptor files that were loaded, in discovery order.
    pub loaded: Vec<PathBuf>,
}

impl fmt::Debug for ResolvedPlugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPlugins")
            .field("extensions", &self.extensions)
            .field("middlewares", &self.middlewares.len())
            .field("loaded", &self.loaded)
            .finish()
    }
}

/// Lists the descriptor files of a `_plugins` directory, sorted by file name.
fn list_descriptors(plugins_dir: &Path) -> Result<Vec<PathBuf>, PluginError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(plugins_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|source| PluginError::List {
            path: plugins_dir.display().to_string(),
            source,
        })?;
        let is_descriptor = entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(COMMAND_FILE_EXTENSION);
        if is_descriptor {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_descriptor(path: &Path) -> Result<PluginDescriptor, PluginError> {
    let content = fs::read_to_string(path).map_err(|source| PluginError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|e| PluginError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Discovers, sets up and accumulates every plugin along the traversed directories.
pub fn scan_plugins(
    traversed: &[PathBuf],
    cli_name: &str,
    env: &Env,
    registry: &PluginRegistry,
) -> Result<ResolvedPlugins, PluginError> {
    let mut resolved = ResolvedPlugins::default();

    for dir in traversed {
        let plugins_dir = dir.join(PLUGINS_DIR_NAME);
        if !plugins_dir.is_dir() {
            continue;
        }

        for path in list_descriptors(&plugins_dir)? {
            let descriptor = read_descriptor(&path)?;
            let display = path.display().to_string();

            let name = descriptor
                .setup
                .ok_or_else(|| PluginError::MissingSetup {
                    path: display.clone(),
                })?;
            let setup = registry
                .get(&name)
                .ok_or_else(|| PluginError::UnknownSetup {
                    path: display.clone(),
                    name: name.clone(),
                })?;

            let context = PluginContext {
                cli_name: cli_name.to_string(),
                options: descriptor.options.unwrap_or(Value::Null),
                source: path.clone(),
                env: env.clone(),
            };
            let config = setup(&context).map_err(|source| PluginError::Setup {
                path: display,
                source,
            })?;

            log::debug!(
                "Loaded plugin '{}' from {} (provides: {}, middleware: {})",
                name,
                path.display(),
                config.provide.as_ref().map_or(0, Extensions::len),
                config.middleware.is_some()
            );

            if let Some(provide) = config.provide {
                resolved.extensions.merge(provide);
            }
            if let Some(middleware) = config.middleware {
                resolved.middlewares.push(middleware);
            }
            resolved.loaded.push(path);
        }
    }

    Ok(resolved)
}
