// src/core/paths.rs

use crate::constants::{COMMAND_FILE_EXTENSION, INDEX_FILE_NAME};
use anyhow::{Result, anyhow};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

lazy_static! {
    static ref DYNAMIC_DIR_RE: Regex = Regex::new(r"^\[.+\]$").unwrap();
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Commands directory '{path}' is not accessible: {source}")]
    CommandsDirNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the per-user configuration directory of a CLI (`~/.config/<cli_name>`).
/// The directory is not created.
pub fn get_user_config_dir(cli_name: &str) -> Result<PathBuf, PathError> {
    dirs::config_dir()
        .map(|dir| dir.join(cli_name))
        .ok_or(PathError::ConfigDirNotFound)
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a user-supplied path.
pub fn expand_path(template: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(template)
        .map_err(|e| anyhow!("Failed to expand path '{}': {}", template, e))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Canonicalizes the commands root so that traversed directories are absolute.
/// `dunce` keeps Windows paths free of the `\\?\` prefix.
pub fn canonical_commands_dir(dir: &Path) -> Result<PathBuf, PathError> {
    dunce::canonicalize(dir).map_err(|source| PathError::CommandsDirNotFound {
        path: dir.display().to_string(),
        source,
    })
}

/// The path segments of a definition file relative to the commands root, with the
/// extension stripped from the last one. `None` if the file is outside the root.
fn relative_segments(commands_dir: &Path, file: &Path) -> Option<Vec<String>> {
    let relative = file.strip_prefix(commands_dir).ok()?;
    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str().map(str::to_string),
            _ => None,
        })
        .collect();

    let last = segments.pop()?;
    let suffix = format!(".{}", COMMAND_FILE_EXTENSION);
    let stem = last.strip_suffix(&suffix).unwrap_or(&last).to_string();
    segments.push(stem);
    Some(segments)
}

/// Extracts the command path used for display and auto-naming.
///
/// `serve.toml` -> `["serve"]`, `config/index.toml` -> `["config"]`,
/// `remote/[name]/push.toml` -> `["remote", "push"]`.
pub fn extract_command_path(commands_dir: &Path, file: &Path) -> Vec<String> {
    relative_segments(commands_dir, file)
        .unwrap_or_default()
        .into_iter()
        .filter(|s| s != INDEX_FILE_NAME && !DYNAMIC_DIR_RE.is_match(s))
        .collect()
}

/// The default handler key of a definition file: its relative path without the
/// extension, `/`-separated (`remote/[name]/push`, `index`, `config/index`).
pub fn default_handler_key(commands_dir: &Path, file: &Path) -> String {
    relative_segments(commands_dir, file)
        .unwrap_or_default()
        .join("/")
}

/// The command path as shown in usage lines, with dynamic segments rendered as
/// placeholders (`remote/[name]/push.toml` -> `["remote", "<name>", "push"]`).
pub fn usage_segments(commands_dir: &Path, file: &Path) -> Vec<String> {
    relative_segments(commands_dir, file)
        .unwrap_or_default()
        .into_iter()
        .filter(|s| s != INDEX_FILE_NAME)
        .map(|s| match s.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            Some(param) if !param.is_empty() => format!("<{}>", param),
            _ => s,
        })
        .collect()
}
