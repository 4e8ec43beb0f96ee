// src/core/router.rs

//! # Router
//!
//! Resolves an invocation to a command definition file by walking the commands
//! directory one token at a time. At each level a token may match, in priority order:
//!
//! 1. a command file `<token>.toml` (terminal match),
//! 2. a subdirectory named `<token>` (descend),
//! 3. the single `[param]` subdirectory of that level (capture and descend).
//!
//! Traversal stops at the first token that looks like a flag or matches nothing.
//! The directory reached then either provides an `index.toml` or the route is
//! unresolved and reports what is available there.

use crate::constants::{COMMAND_FILE_EXTENSION, INDEX_FILE_NAME, INTERNAL_PREFIX};
use lazy_static::lazy_static;
use regex::Regex;
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

lazy_static! {
    static ref DYNAMIC_SEGMENT_RE: Regex = Regex::new(r"^\[(.+)\]$").unwrap();
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Could not read command directory '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Ambiguous command tree at '{dir}': only one dynamic segment is allowed per directory, found {names}")]
    AmbiguousDynamicSegments { dir: String, names: String },
}

/// Something a user can type at the point where routing stopped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RouteEntry {
    /// A command file (`serve.toml` -> `serve`).
    Command(String),
    /// A command group directory.
    Group(String),
    /// A `[param]` directory capturing any token into `param`.
    Dynamic { param: String },
}

/// A successfully matched command definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub file: PathBuf,
    /// Dynamic segment name -> captured token.
    pub params: BTreeMap<String, String>,
    /// Tokens not consumed by routing, handed to the parser.
    pub remaining: Vec<String>,
    /// Directories visited, root first.
    pub traversed: Vec<PathBuf>,
}

/// Routing stopped before reaching a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRoute {
    pub dir: PathBuf,
    pub entries: Vec<RouteEntry>,
    /// Tokens consumed before stopping.
    pub consumed: Vec<String>,
    /// The token that matched nothing, if traversal stopped on one.
    pub unmatched: Option<String>,
}

impl UnresolvedRoute {
    /// True when nothing was consumed, i.e. routing stopped at the commands root.
    pub fn is_root(&self) -> bool {
        self.consumed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResult {
    Resolved(ResolvedRoute),
    Unresolved(UnresolvedRoute),
}

/// The routable content of one directory.
#[derive(Debug, Default)]
struct DirListing {
    commands: Vec<String>,
    groups: Vec<String>,
    /// `(directory name, parameter name)`
    dynamic: Option<(String, String)>,
}

impl DirListing {
    fn read(dir: &Path) -> Result<Self, RouteError> {
        let io_err = |source: io::Error| RouteError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut listing = Self::default();
        let mut dynamic = Vec::new();

        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                log::trace!("Skipping non UTF-8 entry in {}", dir.display());
                continue;
            };
            if name.starts_with(INTERNAL_PREFIX) {
                continue;
            }

            // `fs::metadata` follows symlinks, so linked commands route like real ones.
            let path = entry.path();
            let metadata = fs::metadata(&path).map_err(|source| RouteError::Io {
                path: path.display().to_string(),
                source,
            })?;

            if metadata.is_file() {
                if let Some(stem) = command_stem(&path) {
                    listing.commands.push(stem);
                }
            } else if metadata.is_dir() {
                match DYNAMIC_SEGMENT_RE.captures(&name).and_then(|c| c.get(1)) {
                    Some(param) => dynamic.push((name.clone(), param.as_str().to_string())),
                    None => listing.groups.push(name),
                }
            }
        }

        if dynamic.len() > 1 {
            let mut names: Vec<_> = dynamic.into_iter().map(|(dir_name, _)| dir_name).collect();
            names.sort();
            return Err(RouteError::AmbiguousDynamicSegments {
                dir: dir.display().to_string(),
                names: names.join(", "),
            });
        }

        listing.commands.sort();
        listing.groups.sort();
        listing.dynamic = dynamic.pop();
        Ok(listing)
    }

    fn has_command(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c == name)
    }

    fn has_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g == name)
    }

    fn into_entries(self) -> Vec<RouteEntry> {
        let mut entries: Vec<RouteEntry> = self
            .commands
            .into_iter()
            .filter(|c| c != INDEX_FILE_NAME)
            .map(RouteEntry::Command)
            .chain(self.groups.into_iter().map(RouteEntry::Group))
            .collect();
        entries.sort_by(|a, b| entry_sort_key(a).cmp(entry_sort_key(b)));
        if let Some((_, param)) = self.dynamic {
            entries.push(RouteEntry::Dynamic { param });
        }
        entries
    }
}

fn entry_sort_key(entry: &RouteEntry) -> &str {
    match entry {
        RouteEntry::Command(name) | RouteEntry::Group(name) => name,
        RouteEntry::Dynamic { param } => param,
    }
}

/// Returns the command name of a definition file (`serve.toml` -> `serve`).
fn command_stem(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(COMMAND_FILE_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

fn command_file_name(name: &str) -> String {
    format!("{}.{}", name, COMMAND_FILE_EXTENSION)
}

/// Resolves `tokens` against the command tree rooted at `root`.
///
/// Returns `Unresolved` (not an error) when no command matches. Errors are reserved
/// for a broken tree: unreadable directories and ambiguous dynamic segments.
pub fn resolve(root: &Path, tokens: &[String]) -> Result<RouteResult, RouteError> {
    let mut current_dir = root.to_path_buf();
    let mut traversed = vec![current_dir.clone()];
    let mut params = BTreeMap::new();
    let mut consumed = 0;
    let mut unmatched = None;
    let mut listing: Option<DirListing> = None;

    for (i, token) in tokens.iter().enumerate() {
        if token.starts_with('-') {
            log::debug!("Routing stopped at flag '{}'", token);
            break;
        }

        let current = DirListing::read(&current_dir)?;

        // 1. A command file wins over everything else.
        if current.has_command(token) {
            let file = current_dir.join(command_file_name(token));
            log::debug!("Routed to {}", file.display());
            return Ok(RouteResult::Resolved(ResolvedRoute {
                file,
                params,
                remaining: tokens.iter().skip(i + 1).cloned().collect(),
                traversed,
            }));
        }

        // 2. Static directories shadow the dynamic one.
        if current.has_group(token) {
            current_dir = current_dir.join(token);
        } else if let Some((dir_name, param)) = &current.dynamic {
            // 3. The dynamic segment captures anything else.
            log::trace!("Captured '{}' into [{}]", token, param);
            params.insert(param.clone(), token.clone());
            current_dir = current_dir.join(dir_name);
        } else {
            unmatched = Some(token.clone());
            listing = Some(current);
            break;
        }

        traversed.push(current_dir.clone());
        consumed = i + 1;
    }

    let listing = match listing {
        Some(listing) => listing,
        None => DirListing::read(&current_dir)?,
    };

    if listing.has_command(INDEX_FILE_NAME) {
        let file = current_dir.join(command_file_name(INDEX_FILE_NAME));
        log::debug!("Routed to directory index {}", file.display());
        return Ok(RouteResult::Resolved(ResolvedRoute {
            file,
            params,
            remaining: tokens.iter().skip(consumed).cloned().collect(),
            traversed,
        }));
    }

    log::debug!("No command found in {}", current_dir.display());
    Ok(RouteResult::Unresolved(UnresolvedRoute {
        dir: current_dir,
        entries: listing.into_entries(),
        consumed: tokens.iter().take(consumed).cloned().collect(),
        unmatched,
    }))
}
