// src/cli/help.rs

//! Renders the two kinds of built-in output: the help page of a resolved command and
//! the listing of what is available where routing stopped.

use crate::{
    constants::{COMMAND_FILE_EXTENSION, INDEX_FILE_NAME},
    core::{
        auto_naming::derive_env_name,
        command_loader::load_definition,
        router::{RouteEntry, UnresolvedRoute},
    },
    models::{ArgumentDeclaration, CommandDefinition},
};
use colored::*;
use serde_json::Value;
use std::{fmt::Write as _, path::Path};

/// What the help page of a command needs besides its definition.
#[derive(Debug, Clone, Copy)]
pub struct HelpContext<'a> {
    pub program: &'a str,
    /// Usage path with dynamic segments as placeholders (`remote <name> push`).
    pub usage_path: &'a [String],
    /// Display path used for derived env names.
    pub command_path: &'a [String],
    pub env_prefix: Option<&'a str>,
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn positional_placeholder(decl: &ArgumentDeclaration) -> String {
    let dots = if decl.multiple { "..." } else { "" };
    if decl.optional || decl.default.is_some() {
        format!("[{}{}]", decl.name, dots)
    } else {
        format!("<{}{}>", decl.name, dots)
    }
}

/// The left column of an option row: `-p, --port <port>`.
fn option_signature(decl: &ArgumentDeclaration) -> String {
    let short = match &decl.alias {
        Some(alias) => format!("-{}, ", alias),
        None => "    ".to_string(),
    };
    if decl.is_boolean() {
        format!("{}--{}", short, decl.name)
    } else {
        format!("{}--{} <{}>", short, decl.name, decl.name)
    }
}

/// Description plus the `(env: X, default: Y)` and choices hints.
fn option_details(decl: &ArgumentDeclaration, ctx: &HelpContext<'_>) -> String {
    let mut hints = Vec::new();
    let env_name = match (&decl.env, ctx.env_prefix) {
        (Some(explicit), _) => Some(explicit.clone()),
        (None, Some(prefix)) => Some(derive_env_name(prefix, ctx.command_path, &decl.name)),
        (None, None) => None,
    };
    if let Some(env_name) = env_name {
        hints.push(format!("env: {}", env_name));
    }
    if let Some(default) = &decl.default {
        hints.push(format!("default: {}", display_value(default)));
    }

    let mut details = decl.description.clone();
    if !hints.is_empty() {
        if !details.is_empty() {
            details.push(' ');
        }
        details.push_str(&format!("({})", hints.join(", ")));
    }
    if let Some(choices) = &decl.choices {
        if !details.is_empty() {
            details.push(' ');
        }
        details.push_str(&format!("[possible values: {}]", choices.join(", ")));
    }
    details
}

/// Writes aligned two-column rows. Padding is applied before coloring.
fn write_rows(buf: &mut String, rows: &[(String, String)]) {
    let width = rows.iter().map(|(left, _)| left.len()).max().unwrap_or(0);
    for (left, right) in rows {
        let padded = format!("{:<width$}", left, width = width);
        let line = format!("  {}  {}", padded.cyan(), right);
        let _ = writeln!(buf, "{}", line.trim_end());
    }
}

/// Renders the help page of a resolved command.
pub fn render_command_help(definition: &CommandDefinition, ctx: &HelpContext<'_>) -> String {
    let mut buf = String::new();

    let positionals: Vec<&ArgumentDeclaration> =
        definition.args.iter().filter(|d| d.positional).collect();

    let mut usage = vec![ctx.program.to_string()];
    usage.extend(ctx.usage_path.iter().cloned());
    usage.extend(positionals.iter().map(|d| positional_placeholder(d)));
    usage.push("[options]".to_string());
    let _ = writeln!(buf, "{} {}", "Usage:".yellow().bold(), usage.join(" "));

    if let Some(description) = definition.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(buf, "\n{}", description);
    }

    if !positionals.is_empty() {
        let _ = writeln!(buf, "\n{}", "Arguments:".yellow().bold());
        let rows: Vec<(String, String)> = positionals
            .iter()
            .map(|d| (positional_placeholder(d), option_details(d, ctx)))
            .collect();
        write_rows(&mut buf, &rows);
    }

    let _ = writeln!(buf, "\n{}", "Options:".yellow().bold());
    let mut rows: Vec<(String, String)> = definition
        .args
        .iter()
        .map(|d| (option_signature(d), option_details(d, ctx)))
        .collect();
    rows.push(("-h, --help".to_string(), "Print help".to_string()));
    write_rows(&mut buf, &rows);

    buf
}

/// A short description for a listed entry, read from its definition when it has one.
fn entry_description(dir: &Path, entry: &RouteEntry) -> Option<String> {
    let file = match entry {
        RouteEntry::Command(name) => dir.join(format!("{}.{}", name, COMMAND_FILE_EXTENSION)),
        RouteEntry::Group(name) => dir
            .join(name)
            .join(format!("{}.{}", INDEX_FILE_NAME, COMMAND_FILE_EXTENSION)),
        RouteEntry::Dynamic { .. } => return None,
    };
    if !file.is_file() {
        return None;
    }
    match load_definition(&file) {
        Ok(definition) => definition.description,
        Err(e) => {
            log::debug!("Skipping description of {}: {}", file.display(), e);
            None
        }
    }
}

/// Renders what can be typed where routing stopped.
pub fn render_available(program: &str, route: &UnresolvedRoute) -> String {
    let mut buf = String::new();

    if let Some(token) = &route.unmatched {
        let _ = writeln!(buf, "{} '{}'\n", "Unknown command:".red().bold(), token);
    }

    let mut usage = vec![program.to_string()];
    usage.extend(route.consumed.iter().cloned());
    usage.push("<command>".to_string());
    let _ = writeln!(buf, "{} {}", "Usage:".yellow().bold(), usage.join(" "));

    if route.entries.is_empty() {
        let _ = writeln!(buf, "\n{}", "No commands available here.".dimmed());
        return buf;
    }

    let _ = writeln!(buf, "\n{}", "Available commands:".yellow().bold());
    let rows: Vec<(String, String)> = route
        .entries
        .iter()
        .map(|entry| {
            let label = match entry {
                RouteEntry::Command(name) => name.clone(),
                RouteEntry::Group(name) => format!("{}/", name),
                RouteEntry::Dynamic { param } => format!("<{}>", param),
            };
            let description = entry_description(&route.dir, entry).unwrap_or_default();
            (label, description)
        })
        .collect();
    write_rows(&mut buf, &rows);

    buf
}
