// src/core/command_loader.rs

//! Loads a command definition file and checks that its declarations are coherent
//! before anything is parsed against them.

use crate::{core::validator::validate_value, models::CommandDefinition};
use std::{collections::HashSet, fs, io, path::Path};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Could not read command definition '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not parse command definition '{path}': {reason}")]
    Parse { path: String, reason: String },
    #[error("Invalid command definition '{path}': {reason}")]
    Invalid { path: String, reason: String },
}

/// Reads, parses and checks a command definition file.
pub fn load_definition(path: &Path) -> Result<CommandDefinition, DefinitionError> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: display.clone(),
        source,
    })?;
    let definition: CommandDefinition =
        toml::from_str(&content).map_err(|e| DefinitionError::Parse {
            path: display.clone(),
            reason: e.to_string(),
        })?;

    check_definition(&definition).map_err(|reason| DefinitionError::Invalid {
        path: display,
        reason,
    })?;

    log::debug!(
        "Loaded definition {} ({} argument(s))",
        path.display(),
        definition.args.len()
    );
    Ok(definition)
}

/// Names and aliases are unique, aliases are one character, and declared defaults
/// satisfy their own declaration.
pub fn check_definition(definition: &CommandDefinition) -> Result<(), String> {
    let mut names = HashSet::new();
    let mut aliases = HashSet::new();

    for decl in &definition.args {
        if decl.name.is_empty() || decl.name.starts_with('-') {
            return Err(format!("'{}' is not a valid argument name", decl.name));
        }
        if !names.insert(decl.name.as_str()) {
            return Err(format!("argument '{}' is declared twice", decl.name));
        }

        if let Some(alias) = &decl.alias {
            if alias.chars().count() != 1 || alias == "-" {
                return Err(format!(
                    "alias '{}' of '{}' must be a single character",
                    alias, decl.name
                ));
            }
            if alias == "h" {
                return Err(format!("alias 'h' of '{}' is reserved for help", decl.name));
            }
            if !aliases.insert(alias.as_str()) {
                return Err(format!("alias '{}' is used by more than one argument", alias));
            }
        }

        if decl.name == "help" {
            return Err("argument name 'help' is reserved".to_string());
        }

        if let Some(default) = &decl.default {
            validate_value(decl, default).map_err(|issues| {
                let reasons: Vec<String> = issues.iter().map(ToString::to_string).collect();
                format!("default of '{}' is invalid ({})", decl.name, reasons.join("; "))
            })?;
        }
    }

    Ok(())
}
