// src/core/arg_parser.rs

use crate::models::ArgumentDeclaration;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

const LONG_FLAG_PREFIX: &str = "--";
const SHORT_FLAG_PREFIX: &str = "-";
const DOUBLE_DASH: &str = "--";
const NEGATION_PREFIX: &str = "--no-";
const BOOLEAN_TRUE: &str = "true";
const BOOLEAN_FALSE: &str = "false";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A non-boolean flag was the last token, or was followed by another flag.
    #[error("Flag {flag} requires a value")]
    MissingValue { flag: String },
}

/// Flag metadata the parser needs from a command's argument declarations.
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    pub boolean_flags: HashSet<String>,
    /// Short alias -> canonical argument name.
    pub aliases: HashMap<String, String>,
}

impl ParserConfig {
    /// Builds the parser configuration from the declarations of a command.
    pub fn from_declarations(declarations: &[ArgumentDeclaration]) -> Self {
        let mut config = Self::default();
        for decl in declarations {
            if decl.is_boolean() {
                config.boolean_flags.insert(decl.name.clone());
            }
            if let Some(alias) = &decl.alias {
                config.aliases.insert(alias.clone(), decl.name.clone());
            }
        }
        config
    }
}

/// The structured result of tokenizing the arguments left over after routing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTokens {
    /// Every value supplied for a flag, in encounter order, keyed by canonical name.
    pub flags: HashMap<String, Vec<String>>,
    pub positionals: Vec<String>,
    /// Tokens after a bare `--`. Never flag-parsed.
    pub trailing: Vec<String>,
}

impl ParsedTokens {
    /// Positionals followed by the `--` tail, the sequence positional arguments draw from.
    pub fn positional_sequence(&self) -> impl Iterator<Item = &String> {
        self.positionals.iter().chain(self.trailing.iter())
    }

    fn add_flag(&mut self, name: &str, value: &str) {
        self.flags
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
    }
}

fn looks_like_flag(token: &str) -> bool {
    token.starts_with(SHORT_FLAG_PREFIX) && token != SHORT_FLAG_PREFIX
}

/// Tokenizes command-line arguments into flags, positionals and the `--` tail.
///
/// # Grammar
/// - `--` moves every remaining token into `trailing`.
/// - `--no-<name>` records `false`.
/// - `--<name>=<value>` and `-<alias>=<value>` record `<value>`.
/// - `--<name>` / `-<alias>` record `true` for boolean flags, otherwise take the
///   next token, which must exist and must not look like a flag.
/// - Anything else (including a bare `-`) is positional.
///
/// Aliases that are not declared pass through as their literal character.
pub fn parse(tokens: &[String], config: &ParserConfig) -> Result<ParsedTokens, ParseError> {
    let mut parsed = ParsedTokens::default();
    let mut tokens_iter = tokens.iter().map(String::as_str).peekable();

    while let Some(token) = tokens_iter.next() {
        if token == DOUBLE_DASH {
            parsed.trailing = tokens_iter.map(str::to_string).collect();
            break;
        }

        if let Some(name) = token.strip_prefix(NEGATION_PREFIX) {
            parsed.add_flag(name, BOOLEAN_FALSE);
            continue;
        }

        let (display_prefix, name) = if let Some(long) = token.strip_prefix(LONG_FLAG_PREFIX) {
            (LONG_FLAG_PREFIX, long)
        } else if let Some(short) = token.strip_prefix(SHORT_FLAG_PREFIX)
            && !short.is_empty()
        {
            (SHORT_FLAG_PREFIX, short)
        } else {
            parsed.positionals.push(token.to_string());
            continue;
        };

        let is_short = display_prefix == SHORT_FLAG_PREFIX;
        let canonical = |raw: &str| -> String {
            if is_short {
                config
                    .aliases
                    .get(raw)
                    .cloned()
                    .unwrap_or_else(|| raw.to_string())
            } else {
                raw.to_string()
            }
        };

        // --flag=value / -f=value
        if let Some((raw_name, value)) = name.split_once('=') {
            parsed.add_flag(&canonical(raw_name), value);
            continue;
        }

        let flag_name = canonical(name);
        if config.boolean_flags.contains(&flag_name) {
            parsed.add_flag(&flag_name, BOOLEAN_TRUE);
            continue;
        }

        match tokens_iter.next_if(|next| !looks_like_flag(next)) {
            Some(value) => parsed.add_flag(&flag_name, value),
            None => {
                return Err(ParseError::MissingValue {
                    flag: format!("{}{}", display_prefix, name),
                });
            }
        }
    }

    log::trace!("Parsed tokens: {:?}", parsed);
    Ok(parsed)
}
