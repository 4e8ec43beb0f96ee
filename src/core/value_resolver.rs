// src/core/value_resolver.rs

use crate::{
    core::{
        arg_parser::ParsedTokens,
        auto_naming::{derive_config_path, derive_env_name},
        config_loader::get_by_dot_path,
    },
    models::ArgumentDeclaration,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// A read-only snapshot of the process environment.
pub type Env = BTreeMap<String, String>;

/// One raw, not yet coerced value per resolved argument. Absent arguments have no entry.
pub type RawValues = BTreeMap<String, Value>;

/// Where an argument's value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Positional(usize),
    Env(String),
    Config(String),
    Default,
}

/// Everything the resolver reads. Nothing here is mutated.
#[derive(Debug, Clone, Copy)]
pub struct ResolverInput<'a> {
    pub declarations: &'a [ArgumentDeclaration],
    pub parsed: &'a ParsedTokens,
    pub env: &'a Env,
    pub config: Option<&'a Value>,
    pub command_path: &'a [String],
    pub env_prefix: Option<&'a str>,
}

/// Picks the environment variable to consult: the declared one, else the derived one
/// when a prefix is configured, else none.
fn resolve_env_name(
    decl: &ArgumentDeclaration,
    env_prefix: Option<&str>,
    command_path: &[String],
) -> Option<String> {
    match (&decl.env, env_prefix) {
        (Some(explicit), _) => Some(explicit.clone()),
        (None, Some(prefix)) => Some(derive_env_name(prefix, command_path, &decl.name)),
        (None, None) => None,
    }
}

/// Resolves every declared argument to a raw value.
///
/// Precedence per argument, first hit wins:
/// 1. CLI flag (all values for `multiple`, else the last one),
/// 2. positional slot (positional arguments only),
/// 3. environment variable,
/// 4. configuration document (a `null` there counts as absent and falls through),
/// 5. declared default.
///
/// Positional arguments draw from the positional sequence in declaration order. The
/// cursor only advances when a token is taken, so a positional supplied as a flag
/// leaves its slot to the next positional argument.
pub fn resolve_values(input: &ResolverInput<'_>) -> RawValues {
    resolve_with_sources(input)
        .into_iter()
        .map(|(name, (value, _))| (name, value))
        .collect()
}

/// Same as [`resolve_values`], also reporting the source of each value.
pub fn resolve_with_sources(input: &ResolverInput<'_>) -> BTreeMap<String, (Value, ValueSource)> {
    let positionals: Vec<&String> = input.parsed.positional_sequence().collect();
    let mut positional_cursor = 0;
    let mut resolved = BTreeMap::new();

    for decl in input.declarations {
        let name = decl.name.as_str();

        let hit = resolve_one(input, decl, &positionals, &mut positional_cursor);
        match hit {
            Some((value, source)) => {
                log::debug!("Argument '{}' resolved from {:?}", name, source);
                resolved.insert(name.to_string(), (value, source));
            }
            None => log::debug!("Argument '{}' has no value", name),
        }
    }

    resolved
}

fn resolve_one(
    input: &ResolverInput<'_>,
    decl: &ArgumentDeclaration,
    positionals: &[&String],
    positional_cursor: &mut usize,
) -> Option<(Value, ValueSource)> {
    // 1. CLI flag
    if let Some(values) = input.parsed.flags.get(&decl.name) {
        if decl.multiple {
            let list = values.iter().cloned().map(Value::String).collect();
            return Some((Value::Array(list), ValueSource::Flag));
        }
        if let Some(last) = values.last() {
            return Some((Value::String(last.clone()), ValueSource::Flag));
        }
    }

    // 2. Positional slot; a missing token falls through to the next source.
    if decl.positional
        && let Some(token) = positionals.get(*positional_cursor)
    {
        let index = *positional_cursor;
        *positional_cursor += 1;
        return Some((Value::String((*token).clone()), ValueSource::Positional(index)));
    }

    // 3. Environment variable
    if let Some(env_name) = resolve_env_name(decl, input.env_prefix, input.command_path)
        && let Some(value) = input.env.get(&env_name)
    {
        return Some((Value::String(value.clone()), ValueSource::Env(env_name)));
    }

    // 4. Configuration document
    if let Some(config) = input.config {
        let path = decl
            .config
            .clone()
            .unwrap_or_else(|| derive_config_path(input.command_path, &decl.name));
        if let Some(value) = get_by_dot_path(config, &path).filter(|v| !v.is_null()) {
            return Some((value.clone(), ValueSource::Config(path)));
        }
    }

    // 5. Declared default
    decl.default
        .clone()
        .map(|value| (value, ValueSource::Default))
}
