// src/core/auto_naming.rs

use crate::constants::{CONFIG_SEPARATOR, ENV_SEPARATOR};

/// Derives the environment variable consulted for an argument when none is declared.
///
/// `derive_env_name("MYAPP", &["serve"], "port")` -> `"MYAPP_SERVE_PORT"`
pub fn derive_env_name<S: AsRef<str>>(prefix: &str, command_path: &[S], arg_name: &str) -> String {
    std::iter::once(prefix)
        .chain(command_path.iter().map(AsRef::as_ref))
        .chain(std::iter::once(arg_name))
        .collect::<Vec<_>>()
        .join(ENV_SEPARATOR)
        .to_uppercase()
}

/// Derives the dotted configuration key for an argument when none is declared.
/// Configuration documents are already scoped to the application, so no prefix.
///
/// `derive_config_path(&["serve"], "port")` -> `"serve.port"`
pub fn derive_config_path<S: AsRef<str>>(command_path: &[S], arg_name: &str) -> String {
    command_path
        .iter()
        .map(AsRef::as_ref)
        .chain(std::iter::once(arg_name))
        .collect::<Vec<_>>()
        .join(CONFIG_SEPARATOR)
}
