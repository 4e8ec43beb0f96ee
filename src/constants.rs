// src/constants.rs

/// Extension of command definition and plugin descriptor files.
pub const COMMAND_FILE_EXTENSION: &str = "toml";

/// File stem of the command that represents its own directory (`index.toml`).
pub const INDEX_FILE_NAME: &str = "index";

/// Name of the per-directory folder holding plugin descriptors.
pub const PLUGINS_DIR_NAME: &str = "_plugins";

/// Entries whose name starts with this marker are internal: never routed, never listed.
pub const INTERNAL_PREFIX: char = '_';

/// Separator used to build auto-derived environment variable names.
pub const ENV_SEPARATOR: &str = "_";

/// Separator used to build auto-derived configuration key paths.
pub const CONFIG_SEPARATOR: &str = ".";

pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for user-input failures (grammar, validation, handler errors).
pub const EXIT_USAGE: i32 = 1;

/// Exit code for broken installations (router I/O, bad definitions, plugin loading).
pub const EXIT_FATAL: i32 = 2;

/// Tokens that request the help text of the resolved command.
pub const HELP_FLAGS: &[&str] = &["--help", "-h"];
