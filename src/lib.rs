//! File-structured command routing for command-line applications.
//!
//! The directory tree under a commands root is the command tree: `serve.toml` is the
//! `serve` command, `config/set.toml` is `config set`, and a `[name]` directory captures
//! any token into the `name` parameter. Each definition file declares its arguments;
//! values are resolved from flags, positionals, environment, configuration and
//! defaults, validated, and handed to the registered handler through a chain of
//! plugin middleware.

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;

pub use crate::cli::dispatcher::{App, DispatchError};
pub use crate::core::middleware::{CommandContext, Extensions, Handler, Middleware, Next, handler, middleware};
pub use crate::core::plugins::{PluginConfig, PluginContext};
pub use crate::core::validator::Args;
