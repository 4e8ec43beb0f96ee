// src/core/mod.rs

pub mod arg_parser;
pub mod auto_naming;
pub mod command_loader;
pub mod config_loader;
pub mod middleware;
pub mod paths;
pub mod plugins;
pub mod router;
pub mod validator;
pub mod value_resolver;
