// src/cli/mod.rs

pub mod args;
pub mod dispatcher;
pub mod help;
