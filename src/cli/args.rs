// src/cli/args.rs

use clap::Parser;
use std::path::PathBuf;

const CONFIG_FLAG: &str = "--config";

/// Flags understood by the framework itself, accepted before the command path.
#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct FrameworkArgs {
    /// An extra configuration file, merged over every configured layer.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Splits argv into the leading framework flags and the tokens that get routed.
///
/// Only flags the framework knows are taken, and only before the first other token,
/// so `app serve --config x` leaves `--config x` to the command.
pub fn split_framework_args(argv: &[String]) -> (Vec<String>, Vec<String>) {
    let mut taken = 0;
    while let Some(token) = argv.get(taken) {
        if token == CONFIG_FLAG {
            taken += 2;
        } else if token.starts_with(&format!("{}=", CONFIG_FLAG)) {
            taken += 1;
        } else {
            break;
        }
    }
    let split_at = taken.min(argv.len());
    let (framework, rest) = argv.split_at(split_at);
    (framework.to_vec(), rest.to_vec())
}
