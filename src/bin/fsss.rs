// src/bin/fsss.rs

//! Demo application wired to the command tree under `demos/app/commands`.

use anyhow::{Context, Result, anyhow, bail};
use colored::*;
use fsss::{
    App, CommandContext, Extensions, PluginConfig, PluginContext,
    core::config_loader::get_by_dot_path, middleware,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{fs, path::Path, time::Instant};

const COMMANDS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/app/commands");

/// Capability provided by the `logger` plugin.
#[derive(Debug, Clone)]
struct Logger {
    prefix: String,
}

impl Logger {
    fn line(&self, message: &str) {
        println!("{} {}", self.prefix.dimmed(), message);
    }
}

/// Capability provided by the `auth` plugin.
#[derive(Debug, Clone)]
struct AuthToken(String);

#[derive(Deserialize, Debug)]
struct ServeArgs {
    port: u16,
    host: String,
    verbose: bool,
}

fn logger_setup(ctx: &PluginContext) -> Result<PluginConfig> {
    let prefix = ctx.options["prefix"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("[{}]", ctx.cli_name));
    let logger = Logger { prefix };

    Ok(PluginConfig::new()
        .provide(Extensions::new().with("logger", logger))
        .middleware(middleware(|ctx, next| {
            let started = Instant::now();
            let result = next.run();
            log::debug!(
                "'{}' finished in {:?}",
                ctx.command_path.join(" "),
                started.elapsed()
            );
            result
        })))
}

fn auth_setup(ctx: &PluginContext) -> Result<PluginConfig> {
    let token_env = ctx.options["token_env"]
        .as_str()
        .ok_or_else(|| anyhow!("auth plugin requires a `token_env` option"))?
        .to_string();
    let mut extensions = Extensions::new();
    if let Some(token) = ctx.env.get(&token_env) {
        extensions.insert("auth", AuthToken(token.clone()));
    }

    Ok(PluginConfig::new()
        .provide(extensions)
        .middleware(middleware(move |ctx, next| {
            match ctx.extensions.get::<AuthToken>("auth") {
                Some(AuthToken(token)) if !token.is_empty() => next.run(),
                _ => bail!("Not authenticated: set {} to push to a remote", token_env),
            }
        })))
}

fn log_line(ctx: &CommandContext, message: &str) {
    match ctx.extensions.get::<Logger>("logger") {
        Some(logger) => logger.line(message),
        None => println!("{}", message),
    }
}

fn serve(ctx: &CommandContext) -> Result<()> {
    let args: ServeArgs = ctx.args.deserialize()?;
    log_line(
        ctx,
        &format!("Serving on http://{}:{}", args.host, args.port),
    );
    if args.verbose {
        log_line(ctx, "Request logging enabled");
    }
    Ok(())
}

fn read_settings(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read settings file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Could not parse settings file '{}'", path.display()))
}

fn set_by_dot_path(document: &mut Value, key: &str, value: Value) -> Result<()> {
    let mut current = document;
    let mut segments = key.split('.').peekable();
    while let Some(segment) = segments.next() {
        let map = current
            .as_object_mut()
            .ok_or_else(|| anyhow!("'{}' does not lead to a table", key))?;
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return Ok(());
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(())
}

fn config_get(ctx: &CommandContext) -> Result<()> {
    let key = ctx.args.get_str("key").unwrap_or_default();
    let file = ctx.args.get_str("file").unwrap_or_default();
    let settings = read_settings(Path::new(file))?;
    match get_by_dot_path(&settings, key) {
        Some(Value::String(s)) => log_line(ctx, &format!("{} = {}", key, s)),
        Some(other) => log_line(ctx, &format!("{} = {}", key, other)),
        None => bail!("'{}' is not set in {}", key, file),
    }
    Ok(())
}

fn config_set(ctx: &CommandContext) -> Result<()> {
    let key = ctx.args.get_str("key").unwrap_or_default();
    let value = ctx.args.get_str("value").unwrap_or_default();
    let file = ctx.args.get_str("file").unwrap_or_default();

    let mut settings = read_settings(Path::new(file))?;
    set_by_dot_path(&mut settings, key, Value::String(value.to_string()))?;
    fs::write(file, serde_json::to_string_pretty(&settings)?)
        .with_context(|| format!("Could not write settings file '{}'", file))?;
    log_line(ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

fn push(ctx: &CommandContext) -> Result<()> {
    let remote = ctx.param("name").unwrap_or_default();
    let branch = ctx.args.get_str("branch").unwrap_or_default();
    let mode = if ctx.args.get_bool("force") {
        " (forced)"
    } else {
        ""
    };
    log_line(
        ctx,
        &format!("Pushing {} to {}{}", branch.cyan(), remote.yellow(), mode),
    );
    Ok(())
}

fn main() {
    env_logger::init();

    let app = App::new("fsss", COMMANDS_DIR)
        .env_prefix("FSSS")
        .user_config_file("config.toml")
        .plugin("logger", logger_setup)
        .plugin("auth", auth_setup)
        .command("serve", serve)
        .command("config/get", config_get)
        .command("config/set", config_set)
        .command("remote/[name]/push", push);

    std::process::exit(app.run_from_env());
}
