// src/cli/dispatcher.rs

//! The application object and the invocation pipeline.
//!
//! An invocation runs strictly in order: framework flags, routing, definition
//! loading, help, parsing, configuration, value resolution, validation, plugin
//! discovery, chain composition and finally the call. Nothing user-defined runs
//! before validation has succeeded.

use crate::{
    cli::{
        args::{FrameworkArgs, split_framework_args},
        help::{HelpContext, render_available, render_command_help},
    },
    constants::{EXIT_FATAL, EXIT_SUCCESS, EXIT_USAGE, HELP_FLAGS},
    core::{
        arg_parser::{ParseError, ParserConfig, parse},
        command_loader::load_definition,
        config_loader::ConfigLoader,
        middleware::{CommandContext, ComposedHandler, Handler},
        paths::{
            canonical_commands_dir, default_handler_key, expand_path, extract_command_path,
            get_user_config_dir, usage_segments,
        },
        plugins::{PluginConfig, PluginContext, PluginRegistry, scan_plugins},
        router::{self, ResolvedRoute, RouteResult},
        validator::{Args, ValidationError, validate_args},
        value_resolver::{Env, ResolverInput, resolve_values},
    },
    models::CommandDefinition,
};
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::{
    collections::HashMap,
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No handler is registered for '{key}' (required by '{file}')")]
    UnknownHandler { key: String, file: String },
}

/// Where a configuration layer comes from.
#[derive(Debug, Clone)]
enum ConfigSource {
    /// A path template, expanded with `~` and `$VAR` at run time.
    File(String),
    /// A file inside the per-user configuration directory of the application.
    UserFile(String),
}

/// A file-routed command-line application.
///
/// Commands are discovered from `commands_dir`; their handlers and the setup
/// functions of plugins are registered here by name.
pub struct App {
    name: String,
    commands_dir: PathBuf,
    env_prefix: Option<String>,
    default_command: Vec<String>,
    config_sources: Vec<ConfigSource>,
    handlers: HashMap<String, Handler>,
    plugins: PluginRegistry,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("App")
            .field("name", &self.name)
            .field("commands_dir", &self.commands_dir)
            .field("env_prefix", &self.env_prefix)
            .field("default_command", &self.default_command)
            .field("config_sources", &self.config_sources)
            .field("handlers", &handlers)
            .field("plugins", &self.plugins)
            .finish()
    }
}

/// Everything that has been checked before any user code runs.
struct Prepared {
    args: Args,
    trailing: Vec<String>,
}

impl App {
    pub fn new(name: impl Into<String>, commands_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            commands_dir: commands_dir.into(),
            env_prefix: None,
            default_command: Vec::new(),
            config_sources: Vec::new(),
            handlers: HashMap::new(),
            plugins: PluginRegistry::new(),
        }
    }

    /// Enables derived environment variable names (`<PREFIX>_<PATH>_<ARG>`).
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// The command routed to when nothing matches at the root, as space-separated
    /// tokens (`"serve"`, `"config get"`).
    pub fn default_command(mut self, command: &str) -> Self {
        self.default_command = command.split_whitespace().map(str::to_string).collect();
        self
    }

    /// Adds a configuration layer. `~` and environment variables are expanded.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_sources.push(ConfigSource::File(path.into()));
        self
    }

    /// Adds `<user config dir>/<app name>/<file_name>` as a configuration layer.
    pub fn user_config_file(mut self, file_name: impl Into<String>) -> Self {
        self.config_sources
            .push(ConfigSource::UserFile(file_name.into()));
        self
    }

    /// Registers the handler for a handler key (`serve`, `remote/[name]/push`).
    pub fn command<F>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&CommandContext) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(key.into(), Arc::new(handler));
        self
    }

    /// Registers a plugin setup function under the name descriptors use.
    pub fn plugin<F>(mut self, name: impl Into<String>, setup: F) -> Self
    where
        F: Fn(&PluginContext) -> Result<PluginConfig> + Send + Sync + 'static,
    {
        self.plugins.register(name, setup);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the process invocation and returns the exit code.
    pub fn run_from_env(&self) -> i32 {
        let argv: Vec<String> = std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let env: Env = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();

        let stdout = io::stdout();
        let stderr = io::stderr();
        let mut out = stdout.lock();
        let mut err = stderr.lock();

        match self.run_with(&argv, &env, &mut out, &mut err) {
            Ok(code) => code,
            Err(e) => {
                let _ = writeln!(err, "\n{}: {:#}", "Error".red().bold(), e);
                EXIT_FATAL
            }
        }
    }

    /// Runs one invocation against an explicit argv (without the program name) and
    /// environment snapshot.
    ///
    /// Returns the exit code for handled outcomes (help, listings, usage errors) and
    /// `Err` for faults in the command tree, definitions, configuration or plugins.
    pub fn run_with(
        &self,
        argv: &[String],
        env: &Env,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<i32> {
        log::debug!("Dispatching args: {:?}", argv);

        let (framework_tokens, tokens) = split_framework_args(argv);
        let framework = match FrameworkArgs::try_parse_from(&framework_tokens) {
            Ok(framework) => framework,
            Err(e) => {
                write!(err, "{}", e)?;
                return Ok(EXIT_USAGE);
            }
        };

        let commands_dir = canonical_commands_dir(&self.commands_dir)?;

        let route = match self.route(&commands_dir, &tokens)? {
            RouteResult::Resolved(route) => route,
            RouteResult::Unresolved(unresolved) => {
                write!(out, "{}", render_available(&self.name, &unresolved))?;
                return Ok(EXIT_SUCCESS);
            }
        };

        let definition = load_definition(&route.file)?;
        let command_path = extract_command_path(&commands_dir, &route.file);
        let usage_path = usage_segments(&commands_dir, &route.file);
        let help_ctx = HelpContext {
            program: &self.name,
            usage_path: &usage_path,
            command_path: &command_path,
            env_prefix: self.env_prefix.as_deref(),
        };

        if wants_help(&route.remaining) {
            write!(out, "{}", render_command_help(&definition, &help_ctx))?;
            return Ok(EXIT_SUCCESS);
        }

        let prepared = match self.prepare(
            &definition,
            &route,
            &command_path,
            env,
            framework.config,
        ) {
            Ok(prepared) => prepared,
            Err(e) if is_usage_error(&e) => {
                writeln!(err, "{}: {}\n", "Error".red().bold(), e)?;
                write!(err, "{}", render_command_help(&definition, &help_ctx))?;
                return Ok(EXIT_USAGE);
            }
            Err(e) => return Err(e),
        };

        let handler_key = definition
            .handler
            .clone()
            .unwrap_or_else(|| default_handler_key(&commands_dir, &route.file));
        let handler = self
            .handlers
            .get(&handler_key)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownHandler {
                key: handler_key.clone(),
                file: route.file.display().to_string(),
            })?;

        let plugins = scan_plugins(&route.traversed, &self.name, env, &self.plugins)?;
        log::debug!(
            "Invoking '{}' with {} plugin(s), {} middleware layer(s)",
            handler_key,
            plugins.loaded.len(),
            plugins.middlewares.len()
        );

        let ctx = CommandContext {
            command_path: command_path.clone(),
            params: route.params.clone(),
            args: prepared.args,
            extensions: plugins.extensions,
            trailing: prepared.trailing,
        };
        let chain = ComposedHandler::new(plugins.middlewares, handler);

        if let Err(e) = chain.call(&ctx) {
            writeln!(err, "{}: {:#}", "Error".red().bold(), e)?;
            return Ok(EXIT_USAGE);
        }
        Ok(EXIT_SUCCESS)
    }

    /// Routes the tokens, retrying with the default command prepended when nothing
    /// matched at the root.
    fn route(&self, commands_dir: &Path, tokens: &[String]) -> Result<RouteResult> {
        let result = router::resolve(commands_dir, tokens)?;

        let retry = matches!(&result, RouteResult::Unresolved(u) if u.is_root())
            && !self.default_command.is_empty();
        if !retry {
            return Ok(result);
        }

        let mut with_default = self.default_command.clone();
        with_default.extend(tokens.iter().cloned());
        log::debug!("Retrying route with default command: {:?}", with_default);
        match router::resolve(commands_dir, &with_default)? {
            resolved @ RouteResult::Resolved(_) => Ok(resolved),
            RouteResult::Unresolved(_) => Ok(result),
        }
    }

    /// Parses, loads configuration, resolves and validates.
    fn prepare(
        &self,
        definition: &CommandDefinition,
        route: &ResolvedRoute,
        command_path: &[String],
        env: &Env,
        extra_config: Option<PathBuf>,
    ) -> Result<Prepared> {
        let parser_config = ParserConfig::from_declarations(&definition.args);
        let parsed = parse(&route.remaining, &parser_config)?;

        let config = self.config_loader(extra_config)?.load()?;

        let raw_values = resolve_values(&ResolverInput {
            declarations: &definition.args,
            parsed: &parsed,
            env,
            config: config.as_ref(),
            command_path,
            env_prefix: self.env_prefix.as_deref(),
        });
        let args = validate_args(&definition.args, &raw_values)?;

        Ok(Prepared {
            args,
            trailing: parsed.trailing,
        })
    }

    fn config_loader(&self, extra_config: Option<PathBuf>) -> Result<ConfigLoader> {
        let mut loader = ConfigLoader::new();
        for source in &self.config_sources {
            let path = match source {
                ConfigSource::File(template) => expand_path(template)?,
                ConfigSource::UserFile(file_name) => match get_user_config_dir(&self.name) {
                    Ok(dir) => dir.join(file_name),
                    Err(e) => {
                        log::debug!("Skipping user config layer: {}", e);
                        continue;
                    }
                },
            };
            loader = loader.layer(path);
        }
        if let Some(path) = extra_config {
            let path = expand_path(&path.to_string_lossy())
                .with_context(|| format!("Invalid --config path '{}'", path.display()))?;
            loader = loader.layer(path);
        }
        Ok(loader)
    }
}

/// `--help` or `-h` anywhere before a `--`.
fn wants_help(tokens: &[String]) -> bool {
    tokens
        .iter()
        .take_while(|t| t.as_str() != "--")
        .any(|t| HELP_FLAGS.contains(&t.as_str()))
}

/// Errors caused by what the user typed, as opposed to faults in the application.
fn is_usage_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<ParseError>().is_some() || e.downcast_ref::<ValidationError>().is_some()
}
