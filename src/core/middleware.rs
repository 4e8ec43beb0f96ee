// src/core/middleware.rs

//! Capabilities shared between plugins and handlers, and the onion-model chain that
//! wraps a command handler with plugin middleware.

use crate::core::validator::Args;
use anyhow::Result;
use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

// --- CAPABILITIES ---

/// A name-keyed bag of independently typed capabilities ("extensions").
///
/// Plugins contribute entries; handlers read them back with [`Extensions::get`] using
/// the concrete type they expect. Merging is last-writer-wins per name.
#[derive(Clone, Default)]
pub struct Extensions {
    entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Extensions::insert`].
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Registers a capability, replacing any previous one with the same name.
    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.entries.insert(name.into(), Arc::new(value));
    }

    /// Returns the capability registered under `name` if it has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.entries.get(name)?.downcast_ref::<T>()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Shallow merge: every entry of `other` overwrites the one with the same name.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

// --- INVOCATION CONTEXT ---

/// What a handler and every middleware around it receive.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Display path of the command (`["remote", "push"]`).
    pub command_path: Vec<String>,
    /// Captured dynamic segments (`name -> "origin"`).
    pub params: BTreeMap<String, String>,
    pub args: Args,
    pub extensions: Extensions,
    /// Raw tokens after `--`, for handlers that forward them.
    pub trailing: Vec<String>,
}

impl CommandContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

// --- CHAIN ---

/// The terminal handler of a command.
pub type Handler = Arc<dyn Fn(&CommandContext) -> Result<()> + Send + Sync>;

/// A middleware wraps everything registered after it. It must call `next.run()` for
/// the inner layers and the handler to execute; returning without doing so
/// short-circuits the invocation.
pub type Middleware = Arc<dyn Fn(&CommandContext, Next<'_>) -> Result<()> + Send + Sync>;

/// Continuation handed to a middleware: runs the remaining layers and the handler.
pub struct Next<'a> {
    rest: &'a [Middleware],
    handler: &'a Handler,
    ctx: &'a CommandContext,
}

impl Next<'_> {
    pub fn run(self) -> Result<()> {
        match self.rest.split_first() {
            Some((middleware, rest)) => middleware(
                self.ctx,
                Next {
                    rest,
                    handler: self.handler,
                    ctx: self.ctx,
                },
            ),
            None => (self.handler)(self.ctx),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining_layers", &self.rest.len())
            .finish()
    }
}

/// Middlewares in registration order, composed around a handler.
///
/// The first registered middleware is the outermost layer: its pre-logic runs first
/// and its post-logic runs last.
pub struct ComposedHandler {
    middlewares: Vec<Middleware>,
    handler: Handler,
}

impl ComposedHandler {
    pub fn new(middlewares: Vec<Middleware>, handler: Handler) -> Self {
        Self {
            middlewares,
            handler,
        }
    }

    pub fn call(&self, ctx: &CommandContext) -> Result<()> {
        Next {
            rest: &self.middlewares,
            handler: &self.handler,
            ctx,
        }
        .run()
    }

    pub fn layers(&self) -> usize {
        self.middlewares.len()
    }
}

impl fmt::Debug for ComposedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedHandler")
            .field("layers", &self.middlewares.len())
            .finish()
    }
}

/// Wraps a closure as a [`Middleware`].
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(&CommandContext, Next<'_>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&CommandContext) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn logging_middleware(log: &Log, name: &'static str) -> Middleware {
        let log = log.clone();
        middleware(move |_ctx, next| {
            log.lock().unwrap().push(format!("{}-pre", name));
            let result = next.run();
            log.lock().unwrap().push(format!("{}-post", name));
            result
        })
    }

    fn logging_handler(log: &Log) -> Handler {
        let log = log.clone();
        handler(move |_ctx| {
            log.lock().unwrap().push("H".to_string());
            Ok(())
        })
    }

    #[test]
    fn test_onion_order() {
        let log: Log = Arc::default();
        let chain = ComposedHandler::new(
            vec![
                logging_middleware(&log, "A"),
                logging_middleware(&log, "B"),
                logging_middleware(&log, "C"),
            ],
            logging_handler(&log),
        );
        chain.call(&CommandContext::default()).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["A-pre", "B-pre", "C-pre", "H", "C-post", "B-post", "A-post"]
        );
    }

    #[test]
    fn test_middleware_can_short_circuit() {
        let log: Log = Arc::default();
        let gate = middleware(|_ctx, _next| Err(anyhow!("rejected")));
        let chain = ComposedHandler::new(
            vec![logging_middleware(&log, "A"), gate, logging_middleware(&log, "C")],
            logging_handler(&log),
        );
        let err = chain.call(&CommandContext::default()).unwrap_err();
        assert_eq!(err.to_string(), "rejected");
        assert_eq!(*log.lock().unwrap(), vec!["A-pre", "A-post"]);
    }

    #[test]
    fn test_empty_chain_runs_handler() {
        let log: Log = Arc::default();
        let chain = ComposedHandler::new(Vec::new(), logging_handler(&log));
        chain.call(&CommandContext::default()).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["H"]);
    }

    #[test]
    fn test_extensions_typed_access_and_last_write_wins() {
        let mut extensions = Extensions::new().with("token", "root".to_string());
        extensions.merge(Extensions::new().with("token", "leaf".to_string()).with("retries", 3u32));

        assert_eq!(extensions.get::<String>("token").map(String::as_str), Some("leaf"));
        assert_eq!(extensions.get::<u32>("retries"), Some(&3));
        assert!(extensions.get::<i64>("retries").is_none());
        assert_eq!(extensions.names(), vec!["retries", "token"]);
    }

    #[test]
    fn test_handler_sees_context() {
        let mut ctx = CommandContext::default();
        ctx.params.insert("name".to_string(), "origin".to_string());
        let chain = ComposedHandler::new(
            Vec::new(),
            handler(|ctx| {
                assert_eq!(ctx.param("name"), Some("origin"));
                Ok(())
            }),
        );
        chain.call(&ctx).unwrap();
    }
}
