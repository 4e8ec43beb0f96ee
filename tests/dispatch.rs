use fsss::{App, Extensions, PluginConfig, PluginContext, core::value_resolver::Env, middleware};
use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tempfile::TempDir;

type Log = Arc<Mutex<Vec<String>>>;

fn write(root: &Path, file: &str, content: &str) {
    let path = root.join(file);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn run(app: &App, argv: &[&str], env: &Env) -> (i32, String, String) {
    colored::control::set_override(false);
    let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
    let mut out = Vec::new();
    let mut err = Vec::new();
    let code = app.run_with(&argv, env, &mut out, &mut err).unwrap();
    (
        code,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

/// The sample tree: `serve`, `config/set`, `remote/[name]/push`, with plugins at the
/// root and under `remote/`.
fn sample_tree() -> TempDir {
    let root = TempDir::new().unwrap();
    write(
        root.path(),
        "serve.toml",
        r#"
[[args]]
name = "port"
type = "number"
alias = "p"
default = 3000

[[args]]
name = "verbose"
type = "boolean"
alias = "v"
default = false
"#,
    );
    write(
        root.path(),
        "config/set.toml",
        r#"
[[args]]
name = "key"
positional = true

[[args]]
name = "value"
positional = true
"#,
    );
    write(
        root.path(),
        "remote/[name]/push.toml",
        r#"
[[args]]
name = "branch"
positional = true
default = "main"

[[args]]
name = "force"
type = "boolean"
alias = "f"
default = false
"#,
    );
    write(
        root.path(),
        "_plugins/timer.toml",
        "setup = \"tag\"\n[options]\nname = \"timer\"\ntoken = \"root\"\n",
    );
    write(
        root.path(),
        "remote/_plugins/auth.toml",
        "setup = \"tag\"\n[options]\nname = \"auth\"\ntoken = \"remote\"\n",
    );
    root
}

/// Every handler records what it received; every `tag` plugin records its layer and
/// provides a `token` capability.
fn sample_app(root: &Path, log: &Log) -> App {
    let setup_log = log.clone();
    let serve_log = log.clone();
    let set_log = log.clone();
    let push_log = log.clone();

    App::new("app", root)
        .env_prefix("APP")
        .plugin("tag", move |ctx: &PluginContext| {
            let name = ctx.options["name"].as_str().unwrap_or_default().to_string();
            let token = ctx.options["token"].as_str().unwrap_or_default().to_string();
            let log = setup_log.clone();
            Ok(PluginConfig::new()
                .provide(Extensions::new().with("token", token))
                .middleware(middleware(move |_ctx, next| {
                    log.lock().unwrap().push(format!("{}-pre", name));
                    let result = next.run();
                    log.lock().unwrap().push(format!("{}-post", name));
                    result
                })))
        })
        .command("serve", move |ctx| {
            serve_log.lock().unwrap().push(format!(
                "serve port={} verbose={}",
                ctx.args.get_i64("port").unwrap(),
                ctx.args.get_bool("verbose")
            ));
            Ok(())
        })
        .command("config/set", move |ctx| {
            set_log.lock().unwrap().push(format!(
                "set {}={}",
                ctx.args.get_str("key").unwrap(),
                ctx.args.get_str("value").unwrap()
            ));
            Ok(())
        })
        .command("remote/[name]/push", move |ctx| {
            push_log.lock().unwrap().push(format!(
                "push {} {} force={} token={}",
                ctx.param("name").unwrap(),
                ctx.args.get_str("branch").unwrap(),
                ctx.args.get_bool("force"),
                ctx.extensions.get::<String>("token").unwrap()
            ));
            Ok(())
        })
}

fn env_of(pairs: &[(&str, &str)]) -> Env {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_boolean_and_alias_forms_are_equivalent() {
    let root = sample_tree();
    let log = Log::default();
    let app = sample_app(root.path(), &log);

    for argv in [
        &["serve", "--verbose"][..],
        &["serve", "--verbose=true"][..],
        &["serve", "-v"][..],
    ] {
        assert_eq!(run(&app, argv, &Env::new()).0, 0);
    }
    run(&app, &["serve", "--no-verbose"], &Env::new());

    let entries: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|l| l.starts_with("serve"))
        .cloned()
        .collect();
    assert_eq!(
        entries,
        vec![
            "serve port=3000 verbose=true",
            "serve port=3000 verbose=true",
            "serve port=3000 verbose=true",
            "serve port=3000 verbose=false",
        ]
    );
}

#[test]
fn test_flag_beats_env_beats_default() {
    let root = sample_tree();
    let log = Log::default();
    let app = sample_app(root.path(), &log);
    let env = env_of(&[("APP_SERVE_PORT", "9090")]);

    run(&app, &["serve", "-p", "4000"], &env);
    run(&app, &["serve"], &env);
    run(&app, &["serve"], &Env::new());

    let entries: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|l| l.starts_with("serve"))
        .cloned()
        .collect();
    assert_eq!(
        entries,
        vec![
            "serve port=4000 verbose=false",
            "serve port=9090 verbose=false",
            "serve port=3000 verbose=false",
        ]
    );
}

#[test]
fn test_positionals_fill_nested_command() {
    let root = sample_tree();
    let log = Log::default();
    let app = sample_app(root.path(), &log);

    assert_eq!(run(&app, &["config", "set", "foo", "bar"], &Env::new()).0, 0);
    assert!(log.lock().unwrap().contains(&"set foo=bar".to_string()));
}

#[test]
fn test_dynamic_segment_with_plugins_in_onion_order() {
    let root = sample_tree();
    let log = Log::default();
    let app = sample_app(root.path(), &log);

    let (code, _, _) = run(&app, &["remote", "origin", "push", "-f"], &Env::new());
    assert_eq!(code, 0);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "timer-pre",
            "auth-pre",
            "push origin main force=true token=remote",
            "auth-post",
            "timer-post",
        ]
    );
}

#[test]
fn test_group_without_index_lists_its_commands() {
    let root = sample_tree();
    let app = sample_app(root.path(), &Log::default());

    let (code, out, _) = run(&app, &["config"], &Env::new());
    assert_eq!(code, 0);
    assert!(out.contains("Available commands:"));
    assert!(out.contains("set"));
}

#[test]
fn test_root_listing_shows_groups_and_commands() {
    let root = sample_tree();
    let app = sample_app(root.path(), &Log::default());

    let (code, out, _) = run(&app, &[], &Env::new());
    assert_eq!(code, 0);
    assert!(out.contains("serve"));
    assert!(out.contains("config/"));
    assert!(out.contains("remote/"));
    assert!(!out.contains("_plugins"));
}

#[test]
fn test_every_validation_failure_is_reported() {
    let root = sample_tree();
    write(
        root.path(),
        "limits.toml",
        r#"
[[args]]
name = "a"
type = "number"

[[args]]
name = "b"
type = "number"
"#,
    );
    let app = sample_app(root.path(), &Log::default()).command("limits", |_ctx| Ok(()));

    let (code, _, err) = run(&app, &["limits", "--a", "x", "--b", "y"], &Env::new());
    assert_eq!(code, 1);
    assert!(err.contains("a: "));
    assert!(err.contains("b: "));
}

#[test]
fn test_middleware_can_short_circuit_the_handler() {
    let root = TempDir::new().unwrap();
    write(root.path(), "deploy.toml", "");
    write(root.path(), "_plugins/gate.toml", "setup = \"gate\"\n");
    let ran = Log::default();
    let handler_log = ran.clone();

    let app = App::new("app", root.path())
        .plugin("gate", |_ctx: &PluginContext| {
            Ok(PluginConfig::new()
                .middleware(middleware(|_ctx, _next| Err(anyhow::anyhow!("deploys are frozen")))))
        })
        .command("deploy", move |_ctx| {
            handler_log.lock().unwrap().push("deploy".to_string());
            Ok(())
        });

    let (code, _, err) = run(&app, &["deploy"], &Env::new());
    assert_eq!(code, 1);
    assert!(err.contains("deploys are frozen"));
    assert!(ran.lock().unwrap().is_empty());
}

#[test]
fn test_ambiguous_dynamic_segments_are_fatal() {
    let root = TempDir::new().unwrap();
    write(root.path(), "[a]/x.toml", "");
    write(root.path(), "[b]/y.toml", "");
    let app = App::new("app", root.path());

    let argv = vec!["anything".to_string()];
    let result = app.run_with(&argv, &Env::new(), &mut Vec::<u8>::new(), &mut Vec::<u8>::new());
    assert!(result.is_err());
}

#[test]
fn test_typed_args_deserialize_into_user_struct() {
    #[derive(serde::Deserialize)]
    struct ServeArgs {
        port: u16,
        verbose: bool,
    }

    let root = TempDir::new().unwrap();
    write(
        root.path(),
        "serve.toml",
        r#"
[[args]]
name = "port"
type = "number"
default = 3000

[[args]]
name = "verbose"
type = "boolean"
alias = "v"
default = false
"#,
    );
    let seen = Log::default();
    let recorded = seen.clone();
    let app = App::new("app", root.path()).command("serve", move |ctx| {
        let args: ServeArgs = ctx.args.deserialize()?;
        recorded
            .lock()
            .unwrap()
            .push(format!("{} {}", args.port, args.verbose));
        Ok(())
    });

    assert_eq!(run(&app, &["serve", "--port=8080", "-v"], &Env::new()).0, 0);
    assert_eq!(run(&app, &["serve", "--port=8080.0"], &Env::new()).0, 0);
    assert_eq!(*seen.lock().unwrap(), vec!["8080 true", "8080 false"]);
}

#[test]
fn test_negated_flag_turns_off_a_true_default() {
    let root = TempDir::new().unwrap();
    write(
        root.path(),
        "build.toml",
        r#"
[[args]]
name = "cache"
type = "boolean"
default = true
"#,
    );
    let seen = Log::default();
    let recorded = seen.clone();
    let app = App::new("app", root.path())
        .env_prefix("APP")
        .command("build", move |ctx| {
            recorded
                .lock()
                .unwrap()
                .push(format!("cache={}", ctx.args.get_bool("cache")));
            Ok(())
        });

    let env = env_of(&[("APP_BUILD_CACHE", "true")]);
    run(&app, &["build"], &Env::new());
    run(&app, &["build", "--no-cache"], &Env::new());
    run(&app, &["build", "--no-cache"], &env);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["cache=true", "cache=false", "cache=false"]
    );
}
