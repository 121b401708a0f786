// tests/demo_config.rs

use devpipe::config::load_from_str;
use devpipe::dag::TaskRegistry;
use devpipe::env::Environment;
use devpipe::watch::WatchDispatcher;

const DEMO: &str = include_str!("../demos/obijudge.toml");

#[test]
fn demo_config_loads_and_builds_a_registry() {
    let cfg = load_from_str(DEMO).unwrap();
    let registry = TaskRegistry::from_config(&cfg).unwrap();

    assert_eq!(registry.len(), 8);
    assert_eq!(
        registry.dependencies_of("static:build").to_vec(),
        vec![
            "static:js",
            "static:css",
            "static:fonts",
            "static:images",
            "static:templates"
        ]
    );

    let fonts = registry.action_of("static:fonts").unwrap();
    assert!(fonts.cmd.is_some());
    assert_eq!(fonts.pipelines.len(), 1);
    assert!(registry.action_of("spawn").unwrap().spawn);
    assert!(registry.action_of("static:build").unwrap().is_group());
}

#[test]
fn demo_server_args_depend_on_environment() {
    let cfg = load_from_str(DEMO).unwrap();
    let server = cfg.server().unwrap();
    assert_eq!(server.args_for(Environment::Development), vec!["run", "-testing"]);
    assert_eq!(server.args_for(Environment::Production), vec!["run"]);
}

#[test]
fn demo_minifiers_only_run_in_production() {
    let cfg = load_from_str(DEMO).unwrap();
    let registry = TaskRegistry::from_config(&cfg).unwrap();
    let js = &registry.action_of("static:js").unwrap().pipelines[0];

    let active = |env: Environment| -> Vec<String> {
        js.stages
            .iter()
            .filter(|s| s.participates(env))
            .map(|s| s.name().to_string())
            .collect()
    };
    assert_eq!(active(Environment::Development), vec!["concat"]);
    assert_eq!(active(Environment::Production), vec!["concat", "terser"]);
}

#[test]
fn demo_watch_rules_route_changes() {
    let cfg = load_from_str(DEMO).unwrap();
    let d = WatchDispatcher::from_config(&cfg).unwrap();
    assert_eq!(d.tasks_for(["contests.zip"]), vec!["spawn"]);
    assert_eq!(d.tasks_for(["locales/en.json"]), vec!["spawn"]);
    assert_eq!(d.tasks_for(["templates/src/index.html"]), vec!["static:build"]);
    assert!(d.tasks_for(["node_modules/jquery/dist/jquery.js"]).is_empty());
}
