//! Orchestration for `collector collect` and `collector config`.

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::Invocation;
use crate::collect::{PackageLoader, RunContext, Stopwatch, create_generator};
use crate::core::resolve::{VERBOSE, backend, prepare};
use crate::core::settings::ConfigStore;
use crate::error::CollectError;
use crate::io::config::{DEFAULTS_MODULE, ModuleRegistry};
use crate::io::env::{CONFIG_ENV, get_config_path_by_env};
use crate::logging::SubscriberSink;
use crate::plan::{Plan, PlanEntry, PlannedSuite, SUITES};

/// Defaults overlaid with the settings at `config`, or at `$COLLECTOR_CONFIG`.
pub fn load_settings(config: Option<&str>, modules: &ModuleRegistry) -> Result<ConfigStore> {
    let mut store = ConfigStore::init(None, Some(DEFAULTS_MODULE), modules)
        .context("load default settings")?;
    let path = config
        .map(str::to_string)
        .or_else(|| get_config_path_by_env(CONFIG_ENV, None, None));
    if let Some(path) = path {
        let overlay = ConfigStore::init(None, Some(&path), modules)
            .with_context(|| format!("load settings {path}"))?;
        debug!(path = %path, keys = overlay.len(), "overlaying settings");
        store.load(&overlay, true);
    }
    Ok(store)
}

/// Load, override from the command line and resolve the settings of a run.
pub fn resolve_settings(
    invocation: &Invocation,
    modules: &ModuleRegistry,
) -> Result<(ConfigStore, SubscriberSink)> {
    let mut store = load_settings(invocation.config.as_deref(), modules)?;
    invocation.apply(&mut store);
    let mut sink = SubscriberSink::default();
    prepare(&mut store, &mut sink);
    Ok((store, sink))
}

/// Collect the `SUITES` pool of resolved settings into a plan.
pub fn collect_plan(store: &ConfigStore) -> Result<Plan, CollectError> {
    let suites: Vec<PlannedSuite> = store
        .string_list(SUITES)
        .into_iter()
        .map(PlannedSuite::new)
        .collect();
    let mut context = RunContext::new().with_extension(Stopwatch::default());
    let entries = create_generator(suites, store, PackageLoader, &mut context)
        .map(|suite| suite.map(|suite| PlanEntry::from(&suite)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Plan {
        backend: backend(store),
        verbose: store.flag(VERBOSE),
        suites: entries,
    })
}

/// Resolved settings as TOML, headed by the selected backend.
pub fn render_settings(store: &ConfigStore) -> Result<String> {
    let body = toml::to_string(&store.to_table()).context("serialize settings")?;
    Ok(format!("# backend: {}\n{body}", backend(store)))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::core::resolve::MULTIPROCESSING;
    use toml::Value;

    fn store_with(suites: &[&str], tests: &[&str]) -> ConfigStore {
        let list = |items: &[&str]| Value::Array(items.iter().map(|item| (*item).into()).collect());
        let mut store = ConfigStore::new();
        store.set(SUITES, list(suites));
        store.set("TESTS", list(tests));
        store
    }

    #[test]
    fn load_settings_overlays_file_on_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("settings.toml");
        fs::write(&path, "GEVENT = true\nSUITES = [\"a\"]\n").expect("write");

        let store = load_settings(path.to_str(), &ModuleRegistry::builtin()).expect("load");
        assert!(store.flag("GEVENT"));
        assert!(store.contains("THREADING"));
        assert_eq!(store.string_list(SUITES), vec!["a"]);
    }

    #[test]
    fn load_settings_reports_missing_file() {
        let err = load_settings(Some("missing/settings.toml"), &ModuleRegistry::builtin())
            .expect_err("missing");
        assert!(format!("{err:#}").contains("does not exist"));
    }

    #[test]
    fn resolve_settings_derives_flags_after_overrides() {
        let invocation =
            Invocation::try_parse_from(["collector", "config", "--async-tests", "--steps-log"])
                .expect("parse");
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("settings.toml");
        fs::write(&path, "THREADING = false\n").expect("write");
        let invocation = Invocation {
            config: path.to_str().map(str::to_string),
            ..invocation
        };

        let (store, sink) =
            resolve_settings(&invocation, &ModuleRegistry::builtin()).expect("resolve");
        assert!(store.flag(MULTIPROCESSING));
        assert!(store.flag(VERBOSE));
        assert!(sink.settings().is_none());
    }

    #[test]
    fn plan_follows_selector_order() {
        let store = store_with(&["auth", "billing", "search"], &["search:Query", "auth"]);
        let plan = collect_plan(&store).expect("plan");
        let packages: Vec<&str> = plan.suites.iter().map(|s| s.package.as_str()).collect();
        assert_eq!(packages, vec!["search", "auth"]);
        assert_eq!(plan.suites[0].targets, vec!["search:Query"]);
    }

    #[test]
    fn plan_without_selectors_is_whole_pool() {
        let store = store_with(&["auth", "billing"], &[]);
        let plan = collect_plan(&store).expect("plan");
        assert_eq!(plan.suites.len(), 2);
        assert!(plan.suites.iter().all(|entry| !entry.built));
    }

    #[test]
    fn plan_fails_on_unknown_suite() {
        let store = store_with(&["auth"], &["payments:Card.charge"]);
        let err = collect_plan(&store).expect_err("unresolved");
        assert_eq!(
            err,
            CollectError::Unresolved {
                suite: "payments".to_string(),
                case: Some("Card".to_string()),
                test: Some("charge".to_string()),
            }
        );
    }

    #[test]
    fn rendered_settings_name_the_backend() {
        let mut store = ConfigStore::new();
        store.set("THREADING", Value::Boolean(true));
        let rendered = render_settings(&store).expect("render");
        assert!(rendered.starts_with("# backend: threading\n"));
        assert!(rendered.contains("THREADING = true"));
    }
}
