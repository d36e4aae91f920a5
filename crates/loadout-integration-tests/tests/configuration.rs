//! Configuration discovery, recommendation and usage hints wired together.

mod common;

use common::Harness;
use loadout_config::{LoadOptions, ProfilesConfig};
use loadout_events::LoadoutEvent;
use loadout_modules::{HostHandle, ModuleRegistry};
use loadout_profiles::{
    ProfileManager, ProfileRecommender, RecommendationContext, RecommendationSource,
};
use loadout_telemetry::{LogConfig, LogFormat};
use loadout_test::{Journal, ModuleScript, RegistryBuilder, config_from_toml, module_id};

const FULL_CONFIG: &str = r#"
    default_profile = "core"

    [profiles.core]
    description = "Workspace access only"
    modules = ["workspace"]

    [profiles.dev]
    extends = "core"
    modules = ["git"]

    [profiles.web]
    extends = "dev"
    modules = ["browser"]

    [context_profiles]
    reviewer = "dev"

    [[file_patterns]]
    pattern = "**/*.html"
    profile = "web"

    [[file_patterns]]
    pattern = "src/**"
    profile = "dev"

    [[keywords]]
    keyword = "scrape"
    profile = "web"

    [[tool_categories]]
    category = "browsing"
    tools = ["browser_*"]
    module = "browser"

    [recommender]
    usage_window = 5
    upgrade_threshold = 2

    [logging]
    level = "debug"
    format = "json"
    directives = ["loadout_profiles=trace"]
"#;

#[tokio::test]
async fn test_missing_config_is_synthesized_and_usable() {
    let dir = tempfile::tempdir().unwrap();
    let options = LoadOptions::default()
        .with_workspace(dir.path())
        .without_user();

    let loaded = ProfilesConfig::load(&options).unwrap();
    assert!(loaded.synthesized);
    assert_eq!(loaded.path, dir.path().join(".loadout").join("profiles.toml"));
    assert!(loaded.path.exists());

    let registry = RegistryBuilder::new()
        .module("always", &[], &["all"], ModuleScript::new())
        .module("extra", &[], &[], ModuleScript::new())
        .build();
    let manager =
        ProfileManager::from_config(&loaded.config, registry, HostHandle::empty()).unwrap();

    let report = manager.initialize().await;
    assert!(report.success);
    assert_eq!(report.to, "core");
    assert_eq!(report.loaded, vec![module_id("always")]);

    let report = manager.switch_profile("full", false).await;
    assert!(report.success);
    assert_eq!(report.loaded, vec![module_id("extra")]);

    // A second load reads the file it just wrote.
    let again = ProfilesConfig::load(&options).unwrap();
    assert!(!again.synthesized);
}

#[tokio::test]
async fn test_existing_workspace_config_wins_over_home() {
    let workspace = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let dir = workspace.path().join(".loadout");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("profiles.toml"), FULL_CONFIG).unwrap();

    let loaded = ProfilesConfig::load(
        &LoadOptions::default()
            .with_workspace(workspace.path())
            .with_home(home.path()),
    )
    .unwrap();
    assert!(!loaded.synthesized);
    assert_eq!(loaded.config.profiles.len(), 3);
    assert!(!home.path().join(".loadout").exists());
}

#[test]
fn test_catalog_rejects_unknown_module() {
    let config = config_from_toml(
        r#"
        default_profile = "core"

        [profiles.core]
        modules = ["ghost"]
    "#,
    );
    let result = ProfileManager::from_config(
        &config,
        std::sync::Arc::new(ModuleRegistry::new()),
        HostHandle::empty(),
    );
    assert!(result.is_err());
}

#[test]
fn test_recommender_follows_rule_precedence() {
    let config = config_from_toml(FULL_CONFIG);
    let recommender = ProfileRecommender::from_config(&config).unwrap();

    let rec = recommender.recommend(
        &RecommendationContext::new()
            .with_explicit_profile("core")
            .with_context_id("reviewer"),
    );
    assert_eq!(rec.profile, "core");
    assert_eq!(rec.source, RecommendationSource::Explicit);

    let rec = recommender.recommend(
        &RecommendationContext::new()
            .with_explicit_profile("nonexistent")
            .with_context_id("reviewer"),
    );
    assert_eq!(rec.profile, "dev");
    assert_eq!(rec.source, RecommendationSource::Context);

    let rec = recommender.recommend(
        &RecommendationContext::new()
            .with_recent_file("src/lib.rs")
            .with_recent_file("site/index.html"),
    );
    assert_eq!(rec.profile, "web");
    assert_eq!(rec.source, RecommendationSource::FilePattern);

    let rec = recommender.recommend(&RecommendationContext::new().with_task("Scrape the changelog"));
    assert_eq!(rec.profile, "web");
    assert!((rec.confidence - 0.80).abs() < f32::EPSILON);

    let rec = recommender.recommend(&RecommendationContext::new().with_task("scraper tuning"));
    assert_eq!(rec.profile, "core");
    assert_eq!(rec.source, RecommendationSource::Fallback);
}

#[tokio::test]
async fn test_repeated_tool_use_suggests_upgrade_once() {
    let registry = RegistryBuilder::new()
        .module("workspace", &[], &[], ModuleScript::new())
        .module("git", &["workspace"], &[], ModuleScript::new())
        .module("browser", &[], &[], ModuleScript::new())
        .build();
    let mut h = Harness::new(registry, FULL_CONFIG, Journal::new());
    assert!(h.manager.initialize().await.success);
    assert!(h.manager.switch_profile("dev", false).await.success);
    let _ = h.events.drain();

    assert!(h.manager.record_tool_use("browser_open").is_none());
    assert!(h.manager.record_tool_use("git_status").is_none());
    let suggestion = h
        .manager
        .record_tool_use("browser_click")
        .expect("threshold reached");
    assert_eq!(suggestion.category, "browsing");
    assert_eq!(suggestion.module, module_id("browser"));
    assert_eq!(suggestion.profile, "web");
    assert_eq!(suggestion.hits, 2);

    // Suggested once; the profile is not switched.
    assert!(h.manager.record_tool_use("browser_back").is_none());
    assert_eq!(h.manager.current_profile().as_deref(), Some("dev"));

    let events = h.events.drain();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0].as_ref(),
        LoadoutEvent::UpgradeSuggested { profile, hits: 2, .. } if profile == "web"
    ));

    // Once the module is active the hint stops.
    assert!(h.manager.switch_profile("web", false).await.success);
    assert!(h.manager.record_tool_use("browser_open").is_none());
}

#[test]
fn test_logging_section_builds_log_config() {
    let config = config_from_toml(FULL_CONFIG);
    let log = LogConfig::from_section(&config.logging).unwrap();
    assert_eq!(log.level, "debug");
    assert_eq!(log.format, LogFormat::Json);
    assert_eq!(log.directives, vec!["loadout_profiles=trace".to_string()]);
}
