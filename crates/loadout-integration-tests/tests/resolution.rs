//! Profile resolution and dependency ordering through the public API.

mod common;

use common::Harness;
use loadout_modules::resolver;
use loadout_profiles::SwitchFailure;
use loadout_test::{Journal, ModuleScript, RegistryBuilder, module_id};

const LAYERED: &str = r#"
    default_profile = "base"

    [profiles.base]
    modules = ["a"]

    [profiles.ext]
    extends = "base"
    modules = ["b"]
"#;

#[tokio::test]
async fn test_inherited_profile_loads_dependency_first() {
    let journal = Journal::new();
    let registry = RegistryBuilder::new()
        .module("a", &[], &[], ModuleScript::new().with_journal(&journal))
        .module("b", &["a"], &[], ModuleScript::new().with_journal(&journal))
        .build();
    let h = Harness::new(registry, LAYERED, journal);

    assert_eq!(
        h.manager.catalog().load_order("ext").unwrap(),
        vec![module_id("a"), module_id("b")]
    );

    let report = h.manager.switch_profile("ext", false).await;
    assert!(report.success);
    assert_eq!(report.loaded, vec![module_id("a"), module_id("b")]);
    assert_eq!(h.journal.loads(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_resolution_is_deterministic() {
    let build = || {
        RegistryBuilder::new()
            .module("zeta", &[], &["all"], ModuleScript::new())
            .module("alpha", &[], &["all"], ModuleScript::new())
            .module("mid", &["zeta"], &["all"], ModuleScript::new())
            .module("tail", &["mid", "alpha"], &["all"], ModuleScript::new())
            .build()
    };

    let first = resolver::topological_order(&build(), &build().ids()).unwrap();
    for _ in 0..5 {
        let again = resolver::topological_order(&build(), &build().ids()).unwrap();
        assert_eq!(again, first);
    }
    assert_eq!(
        first,
        vec![
            module_id("alpha"),
            module_id("zeta"),
            module_id("mid"),
            module_id("tail"),
        ]
    );
}

#[tokio::test]
async fn test_priority_breaks_ties_before_id() {
    use loadout_modules::ModuleDescriptor;

    let registry = RegistryBuilder::new()
        .descriptor(
            ModuleDescriptor::new(module_id("aaa")).with_priority(10),
            ModuleScript::new(),
        )
        .descriptor(
            ModuleDescriptor::new(module_id("zzz")).with_priority(-5),
            ModuleScript::new(),
        )
        .build();

    let order = resolver::topological_order(&registry, &registry.ids()).unwrap();
    assert_eq!(order, vec![module_id("zzz"), module_id("aaa")]);
}

#[tokio::test]
async fn test_cyclic_profile_fails_before_loading_anything() {
    let journal = Journal::new();
    let registry = RegistryBuilder::new()
        .module("anchor", &[], &[], ModuleScript::new().with_journal(&journal))
        .module("c", &["d"], &[], ModuleScript::new().with_journal(&journal))
        .module("d", &["c"], &[], ModuleScript::new().with_journal(&journal))
        .build_unchecked();
    let config = r#"
        default_profile = "safe"

        [profiles.safe]
        modules = ["anchor"]

        [profiles.loop]
        modules = ["c"]
    "#;
    let h = Harness::new(registry, config, journal);
    assert!(h.manager.initialize().await.success);
    h.journal.clear();

    let report = h.manager.switch_profile("loop", false).await;
    assert!(!report.success);
    assert_eq!(
        report.failure,
        Some(SwitchFailure::CircularDependency(vec![
            module_id("c"),
            module_id("d"),
        ]))
    );
    assert!(report.unloaded.is_empty());
    assert!(h.journal.entries().is_empty());
    assert_eq!(h.manager.current_profile().as_deref(), Some("safe"));
    assert_eq!(h.loaded(), vec!["anchor"]);
}

#[tokio::test]
async fn test_all_profile_loads_whole_registry() {
    let registry = RegistryBuilder::new()
        .module("one", &[], &[], ModuleScript::new())
        .module("two", &["one"], &[], ModuleScript::new())
        .module("three", &[], &["all"], ModuleScript::new())
        .build();
    let config = r#"
        default_profile = "core"

        [profiles.core]
        modules = []

        [profiles.full]
        modules = ["all"]
    "#;
    let h = Harness::new(registry, config, Journal::new());

    assert!(h.manager.initialize().await.success);
    assert_eq!(h.loaded(), vec!["three"]);

    let report = h.manager.switch_profile("full", false).await;
    assert!(report.success);
    assert_eq!(report.kept, vec![module_id("three")]);
    assert_eq!(h.loaded(), vec!["one", "three", "two"]);
}
