//! Integration tests for dependency-ordered plugin installation.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use kindling_core::error::BootError;
use kindling_plugin::{DependencyRegistry, DirectActivator, PluginInstaller, Registration};

use crate::helpers::{ActivationLog, TracingPlugin};

fn installer(registry: &Arc<DependencyRegistry>, timeout_ms: u64) -> Arc<PluginInstaller> {
    Arc::new(
        PluginInstaller::new(Arc::clone(registry), Arc::new(DirectActivator))
            .with_timeout(Duration::from_millis(timeout_ms)),
    )
}

fn plugin(name: &str, log: &ActivationLog, delay_ms: u64) -> Registration {
    Registration::new(
        name,
        "1.0.0",
        Arc::new(TracingPlugin::new(name, log).with_delay(Duration::from_millis(delay_ms))),
    )
}

#[tokio::test(start_paused = true)]
async fn test_activation_starts_after_last_dependency() {
    let registry = Arc::new(DependencyRegistry::new());
    let installer = installer(&registry, 5000);
    let log = ActivationLog::default();
    let begin = Instant::now();

    let outcomes = installer
        .install_all(vec![
            plugin("admin", &log, 0).with_deps(["core", "security"]),
            plugin("security", &log, 20),
            plugin("core", &log, 10),
        ])
        .await;
    assert!(outcomes.iter().all(|(_, outcome)| outcome.is_ok()));

    let t1 = log.get("core").unwrap().finished.unwrap();
    let t2 = log.get("security").unwrap().finished.unwrap();
    let admin = log.get("admin").unwrap();
    assert!(t1 - begin >= Duration::from_millis(10));
    assert!(t2 - begin >= Duration::from_millis(20));
    assert!(admin.started >= t2);
}

#[tokio::test(start_paused = true)]
async fn test_missing_dependency_times_out() {
    let registry = Arc::new(DependencyRegistry::new());
    let installer = installer(&registry, 50);
    let log = ActivationLog::default();
    let begin = Instant::now();

    let err = installer
        .install(plugin("admin", &log, 0).with_deps(["core", "ghost"]))
        .await;
    let elapsed = begin.elapsed();

    // `core` is never installed either, both stay pending
    let err = err.unwrap_err();
    match &err {
        BootError::DependencyTimeout {
            plugin,
            outstanding,
            timeout_ms,
        } => {
            assert_eq!(plugin, "admin");
            assert_eq!(outstanding, &vec!["core".to_string(), "ghost".to_string()]);
            assert_eq!(*timeout_ms, 50);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(60));
    assert_eq!(log.len(), 0);
    assert!(registry.state("ghost").unwrap().is_pending());
    assert!(registry.state("admin").unwrap().is_rejected());
}

#[tokio::test(start_paused = true)]
async fn test_rejection_fails_dependants_before_timeout() {
    let registry = Arc::new(DependencyRegistry::new());
    let installer = installer(&registry, 5000);
    let log = ActivationLog::default();
    let begin = Instant::now();

    let broken = Registration::new(
        "core",
        "1.0.0",
        Arc::new(
            TracingPlugin::new("core", &log)
                .with_delay(Duration::from_millis(10))
                .failing("disk full"),
        ),
    );
    let outcomes = installer
        .install_all(vec![
            plugin("admin", &log, 0).with_deps(["security"]),
            plugin("security", &log, 0).with_deps(["core"]),
            broken,
        ])
        .await;

    assert!(begin.elapsed() < Duration::from_millis(5000));
    for (name, outcome) in &outcomes {
        assert!(outcome.is_err(), "{name} should have failed");
    }
    let admin_err = outcomes
        .iter()
        .find(|(name, _)| name == "admin")
        .and_then(|(_, outcome)| outcome.clone().err())
        .unwrap();
    assert_eq!(admin_err.unmet_dependencies(), vec!["security".to_string()]);
    assert_eq!(log.order(), vec!["core"]);
}

#[tokio::test]
async fn test_reregistered_forward_reference_keeps_waiters() {
    let registry = Arc::new(DependencyRegistry::new());
    let installer = installer(&registry, 5000);
    let log = ActivationLog::default();

    let waiters: Vec<_> = ["web", "jobs"]
        .into_iter()
        .map(|name| {
            let installer = Arc::clone(&installer);
            let registration = plugin(name, &log, 0).with_deps(["db"]);
            tokio::spawn(async move { installer.install(registration).await })
        })
        .collect();

    while registry.get("db").map_or(0, |entry| entry.waiter_count()) < 2 {
        tokio::task::yield_now().await;
    }
    let placeholder = registry.get("db").unwrap();
    assert!(!placeholder.is_registered());

    installer.install(plugin("db", &log, 0)).await.unwrap();
    for waiter in waiters {
        waiter.await.unwrap().unwrap();
    }

    let entry = registry.get("db").unwrap();
    assert!(Arc::ptr_eq(&placeholder, &entry));
    assert_eq!(entry.version().as_deref(), Some("1.0.0"));
    assert_eq!(log.order()[0], "db");
    assert_eq!(log.len(), 3);
}

#[tokio::test]
async fn test_duplicate_install_activates_once() {
    let registry = Arc::new(DependencyRegistry::new());
    let installer = installer(&registry, 5000);
    let log = ActivationLog::default();

    let (first, second) = tokio::join!(
        installer.install(plugin("core", &log, 0)),
        installer.install(plugin("core", &log, 0)),
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(log.len(), 1);
    assert!(registry.state("core").unwrap().is_fulfilled());
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].name, "core");
    assert_eq!(snapshot[0].state, "fulfilled");
}
