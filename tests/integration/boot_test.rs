//! Integration tests for launching the TCP host.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpStream;

use kindling_core::error::BootError;
use kindling_plugin::{DefaultImpl, Registration};
use kindling_runtime::{BootPhase, Stage};

use crate::helpers::{self, TestApp, TracingPlugin};

#[tokio::test]
async fn test_reverse_order_fan_out_boots() {
    let app = TestApp::new();

    let handle = app
        .orchestrator
        .launch(helpers::launch_options(&["admin", "security", "core"], json!({})))
        .await
        .unwrap();

    assert_eq!(app.orchestrator.phase(), BootPhase::Running);
    assert_eq!(app.log.order(), vec!["core", "security", "admin"]);

    let core = app.log.get("core").unwrap();
    let security = app.log.get("security").unwrap();
    let admin = app.log.get("admin").unwrap();
    assert!(admin.started >= core.finished.unwrap());
    assert!(admin.started >= security.finished.unwrap());

    for name in ["core", "security", "admin"] {
        assert!(handle.dependencies.state(name).unwrap().is_fulfilled());
    }
    assert!(handle.dependencies.pending_report().is_empty());

    app.host.shutdown().await;
}

#[tokio::test]
async fn test_builtin_plugins_receive_launch_options() {
    let app = TestApp::new();

    let handle = app
        .orchestrator
        .launch(helpers::launch_options(&["status", "system"], json!({})))
        .await
        .unwrap();

    match handle.dependencies.state("system").unwrap() {
        kindling_plugin::DependencyState::Fulfilled(value) => {
            assert_eq!(value["test_mode"], json!(true));
        }
        other => panic!("unexpected state {other:?}"),
    }
    assert!(handle.dependencies.state("status").unwrap().is_fulfilled());

    app.host.shutdown().await;
}

#[tokio::test]
async fn test_host_accepts_on_ephemeral_ports() {
    let app = TestApp::new();

    let handle = app
        .orchestrator
        .launch(helpers::launch_options(
            &["system"],
            json!({ "server": { "host": "127.0.0.1", "port": 0, "admin_port": 0 } }),
        ))
        .await
        .unwrap();

    assert_eq!(handle.connections.len(), 2);
    let api = app.host.addr_for("api").unwrap();
    let admin = app.host.addr_for("admin").unwrap();
    assert_ne!(api, admin);
    assert_eq!(handle.info["connections"].as_array().map(Vec::len), Some(2));

    for addr in [api, admin] {
        let connected = tokio::time::timeout(Duration::from_secs(5), TcpStream::connect(addr))
            .await
            .unwrap();
        assert!(connected.is_ok());
    }

    app.host.shutdown().await;
}

#[tokio::test]
async fn test_second_launch_fails() {
    let app = TestApp::new();
    app.orchestrator
        .launch(helpers::launch_options(&["system"], json!({})))
        .await
        .unwrap();

    let err = app
        .orchestrator
        .launch(helpers::launch_options(&["system"], json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, BootError::AlreadyLaunched));

    app.host.shutdown().await;
}

#[tokio::test]
async fn test_stage_failure_names_stage_and_stops_sequence() {
    let app = TestApp::new();
    app.orchestrator
        .register_hook_fn("configure-documentation", |_p, _d| async move {
            Err(BootError::configuration("documentation host unreachable"))
        })
        .await;

    let err = app
        .orchestrator
        .launch(helpers::launch_options(&["core"], json!({})))
        .await
        .unwrap_err();

    match &err {
        BootError::StageFailed { stage, source } => {
            assert_eq!(stage, "configure-documentation");
            assert!(matches!(source.as_ref(), BootError::Configuration(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(
        app.orchestrator.phase(),
        BootPhase::Failed(Stage::ConfigureDocumentation)
    );
    // register-plugins never ran
    assert_eq!(app.log.len(), 0);
    assert!(app.orchestrator.dependencies().get("core").is_none());
}

#[tokio::test]
async fn test_disabled_features_skip_their_stages() {
    let app = TestApp::new();
    app.orchestrator
        .register_hook_fn("configure-security", |params, default: DefaultImpl| async move {
            let result = default.call(params).await?;
            if !result.is_null() {
                return Err(BootError::internal("security default ran while disabled"));
            }
            Ok(result)
        })
        .await;

    let seen = Arc::new(parking_lot::Mutex::new(Value::Null));
    let sink = Arc::clone(&seen);
    app.orchestrator
        .register_hook_fn("configure-documentation", move |params, default: DefaultImpl| {
            let sink = Arc::clone(&sink);
            async move {
                let result = default.call(params).await?;
                *sink.lock() = result.clone();
                Ok(result)
            }
        })
        .await;

    app.orchestrator
        .launch(helpers::launch_options(&["system"], json!({})))
        .await
        .unwrap();

    // The documentation default hands back its params untouched when disabled.
    let documentation = seen.lock().clone();
    assert_eq!(documentation["documentation"]["schemes"], json!(["http"]));
    assert_eq!(documentation["documentation"]["host"], json!("localhost:5000"));

    app.host.shutdown().await;
}

#[tokio::test]
async fn test_failing_framework_plugin_fails_boot() {
    let app = TestApp::with_catalog(|catalog, log| {
        helpers::with_fan_out(catalog, log).with(
            "broken",
            "0.1.0",
            ["core"],
            Arc::new(TracingPlugin::new("broken", log).failing("strategy refused")),
        )
    });

    let err = app
        .orchestrator
        .launch(helpers::launch_options(&["broken", "core"], json!({})))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BootError::StageFailed { ref stage, ref source }
            if stage == "register-plugins"
                && matches!(source.as_ref(), BootError::ActivationFailed { plugin, message }
                    if plugin == "broken" && message == "strategy refused")
    ));
    let dependencies = app.orchestrator.dependencies();
    assert!(dependencies.state("core").unwrap().is_fulfilled());
    assert!(dependencies.state("broken").unwrap().is_rejected());
}

#[tokio::test]
async fn test_unknown_framework_plugin_is_configuration_error() {
    let app = TestApp::new();
    let err = app
        .orchestrator
        .launch(helpers::launch_options(&["nope"], json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err.root_cause(), BootError::Configuration(_)));
}

#[tokio::test]
async fn test_hook_installs_extra_plugin_alongside_framework() {
    let app = TestApp::new();
    let installer = Arc::clone(app.orchestrator.installer());
    let log = app.log.clone();

    app.orchestrator
        .register_hook_fn("register-plugins", move |params, default: DefaultImpl| {
            let installer = Arc::clone(&installer);
            let log = log.clone();
            async move {
                let extra = Registration::new(
                    "reports",
                    "2.0.0",
                    Arc::new(TracingPlugin::new("reports", &log)),
                )
                .with_deps(["admin"]);
                let (framework, extra) =
                    tokio::join!(default.call(params), installer.install(extra));
                extra?;
                framework
            }
        })
        .await;

    app.orchestrator
        .launch(helpers::launch_options(&["admin", "security", "core"], json!({})))
        .await
        .unwrap();

    assert_eq!(app.log.order().last().map(String::as_str), Some("reports"));
    assert!(app.orchestrator.dependencies().state("reports").unwrap().is_fulfilled());

    app.host.shutdown().await;
}

#[tokio::test]
async fn test_configure_runtime_hook_sets_bind_host() {
    let app = TestApp::new();
    app.orchestrator
        .register_hook_fn("configure-runtime", |params, default: DefaultImpl| async move {
            let mut runtime = default.call(params).await?;
            runtime["bind_host"] = json!("127.0.0.1");
            Ok(runtime)
        })
        .await;

    let handle = app
        .orchestrator
        .launch(helpers::launch_options(
            &["system"],
            json!({ "server": { "host": "0.0.0.0", "port": 0 } }),
        ))
        .await
        .unwrap();

    assert_eq!(handle.context.runtime_options()["bind_host"], json!("127.0.0.1"));
    let api = app.host.addr_for("api").unwrap();
    assert!(api.ip().is_loopback());

    app.host.shutdown().await;
}
