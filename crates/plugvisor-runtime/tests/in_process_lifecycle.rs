// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Life-cycle tests for in-process plugins driven through the registry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::fixture;
use plugvisor_core::{HostContext, InstanceStatus, Plugin, PlugvisorError};
use plugvisor_plugin::{BUILTIN_MODULE, CALCULATOR_ENTRY, ModuleRegistry, PluginDefinition};
use serde_json::{Value, json};
use tokio::sync::Notify;

fn calculator_manifest() -> Value {
    json!({
        "id": "calc",
        "name": "Calculator",
        "version": "1.0.0",
        "plugin_type": "InProcessModule",
        "assembly_path": BUILTIN_MODULE,
        "main_class": CALCULATOR_ENTRY
    })
}

#[tokio::test]
async fn calculator_full_lifecycle() {
    let fx = fixture(&[("calc", calculator_manifest())], ModuleRegistry::with_builtins());
    let registry = &fx.registry;

    let info = registry.create("calc", "ws1", "").await.unwrap();
    assert_eq!(info.status, InstanceStatus::Created);
    assert_eq!(info.plugin_name, "Calculator");
    assert_eq!(registry.configuration(&info.instance_id).await.as_deref(), Some("{}"));
    let id = info.instance_id;

    registry.initialize(&id).await.unwrap();
    let info = registry.info(&id).await.unwrap();
    assert_eq!(info.status, InstanceStatus::Initialized);
    assert!(info.initialized_at.is_some());

    registry.start(&id).await.unwrap();
    assert_eq!(registry.status(&id).await, Some(InstanceStatus::Running));

    let sum = registry
        .execute_command(&id, "add", json!({"a": 5, "b": 3}))
        .await
        .unwrap();
    assert_eq!(sum, json!(8));

    let bad = registry
        .execute_command(&id, "add", json!({"x": 1}))
        .await
        .unwrap();
    assert!(bad.as_str().unwrap().starts_with("invalid payload"));

    registry.stop(&id).await.unwrap();
    let info = registry.info(&id).await.unwrap();
    assert_eq!(info.status, InstanceStatus::Stopped);
    assert!(info.stopped_at.is_some());

    // Restart, then dispose while running.
    registry.start(&id).await.unwrap();
    assert_eq!(registry.status(&id).await, Some(InstanceStatus::Running));
    registry.dispose(&id).await.unwrap();

    assert_eq!(registry.status(&id).await, None);
    assert!(registry.info(&id).await.is_none());
    assert!(registry.is_empty());
    assert!(registry.dispose(&id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn unknown_plugin_is_rejected_before_creating_anything() {
    let fx = fixture(&[("calc", calculator_manifest())], ModuleRegistry::with_builtins());
    let err = fx.registry.create("nope", "ws", "{}").await.unwrap_err();
    assert_eq!(err.to_string(), "plugin not found: nope");
    assert!(fx.registry.is_empty());
    assert!(fx.registry.list_all().await.is_empty());
}

#[tokio::test]
async fn plugin_lookup_is_case_insensitive() {
    let fx = fixture(&[("calc", calculator_manifest())], ModuleRegistry::with_builtins());
    let info = fx.registry.create("CALC", "ws", "{}").await.unwrap();
    assert_eq!(info.plugin_id, "calc");
}

#[tokio::test]
async fn unknown_instance_ids() {
    let fx = fixture(&[], ModuleRegistry::with_builtins());
    let registry = &fx.registry;

    for result in [
        registry.initialize("missing").await,
        registry.start("missing").await,
        registry.stop("missing").await,
        registry.dispose("missing").await,
    ] {
        let err = result.unwrap_err();
        assert!(err.is_not_found(), "{err}");
        assert_eq!(err.to_string(), "plugin instance not found: missing");
    }
    assert!(
        registry
            .execute_command("missing", "ping", Value::Null)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert_eq!(registry.status("missing").await, None);
    assert!(registry.info("missing").await.is_none());
}

#[tokio::test]
async fn illegal_transitions_leave_status_untouched() {
    let fx = fixture(&[("calc", calculator_manifest())], ModuleRegistry::with_builtins());
    let registry = &fx.registry;
    let id = registry.create("calc", "ws", "{}").await.unwrap().instance_id;

    let err = registry.start(&id).await.unwrap_err();
    assert!(matches!(
        err,
        PlugvisorError::InvalidState { status: InstanceStatus::Created, .. }
    ));
    assert_eq!(registry.status(&id).await, Some(InstanceStatus::Created));

    let err = registry.stop(&id).await.unwrap_err();
    assert!(matches!(err, PlugvisorError::InvalidState { .. }));

    registry.initialize(&id).await.unwrap();
    let err = registry.initialize(&id).await.unwrap_err();
    assert!(matches!(
        err,
        PlugvisorError::InvalidState { status: InstanceStatus::Initialized, .. }
    ));

    let err = registry
        .execute_command(&id, "ping", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, PlugvisorError::InvalidState { .. }));
    assert_eq!(registry.status(&id).await, Some(InstanceStatus::Initialized));
}

#[tokio::test]
async fn load_failure_moves_instance_to_error() {
    let manifest = json!({
        "id": "broken",
        "name": "Broken",
        "assembly_path": BUILTIN_MODULE,
        "main_class": "plugvisor.builtin.DoesNotExist"
    });
    let fx = fixture(&[("broken", manifest)], ModuleRegistry::with_builtins());
    let registry = &fx.registry;
    let id = registry.create("broken", "ws", "{}").await.unwrap().instance_id;

    let err = registry.initialize(&id).await.unwrap_err();
    assert!(matches!(err, PlugvisorError::LoadFailure { .. }), "{err}");

    let info = registry.info(&id).await.unwrap();
    assert_eq!(info.status, InstanceStatus::Error);
    assert!(info.last_error.unwrap().contains("DoesNotExist"));

    // Error only leads to disposal.
    assert!(matches!(
        registry.start(&id).await.unwrap_err(),
        PlugvisorError::InvalidState { status: InstanceStatus::Error, .. }
    ));
    registry.dispose(&id).await.unwrap();
    assert!(registry.is_empty());
}

#[tokio::test]
async fn unknown_command_is_a_plugin_error_and_keeps_running() {
    let fx = fixture(&[("calc", calculator_manifest())], ModuleRegistry::with_builtins());
    let registry = &fx.registry;
    let id = registry.create("calc", "ws", "{}").await.unwrap().instance_id;
    registry.initialize(&id).await.unwrap();
    registry.start(&id).await.unwrap();

    let err = registry
        .execute_command(&id, "divide", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, PlugvisorError::Plugin { .. }));
    assert_eq!(registry.status(&id).await, Some(InstanceStatus::Running));
    assert_eq!(
        registry.execute_command(&id, "ping", Value::Null).await.unwrap(),
        json!("pong")
    );
}

struct Exploding;

#[async_trait]
impl Plugin for Exploding {
    fn id(&self) -> &str {
        "exploding"
    }

    async fn initialize(
        &self,
        _host: Arc<dyn HostContext>,
        _instance_id: &str,
        _configuration: &str,
    ) -> Result<(), PlugvisorError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), PlugvisorError> {
        panic!("boom on start");
    }

    async fn stop(&self) -> Result<(), PlugvisorError> {
        Ok(())
    }

    async fn execute_command(&self, _name: &str, _payload: Value) -> Result<Value, PlugvisorError> {
        Ok(Value::Null)
    }
}

fn custom_manifest(id: &str, entry: &str) -> Value {
    json!({
        "id": id,
        "name": id,
        "assembly_path": "test-module",
        "main_class": entry
    })
}

#[tokio::test]
async fn plugin_panic_becomes_instance_error() {
    let mut modules = ModuleRegistry::new();
    modules.register("test-module", "Exploding", |_: &PluginDefinition| {
        Ok(Arc::new(Exploding) as Arc<dyn Plugin>)
    });
    let fx = fixture(&[("exploding", custom_manifest("exploding", "Exploding"))], modules);
    let registry = &fx.registry;

    let id = registry.create("exploding", "ws", "{}").await.unwrap().instance_id;
    registry.initialize(&id).await.unwrap();
    let err = registry.start(&id).await.unwrap_err();
    assert!(err.to_string().contains("boom on start"), "{err}");

    let info = registry.info(&id).await.unwrap();
    assert_eq!(info.status, InstanceStatus::Error);
    assert!(info.last_error.unwrap().contains("panicked during start"));
}

struct Gated {
    gate: Arc<Notify>,
}

#[async_trait]
impl Plugin for Gated {
    fn id(&self) -> &str {
        "gated"
    }

    async fn initialize(
        &self,
        _host: Arc<dyn HostContext>,
        _instance_id: &str,
        _configuration: &str,
    ) -> Result<(), PlugvisorError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), PlugvisorError> {
        self.gate.notified().await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlugvisorError> {
        Ok(())
    }

    async fn execute_command(&self, _name: &str, _payload: Value) -> Result<Value, PlugvisorError> {
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn concurrent_lifecycle_call_is_rejected() {
    let gate = Arc::new(Notify::new());
    let factory_gate = Arc::clone(&gate);
    let mut modules = ModuleRegistry::new();
    modules.register("test-module", "Gated", move |_: &PluginDefinition| {
        Ok(Arc::new(Gated {
            gate: Arc::clone(&factory_gate),
        }) as Arc<dyn Plugin>)
    });
    let fx = fixture(&[("gated", custom_manifest("gated", "Gated"))], modules);
    let registry = &fx.registry;

    let id = registry.create("gated", "ws", "{}").await.unwrap().instance_id;
    registry.initialize(&id).await.unwrap();

    let (started, (status_during, competing)) = tokio::join!(registry.start(&id), async {
        let status = registry.status(&id).await;
        let competing = registry.stop(&id).await;
        gate.notify_one();
        (status, competing)
    });

    started.unwrap();
    assert_eq!(status_during, Some(InstanceStatus::Starting));
    let err = competing.unwrap_err();
    assert!(matches!(err, PlugvisorError::Busy { operation: "stop", .. }), "{err}");
    assert_eq!(registry.status(&id).await, Some(InstanceStatus::Running));
}

#[tokio::test]
async fn create_validated_enforces_schema() {
    let mut manifest = calculator_manifest();
    manifest["config_schema"] = json!({
        "type": "object",
        "properties": {"precision": {"type": "integer", "minimum": 0}},
        "required": ["precision"]
    });
    let fx = fixture(&[("calc", manifest)], ModuleRegistry::with_builtins());
    let registry = &fx.registry;

    let err = registry
        .create_validated("calc", "ws", r#"{"precision": -1}"#)
        .await
        .unwrap_err();
    match err {
        PlugvisorError::ValidationFailure { plugin_id, errors } => {
            assert_eq!(plugin_id, "calc");
            assert_eq!(errors.len(), 1);
            assert!(errors[0].starts_with("/precision"), "{errors:?}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(registry.is_empty());

    registry
        .create_validated("calc", "ws", r#"{"precision": 2}"#)
        .await
        .unwrap();
    // Plain create does not validate unless configured to.
    registry.create("calc", "ws", r#"{"precision": "x"}"#).await.unwrap();
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn listing_by_workspace() {
    let fx = fixture(&[("calc", calculator_manifest())], ModuleRegistry::with_builtins());
    let registry = &fx.registry;
    let pause = || tokio::time::sleep(Duration::from_millis(5));
    let first = registry.create("calc", "Alpha", "{}").await.unwrap();
    pause().await;
    let second = registry.create("calc", "beta", "{}").await.unwrap();
    pause().await;
    let third = registry.create("calc", "alpha", "{}").await.unwrap();

    let alpha: Vec<String> = registry
        .list_by_workspace("ALPHA")
        .await
        .into_iter()
        .map(|i| i.instance_id)
        .collect();
    assert_eq!(alpha, vec![first.instance_id.clone(), third.instance_id.clone()]);

    assert!(registry.list_by_workspace("  ").await.is_empty());
    assert!(registry.list_by_workspace("gamma").await.is_empty());

    let all: Vec<String> = registry
        .list_all()
        .await
        .into_iter()
        .map(|i| i.instance_id)
        .collect();
    assert_eq!(all, vec![first.instance_id, second.instance_id, third.instance_id]);
}

#[tokio::test]
async fn shutdown_all_disposes_everything() {
    let fx = fixture(&[("calc", calculator_manifest())], ModuleRegistry::with_builtins());
    let registry = &fx.registry;
    let running = registry.create("calc", "ws", "{}").await.unwrap().instance_id;
    registry.initialize(&running).await.unwrap();
    registry.start(&running).await.unwrap();
    registry.create("calc", "ws", "{}").await.unwrap();

    registry.shutdown_all().await;
    assert!(registry.is_empty());
    assert_eq!(registry.status(&running).await, None);
}
