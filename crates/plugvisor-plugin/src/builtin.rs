// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process plugins shipped with the host.
//!
//! Both live in the `plugvisor-builtin` module and serve as working examples
//! of the [`Plugin`] contract.

use std::sync::Arc;

use async_trait::async_trait;
use plugvisor_core::{HostContext, LogLevel, Plugin, PlugvisorError};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::manifest::PluginDefinition;
use crate::module::ModuleRegistry;

/// Module name to put in `assembly_path`.
pub const BUILTIN_MODULE: &str = "plugvisor-builtin";

/// Entry type of the calculator plugin.
pub const CALCULATOR_ENTRY: &str = "plugvisor.builtin.Calculator";

/// Entry type of the echo plugin.
pub const ECHO_ENTRY: &str = "plugvisor.builtin.Echo";

pub(crate) fn register(registry: &mut ModuleRegistry) {
    registry.register(
        BUILTIN_MODULE,
        CALCULATOR_ENTRY,
        |def: &PluginDefinition| -> Result<Arc<dyn Plugin>, PlugvisorError> {
            Ok(Arc::new(Calculator::new(&def.id)))
        },
    );
    registry.register(
        BUILTIN_MODULE,
        ECHO_ENTRY,
        |def: &PluginDefinition| -> Result<Arc<dyn Plugin>, PlugvisorError> {
            Ok(Arc::new(Echo::new(&def.id)))
        },
    );
}

/// Host context and instance id handed over by `initialize`.
#[derive(Default)]
struct Attachment {
    host: Option<Arc<dyn HostContext>>,
    instance_id: String,
}

impl Attachment {
    fn log(&self, level: LogLevel, message: &str) {
        if let Some(host) = &self.host {
            host.log(level, message);
        }
    }
}

/// Adds numbers.
///
/// Commands: `add` with `{"a": number, "b": number}`, and `ping`.
pub struct Calculator {
    plugin_id: String,
    attachment: Mutex<Attachment>,
}

impl Calculator {
    pub fn new(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            attachment: Mutex::new(Attachment::default()),
        }
    }

    fn add(payload: &Value) -> Value {
        let operands = (
            payload.get("a").filter(|v| v.is_number()),
            payload.get("b").filter(|v| v.is_number()),
        );
        let (Some(a), Some(b)) = operands else {
            return Value::String(format!(
                "invalid payload: expected {{\"a\": number, \"b\": number}}, got {payload}"
            ));
        };

        match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => match a.checked_add(b) {
                Some(sum) => Value::from(sum),
                None => Value::from(a as f64 + b as f64),
            },
            _ => {
                let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
                Value::from(sum)
            }
        }
    }
}

#[async_trait]
impl Plugin for Calculator {
    fn id(&self) -> &str {
        &self.plugin_id
    }

    async fn initialize(
        &self,
        host: Arc<dyn HostContext>,
        instance_id: &str,
        _configuration: &str,
    ) -> Result<(), PlugvisorError> {
        let mut attachment = self.attachment.lock().await;
        attachment.host = Some(host);
        attachment.instance_id = instance_id.to_string();
        attachment.log(LogLevel::Info, "calculator initialized");
        Ok(())
    }

    async fn start(&self) -> Result<(), PlugvisorError> {
        self.attachment.lock().await.log(LogLevel::Info, "calculator started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlugvisorError> {
        self.attachment.lock().await.log(LogLevel::Info, "calculator stopped");
        Ok(())
    }

    async fn execute_command(&self, name: &str, payload: Value) -> Result<Value, PlugvisorError> {
        match name {
            "add" => Ok(Self::add(&payload)),
            "ping" => Ok(Value::String("pong".to_string())),
            other => Err(PlugvisorError::plugin(format!("unknown command '{other}'"))),
        }
    }
}

/// Acknowledges every command and logs each life-cycle call through the host.
pub struct Echo {
    plugin_id: String,
    attachment: Mutex<Attachment>,
}

impl Echo {
    pub fn new(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            attachment: Mutex::new(Attachment::default()),
        }
    }

    async fn record(&self, event: &str) {
        let attachment = self.attachment.lock().await;
        let message = format!("{event} (instance {})", attachment.instance_id);
        attachment.log(LogLevel::Info, &message);
    }
}

#[async_trait]
impl Plugin for Echo {
    fn id(&self) -> &str {
        &self.plugin_id
    }

    async fn initialize(
        &self,
        host: Arc<dyn HostContext>,
        instance_id: &str,
        configuration: &str,
    ) -> Result<(), PlugvisorError> {
        {
            let mut attachment = self.attachment.lock().await;
            attachment.host = Some(host);
            attachment.instance_id = instance_id.to_string();
        }
        self.record(&format!("initialize with {} bytes of configuration", configuration.len()))
            .await;
        Ok(())
    }

    async fn start(&self) -> Result<(), PlugvisorError> {
        self.record("start").await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlugvisorError> {
        self.record("stop").await;
        Ok(())
    }

    async fn execute_command(&self, name: &str, _payload: Value) -> Result<Value, PlugvisorError> {
        self.record(&format!("command {name}")).await;
        Ok(Value::String(format!("Command {name} executed")))
    }

    async fn dispose(&self) -> Result<(), PlugvisorError> {
        self.record("dispose").await;
        self.attachment.lock().await.host = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;

    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingHost {
        lines: StdMutex<Vec<(LogLevel, String)>>,
    }

    impl HostContext for RecordingHost {
        fn log(&self, level: LogLevel, message: &str) {
            self.lines.lock().unwrap().push((level, message.to_string()));
        }

        fn workspace_path(&self) -> PathBuf {
            PathBuf::from("/tmp/ws")
        }
    }

    #[tokio::test]
    async fn calculator_adds_integers() {
        let calc = Calculator::new("calc");
        let result = calc.execute_command("add", json!({"a": 5, "b": 3})).await.unwrap();
        assert_eq!(result, json!(8));
    }

    #[tokio::test]
    async fn calculator_adds_floats() {
        let calc = Calculator::new("calc");
        let result = calc.execute_command("add", json!({"a": 1.5, "b": 2})).await.unwrap();
        assert_eq!(result, json!(3.5));
    }

    #[tokio::test]
    async fn calculator_reports_bad_payload_as_result() {
        let calc = Calculator::new("calc");
        let result = calc.execute_command("add", json!({"a": "five"})).await.unwrap();
        let text = result.as_str().unwrap();
        assert!(text.starts_with("invalid payload"), "{text}");
    }

    #[tokio::test]
    async fn calculator_ping_and_unknown_command() {
        let calc = Calculator::new("calc");
        assert_eq!(calc.execute_command("ping", Value::Null).await.unwrap(), json!("pong"));
        let err = calc.execute_command("divide", Value::Null).await.unwrap_err();
        assert!(matches!(err, PlugvisorError::Plugin { .. }));
    }

    #[tokio::test]
    async fn echo_acknowledges_and_records_lifecycle() {
        let host = Arc::new(RecordingHost::default());
        let echo = Echo::new("echo");
        echo.initialize(host.clone(), "inst-7", "{}").await.unwrap();
        echo.start().await.unwrap();
        let result = echo.execute_command("hello", json!({})).await.unwrap();
        assert_eq!(result, json!("Command hello executed"));
        echo.stop().await.unwrap();
        echo.dispose().await.unwrap();

        let lines = host.lines.lock().unwrap();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].1.contains("initialize"));
        assert!(lines[0].1.contains("inst-7"));
        assert!(lines[4].1.starts_with("dispose"));
    }
}
