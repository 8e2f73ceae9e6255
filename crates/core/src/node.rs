use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::watch;

use crate::types::{PortData, PortType};

#[derive(Debug, Clone, PartialEq)]
pub struct PortDefinition {
    pub name: String,
    pub port_type: PortType,
    pub required: bool,
    pub default_value: Option<serde_json::Value>,
}

pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Per-run context handed to every node: the cancellation signal and
/// progress sink are explicit, injected values — never process-wide state.
#[derive(Default)]
pub struct ExecutionContext {
    pub cancel: Option<watch::Receiver<bool>>,
    pub progress: Option<ProgressCallback>,
}

impl ExecutionContext {
    pub fn cancel_requested(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    pub fn report_progress(&self, done: u64, total: u64) {
        if let Some(callback) = &self.progress {
            callback(done, total);
        }
    }
}

/// Core node trait that all nodes implement.
pub trait Node: Send + Sync {
    fn node_type(&self) -> &str;
    fn input_ports(&self) -> Vec<PortDefinition>;
    fn output_ports(&self) -> Vec<PortDefinition>;
    fn execute(
        &mut self,
        inputs: &HashMap<String, PortData>,
        ctx: &ExecutionContext,
    ) -> Result<HashMap<String, PortData>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_definition_creation() {
        let input = PortDefinition {
            name: "frames".to_string(),
            port_type: PortType::Frames,
            required: true,
            default_value: None,
        };

        let multiplier = PortDefinition {
            name: "multiplier".to_string(),
            port_type: PortType::Float,
            required: false,
            default_value: Some(serde_json::json!(0.5)),
        };

        assert_eq!(input.name, "frames");
        assert_eq!(input.port_type, PortType::Frames);
        assert!(input.required);
        assert!(input.default_value.is_none());

        assert_eq!(multiplier.port_type, PortType::Float);
        assert!(!multiplier.required);
        assert_eq!(multiplier.default_value, Some(serde_json::json!(0.5)));
    }

    #[test]
    fn test_execution_context_defaults_to_uncancelled() {
        let ctx = ExecutionContext::default();
        assert!(!ctx.cancel_requested());
        ctx.report_progress(1, 2);
    }

    #[test]
    fn test_execution_context_observes_cancel_signal() {
        let (tx, rx) = watch::channel(false);
        let ctx = ExecutionContext {
            cancel: Some(rx),
            progress: None,
        };
        assert!(!ctx.cancel_requested());
        tx.send(true).unwrap();
        assert!(ctx.cancel_requested());
    }
}
