use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

use crate::error::ResampleError;
use crate::graph::PipelineGraph;
use crate::node::{ExecutionContext, ProgressCallback};
use crate::registry::NodeRegistry;
use crate::types::{PortData, PortType};

pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn execute(
        graph: &PipelineGraph,
        registry: &NodeRegistry,
    ) -> Result<HashMap<String, HashMap<String, PortData>>> {
        Self::execute_with_context(graph, registry, ExecutionContext::default())
    }

    /// Run the graph in topological order on the calling thread.
    ///
    /// `ctx` carries the injected cancellation receiver and progress callback
    /// shared by every node. Cancellation is also polled between nodes, so a
    /// workflow stops at the next node boundary even if the current node does
    /// not poll.
    pub fn execute_with_context(
        graph: &PipelineGraph,
        registry: &NodeRegistry,
        ctx: ExecutionContext,
    ) -> Result<HashMap<String, HashMap<String, PortData>>> {
        graph.validate(registry)?;

        let execution_order = graph.execution_order()?;
        let mut outputs_by_node: HashMap<String, HashMap<String, PortData>> = HashMap::new();

        for node_idx in execution_order {
            if ctx.cancel_requested() {
                return Err(ResampleError::Cancelled.into());
            }

            let instance = graph.node(node_idx);
            let mut node = registry
                .create(&instance.node_type, instance.params.clone())
                .with_context(|| {
                    format!(
                        "failed to instantiate node '{}' of type '{}'",
                        instance.id, instance.node_type
                    )
                })?;

            let input_port_defs = node.input_ports();
            let mut inputs: HashMap<String, PortData> = HashMap::new();

            for (source_idx, connection) in graph.connections_to(node_idx) {
                let source_id = &graph.node(source_idx).id;
                let source_outputs = outputs_by_node
                    .get(source_id)
                    .ok_or_else(|| anyhow!("missing outputs for upstream node '{source_id}'"))?;

                let data = source_outputs.get(&connection.source_port).ok_or_else(|| {
                    anyhow!(
                        "upstream node '{}' did not produce output '{}'",
                        source_id,
                        connection.source_port
                    )
                })?;

                inputs.insert(connection.target_port.clone(), data.clone());
            }

            for input_port in input_port_defs {
                if inputs.contains_key(&input_port.name) {
                    continue;
                }

                if let Some(param_value) = instance.params.get(&input_port.name) {
                    let decoded = port_data_from_json(&input_port.port_type, param_value)
                        .with_context(|| {
                            format!(
                                "failed to decode param value for '{}.{}'",
                                instance.id, input_port.name
                            )
                        })?;
                    inputs.insert(input_port.name.clone(), decoded);
                    continue;
                }

                if let Some(default_value) = input_port.default_value {
                    let decoded = port_data_from_json(&input_port.port_type, &default_value)
                        .with_context(|| {
                            format!(
                                "failed to decode default value for '{}.{}'",
                                instance.id, input_port.name
                            )
                        })?;
                    inputs.insert(input_port.name, decoded);
                }
            }

            debug!(
                node = %instance.id,
                node_type = %instance.node_type,
                inputs = inputs.len(),
                "executing node"
            );

            let node_outputs = node
                .execute(&inputs, &ctx)
                .with_context(|| format!("execution failed for node '{}'", instance.id))?;

            outputs_by_node.insert(instance.id.clone(), node_outputs);
        }

        Ok(outputs_by_node)
    }
}

/// Build an [`ExecutionContext`] from optional endpoints.
pub fn execution_context(
    cancel: Option<tokio::sync::watch::Receiver<bool>>,
    progress: Option<ProgressCallback>,
) -> ExecutionContext {
    ExecutionContext { cancel, progress }
}

fn port_data_from_json(port_type: &PortType, value: &serde_json::Value) -> Result<PortData> {
    match port_type {
        PortType::Int => value
            .as_i64()
            .map(PortData::Int)
            .ok_or_else(|| anyhow!("expected integer, got {value}")),
        PortType::Float => value
            .as_f64()
            .map(PortData::Float)
            .ok_or_else(|| anyhow!("expected number, got {value}")),
        PortType::Str => value
            .as_str()
            .map(|s| PortData::Str(s.to_string()))
            .ok_or_else(|| anyhow!("expected string, got {value}")),
        PortType::Bool => value
            .as_bool()
            .map(PortData::Bool)
            .ok_or_else(|| anyhow!("expected boolean, got {value}")),
        PortType::Path => value
            .as_str()
            .map(|s| PortData::Path(PathBuf::from(s)))
            .ok_or_else(|| anyhow!("expected path string, got {value}")),
        PortType::Frames => bail!("Frames cannot be expressed as JSON; connect a frames output"),
    }
}
