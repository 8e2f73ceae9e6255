use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail, Context, Result};
use petgraph::algo::toposort;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::node::PortDefinition;
use crate::registry::NodeRegistry;
use crate::types::PortType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInstance {
    pub id: String,
    pub node_type: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConnection {
    pub source_port: String,
    pub target_port: String,
    pub port_type: PortType,
}

#[derive(Debug, Clone)]
pub struct PipelineGraph {
    graph: StableDiGraph<NodeInstance, PortConnection>,
    node_ids: HashMap<String, NodeIndex>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            node_ids: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, instance: NodeInstance) -> Result<NodeIndex> {
        if self.node_ids.contains_key(&instance.id) {
            bail!("duplicate node id: {}", instance.id);
        }

        let node_id = instance.id.clone();
        let index = self.graph.add_node(instance);
        self.node_ids.insert(node_id, index);
        Ok(index)
    }

    pub fn add_connection(
        &mut self,
        from_id: &str,
        connection: PortConnection,
        to_id: &str,
    ) -> Result<()> {
        let from_idx = self
            .node_ids
            .get(from_id)
            .copied()
            .ok_or_else(|| anyhow!("unknown source node id: {from_id}"))?;
        let to_idx = self
            .node_ids
            .get(to_id)
            .copied()
            .ok_or_else(|| anyhow!("unknown target node id: {to_id}"))?;

        self.graph.add_edge(from_idx, to_idx, connection);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Set `key` on every node of `node_type` that does not already carry it.
    /// Returns how many nodes were updated.
    pub fn inject_default_param(
        &mut self,
        node_type: &str,
        key: &str,
        value: serde_json::Value,
    ) -> usize {
        let mut injected = 0;
        let node_indices: Vec<_> = self.graph.node_indices().collect();

        for idx in node_indices {
            let Some(node) = self.graph.node_weight_mut(idx) else {
                continue;
            };
            if node.node_type != node_type || node.params.contains_key(key) {
                continue;
            }
            node.params.insert(key.to_string(), value.clone());
            injected += 1;
        }

        injected
    }

    pub fn validate(&self, registry: &NodeRegistry) -> Result<()> {
        self.execution_order()?;

        let definitions = self.collect_port_definitions(registry)?;

        for edge in self.graph.edge_references() {
            let source_idx = edge.source();
            let target_idx = edge.target();
            let connection = edge.weight();

            let source_node = self.node(source_idx);
            let target_node = self.node(target_idx);

            let source_outputs = &definitions
                .get(&source_idx)
                .expect("source node should be present")
                .1;
            let target_inputs = &definitions
                .get(&target_idx)
                .expect("target node should be present")
                .0;

            let source_port = source_outputs
                .iter()
                .find(|port| port.name == connection.source_port)
                .ok_or_else(|| {
                    anyhow!(
                        "node '{}' has no output port '{}'",
                        source_node.id,
                        connection.source_port
                    )
                })?;

            let target_port = target_inputs
                .iter()
                .find(|port| port.name == connection.target_port)
                .ok_or_else(|| {
                    anyhow!(
                        "node '{}' has no input port '{}'",
                        target_node.id,
                        connection.target_port
                    )
                })?;

            if !source_port.port_type.is_compatible(&target_port.port_type) {
                bail!(
                    "incompatible port types: '{}:{}' ({:?}) -> '{}:{}' ({:?})",
                    source_node.id,
                    connection.source_port,
                    source_port.port_type,
                    target_node.id,
                    connection.target_port,
                    target_port.port_type
                );
            }

            if !connection.port_type.is_compatible(&source_port.port_type) {
                bail!(
                    "connection '{}:{}' -> '{}:{}' declares {:?}, but node ports are {:?}",
                    source_node.id,
                    connection.source_port,
                    target_node.id,
                    connection.target_port,
                    connection.port_type,
                    source_port.port_type
                );
            }
        }

        for (idx, (input_ports, _)) in &definitions {
            let connected_inputs: HashSet<String> = self
                .connections_to(*idx)
                .into_iter()
                .map(|(_, conn)| conn.target_port.clone())
                .collect();

            let node = self.node(*idx);
            for input in input_ports {
                if input.required
                    && input.default_value.is_none()
                    && !connected_inputs.contains(&input.name)
                    && !node.params.contains_key(&input.name)
                {
                    bail!(
                        "node '{}' missing required input port '{}'",
                        node.id,
                        input.name
                    );
                }
            }
        }

        Ok(())
    }

    pub fn execution_order(&self) -> Result<Vec<NodeIndex>> {
        toposort(&self.graph, None).map_err(|_| anyhow!("cycle detected in pipeline graph"))
    }

    pub fn node(&self, idx: NodeIndex) -> &NodeInstance {
        self.graph
            .node_weight(idx)
            .expect("node index should be valid")
    }

    pub fn connections_to(&self, idx: NodeIndex) -> Vec<(NodeIndex, &PortConnection)> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|edge| (edge.source(), edge.weight()))
            .collect()
    }

    fn collect_port_definitions(
        &self,
        registry: &NodeRegistry,
    ) -> Result<HashMap<NodeIndex, (Vec<PortDefinition>, Vec<PortDefinition>)>> {
        let mut definitions = HashMap::new();

        for idx in self.graph.node_indices() {
            let instance = self.node(idx);
            let node = registry
                .create(&instance.node_type, instance.params.clone())
                .with_context(|| {
                    format!(
                        "failed to instantiate node '{}' of type '{}'",
                        instance.id, instance.node_type
                    )
                })?;

            definitions.insert(idx, (node.input_ports(), node.output_ports()));
        }

        Ok(definitions)
    }
}

impl Default for PipelineGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PipelineGraphSerde {
    nodes: Vec<NodeInstance>,
    connections: Vec<PipelineConnectionSerde>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PipelineConnectionSerde {
    from_node: String,
    from_port: String,
    to_node: String,
    to_port: String,
    port_type: PortType,
}

impl Serialize for PipelineGraph {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nodes: Vec<NodeInstance> = self
            .graph
            .node_indices()
            .map(|idx| self.node(idx).clone())
            .collect();

        let connections: Vec<PipelineConnectionSerde> = self
            .graph
            .edge_references()
            .map(|edge| PipelineConnectionSerde {
                from_node: self.node(edge.source()).id.clone(),
                from_port: edge.weight().source_port.clone(),
                to_node: self.node(edge.target()).id.clone(),
                to_port: edge.weight().target_port.clone(),
                port_type: edge.weight().port_type.clone(),
            })
            .collect();

        PipelineGraphSerde { nodes, connections }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineGraph {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error as DeError;

        let serde_graph = PipelineGraphSerde::deserialize(deserializer)?;
        let mut graph = PipelineGraph::new();

        for instance in serde_graph.nodes {
            graph.add_node(instance).map_err(DeError::custom)?;
        }

        for connection in serde_graph.connections {
            graph
                .add_connection(
                    &connection.from_node,
                    PortConnection {
                        source_port: connection.from_port,
                        target_port: connection.to_port,
                        port_type: connection.port_type,
                    },
                    &connection.to_node,
                )
                .map_err(DeError::custom)?;
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::build_default_registry;

    fn instance(id: &str, node_type: &str) -> NodeInstance {
        NodeInstance {
            id: id.to_string(),
            node_type: node_type.to_string(),
            params: HashMap::new(),
        }
    }

    fn frames_connection() -> PortConnection {
        PortConnection {
            source_port: "frames".to_string(),
            target_port: "frames".to_string(),
            port_type: PortType::Frames,
        }
    }

    #[test]
    fn test_add_node_rejects_duplicate_ids() {
        let mut graph = PipelineGraph::new();
        graph.add_node(instance("a", "FrameSource")).unwrap();
        let err = graph.add_node(instance("a", "FrameStats")).err().unwrap();
        assert!(err.to_string().contains("duplicate node id: a"));
    }

    #[test]
    fn test_add_connection_rejects_unknown_nodes() {
        let mut graph = PipelineGraph::new();
        graph.add_node(instance("a", "FrameSource")).unwrap();
        let err = graph
            .add_connection("a", frames_connection(), "missing")
            .err()
            .unwrap();
        assert!(err.to_string().contains("unknown target node id: missing"));
    }

    #[test]
    fn test_validate_accepts_well_formed_graph() {
        let registry = build_default_registry();
        let mut graph = PipelineGraph::new();
        graph.add_node(instance("src", "FrameSource")).unwrap();
        graph.add_node(instance("retime", "TemporalResample")).unwrap();
        graph.add_node(instance("stats", "FrameStats")).unwrap();
        graph
            .add_connection("src", frames_connection(), "retime")
            .unwrap();
        graph
            .add_connection("retime", frames_connection(), "stats")
            .unwrap();

        graph.validate(&registry).unwrap();
        assert_eq!(graph.execution_order().unwrap().len(), 3);
    }

    #[test]
    fn test_validate_rejects_cycles() {
        let registry = build_default_registry();
        let mut graph = PipelineGraph::new();
        graph.add_node(instance("a", "FrameStats")).unwrap();
        graph.add_node(instance("b", "FrameStats")).unwrap();
        graph.add_connection("a", frames_connection(), "b").unwrap();
        graph.add_connection("b", frames_connection(), "a").unwrap();

        let err = graph.validate(&registry).err().unwrap();
        assert!(err.to_string().contains("cycle detected"));
    }

    #[test]
    fn test_validate_rejects_missing_required_input() {
        let registry = build_default_registry();
        let mut graph = PipelineGraph::new();
        graph.add_node(instance("stats", "FrameStats")).unwrap();

        let err = graph.validate(&registry).err().unwrap();
        assert!(err
            .to_string()
            .contains("node 'stats' missing required input port 'frames'"));
    }

    #[test]
    fn test_validate_rejects_unknown_ports() {
        let registry = build_default_registry();
        let mut graph = PipelineGraph::new();
        graph.add_node(instance("src", "FrameSource")).unwrap();
        graph.add_node(instance("stats", "FrameStats")).unwrap();
        graph
            .add_connection(
                "src",
                PortConnection {
                    source_port: "pixels".to_string(),
                    target_port: "frames".to_string(),
                    port_type: PortType::Frames,
                },
                "stats",
            )
            .unwrap();

        let err = graph.validate(&registry).err().unwrap();
        assert!(err
            .to_string()
            .contains("node 'src' has no output port 'pixels'"));
    }

    #[test]
    fn test_validate_rejects_mismatched_port_types() {
        let registry = build_default_registry();
        let mut graph = PipelineGraph::new();
        let mut source = instance("value", "Constant");
        source
            .params
            .insert("type".to_string(), serde_json::json!("Str"));
        graph.add_node(source).unwrap();
        graph.add_node(instance("stats", "FrameStats")).unwrap();
        graph
            .add_connection(
                "value",
                PortConnection {
                    source_port: "value".to_string(),
                    target_port: "frames".to_string(),
                    port_type: PortType::Str,
                },
                "stats",
            )
            .unwrap();

        let err = graph.validate(&registry).err().unwrap();
        assert!(err.to_string().contains("incompatible port types"));
    }

    #[test]
    fn test_graph_json_roundtrip() {
        let mut graph = PipelineGraph::new();
        let mut src = instance("src", "FrameSource");
        src.params.insert("frames".to_string(), serde_json::json!(8));
        graph.add_node(src).unwrap();
        graph.add_node(instance("stats", "FrameStats")).unwrap();
        graph
            .add_connection("src", frames_connection(), "stats")
            .unwrap();

        let json = serde_json::to_string_pretty(&graph).unwrap();
        let parsed: PipelineGraph = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.node_count(), 2);
        let order = parsed.execution_order().unwrap();
        assert_eq!(parsed.node(order[0]).id, "src");
        assert_eq!(
            parsed.node(order[0]).params.get("frames"),
            Some(&serde_json::json!(8))
        );
    }

    #[test]
    fn test_inject_default_param_skips_explicit_values() {
        let mut graph = PipelineGraph::new();
        graph.add_node(instance("a", "TemporalResample")).unwrap();
        let mut explicit = instance("b", "TemporalResample");
        explicit
            .params
            .insert("batch_size".to_string(), serde_json::json!(64));
        graph.add_node(explicit).unwrap();
        graph.add_node(instance("src", "FrameSource")).unwrap();

        let injected =
            graph.inject_default_param("TemporalResample", "batch_size", serde_json::json!(512));
        assert_eq!(injected, 1);

        let order = graph.execution_order().unwrap();
        for idx in order {
            let node = graph.node(idx);
            match node.id.as_str() {
                "a" => assert_eq!(node.params.get("batch_size"), Some(&serde_json::json!(512))),
                "b" => assert_eq!(node.params.get("batch_size"), Some(&serde_json::json!(64))),
                _ => assert!(node.params.get("batch_size").is_none()),
            }
        }
    }

    #[test]
    fn test_graph_deserialize_rejects_duplicate_ids() {
        let json = r#"{
            "nodes": [
                {"id": "a", "node_type": "FrameSource", "params": {}},
                {"id": "a", "node_type": "FrameStats", "params": {}}
            ],
            "connections": []
        }"#;
        let err = serde_json::from_str::<PipelineGraph>(json).err().unwrap();
        assert!(err.to_string().contains("duplicate node id"));
    }
}
