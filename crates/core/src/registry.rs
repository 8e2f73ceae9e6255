use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::node::Node;

type NodeFactory =
    dyn Fn(HashMap<String, serde_json::Value>) -> Result<Box<dyn Node>> + Send + Sync;

pub struct NodeRegistry {
    factories: HashMap<String, Box<NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, node_type: &str, factory: F)
    where
        F: Fn(HashMap<String, serde_json::Value>) -> Result<Box<dyn Node>> + Send + Sync + 'static,
    {
        self.factories
            .insert(node_type.to_string(), Box::new(factory));
    }

    pub fn create(
        &self,
        node_type: &str,
        params: HashMap<String, serde_json::Value>,
    ) -> Result<Box<dyn Node>> {
        let factory = self
            .factories
            .get(node_type)
            .ok_or_else(|| anyhow!("unknown node type: {node_type}"))?;

        factory(params)
    }

    pub fn list_node_types(&self) -> Vec<&str> {
        let mut node_types: Vec<&str> = self.factories.keys().map(|v| v.as_str()).collect();
        node_types.sort_unstable();
        node_types
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register all node types shipped by `retime-core`.
///
/// The keys are the node-type names used in workflow JSON files.
pub fn register_all_nodes(registry: &mut NodeRegistry) {
    use crate::nodes::constant::ConstantNode;
    use crate::nodes::frame_source::FrameSourceNode;
    use crate::nodes::frame_stats::FrameStatsNode;
    use crate::nodes::temporal_resample::TemporalResampleNode;

    registry.register("FrameSource", |_params| Ok(Box::new(FrameSourceNode::new())));
    registry.register("TemporalResample", |_params| {
        Ok(Box::new(TemporalResampleNode::new()))
    });
    registry.register("FrameStats", |_params| Ok(Box::new(FrameStatsNode::new())));
    registry.register("Constant", |params| {
        Ok(Box::new(ConstantNode::from_params(&params)?))
    });
}

pub fn build_default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all_nodes(&mut registry);
    registry
}
