//! Frame stats node: logs batch shape and sample statistics, passes the
//! frames through untouched, and emits a one-line summary string.

use std::collections::HashMap;

use anyhow::{bail, Result};
use tracing::info;

use crate::node::{ExecutionContext, Node, PortDefinition};
use crate::types::{FrameBatch, PortData, PortType};

pub struct FrameStatsNode;

impl FrameStatsNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FrameStatsNode {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize(batch: &FrameBatch) -> String {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0.0f64;
    for &v in batch.view().iter() {
        min = min.min(v);
        max = max.max(v);
        sum += f64::from(v);
    }
    let mean = sum / batch.view().len() as f64;

    format!(
        "{} frames of {}x{}x{} (min {:.4}, mean {:.4}, max {:.4})",
        batch.frame_count(),
        batch.height(),
        batch.width(),
        batch.channels(),
        min,
        mean,
        max
    )
}

impl Node for FrameStatsNode {
    fn node_type(&self) -> &str {
        "FrameStats"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition {
            name: "frames".to_string(),
            port_type: PortType::Frames,
            required: true,
            default_value: None,
        }]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition {
                name: "frames".to_string(),
                port_type: PortType::Frames,
                required: true,
                default_value: None,
            },
            PortDefinition {
                name: "summary".to_string(),
                port_type: PortType::Str,
                required: true,
                default_value: None,
            },
        ]
    }

    fn execute(
        &mut self,
        inputs: &HashMap<String, PortData>,
        _ctx: &ExecutionContext,
    ) -> Result<HashMap<String, PortData>> {
        let batch = match inputs.get("frames") {
            Some(PortData::Frames(batch)) => batch.clone(),
            Some(other) => bail!("frames must be Frames, got {}", other.kind()),
            None => bail!("frames is required"),
        };

        let summary = summarize(&batch);
        info!(
            frames = batch.frame_count(),
            height = batch.height(),
            width = batch.width(),
            channels = batch.channels(),
            "{summary}"
        );

        let mut outputs = HashMap::new();
        outputs.insert("frames".to_string(), PortData::Frames(batch));
        outputs.insert("summary".to_string(), PortData::Str(summary));
        Ok(outputs)
    }
}
