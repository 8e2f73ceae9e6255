//! Frame source node: deterministic synthetic frame batches for demo
//! workflows and tests, standing in for a decoder front-end.

use std::collections::HashMap;

use anyhow::{bail, Result};
use ndarray::Array4;

use crate::node::{ExecutionContext, Node, PortDefinition};
use crate::types::{FrameBatch, PortData, PortType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourcePattern {
    Gradient,
    Solid,
    Checker,
}

impl SourcePattern {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "gradient" => Ok(Self::Gradient),
            "solid" => Ok(Self::Solid),
            "checker" => Ok(Self::Checker),
            other => bail!("unknown pattern '{other}', expected gradient|solid|checker"),
        }
    }
}

pub struct FrameSourceNode;

impl FrameSourceNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FrameSourceNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for FrameSourceNode {
    fn node_type(&self) -> &str {
        "FrameSource"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition {
                name: "frames".to_string(),
                port_type: PortType::Int,
                required: false,
                default_value: Some(serde_json::json!(16)),
            },
            PortDefinition {
                name: "width".to_string(),
                port_type: PortType::Int,
                required: false,
                default_value: Some(serde_json::json!(64)),
            },
            PortDefinition {
                name: "height".to_string(),
                port_type: PortType::Int,
                required: false,
                default_value: Some(serde_json::json!(36)),
            },
            PortDefinition {
                name: "channels".to_string(),
                port_type: PortType::Int,
                required: false,
                default_value: Some(serde_json::json!(3)),
            },
            PortDefinition {
                name: "pattern".to_string(),
                port_type: PortType::Str,
                required: false,
                default_value: Some(serde_json::json!("gradient")),
            },
            PortDefinition {
                name: "value".to_string(),
                port_type: PortType::Float,
                required: false,
                default_value: Some(serde_json::json!(0.5)),
            },
        ]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition {
            name: "frames".to_string(),
            port_type: PortType::Frames,
            required: true,
            default_value: None,
        }]
    }

    fn execute(
        &mut self,
        inputs: &HashMap<String, PortData>,
        _ctx: &ExecutionContext,
    ) -> Result<HashMap<String, PortData>> {
        let frames = positive_int(inputs, "frames", 16)?;
        let width = positive_int(inputs, "width", 64)?;
        let height = positive_int(inputs, "height", 36)?;
        let channels = positive_int(inputs, "channels", 3)?;

        let pattern = match inputs.get("pattern") {
            Some(PortData::Str(raw)) => SourcePattern::parse(raw)?,
            Some(other) => bail!("pattern must be a Str, got {}", other.kind()),
            None => SourcePattern::Gradient,
        };

        let value = match inputs.get("value") {
            Some(PortData::Float(v)) => *v as f32,
            Some(other) => bail!("value must be a Float, got {}", other.kind()),
            None => 0.5,
        };

        let mut data = Array4::<f32>::zeros((frames, height, width, channels));
        match pattern {
            SourcePattern::Gradient => {
                // Time sweeps brightness, space sweeps a diagonal ramp.
                for ((b, y, x, c), v) in data.indexed_iter_mut() {
                    let time = b as f32 / frames as f32;
                    let space = (y + x) as f32 / (height + width) as f32;
                    *v = ((time + space + c as f32 * 0.1) / 2.2).clamp(0.0, 1.0);
                }
            }
            SourcePattern::Solid => {
                data.fill(value.clamp(0.0, 1.0));
            }
            SourcePattern::Checker => {
                for ((b, y, x, _), v) in data.indexed_iter_mut() {
                    *v = if (y + x + b) % 2 == 0 { 1.0 } else { 0.0 };
                }
            }
        }

        let batch = FrameBatch::new(data)?;
        let mut outputs = HashMap::new();
        outputs.insert("frames".to_string(), PortData::Frames(batch));
        Ok(outputs)
    }
}

fn positive_int(
    inputs: &HashMap<String, PortData>,
    name: &str,
    default: usize,
) -> Result<usize> {
    match inputs.get(name) {
        Some(PortData::Int(v)) => {
            if *v < 1 {
                bail!("{name} must be >= 1, got {v}");
            }
            Ok(*v as usize)
        }
        Some(other) => bail!("{name} must be an Int, got {}", other.kind()),
        None => Ok(default),
    }
}
