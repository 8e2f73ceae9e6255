//! Temporal resample node: retimes a frame batch to `round(B * multiplier)`
//! frames by dispatching the resample engine, with optional temporal
//! blur/sharpen.
//!
//! All engine parameters surface as ports; the kernel backends are injected
//! so a graph can run against any resize/filter implementation.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::kernels::{CpuKernels, Resize2d, ScaleMethod, WindowFilter};
use crate::node::{ExecutionContext, Node, PortDefinition};
use crate::resample::{ResampleContext, SmoothingSpec, TemporalResampler, DEFAULT_BATCH_SIZE};
use crate::types::{PortData, PortType};

/// Largest multiplier the node accepts; the engine itself only requires > 0.
const MAX_MULTIPLIER: f64 = 20.0;

pub struct TemporalResampleNode {
    resize: Arc<dyn Resize2d>,
    filter: Arc<dyn WindowFilter>,
}

impl TemporalResampleNode {
    pub fn new() -> Self {
        Self {
            resize: Arc::new(CpuKernels),
            filter: Arc::new(CpuKernels),
        }
    }

    pub fn with_backends(resize: Arc<dyn Resize2d>, filter: Arc<dyn WindowFilter>) -> Self {
        Self { resize, filter }
    }
}

impl Default for TemporalResampleNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for TemporalResampleNode {
    fn node_type(&self) -> &str {
        "TemporalResample"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition {
                name: "frames".to_string(),
                port_type: PortType::Frames,
                required: true,
                default_value: None,
            },
            PortDefinition {
                name: "method".to_string(),
                port_type: PortType::Str,
                required: false,
                default_value: Some(serde_json::json!("bislerp")),
            },
            PortDefinition {
                name: "multiplier".to_string(),
                port_type: PortType::Float,
                required: false,
                default_value: Some(serde_json::json!(0.5)),
            },
            PortDefinition {
                name: "smoothing".to_string(),
                port_type: PortType::Bool,
                required: false,
                default_value: Some(serde_json::json!(false)),
            },
            PortDefinition {
                name: "radius".to_string(),
                port_type: PortType::Int,
                required: false,
                default_value: Some(serde_json::json!(1)),
            },
            PortDefinition {
                name: "sigma".to_string(),
                port_type: PortType::Float,
                required: false,
                default_value: Some(serde_json::json!(1.0)),
            },
            PortDefinition {
                name: "sharpen_alpha".to_string(),
                port_type: PortType::Float,
                required: false,
                default_value: Some(serde_json::json!(1.0)),
            },
            PortDefinition {
                name: "batch_size".to_string(),
                port_type: PortType::Int,
                required: false,
                default_value: Some(serde_json::json!(DEFAULT_BATCH_SIZE as i64)),
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
        ctx: &ExecutionContext,
    ) -> Result<HashMap<String, PortData>> {
        let frames = match inputs.get("frames") {
            Some(PortData::Frames(batch)) => batch,
            Some(other) => bail!("frames must be Frames, got {}", other.kind()),
            None => bail!("frames is required"),
        };

        let method = match inputs.get("method") {
            Some(PortData::Str(raw)) => ScaleMethod::parse(raw)?,
            Some(other) => bail!("method must be a Str, got {}", other.kind()),
            None => ScaleMethod::Bislerp,
        };

        let multiplier = match inputs.get("multiplier") {
            Some(PortData::Float(m)) => *m,
            Some(other) => bail!("multiplier must be a Float, got {}", other.kind()),
            None => 0.5,
        };
        if !multiplier.is_finite() || multiplier <= 0.0 || multiplier > MAX_MULTIPLIER {
            bail!("multiplier must be in (0, {MAX_MULTIPLIER}], got {multiplier}");
        }

        let smoothing = parse_smoothing(inputs)?;

        let batch_size = match inputs.get("batch_size") {
            Some(PortData::Int(n)) => {
                if *n < 1 {
                    bail!("batch_size must be >= 1, got {n}");
                }
                *n as usize
            }
            Some(other) => bail!("batch_size must be an Int, got {}", other.kind()),
            None => DEFAULT_BATCH_SIZE,
        };

        let resampler =
            TemporalResampler::new(self.resize.as_ref(), self.filter.as_ref())
                .with_batch_size(batch_size);

        let mut engine_ctx = ResampleContext::new();
        if let Some(cancel) = &ctx.cancel {
            engine_ctx = engine_ctx.with_cancel(cancel);
        }
        let report = |done: u64, total: u64| ctx.report_progress(done, total);
        if ctx.progress.is_some() {
            engine_ctx = engine_ctx.with_progress(&report);
        }

        let output = resampler
            .resample(frames, method, multiplier, smoothing.as_ref(), &engine_ctx)
            .context("temporal resample failed")?;

        let mut outputs = HashMap::new();
        outputs.insert("frames".to_string(), PortData::Frames(output));
        Ok(outputs)
    }
}

fn parse_smoothing(inputs: &HashMap<String, PortData>) -> Result<Option<SmoothingSpec>> {
    let enabled = match inputs.get("smoothing") {
        Some(PortData::Bool(b)) => *b,
        Some(other) => bail!("smoothing must be a Bool, got {}", other.kind()),
        None => false,
    };

    let radius = match inputs.get("radius") {
        Some(PortData::Int(r)) => {
            if *r < 0 {
                bail!("radius must be >= 0, got {r}");
            }
            *r as usize
        }
        Some(other) => bail!("radius must be an Int, got {}", other.kind()),
        None => 1,
    };

    let sigma = match inputs.get("sigma") {
        Some(PortData::Float(s)) => *s as f32,
        Some(other) => bail!("sigma must be a Float, got {}", other.kind()),
        None => 1.0,
    };

    let sharpen_alpha = match inputs.get("sharpen_alpha") {
        Some(PortData::Float(a)) => *a as f32,
        Some(other) => bail!("sharpen_alpha must be a Float, got {}", other.kind()),
        None => 1.0,
    };

    Ok(Some(SmoothingSpec {
        enabled,
        radius,
        sigma,
        sharpen_alpha,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResampleError;
    use crate::types::FrameBatch;
    use ndarray::Array4;

    fn make_batch(frames: usize) -> PortData {
        let mut data = Array4::<f32>::zeros((frames, 4, 4, 3));
        for (i, v) in data.iter_mut().enumerate() {
            *v = (i % 97) as f32 / 97.0;
        }
        PortData::Frames(FrameBatch::new(data).unwrap())
    }

    #[test]
    fn test_node_ports() {
        let node = TemporalResampleNode::new();
        assert_eq!(node.node_type(), "TemporalResample");

        let inputs = node.input_ports();
        assert_eq!(inputs.len(), 8);
        assert_eq!(inputs[0].name, "frames");
        assert_eq!(inputs[0].port_type, PortType::Frames);
        assert!(inputs[0].required);
        assert_eq!(inputs[1].name, "method");
        assert_eq!(inputs[1].default_value, Some(serde_json::json!("bislerp")));
        assert!(inputs.iter().skip(1).all(|p| !p.required));

        let outputs = node.output_ports();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].port_type, PortType::Frames);
    }

    #[test]
    fn test_execute_missing_frames() {
        let mut node = TemporalResampleNode::new();
        let ctx = ExecutionContext::default();
        let err = node.execute(&HashMap::new(), &ctx).err().expect("should fail");
        assert!(err.to_string().contains("frames is required"));
    }

    #[test]
    fn test_execute_rejects_unknown_method() {
        let mut node = TemporalResampleNode::new();
        let ctx = ExecutionContext::default();
        let mut inputs = HashMap::new();
        inputs.insert("frames".to_string(), make_batch(4));
        inputs.insert("method".to_string(), PortData::Str("cubic".to_string()));

        let err = node.execute(&inputs, &ctx).err().expect("should fail");
        assert!(err.to_string().contains("unknown scale method"));
    }

    #[test]
    fn test_execute_rejects_out_of_range_multiplier() {
        let mut node = TemporalResampleNode::new();
        let ctx = ExecutionContext::default();

        for bad in [0.0, -0.5, 20.5] {
            let mut inputs = HashMap::new();
            inputs.insert("frames".to_string(), make_batch(4));
            inputs.insert("multiplier".to_string(), PortData::Float(bad));
            let err = node.execute(&inputs, &ctx).err().expect("should fail");
            assert!(err.to_string().contains("multiplier must be in"));
        }
    }

    #[test]
    fn test_execute_resamples_to_target_count() {
        let mut node = TemporalResampleNode::new();
        let ctx = ExecutionContext::default();
        let mut inputs = HashMap::new();
        inputs.insert("frames".to_string(), make_batch(10));
        inputs.insert("method".to_string(), PortData::Str("nearest-exact".to_string()));
        inputs.insert("multiplier".to_string(), PortData::Float(0.5));

        let outputs = node.execute(&inputs, &ctx).unwrap();
        match outputs.get("frames") {
            Some(PortData::Frames(batch)) => {
                assert_eq!(batch.frame_count(), 5);
                assert_eq!(batch.height(), 4);
                assert_eq!(batch.width(), 4);
            }
            other => panic!("expected Frames output, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_with_smoothing_ports() {
        let mut node = TemporalResampleNode::new();
        let ctx = ExecutionContext::default();
        let mut inputs = HashMap::new();
        inputs.insert("frames".to_string(), make_batch(6));
        inputs.insert("method".to_string(), PortData::Str("bilinear".to_string()));
        inputs.insert("multiplier".to_string(), PortData::Float(2.0));
        inputs.insert("smoothing".to_string(), PortData::Bool(true));
        inputs.insert("radius".to_string(), PortData::Int(2));
        inputs.insert("sigma".to_string(), PortData::Float(1.2));

        let outputs = node.execute(&inputs, &ctx).unwrap();
        match outputs.get("frames") {
            Some(PortData::Frames(batch)) => assert_eq!(batch.frame_count(), 12),
            other => panic!("expected Frames output, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_surfaces_engine_cancellation() {
        let mut node = TemporalResampleNode::new();
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();
        let ctx = ExecutionContext {
            cancel: Some(rx),
            progress: None,
        };

        let mut inputs = HashMap::new();
        inputs.insert("frames".to_string(), make_batch(4));

        let err = node.execute(&inputs, &ctx).err().expect("should fail");
        assert!(matches!(
            err.downcast_ref::<ResampleError>(),
            Some(ResampleError::Cancelled)
        ));
    }

    #[test]
    fn test_execute_rejects_negative_radius() {
        let mut node = TemporalResampleNode::new();
        let ctx = ExecutionContext::default();
        let mut inputs = HashMap::new();
        inputs.insert("frames".to_string(), make_batch(4));
        inputs.insert("radius".to_string(), PortData::Int(-1));

        let err = node.execute(&inputs, &ctx).err().expect("should fail");
        assert!(err.to_string().contains("radius must be >= 0"));
    }
}
