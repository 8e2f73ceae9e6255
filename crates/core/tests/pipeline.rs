//! End-to-end workflow tests: JSON in, executed graph out.

use std::collections::HashMap;

use retime_core::error::ResampleError;
use retime_core::executor::{execution_context, SequentialExecutor};
use retime_core::graph::PipelineGraph;
use retime_core::registry::build_default_registry;
use retime_core::types::{FrameBatch, PortData};

const WORKFLOW_JSON: &str = r#"{
    "nodes": [
        {
            "id": "src",
            "node_type": "FrameSource",
            "params": {"frames": 12, "width": 8, "height": 6, "pattern": "gradient"}
        },
        {
            "id": "retime",
            "node_type": "TemporalResample",
            "params": {"method": "bilinear", "multiplier": 2.0, "smoothing": true, "radius": 1, "sigma": 0.8}
        },
        {
            "id": "stats",
            "node_type": "FrameStats",
            "params": {}
        }
    ],
    "connections": [
        {"from_node": "src", "from_port": "frames", "to_node": "retime", "to_port": "frames", "port_type": "Frames"},
        {"from_node": "retime", "from_port": "frames", "to_node": "stats", "to_port": "frames", "port_type": "Frames"}
    ]
}"#;

fn frames_of<'a>(
    outputs: &'a HashMap<String, HashMap<String, PortData>>,
    node: &str,
) -> &'a FrameBatch {
    match outputs.get(node).and_then(|ports| ports.get("frames")) {
        Some(PortData::Frames(batch)) => batch,
        other => panic!("expected Frames output on '{node}', got {other:?}"),
    }
}

#[test]
fn test_workflow_json_executes_end_to_end() {
    let registry = build_default_registry();
    let graph: PipelineGraph = serde_json::from_str(WORKFLOW_JSON).expect("workflow should parse");

    let outputs = SequentialExecutor::execute(&graph, &registry).expect("workflow should run");

    let batch = frames_of(&outputs, "stats");
    assert_eq!(batch.frame_count(), 24);
    assert_eq!(batch.height(), 6);
    assert_eq!(batch.width(), 8);
    assert_eq!(batch.channels(), 3);

    match outputs.get("stats").and_then(|ports| ports.get("summary")) {
        Some(PortData::Str(summary)) => assert!(summary.contains("24 frames of 6x8x3")),
        other => panic!("expected summary string, got {other:?}"),
    }
}

#[test]
fn test_workflow_results_do_not_depend_on_batch_size() {
    let registry = build_default_registry();

    let mut outputs = Vec::new();
    for batch_size in [1i64, 5, 4096] {
        let mut graph: PipelineGraph =
            serde_json::from_str(WORKFLOW_JSON).expect("workflow should parse");
        graph.inject_default_param(
            "TemporalResample",
            "batch_size",
            serde_json::json!(batch_size),
        );

        let run = SequentialExecutor::execute(&graph, &registry).expect("workflow should run");
        outputs.push(frames_of(&run, "stats").clone());
    }

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0], outputs[2]);
}

#[test]
fn test_workflow_cancellation_surfaces_cancelled_error() {
    let registry = build_default_registry();
    let graph: PipelineGraph = serde_json::from_str(WORKFLOW_JSON).expect("workflow should parse");

    let (tx, rx) = tokio::sync::watch::channel(false);
    tx.send(true).unwrap();

    let err = SequentialExecutor::execute_with_context(
        &graph,
        &registry,
        execution_context(Some(rx), None),
    )
    .err()
    .expect("cancelled run should fail");

    assert!(matches!(
        err.downcast_ref::<ResampleError>(),
        Some(ResampleError::Cancelled)
    ));
}

#[test]
fn test_workflow_rejects_invalid_method_before_running() {
    let registry = build_default_registry();
    let bad = WORKFLOW_JSON.replace("\"bilinear\"", "\"bicubical\"");
    let graph: PipelineGraph = serde_json::from_str(&bad).expect("workflow should parse");

    let err = SequentialExecutor::execute(&graph, &registry)
        .err()
        .expect("unknown method should fail");
    assert!(err.to_string().contains("execution failed for node 'retime'"));
    assert!(matches!(
        err.downcast_ref::<ResampleError>(),
        Some(ResampleError::InvalidParameter(_))
    ));
}
