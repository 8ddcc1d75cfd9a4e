//! Remapping between encoder-decoder models of different depth

mod common;

use anyhow::Result;
use remap::{
    Correspondence, ModelStructure, RemappingIndex, RestorePlan, RestoreStrategy, SubTree,
    VariableMapping,
};
use runtime_core::{AmbiguityPolicy, Error, NewLayerSpec, RestoreConfig};

/// Variables of an encoder-decoder model with `blocks` blocks per stack
fn encoder_decoder(blocks: u32, encoder_layers: u32, decoder_layers: u32) -> Vec<String> {
    let mut names = vec![
        "global_step".to_string(),
        "shared/embedding".to_string(),
        "encoder/final_layer_norm/scale".to_string(),
        "decoder/final_layer_norm/scale".to_string(),
    ];
    for block in 0..blocks {
        for layer in 0..encoder_layers {
            names.push(format!("encoder/block_{:03}/layer_{:03}/SelfAttention/q", block, layer));
            names.push(format!("encoder/block_{:03}/layer_{:03}/layer_norm/scale", block, layer));
        }
        for layer in 0..decoder_layers {
            names.push(format!("decoder/block_{:03}/layer_{:03}/EncDecAttention/k", block, layer));
        }
    }
    names
}

#[test]
fn test_structure_of_encoder_decoder() {
    common::init_tracing();
    let structure = ModelStructure::infer(&encoder_decoder(2, 2, 3));

    assert!(structure.is_encoder_decoder());
    let encoder = structure.get(SubTree::Encoder).unwrap();
    let decoder = structure.get(SubTree::Decoder).unwrap();
    assert_eq!((encoder.num_blocks, encoder.num_layers), (Some(2), 2));
    assert_eq!((decoder.num_blocks, decoder.num_layers), (Some(2), 3));
}

#[test]
fn test_new_decoder_layer() -> Result<()> {
    common::init_tracing();
    let checkpoint = encoder_decoder(2, 2, 2);
    let graph = encoder_decoder(2, 2, 3);
    let new_layers = NewLayerSpec::encoder_decoder(Vec::new(), [1]);

    let index = RemappingIndex::infer(&checkpoint, &graph, &new_layers, AmbiguityPolicy::Reject)?;

    // Encoder and global variables load unchanged
    for name in checkpoint.iter().filter(|n| !n.starts_with("decoder/block_")) {
        assert_eq!(index.source_for(name)?, name.as_str());
    }

    assert_eq!(
        index.source_for("decoder/block_001/layer_002/EncDecAttention/k")?,
        "decoder/block_001/layer_001/EncDecAttention/k"
    );
    assert!(!index.is_restorable("decoder/block_000/layer_001/EncDecAttention/k"));
    assert!(!index.is_restorable("decoder/block_001/layer_001/EncDecAttention/k"));
    Ok(())
}

#[test]
fn test_blocks_regrouped_across_models() -> Result<()> {
    common::init_tracing();
    // 4 blocks x 1 encoder layer loaded into 2 blocks x 2 encoder layers
    let checkpoint = encoder_decoder(4, 1, 1);
    let mut graph = encoder_decoder(2, 2, 2);
    graph.retain(|name| !name.starts_with("decoder/block_"));
    for block in 0..4 {
        graph.push(format!("decoder/block_{:03}/layer_000/EncDecAttention/k", block));
    }

    let index = RemappingIndex::infer(&checkpoint, &graph, &NewLayerSpec::default(), AmbiguityPolicy::Reject)?;

    assert_eq!(
        index.source_for("encoder/block_001/layer_000/SelfAttention/q")?,
        "encoder/block_002/layer_000/SelfAttention/q"
    );
    assert_eq!(
        index.source_for("encoder/block_000/layer_001/layer_norm/scale")?,
        "encoder/block_001/layer_000/layer_norm/scale"
    );
    Ok(())
}

#[test]
fn test_mismatched_depth_fails_before_restoring() {
    common::init_tracing();
    let checkpoint = encoder_decoder(1, 2, 2);
    let graph = encoder_decoder(1, 3, 2);

    let err = RemappingIndex::infer(&checkpoint, &graph, &NewLayerSpec::default(), AmbiguityPolicy::Reject)
        .unwrap_err();
    match &err {
        Error::StructuralMismatch {
            scope,
            source_slots,
            target_slots,
        } => {
            assert_eq!(scope, "encoder/");
            assert_eq!((*source_slots, *target_slots), (2, 3));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_fatal());
}

#[test]
fn test_correspondence_entries_for_new_encoder_layer() -> Result<()> {
    common::init_tracing();
    let source = ModelStructure::infer(&encoder_decoder(1, 2, 1));
    let target = ModelStructure::infer(&encoder_decoder(1, 3, 1));
    let correspondence =
        Correspondence::build(&source, &target, &NewLayerSpec::encoder_decoder([0], Vec::new()))?;

    let rendered: Vec<String> = correspondence.entries().iter().map(|e| e.to_string()).collect();
    assert_eq!(
        rendered,
        vec![
            "encoder/.*block_000/layer_000 -> encoder/.*block_000/layer_001",
            "encoder/.*block_000/layer_001 -> encoder/.*block_000/layer_002",
            "decoder/.*block_000/layer_000 -> decoder/.*block_000/layer_000",
        ]
    );
    Ok(())
}

#[test]
fn test_plan_from_json_config() -> Result<()> {
    common::init_tracing();
    let config: RestoreConfig = serde_json::from_str(
        r#"{
            "checkpoint": { "model_dir": "/models/t5", "selector": "all" },
            "remap": { "mode": "flexible", "new_layers": [[], [2]] }
        }"#,
    )?;
    config.validate()?;

    let checkpoint = encoder_decoder(1, 1, 2);
    let graph = encoder_decoder(1, 1, 3);
    let index = RemappingIndex::infer(
        &checkpoint,
        &graph,
        &config.remap.new_layers,
        config.remap.ambiguity,
    )?;
    let strategy = VariableMapping::Remapped(index);
    assert!(!strategy.should_restore("decoder/block_000/layer_002/EncDecAttention/k"));

    let plan = RestorePlan::build(&strategy, &checkpoint, &graph, None)?;
    assert_eq!(plan.assignments.len(), checkpoint.len());
    assert_eq!(plan.uninitialized_graph_variables.len(), 1);
    Ok(())
}
