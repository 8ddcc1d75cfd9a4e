//! End-to-end restore flow over a real model directory

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use checkpoint::{
    format_step, index_file, CheckpointResolver, CheckpointState, Resolution, ResolverConfig,
    VariableIndex, MANIFEST_FILE,
};
use restore::RestoreService;
use runtime_core::{Error, MappingMode, NewLayerSpec, RestoreConfig, Step, StepSelector};
use storage::{LocalStorage, StorageBackend};
use tempfile::TempDir;
use tokio::time::timeout;
use tokio_stream::StreamExt;

const WAIT: Duration = Duration::from_secs(5);

fn checkpoint_vars(layers: u32) -> Vec<String> {
    let mut names = vec!["global_step".to_string(), "shared/embedding".to_string()];
    for layer in 0..layers {
        names.push(format!("decoder/block_000/layer_{:03}/attention/q", layer));
        names.push(format!("decoder/block_000/layer_{:03}/ffn/wi", layer));
    }
    names
}

/// Write a sharded checkpoint and its variable index, then point the manifest at it
///
/// The `.index` file is written after every other file of the step, so the
/// checkpoint only becomes visible once its variable names can be read.
async fn write_checkpoint(storage: &LocalStorage, step: Step, layers: u32) -> Result<()> {
    let stem = format_step(step);
    storage
        .write(
            &VariableIndex::file_name(step),
            VariableIndex::new(checkpoint_vars(layers)).to_bytes()?,
        )
        .await?;
    storage
        .write(
            &format!("{}.data-00000-of-00001", stem),
            Bytes::from_static(b"data"),
        )
        .await?;
    storage
        .write(&index_file(step), Bytes::from_static(b"index"))
        .await?;

    let state = CheckpointState::new(stem);
    storage
        .write(MANIFEST_FILE, Bytes::from(state.render()))
        .await?;
    Ok(())
}

fn config(dir: &TempDir) -> RestoreConfig {
    let mut config = RestoreConfig::default();
    config.checkpoint.model_dir = dir.path().to_path_buf();
    config.checkpoint.poll_interval = Duration::from_millis(10);
    config
}

#[tokio::test]
async fn test_resolve_every_selector() -> Result<()> {
    common::init_tracing();
    let dir = TempDir::new()?;
    let storage = LocalStorage::new(dir.path());
    for step in [5, 10, 15, 20] {
        write_checkpoint(&storage, step, 2).await?;
    }
    storage
        .write("events.out.tfevents.1", Bytes::from_static(b"x"))
        .await?;

    let resolver = CheckpointResolver::new(ResolverConfig {
        model_dir: dir.path().to_path_buf(),
        skip_until: Some(10),
        ..Default::default()
    });

    let all = resolver.all().await?;
    assert_eq!(all.iter().map(|c| c.step).collect::<Vec<_>>(), vec![15, 20]);

    assert_eq!(resolver.closest(17).await?.step, 15);
    assert_eq!(resolver.latest().await?.step, 20);

    match resolver.resolve(&StepSelector::Steps(vec![1, 16, 19])).await? {
        Resolution::Checkpoints(checkpoints) => {
            assert_eq!(
                checkpoints.iter().map(|c| c.step).collect::<Vec<_>>(),
                vec![15, 20]
            );
        }
        Resolution::Watch(_) => panic!("finite selector produced a watcher"),
    }
    Ok(())
}

#[tokio::test]
async fn test_plan_checkpoint_with_added_layer() -> Result<()> {
    common::init_tracing();
    let dir = TempDir::new()?;
    let storage = LocalStorage::new(dir.path());
    write_checkpoint(&storage, 300, 2).await?;

    let mut config = config(&dir);
    config.checkpoint.selector = StepSelector::Latest;
    config.remap.new_layers = NewLayerSpec::single([1]);
    let service = RestoreService::new(config)?;

    let graph = checkpoint_vars(3);
    let plans = service.plan_all(&StepSelector::Latest, &graph).await?;
    assert_eq!(plans.len(), 1);

    let (checkpoint, plan) = &plans[0];
    assert_eq!(checkpoint.step, 300);
    assert_eq!(
        plan.assignments
            .get("decoder/block_000/layer_002/ffn/wi")
            .map(String::as_str),
        Some("decoder/block_000/layer_001/ffn/wi")
    );
    assert_eq!(
        plan.uninitialized_graph_variables
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>(),
        vec![
            "decoder/block_000/layer_001/attention/q",
            "decoder/block_000/layer_001/ffn/wi",
        ]
    );
    assert!(plan.unused_checkpoint_variables.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_identity_mode_with_variable_filter() -> Result<()> {
    common::init_tracing();
    let dir = TempDir::new()?;
    write_checkpoint(&LocalStorage::new(dir.path()), 1, 1).await?;

    let mut config = config(&dir);
    config.remap.mode = MappingMode::Identity;
    config.remap.variable_filter = Some("^decoder/".to_string());
    let service = RestoreService::new(config)?;

    let graph = checkpoint_vars(1);
    let plans = service.plan_all(&StepSelector::All, &graph).await?;
    let (_, plan) = &plans[0];

    assert_eq!(plan.assignments.len(), 2);
    assert!(plan.uninitialized_graph_variables.contains("global_step"));
    assert!(plan.uninitialized_graph_variables.contains("shared/embedding"));
    Ok(())
}

#[tokio::test]
async fn test_missing_checkpoint_is_reported() -> Result<()> {
    common::init_tracing();
    let dir = TempDir::new()?;
    let mut config = config(&dir);
    config.checkpoint.find_closest = false;
    let service = RestoreService::new(config)?;

    let err = service
        .plan_all(&StepSelector::Step(42), &checkpoint_vars(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CheckpointNotFound { .. }));
    assert!(!err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn test_checkpoint_without_index_is_ignored() -> Result<()> {
    common::init_tracing();
    let dir = TempDir::new()?;
    let storage = LocalStorage::new(dir.path());
    write_checkpoint(&storage, 300, 1).await?;

    // Step 400 is still being written: no index file yet
    storage
        .write(
            &VariableIndex::file_name(400),
            VariableIndex::new(checkpoint_vars(1)).to_bytes()?,
        )
        .await?;
    storage
        .write(
            &format!("{}.data-00000-of-00002", format_step(400)),
            Bytes::from_static(b"data"),
        )
        .await?;

    let mut config = config(&dir);
    config.checkpoint.find_closest = false;
    let service = RestoreService::new(config)?;
    let graph = checkpoint_vars(1);

    let plans = service.plan_all(&StepSelector::All, &graph).await?;
    assert_eq!(plans.iter().map(|(c, _)| c.step).collect::<Vec<_>>(), vec![300]);

    let err = service
        .plan_all(&StepSelector::Step(400), &graph)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CheckpointNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_continuous_restore_until_ceiling() -> Result<()> {
    common::init_tracing();
    let dir = TempDir::new()?;
    let storage = Arc::new(LocalStorage::new(dir.path()));
    write_checkpoint(&storage, 100, 1).await?;

    let mut config = config(&dir);
    config.checkpoint.skip_until = Some(50);
    config.checkpoint.stop_after = Some(300);
    let service = RestoreService::new(config)?;
    let graph = checkpoint_vars(1);

    let writer = {
        let storage = Arc::clone(&storage);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            write_checkpoint(&storage, 200, 1).await?;
            tokio::time::sleep(Duration::from_millis(50)).await;
            write_checkpoint(&storage, 300, 1).await
        })
    };

    let mut stream = match service.resolve(&StepSelector::Continuous).await? {
        Resolution::Watch(watcher) => watcher.into_stream(),
        Resolution::Checkpoints(_) => panic!("continuous selector produced a list"),
    };

    let mut planned = Vec::new();
    while let Some(checkpoint) = timeout(WAIT, stream.next()).await? {
        let checkpoint = checkpoint?;
        let plan = service.plan(&checkpoint, &graph).await?;
        assert!(plan.is_complete());
        tracing::info!(step = checkpoint.step, restored = plan.assignments.len(), "Planned checkpoint");
        planned.push(checkpoint.step);
    }

    writer.await??;
    assert_eq!(planned.first(), Some(&100));
    assert_eq!(planned.last(), Some(&300));
    Ok(())
}
