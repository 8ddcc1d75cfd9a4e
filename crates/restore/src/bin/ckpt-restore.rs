//! Checkpoint restore command line tool
//!
//! Resolves the checkpoints selected by a restore configuration and prints
//! them, or, given the graph's variable names, prints a restore plan per
//! checkpoint. Continuous selectors keep printing as checkpoints arrive.
//!
//! Usage: `ckpt-restore <config.json> [graph-variables.txt]`

use std::path::Path;

use serde_json::json;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkpoint::Resolution;
use restore::RestoreService;
use runtime_core::{CheckpointIdentifier, RestoreConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "restore=info,checkpoint=info,remap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        eprintln!("usage: ckpt-restore <config.json> [graph-variables.txt]");
        std::process::exit(2);
    };
    let graph_names = args
        .next()
        .map(|path| read_graph_variables(Path::new(&path)))
        .transpose()?;

    let config = RestoreConfig::from_json_file(&config_path)?;
    let selector = config.checkpoint.selector.clone();
    tracing::info!(
        selector = %selector,
        model_dir = %config.checkpoint.model_dir.display(),
        "Resolving checkpoints"
    );

    let service = RestoreService::new(config)?;
    match service.resolve(&selector).await? {
        Resolution::Checkpoints(checkpoints) => {
            for checkpoint in &checkpoints {
                report(&service, checkpoint, graph_names.as_deref()).await?;
            }
        }
        Resolution::Watch(watcher) => {
            let mut checkpoints = watcher.into_stream();
            while let Some(checkpoint) = checkpoints.next().await {
                report(&service, &checkpoint?, graph_names.as_deref()).await?;
            }
            tracing::info!("Stopped watching for checkpoints");
        }
    }

    Ok(())
}

/// One variable name per line; blank lines and `#` comments are skipped
fn read_graph_variables(path: &Path) -> Result<Vec<String>, BoxError> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

async fn report(
    service: &RestoreService,
    checkpoint: &CheckpointIdentifier,
    graph_names: Option<&[String]>,
) -> Result<(), BoxError> {
    let Some(graph_names) = graph_names else {
        println!("{}", checkpoint);
        return Ok(());
    };

    let plan = service.plan(checkpoint, graph_names).await?;
    let summary = json!({
        "checkpoint": checkpoint.path,
        "step": checkpoint.step,
        "restored": plan.assignments.len(),
        "unused_checkpoint_variables": plan.unused_checkpoint_variables,
        "uninitialized_graph_variables": plan.uninitialized_graph_variables,
    });
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
