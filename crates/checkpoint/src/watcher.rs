//! Polling watcher that waits for new checkpoints

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use runtime_core::{CheckpointIdentifier, Result, Step};
use storage::StorageBackend;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::codec::checkpoint_path;
use crate::resolver::list_checkpoint_steps;

/// Yields the newest checkpoint each time the directory advances
///
/// Checkpoints written in between two polls are coalesced: only the newest
/// step observed by a poll is yielded. Steps at or below the floor are
/// skipped. With a ceiling, the sequence ends after the first yielded step
/// that reaches it; without one it never ends on its own. A storage error is
/// yielded once and ends the sequence.
pub struct CheckpointWatcher {
    storage: Arc<dyn StorageBackend>,
    model_dir: PathBuf,
    skip_until: Option<Step>,
    stop_after: Option<Step>,
    poll_interval: Duration,
    last_seen: Option<Step>,
    finished: bool,
}

impl CheckpointWatcher {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        model_dir: PathBuf,
        skip_until: Option<Step>,
        stop_after: Option<Step>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            storage,
            model_dir,
            skip_until,
            stop_after,
            poll_interval,
            last_seen: None,
            finished: false,
        }
    }

    /// Whether the sequence has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Wait for the next checkpoint
    ///
    /// Returns `None` once the ceiling has been reached or after an error.
    pub async fn next(&mut self) -> Option<Result<CheckpointIdentifier>> {
        if self.finished {
            return None;
        }

        loop {
            let steps = match list_checkpoint_steps(self.storage.as_ref()).await {
                Ok(steps) => steps,
                Err(e) => {
                    warn!(
                        model_dir = %self.model_dir.display(),
                        error = %e,
                        "Stopped watching for checkpoints"
                    );
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            if let Some(&newest) = steps.last() {
                if self.last_seen.map_or(true, |seen| newest > seen) {
                    self.last_seen = Some(newest);

                    if self.skip_until.map_or(true, |floor| newest > floor) {
                        if self.stop_after.is_some_and(|ceiling| newest >= ceiling) {
                            info!(step = newest, "Reached final checkpoint");
                            self.finished = true;
                        }
                        debug!(step = newest, "Found new checkpoint");
                        return Some(Ok(CheckpointIdentifier::new(
                            checkpoint_path(&self.model_dir, newest),
                            newest,
                        )));
                    }

                    debug!(step = newest, "Skipping checkpoint at or below floor");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Drive the watcher on a background task and expose it as a stream
    pub fn into_stream(mut self) -> ReceiverStream<Result<CheckpointIdentifier>> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            while let Some(item) = self.next().await {
                if tx.send(item).await.is_err() {
                    debug!("Checkpoint stream receiver dropped");
                    break;
                }
            }
        });
        ReceiverStream::new(rx)
    }
}
