//! Debounced auto-sync triggering.
//!
//! Local mutations schedule a delayed cycle so a burst of edits produces
//! one network round trip; a visibility/resume event triggers an
//! immediate cycle when the last successful sync is stale. The loop runs
//! on a background task driven by a control channel, so tests can drive
//! it under virtual time.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info};

use inkvault_common::Result;

use crate::session::{SyncConfig, SyncOutcome};

#[derive(Debug)]
enum Trigger {
    Mutation,
    Resume,
    Shutdown,
}

/// Handle for notifying the auto-sync loop.
#[derive(Clone)]
pub struct AutoSyncHandle {
    trigger_tx: mpsc::Sender<Trigger>,
}

impl AutoSyncHandle {
    /// Note a local mutation: (re)arms the debounce window.
    pub async fn note_mutation(&self) {
        let _ = self.trigger_tx.send(Trigger::Mutation).await;
    }

    /// Note a visibility/resume event: syncs immediately if stale.
    pub async fn note_resume(&self) {
        let _ = self.trigger_tx.send(Trigger::Resume).await;
    }

    /// Stop the auto-sync loop.
    pub async fn shutdown(&self) {
        let _ = self.trigger_tx.send(Trigger::Shutdown).await;
    }
}

/// Background auto-sync loop.
pub struct AutoSync;

impl AutoSync {
    /// Spawn the loop. `sync_fn` is called whenever a cycle is due; the
    /// session's single-flight guard makes overlapping calls harmless.
    pub fn spawn<F, Fut>(config: SyncConfig, sync_fn: F) -> AutoSyncHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<SyncOutcome>> + Send + 'static,
    {
        let (trigger_tx, trigger_rx) = mpsc::channel(16);
        tokio::spawn(Self::run(config, trigger_rx, sync_fn));
        AutoSyncHandle { trigger_tx }
    }

    async fn run<F, Fut>(config: SyncConfig, mut trigger_rx: mpsc::Receiver<Trigger>, sync_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<SyncOutcome>> + Send + 'static,
    {
        let mut deadline: Option<Instant> = None;
        let mut last_success: Option<Instant> = None;

        info!("auto-sync loop started");

        loop {
            tokio::select! {
                trigger = trigger_rx.recv() => match trigger {
                    None | Some(Trigger::Shutdown) => {
                        info!("auto-sync loop shutting down");
                        break;
                    }
                    Some(Trigger::Mutation) => {
                        // Cancel-and-reschedule: the burst collapses into
                        // one cycle at the end of the window.
                        deadline = Some(Instant::now() + config.debounce);
                        debug!("mutation noted, debounce window armed");
                    }
                    Some(Trigger::Resume) => {
                        let stale = last_success
                            .map_or(true, |at| at.elapsed() >= config.staleness_threshold);
                        if stale {
                            debug!("resume with stale state, syncing now");
                            deadline = None;
                            Self::run_cycle(&sync_fn, &mut last_success).await;
                        } else {
                            debug!("resume with fresh state, ignored");
                        }
                    }
                },

                _ = wait_for_deadline(deadline) => {
                    deadline = None;
                    Self::run_cycle(&sync_fn, &mut last_success).await;
                }
            }
        }
    }

    async fn run_cycle<F, Fut>(sync_fn: &F, last_success: &mut Option<Instant>)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<SyncOutcome>> + Send,
    {
        match sync_fn().await {
            Ok(SyncOutcome::Completed(report)) => {
                *last_success = Some(Instant::now());
                debug!("auto-sync cycle completed in {:?}", report.duration);
            }
            Ok(SyncOutcome::AlreadyInFlight) => {
                debug!("auto-sync cycle skipped, one already in flight");
            }
            Err(e) => {
                error!("auto-sync cycle failed: {}", e);
            }
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        // No deadline armed; park until a trigger rearms the loop.
        None => sleep(Duration::from_secs(3600)).await,
    }
}
