//! Delayed follow-up scheduling.
//!
//! A subscribed user receives a second document a fixed time after the gated
//! file. Jobs run as tracked tokio tasks under a shared cancellation root, so
//! shutdown (and tests) can cancel or await pending sends instead of leaking
//! detached tasks. Jobs do not survive a process restart.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teloxide::types::ChatId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::bot::api::ChannelGateApi;

/// One pending follow-up send
#[derive(Debug, Clone)]
pub struct FollowUpJob {
    /// Chat the document is delivered to
    pub chat: ChatId,
    /// Document to send
    pub document: PathBuf,
    /// Caption attached to the document
    pub caption: String,
    /// How long to wait before sending
    pub delay: Duration,
}

/// Tracks scheduled follow-up tasks and their cancellation tokens
pub struct FollowUpScheduler {
    root: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for FollowUpScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FollowUpScheduler {
    /// Create an empty scheduler
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Schedule a follow-up send after `job.delay`.
    ///
    /// Returns a cancellation handle for this job; cancelling it skips the
    /// send if the delay has not elapsed yet.
    pub fn schedule(&self, api: Arc<dyn ChannelGateApi>, job: FollowUpJob) -> CancellationToken {
        let token = self.root.child_token();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                () = task_token.cancelled() => {
                    debug!("Follow-up for chat {} cancelled", job.chat);
                }
                () = tokio::time::sleep(job.delay) => {
                    if let Err(e) = api.send_document(job.chat, job.document, job.caption).await {
                        error!("Failed to send follow-up to chat {}: {}", job.chat, e);
                    }
                }
            }
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|h| !h.is_finished());
            tasks.push(handle);
        }
        token
    }

    /// Number of jobs that have not finished yet
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Cancel every pending job and wait for the tasks to wind down
    pub async fn shutdown(&self) {
        self.root.cancel();
        self.join_all().await;
    }

    /// Wait for all currently scheduled jobs to run to completion
    pub async fn wait_idle(&self) {
        self.join_all().await;
    }

    async fn join_all(&self) {
        let drained = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect::<Vec<_>>(),
            Err(_) => return,
        };
        for handle in drained {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::api::MockChannelGateApi;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_api(sent: &Arc<AtomicUsize>) -> Arc<dyn ChannelGateApi> {
        let sent = Arc::clone(sent);
        let mut mock = MockChannelGateApi::new();
        mock.expect_send_document().returning(move |_, _, _| {
            sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        Arc::new(mock)
    }

    fn job(delay: Duration) -> FollowUpJob {
        FollowUpJob {
            chat: ChatId(42),
            document: PathBuf::from("assets/report.pdf"),
            caption: "later".to_string(),
            delay,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_followup_fires_no_earlier_than_delay() {
        let sent = Arc::new(AtomicUsize::new(0));
        let scheduler = FollowUpScheduler::new();
        scheduler.schedule(counting_api(&sent), job(Duration::from_secs(900)));

        // Let the task register its timer
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(899)).await;
        tokio::task::yield_now().await;
        assert_eq!(sent.load(Ordering::SeqCst), 0, "fired before the delay");

        tokio::time::advance(Duration::from_secs(2)).await;
        scheduler.wait_idle().await;
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_job_never_sends() {
        let sent = Arc::new(AtomicUsize::new(0));
        let scheduler = FollowUpScheduler::new();
        let token = scheduler.schedule(counting_api(&sent), job(Duration::from_secs(900)));

        tokio::task::yield_now().await;
        token.cancel();

        tokio::time::advance(Duration::from_secs(1000)).await;
        scheduler.wait_idle().await;
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_all_pending() {
        let sent = Arc::new(AtomicUsize::new(0));
        let scheduler = FollowUpScheduler::new();
        scheduler.schedule(counting_api(&sent), job(Duration::from_secs(900)));
        scheduler.schedule(counting_api(&sent), job(Duration::from_secs(300)));

        tokio::task::yield_now().await;
        assert_eq!(scheduler.pending_count(), 2);

        scheduler.shutdown().await;
        tokio::time::advance(Duration::from_secs(1000)).await;
        assert_eq!(sent.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_count(), 0);
    }
}
