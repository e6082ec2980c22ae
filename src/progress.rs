use crate::analysis::{AnalysisMode, JobStatus};
use crate::session::TeardownReason;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::info;

type SubscriptionId = u64;

/// Progress updates emitted by the session engine.
///
/// Every event carries the session generation it belongs to, so subscribers
/// can ignore events from a session that has since been torn down.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionProgress {
    UploadStarted {
        generation: u64,
        total: usize,
    },
    PhotoUploaded {
        generation: u64,
        photo_id: String,
        completed: usize,
        total: usize,
        percent: u8,
    },
    UploadFailed {
        generation: u64,
        failed: usize,
    },
    UploadComplete {
        generation: u64,
        session_id: String,
    },
    AnalysisSubmitted {
        generation: u64,
        session_id: String,
        mode: AnalysisMode,
    },
    AnalysisPolled {
        generation: u64,
        attempt: u32,
        max_attempts: u32,
        status: JobStatus,
        percent: u8,
    },
    AnalysisComplete {
        generation: u64,
        groups: usize,
    },
    AnalysisFailed {
        generation: u64,
        error: String,
    },
    TornDown {
        generation: u64,
        reason: TeardownReason,
    },
}

impl SessionProgress {
    pub fn generation(&self) -> u64 {
        match self {
            SessionProgress::UploadStarted { generation, .. }
            | SessionProgress::PhotoUploaded { generation, .. }
            | SessionProgress::UploadFailed { generation, .. }
            | SessionProgress::UploadComplete { generation, .. }
            | SessionProgress::AnalysisSubmitted { generation, .. }
            | SessionProgress::AnalysisPolled { generation, .. }
            | SessionProgress::AnalysisComplete { generation, .. }
            | SessionProgress::AnalysisFailed { generation, .. }
            | SessionProgress::TornDown { generation, .. } => *generation,
        }
    }
}

/// Filter criteria for progress subscriptions
#[derive(Debug, Clone)]
enum SubscriptionFilter {
    All,
    Generation(u64),
}

impl SubscriptionFilter {
    fn matches(&self, progress: &SessionProgress) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Generation(generation) => progress.generation() == *generation,
        }
    }
}

struct Subscription {
    filter: SubscriptionFilter,
    tx: tokio_mpsc::UnboundedSender<SessionProgress>,
}

/// Handle for subscribing to session progress updates
#[derive(Clone)]
pub struct ProgressHandle {
    subscriptions: Arc<Mutex<HashMap<SubscriptionId, Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl ProgressHandle {
    /// Create a new progress handle and spawn background task to process progress updates
    pub fn new(
        mut progress_rx: tokio_mpsc::UnboundedReceiver<SessionProgress>,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        let subscriptions: Arc<Mutex<HashMap<SubscriptionId, Subscription>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let subscriptions_clone = subscriptions.clone();

        // Spawn async task to receive progress updates and dispatch to subscribers
        runtime_handle.spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                let mut subs = subscriptions_clone
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());

                // If send fails, receiver was dropped - drop the subscription
                subs.retain(|_, subscription| {
                    !subscription.filter.matches(&progress)
                        || subscription.tx.send(progress.clone()).is_ok()
                });
            }
            info!("Progress channel closed, exiting");
        });

        Self {
            subscriptions,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to every progress update
    pub fn subscribe(&self) -> tokio_mpsc::UnboundedReceiver<SessionProgress> {
        self.add(SubscriptionFilter::All)
    }

    /// Subscribe to progress updates for one session generation
    /// Subscription is automatically removed when receiver is dropped
    pub fn subscribe_generation(
        &self,
        generation: u64,
    ) -> tokio_mpsc::UnboundedReceiver<SessionProgress> {
        self.add(SubscriptionFilter::Generation(generation))
    }

    fn add(&self, filter: SubscriptionFilter) -> tokio_mpsc::UnboundedReceiver<SessionProgress> {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, Subscription { filter, tx });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generation_filter() {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let handle = ProgressHandle::new(rx, tokio::runtime::Handle::current());

        let mut all = handle.subscribe();
        let mut second = handle.subscribe_generation(2);

        tx.send(SessionProgress::UploadStarted {
            generation: 1,
            total: 3,
        })
        .unwrap();
        tx.send(SessionProgress::UploadFailed {
            generation: 2,
            failed: 1,
        })
        .unwrap();

        assert_eq!(all.recv().await.unwrap().generation(), 1);
        assert_eq!(all.recv().await.unwrap().generation(), 2);
        assert_eq!(
            second.recv().await.unwrap(),
            SessionProgress::UploadFailed {
                generation: 2,
                failed: 1
            }
        );
    }
}
