use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::DomainResult;
use crate::complaint::Complaint;
use crate::ports::BoxFuture;
use crate::ports::idempotency::{ClaimOutcome, SubmissionKey, SubmissionState, SubmissionStore};

#[derive(Clone, Debug)]
pub struct SubmissionConfig {
    /// How long a claimed request id blocks retries while the create runs.
    pub pending_ttl: Duration,
    pub filed_ttl: Duration,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            pending_ttl: Duration::from_secs(60),
            filed_ttl: Duration::from_secs(60 * 60 * 24),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    InProgress,
    Replay(Complaint),
}

/// Makes complaint creation safe to retry with the same request id.
#[derive(Clone)]
pub struct SubmissionGuard {
    store: Arc<dyn SubmissionStore>,
    config: SubmissionConfig,
}

impl SubmissionGuard {
    pub fn new(store: Arc<dyn SubmissionStore>, config: SubmissionConfig) -> Self {
        Self { store, config }
    }

    pub async fn begin(&self, key: &SubmissionKey) -> DomainResult<BeginOutcome> {
        let outcome = match self.store.claim(key, self.config.pending_ttl).await? {
            ClaimOutcome::Claimed => BeginOutcome::Started,
            ClaimOutcome::Existing(SubmissionState::Pending) => BeginOutcome::InProgress,
            ClaimOutcome::Existing(SubmissionState::Filed(complaint)) => {
                BeginOutcome::Replay(*complaint)
            }
        };
        tracing::debug!(
            author_id = %key.author_id,
            request_id = %key.request_id,
            outcome = outcome_label(&outcome),
            "submission claimed"
        );
        Ok(outcome)
    }

    pub async fn complete(&self, key: &SubmissionKey, complaint: &Complaint) -> DomainResult<()> {
        self.store
            .record(key, complaint, self.config.filed_ttl)
            .await
    }

    /// Frees a claim whose create failed.
    pub async fn release(&self, key: &SubmissionKey) {
        if let Err(err) = self.store.release(key).await {
            tracing::warn!(
                author_id = %key.author_id,
                request_id = %key.request_id,
                error = %err,
                "failed to release submission claim"
            );
        }
    }
}

fn outcome_label(outcome: &BeginOutcome) -> &'static str {
    match outcome {
        BeginOutcome::Started => "started",
        BeginOutcome::InProgress => "in_progress",
        BeginOutcome::Replay(_) => "replay",
    }
}

#[derive(Clone, Debug)]
struct MemoryEntry {
    state: SubmissionState,
    expires_at: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct InMemorySubmissionStore {
    entries: Arc<RwLock<HashMap<SubmissionKey, MemoryEntry>>>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    fn claim(
        &self,
        key: &SubmissionKey,
        ttl: Duration,
    ) -> BoxFuture<'_, DomainResult<ClaimOutcome>> {
        let key = key.clone();
        let entries = self.entries.clone();
        Box::pin(async move {
            let mut entries = entries.write().await;
            let now = Instant::now();
            if let Some(entry) = entries.get(&key) {
                if entry.expires_at > now {
                    return Ok(ClaimOutcome::Existing(entry.state.clone()));
                }
            }
            entries.insert(
                key,
                MemoryEntry {
                    state: SubmissionState::Pending,
                    expires_at: now + ttl,
                },
            );
            Ok(ClaimOutcome::Claimed)
        })
    }

    fn record(
        &self,
        key: &SubmissionKey,
        complaint: &Complaint,
        ttl: Duration,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let key = key.clone();
        let state = SubmissionState::Filed(Box::new(complaint.clone()));
        let entries = self.entries.clone();
        Box::pin(async move {
            entries.write().await.insert(
                key,
                MemoryEntry {
                    state,
                    expires_at: Instant::now() + ttl,
                },
            );
            Ok(())
        })
    }

    fn release(&self, key: &SubmissionKey) -> BoxFuture<'_, DomainResult<()>> {
        let key = key.clone();
        let entries = self.entries.clone();
        Box::pin(async move {
            entries.write().await.remove(&key);
            Ok(())
        })
    }
}
