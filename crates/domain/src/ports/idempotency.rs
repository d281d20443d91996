use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::BoxFuture;
use crate::DomainResult;
use crate::complaint::Complaint;

/// A citizen's complaint submission, identified by the `x-request-id` they sent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    pub author_id: String,
    pub request_id: String,
}

impl SubmissionKey {
    pub fn new(author_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            request_id: request_id.into(),
        }
    }

    pub fn cache_key(&self, prefix: &str) -> String {
        format!("{prefix}:submission:{}:{}", self.author_id, self.request_id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "complaint", rename_all = "snake_case")]
pub enum SubmissionState {
    Pending,
    Filed(Box<Complaint>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    Existing(SubmissionState),
}

pub trait SubmissionStore: Send + Sync {
    /// Marks `key` pending unless a live entry already holds it.
    fn claim(
        &self,
        key: &SubmissionKey,
        ttl: Duration,
    ) -> BoxFuture<'_, DomainResult<ClaimOutcome>>;
    /// Replaces the pending marker with the filed complaint.
    fn record(
        &self,
        key: &SubmissionKey,
        complaint: &Complaint,
        ttl: Duration,
    ) -> BoxFuture<'_, DomainResult<()>>;
    /// Drops the entry so the same request id can be submitted again.
    fn release(&self, key: &SubmissionKey) -> BoxFuture<'_, DomainResult<()>>;
}
