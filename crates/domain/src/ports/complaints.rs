use crate::DomainResult;
use crate::complaint::Complaint;
use crate::ports::BoxFuture;
use crate::query::{ComplaintPage, ComplaintQuery};

#[allow(clippy::needless_pass_by_value)]
pub trait ComplaintRepository: Send + Sync {
    /// Fails with `Conflict` when the id is already taken.
    fn create(&self, complaint: &Complaint) -> BoxFuture<'_, DomainResult<Complaint>>;

    fn get(&self, complaint_id: &str) -> BoxFuture<'_, DomainResult<Option<Complaint>>>;

    /// Replaces the stored document only while its version still equals
    /// `expected_version`; a stale version yields `Conflict`.
    fn update(
        &self,
        complaint: &Complaint,
        expected_version: u64,
    ) -> BoxFuture<'_, DomainResult<Complaint>>;

    /// Adds `voter_id` to the voter set and bumps count and version as one
    /// conditional write. Refusals carry the ledger's error for the stored
    /// record (`InvalidState`, `Forbidden`, `AlreadyVoted`) or `NotFound`.
    fn add_upvote(
        &self,
        complaint_id: &str,
        voter_id: &str,
        now_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Complaint>>;

    fn query(&self, query: &ComplaintQuery) -> BoxFuture<'_, DomainResult<ComplaintPage>>;
}
