use std::sync::Arc;

use metrics::counter;

use crate::DomainResult;
use crate::access::{ComplaintAction, authority_department, authorize};
use crate::complaint::{Complaint, ComplaintCreate, validate_complaint_create};
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::lifecycle::{StatusUpdate, apply_authority_update, apply_reopen, parse_status_update};
use crate::ports::blob::BlobStore;
use crate::ports::complaints::ComplaintRepository;
use crate::query::{
    AuthorityListQuery, AuthorityListing, AuthorityScope, PageRequest, authority_scope,
    citizen_query, public_query,
};
use crate::util::{now_ms, uuid_v7_without_dashes};

const MAX_MUTATION_ATTEMPTS: usize = 5;

const COMPLAINTS_CREATED_TOTAL: &str = "civicdesk_complaints_created_total";
const COMPLAINT_MUTATIONS_TOTAL: &str = "civicdesk_complaint_mutations_total";
const COMPLAINT_WRITE_CONFLICTS_TOTAL: &str = "civicdesk_complaint_write_conflicts_total";

#[derive(Clone)]
pub struct ComplaintService {
    repository: Arc<dyn ComplaintRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl ComplaintService {
    pub fn new(repository: Arc<dyn ComplaintRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repository, blobs }
    }

    pub async fn create(
        &self,
        actor: &ActorIdentity,
        input: ComplaintCreate,
    ) -> DomainResult<Complaint> {
        authorize(actor, ComplaintAction::File, None)?;
        let fields = validate_complaint_create(&input)?;

        let mut photos = Vec::with_capacity(input.photos.len());
        for photo in input.photos {
            match self
                .blobs
                .store(photo.file_name.as_deref(), photo.bytes)
                .await
            {
                Ok(path) => photos.push(path),
                Err(err) => {
                    self.discard_photos(&photos).await;
                    return Err(err);
                }
            }
        }

        let complaint = Complaint::submitted(
            uuid_v7_without_dashes(),
            actor.user_id.clone(),
            fields,
            photos,
            now_ms(),
        );
        let complaint = match self.repository.create(&complaint).await {
            Ok(saved) => saved,
            Err(err) => {
                self.discard_photos(&complaint.photos).await;
                return Err(err);
            }
        };

        counter!(COMPLAINTS_CREATED_TOTAL, "department" => complaint.department.clone())
            .increment(1);
        tracing::info!(
            complaint_id = %complaint.complaint_id,
            author_id = %complaint.author_id,
            department = %complaint.department,
            photos = complaint.photos.len(),
            "complaint filed"
        );
        Ok(complaint)
    }

    pub async fn get(&self, actor: &ActorIdentity, complaint_id: &str) -> DomainResult<Complaint> {
        let complaint = self.load(complaint_id).await?;
        // Out-of-scope records are reported as missing.
        authorize(actor, ComplaintAction::View, Some(&complaint)).map_err(|err| match err {
            DomainError::Forbidden(_) => DomainError::NotFound,
            other => other,
        })?;
        Ok(complaint)
    }

    pub async fn list_for_citizen(&self, actor: &ActorIdentity) -> DomainResult<Vec<Complaint>> {
        authorize(actor, ComplaintAction::ListOwn, None)?;
        let page = self
            .repository
            .query(&citizen_query(&actor.user_id))
            .await?;
        Ok(page.items)
    }

    pub async fn list_public(
        &self,
        actor: &ActorIdentity,
        department: Option<&str>,
    ) -> DomainResult<Vec<Complaint>> {
        authorize(actor, ComplaintAction::Browse, None)?;
        let page = self.repository.query(&public_query(department)).await?;
        Ok(page.items)
    }

    pub async fn list_for_authority(
        &self,
        actor: &ActorIdentity,
        request: &AuthorityListQuery,
    ) -> DomainResult<AuthorityListing> {
        authorize(actor, ComplaintAction::ListQueue, None)?;
        let department = authority_department(actor)?;
        let page = PageRequest::normalize(request.page, request.limit);

        let query = match authority_scope(department, request, page) {
            AuthorityScope::Query(query) => query,
            AuthorityScope::Unmatched => return Ok(AuthorityListing::empty(page)),
        };
        let result = self.repository.query(&query).await?;
        Ok(AuthorityListing {
            complaints: result.items,
            total_pages: page.total_pages(result.total),
            current_page: page.page,
            total: result.total,
        })
    }

    /// Applied by the store as a single conditional write.
    pub async fn upvote(
        &self,
        actor: &ActorIdentity,
        complaint_id: &str,
    ) -> DomainResult<Complaint> {
        authorize(actor, ComplaintAction::Upvote, None)?;
        let complaint = self
            .repository
            .add_upvote(complaint_id, &actor.user_id, now_ms())
            .await
            .inspect_err(|err| {
                if matches!(err, DomainError::Store(_)) {
                    tracing::error!(complaint_id, error = %err, "upvote save failed");
                }
            })?;

        counter!(COMPLAINT_MUTATIONS_TOTAL, "action" => ComplaintAction::Upvote.as_str())
            .increment(1);
        tracing::info!(
            complaint_id,
            actor_id = %actor.user_id,
            upvotes = complaint.upvotes,
            version = complaint.version,
            "complaint upvoted"
        );
        Ok(complaint)
    }

    pub async fn update_status(
        &self,
        actor: &ActorIdentity,
        complaint_id: &str,
        update: StatusUpdate,
    ) -> DomainResult<Complaint> {
        self.mutate(
            actor,
            complaint_id,
            ComplaintAction::UpdateStatus,
            |complaint, now| {
                let change = parse_status_update(&update)?;
                apply_authority_update(complaint, &actor.user_id, &change, now)
            },
        )
        .await
    }

    pub async fn reopen(
        &self,
        actor: &ActorIdentity,
        complaint_id: &str,
    ) -> DomainResult<Complaint> {
        self.mutate(actor, complaint_id, ComplaintAction::Reopen, |complaint, now| {
            apply_reopen(complaint, &actor.user_id, now)
        })
        .await
    }

    async fn discard_photos(&self, paths: &[String]) {
        for path in paths {
            if let Err(err) = self.blobs.remove(path).await {
                tracing::warn!(path = %path, error = %err, "orphaned complaint photo");
            }
        }
    }

    async fn load(&self, complaint_id: &str) -> DomainResult<Complaint> {
        self.repository
            .get(complaint_id)
            .await?
            .ok_or(DomainError::NotFound)
    }

    /// Read-modify-write against one complaint, saved with compare-and-swap on
    /// `version`. A lost race re-reads and re-applies the mutation.
    async fn mutate<F>(
        &self,
        actor: &ActorIdentity,
        complaint_id: &str,
        action: ComplaintAction,
        mut mutation: F,
    ) -> DomainResult<Complaint>
    where
        F: FnMut(&mut Complaint, i64) -> DomainResult<()>,
    {
        authorize(actor, action, None)?;

        for attempt in 1..=MAX_MUTATION_ATTEMPTS {
            let current = self.load(complaint_id).await?;
            authorize(actor, action, Some(&current))?;

            let mut next = current.clone();
            mutation(&mut next, now_ms())?;
            if next == current {
                return Ok(current);
            }
            next.version = current.version + 1;
            next.check_invariants()?;

            match self.repository.update(&next, current.version).await {
                Ok(saved) => {
                    counter!(COMPLAINT_MUTATIONS_TOTAL, "action" => action.as_str())
                        .increment(1);
                    tracing::info!(
                        complaint_id,
                        actor_id = %actor.user_id,
                        action = action.as_str(),
                        status = %saved.status,
                        upvotes = saved.upvotes,
                        version = saved.version,
                        "complaint updated"
                    );
                    return Ok(saved);
                }
                Err(DomainError::Conflict) => {
                    counter!(COMPLAINT_WRITE_CONFLICTS_TOTAL, "action" => action.as_str())
                        .increment(1);
                    tracing::debug!(
                        complaint_id,
                        action = action.as_str(),
                        attempt,
                        "complaint changed concurrently; retrying"
                    );
                }
                Err(err) => {
                    if matches!(err, DomainError::Store(_)) {
                        tracing::error!(complaint_id, error = %err, "complaint save failed");
                    }
                    return Err(err);
                }
            }
        }

        tracing::warn!(
            complaint_id,
            action = action.as_str(),
            "giving up after repeated write conflicts"
        );
        Err(DomainError::Conflict)
    }
}
