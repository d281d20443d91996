use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use civicdesk_domain::DomainResult;
use civicdesk_domain::complaint::{AuthorityComment, Complaint, ComplaintStatus};
use civicdesk_domain::error::DomainError;
use civicdesk_domain::ports::BoxFuture;
use civicdesk_domain::ports::complaints::ComplaintRepository;
use civicdesk_domain::query::{
    ComplaintFilter, ComplaintPage, ComplaintQuery, ComplaintSort, run_query,
};
use civicdesk_domain::upvotes::upvoted_revision;
use serde::Deserialize;
use serde_json::{Value, to_value};
use surrealdb::{Surreal, engine::remote::ws::Client};
use tokio::sync::RwLock;

use crate::db::{DbConfig, connect};

#[derive(Default, Clone)]
pub struct InMemoryComplaintRepository {
    complaints: Arc<RwLock<HashMap<String, Complaint>>>,
}

impl InMemoryComplaintRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComplaintRepository for InMemoryComplaintRepository {
    fn create(&self, complaint: &Complaint) -> BoxFuture<'_, DomainResult<Complaint>> {
        let complaint = complaint.clone();
        let complaints = self.complaints.clone();
        Box::pin(async move {
            let mut complaints = complaints.write().await;
            if complaints.contains_key(&complaint.complaint_id) {
                return Err(DomainError::Conflict);
            }
            complaints.insert(complaint.complaint_id.clone(), complaint.clone());
            Ok(complaint)
        })
    }

    fn add_upvote(
        &self,
        complaint_id: &str,
        voter_id: &str,
        now_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Complaint>> {
        let complaint_id = complaint_id.to_string();
        let voter_id = voter_id.to_string();
        let complaints = self.complaints.clone();
        Box::pin(async move {
            let mut complaints = complaints.write().await;
            let stored = complaints
                .get_mut(&complaint_id)
                .ok_or(DomainError::NotFound)?;
            let next = upvoted_revision(stored, &voter_id, now_ms)?;
            *stored = next.clone();
            Ok(next)
        })
    }

    fn get(&self, complaint_id: &str) -> BoxFuture<'_, DomainResult<Option<Complaint>>> {
        let complaint_id = complaint_id.to_string();
        let complaints = self.complaints.clone();
        Box::pin(async move {
            let complaints = complaints.read().await;
            Ok(complaints.get(&complaint_id).cloned())
        })
    }

    fn update(
        &self,
        complaint: &Complaint,
        expected_version: u64,
    ) -> BoxFuture<'_, DomainResult<Complaint>> {
        let complaint = complaint.clone();
        let complaints = self.complaints.clone();
        Box::pin(async move {
            let mut complaints = complaints.write().await;
            let stored = complaints
                .get_mut(&complaint.complaint_id)
                .ok_or(DomainError::NotFound)?;
            if stored.version != expected_version {
                return Err(DomainError::Conflict);
            }
            *stored = complaint.clone();
            Ok(complaint)
        })
    }

    fn query(&self, query: &ComplaintQuery) -> BoxFuture<'_, DomainResult<ComplaintPage>> {
        let query = query.clone();
        let complaints = self.complaints.clone();
        Box::pin(async move {
            let complaints = complaints.read().await;
            Ok(run_query(complaints.values(), &query))
        })
    }
}

const COMPLAINT_FIELDS: &str = "complaint_id, title, description, location_text, department, \
     photos, status, author_id, upvotes, upvoters, authority_comments, resolved_at_ms, \
     created_at_ms, updated_at_ms, version";

const UPVOTE_ATTEMPTS: usize = 3;

const SCHEMA: &str = "DEFINE TABLE IF NOT EXISTS complaint SCHEMALESS; \
     DEFINE INDEX IF NOT EXISTS complaint_id_unique ON TABLE complaint FIELDS complaint_id UNIQUE; \
     DEFINE INDEX IF NOT EXISTS complaint_author ON TABLE complaint FIELDS author_id; \
     DEFINE INDEX IF NOT EXISTS complaint_department_status ON TABLE complaint FIELDS department, status;";

#[derive(Clone)]
pub struct SurrealComplaintRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealComplaintRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    pub async fn new(db_config: &DbConfig) -> anyhow::Result<Self> {
        let db = connect(db_config).await?;
        db.query(SCHEMA).await?.check()?;
        Ok(Self::with_client(Arc::new(db)))
    }

    fn map_surreal_error(err: surrealdb::Error) -> DomainError {
        let error_message = err.to_string().to_lowercase();
        if error_message.contains("already exists")
            || error_message.contains("already contains")
            || error_message.contains("duplicate")
            || error_message.contains("unique")
        {
            return DomainError::Conflict;
        }
        tracing::error!(error = %error_message, "surreal query failed");
        DomainError::Store(format!("surreal query failed: {error_message}"))
    }

    fn decode_rows(rows: Vec<Value>) -> DomainResult<Vec<Complaint>> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<SurrealComplaintRow>(row)
                    .map_err(|err| DomainError::Store(format!("invalid complaint row: {err}")))
                    .and_then(SurrealComplaintRow::into_complaint)
            })
            .collect()
    }

    fn order_clause(sort: ComplaintSort) -> &'static str {
        match sort {
            ComplaintSort::Upvotes => " ORDER BY upvotes DESC, complaint_id DESC",
            ComplaintSort::Newest => " ORDER BY created_at_ms DESC, complaint_id DESC",
        }
    }

    fn where_clause(filter: &ComplaintFilter) -> String {
        let mut clauses = Vec::new();
        if filter.author_id.is_some() {
            clauses.push("author_id = $author_id");
        }
        if filter.departments.is_some() {
            clauses.push("department IN $departments");
        }
        if filter.status.is_some() {
            clauses.push("status = $status");
        }
        if !filter.exclude_statuses.is_empty() {
            clauses.push("status NOT IN $excluded_statuses");
        }
        if filter.area.is_some() {
            clauses.push("string::contains(string::lowercase(location_text), $area)");
        }
        if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        }
    }

    fn as_i64(value: u64) -> i64 {
        i64::try_from(value).unwrap_or(i64::MAX)
    }

    async fn select_by_id(&self, complaint_id: String) -> DomainResult<Option<Complaint>> {
        let statement = format!(
            "SELECT {COMPLAINT_FIELDS} FROM complaint WHERE complaint_id = $complaint_id LIMIT 1"
        );
        let mut response = self
            .client
            .query(&statement)
            .bind(("complaint_id", complaint_id))
            .await
            .map_err(Self::map_surreal_error)?;
        let rows: Vec<Value> = response
            .take(0)
            .map_err(|err| DomainError::Store(format!("invalid query result: {err}")))?;
        Ok(Self::decode_rows(rows)?.pop())
    }
}

impl ComplaintRepository for SurrealComplaintRepository {
    fn create(&self, complaint: &Complaint) -> BoxFuture<'_, DomainResult<Complaint>> {
        let complaint = complaint.clone();
        Box::pin(async move {
            let comments = to_value(&complaint.authority_comments)
                .map_err(|err| DomainError::Store(format!("invalid comments: {err}")))?;
            self.client
                .query(
                    "CREATE complaint SET \
                        complaint_id = $complaint_id, \
                        title = $title, \
                        description = $description, \
                        location_text = $location_text, \
                        department = $department, \
                        photos = $photos, \
                        status = $status, \
                        author_id = $author_id, \
                        upvotes = $upvotes, \
                        upvoters = $upvoters, \
                        authority_comments = $authority_comments, \
                        resolved_at_ms = $resolved_at_ms, \
                        created_at_ms = $created_at_ms, \
                        updated_at_ms = $updated_at_ms, \
                        version = $version",
                )
                .bind(("complaint_id", complaint.complaint_id.clone()))
                .bind(("title", complaint.title.clone()))
                .bind(("description", complaint.description.clone()))
                .bind(("location_text", complaint.location_text.clone()))
                .bind(("department", complaint.department.clone()))
                .bind(("photos", complaint.photos.clone()))
                .bind(("status", complaint.status.as_str()))
                .bind(("author_id", complaint.author_id.clone()))
                .bind(("upvotes", Self::as_i64(complaint.upvotes)))
                .bind((
                    "upvoters",
                    complaint.upvoters.iter().cloned().collect::<Vec<_>>(),
                ))
                .bind(("authority_comments", comments))
                .bind(("resolved_at_ms", complaint.resolved_at_ms))
                .bind(("created_at_ms", complaint.created_at_ms))
                .bind(("updated_at_ms", complaint.updated_at_ms))
                .bind(("version", Self::as_i64(complaint.version)))
                .await
                .map_err(Self::map_surreal_error)?
                .check()
                .map_err(Self::map_surreal_error)?;
            Ok(complaint)
        })
    }

    fn add_upvote(
        &self,
        complaint_id: &str,
        voter_id: &str,
        now_ms: i64,
    ) -> BoxFuture<'_, DomainResult<Complaint>> {
        let complaint_id = complaint_id.to_string();
        let voter_id = voter_id.to_string();
        Box::pin(async move {
            let statement = format!(
                "UPDATE complaint SET \
                    upvoters += $voter_id, \
                    upvotes += 1, \
                    updated_at_ms = $now_ms, \
                    version += 1 \
                 WHERE complaint_id = $complaint_id \
                    AND string::lowercase(status) != 'resolved' \
                    AND author_id != $voter_id \
                    AND $voter_id NOTINSIDE upvoters \
                 RETURN {COMPLAINT_FIELDS}"
            );
            for _ in 0..UPVOTE_ATTEMPTS {
                let mut response = self
                    .client
                    .query(&statement)
                    .bind(("voter_id", voter_id.clone()))
                    .bind(("now_ms", now_ms))
                    .bind(("complaint_id", complaint_id.clone()))
                    .await
                    .map_err(Self::map_surreal_error)?;
                let rows: Vec<Value> = response
                    .take(0)
                    .map_err(|err| DomainError::Store(format!("invalid query result: {err}")))?;
                if let Some(updated) = Self::decode_rows(rows)?.pop() {
                    return Ok(updated);
                }

                // Nothing matched: report why from the stored record, unless a
                // reopen slipped in between and the vote is now allowed.
                let current = self
                    .select_by_id(complaint_id.clone())
                    .await?
                    .ok_or(DomainError::NotFound)?;
                upvoted_revision(&current, &voter_id, now_ms)?;
            }
            Err(DomainError::Conflict)
        })
    }

    fn get(&self, complaint_id: &str) -> BoxFuture<'_, DomainResult<Option<Complaint>>> {
        let complaint_id = complaint_id.to_string();
        Box::pin(async move { self.select_by_id(complaint_id).await })
    }

    fn update(
        &self,
        complaint: &Complaint,
        expected_version: u64,
    ) -> BoxFuture<'_, DomainResult<Complaint>> {
        let complaint = complaint.clone();
        Box::pin(async move {
            let comments = to_value(&complaint.authority_comments)
                .map_err(|err| DomainError::Store(format!("invalid comments: {err}")))?;
            let mut response = self
                .client
                .query(
                    "UPDATE complaint SET \
                        title = $title, \
                        description = $description, \
                        location_text = $location_text, \
                        department = $department, \
                        photos = $photos, \
                        status = $status, \
                        upvotes = $upvotes, \
                        upvoters = $upvoters, \
                        authority_comments = $authority_comments, \
                        resolved_at_ms = $resolved_at_ms, \
                        updated_at_ms = $updated_at_ms, \
                        version = $version \
                     WHERE complaint_id = $complaint_id AND version = $expected_version \
                     RETURN complaint_id",
                )
                .bind(("title", complaint.title.clone()))
                .bind(("description", complaint.description.clone()))
                .bind(("location_text", complaint.location_text.clone()))
                .bind(("department", complaint.department.clone()))
                .bind(("photos", complaint.photos.clone()))
                .bind(("status", complaint.status.as_str()))
                .bind(("upvotes", Self::as_i64(complaint.upvotes)))
                .bind((
                    "upvoters",
                    complaint.upvoters.iter().cloned().collect::<Vec<_>>(),
                ))
                .bind(("authority_comments", comments))
                .bind(("resolved_at_ms", complaint.resolved_at_ms))
                .bind(("updated_at_ms", complaint.updated_at_ms))
                .bind(("version", Self::as_i64(complaint.version)))
                .bind(("complaint_id", complaint.complaint_id.clone()))
                .bind(("expected_version", Self::as_i64(expected_version)))
                .await
                .map_err(Self::map_surreal_error)?;
            let updated: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Store(format!("invalid query result: {err}")))?;
            if !updated.is_empty() {
                return Ok(complaint);
            }

            match self.select_by_id(complaint.complaint_id.clone()).await? {
                Some(_) => Err(DomainError::Conflict),
                None => Err(DomainError::NotFound),
            }
        })
    }

    fn query(&self, query: &ComplaintQuery) -> BoxFuture<'_, DomainResult<ComplaintPage>> {
        let query = query.clone();
        Box::pin(async move {
            let filter = &query.filter;
            let where_clause = Self::where_clause(filter);
            let mut statement = format!(
                "SELECT {COMPLAINT_FIELDS} FROM complaint{where_clause}{}",
                Self::order_clause(query.sort)
            );
            if query.limit.is_some() {
                statement.push_str(" LIMIT $limit");
            }
            if query.skip > 0 {
                statement.push_str(" START $start");
            }
            statement.push_str(&format!(
                "; SELECT count() AS total FROM complaint{where_clause} GROUP ALL;"
            ));

            let mut pending = self.client.query(&statement);
            if let Some(author_id) = filter.author_id.clone() {
                pending = pending.bind(("author_id", author_id));
            }
            if let Some(departments) = filter.departments.clone() {
                pending = pending.bind(("departments", departments));
            }
            if let Some(status) = filter.status {
                pending = pending.bind(("status", status.as_str()));
            }
            if !filter.exclude_statuses.is_empty() {
                let excluded: Vec<String> = filter
                    .exclude_statuses
                    .iter()
                    .map(|status| status.as_str().to_string())
                    .collect();
                pending = pending.bind(("excluded_statuses", excluded));
            }
            if let Some(area) = filter.area.clone() {
                pending = pending.bind(("area", area));
            }
            if let Some(limit) = query.limit {
                pending = pending.bind(("limit", Self::as_i64(limit)));
            }
            if query.skip > 0 {
                pending = pending.bind(("start", Self::as_i64(query.skip)));
            }

            let mut response = pending.await.map_err(Self::map_surreal_error)?;
            let rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Store(format!("invalid query result: {err}")))?;
            let totals: Vec<Value> = response
                .take(1)
                .map_err(|err| DomainError::Store(format!("invalid query result: {err}")))?;
            let total = totals
                .first()
                .and_then(|row| row.get("total"))
                .and_then(|value| {
                    value
                        .as_u64()
                        .or_else(|| value.as_i64().and_then(|number| u64::try_from(number).ok()))
                })
                .unwrap_or(0);

            Ok(ComplaintPage {
                items: Self::decode_rows(rows)?,
                total,
            })
        })
    }
}

#[derive(Debug, Deserialize)]
struct SurrealComplaintRow {
    complaint_id: String,
    title: String,
    description: String,
    location_text: String,
    department: String,
    #[serde(default)]
    photos: Vec<String>,
    status: String,
    author_id: String,
    upvotes: u64,
    #[serde(default)]
    upvoters: BTreeSet<String>,
    #[serde(default)]
    authority_comments: Vec<AuthorityComment>,
    #[serde(default)]
    resolved_at_ms: Option<i64>,
    created_at_ms: i64,
    updated_at_ms: i64,
    version: u64,
}

impl SurrealComplaintRow {
    fn into_complaint(self) -> DomainResult<Complaint> {
        let status = self.status.parse::<ComplaintStatus>().map_err(|_| {
            DomainError::Store(format!("invalid complaint status '{}'", self.status))
        })?;
        Ok(Complaint {
            complaint_id: self.complaint_id,
            title: self.title,
            description: self.description,
            location_text: self.location_text,
            department: self.department,
            photos: self.photos,
            status,
            author_id: self.author_id,
            upvotes: self.upvotes,
            upvoters: self.upvoters,
            authority_comments: self.authority_comments,
            resolved_at_ms: self.resolved_at_ms,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
            version: self.version,
        })
    }
}
