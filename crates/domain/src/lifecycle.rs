//! Complaint status workflow.
//!
//! Authorities may move a complaint to any status except `reopened`; only the
//! author may reopen, and only from `resolved`. `resolved_at_ms` is
//! stamped on entering `resolved` and cleared on every other transition.

use crate::DomainResult;
use crate::complaint::{AuthorityComment, Complaint, ComplaintStatus, MAX_COMMENT_LENGTH};
use crate::error::DomainError;

/// Raw authority request, as received from the caller.
#[derive(Clone, Debug, Default)]
pub struct StatusUpdate {
    pub status: Option<String>,
    pub comment: Option<String>,
}

/// Validated form of [`StatusUpdate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub status: Option<ComplaintStatus>,
    pub comment: Option<String>,
}

impl StatusChange {
    pub fn is_noop(&self) -> bool {
        self.status.is_none() && self.comment.is_none()
    }
}

pub fn authority_settable(status: ComplaintStatus) -> bool {
    !matches!(status, ComplaintStatus::Reopened)
}

pub fn parse_status_update(update: &StatusUpdate) -> DomainResult<StatusChange> {
    let status = match update
        .status
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(raw) => {
            let status = raw
                .parse::<ComplaintStatus>()
                .map_err(|_| DomainError::Validation(format!("invalid status '{raw}'")))?;
            if !authority_settable(status) {
                return Err(DomainError::Forbidden(
                    "authorities cannot reopen complaints".into(),
                ));
            }
            Some(status)
        }
        None => None,
    };

    let comment = update
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    if let Some(comment) = comment.as_ref() {
        if comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(DomainError::Validation(format!(
                "comment exceeds max length of {MAX_COMMENT_LENGTH}"
            )));
        }
    }

    Ok(StatusChange { status, comment })
}

/// Applies an authority update. Status and comment land together or not at all.
pub fn apply_authority_update(
    complaint: &mut Complaint,
    authority_id: &str,
    change: &StatusChange,
    now_ms: i64,
) -> DomainResult<()> {
    if change.is_noop() {
        return Ok(());
    }

    if let Some(status) = change.status {
        if !authority_settable(status) {
            return Err(DomainError::Forbidden(
                "authorities cannot reopen complaints".into(),
            ));
        }
        complaint.status = status;
        complaint.resolved_at_ms = match status {
            ComplaintStatus::Resolved => Some(now_ms),
            _ => None,
        };
    }

    if let Some(comment) = change.comment.as_ref() {
        complaint.authority_comments.push(AuthorityComment {
            by: authority_id.to_string(),
            comment: comment.clone(),
            created_at_ms: now_ms,
        });
    }

    complaint.touch(now_ms);
    Ok(())
}

pub fn apply_reopen(complaint: &mut Complaint, actor_id: &str, now_ms: i64) -> DomainResult<()> {
    if !complaint.is_author(actor_id) {
        return Err(DomainError::Forbidden(
            "only the author can reopen a complaint".into(),
        ));
    }
    if complaint.status != ComplaintStatus::Resolved {
        return Err(DomainError::InvalidState(
            "only resolved complaints can be reopened".into(),
        ));
    }
    complaint.status = ComplaintStatus::Reopened;
    complaint.resolved_at_ms = None;
    complaint.touch(now_ms);
    Ok(())
}
