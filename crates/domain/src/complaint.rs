use std::collections::BTreeSet;
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;

pub const GENERAL_DEPARTMENT: &str = "General";
pub const MAX_PHOTOS: usize = 3;

const MAX_TITLE_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 5_000;
const MAX_LOCATION_LENGTH: usize = 200;
const MAX_DEPARTMENT_LENGTH: usize = 100;
pub(crate) const MAX_COMMENT_LENGTH: usize = 2_000;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    #[serde(alias = "Submitted")]
    Submitted,
    #[serde(alias = "In Progress", alias = "InProgress")]
    InProgress,
    #[serde(alias = "On Hold", alias = "OnHold")]
    OnHold,
    #[serde(alias = "Resolved")]
    Resolved,
    #[serde(alias = "Reopened")]
    Reopened,
    #[serde(alias = "Rejected")]
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintStatusParseError {
    Unknown,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 6] = [
        Self::Submitted,
        Self::InProgress,
        Self::OnHold,
        Self::Resolved,
        Self::Reopened,
        Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::InProgress => "in_progress",
            Self::OnHold => "on_hold",
            Self::Resolved => "resolved",
            Self::Reopened => "reopened",
            Self::Rejected => "rejected",
        }
    }

    /// Statuses that drop a complaint out of the authority work queue.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = ComplaintStatusParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "submitted" => Ok(Self::Submitted),
            "inprogress" => Ok(Self::InProgress),
            "onhold" => Ok(Self::OnHold),
            "resolved" => Ok(Self::Resolved),
            "reopened" => Ok(Self::Reopened),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ComplaintStatusParseError::Unknown),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorityComment {
    pub by: String,
    pub comment: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Complaint {
    pub complaint_id: String,
    pub title: String,
    pub description: String,
    pub location_text: String,
    pub department: String,
    pub photos: Vec<String>,
    pub status: ComplaintStatus,
    pub author_id: String,
    pub upvotes: u64,
    pub upvoters: BTreeSet<String>,
    pub authority_comments: Vec<AuthorityComment>,
    pub resolved_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub version: u64,
}

impl Complaint {
    /// Fresh submission: the author counts as the first upvoter.
    pub fn submitted(
        complaint_id: String,
        author_id: String,
        fields: ComplaintFields,
        photos: Vec<String>,
        now_ms: i64,
    ) -> Self {
        let mut upvoters = BTreeSet::new();
        upvoters.insert(author_id.clone());
        Self {
            complaint_id,
            title: fields.title,
            description: fields.description,
            location_text: fields.location_text,
            department: fields.department,
            photos,
            status: ComplaintStatus::Submitted,
            author_id,
            upvotes: 1,
            upvoters,
            authority_comments: Vec::new(),
            resolved_at_ms: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            version: 1,
        }
    }

    pub fn is_author(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at_ms = now_ms;
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.upvotes != self.upvoters.len() as u64 {
            return Err(DomainError::InvalidState(format!(
                "upvote count {} does not match {} upvoters",
                self.upvotes,
                self.upvoters.len()
            )));
        }
        if !self.upvoters.contains(&self.author_id) {
            return Err(DomainError::InvalidState(
                "author is missing from upvoters".into(),
            ));
        }
        if self.resolved_at_ms.is_some() != (self.status == ComplaintStatus::Resolved) {
            return Err(DomainError::InvalidState(
                "resolved_at must be set exactly when resolved".into(),
            ));
        }
        if self.photos.len() > MAX_PHOTOS {
            return Err(DomainError::InvalidState(format!(
                "complaint holds more than {MAX_PHOTOS} photos"
            )));
        }
        Ok(())
    }
}

/// Free-text attributes supplied by the citizen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplaintFields {
    pub title: String,
    pub description: String,
    pub location_text: String,
    pub department: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct ComplaintCreate {
    pub fields: ComplaintFields,
    pub photos: Vec<PhotoUpload>,
}

pub(crate) fn validate_complaint_create(input: &ComplaintCreate) -> DomainResult<ComplaintFields> {
    let title = required_field("title", &input.fields.title, MAX_TITLE_LENGTH)?;
    let description = required_field(
        "description",
        &input.fields.description,
        MAX_DESCRIPTION_LENGTH,
    )?;
    let location_text = required_field(
        "location_text",
        &input.fields.location_text,
        MAX_LOCATION_LENGTH,
    )?;
    let department = required_field(
        "department",
        &input.fields.department,
        MAX_DEPARTMENT_LENGTH,
    )?;

    if input.photos.len() > MAX_PHOTOS {
        return Err(DomainError::Validation(format!(
            "at most {MAX_PHOTOS} photos may be attached"
        )));
    }
    if input.photos.iter().any(|photo| photo.bytes.is_empty()) {
        return Err(DomainError::Validation("photo upload is empty".into()));
    }

    Ok(ComplaintFields {
        title,
        description,
        location_text,
        department,
    })
}

fn required_field(name: &str, value: &str, max_len: usize) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::Validation(format!("{name} is required")));
    }
    if value.chars().count() > max_len {
        return Err(DomainError::Validation(format!(
            "{name} exceeds max length of {max_len}"
        )));
    }
    Ok(value.to_string())
}
