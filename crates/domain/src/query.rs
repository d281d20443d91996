use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::complaint::{Complaint, ComplaintStatus, GENERAL_DEPARTMENT};

pub const DEFAULT_PAGE_LIMIT: u64 = 10;
pub const MAX_PAGE_LIMIT: u64 = 100;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintSort {
    Upvotes,
    #[default]
    Newest,
}

impl ComplaintSort {
    /// `"upvotes"` selects vote order; anything else, including `"date"`, is newest first.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("upvotes") => Self::Upvotes,
            _ => Self::Newest,
        }
    }

    pub fn compare(&self, left: &Complaint, right: &Complaint) -> Ordering {
        let primary = match self {
            Self::Upvotes => right.upvotes.cmp(&left.upvotes),
            Self::Newest => right.created_at_ms.cmp(&left.created_at_ms),
        };
        primary.then_with(|| right.complaint_id.cmp(&left.complaint_id))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComplaintFilter {
    pub author_id: Option<String>,
    pub departments: Option<Vec<String>>,
    pub status: Option<ComplaintStatus>,
    pub exclude_statuses: Vec<ComplaintStatus>,
    /// Lowercased substring matched against `location_text`.
    pub area: Option<String>,
}

impl ComplaintFilter {
    pub fn matches(&self, complaint: &Complaint) -> bool {
        if let Some(author_id) = self.author_id.as_ref() {
            if &complaint.author_id != author_id {
                return false;
            }
        }
        if let Some(departments) = self.departments.as_ref() {
            if !departments.iter().any(|dept| dept == &complaint.department) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if complaint.status != status {
                return false;
            }
        }
        if self.exclude_statuses.contains(&complaint.status) {
            return false;
        }
        if let Some(area) = self.area.as_ref() {
            if !complaint.location_text.to_lowercase().contains(area) {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplaintQuery {
    pub filter: ComplaintFilter,
    pub sort: ComplaintSort,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl ComplaintQuery {
    pub fn all(filter: ComplaintFilter, sort: ComplaintSort) -> Self {
        Self {
            filter,
            sort,
            skip: 0,
            limit: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComplaintPage {
    pub items: Vec<Complaint>,
    pub total: u64,
}

/// Evaluates `query` over an in-memory snapshot.
pub fn run_query<'a, I>(complaints: I, query: &ComplaintQuery) -> ComplaintPage
where
    I: IntoIterator<Item = &'a Complaint>,
{
    let mut matched: Vec<Complaint> = complaints
        .into_iter()
        .filter(|complaint| query.filter.matches(complaint))
        .cloned()
        .collect();
    matched.sort_by(|left, right| query.sort.compare(left, right));
    let total = matched.len() as u64;
    let items = matched
        .into_iter()
        .skip(usize::try_from(query.skip).unwrap_or(usize::MAX))
        .take(
            query
                .limit
                .and_then(|limit| usize::try_from(limit).ok())
                .unwrap_or(usize::MAX),
        )
        .collect();
    ComplaintPage { items, total }
}

pub fn citizen_query(author_id: &str) -> ComplaintQuery {
    ComplaintQuery::all(
        ComplaintFilter {
            author_id: Some(author_id.to_string()),
            ..ComplaintFilter::default()
        },
        ComplaintSort::Upvotes,
    )
}

pub fn public_query(department: Option<&str>) -> ComplaintQuery {
    let departments = department
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| vec![value.to_string()]);
    ComplaintQuery::all(
        ComplaintFilter {
            departments,
            ..ComplaintFilter::default()
        },
        ComplaintSort::Upvotes,
    )
}

#[derive(Clone, Debug, Default)]
pub struct AuthorityListQuery {
    pub status: Option<String>,
    pub area: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn normalize(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityListing {
    pub complaints: Vec<Complaint>,
    pub total_pages: u64,
    pub current_page: u64,
    pub total: u64,
}

impl AuthorityListing {
    pub fn empty(page: PageRequest) -> Self {
        Self {
            complaints: Vec::new(),
            total_pages: 0,
            current_page: page.page,
            total: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorityScope {
    Query(ComplaintQuery),
    /// The requested status names no known status, so nothing can match.
    Unmatched,
}

/// Builds the work-queue query for an authority in `department`.
///
/// Resolved and rejected complaints are always hidden; asking for them by
/// status is ignored rather than refused.
pub fn authority_scope(
    department: &str,
    request: &AuthorityListQuery,
    page: PageRequest,
) -> AuthorityScope {
    let status = match request
        .status
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(raw) => match raw.parse::<ComplaintStatus>() {
            Ok(status) if status.is_closed() => None,
            Ok(status) => Some(status),
            Err(_) => return AuthorityScope::Unmatched,
        },
        None => None,
    };

    let area = request
        .area
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase);

    let mut departments = vec![department.to_string()];
    if department != GENERAL_DEPARTMENT {
        departments.push(GENERAL_DEPARTMENT.to_string());
    }

    AuthorityScope::Query(ComplaintQuery {
        filter: ComplaintFilter {
            author_id: None,
            departments: Some(departments),
            status,
            exclude_statuses: vec![ComplaintStatus::Resolved, ComplaintStatus::Rejected],
            area,
        },
        sort: ComplaintSort::parse(request.sort.as_deref()),
        skip: page.skip(),
        limit: Some(page.limit),
    })
}
