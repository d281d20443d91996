use crate::DomainResult;
use crate::auth::Role;
use crate::complaint::{Complaint, GENERAL_DEPARTMENT};
use crate::error::DomainError;
use crate::identity::ActorIdentity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComplaintAction {
    File,
    ListOwn,
    Browse,
    View,
    Upvote,
    ListQueue,
    UpdateStatus,
    Reopen,
}

impl ComplaintAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::ListOwn => "list_own",
            Self::Browse => "browse",
            Self::View => "view",
            Self::Upvote => "upvote",
            Self::ListQueue => "list_queue",
            Self::UpdateStatus => "update_status",
            Self::Reopen => "reopen",
        }
    }

    fn required_role(&self) -> Option<Role> {
        match self {
            Self::File | Self::ListOwn | Self::Reopen => Some(Role::Citizen),
            Self::ListQueue | Self::UpdateStatus => Some(Role::Authority),
            Self::Browse | Self::View | Self::Upvote => None,
        }
    }
}

/// Whether `department` belongs to the work queue of an authority in `actor_department`.
pub fn serves_department(actor_department: &str, department: &str) -> bool {
    department == actor_department || department == GENERAL_DEPARTMENT
}

/// Capability check run before every complaint operation.
///
/// `complaint` is the record the action targets, when there is one. With
/// `None` only the role is checked. Checks that depend on the record's status
/// belong to the lifecycle and ledger.
pub fn authorize(
    actor: &ActorIdentity,
    action: ComplaintAction,
    complaint: Option<&Complaint>,
) -> DomainResult<()> {
    if let Some(required) = action.required_role() {
        if actor.role != required {
            return Err(DomainError::Forbidden(format!(
                "{} role required to {}",
                required.as_str(),
                action.as_str().replace('_', " ")
            )));
        }
    }

    match (action, complaint) {
        (ComplaintAction::ListQueue, _) => {
            authority_department(actor)?;
        }
        (ComplaintAction::View | ComplaintAction::UpdateStatus, Some(complaint))
            if actor.role.is_authority() =>
        {
            let department = authority_department(actor)?;
            if !serves_department(department, &complaint.department) {
                return Err(DomainError::Forbidden(
                    "complaint belongs to another department".into(),
                ));
            }
        }
        (ComplaintAction::Reopen, Some(complaint)) => {
            if !complaint.is_author(&actor.user_id) {
                return Err(DomainError::Forbidden(
                    "only the author can reopen a complaint".into(),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn authority_department(actor: &ActorIdentity) -> DomainResult<&str> {
    actor
        .department
        .as_deref()
        .map(str::trim)
        .filter(|department| !department.is_empty())
        .ok_or_else(|| DomainError::Forbidden("authority has no department".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaint::ComplaintFields;

    fn complaint(department: &str) -> Complaint {
        Complaint::submitted(
            "c-1".to_string(),
            "citizen-a".to_string(),
            ComplaintFields {
                title: "Leak".to_string(),
                description: "Leaking main".to_string(),
                location_text: "Sector 1".to_string(),
                department: department.to_string(),
            },
            vec![],
            1_000,
        )
    }

    #[test]
    fn citizen_only_actions_refuse_authorities() {
        let officer = ActorIdentity::authority("officer", "Water");
        for action in [
            ComplaintAction::File,
            ComplaintAction::ListOwn,
            ComplaintAction::Reopen,
        ] {
            assert!(matches!(
                authorize(&officer, action, None),
                Err(DomainError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn authority_only_actions_refuse_citizens() {
        let citizen = ActorIdentity::citizen("citizen-a");
        let target = complaint("Water");
        assert!(authorize(&citizen, ComplaintAction::ListQueue, None).is_err());
        assert!(authorize(&citizen, ComplaintAction::UpdateStatus, Some(&target)).is_err());
    }

    #[test]
    fn anyone_authenticated_may_browse_and_upvote() {
        let target = complaint("Water");
        for actor in [
            ActorIdentity::citizen("citizen-b"),
            ActorIdentity::authority("officer", "Roads"),
        ] {
            assert!(authorize(&actor, ComplaintAction::Browse, None).is_ok());
            assert!(authorize(&actor, ComplaintAction::Upvote, Some(&target)).is_ok());
        }
    }

    #[test]
    fn authorities_only_view_complaints_they_serve() {
        let citizen = ActorIdentity::citizen("citizen-b");
        let officer = ActorIdentity::authority("officer", "Roads");
        assert!(authorize(&citizen, ComplaintAction::View, Some(&complaint("Water"))).is_ok());
        assert!(authorize(&officer, ComplaintAction::View, Some(&complaint("Roads"))).is_ok());
        assert!(authorize(&officer, ComplaintAction::View, Some(&complaint("General"))).is_ok());
        assert!(authorize(&officer, ComplaintAction::View, Some(&complaint("Water"))).is_err());
    }

    #[test]
    fn status_updates_stay_inside_department_or_general() {
        let officer = ActorIdentity::authority("officer", "Water");
        let own = complaint("Water");
        let general = complaint("General");
        assert!(authorize(&officer, ComplaintAction::UpdateStatus, Some(&own)).is_ok());
        assert!(authorize(&officer, ComplaintAction::UpdateStatus, Some(&general)).is_ok());
        assert!(matches!(
            authorize(&officer, ComplaintAction::UpdateStatus, Some(&complaint("Roads"))),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn authority_without_department_cannot_list_queue() {
        let mut officer = ActorIdentity::authority("officer", "Water");
        officer.department = Some("  ".to_string());
        assert!(authorize(&officer, ComplaintAction::ListQueue, None).is_err());
    }

    #[test]
    fn reopen_requires_authorship() {
        let target = complaint("Water");
        assert!(
            authorize(
                &ActorIdentity::citizen("citizen-a"),
                ComplaintAction::Reopen,
                Some(&target)
            )
            .is_ok()
        );
        assert!(matches!(
            authorize(
                &ActorIdentity::citizen("citizen-b"),
                ComplaintAction::Reopen,
                Some(&target)
            ),
            Err(DomainError::Forbidden(_))
        ));
    }
}
