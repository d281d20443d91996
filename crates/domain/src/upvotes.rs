use crate::DomainResult;
use crate::complaint::{Complaint, ComplaintStatus};
use crate::error::DomainError;

/// Registers `voter_id` as an upvoter, keeping the count equal to the set size.
pub fn apply_upvote(complaint: &mut Complaint, voter_id: &str, now_ms: i64) -> DomainResult<()> {
    if complaint.status == ComplaintStatus::Resolved {
        return Err(DomainError::InvalidState(
            "cannot upvote resolved complaints".into(),
        ));
    }
    if complaint.is_author(voter_id) {
        return Err(DomainError::Forbidden(
            "you cannot upvote your own complaint".into(),
        ));
    }
    if !complaint.upvoters.insert(voter_id.to_string()) {
        return Err(DomainError::AlreadyVoted);
    }
    complaint.upvotes = complaint.upvoters.len() as u64;
    complaint.touch(now_ms);
    Ok(())
}

/// Next stored revision of `current` once `voter_id`'s vote is counted.
///
/// Stores that apply votes under their own lock persist the returned record
/// as is; the rest use it to explain why a conditional write matched nothing.
pub fn upvoted_revision(
    current: &Complaint,
    voter_id: &str,
    now_ms: i64,
) -> DomainResult<Complaint> {
    let mut next = current.clone();
    apply_upvote(&mut next, voter_id, now_ms)?;
    next.version = current.version + 1;
    next.check_invariants()?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaint::ComplaintFields;

    fn complaint() -> Complaint {
        Complaint::submitted(
            "c-1".to_string(),
            "author".to_string(),
            ComplaintFields {
                title: "Pothole".to_string(),
                description: "Deep pothole".to_string(),
                location_text: "Sector 5".to_string(),
                department: "Roads".to_string(),
            },
            vec![],
            1_000,
        )
    }

    #[test]
    fn upvote_adds_voter_and_bumps_count() {
        let mut complaint = complaint();
        apply_upvote(&mut complaint, "neighbour", 2_000).expect("upvote");
        assert_eq!(complaint.upvotes, 2);
        assert!(complaint.upvoters.contains("neighbour"));
        assert_eq!(complaint.updated_at_ms, 2_000);
        assert!(complaint.check_invariants().is_ok());
    }

    #[test]
    fn revision_bumps_version_and_leaves_current_untouched() {
        let current = complaint();
        let next = upvoted_revision(&current, "neighbour", 3_000).expect("revision");
        assert_eq!(next.version, current.version + 1);
        assert_eq!(next.upvotes, 2);
        assert_eq!(current.upvotes, 1);
        assert!(matches!(
            upvoted_revision(&next, "neighbour", 4_000),
            Err(DomainError::AlreadyVoted)
        ));
    }

    #[test]
    fn author_cannot_upvote() {
        let mut complaint = complaint();
        let err = apply_upvote(&mut complaint, "author", 2_000).expect_err("self vote");
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_eq!(complaint.upvotes, 1);
    }

    #[test]
    fn second_vote_is_rejected() {
        let mut complaint = complaint();
        apply_upvote(&mut complaint, "neighbour", 2_000).expect("first");
        let err = apply_upvote(&mut complaint, "neighbour", 3_000).expect_err("second");
        assert!(matches!(err, DomainError::AlreadyVoted));
        assert_eq!(complaint.upvotes, 2);
        assert_eq!(complaint.updated_at_ms, 2_000);
    }

    #[test]
    fn resolved_complaints_take_no_votes() {
        let mut complaint = complaint();
        complaint.status = ComplaintStatus::Resolved;
        complaint.resolved_at_ms = Some(1_500);
        let err = apply_upvote(&mut complaint, "neighbour", 2_000).expect_err("resolved");
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn rejected_and_reopened_complaints_still_take_votes() {
        for status in [ComplaintStatus::Rejected, ComplaintStatus::Reopened] {
            let mut complaint = complaint();
            complaint.status = status;
            apply_upvote(&mut complaint, "neighbour", 2_000).expect("upvote");
            assert_eq!(complaint.upvotes, 2);
        }
    }
}
