use std::sync::Arc;

use civicdesk_domain::blob::InMemoryBlobStore;
use civicdesk_domain::complaint::{Complaint, ComplaintCreate, ComplaintFields, ComplaintStatus};
use civicdesk_domain::error::DomainError;
use civicdesk_domain::identity::ActorIdentity;
use civicdesk_domain::lifecycle::StatusUpdate;
use civicdesk_domain::query::AuthorityListQuery;
use civicdesk_domain::service::ComplaintService;
use civicdesk_infra::repositories::InMemoryComplaintRepository;

fn service() -> ComplaintService {
    ComplaintService::new(
        Arc::new(InMemoryComplaintRepository::new()),
        Arc::new(InMemoryBlobStore::new()),
    )
}

fn input(title: &str, department: &str, location: &str) -> ComplaintCreate {
    ComplaintCreate {
        fields: ComplaintFields {
            title: title.to_string(),
            description: format!("{title}, please send someone"),
            location_text: location.to_string(),
            department: department.to_string(),
        },
        photos: vec![],
    }
}

fn status(value: &str, comment: Option<&str>) -> StatusUpdate {
    StatusUpdate {
        status: Some(value.to_string()),
        comment: comment.map(str::to_string),
    }
}

fn assert_vote_invariant(complaint: &Complaint) {
    assert_eq!(complaint.upvotes, complaint.upvoters.len() as u64);
    assert!(complaint.upvoters.contains(&complaint.author_id));
}

#[tokio::test]
async fn water_complaint_walks_the_full_lifecycle() {
    let service = service();
    let citizen_a = ActorIdentity::citizen("citizen-a");
    let citizen_b = ActorIdentity::citizen("citizen-b");
    let officer = ActorIdentity::authority("officer-w", "Water");

    let filed = service
        .create(&citizen_a, input("No water supply", "Water", "Sector 12"))
        .await
        .expect("file");
    assert_eq!(filed.status, ComplaintStatus::Submitted);
    assert_eq!(filed.upvotes, 1);
    assert_eq!(
        filed.upvoters.iter().cloned().collect::<Vec<_>>(),
        vec!["citizen-a".to_string()]
    );
    let id = filed.complaint_id.clone();

    let voted = service.upvote(&citizen_b, &id).await.expect("upvote");
    assert_eq!(voted.upvotes, 2);
    assert_vote_invariant(&voted);

    let dispatched = service
        .update_status(&officer, &id, status("In Progress", Some("dispatched")))
        .await
        .expect("in progress");
    assert_eq!(dispatched.status, ComplaintStatus::InProgress);
    assert_eq!(dispatched.authority_comments.len(), 1);
    assert_eq!(dispatched.authority_comments[0].comment, "dispatched");
    assert_eq!(dispatched.resolved_at_ms, None);

    let resolved = service
        .update_status(&officer, &id, status("Resolved", None))
        .await
        .expect("resolve");
    assert_eq!(resolved.status, ComplaintStatus::Resolved);
    assert!(resolved.resolved_at_ms.is_some());
    assert_eq!(resolved.authority_comments.len(), 1);

    let reopened = service.reopen(&citizen_a, &id).await.expect("reopen");
    assert_eq!(reopened.status, ComplaintStatus::Reopened);
    assert_eq!(reopened.resolved_at_ms, None);

    let err = service
        .update_status(&officer, &id, status("Reopened", Some("again")))
        .await
        .expect_err("authority reopen");
    assert!(matches!(err, DomainError::Forbidden(_)));

    let stored = service.get(&citizen_b, &id).await.expect("detail");
    assert_eq!(stored.status, ComplaintStatus::Reopened);
    assert_eq!(stored.authority_comments.len(), 1);
    assert_vote_invariant(&stored);
}

#[tokio::test]
async fn authority_queue_ignores_closed_status_filter() {
    let service = service();
    let citizen = ActorIdentity::citizen("citizen-a");
    let officer = ActorIdentity::authority("officer-w", "Water");

    let open = service
        .create(&citizen, input("Low pressure", "Water", "Sector 3"))
        .await
        .expect("open");
    let general = service
        .create(&citizen, input("Fallen tree", "General", "Sector 4"))
        .await
        .expect("general");
    let fixed = service
        .create(&citizen, input("Leak", "Water", "Sector 5"))
        .await
        .expect("fixed");
    let refused = service
        .create(&citizen, input("Duplicate report", "Water", "Sector 5"))
        .await
        .expect("refused");
    service
        .create(&citizen, input("Pothole", "Roads", "Sector 3"))
        .await
        .expect("other department");

    service
        .update_status(&officer, &fixed.complaint_id, status("Resolved", None))
        .await
        .expect("resolve");
    service
        .update_status(&officer, &refused.complaint_id, status("Rejected", None))
        .await
        .expect("reject");

    let listing = service
        .list_for_authority(
            &officer,
            &AuthorityListQuery {
                status: Some("Resolved".to_string()),
                ..AuthorityListQuery::default()
            },
        )
        .await
        .expect("listing");

    let mut ids: Vec<_> = listing
        .complaints
        .iter()
        .map(|complaint| complaint.complaint_id.clone())
        .collect();
    ids.sort();
    let mut expected = vec![open.complaint_id, general.complaint_id];
    expected.sort();
    assert_eq!(ids, expected);
    assert_eq!(listing.total, 2);
    assert!(
        listing
            .complaints
            .iter()
            .all(|complaint| !complaint.status.is_closed())
    );
}

#[tokio::test]
async fn second_page_returns_the_remainder() {
    let service = service();
    let citizen = ActorIdentity::citizen("citizen-a");
    for index in 0..10 {
        service
            .create(
                &citizen,
                input(&format!("Streetlight {index}"), "Electricity", "Main Road"),
            )
            .await
            .expect("create");
    }

    let listing = service
        .list_for_authority(
            &ActorIdentity::authority("officer-e", "Electricity"),
            &AuthorityListQuery {
                area: Some("main".to_string()),
                page: Some(2),
                limit: Some(6),
                ..AuthorityListQuery::default()
            },
        )
        .await
        .expect("listing");
    assert_eq!(listing.total, 10);
    assert_eq!(listing.total_pages, 2);
    assert_eq!(listing.current_page, 2);
    assert_eq!(listing.complaints.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_upvotes_never_lose_a_voter() {
    let service = service();
    let complaint = service
        .create(
            &ActorIdentity::citizen("author"),
            input("Garbage pile", "Sanitation", "Market Street"),
        )
        .await
        .expect("create");

    let mut handles = Vec::new();
    for index in 0..16 {
        let service = service.clone();
        let complaint_id = complaint.complaint_id.clone();
        handles.push(tokio::spawn(async move {
            let voter = ActorIdentity::citizen(format!("neighbour-{index}"));
            service.upvote(&voter, &complaint_id).await.map(|_| voter.user_id)
        }));
    }

    let mut landed = Vec::new();
    for handle in handles {
        landed.push(handle.await.expect("join").expect("every upvote lands"));
    }

    let stored = service
        .get(&ActorIdentity::citizen("author"), &complaint.complaint_id)
        .await
        .expect("stored");
    assert_vote_invariant(&stored);
    assert_eq!(stored.upvotes, 17);
    assert_eq!(stored.version, 17);
    assert!(landed.iter().all(|voter| stored.upvoters.contains(voter)));
}

#[tokio::test]
async fn sequential_upvotes_from_many_citizens_all_land() {
    let service = service();
    let complaint = service
        .create(
            &ActorIdentity::citizen("author"),
            input("Broken swing", "Parks", "Lake Park"),
        )
        .await
        .expect("create");

    for index in 0..25 {
        let voter = ActorIdentity::citizen(format!("parent-{index}"));
        let updated = service
            .upvote(&voter, &complaint.complaint_id)
            .await
            .expect("upvote");
        assert_vote_invariant(&updated);
    }

    let err = service
        .upvote(&ActorIdentity::citizen("parent-3"), &complaint.complaint_id)
        .await
        .expect_err("repeat vote");
    assert!(matches!(err, DomainError::AlreadyVoted));

    let stored = service
        .get(&ActorIdentity::citizen("author"), &complaint.complaint_id)
        .await
        .expect("stored");
    assert_eq!(stored.upvotes, 26);
    assert_eq!(stored.version, 26);
}
