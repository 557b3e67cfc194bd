mod support;

use std::sync::Arc;

use chrono::Duration;

use grievance_core::domain::complaint::{ComplaintStatus, Priority};
use grievance_core::domain::notification::NotificationKind;
use grievance_core::domain::rule::{EscalationRole, RuleId};
use grievance_core::domain::timeline::Visibility;
use grievance_core::domain::user::{Role, UserId};
use grievance_core::escalation::RoundRobinSelector;
use grievance_core::lifecycle::AUTO_ESCALATION_REASON;
use grievance_workflow::SweepCancellation;

use support::{actor, admin, rule, user, Harness, FACILITIES, TECHNICAL};

#[tokio::test]
async fn most_specific_rule_governs_and_escalates_to_its_role() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![
            rule(1, None, Some(Priority::Urgent), 24, EscalationRole::SuperAdmin),
            rule(2, Some(TECHNICAL), Some(Priority::Urgent), 12, EscalationRole::Admin),
        ])
        .await;
    let complaint = harness.submit(TECHNICAL, Priority::Urgent, "student-u1").await;

    harness.clock.advance(Duration::hours(13));
    let overdue = harness.service.list_overdue().await.expect("overdue listing");
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].rule_id, RuleId(2));
    assert_eq!(overdue[0].hours_open, 13);
    assert_eq!(overdue[0].hours_overdue, 1);

    let summary =
        harness.service.auto_escalate(&SweepCancellation::new()).await.expect("sweep runs");
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.escalated_count, 1);
    assert_eq!(summary.skipped_count, 0);
    assert_eq!(summary.escalated, vec![complaint.id.clone()]);

    let stored = harness.service.complaint(&complaint.id, &admin()).await.expect("read back");
    assert_eq!(stored.status, ComplaintStatus::Escalated);
    assert_eq!(stored.escalated_to, Some(UserId("admin-a1".to_owned())));
    assert_eq!(stored.escalation_reason.as_deref(), Some(AUTO_ESCALATION_REASON));

    let timeline = harness.service.timeline(&complaint.id, &admin()).await.expect("timeline");
    let entry = timeline.last().expect("escalation entry");
    assert_eq!(entry.status, ComplaintStatus::Escalated);
    assert_eq!(entry.author, None);
    assert_eq!(entry.visibility, Visibility::Public);

    let target_inbox =
        harness.service.notifications(&actor("admin-a1", Role::Admin)).await.expect("inbox");
    assert_eq!(target_inbox.len(), 1);
    assert_eq!(target_inbox[0].kind, NotificationKind::Escalation);
}

#[tokio::test]
async fn complaints_inside_their_deadline_are_left_alone() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![rule(1, None, None, 48, EscalationRole::Admin)])
        .await;
    let complaint = harness.submit(FACILITIES, Priority::Low, "student-u1").await;

    harness.clock.advance(Duration::hours(48));
    let summary =
        harness.service.auto_escalate(&SweepCancellation::new()).await.expect("sweep runs");
    assert_eq!((summary.scanned, summary.escalated_count, summary.skipped_count), (1, 0, 0));

    let stored = harness.service.complaint(&complaint.id, &admin()).await.expect("read back");
    assert_eq!(stored.status, ComplaintStatus::New);
    assert!(harness.service.list_overdue().await.expect("overdue").is_empty());
}

#[tokio::test]
async fn unmatched_complaints_are_neither_overdue_nor_skipped() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![rule(1, Some(FACILITIES), None, 1, EscalationRole::Admin)])
        .await;
    for priority in [Priority::Low, Priority::High, Priority::Urgent] {
        harness.submit(TECHNICAL, priority, "student-u1").await;
    }

    harness.clock.advance(Duration::hours(500));
    let summary =
        harness.service.auto_escalate(&SweepCancellation::new()).await.expect("sweep runs");
    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.escalated_count, 0);
    assert_eq!(summary.skipped_count, 0);
    assert!(harness.service.list_overdue().await.expect("overdue").is_empty());
}

#[tokio::test]
async fn repeated_sweeps_escalate_each_complaint_once() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![rule(1, None, None, 24, EscalationRole::SuperAdmin)])
        .await;
    let complaint = harness.submit(TECHNICAL, Priority::Medium, "student-u1").await;
    harness.clock.advance(Duration::hours(30));

    let first = harness.service.auto_escalate(&SweepCancellation::new()).await.expect("first");
    let second = harness.service.auto_escalate(&SweepCancellation::new()).await.expect("second");

    assert_eq!(first.escalated_count, 1);
    assert_eq!(second.scanned, 0);
    assert_eq!(second.escalated_count, 0);

    let timeline = harness.service.timeline(&complaint.id, &admin()).await.expect("timeline");
    let escalations =
        timeline.iter().filter(|entry| entry.status == ComplaintStatus::Escalated).count();
    assert_eq!(escalations, 1);
}

#[tokio::test]
async fn overlapping_sweep_with_stale_read_does_not_escalate_twice() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![rule(1, None, None, 24, EscalationRole::Admin)])
        .await;
    let complaint = harness.submit(TECHNICAL, Priority::Medium, "student-u1").await;
    harness.clock.advance(Duration::hours(30));

    let stale = vec![harness.service.complaint(&complaint.id, &admin()).await.expect("snapshot")];
    let first = harness.service.auto_escalate(&SweepCancellation::new()).await.expect("first");
    assert_eq!(first.escalated_count, 1);

    harness.store.serve_stale_candidates(stale);
    let second = harness.service.auto_escalate(&SweepCancellation::new()).await.expect("second");
    assert_eq!(second.scanned, 1);
    assert_eq!(second.escalated_count, 0);

    let timeline = harness.service.timeline(&complaint.id, &admin()).await.expect("timeline");
    assert_eq!(timeline.len(), 2);
    let inbox =
        harness.service.notifications(&actor("admin-a1", Role::Admin)).await.expect("inbox");
    assert_eq!(inbox.len(), 1);
}

#[tokio::test]
async fn one_failing_complaint_does_not_stop_the_batch() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![rule(1, None, None, 24, EscalationRole::Admin)])
        .await;
    let broken = harness.submit(TECHNICAL, Priority::Medium, "student-u1").await;
    let healthy = harness.submit(FACILITIES, Priority::Medium, "student-u2").await;
    harness.store.fail_commits_for(&broken.id);
    harness.clock.advance(Duration::hours(25));

    let summary =
        harness.service.auto_escalate(&SweepCancellation::new()).await.expect("sweep runs");
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.escalated_count, 1);
    assert_eq!(summary.skipped_count, 1);
    assert_eq!(summary.escalated, vec![healthy.id.clone()]);

    let untouched = harness.service.complaint(&broken.id, &admin()).await.expect("read back");
    assert_eq!(untouched.status, ComplaintStatus::New);
}

#[tokio::test]
async fn overdue_complaint_without_eligible_target_is_skipped_unmodified() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![rule(1, None, None, 24, EscalationRole::SuperAdmin)])
        .await;
    harness.directory.upsert_user(user("dean-s1", Role::SuperAdmin, false)).await;
    let complaint = harness.submit(TECHNICAL, Priority::High, "student-u1").await;
    harness.clock.advance(Duration::hours(25));

    let summary =
        harness.service.auto_escalate(&SweepCancellation::new()).await.expect("sweep runs");
    assert_eq!((summary.scanned, summary.escalated_count, summary.skipped_count), (1, 0, 1));

    let stored = harness.service.complaint(&complaint.id, &admin()).await.expect("read back");
    assert_eq!(stored.status, ComplaintStatus::New);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn round_robin_spreads_escalations_across_admins() {
    let harness = Harness::with_selector(Arc::new(RoundRobinSelector::new())).await;
    harness
        .directory
        .replace_rules(vec![rule(1, None, None, 24, EscalationRole::Admin)])
        .await;
    let first = harness.submit(TECHNICAL, Priority::Medium, "student-u1").await;
    harness.clock.advance(Duration::minutes(1));
    let second = harness.submit(TECHNICAL, Priority::Medium, "student-u2").await;
    harness.clock.advance(Duration::hours(25));

    let summary =
        harness.service.auto_escalate(&SweepCancellation::new()).await.expect("sweep runs");
    assert_eq!(summary.escalated_count, 2);

    let first = harness.service.complaint(&first.id, &admin()).await.expect("first");
    let second = harness.service.complaint(&second.id, &admin()).await.expect("second");
    assert_eq!(first.escalated_to, Some(UserId("admin-a1".to_owned())));
    assert_eq!(second.escalated_to, Some(UserId("admin-a2".to_owned())));
}

#[tokio::test]
async fn cancelled_sweep_stops_before_the_next_complaint() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![rule(1, None, None, 24, EscalationRole::Admin)])
        .await;
    let complaint = harness.submit(TECHNICAL, Priority::Medium, "student-u1").await;
    harness.clock.advance(Duration::hours(25));

    let cancellation = SweepCancellation::new();
    cancellation.cancel();
    let summary = harness.service.auto_escalate(&cancellation).await.expect("sweep runs");
    assert!(summary.cancelled);
    assert_eq!(summary.scanned, 0);

    let stored = harness.service.complaint(&complaint.id, &admin()).await.expect("read back");
    assert_eq!(stored.status, ComplaintStatus::New);
}

#[tokio::test]
async fn equally_specific_rules_prefer_the_shorter_deadline() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![
            rule(7, Some(TECHNICAL), None, 72, EscalationRole::Admin),
            rule(8, None, Some(Priority::High), 36, EscalationRole::Admin),
        ])
        .await;
    harness.submit(TECHNICAL, Priority::High, "student-u1").await;
    harness.clock.advance(Duration::hours(40));

    let overdue = harness.service.list_overdue().await.expect("overdue listing");
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].rule_id, RuleId(8));
    assert_eq!(overdue[0].hours_overdue, 4);
}

#[tokio::test]
async fn sweep_skips_already_escalated_and_closed_complaints() {
    let harness = Harness::new().await;
    harness
        .directory
        .replace_rules(vec![rule(1, None, None, 1, EscalationRole::Admin)])
        .await;
    let escalated = harness.submit(TECHNICAL, Priority::Medium, "student-u1").await;
    let resolved = harness.submit(TECHNICAL, Priority::Medium, "student-u1").await;
    harness
        .service
        .escalate(&escalated.id, &UserId("dean-s1".to_owned()), "senior review", &admin())
        .await
        .expect("manual escalation");
    harness
        .service
        .transition(
            &resolved.id,
            grievance_core::lifecycle::TransitionRequest::new(ComplaintStatus::Resolved),
            &admin(),
        )
        .await
        .expect("resolve");
    harness.clock.advance(Duration::hours(5));

    let summary =
        harness.service.auto_escalate(&SweepCancellation::new()).await.expect("sweep runs");
    assert_eq!(summary.scanned, 0);
    assert_eq!(summary.escalated_count, 0);
}
