use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use grievance_core::domain::category::CategoryId;
use grievance_core::domain::change::ComplaintChange;
use grievance_core::domain::complaint::{
    AnonymousContact, AttachmentRef, Complaint, ComplaintId, ComplaintStatus, Priority, Submitter,
};
use grievance_core::domain::notification::{
    Notification, NotificationDraft, NotificationId, NotificationKind,
};
use grievance_core::domain::timeline::{TimelineDraft, TimelineEntry, TimelineEntryId, Visibility};
use grievance_core::domain::user::UserId;

use super::codec::{
    encode_timestamp, parse_optional_timestamp, parse_timestamp, parse_u32, parse_u64,
    parse_vocabulary,
};
use super::{CommittedChange, ComplaintStore, RepositoryError};
use crate::DbPool;

const COMPLAINT_COLUMNS: &str = "row_id,
    complaint_id,
    category_id,
    subject,
    description,
    priority,
    status,
    submitter_user_id,
    is_anonymous,
    contact_name,
    contact_email,
    contact_phone,
    assigned_to,
    escalated_to,
    escalation_reason,
    resolution_details,
    version,
    created_at,
    updated_at,
    resolved_at";

pub struct SqlComplaintStore {
    pool: DbPool,
}

impl SqlComplaintStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_attachments(&self, row_id: i64) -> Result<Vec<AttachmentRef>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT file_name, content_type, size_bytes
             FROM complaint_attachment
             WHERE complaint_row_id = ?
             ORDER BY position ASC",
        )
        .bind(row_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(AttachmentRef {
                    file_name: row.try_get("file_name")?,
                    content_type: row.try_get("content_type")?,
                    size_bytes: parse_u64("size_bytes", row.try_get("size_bytes")?)?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ComplaintStore for SqlComplaintStore {
    async fn find_by_id(&self, id: &ComplaintId) -> Result<Option<Complaint>, RepositoryError> {
        let sql = format!("SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE complaint_id = ?");
        let Some(row) = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };

        let row_id = row.try_get::<i64, _>("row_id")?;
        let attachments = self.load_attachments(row_id).await?;
        complaint_from_row(&row, attachments).map(Some)
    }

    async fn list_sweep_candidates(&self) -> Result<Vec<Complaint>, RepositoryError> {
        let sql = format!(
            "SELECT {COMPLAINT_COLUMNS}
             FROM complaint
             WHERE status NOT IN ('resolved', 'rejected', 'escalated')
             ORDER BY created_at ASC, row_id ASC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut complaints = Vec::with_capacity(rows.len());
        for row in rows {
            let attachments = self.load_attachments(row.try_get("row_id")?).await?;
            complaints.push(complaint_from_row(&row, attachments)?);
        }
        Ok(complaints)
    }

    async fn insert_submission(
        &self,
        mut complaint: Complaint,
        first_entry: TimelineDraft,
    ) -> Result<(Complaint, TimelineEntry), RepositoryError> {
        let (submitter_user_id, contact) = match &complaint.submitter {
            Submitter::Registered { user_id } => (Some(user_id.0.as_str()), None),
            Submitter::Anonymous { contact } => (None, contact.as_ref()),
        };

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO complaint (
                complaint_id,
                category_id,
                subject,
                description,
                priority,
                status,
                submitter_user_id,
                is_anonymous,
                contact_name,
                contact_email,
                contact_phone,
                assigned_to,
                escalated_to,
                escalation_reason,
                resolution_details,
                version,
                created_at,
                updated_at,
                resolved_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&complaint.id.0)
        .bind(complaint.category_id.0)
        .bind(&complaint.subject)
        .bind(&complaint.description)
        .bind(complaint.priority.as_str())
        .bind(complaint.status.as_str())
        .bind(submitter_user_id)
        .bind(complaint.submitter.is_anonymous())
        .bind(contact.and_then(|contact| contact.name.as_deref()))
        .bind(contact.and_then(|contact| contact.email.as_deref()))
        .bind(contact.and_then(|contact| contact.phone.as_deref()))
        .bind(complaint.assigned_to.as_ref().map(|user| user.0.as_str()))
        .bind(complaint.escalated_to.as_ref().map(|user| user.0.as_str()))
        .bind(complaint.escalation_reason.as_deref())
        .bind(complaint.resolution_details.as_deref())
        .bind(i64::from(complaint.version))
        .bind(encode_timestamp(complaint.created_at))
        .bind(encode_timestamp(complaint.updated_at))
        .bind(complaint.resolved_at.map(encode_timestamp))
        .execute(&mut *tx)
        .await?;
        let row_id = inserted.last_insert_rowid();

        for (position, attachment) in complaint.attachments.iter().enumerate() {
            let size_bytes = i64::try_from(attachment.size_bytes).map_err(|_| {
                RepositoryError::Decode(format!(
                    "attachment `{}` is too large to store",
                    attachment.file_name
                ))
            })?;
            sqlx::query(
                "INSERT INTO complaint_attachment
                    (complaint_row_id, position, file_name, content_type, size_bytes)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(row_id)
            .bind(position as i64)
            .bind(&attachment.file_name)
            .bind(&attachment.content_type)
            .bind(size_bytes)
            .execute(&mut *tx)
            .await?;
        }

        let entry_id = insert_timeline_entry(&mut tx, row_id, &first_entry).await?;
        tx.commit().await?;

        complaint.row_id = row_id;
        let entry = TimelineEntry::from_draft(entry_id, complaint.id.clone(), first_entry);
        Ok((complaint, entry))
    }

    async fn commit_change(
        &self,
        change: ComplaintChange,
    ) -> Result<CommittedChange, RepositoryError> {
        let ComplaintChange { mut complaint, expected_version, expected_status, timeline, notifications } =
            change;

        let mut tx = self.pool.begin().await?;

        let row_id = sqlx::query_scalar::<_, i64>(
            "UPDATE complaint SET
                status = ?,
                assigned_to = ?,
                escalated_to = ?,
                escalation_reason = ?,
                resolution_details = ?,
                version = ?,
                updated_at = ?,
                resolved_at = ?
             WHERE complaint_id = ? AND version = ? AND status = ?
             RETURNING row_id",
        )
        .bind(complaint.status.as_str())
        .bind(complaint.assigned_to.as_ref().map(|user| user.0.as_str()))
        .bind(complaint.escalated_to.as_ref().map(|user| user.0.as_str()))
        .bind(complaint.escalation_reason.as_deref())
        .bind(complaint.resolution_details.as_deref())
        .bind(i64::from(complaint.version))
        .bind(encode_timestamp(complaint.updated_at))
        .bind(complaint.resolved_at.map(encode_timestamp))
        .bind(&complaint.id.0)
        .bind(i64::from(expected_version))
        .bind(expected_status.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row_id) = row_id else {
            return Err(RepositoryError::Conflict(complaint.id));
        };

        let entry_id = insert_timeline_entry(&mut tx, row_id, &timeline).await?;

        let mut created = Vec::with_capacity(notifications.len());
        for draft in notifications {
            let id = insert_notification(&mut tx, row_id, &draft).await?;
            created.push(Notification::from_draft(id, complaint.id.clone(), draft));
        }

        tx.commit().await?;

        complaint.row_id = row_id;
        let timeline_entry = TimelineEntry::from_draft(entry_id, complaint.id.clone(), timeline);
        Ok(CommittedChange { complaint, timeline_entry, notifications: created })
    }

    async fn list_timeline(
        &self,
        complaint_id: &ComplaintId,
    ) -> Result<Vec<TimelineEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT t.id, c.complaint_id, t.status, t.comment, t.author_id, t.visibility, t.created_at
             FROM timeline_entry t
             JOIN complaint c ON c.row_id = t.complaint_row_id
             WHERE c.complaint_id = ?
             ORDER BY t.created_at ASC, t.id ASC",
        )
        .bind(&complaint_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(timeline_from_row).collect()
    }

    async fn list_notifications_for(
        &self,
        recipient: &UserId,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT n.id, c.complaint_id, n.recipient_id, n.kind, n.message, n.is_read, n.created_at
             FROM notification n
             JOIN complaint c ON c.row_id = n.complaint_row_id
             WHERE n.recipient_id = ?
             ORDER BY n.created_at DESC, n.id DESC",
        )
        .bind(&recipient.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        let row = sqlx::query(
            "SELECT n.id, c.complaint_id, n.recipient_id, n.kind, n.message, n.is_read, n.created_at
             FROM notification n
             JOIN complaint c ON c.row_id = n.complaint_row_id
             WHERE n.id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(notification_from_row).transpose()
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<bool, RepositoryError> {
        let updated = sqlx::query("UPDATE notification SET is_read = 1 WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(updated.rows_affected() > 0)
    }
}

async fn insert_timeline_entry(
    conn: &mut SqliteConnection,
    row_id: i64,
    draft: &TimelineDraft,
) -> Result<TimelineEntryId, RepositoryError> {
    let inserted = sqlx::query(
        "INSERT INTO timeline_entry (complaint_row_id, status, comment, author_id, visibility, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(row_id)
    .bind(draft.status.as_str())
    .bind(draft.comment.as_deref())
    .bind(draft.author.as_ref().map(|author| author.0.as_str()))
    .bind(draft.visibility.as_str())
    .bind(encode_timestamp(draft.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(TimelineEntryId(inserted.last_insert_rowid()))
}

async fn insert_notification(
    conn: &mut SqliteConnection,
    row_id: i64,
    draft: &NotificationDraft,
) -> Result<NotificationId, RepositoryError> {
    let inserted = sqlx::query(
        "INSERT INTO notification (complaint_row_id, recipient_id, kind, message, is_read, created_at)
         VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(row_id)
    .bind(draft.recipient.as_ref().map(|recipient| recipient.0.as_str()))
    .bind(draft.kind.as_str())
    .bind(&draft.message)
    .bind(encode_timestamp(draft.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(NotificationId(inserted.last_insert_rowid()))
}

fn complaint_from_row(
    row: &SqliteRow,
    attachments: Vec<AttachmentRef>,
) -> Result<Complaint, RepositoryError> {
    let complaint_id = ComplaintId(row.try_get("complaint_id")?);
    let priority_raw = row.try_get::<String, _>("priority")?;
    let status_raw = row.try_get::<String, _>("status")?;

    let submitter = match (
        row.try_get::<bool, _>("is_anonymous")?,
        row.try_get::<Option<String>, _>("submitter_user_id")?,
    ) {
        (false, Some(user_id)) => Submitter::Registered { user_id: UserId(user_id) },
        (true, None) => {
            let contact = AnonymousContact {
                name: row.try_get("contact_name")?,
                email: row.try_get("contact_email")?,
                phone: row.try_get("contact_phone")?,
            };
            let has_contact =
                contact.name.is_some() || contact.email.is_some() || contact.phone.is_some();
            Submitter::Anonymous { contact: has_contact.then_some(contact) }
        }
        _ => {
            return Err(RepositoryError::Decode(format!(
                "complaint {complaint_id} has an inconsistent submitter"
            )))
        }
    };

    Ok(Complaint {
        row_id: row.try_get("row_id")?,
        category_id: CategoryId(row.try_get("category_id")?),
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        priority: parse_vocabulary("priority", &priority_raw, Priority::parse)?,
        status: parse_vocabulary("status", &status_raw, ComplaintStatus::parse)?,
        submitter,
        assigned_to: row.try_get::<Option<String>, _>("assigned_to")?.map(UserId),
        escalated_to: row.try_get::<Option<String>, _>("escalated_to")?.map(UserId),
        escalation_reason: row.try_get("escalation_reason")?,
        resolution_details: row.try_get("resolution_details")?,
        attachments,
        version: parse_u32("version", row.try_get("version")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
        resolved_at: parse_optional_timestamp("resolved_at", row.try_get("resolved_at")?)?,
        id: complaint_id,
    })
}

fn timeline_from_row(row: &SqliteRow) -> Result<TimelineEntry, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let visibility_raw = row.try_get::<String, _>("visibility")?;

    Ok(TimelineEntry {
        id: TimelineEntryId(row.try_get("id")?),
        complaint_id: ComplaintId(row.try_get("complaint_id")?),
        status: parse_vocabulary("status", &status_raw, ComplaintStatus::parse)?,
        comment: row.try_get("comment")?,
        author: row.try_get::<Option<String>, _>("author_id")?.map(UserId),
        visibility: parse_vocabulary("visibility", &visibility_raw, Visibility::parse)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let kind_raw = row.try_get::<String, _>("kind")?;

    Ok(Notification {
        id: NotificationId(row.try_get("id")?),
        complaint_id: ComplaintId(row.try_get("complaint_id")?),
        recipient: row.try_get::<Option<String>, _>("recipient_id")?.map(UserId),
        kind: parse_vocabulary("notification kind", &kind_raw, NotificationKind::parse)?,
        message: row.try_get("message")?,
        read: row.try_get("is_read")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use grievance_core::domain::category::CategoryId;
    use grievance_core::domain::complaint::{
        AnonymousContact, AttachmentRef, Complaint, ComplaintId, ComplaintStatus, Priority,
        Submitter,
    };
    use grievance_core::domain::notification::NotificationKind;
    use grievance_core::domain::timeline::Visibility;
    use grievance_core::domain::user::{Actor, Role, User, UserId};
    use grievance_core::lifecycle::{
        prepare_submission, LifecycleMachine, NewComplaint, SubmissionLimits, TransitionRequest,
    };
    use grievance_core::Category;

    use super::SqlComplaintStore;
    use crate::repositories::{ComplaintStore, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 23, 12, 0, 0).unwrap()
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");

        for (id, role) in [("student-1", "user"), ("admin-1", "admin"), ("sa-1", "super_admin")] {
            sqlx::query(
                "INSERT INTO users (id, name, email, role, active, created_at)
                 VALUES (?, ?, ?, ?, 1, '2026-01-01T00:00:00.000000Z')",
            )
            .bind(id)
            .bind(format!("{id} name"))
            .bind(format!("{id}@example.edu"))
            .bind(role)
            .execute(&pool)
            .await
            .expect("insert user");
        }
        sqlx::query("INSERT INTO category (id, name, active) VALUES (1, 'Facilities', 1)")
            .execute(&pool)
            .await
            .expect("insert category");
        pool
    }

    async fn submit(store: &SqlComplaintStore, submitter: Submitter, at: DateTime<Utc>) -> Complaint {
        let category = Category { id: CategoryId(1), name: "Facilities".to_string(), active: true };
        let prepared = prepare_submission(
            NewComplaint {
                category_id: CategoryId(1),
                subject: "Broken heater".to_string(),
                description: "Dorm B heater is out".to_string(),
                priority: Priority::High,
                submitter,
                attachments: vec![AttachmentRef {
                    file_name: "photo.jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    size_bytes: 2048,
                }],
            },
            Some(&category),
            &SubmissionLimits::default(),
            at,
        )
        .expect("valid submission");

        store
            .insert_submission(prepared.complaint, prepared.timeline)
            .await
            .expect("insert submission")
            .0
    }

    fn registered() -> Submitter {
        Submitter::Registered { user_id: UserId("student-1".to_string()) }
    }

    #[tokio::test]
    async fn submission_round_trips_with_attachments_and_first_entry() {
        let pool = setup_pool().await;
        let store = SqlComplaintStore::new(pool.clone());

        let stored = submit(&store, registered(), t0()).await;
        let found = store.find_by_id(&stored.id).await.expect("find complaint");
        assert_eq!(found, Some(stored.clone()));

        let timeline = store.list_timeline(&stored.id).await.expect("timeline");
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].status, ComplaintStatus::New);
        assert_eq!(timeline[0].author, Some(UserId("student-1".to_string())));

        assert!(store
            .find_by_id(&ComplaintId("CMP-missing".to_string()))
            .await
            .expect("lookup")
            .is_none());
        pool.close().await;
    }

    #[tokio::test]
    async fn anonymous_contact_details_round_trip_without_owner() {
        let pool = setup_pool().await;
        let store = SqlComplaintStore::new(pool.clone());
        let contact = AnonymousContact {
            name: None,
            email: Some("visitor@example.org".to_string()),
            phone: None,
        };

        let stored =
            submit(&store, Submitter::Anonymous { contact: Some(contact.clone()) }, t0()).await;
        let found = store.find_by_id(&stored.id).await.expect("find").expect("present");

        assert_eq!(found.submitter, Submitter::Anonymous { contact: Some(contact) });
        assert!(found.owner().is_none());
        pool.close().await;
    }

    #[tokio::test]
    async fn commit_change_writes_status_entry_and_notification_together() {
        let pool = setup_pool().await;
        let store = SqlComplaintStore::new(pool.clone());
        let stored = submit(&store, registered(), t0()).await;
        let machine = LifecycleMachine::new();

        let change = machine
            .transition(
                &stored,
                &TransitionRequest::new(ComplaintStatus::Resolved).with_comment("Heater fixed"),
                &Actor::new("admin-1", Role::Admin),
                t0() + Duration::hours(3),
            )
            .expect("resolve");
        let committed = store.commit_change(change).await.expect("commit");

        assert_eq!(committed.notifications.len(), 1);
        assert_eq!(committed.notifications[0].kind, NotificationKind::StatusUpdate);

        let found = store.find_by_id(&stored.id).await.expect("find").expect("present");
        assert_eq!(found.status, ComplaintStatus::Resolved);
        assert_eq!(found.version, 2);
        assert_eq!(found.resolved_at, Some(t0() + Duration::hours(3)));
        assert_eq!(found.resolution_details.as_deref(), Some("Heater fixed"));

        let inbox = store
            .list_notifications_for(&UserId("student-1".to_string()))
            .await
            .expect("inbox");
        assert_eq!(inbox, committed.notifications);

        assert!(store.mark_notification_read(inbox[0].id).await.expect("mark read"));
        let read = store.find_notification(inbox[0].id).await.expect("find").expect("present");
        assert!(read.read);
        pool.close().await;
    }

    #[tokio::test]
    async fn stale_change_is_a_conflict_and_writes_nothing() {
        let pool = setup_pool().await;
        let store = SqlComplaintStore::new(pool.clone());
        let stored = submit(&store, registered(), t0()).await;
        let machine = LifecycleMachine::new();
        let admin = Actor::new("admin-1", Role::Admin);

        let first = machine
            .transition(&stored, &TransitionRequest::new(ComplaintStatus::UnderReview), &admin, t0())
            .expect("first change");
        let second = machine
            .transition(&stored, &TransitionRequest::new(ComplaintStatus::Rejected), &admin, t0())
            .expect("second change from the same read");

        store.commit_change(first).await.expect("first commit");
        let error = store.commit_change(second).await.expect_err("stale commit");
        assert!(matches!(error, RepositoryError::Conflict(ref id) if *id == stored.id));

        let found = store.find_by_id(&stored.id).await.expect("find").expect("present");
        assert_eq!(found.status, ComplaintStatus::UnderReview);
        let timeline = store.list_timeline(&stored.id).await.expect("timeline");
        assert_eq!(timeline.len(), 2);
        pool.close().await;
    }

    #[tokio::test]
    async fn failed_notification_insert_rolls_back_the_status_change() {
        let pool = setup_pool().await;
        let store = SqlComplaintStore::new(pool.clone());
        let stored = submit(&store, registered(), t0()).await;
        let machine = LifecycleMachine::new();

        let mut change = machine
            .transition(
                &stored,
                &TransitionRequest::new(ComplaintStatus::Resolved).with_comment("Heater fixed"),
                &Actor::new("admin-1", Role::Admin),
                t0() + Duration::hours(1),
            )
            .expect("resolve");
        change.notifications[0].recipient = Some(UserId("ghost-user".to_string()));

        store.commit_change(change).await.expect_err("unknown recipient violates the foreign key");

        let found = store.find_by_id(&stored.id).await.expect("find").expect("present");
        assert_eq!(found.status, ComplaintStatus::New);
        assert_eq!(found.version, 1);
        assert!(found.resolved_at.is_none());
        assert!(found.resolution_details.is_none());
        let timeline = store.list_timeline(&stored.id).await.expect("timeline");
        assert_eq!(timeline.len(), 1);
        pool.close().await;
    }

    #[tokio::test]
    async fn sweep_candidates_exclude_closed_and_escalated() {
        let pool = setup_pool().await;
        let store = SqlComplaintStore::new(pool.clone());
        let machine = LifecycleMachine::new();
        let admin = Actor::new("admin-1", Role::Admin);
        let target = User {
            id: UserId("sa-1".to_string()),
            name: "Dean".to_string(),
            email: "sa-1@example.edu".to_string(),
            role: Role::SuperAdmin,
            active: true,
        };

        let open = submit(&store, registered(), t0()).await;
        let escalated = submit(&store, registered(), t0() + Duration::minutes(1)).await;
        let rejected = submit(&store, registered(), t0() + Duration::minutes(2)).await;

        let change = machine
            .escalate(&escalated, &target, "needs dean", &admin, t0())
            .expect("escalate");
        store.commit_change(change).await.expect("commit escalation");
        let change = machine
            .transition(&rejected, &TransitionRequest::new(ComplaintStatus::Rejected), &admin, t0())
            .expect("reject");
        store.commit_change(change).await.expect("commit rejection");

        let candidates = store.list_sweep_candidates().await.expect("candidates");
        let ids: Vec<_> = candidates.iter().map(|complaint| complaint.id.clone()).collect();
        assert_eq!(ids, vec![open.id]);
        pool.close().await;
    }

    #[tokio::test]
    async fn timeline_orders_by_time_then_insertion() {
        let pool = setup_pool().await;
        let store = SqlComplaintStore::new(pool.clone());
        let stored = submit(&store, registered(), t0()).await;
        let machine = LifecycleMachine::new();
        let admin = Actor::new("admin-1", Role::Admin);

        let note = machine
            .annotate(&stored, "Checked with facilities", Visibility::Internal, &admin, t0())
            .expect("note");
        let committed = store.commit_change(note).await.expect("commit note");
        let change = machine
            .transition(
                &committed.complaint,
                &TransitionRequest::new(ComplaintStatus::InProgress),
                &admin,
                t0(),
            )
            .expect("start work");
        store.commit_change(change).await.expect("commit transition");

        let timeline = store.list_timeline(&stored.id).await.expect("timeline");
        let statuses: Vec<_> = timeline.iter().map(|entry| entry.status).collect();
        assert_eq!(
            statuses,
            vec![ComplaintStatus::New, ComplaintStatus::New, ComplaintStatus::InProgress]
        );
        assert_eq!(timeline[1].visibility, Visibility::Internal);
        pool.close().await;
    }
}
