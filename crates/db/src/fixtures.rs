use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Seeded complaints and the status each must hold after loading.
const SEED_COMPLAINTS: &[SeedComplaintContract] = &[
    SeedComplaintContract {
        complaint_id: "CMP-20260110-DEMO0001",
        status: "new",
        timeline_entries: 1,
        description: "Registered high-priority complaint awaiting triage",
    },
    SeedComplaintContract {
        complaint_id: "CMP-20260111-DEMO0002",
        status: "in_progress",
        timeline_entries: 3,
        description: "Urgent complaint assigned and in progress",
    },
    SeedComplaintContract {
        complaint_id: "CMP-20260112-DEMO0003",
        status: "resolved",
        timeline_entries: 3,
        description: "Resolved complaint with resolution details",
    },
    SeedComplaintContract {
        complaint_id: "CMP-20260114-DEMO0004",
        status: "new",
        timeline_entries: 1,
        description: "Anonymous complaint with contact email only",
    },
];

const SEED_USER_IDS: &[&str] =
    &["student-ava", "student-ben", "admin-casey", "admin-drew", "admin-former", "dean-emery"];

const SEED_CATEGORY_COUNT: i64 = 5;

/// Demo categories, users, sessions and complaints covering each lifecycle stage.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Loads the dataset. Safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        let complaints_seeded = SEED_COMPLAINTS
            .iter()
            .map(|complaint| SeededComplaint {
                complaint_id: complaint.complaint_id,
                status: complaint.status,
                description: complaint.description,
            })
            .collect();

        Ok(SeedResult { complaints_seeded, users_seeded: SEED_USER_IDS.len() })
    }

    /// Checks that the seeded rows exist with their expected shape.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let category_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM category WHERE id BETWEEN 1 AND 5")
                .fetch_one(pool)
                .await?;
        checks.push(("categories", category_count == SEED_CATEGORY_COUNT));

        let mut users_present = true;
        for user_id in SEED_USER_IDS {
            let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)")
                .bind(user_id)
                .fetch_one(pool)
                .await?;
            users_present &= exists == 1;
        }
        checks.push(("users", users_present));

        for complaint in SEED_COMPLAINTS {
            let status_matches: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM complaint WHERE complaint_id = ?1 AND status = ?2)",
            )
            .bind(complaint.complaint_id)
            .bind(complaint.status)
            .fetch_one(pool)
            .await?;

            let entry_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1)
                 FROM timeline_entry t
                 JOIN complaint c ON c.row_id = t.complaint_row_id
                 WHERE c.complaint_id = ?1",
            )
            .bind(complaint.complaint_id)
            .fetch_one(pool)
            .await?;

            checks.push((
                complaint.complaint_id,
                status_matches == 1 && entry_count >= complaint.timeline_entries,
            ));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedComplaintContract {
    complaint_id: &'static str,
    status: &'static str,
    timeline_entries: i64,
    description: &'static str,
}

#[derive(Debug)]
pub struct SeedResult {
    pub complaints_seeded: Vec<SeededComplaint>,
    pub users_seeded: usize,
}

#[derive(Debug)]
pub struct SeededComplaint {
    pub complaint_id: &'static str,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
