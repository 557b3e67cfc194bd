use chrono::{DateTime, Utc};

use grievance_core::domain::user::User;

use super::codec::encode_timestamp;
use super::directory::user_from_row;
use super::{RepositoryError, SessionRepository};
use crate::DbPool;

/// Reads sessions issued by the external authentication service. Tokens are opaque
/// lookup keys; nothing here verifies credentials.
pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find_session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT u.id, u.name, u.email, u.role, u.active
             FROM user_session s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ? AND (s.expires_at IS NULL OR s.expires_at > ?)",
        )
        .bind(token)
        .bind(encode_timestamp(now))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::SqlSessionRepository;
    use crate::repositories::SessionRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn expired_and_unknown_tokens_resolve_to_nobody() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        sqlx::query(
            "INSERT INTO users (id, name, email, role, active, created_at)
             VALUES ('admin-1', 'Avery', 'avery@example.edu', 'admin', 1, '2026-01-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await
        .expect("insert user");
        sqlx::query(
            "INSERT INTO user_session (token, user_id, expires_at, created_at) VALUES
                ('tok-live', 'admin-1', '2026-06-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z'),
                ('tok-old', 'admin-1', '2026-01-02T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await
        .expect("insert sessions");

        let sessions = SqlSessionRepository::new(pool.clone());
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        let live = sessions.find_session_user("tok-live", now).await.expect("lookup");
        assert_eq!(live.map(|user| user.id.0), Some("admin-1".to_string()));
        assert!(sessions.find_session_user("tok-old", now).await.expect("lookup").is_none());
        assert!(sessions.find_session_user("tok-none", now).await.expect("lookup").is_none());
        pool.close().await;
    }
}
