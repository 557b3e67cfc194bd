use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use grievance_core::domain::category::{Category, CategoryId};
use grievance_core::domain::complaint::Priority;
use grievance_core::domain::rule::{EscalationRole, EscalationRule, RuleId};
use grievance_core::domain::user::{Role, User, UserId};

use super::codec::{parse_u32, parse_vocabulary};
use super::{ReferenceDirectory, RepositoryError};
use crate::DbPool;

pub struct SqlReferenceDirectory {
    pool: DbPool,
}

impl SqlReferenceDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReferenceDirectory for SqlReferenceDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, role, active FROM users WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_active_users_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, email, role, active
             FROM users
             WHERE role = ? AND active = 1
             ORDER BY id ASC",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn list_escalation_rules(&self) -> Result<Vec<EscalationRule>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, category_id, priority, hours_before_escalation, escalate_to_role, active
             FROM escalation_rule
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rule_from_row).collect()
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, active FROM category WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Category {
                id: CategoryId(row.try_get("id")?),
                name: row.try_get("name")?,
                active: row.try_get("active")?,
            })
        })
        .transpose()
    }
}

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;

    Ok(User {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: parse_vocabulary("role", &role_raw, Role::parse)?,
        active: row.try_get("active")?,
    })
}

fn rule_from_row(row: &SqliteRow) -> Result<EscalationRule, RepositoryError> {
    let priority = row
        .try_get::<Option<String>, _>("priority")?
        .map(|value| parse_vocabulary("priority", &value, Priority::parse))
        .transpose()?;
    let role_raw = row.try_get::<String, _>("escalate_to_role")?;

    Ok(EscalationRule {
        id: RuleId(row.try_get("id")?),
        category_id: row.try_get::<Option<i64>, _>("category_id")?.map(CategoryId),
        priority,
        hours_before_escalation: parse_u32(
            "hours_before_escalation",
            row.try_get("hours_before_escalation")?,
        )?,
        escalate_to_role: parse_vocabulary("escalation role", &role_raw, EscalationRole::parse)?,
        active: row.try_get("active")?,
    })
}
