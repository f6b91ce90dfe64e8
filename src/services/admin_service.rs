use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::dto::admin_dto::{AdminDashboardStats, RequestCounts, UserCounts};
use crate::error::{Error, Result};
use crate::models::hire_request::HireStatus;
use crate::models::user::{Role, User};

const USER_COLUMNS: &str =
    "id, name, email, phone, password_hash, google_id, role, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct AdminService {
    pool: PgPool,
}

impl AdminService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_users(&self, role: Option<&str>) -> Result<Vec<User>> {
        let role = match role.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Some(
                Role::parse(raw)
                    .ok_or_else(|| Error::BadRequest(format!("Unknown role '{}'", raw)))?,
            ),
            None => None,
        };
        let sql = format!(
            "SELECT {} FROM users WHERE ($1::text IS NULL OR role = $1) ORDER BY created_at DESC",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Deactivating a provider also takes them off the job board.
    pub async fn set_user_active(&self, admin_id: Uuid, id: Uuid, active: bool) -> Result<User> {
        if admin_id == id && !active {
            return Err(Error::BadRequest("You cannot deactivate your own account".into()));
        }
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(active)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".into()))?;
        sqlx::query("UPDATE providers SET is_active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE shops SET is_active = $2, updated_at = NOW() WHERE owner_id = $1")
            .bind(id)
            .bind(active)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(user_id = %id, active, by = %admin_id, "user status changed");
        Ok(user)
    }

    pub async fn dashboard(&self) -> Result<AdminDashboardStats> {
        let mut stats = AdminDashboardStats::default();

        let rows = sqlx::query("SELECT role, COUNT(*) AS n FROM users GROUP BY role")
            .fetch_all(&self.pool)
            .await?;
        let mut users = UserCounts::default();
        for row in rows {
            let role: String = row.try_get("role")?;
            let n: i64 = row.try_get("n")?;
            match Role::parse(&role) {
                Some(Role::Customer) => users.customers += n,
                Some(Role::Provider) => users.providers += n,
                Some(Role::ShopOwner) => users.shop_owners += n,
                Some(Role::Admin) => users.admins += n,
                None => {}
            }
        }
        stats.users = users;

        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM hire_requests GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut requests = RequestCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            requests.total += n;
            match HireStatus::parse(&status) {
                Some(HireStatus::Pending) => requests.pending += n,
                Some(HireStatus::Confirmed) => requests.confirmed += n,
                Some(HireStatus::InProgress) => requests.in_progress += n,
                Some(HireStatus::Completed) => requests.completed += n,
                Some(HireStatus::Cancelled) => requests.cancelled += n,
                Some(HireStatus::Declined) => requests.declined += n,
                None => {}
            }
        }
        stats.hire_requests = requests;

        stats.pending_provider_approvals =
            sqlx::query_scalar("SELECT COUNT(*) FROM providers WHERE approval_status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        stats.open_tickets = sqlx::query_scalar(
            "SELECT COUNT(*) FROM support_tickets WHERE status IN ('open', 'in_progress')",
        )
        .fetch_one(&self.pool)
        .await?;
        stats.shops = sqlx::query_scalar("SELECT COUNT(*) FROM shops")
            .fetch_one(&self.pool)
            .await?;
        stats.products = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(stats)
    }
}
