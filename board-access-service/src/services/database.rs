//! PostgreSQL implementation of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::store::{
    BoardRegistry, CustomerStore, InvitationStore, MembershipStore, RedeemOutcome, SessionStore,
    StoreError,
};
use crate::models::{
    AcceptedInvitation, BoardMembership, BoardRecord, BoardRole, Customer, CustomerBoard,
    CustomerSession, Invitation, InvitationRecord, MembershipRecord,
};

const CUSTOMER_COLUMNS: &str =
    "customer_id, email, first_name, last_name, company, job_title, created_utc, updated_utc";

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    customer: Customer,
    password_hash: String,
}

#[derive(FromRow)]
struct InvitationStatusRow {
    expiry_utc: DateTime<Utc>,
}

#[derive(FromRow)]
struct ClaimedInvitationRow {
    board_id: Uuid,
    role_code: String,
}

/// Connection loss and pool exhaustion are transient; unique violations are
/// surfaced by constraint name so callers can tell which key collided.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation(db.constraint().unwrap_or("unknown").to_string());
        }
    }

    if matches!(
        err,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed
    ) {
        return StoreError::Unavailable(anyhow::Error::new(err));
    }

    StoreError::Backend(anyhow::Error::new(err))
}

fn corrupt_row(err: String) -> StoreError {
    StoreError::Backend(anyhow::anyhow!("Corrupt row: {}", err))
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }
}

// ==================== Customer Operations ====================

#[async_trait]
impl CustomerStore for Database {
    async fn create_customer(
        &self,
        customer: &Customer,
        credential_hash: &str,
        session: &CustomerSession,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO customers (customer_id, email, first_name, last_name, company, job_title, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(customer.customer_id)
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.company)
        .bind(&customer.job_title)
        .bind(customer.created_utc)
        .bind(customer.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO customer_credentials (customer_id, password_hash, updated_utc)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(customer.customer_id)
        .bind(credential_hash)
        .bind(customer.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        insert_session_row(&mut *tx, session).await?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_customer_by_id(&self, customer_id: Uuid) -> Result<Option<Customer>, StoreError> {
        sqlx::query_as::<_, Customer>(&format!(
            "SELECT {} FROM customers WHERE customer_id = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(Customer, String)>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT c.customer_id, c.email, c.first_name, c.last_name, c.company, c.job_title,
                   c.created_utc, c.updated_utc, cc.password_hash
            FROM customers c
            JOIN customer_credentials cc ON cc.customer_id = c.customer_id
            WHERE LOWER(c.email) = LOWER($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map(|r| (r.customer, r.password_hash)))
    }

    async fn update_customer_profile(&self, customer: &Customer) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET first_name = $2, last_name = $3, company = $4, job_title = $5, updated_utc = $6
            WHERE customer_id = $1
            "#,
        )
        .bind(customer.customer_id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.company)
        .bind(&customer.job_title)
        .bind(customer.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "Customer {} does not exist",
                customer.customer_id
            )));
        }
        Ok(())
    }
}

// ==================== Session Operations ====================

async fn insert_session_row<'e, E>(executor: E, session: &CustomerSession) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO customer_sessions (session_id, customer_id, token_hash, issued_utc, expiry_utc, revoked_utc)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(session.session_id)
    .bind(session.customer_id)
    .bind(&session.token_hash)
    .bind(session.issued_utc)
    .bind(session.expiry_utc)
    .bind(session.revoked_utc)
    .execute(executor)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

#[async_trait]
impl SessionStore for Database {
    async fn insert_session(&self, session: &CustomerSession) -> Result<(), StoreError> {
        insert_session_row(&self.pool, session).await
    }

    async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<CustomerSession>, StoreError> {
        sqlx::query_as::<_, CustomerSession>(
            r#"
            SELECT session_id, customer_id, token_hash, issued_utc, expiry_utc, revoked_utc
            FROM customer_sessions WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn revoke_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE customer_sessions SET revoked_utc = $2 WHERE token_hash = $1 AND revoked_utc IS NULL",
        )
        .bind(token_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

// ==================== Board Operations ====================

#[async_trait]
impl BoardRegistry for Database {
    async fn find_board_by_id(&self, board_id: Uuid) -> Result<Option<CustomerBoard>, StoreError> {
        sqlx::query_as::<_, BoardRecord>(
            r#"
            SELECT board_id, organization_slug, board_slug, board_name, is_public, access_type_code
            FROM customer_boards WHERE board_id = $1
            "#,
        )
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .map(CustomerBoard::try_from)
        .transpose()
        .map_err(corrupt_row)
    }

    async fn find_board_by_slug(
        &self,
        organization_slug: &str,
        board_slug: &str,
    ) -> Result<Option<CustomerBoard>, StoreError> {
        sqlx::query_as::<_, BoardRecord>(
            r#"
            SELECT board_id, organization_slug, board_slug, board_name, is_public, access_type_code
            FROM customer_boards WHERE organization_slug = $1 AND board_slug = $2
            "#,
        )
        .bind(organization_slug)
        .bind(board_slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .map(CustomerBoard::try_from)
        .transpose()
        .map_err(corrupt_row)
    }
}

// ==================== Membership Operations ====================

#[async_trait]
impl MembershipStore for Database {
    async fn find_membership(
        &self,
        board_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<BoardMembership>, StoreError> {
        sqlx::query_as::<_, MembershipRecord>(
            r#"
            SELECT board_id, customer_id, role_code, joined_utc, updated_utc
            FROM board_memberships WHERE board_id = $1 AND customer_id = $2
            "#,
        )
        .bind(board_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .map(BoardMembership::try_from)
        .transpose()
        .map_err(corrupt_row)
    }

    async fn list_memberships(&self, board_id: Uuid) -> Result<Vec<BoardMembership>, StoreError> {
        sqlx::query_as::<_, MembershipRecord>(
            r#"
            SELECT board_id, customer_id, role_code, joined_utc, updated_utc
            FROM board_memberships WHERE board_id = $1
            ORDER BY joined_utc
            "#,
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?
        .into_iter()
        .map(BoardMembership::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(corrupt_row)
    }

    async fn remove_membership(
        &self,
        board_id: Uuid,
        customer_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM board_memberships WHERE board_id = $1 AND customer_id = $2")
                .bind(board_id)
                .bind(customer_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

// ==================== Invitation Operations ====================

#[async_trait]
impl InvitationStore for Database {
    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO board_invitations (invitation_id, board_id, email, role_code, token_hash, created_utc, expiry_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(invitation.invitation_id)
        .bind(invitation.board_id)
        .bind(&invitation.email)
        .bind(invitation.role.as_str())
        .bind(&invitation.token_hash)
        .bind(invitation.created_utc)
        .bind(invitation.expiry_utc)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        sqlx::query_as::<_, InvitationRecord>(
            r#"
            SELECT invitation_id, board_id, email, role_code, token_hash, created_utc,
                   expiry_utc, accepted_utc, accepted_by_customer_id
            FROM board_invitations WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .map(Invitation::try_from)
        .transpose()
        .map_err(corrupt_row)
    }

    async fn redeem_invitation(
        &self,
        invitation_id: Uuid,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // Concurrent claimers block on the row lock and re-check the predicate
        // once the winner commits, so only one UPDATE ever matches.
        let claimed = sqlx::query_as::<_, ClaimedInvitationRow>(
            r#"
            UPDATE board_invitations
            SET accepted_utc = $2, accepted_by_customer_id = $3
            WHERE invitation_id = $1 AND accepted_utc IS NULL AND expiry_utc > $2
            RETURNING board_id, role_code
            "#,
        )
        .bind(invitation_id)
        .bind(now)
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let Some(claimed) = claimed else {
            let status = sqlx::query_as::<_, InvitationStatusRow>(
                "SELECT expiry_utc FROM board_invitations WHERE invitation_id = $1",
            )
            .bind(invitation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx)?;
            tx.rollback().await.map_err(map_sqlx)?;

            return Ok(match status {
                None => RedeemOutcome::NotFound,
                Some(s) if now >= s.expiry_utc => RedeemOutcome::Expired,
                Some(_) => RedeemOutcome::AlreadyAccepted,
            });
        };

        let role: BoardRole = claimed.role_code.parse().map_err(corrupt_row)?;

        let previous_role = sqlx::query_scalar::<_, String>(
            "SELECT role_code FROM board_memberships WHERE board_id = $1 AND customer_id = $2 FOR UPDATE",
        )
        .bind(claimed.board_id)
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .map(|code| code.parse::<BoardRole>())
        .transpose()
        .map_err(corrupt_row)?;

        let record = sqlx::query_as::<_, MembershipRecord>(
            r#"
            INSERT INTO board_memberships (board_id, customer_id, role_code, joined_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (board_id, customer_id)
            DO UPDATE SET role_code = EXCLUDED.role_code, updated_utc = EXCLUDED.updated_utc
            RETURNING board_id, customer_id, role_code, joined_utc, updated_utc
            "#,
        )
        .bind(claimed.board_id)
        .bind(customer_id)
        .bind(role.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;

        Ok(RedeemOutcome::Redeemed(AcceptedInvitation {
            membership: BoardMembership::try_from(record).map_err(corrupt_row)?,
            previous_role,
        }))
    }
}
