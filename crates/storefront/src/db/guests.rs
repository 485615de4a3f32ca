//! Guest session repository.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use stride_core::{GuestId, GuestToken};

use super::RepositoryError;

/// A stored guest session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guest {
    pub id: GuestId,
    pub token: GuestToken,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Guest {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GuestRow {
    id: GuestId,
    session_token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<GuestRow> for Guest {
    type Error = RepositoryError;

    fn try_from(row: GuestRow) -> Result<Self, Self::Error> {
        let token = GuestToken::parse(&row.session_token).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid guest token in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            token,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

/// Repository for guest sessions.
pub struct GuestRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GuestRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a guest by its session token, expired or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[tracing::instrument(skip(self, token))]
    pub async fn find_by_token(&self, token: &GuestToken) -> Result<Option<Guest>, RepositoryError> {
        let row = sqlx::query_as::<_, GuestRow>(
            r"
            SELECT id, session_token, created_at, expires_at
            FROM storefront.guests
            WHERE session_token = $1
            ",
        )
        .bind(token.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Store a new guest session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the token is already taken.
    #[tracing::instrument(skip(self, token))]
    pub async fn create(
        &self,
        token: &GuestToken,
        expires_at: DateTime<Utc>,
    ) -> Result<Guest, RepositoryError> {
        let row = sqlx::query_as::<_, GuestRow>(
            r"
            INSERT INTO storefront.guests (session_token, expires_at)
            VALUES ($1, $2)
            RETURNING id, session_token, created_at, expires_at
            ",
        )
        .bind(token.as_str())
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("guest token already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    /// Delete a guest; its cart goes with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: GuestId) -> Result<bool, RepositoryError> {
        Ok(delete(self.pool, id).await? > 0)
    }

    /// Delete every guest that expired at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[tracing::instrument(skip(self))]
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.guests WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Delete a guest inside the caller's transaction.
pub(super) async fn delete<'e>(
    executor: impl PgExecutor<'e>,
    id: GuestId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM storefront.guests WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
