//! Database helpers for accounts and bearer tokens.

use anyhow::{anyhow, Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{Role, UserBody};
use super::utils::{generate_token, hash_token, is_unique_violation};

// Shared select list so every query serializes users the same way.
const USER_COLUMNS: &str = r#"
    id::text AS id,
    name,
    email,
    role,
    office_id::text AS office_id,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum CreateOutcome {
    Created(UserBody),
    EmailTaken,
}

/// Outcome for a profile update.
#[derive(Debug)]
pub(super) enum UpdateOutcome {
    Updated(UserBody),
    EmailTaken,
    NotFound,
}

/// Minimal fields needed to verify a login.
pub(super) struct CredentialRecord {
    pub(super) user_id: Uuid,
    pub(super) password_hash: String,
    pub(super) role: Role,
}

/// Who a valid bearer token belongs to.
pub(crate) struct TokenIdentity {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) role: Role,
}

fn map_user_row(row: &sqlx::postgres::PgRow) -> Result<UserBody> {
    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role in database: {role}"))?;
    Ok(UserBody {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role,
        office_id: row.get("office_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// True when a live administrator account exists.
pub(super) async fn admin_exists(pool: &PgPool) -> Result<bool> {
    let query = "SELECT 1 FROM users WHERE role = 'admin' AND deleted_at IS NULL LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check for an existing administrator")?;
    Ok(row.is_some())
}

pub(super) async fn create_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
    office_id: Option<Uuid>,
) -> Result<CreateOutcome> {
    let query = format!(
        "INSERT INTO users (name, email, password_hash, role, office_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {USER_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(office_id)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(CreateOutcome::Created(map_user_row(&row)?)),
        Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::EmailTaken),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Look up login data by email. Soft-deleted accounts are invisible here.
pub(super) async fn lookup_credentials(
    pool: &PgPool,
    email: &str,
) -> Result<Option<CredentialRecord>> {
    let query =
        "SELECT id, password_hash, role FROM users WHERE email = $1 AND deleted_at IS NULL LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login credentials")?;

    row.map(|row| {
        let role: String = row.get("role");
        let role =
            Role::parse(&role).ok_or_else(|| anyhow!("unknown role in database: {role}"))?;
        Ok(CredentialRecord {
            user_id: row.get("id"),
            password_hash: row.get("password_hash"),
            role,
        })
    })
    .transpose()
}

pub(super) async fn fetch_user(pool: &PgPool, user_id: Uuid) -> Result<Option<UserBody>> {
    let query =
        format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch user")?;
    row.map(|row| map_user_row(&row)).transpose()
}

pub(super) async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    name: Option<String>,
    email: Option<String>,
) -> Result<UpdateOutcome> {
    let query = format!(
        "UPDATE users
         SET name = COALESCE($1, name),
             email = COALESCE($2, email),
             updated_at = NOW()
         WHERE id = $3 AND deleted_at IS NULL
         RETURNING {USER_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(email)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => Ok(UpdateOutcome::Updated(map_user_row(&row)?)),
        Ok(None) => Ok(UpdateOutcome::NotFound),
        Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::EmailTaken),
        Err(err) => Err(err).context("failed to update profile"),
    }
}

pub(super) async fn fetch_password_hash(pool: &PgPool, user_id: Uuid) -> Result<Option<String>> {
    let query = "SELECT password_hash FROM users WHERE id = $1 AND deleted_at IS NULL LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch password hash")?;
    Ok(row.map(|row| row.get("password_hash")))
}

pub(super) async fn update_password_hash(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query =
        "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2 AND deleted_at IS NULL";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password hash")?;
    Ok(())
}

/// Mint a token for a fresh registration. The raw value is returned exactly
/// once; the database stores only its hash.
pub(super) async fn issue_token(pool: &PgPool, user_id: Uuid, role: Role) -> Result<String> {
    let query = "INSERT INTO api_tokens (user_id, token_hash, role) VALUES ($1, $2, $3)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(&token_hash)
            .bind(role.as_str())
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert token"),
        }
    }

    Err(anyhow!("failed to generate unique bearer token"))
}

/// Delete every token the user holds and mint the replacement, all in one
/// transaction. Old tokens are invalid the moment this commits.
pub(super) async fn rotate_tokens(pool: &PgPool, user_id: Uuid, role: Role) -> Result<String> {
    let mut tx = pool.begin().await.context("begin token rotation")?;

    let query = "DELETE FROM api_tokens WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke prior tokens")?;

    let query = "INSERT INTO api_tokens (user_id, token_hash, role) VALUES ($1, $2, $3)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    let mut issued = None;
    for _ in 0..3 {
        let token = generate_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(&token_hash)
            .bind(role.as_str())
            .execute(&mut *tx)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => {
                issued = Some(token);
                break;
            }
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert replacement token"),
        }
    }

    let Some(token) = issued else {
        return Err(anyhow!("failed to generate unique bearer token"));
    };

    tx.commit().await.context("commit token rotation")?;

    Ok(token)
}

/// Resolve a presented token hash to its owner.
///
/// Enforces the soft-delete marker and, when configured, the issued-at +
/// max-age check.
pub(super) async fn lookup_token(
    pool: &PgPool,
    token_hash: &[u8],
    max_age_seconds: Option<i64>,
) -> Result<Option<TokenIdentity>> {
    let query = r"
        SELECT users.id, users.email, users.role
        FROM api_tokens
        JOIN users ON users.id = api_tokens.user_id
        WHERE api_tokens.token_hash = $1
          AND users.deleted_at IS NULL
          AND ($2::bigint IS NULL
               OR api_tokens.created_at > NOW() - ($2 * INTERVAL '1 second'))
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(max_age_seconds)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup token")?;

    let Some(row) = row else {
        return Ok(None);
    };

    // Record activity for visibility without extending token validity.
    let query = "UPDATE api_tokens SET last_used_at = NOW() WHERE token_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update token last_used_at")?;

    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role in database: {role}"))?;
    Ok(Some(TokenIdentity {
        user_id: row.get("id"),
        email: row.get("email"),
        role,
    }))
}

/// Logout is idempotent; it's fine if no rows are deleted.
pub(super) async fn delete_token(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM api_tokens WHERE token_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete token")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CreateOutcome, TokenIdentity, UpdateOutcome};
    use crate::api::handlers::auth::types::Role;
    use uuid::Uuid;

    #[test]
    fn update_outcome_debug_names() {
        assert_eq!(format!("{:?}", UpdateOutcome::EmailTaken), "EmailTaken");
        assert_eq!(format!("{:?}", UpdateOutcome::NotFound), "NotFound");
    }

    #[test]
    fn create_outcome_debug_names() {
        assert_eq!(format!("{:?}", CreateOutcome::EmailTaken), "EmailTaken");
    }

    #[test]
    fn token_identity_holds_values() {
        let identity = TokenIdentity {
            user_id: Uuid::nil(),
            email: "alice@example.com".to_string(),
            role: Role::User,
        };
        assert_eq!(identity.user_id, Uuid::nil());
        assert_eq!(identity.email, "alice@example.com");
        assert_eq!(identity.role, Role::User);
    }
}
