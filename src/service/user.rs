//! User business logic

use crate::domain::{NewUser, Token, UpdateUser, User};
use crate::error::{AppError, Result};
use crate::jwt::{JwtManager, Role};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{pool::PoolConnection, types::Json, FromRow, MySql};
use uuid::Uuid;
use validator::Validate;

/// Boundary into the user business rules.
///
/// Every operation runs against a handle acquired by the caller for the
/// duration of the request. Errors are drawn from [`AppError`]; callers act
/// on the kind only.
#[cfg_attr(test, mockall::automock(type Handle = ();))]
#[async_trait]
pub trait UserDomain: Send + Sync + 'static {
    type Handle: Send;

    async fn list(&self, handle: &mut Self::Handle) -> Result<Vec<User>>;

    async fn retrieve(&self, handle: &mut Self::Handle, id: &str) -> Result<User>;

    async fn create(
        &self,
        handle: &mut Self::Handle,
        input: &NewUser,
        now: DateTime<Utc>,
    ) -> Result<User>;

    async fn update(
        &self,
        handle: &mut Self::Handle,
        id: &str,
        input: &UpdateUser,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn delete(&self, handle: &mut Self::Handle, id: &str) -> Result<()>;

    async fn authenticate(
        &self,
        handle: &mut Self::Handle,
        authenticator: &JwtManager,
        now: DateTime<Utc>,
        email: &str,
        password: &str,
    ) -> Result<Token>;
}

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: String,
    name: String,
    email: String,
    roles: Json<Vec<Role>>,
    password_hash: String,
    date_created: DateTime<Utc>,
    date_modified: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.user_id,
            name: row.name,
            email: row.email,
            roles: row.roles.0,
            date_created: row.date_created,
            date_modified: row.date_modified,
        }
    }
}

const SELECT_USER: &str = r#"
    SELECT user_id, name, email, roles, password_hash, date_created, date_modified
    FROM users
"#;

/// MySQL-backed user domain.
#[derive(Debug, Clone, Default)]
pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        Self
    }

    async fn find_by_id(conn: &mut PoolConnection<MySql>, id: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE user_id = ?"))
            .bind(id)
            .fetch_optional(&mut **conn)
            .await?;
        Ok(row)
    }

    async fn find_by_email(
        conn: &mut PoolConnection<MySql>,
        email: &str,
    ) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE email = ?"))
            .bind(email)
            .fetch_optional(&mut **conn)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl UserDomain for UserService {
    type Handle = PoolConnection<MySql>;

    async fn list(&self, conn: &mut Self::Handle) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} ORDER BY date_created"))
            .fetch_all(&mut **conn)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn retrieve(&self, conn: &mut Self::Handle, id: &str) -> Result<User> {
        Self::find_by_id(conn, id)
            .await?
            .map(User::from)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn create(
        &self,
        conn: &mut Self::Handle,
        input: &NewUser,
        now: DateTime<Utc>,
    ) -> Result<User> {
        input.validate()?;

        if Self::find_by_email(conn, &input.email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "User with email '{}' already exists",
                input.email
            )));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: input.name.clone(),
            email: input.email.clone(),
            roles: input.roles.clone(),
            date_created: now,
            date_modified: now,
        };
        let password_hash = hash_password(&input.password)?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, name, email, roles, password_hash, date_created, date_modified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(Json(&user.roles))
        .bind(&password_hash)
        .bind(user.date_created)
        .bind(user.date_modified)
        .execute(&mut **conn)
        .await
        .map_err(|e| write_error(e, &input.email))?;

        Ok(user)
    }

    async fn update(
        &self,
        conn: &mut Self::Handle,
        id: &str,
        input: &UpdateUser,
        now: DateTime<Utc>,
    ) -> Result<()> {
        input.validate()?;

        let existing = Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        if let Some(email) = input.email.as_ref().filter(|e| **e != existing.email) {
            if Self::find_by_email(conn, email).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "User with email '{}' already exists",
                    email
                )));
            }
        }

        let name = input.name.as_ref().unwrap_or(&existing.name);
        let email = input.email.as_ref().unwrap_or(&existing.email);
        let roles = input.roles.as_ref().unwrap_or(&existing.roles.0);
        let password_hash = match &input.password {
            Some(password) => hash_password(password)?,
            None => existing.password_hash.clone(),
        };

        sqlx::query(
            r#"
            UPDATE users
            SET name = ?, email = ?, roles = ?, password_hash = ?, date_modified = ?
            WHERE user_id = ?
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(Json(roles))
        .bind(&password_hash)
        .bind(now)
        .bind(id)
        .execute(&mut **conn)
        .await
        .map_err(|e| write_error(e, email))?;

        Ok(())
    }

    async fn delete(&self, conn: &mut Self::Handle, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(id)
            .execute(&mut **conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        Ok(())
    }

    async fn authenticate(
        &self,
        conn: &mut Self::Handle,
        authenticator: &JwtManager,
        now: DateTime<Utc>,
        email: &str,
        password: &str,
    ) -> Result<Token> {
        // Unknown email and wrong password are indistinguishable to the caller.
        let row = Self::find_by_email(conn, email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(password, &row.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        let claims = authenticator.claims_for(&row.user_id, row.roles.0, now);
        authenticator.issue(&claims)
    }
}

/// Unique-index violations on the users table surface as a conflict on `email`.
fn write_error(err: sqlx::Error, email: &str) -> AppError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("User with email '{}' already exists", email))
        }
        other => AppError::Database(other),
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against its hash
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
