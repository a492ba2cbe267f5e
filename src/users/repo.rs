use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, User, UserChanges};

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone_number, \
     profile_picture, date_of_birth, gender, role, is_active, is_staff, is_superuser, \
     is_deleted, created_at, updated_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

fn map_unique(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::DuplicateEmail
        }
        _ => StoreError::Database(e),
    }
}

/// Persistence for user records. Lookups never return soft-deleted users.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts a user; a live user with the same email yields `DuplicateEmail`.
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError>;
    /// Flags the user as deleted and inactive; the row stays.
    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name,
                               is_active, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(new.is_active)
            .bind(new.is_staff)
            .bind(new.is_superuser)
            .fetch_one(&self.db)
            .await
            .map_err(map_unique)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_deleted = FALSE"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_deleted = FALSE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE is_deleted = FALSE
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = ");
        qb.push_bind(OffsetDateTime::now_utc());
        macro_rules! set {
            ($col:literal, $val:expr) => {
                if let Some(v) = $val {
                    qb.push(concat!(", ", $col, " = ")).push_bind(v);
                }
            };
        }
        set!("email", changes.email);
        set!("first_name", changes.first_name);
        set!("last_name", changes.last_name);
        set!("phone_number", changes.phone_number);
        set!("profile_picture", changes.profile_picture);
        set!("date_of_birth", changes.date_of_birth);
        set!("gender", changes.gender);
        set!("role", changes.role);
        set!("is_active", changes.is_active);
        set!("is_staff", changes.is_staff);
        set!("is_superuser", changes.is_superuser);
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND is_deleted = FALSE RETURNING ")
            .push(USER_COLUMNS);

        qb.build_query_as::<User>()
            .fetch_optional(&self.db)
            .await
            .map_err(map_unique)?
            .ok_or(StoreError::NotFound)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET is_deleted = TRUE, is_active = FALSE, updated_at = now()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
