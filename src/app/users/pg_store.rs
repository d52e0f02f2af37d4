//! PostgreSQL 存储实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tracing::debug;

use super::model::{NewUser, User, UserId, UserPatch};
use super::store::{StoreError, UserStore, EMAIL_UNIQUE_CONSTRAINT};

const USER_COLUMNS: &str = "id, name, email, age, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// age 在库里是 BIGINT
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    age: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let age = u32::try_from(row.age)
            .map_err(|_| StoreError::Backend(format!("user {} has out-of-range age {}", row.id, row.age)))?;
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            age,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation {
                constraint: db_err
                    .constraint()
                    .unwrap_or(EMAIL_UNIQUE_CONSTRAINT)
                    .to_string(),
            };
        }
    }
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (name, email, age) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(i64::from(user.age))
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        debug!(user_id = row.id, "inserted user row");
        row.try_into()
    }

    async fn select_all(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn select_by_id(&self, id: UserId) -> Result<User, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound(id))?
            .try_into()
    }

    async fn update(&self, user: User) -> Result<User, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET name = $2, email = $3, age = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(i64::from(user.age))
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(StoreError::NotFound(user.id))?
        .try_into()
    }

    async fn update_fields(&self, id: UserId, patch: UserPatch) -> Result<User, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), \
             age = COALESCE($4, age), updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.age.map(i64::from))
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(StoreError::NotFound(id))?
        .try_into()
    }

    async fn delete_by_id(&self, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
