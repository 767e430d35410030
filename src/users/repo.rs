use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use crate::users::error::{Result, UserError};
use crate::users::repo_types::{NewUser, User, UserChanges};

/// Row storage for users. Implementations neither validate nor hash; callers
/// go through `users::services`, which runs both before any write.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, new_user: NewUser) -> Result<User>;
    async fn update(&self, id: i32, changes: UserChanges) -> Result<User>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list(&self) -> Result<Vec<User>>;
    async fn delete(&self, id: i32) -> Result<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_error(e: sqlx::Error) -> UserError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            warn!(constraint = ?db.constraint(), "unique violation on user write");
            UserError::EmailTaken
        }
        _ => UserError::Database(e),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, new_user: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO "user" (username, email, password)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_error)?;
        Ok(user)
    }

    async fn update(&self, id: i32, changes: UserChanges) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE "user"
               SET username = COALESCE($2, username),
                   email    = COALESCE($3, email),
                   password = COALESCE($4, password)
             WHERE id = $1
            RETURNING id, username, email, password
            "#,
        )
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.password)
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_error)?;
        user.ok_or(UserError::NotFound)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, password FROM "user" WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, password FROM "user" WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"SELECT id, username, email, password FROM "user" ORDER BY id"#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn delete(&self, id: i32) -> Result<bool> {
        let res = sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
pub use memory::MemoryUserStore;
