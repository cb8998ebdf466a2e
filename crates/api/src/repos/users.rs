//! User repository for PostgreSQL.
//!
//! Identity is managed upstream; this repository only covers the minimal
//! surface the rate-limited registration path needs.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::models::User;

/// Repository for user registration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user, returning None when the username or email is taken.
    async fn create(&self, username: &str, email: &str) -> Result<Option<User>>;
}

/// PostgreSQL implementation of UserRepo.
#[derive(Clone)]
pub struct PgUserRepo {
    pool: Pool<Postgres>,
}

impl PgUserRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn create(&self, username: &str, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *",
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
