//! # Credential Repository
//!
//! Operator unlock credentials. The check distinguishes an unknown user from
//! a wrong password so the operator gets an actionable message.

use sqlx::{Row, SqlitePool};

use crate::error::DbResult;

/// Outcome of a credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    Valid,
    UnknownUser,
    WrongPassword,
}

/// Repository for operator credentials.
#[derive(Debug, Clone)]
pub struct AuthRepository {
    pool: SqlitePool,
}

impl AuthRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuthRepository { pool }
    }

    /// Checks a username/password pair against the local credential table.
    pub async fn validate(&self, username: &str, password: &str) -> DbResult<CredentialCheck> {
        let row = sqlx::query("SELECT password FROM credentials WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(CredentialCheck::UnknownUser);
        };

        let stored: String = row.try_get("password")?;
        if stored == password {
            Ok(CredentialCheck::Valid)
        } else {
            Ok(CredentialCheck::WrongPassword)
        }
    }

    /// Adds a credential row. Managed out of band, not by the operator UI.
    pub async fn insert(&self, username: &str, password: &str) -> DbResult<()> {
        sqlx::query("INSERT INTO credentials (username, password) VALUES (?, ?)")
            .bind(username)
            .bind(password)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
