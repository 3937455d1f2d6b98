//! Database operations for the POS credential pair.

use async_trait::async_trait;
use sqlx::PgPool;

use tillsync_core::TokenPair;

use super::{CredentialStore, RepositoryError};

/// Fixed storage key: there is exactly one live credential pair.
const CREDENTIAL_KEY: &str = "lightspeed";

/// Postgres-backed credential store.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn load(&self) -> Result<Option<TokenPair>, RepositoryError> {
        let record = sqlx::query_scalar::<_, String>(
            r"SELECT record FROM pos_credentials WHERE credential_key = $1",
        )
        .bind(CREDENTIAL_KEY)
        .fetch_optional(&self.pool)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        match serde_json::from_str::<TokenPair>(&record) {
            Ok(pair) => Ok(Some(pair)),
            Err(e) => {
                // Never trust a partial pair: drop the record and report absent.
                tracing::warn!(error = %e, "deleting malformed credential record");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), RepositoryError> {
        let record = serde_json::to_string(pair)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO pos_credentials (credential_key, record, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (credential_key)
            DO UPDATE SET record = EXCLUDED.record, updated_at = NOW()
            ",
        )
        .bind(CREDENTIAL_KEY)
        .bind(record)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        sqlx::query(r"DELETE FROM pos_credentials WHERE credential_key = $1")
            .bind(CREDENTIAL_KEY)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
