// src/db/erp_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::erp::{ErpAccount, ErpAuthorizationRequest},
};

#[derive(Clone)]
pub struct ErpRepository {
    pool: PgPool,
}

impl ErpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_vendor(&self, vendor_id: Uuid) -> Result<Option<ErpAccount>, AppError> {
        let account = sqlx::query_as::<_, ErpAccount>("SELECT * FROM bling_accounts WHERE vendor_id = $1")
            .bind(vendor_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Leitura dentro de uma transação (com o vendedor já travado).
    pub async fn find_by_vendor_in<'e, E>(&self, executor: E, vendor_id: Uuid) -> Result<Option<ErpAccount>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let account = sqlx::query_as::<_, ErpAccount>("SELECT * FROM bling_accounts WHERE vendor_id = $1")
            .bind(vendor_id)
            .fetch_optional(executor)
            .await?;
        Ok(account)
    }

    pub async fn create_authorization_request(
        &self,
        state: Uuid,
        vendor_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<ErpAuthorizationRequest, AppError> {
        // Aproveita para limpar as solicitações do vendedor já usadas ou vencidas
        let request = sqlx::query_as::<_, ErpAuthorizationRequest>(
            r#"
            WITH purged AS (
                DELETE FROM bling_authorization_requests
                WHERE vendor_id = $2 AND (consumed_at IS NOT NULL OR expires_at <= NOW())
            )
            INSERT INTO bling_authorization_requests (state, vendor_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(state)
        .bind(vendor_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(request)
    }

    /// Consome a solicitação pendente de forma atômica (uso único).
    pub async fn consume_authorization_request(
        &self,
        state: Uuid,
        vendor_id: Uuid,
    ) -> Result<Option<ErpAuthorizationRequest>, AppError> {
        let request = sqlx::query_as::<_, ErpAuthorizationRequest>(
            r#"
            UPDATE bling_authorization_requests
            SET consumed_at = NOW()
            WHERE state = $1 AND vendor_id = $2 AND consumed_at IS NULL AND expires_at > NOW()
            RETURNING *
            "#,
        )
        .bind(state)
        .bind(vendor_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    /// Cria ou substitui os tokens do vendedor num único comando.
    pub async fn upsert_tokens<'e, E>(
        &self,
        executor: E,
        vendor_id: Uuid,
        access_token: &str,
        refresh_token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<ErpAccount, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let account = sqlx::query_as::<_, ErpAccount>(
            r#"
            INSERT INTO bling_accounts (id, vendor_id, access_token, refresh_token, token_expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (vendor_id)
            DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                token_expires_at = EXCLUDED.token_expires_at,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(vendor_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(token_expires_at)
        .fetch_one(executor)
        .await?;
        Ok(account)
    }
}
