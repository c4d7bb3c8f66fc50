// src/db/vendor_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::vendor::{Vendor, VendorSummary},
};

#[derive(Clone)]
pub struct VendorRepository {
    pool: PgPool,
}

impl VendorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_vendor<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        company_name: &str,
        document: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vendor, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Vendor>(
            r#"
            INSERT INTO vendors (id, user_id, company_name, document, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(company_name)
        .bind(document)
        .bind(phone)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, "Usuário já possui um perfil de vendedor."))
    }

    pub async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Vendor>, AppError> {
        let vendor = sqlx::query_as::<_, Vendor>("SELECT * FROM vendors WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vendor)
    }

    /// Trava a linha do vendedor até o fim da transação.
    pub async fn find_by_id_for_update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Vendor>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let vendor = sqlx::query_as::<_, Vendor>("SELECT * FROM vendors WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(vendor)
    }

    pub async fn set_bling_connected<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        connected: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE vendors SET bling_connected = $2 WHERE id = $1")
            .bind(id)
            .bind(connected)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn list_summaries(&self) -> Result<Vec<VendorSummary>, AppError> {
        let vendors = sqlx::query_as::<_, VendorSummary>(
            r#"
            SELECT
                v.id, v.company_name,
                u.name AS owner_name, u.email AS owner_email, u.active,
                v.bling_connected,
                (SELECT COUNT(*) FROM orders o WHERE o.vendor_id = v.id) AS order_count,
                v.created_at
            FROM vendors v
            JOIN users u ON u.id = v.user_id
            ORDER BY v.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(vendors)
    }
}
