// src/db/dashboard_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::dashboard::{AdminDashboard, VendorDashboard},
};

#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn admin_summary(&self) -> Result<AdminDashboard, AppError> {
        // Um único round-trip com subqueries
        let (product_count, vendor_count, pending_orders): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products),
                (SELECT COUNT(*) FROM vendors),
                (SELECT COUNT(*) FROM orders WHERE status = 'pending')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminDashboard {
            product_count,
            vendor_count,
            pending_orders,
        })
    }

    pub async fn vendor_summary(&self, vendor_id: Uuid, bling_connected: bool) -> Result<VendorDashboard, AppError> {
        let (order_count, pending_orders): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'pending')
            FROM orders
            WHERE vendor_id = $1
            "#,
        )
        .bind(vendor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(VendorDashboard {
            order_count,
            pending_orders,
            bling_connected,
        })
    }
}
