// src/models/vendor.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "Loja do Zé LTDA")]
    pub company_name: String,
    #[schema(example = "12.345.678/0001-90")]
    pub document: Option<String>,
    pub phone: Option<String>,
    pub bling_connected: bool,
    pub created_at: DateTime<Utc>,
}

// Listagem do admin: vendedor + dados do usuário dono
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VendorSummary {
    pub id: Uuid,
    pub company_name: String,
    pub owner_name: String,
    pub owner_email: String,
    pub active: bool,
    pub bling_connected: bool,
    pub order_count: i64,
    pub created_at: DateTime<Utc>,
}
