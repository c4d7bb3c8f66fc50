// src/models/dashboard.rs

use serde::Serialize;
use utoipa::ToSchema;

// Contadores do painel do admin
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub product_count: i64,
    pub vendor_count: i64,
    pub pending_orders: i64,
}

// Painel do vendedor
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VendorDashboard {
    pub order_count: i64,
    pub pending_orders: i64,
    pub bling_connected: bool,
}
