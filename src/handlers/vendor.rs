// src/handlers/vendor.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::CurrentVendor,
    models::{
        catalog::ProductView,
        dashboard::VendorDashboard,
        orders::{CreateOrderPayload, Order, OrderDetail},
    },
};

#[utoipa::path(
    get,
    path = "/vendor/dashboard",
    tag = "Vendor",
    responses((status = 200, description = "Resumo do vendedor", body = VendorDashboard)),
    security(("api_jwt" = []))
)]
pub async fn dashboard(
    State(app_state): State<AppState>,
    current: CurrentVendor,
) -> Result<Json<VendorDashboard>, AppError> {
    let summary = app_state
        .dashboard_repo
        .vendor_summary(current.vendor.id, current.vendor.bling_connected)
        .await?;
    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/vendor/catalog",
    tag = "Vendor",
    responses((status = 200, description = "Produtos ativos com saldo disponível", body = Vec<ProductView>)),
    security(("api_jwt" = []))
)]
pub async fn catalog(
    State(app_state): State<AppState>,
    _current: CurrentVendor,
) -> Result<Json<Vec<ProductView>>, AppError> {
    Ok(Json(app_state.catalog_service.list_catalog().await?))
}

#[utoipa::path(
    get,
    path = "/vendor/orders",
    tag = "Vendor",
    responses((status = 200, description = "Pedidos do vendedor, mais recentes primeiro", body = Vec<Order>)),
    security(("api_jwt" = []))
)]
pub async fn list_orders(
    State(app_state): State<AppState>,
    current: CurrentVendor,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(app_state.order_service.list_for_vendor(current.vendor.id).await?))
}

#[utoipa::path(
    post,
    path = "/vendor/orders",
    tag = "Vendor",
    request_body = CreateOrderPayload,
    responses(
        (status = 201, description = "Pedido criado e estoque reservado", body = OrderDetail),
        (status = 404, description = "Produto não encontrado"),
        (status = 409, description = "Estoque insuficiente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_order(
    State(app_state): State<AppState>,
    current: CurrentVendor,
    Json(payload): Json<CreateOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let order = app_state
        .order_service
        .create_order(&current.vendor, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    get,
    path = "/vendor/orders/{id}",
    tag = "Vendor",
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Pedido com itens e pagamentos", body = OrderDetail),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    current: CurrentVendor,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(app_state.order_service.get_order(id, Some(current.vendor.id)).await?))
}

#[utoipa::path(
    post,
    path = "/vendor/orders/{id}/cancel",
    tag = "Vendor",
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Pedido cancelado, reserva devolvida", body = Order),
        (status = 409, description = "Pedido já expedido ou finalizado")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_order(
    State(app_state): State<AppState>,
    current: CurrentVendor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(app_state.order_service.cancel(&current.vendor, id).await?))
}
