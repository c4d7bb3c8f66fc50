// src/handlers/admin.rs

use std::str::FromStr;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{AdminRole, RequireRole},
    models::{
        auth::MessageResponse,
        catalog::{ImageUpload, Product, ProductPayload, ProductStock, ProductView, SetStockPayload},
        dashboard::AdminDashboard,
        orders::{
            Order, OrderDetail, Payment, RecordPaymentPayload, UpdateOrderStatusPayload,
            UpdatePaymentStatusPayload,
        },
        vendor::VendorSummary,
    },
};

type Admin = RequireRole<AdminRole>;

// ---
// Formulário multipart de produto
// ---

/// Aceita "10.50" e "10,50".
fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, AppError> {
    let normalized = raw.trim().replace(',', ".");
    Decimal::from_str(&normalized)
        .map_err(|_| AppError::BadRequest(format!("Valor inválido para '{field}': {raw}")))
}

fn parse_optional_decimal(field: &str, raw: &str) -> Result<Option<Decimal>, AppError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_decimal(field, raw).map(Some)
}

fn parse_quantity(field: &str, raw: &str) -> Result<i32, AppError> {
    if raw.trim().is_empty() {
        return Ok(0);
    }
    raw.trim()
        .parse::<i32>()
        .map_err(|_| AppError::BadRequest(format!("Quantidade inválida para '{field}': {raw}")))
}

/// Campos de texto do formulário aplicados sobre o payload.
fn apply_form_field(payload: &mut ProductPayload, name: &str, value: &str) -> Result<(), AppError> {
    match name {
        "sku" => payload.sku = value.trim().to_string(),
        "name" => payload.name = value.trim().to_string(),
        "description" => {
            payload.description = Some(value.trim().to_string()).filter(|d| !d.is_empty())
        }
        "cost_price" | "costPrice" => payload.cost_price = parse_decimal(name, value)?,
        "wholesale_price" | "wholesalePrice" => payload.wholesale_price = parse_decimal(name, value)?,
        "suggested_price" | "suggestedPrice" => {
            payload.suggested_price = parse_optional_decimal(name, value)?
        }
        "weight" => payload.weight = parse_optional_decimal(name, value)?,
        "width" => payload.width = parse_optional_decimal(name, value)?,
        "height" => payload.height = parse_optional_decimal(name, value)?,
        "length" => payload.length = parse_optional_decimal(name, value)?,
        "initial_stock" | "initialStock" => payload.initial_stock = parse_quantity(name, value)?,
        other => tracing::debug!(field = %other, "Campo de formulário ignorado"),
    }
    Ok(())
}

async fn read_product_form(mut multipart: Multipart) -> Result<(ProductPayload, Option<ImageUpload>), AppError> {
    let mut payload = ProductPayload::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Formulário inválido: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Falha ao ler a imagem: {e}")))?;
            image = Some(ImageUpload { file_name, content_type, bytes: bytes.to_vec() });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("Falha ao ler o campo '{name}': {e}")))?;
        apply_form_field(&mut payload, &name, &value)?;
    }

    Ok((payload, image))
}

// ---
// Painel
// ---

#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "Admin",
    responses((status = 200, description = "Contadores gerais", body = AdminDashboard)),
    security(("api_jwt" = []))
)]
pub async fn dashboard(
    State(app_state): State<AppState>,
    _admin: Admin,
) -> Result<Json<AdminDashboard>, AppError> {
    Ok(Json(app_state.dashboard_repo.admin_summary().await?))
}

// ---
// Produtos
// ---

#[utoipa::path(
    get,
    path = "/admin/products",
    tag = "Admin",
    responses((status = 200, description = "Todos os produtos com saldo", body = Vec<ProductView>)),
    security(("api_jwt" = []))
)]
pub async fn list_products(
    State(app_state): State<AppState>,
    _admin: Admin,
) -> Result<Json<Vec<ProductView>>, AppError> {
    Ok(Json(app_state.catalog_service.list_products().await?))
}

#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "Admin",
    request_body(content = ProductPayload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Produto criado", body = ProductView),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "SKU já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    _admin: Admin,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (payload, image) = read_product_form(multipart).await?;
    payload.validate()?;

    let product = app_state.catalog_service.create_product(&payload, image).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    post,
    path = "/admin/products/{id}/edit",
    tag = "Admin",
    request_body(content = ProductPayload, content_type = "multipart/form-data"),
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto atualizado", body = ProductView),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<ProductView>, AppError> {
    let (payload, image) = read_product_form(multipart).await?;
    payload.validate()?;

    Ok(Json(app_state.catalog_service.update_product(id, &payload, image).await?))
}

#[utoipa::path(
    post,
    path = "/admin/products/{id}/toggle",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses((status = 200, description = "Flag 'active' invertida", body = Product)),
    security(("api_jwt" = []))
)]
pub async fn toggle_product(
    State(app_state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(app_state.catalog_service.toggle_active(id).await?))
}

#[utoipa::path(
    post,
    path = "/admin/products/{id}/delete",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto excluído", body = MessageResponse),
        (status = 409, description = "Produto com pedidos; desative em vez de excluir")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_product(
    State(app_state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    app_state.catalog_service.delete_product(id).await?;
    Ok(Json(MessageResponse::new("Produto excluído.")))
}

#[utoipa::path(
    post,
    path = "/admin/products/{id}/stock",
    tag = "Admin",
    request_body = SetStockPayload,
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Saldo ajustado", body = ProductStock),
        (status = 409, description = "Quantidade abaixo do reservado")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_stock(
    State(app_state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStockPayload>,
) -> Result<Json<ProductStock>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.catalog_service.set_stock(id, payload.total_quantity).await?))
}

// ---
// Pedidos e pagamentos
// ---

#[utoipa::path(
    get,
    path = "/admin/orders",
    tag = "Admin",
    responses((status = 200, description = "Todos os pedidos, mais recentes primeiro", body = Vec<Order>)),
    security(("api_jwt" = []))
)]
pub async fn list_orders(
    State(app_state): State<AppState>,
    _admin: Admin,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(app_state.order_service.list_all().await?))
}

#[utoipa::path(
    get,
    path = "/admin/orders/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Pedido com itens e pagamentos", body = OrderDetail),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(app_state.order_service.get_order(id, None).await?))
}

#[utoipa::path(
    post,
    path = "/admin/orders/{id}/status",
    tag = "Admin",
    request_body = UpdateOrderStatusPayload,
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Status alterado", body = Order),
        (status = 409, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_order_status(
    State(app_state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusPayload>,
) -> Result<Json<Order>, AppError> {
    payload.validate()?;

    let order = app_state
        .order_service
        .update_status(id, payload.status, payload.tracking_code.as_deref(), None)
        .await?;
    Ok(Json(order))
}

#[utoipa::path(
    post,
    path = "/admin/orders/{id}/payments",
    tag = "Admin",
    request_body = RecordPaymentPayload,
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses((status = 201, description = "Pagamento registrado", body = Payment)),
    security(("api_jwt" = []))
)]
pub async fn record_payment(
    State(app_state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordPaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let payment = app_state.order_service.record_payment(id, &payload).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

#[utoipa::path(
    post,
    path = "/admin/payments/{id}/status",
    tag = "Admin",
    request_body = UpdatePaymentStatusPayload,
    params(("id" = Uuid, Path, description = "ID do pagamento")),
    responses(
        (status = 200, description = "Status do pagamento alterado", body = Payment),
        (status = 409, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_payment_status(
    State(app_state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentStatusPayload>,
) -> Result<Json<Payment>, AppError> {
    payload.validate()?;

    let payment = app_state
        .order_service
        .update_payment_status(id, payload.status, payload.raw_response.as_deref())
        .await?;
    Ok(Json(payment))
}

// ---
// Vendedores
// ---

#[utoipa::path(
    get,
    path = "/admin/vendors",
    tag = "Admin",
    responses((status = 200, description = "Vendedores com contagem de pedidos", body = Vec<VendorSummary>)),
    security(("api_jwt" = []))
)]
pub async fn list_vendors(
    State(app_state): State<AppState>,
    _admin: Admin,
) -> Result<Json<Vec<VendorSummary>>, AppError> {
    Ok(Json(app_state.vendor_repo.list_summaries().await?))
}
