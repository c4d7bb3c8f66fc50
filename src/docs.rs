// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(title = "FastDrop API", description = "Back-office de dropshipping: catálogo, pedidos e integração com o Bling"),
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::register_vendor,
        handlers::auth::logout,
        handlers::auth::change_password,

        // --- Users ---
        handlers::auth::get_me,

        // --- Admin ---
        handlers::admin::dashboard,
        handlers::admin::list_products,
        handlers::admin::create_product,
        handlers::admin::update_product,
        handlers::admin::toggle_product,
        handlers::admin::delete_product,
        handlers::admin::set_stock,
        handlers::admin::list_orders,
        handlers::admin::get_order,
        handlers::admin::update_order_status,
        handlers::admin::record_payment,
        handlers::admin::update_payment_status,
        handlers::admin::list_vendors,

        // --- Vendor ---
        handlers::vendor::dashboard,
        handlers::vendor::catalog,
        handlers::vendor::list_orders,
        handlers::vendor::create_order,
        handlers::vendor::get_order,
        handlers::vendor::cancel_order,

        // --- Bling ---
        handlers::erp::connect,
        handlers::erp::callback,
        handlers::erp::status,
        handlers::erp::refresh,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::RegisterVendorPayload,
            models::auth::LoginUserPayload,
            models::auth::ChangePasswordPayload,
            models::auth::AuthResponse,
            models::auth::RegisterVendorResponse,
            models::auth::MeResponse,
            models::auth::MessageResponse,

            // --- Vendedores ---
            models::vendor::Vendor,
            models::vendor::VendorSummary,

            // --- Catálogo ---
            models::catalog::Product,
            models::catalog::ProductStock,
            models::catalog::StockLevel,
            models::catalog::ProductView,
            models::catalog::ProductPayload,
            models::catalog::SetStockPayload,

            // --- Pedidos ---
            models::orders::OrderOrigin,
            models::orders::OrderStatus,
            models::orders::PaymentStatus,
            models::orders::Order,
            models::orders::OrderItem,
            models::orders::Payment,
            models::orders::OrderDetail,
            models::orders::OrderItemPayload,
            models::orders::CreateOrderPayload,
            models::orders::UpdateOrderStatusPayload,
            models::orders::RecordPaymentPayload,
            models::orders::UpdatePaymentStatusPayload,

            // --- ERP ---
            models::erp::ErpAccount,
            models::erp::ErpConnectionStatus,

            // --- DASHBOARD ---
            models::dashboard::AdminDashboard,
            models::dashboard::VendorDashboard,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário e Perfil"),
        (name = "Admin", description = "Catálogo, Pedidos e Vendedores (administrador)"),
        (name = "Vendor", description = "Catálogo e Pedidos do Vendedor"),
        (name = "Bling", description = "Conexão OAuth com o ERP Bling")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_group_is_documented() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/login",
            "/register-vendor",
            "/me",
            "/admin/products",
            "/admin/products/{id}/stock",
            "/admin/orders/{id}/status",
            "/admin/payments/{id}/status",
            "/vendor/orders",
            "/vendor/orders/{id}/cancel",
            "/bling/connect",
            "/bling/callback",
        ] {
            assert!(paths.contains_key(path), "Rota sem documentação: {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
        assert!(components.schemas.contains_key("OrderDetail"));
    }
}
