//src/main.rs

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;
use crate::services::storage::MAX_IMAGE_SIZE;

// Imagem (5MB) + campos do formulário
const MAX_BODY_SIZE: usize = MAX_IMAGE_SIZE + 1024 * 1024;

pub fn build_router(app_state: AppState) -> Router {
    // Rotas públicas
    let public_routes = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/login", post(handlers::auth::login))
        .route("/register-vendor", post(handlers::auth::register_vendor))
        // O Bling chama de volta pelo navegador; a autenticação é o `state` assinado
        .route("/bling/callback", get(handlers::erp::callback));

    let admin_routes = Router::new()
        .route("/dashboard", get(handlers::admin::dashboard))
        .route(
            "/products",
            get(handlers::admin::list_products).post(handlers::admin::create_product),
        )
        .route("/products/{id}/edit", post(handlers::admin::update_product))
        .route("/products/{id}/toggle", post(handlers::admin::toggle_product))
        .route("/products/{id}/delete", post(handlers::admin::delete_product))
        .route("/products/{id}/stock", post(handlers::admin::set_stock))
        .route("/orders", get(handlers::admin::list_orders))
        .route("/orders/{id}", get(handlers::admin::get_order))
        .route("/orders/{id}/status", post(handlers::admin::update_order_status))
        .route("/orders/{id}/payments", post(handlers::admin::record_payment))
        .route("/payments/{id}/status", post(handlers::admin::update_payment_status))
        .route("/vendors", get(handlers::admin::list_vendors));

    let vendor_routes = Router::new()
        .route("/dashboard", get(handlers::vendor::dashboard))
        .route("/catalog", get(handlers::vendor::catalog))
        .route(
            "/orders",
            get(handlers::vendor::list_orders).post(handlers::vendor::create_order),
        )
        .route("/orders/{id}", get(handlers::vendor::get_order))
        .route("/orders/{id}/cancel", post(handlers::vendor::cancel_order));

    // Tudo aqui exige sessão; o perfil é checado pelos extratores de cada handler
    let protected_routes = Router::new()
        .route("/logout", get(handlers::auth::logout))
        .route("/auth/change-password", post(handlers::auth::change_password))
        .route("/me", get(handlers::auth::get_me))
        .route("/bling/connect", get(handlers::erp::connect))
        .route("/bling/status", get(handlers::erp::status))
        .route("/bling/refresh", post(handlers::erp::refresh))
        .nest("/admin", admin_routes)
        .nest("/vendor", vendor_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG manda; sem ele, info para o nosso crate
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fastdrop=info")),
        )
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = Config::from_env()?;
    let bind_addr = config.bind_addr.clone();

    let app_state = AppState::new(config)
        .await
        .context("Falha ao inicializar o estado da aplicação.")?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados.")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    app_state
        .auth_service
        .ensure_admin(
            &app_state.config.admin_email,
            app_state.config.admin_password.as_deref(),
        )
        .await
        .context("Falha ao garantir o administrador inicial.")?;

    let app = build_router(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Falha ao iniciar o listener TCP em {bind_addr}"))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app)
        .await
        .context("Erro no servidor Axum")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    // Nenhum destes testes chega ao banco: o pool é preguiçoso e nunca conecta.
    fn test_app() -> Router {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://fastdrop@localhost/fastdrop_test".to_string()),
            "SECRET_KEY" => Some("segredo-de-teste".to_string()),
            _ => None,
        })
        .unwrap();
        let pool = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
        let state = AppState::from_parts(pool, config, None).unwrap();
        build_router(state)
    }

    async fn send(app: Router, request: Request<Body>) -> axum::response::Response {
        app.oneshot(request).await.unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = send(test_app(), get_request("/api/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn protected_routes_require_session() {
        for uri in ["/me", "/admin/dashboard", "/vendor/orders", "/bling/status", "/logout"] {
            let response = send(test_app(), get_request(uri)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let request = Request::builder()
            .uri("/admin/products")
            .header(header::AUTHORIZATION, "Bearer nao-e-um-jwt")
            .body(Body::empty())
            .unwrap();
        let response = send(test_app(), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn garbage_session_cookie_is_rejected() {
        let request = Request::builder()
            .uri("/vendor/catalog")
            .header(header::COOKIE, "session=lixo")
            .body(Body::empty())
            .unwrap();
        let response = send(test_app(), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_login_payload_is_400_with_details() {
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"nao-e-email","password":""}"#))
            .unwrap();
        let response = send(test_app(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["details"]["email"].is_array());
        assert!(json["details"]["password"].is_array());
    }

    #[tokio::test]
    async fn callback_with_provider_error_redirects_to_login() {
        let response = send(
            test_app(),
            get_request("/bling/callback?error=access_denied&state=qualquer"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("/login?error="));
    }

    #[tokio::test]
    async fn callback_with_forged_state_redirects_with_error() {
        let response = send(
            test_app(),
            get_request("/bling/callback?code=abc&state=forjado"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.contains("error="));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let response = send(test_app(), get_request("/api-docs/openapi.json")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
