// src/handlers/erp.rs
//
// Rotas do fluxo OAuth com o Bling. `connect` e `callback` são abertas pelo
// navegador, então respondem sempre com redirecionamento.

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use chrono::Utc;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::CurrentVendor,
    models::erp::{ErpConnectionStatus, OAuthCallbackQuery},
};

const VENDOR_DASHBOARD: &str = "/vendor/dashboard";
const LOGIN_PAGE: &str = "/login";

fn redirect_with_error(path: &str, error: &AppError) -> Redirect {
    Redirect::to(&format!(
        "{path}?error={}",
        urlencoding::encode(&error.public_message())
    ))
}

#[utoipa::path(
    get,
    path = "/bling/connect",
    tag = "Bling",
    responses(
        (status = 303, description = "Redireciona para a tela de autorização do Bling"),
        (status = 403, description = "Apenas vendedores")
    ),
    security(("api_jwt" = []))
)]
pub async fn connect(State(app_state): State<AppState>, current: CurrentVendor) -> Redirect {
    match app_state.erp_service.initiate(&current.user).await {
        Ok(url) => Redirect::to(&url),
        Err(e) => {
            tracing::warn!(vendor_id = %current.vendor.id, error = %e, "Não foi possível iniciar a conexão com o Bling");
            redirect_with_error(VENDOR_DASHBOARD, &e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/bling/callback",
    tag = "Bling",
    params(OAuthCallbackQuery),
    responses(
        (status = 303, description = "Volta ao painel do vendedor (ou ao login, em caso de erro do Bling)")
    )
)]
pub async fn callback(
    State(app_state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Redirect {
    match app_state.erp_service.handle_callback(&query).await {
        Ok(_) => Redirect::to(&format!("{VENDOR_DASHBOARD}?bling=connected")),
        // Erro vindo do próprio Bling volta para o login
        Err(e) if query.error.is_some() => redirect_with_error(LOGIN_PAGE, &e),
        Err(e) => {
            tracing::warn!(error = %e, "Callback do Bling recusado");
            redirect_with_error(VENDOR_DASHBOARD, &e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/bling/status",
    tag = "Bling",
    responses((status = 200, description = "Situação da conexão", body = ErpConnectionStatus)),
    security(("api_jwt" = []))
)]
pub async fn status(
    State(app_state): State<AppState>,
    current: CurrentVendor,
) -> Result<Json<ErpConnectionStatus>, AppError> {
    Ok(Json(app_state.erp_service.status(&current.vendor).await?))
}

#[utoipa::path(
    post,
    path = "/bling/refresh",
    tag = "Bling",
    responses(
        (status = 200, description = "Tokens renovados", body = ErpConnectionStatus),
        (status = 404, description = "Bling não conectado"),
        (status = 502, description = "Bling recusou a renovação")
    ),
    security(("api_jwt" = []))
)]
pub async fn refresh(
    State(app_state): State<AppState>,
    current: CurrentVendor,
) -> Result<Json<ErpConnectionStatus>, AppError> {
    let account = app_state.erp_service.refresh(&current.vendor).await?;
    Ok(Json(ErpConnectionStatus::project(
        current.vendor.id,
        true,
        Some(&account),
        Utc::now(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn error_redirect_carries_encoded_message() {
        let response = redirect_with_error(
            LOGIN_PAGE,
            &AppError::ExternalAuth("Erro ao conectar com o Bling: access_denied".into()),
        )
        .into_response();

        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("/login?error="));
        assert!(location.contains("access_denied"));
        assert!(!location.contains(' '));
    }
}
