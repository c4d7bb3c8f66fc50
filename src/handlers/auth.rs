// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{AuthenticatedUser, SESSION_COOKIE},
    models::auth::{
        AuthResponse, ChangePasswordPayload, LoginUserPayload, MeResponse, MessageResponse,
        RegisterVendorPayload, RegisterVendorResponse, UserRole,
    },
};

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

// Handler de login
#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    request_body = LoginUserPayload,
    responses(
        (status = 200, description = "Login realizado, cookie de sessão definido", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas ou usuário inativo")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let auth = app_state
        .auth_service
        .login_user(&payload.email, &payload.password)
        .await?;

    let jar = jar.add(session_cookie(auth.token.clone()));
    Ok((jar, Json(auth)))
}

// Handler de registro do vendedor
#[utoipa::path(
    post,
    path = "/register-vendor",
    tag = "Auth",
    request_body = RegisterVendorPayload,
    responses(
        (status = 201, description = "Vendedor registrado", body = RegisterVendorResponse),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "E-mail já cadastrado")
    )
)]
pub async fn register_vendor(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterVendorPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let registered = app_state.auth_service.register_vendor(&payload).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

#[utoipa::path(
    get,
    path = "/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Sessão encerrada", body = MessageResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    (jar, Json(MessageResponse::new("Sessão encerrada.")))
}

#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "Auth",
    request_body = ChangePasswordPayload,
    responses(
        (status = 200, description = "Senha alterada", body = MessageResponse),
        (status = 401, description = "Senha atual incorreta")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_password(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;

    app_state
        .auth_service
        .change_password(&user, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(MessageResponse::new("Senha alterada com sucesso.")))
}

// Handler da rota protegida /me
#[utoipa::path(
    get,
    path = "/me",
    tag = "Users",
    responses(
        (status = 200, description = "Usuário logado", body = MeResponse),
        (status = 401, description = "Não autenticado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<MeResponse>, AppError> {
    let vendor = match user.role {
        UserRole::Vendor => app_state.vendor_repo.find_by_user_id(user.id).await?,
        UserRole::Admin => None,
    };
    Ok(Json(MeResponse { user, vendor }))
}
