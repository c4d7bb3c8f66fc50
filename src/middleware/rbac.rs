// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::{User, UserRole},
        vendor::Vendor,
    },
    services::auth::require_role,
};

/// 1. O Trait que define um perfil exigido
pub trait RoleDef: Send + Sync + 'static {
    fn role() -> UserRole;
}

/// 2. O Extractor (Guardião). Entrega o usuário já checado.
pub struct RequireRole<T> {
    pub user: User,
    _role: PhantomData<T>,
}

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        require_role(&user, T::role())?;
        Ok(RequireRole { user, _role: PhantomData })
    }
}

// ---
// DEFINIÇÃO DOS PERFIS (TIPOS)
// ---

pub struct AdminRole;
impl RoleDef for AdminRole {
    fn role() -> UserRole { UserRole::Admin }
}

pub struct VendorRole;
impl RoleDef for VendorRole {
    fn role() -> UserRole { UserRole::Vendor }
}

/// Vendedor logado, com o perfil de empresa carregado.
pub struct CurrentVendor {
    pub user: User,
    pub vendor: Vendor,
}

impl<S> FromRequestParts<S> for CurrentVendor
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireRole { user, .. } =
            RequireRole::<VendorRole>::from_request_parts(parts, state).await?;

        let app_state = AppState::from_ref(state);
        let vendor = app_state
            .vendor_repo
            .find_by_user_id(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Perfil de vendedor não encontrado.".to_string()))?;

        Ok(CurrentVendor { user, vendor })
    }
}
