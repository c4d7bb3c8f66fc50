// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{UserRepository, VendorRepository},
    models::auth::{AuthResponse, Claims, RegisterVendorPayload, RegisterVendorResponse, User, UserRole},
};

const SESSION_DAYS: i64 = 7;

/// Único ponto de checagem de papel. Usado pelos extratores `RequireRole<_>`.
pub fn require_role(user: &User, role: UserRole) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden(format!(
            "Acesso restrito ao perfil '{}'.",
            role.as_str()
        )));
    }
    if user.must_change_password {
        return Err(AppError::Forbidden(
            "Troque a senha provisória antes de continuar.".to_string(),
        ));
    }
    Ok(())
}

/// Página inicial de cada perfil após o login.
pub fn landing_page(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "/admin/dashboard",
        UserRole::Vendor => "/vendor/dashboard",
    }
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    vendor_repo: VendorRepository,
    jwt_secret: String,
    pool: PgPool,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        vendor_repo: VendorRepository,
        jwt_secret: String,
        pool: PgPool,
    ) -> Self {
        Self { user_repo, vendor_repo, jwt_secret, pool }
    }

    async fn hash_password(password: &str) -> Result<String, AppError> {
        let password_clone = password.to_owned();
        let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
        Ok(hashed)
    }

    async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
        let password_clone = password.to_owned();
        let password_hash_clone = password_hash.to_owned();

        // Executa a verificação em um thread separado
        let is_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
        Ok(is_valid)
    }

    // Cria User + Vendor na mesma transação
    pub async fn register_vendor(
        &self,
        payload: &RegisterVendorPayload,
    ) -> Result<RegisterVendorResponse, AppError> {
        let email = payload.email.trim().to_lowercase();

        // Checagem antecipada só para uma mensagem melhor; a UNIQUE do banco é quem garante
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("E-mail já cadastrado.".to_string()));
        }

        let hashed_password = Self::hash_password(&payload.password).await?;

        let mut tx = self.pool.begin().await?;

        let user = self
            .user_repo
            .create_user(&mut *tx, &payload.name, &email, &hashed_password, UserRole::Vendor, false)
            .await?; // Se falhar aqui, o tx sofre rollback automático no drop

        let vendor = self
            .vendor_repo
            .create_vendor(
                &mut *tx,
                user.id,
                &payload.company_name,
                payload.document.as_deref(),
                payload.phone.as_deref(),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, vendor_id = %vendor.id, "Vendedor registrado");
        Ok(RegisterVendorResponse { user, vendor })
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let email = email.trim().to_lowercase();
        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !Self::verify_password(password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        if !user.active {
            return Err(AppError::InactiveUser);
        }

        let token = self.create_token(user.id)?;
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "Login realizado");

        Ok(AuthResponse {
            token,
            role: user.role,
            must_change_password: user.must_change_password,
            redirect_to: landing_page(user.role).to_string(),
        })
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user = self
            .user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        // Usuário desativado perde a sessão na hora
        if !user.active {
            return Err(AppError::InactiveUser);
        }
        Ok(user)
    }

    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if !Self::verify_password(current_password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }
        if current_password == new_password {
            return Err(AppError::BadRequest(
                "A nova senha deve ser diferente da atual.".to_string(),
            ));
        }

        let hashed = Self::hash_password(new_password).await?;
        self.user_repo.update_password(user.id, &hashed).await?;
        tracing::info!(user_id = %user.id, "Senha alterada");
        Ok(())
    }

    /// Garante que exista um administrador. Idempotente.
    pub async fn ensure_admin(&self, email: &str, password: Option<&str>) -> Result<(), AppError> {
        let email = email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            tracing::debug!("Admin já existe.");
            return Ok(());
        }

        let generated;
        let password = match password {
            Some(p) => p,
            None => {
                generated = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(20)
                    .map(char::from)
                    .collect::<String>();
                tracing::warn!(
                    "🔑 Admin criado com senha gerada: {} / {} (troca obrigatória no primeiro acesso)",
                    email,
                    generated
                );
                generated.as_str()
            }
        };

        let hashed = Self::hash_password(password).await?;
        match self
            .user_repo
            .create_user(&self.pool, "Administrador", &email, &hashed, UserRole::Admin, true)
            .await
        {
            Ok(admin) => {
                tracing::info!(user_id = %admin.id, "✅ Administrador inicial criado");
                Ok(())
            }
            // Outra instância criou ao mesmo tempo
            Err(AppError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn create_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(SESSION_DAYS);

        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, must_change_password: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Teste".into(),
            email: "teste@fastdrop.com".into(),
            password_hash: String::new(),
            role,
            active: true,
            must_change_password,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn require_role_accepts_matching_role() {
        assert!(require_role(&user(UserRole::Admin, false), UserRole::Admin).is_ok());
        assert!(require_role(&user(UserRole::Vendor, false), UserRole::Vendor).is_ok());
    }

    #[test]
    fn require_role_rejects_other_role_as_forbidden() {
        let err = require_role(&user(UserRole::Vendor, false), UserRole::Admin).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = require_role(&user(UserRole::Admin, false), UserRole::Vendor).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn provisional_password_blocks_role_routes() {
        let err = require_role(&user(UserRole::Admin, true), UserRole::Admin).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn landing_page_depends_on_role() {
        assert_eq!(landing_page(UserRole::Admin), "/admin/dashboard");
        assert_eq!(landing_page(UserRole::Vendor), "/vendor/dashboard");
    }

    #[tokio::test]
    async fn session_token_round_trips_subject() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://fastdrop@localhost/fastdrop_test")
            .unwrap();
        let service = AuthService::new(
            UserRepository::new(pool.clone()),
            VendorRepository::new(pool.clone()),
            "segredo-de-teste".into(),
            pool,
        );

        let user_id = Uuid::new_v4();
        let token = service.create_token(user_id).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"segredo-de-teste"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, user_id);
        assert!(data.claims.exp > data.claims.iat);
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected_before_db() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://fastdrop@localhost/fastdrop_test")
            .unwrap();
        let service = AuthService::new(
            UserRepository::new(pool.clone()),
            VendorRepository::new(pool.clone()),
            "segredo-a".into(),
            pool.clone(),
        );
        let other = AuthService::new(
            UserRepository::new(pool.clone()),
            VendorRepository::new(pool.clone()),
            "segredo-b".into(),
            pool,
        );

        let token = other.create_token(Uuid::new_v4()).unwrap();
        let err = service.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    fn registration(email: &str, company_name: &str) -> RegisterVendorPayload {
        RegisterVendorPayload {
            name: "Zé".into(),
            email: email.into(),
            password: "segredo123".into(),
            company_name: company_name.into(),
            document: None,
            phone: None,
        }
    }

    #[sqlx::test]
    async fn duplicate_vendor_email_conflicts_and_keeps_first(pool: PgPool) {
        let service = AuthService::new(
            UserRepository::new(pool.clone()),
            VendorRepository::new(pool.clone()),
            "segredo-de-teste".into(),
            pool.clone(),
        );

        let first = service
            .register_vendor(&registration("loja@fastdrop.com", "Primeira"))
            .await
            .unwrap();
        assert_eq!(first.user.role, UserRole::Vendor);

        let err = service
            .register_vendor(&registration("LOJA@fastdrop.com", "Segunda"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&pool).await.unwrap();
        let vendors: Vec<String> = sqlx::query_scalar("SELECT company_name FROM vendors")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(users, 1);
        assert_eq!(vendors, vec!["Primeira".to_string()]);

        let login = service.login_user("loja@fastdrop.com", "segredo123").await.unwrap();
        assert_eq!(login.role, UserRole::Vendor);
        assert_eq!(login.redirect_to, "/vendor/dashboard");
    }
}
