// src/services/erp_service.rs
//
// Conexão OAuth2 (authorization code) de cada vendedor com o Bling.
// A troca do code acontece antes da transação: se ela falhar, nenhuma linha
// é tocada. O refresh roda com o vendedor travado, porque o Bling gira o
// refresh token a cada uso.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use reqwest::Client;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::{BlingConfig, BlingCredentials},
    db::{ErpRepository, VendorRepository},
    models::{
        auth::{User, UserRole},
        erp::{ErpAccount, ErpConnectionStatus, OAuthCallbackQuery, OAuthStateClaims, TokenGrant},
        vendor::Vendor,
    },
    services::auth::require_role,
};

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
const STATE_TTL_MINUTES: i64 = 10;

pub fn token_expires_at(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    let secs = expires_in.filter(|s| *s > 0).unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    now + chrono::Duration::seconds(secs)
}

pub fn sign_state(secret: &str, claims: &OAuthStateClaims) -> Result<String, AppError> {
    Ok(encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn verify_state(secret: &str, state: &str) -> Result<OAuthStateClaims, AppError> {
    decode::<OAuthStateClaims>(
        state,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::ExternalAuth("Parâmetro state inválido ou expirado.".to_string()))
}

// ---
// Cliente HTTP do servidor OAuth
// ---

#[derive(Clone)]
pub struct BlingClient {
    http: Client,
    authorize_url: String,
    token_url: String,
}

impl BlingClient {
    pub fn new(config: &BlingConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(TOKEN_REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            authorize_url: config.authorize_url.clone(),
            token_url: config.token_url.clone(),
        })
    }

    pub fn authorization_url(&self, credentials: &BlingCredentials, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}",
            self.authorize_url,
            urlencoding::encode(&credentials.client_id),
            urlencoding::encode(&credentials.redirect_uri),
            urlencoding::encode(state),
        )
    }

    pub async fn exchange_code(
        &self,
        credentials: &BlingCredentials,
        code: &str,
    ) -> Result<TokenGrant, AppError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        self.request_token(&params).await
    }

    pub async fn refresh(
        &self,
        credentials: &BlingCredentials,
        refresh_token: &str,
    ) -> Result<TokenGrant, AppError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        self.request_token(&params).await
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenGrant, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Falha ao chamar o token endpoint do Bling");
                AppError::ExternalService("Erro ao obter token do Bling.".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Token endpoint do Bling respondeu com erro");
            return Err(AppError::ExternalService(format!(
                "Erro ao obter token do Bling (HTTP {}).",
                status.as_u16()
            )));
        }

        response.json::<TokenGrant>().await.map_err(|e| {
            tracing::error!(error = %e, "Resposta de token do Bling ilegível");
            AppError::ExternalService("Resposta inválida do Bling.".to_string())
        })
    }
}

// ---
// Serviço
// ---

#[derive(Clone)]
pub struct ErpService {
    repo: ErpRepository,
    vendor_repo: VendorRepository,
    client: BlingClient,
    credentials: Option<BlingCredentials>,
    state_secret: String,
    pool: PgPool,
}

impl ErpService {
    pub fn new(
        repo: ErpRepository,
        vendor_repo: VendorRepository,
        client: BlingClient,
        credentials: Option<BlingCredentials>,
        state_secret: String,
        pool: PgPool,
    ) -> Self {
        Self { repo, vendor_repo, client, credentials, state_secret, pool }
    }

    fn credentials(&self) -> Result<&BlingCredentials, AppError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| AppError::Configuration("Credenciais do Bling não configuradas.".to_string()))
    }

    /// Inicia o fluxo: registra a solicitação pendente e devolve a URL de autorização.
    pub async fn initiate(&self, user: &User) -> Result<String, AppError> {
        require_role(user, UserRole::Vendor)
            .map_err(|_| AppError::Forbidden("Apenas vendedores podem conectar o Bling.".to_string()))?;
        let credentials = self.credentials()?;

        let vendor = self
            .vendor_repo
            .find_by_user_id(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Perfil de vendedor não encontrado.".to_string()))?;

        let now = Utc::now();
        let request_id = Uuid::new_v4();
        let expires_at = now + chrono::Duration::minutes(STATE_TTL_MINUTES);

        self.repo
            .create_authorization_request(request_id, vendor.id, expires_at)
            .await?;

        let state = sign_state(
            &self.state_secret,
            &OAuthStateClaims {
                jti: request_id,
                vendor_id: vendor.id,
                exp: expires_at.timestamp() as usize,
                iat: now.timestamp() as usize,
            },
        )?;

        tracing::info!(vendor_id = %vendor.id, "Iniciando conexão com o Bling");
        Ok(self.client.authorization_url(credentials, &state))
    }

    pub async fn handle_callback(&self, query: &OAuthCallbackQuery) -> Result<ErpAccount, AppError> {
        // Erro vindo do servidor OAuth: nada é gravado
        if let Some(error) = query.error.as_deref() {
            tracing::warn!(error = %error, "Bling recusou a autorização");
            return Err(AppError::ExternalAuth(format!("Erro ao conectar com o Bling: {error}")));
        }

        let code = query
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::ExternalAuth("Código de autorização ausente.".to_string()))?;
        let state = query
            .state
            .as_deref()
            .ok_or_else(|| AppError::ExternalAuth("Parâmetro state ausente.".to_string()))?;

        let credentials = self.credentials()?;
        let claims = verify_state(&self.state_secret, state)?;

        // Uso único: um segundo callback com o mesmo state não passa daqui
        self.repo
            .consume_authorization_request(claims.jti, claims.vendor_id)
            .await?
            .ok_or_else(|| AppError::ExternalAuth("Autorização expirada ou já utilizada.".to_string()))?;

        let grant = self.client.exchange_code(credentials, code).await?;
        let account = self.store_grant(claims.vendor_id, &grant).await?;

        tracing::info!(vendor_id = %claims.vendor_id, "✅ Bling conectado");
        Ok(account)
    }

    /// Grava os tokens e marca o vendedor como conectado, atomicamente.
    async fn store_grant(&self, vendor_id: Uuid, grant: &TokenGrant) -> Result<ErpAccount, AppError> {
        let mut tx = self.pool.begin().await?;

        // Trava o vendedor: callbacks/refresh concorrentes ficam em fila
        self.lock_vendor(&mut tx, vendor_id).await?;
        let account = self.write_grant(&mut tx, vendor_id, grant).await?;

        tx.commit().await?;
        Ok(account)
    }

    async fn lock_vendor(&self, conn: &mut PgConnection, vendor_id: Uuid) -> Result<(), AppError> {
        self.vendor_repo
            .find_by_id_for_update(&mut *conn, vendor_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vendedor não encontrado.".to_string()))?;
        Ok(())
    }

    async fn write_grant(
        &self,
        conn: &mut PgConnection,
        vendor_id: Uuid,
        grant: &TokenGrant,
    ) -> Result<ErpAccount, AppError> {
        let expires_at = token_expires_at(Utc::now(), grant.expires_in);
        let account = self
            .repo
            .upsert_tokens(&mut *conn, vendor_id, &grant.access_token, &grant.refresh_token, expires_at)
            .await?;
        self.vendor_repo.set_bling_connected(&mut *conn, vendor_id, true).await?;
        Ok(account)
    }

    pub async fn status(&self, vendor: &Vendor) -> Result<ErpConnectionStatus, AppError> {
        let account = self.repo.find_by_vendor(vendor.id).await?;
        Ok(ErpConnectionStatus::project(
            vendor.id,
            vendor.bling_connected,
            account.as_ref(),
            Utc::now(),
        ))
    }

    /// Troca o refresh token por um par novo.
    pub async fn refresh(&self, vendor: &Vendor) -> Result<ErpAccount, AppError> {
        let credentials = self.credentials()?;
        let seen = self
            .repo
            .find_by_vendor(vendor.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bling não conectado para este vendedor.".to_string()))?;

        let mut tx = self.pool.begin().await?;
        self.lock_vendor(&mut tx, vendor.id).await?;

        let account = self
            .repo
            .find_by_vendor_in(&mut *tx, vendor.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bling não conectado para este vendedor.".to_string()))?;

        // Outro refresh girou o par enquanto esperávamos a trava
        if account.refresh_token != seen.refresh_token {
            tracing::debug!(vendor_id = %vendor.id, "Token do Bling já renovado por outra requisição");
            return Ok(account);
        }

        let grant = self.client.refresh(credentials, &account.refresh_token).await?;
        let account = self.write_grant(&mut tx, vendor.id, &grant).await?;
        tx.commit().await?;

        tracing::info!(vendor_id = %vendor.id, expires_at = %account.token_expires_at, "Token do Bling renovado");
        Ok(account)
    }
}
