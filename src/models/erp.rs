// src/models/erp.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Conexão OAuth de um vendedor com o ERP (tabela bling_accounts).
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErpAccount {
    pub id: Uuid,
    pub vendor_id: Uuid,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ErpAccount {
    /// O token ainda vale por pelo menos `margin_secs` segundos?
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        self.token_expires_at - chrono::Duration::seconds(margin_secs) > now
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ErpAuthorizationRequest {
    pub state: Uuid,
    pub vendor_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// Resposta do endpoint /oauth/token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
}

// Claims do `state` assinado enviado ao servidor OAuth
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthStateClaims {
    pub jti: Uuid,       // ID da solicitação pendente
    pub vendor_id: Uuid,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErpConnectionStatus {
    pub vendor_id: Uuid,
    pub connected: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ErpConnectionStatus {
    pub fn project(vendor_id: Uuid, connected: bool, account: Option<&ErpAccount>, now: DateTime<Utc>) -> Self {
        ErpConnectionStatus {
            vendor_id,
            connected: connected && account.is_some(),
            token_expires_at: account.map(|a| a.token_expires_at),
            expired: account.map(|a| !a.is_fresh_at(now, 0)).unwrap_or(false),
            updated_at: account.map(|a| a.updated_at),
        }
    }
}

// Query string de GET /bling/callback
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
