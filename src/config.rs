// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{CatalogRepository, DashboardRepository, ErpRepository, OrderRepository, UserRepository, VendorRepository},
    services::{
        auth::AuthService,
        catalog_service::CatalogService,
        erp_service::{BlingClient, ErpService},
        order_service::OrderService,
        storage::{BlobStore, S3BlobStore},
    },
};

pub const DEFAULT_BLING_AUTHORIZE_URL: &str = "https://www.bling.com.br/Api/v3/oauth/authorize";
pub const DEFAULT_BLING_TOKEN_URL: &str = "https://www.bling.com.br/Api/v3/oauth/token";
const DEFAULT_ADMIN_EMAIL: &str = "admin@fastdrop.com";

#[derive(Debug, Clone)]
pub struct BlingCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct BlingConfig {
    /// `None` quando alguma das três variáveis não foi definida.
    pub credentials: Option<BlingCredentials>,
    pub authorize_url: String,
    pub token_url: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: Option<String>,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub bind_addr: String,
    pub admin_email: String,
    pub admin_password: Option<String>,
    pub s3: Option<S3Config>,
    pub bling: BlingConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de qualquer fonte chave -> valor.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Variáveis vazias contam como ausentes
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL deve ser definida"))?;
        let secret_key = get("SECRET_KEY").ok_or_else(|| anyhow!("SECRET_KEY deve ser definida"))?;

        let credentials = match (
            get("BLING_CLIENT_ID"),
            get("BLING_CLIENT_SECRET"),
            get("BLING_REDIRECT_URI"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Some(BlingCredentials {
                client_id,
                client_secret,
                redirect_uri,
            }),
            _ => None,
        };

        let s3 = get("S3_BUCKET").map(|bucket| S3Config {
            bucket,
            region: get("AWS_REGION"),
            public_base_url: get("S3_PUBLIC_BASE_URL"),
        });

        Ok(Self {
            database_url,
            secret_key,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            admin_email: get("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            admin_password: get("ADMIN_PASSWORD"),
            s3,
            bling: BlingConfig {
                credentials,
                authorize_url: get("BLING_AUTHORIZE_URL")
                    .unwrap_or_else(|| DEFAULT_BLING_AUTHORIZE_URL.to_string()),
                token_url: get("BLING_TOKEN_URL").unwrap_or_else(|| DEFAULT_BLING_TOKEN_URL.to_string()),
            },
        })
    }
}

// O estado compartilhado, montado uma vez no start e injetado em todos os handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub auth_service: AuthService,
    pub catalog_service: CatalogService,
    pub order_service: OrderService,
    pub erp_service: ErpService,
    pub vendor_repo: VendorRepository,
    pub dashboard_repo: DashboardRepository,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let blob_store: Option<Arc<dyn BlobStore>> = match &config.s3 {
            Some(s3) => {
                let store = S3BlobStore::from_config(s3).await;
                tracing::info!(bucket = %s3.bucket, "Armazenamento de imagens habilitado (S3)");
                Some(Arc::new(store))
            }
            None => {
                tracing::warn!("S3_BUCKET não definido: upload de imagens desabilitado");
                None
            }
        };

        if config.bling.credentials.is_none() {
            tracing::warn!("Credenciais do Bling não configuradas: conexão com o ERP bloqueada");
        }

        Self::from_parts(db_pool, config, blob_store)
    }

    // --- Monta o gráfico de dependências ---
    pub fn from_parts(
        db_pool: PgPool,
        config: Config,
        blob_store: Option<Arc<dyn BlobStore>>,
    ) -> anyhow::Result<Self> {
        let user_repo = UserRepository::new(db_pool.clone());
        let vendor_repo = VendorRepository::new(db_pool.clone());
        let catalog_repo = CatalogRepository::new(db_pool.clone());
        let order_repo = OrderRepository::new(db_pool.clone());
        let erp_repo = ErpRepository::new(db_pool.clone());
        let dashboard_repo = DashboardRepository::new(db_pool.clone());

        let auth_service = AuthService::new(
            user_repo,
            vendor_repo.clone(),
            config.secret_key.clone(),
            db_pool.clone(),
        );
        let catalog_service = CatalogService::new(catalog_repo.clone(), db_pool.clone(), blob_store);
        let order_service = OrderService::new(order_repo, catalog_repo, db_pool.clone());
        let bling_client = BlingClient::new(&config.bling)?;
        let erp_service = ErpService::new(
            erp_repo,
            vendor_repo.clone(),
            bling_client,
            config.bling.credentials.clone(),
            config.secret_key.clone(),
            db_pool.clone(),
        );

        Ok(Self {
            db_pool,
            config: Arc::new(config),
            auth_service,
            catalog_service,
            order_service,
            erp_service,
            vendor_repo,
            dashboard_repo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn requires_database_url_and_secret_key() {
        assert!(Config::from_lookup(lookup(&[("SECRET_KEY", "s")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).is_err());
    }

    #[test]
    fn optional_integrations_default_to_disabled() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SECRET_KEY", "s"),
        ]))
        .unwrap();

        assert!(config.s3.is_none());
        assert!(config.bling.credentials.is_none());
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.admin_email, "admin@fastdrop.com");
        assert_eq!(config.bling.token_url, DEFAULT_BLING_TOKEN_URL);
    }

    #[test]
    fn partial_bling_credentials_count_as_unconfigured() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SECRET_KEY", "s"),
            ("BLING_CLIENT_ID", "id"),
            ("BLING_REDIRECT_URI", "https://app/bling/callback"),
            ("BLING_CLIENT_SECRET", "   "),
        ]))
        .unwrap();
        assert!(config.bling.credentials.is_none());
    }

    #[test]
    fn full_configuration_is_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SECRET_KEY", "s"),
            ("BLING_CLIENT_ID", "id"),
            ("BLING_CLIENT_SECRET", "secret"),
            ("BLING_REDIRECT_URI", "https://app/bling/callback"),
            ("S3_BUCKET", "fastdrop-images"),
            ("AWS_REGION", "sa-east-1"),
        ]))
        .unwrap();

        let creds = config.bling.credentials.unwrap();
        assert_eq!(creds.client_id, "id");
        let s3 = config.s3.unwrap();
        assert_eq!(s3.bucket, "fastdrop-images");
        assert_eq!(s3.region.as_deref(), Some("sa-east-1"));
    }
}
