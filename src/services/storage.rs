// src/services/storage.rs

use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};
use uuid::Uuid;

use crate::{common::error::AppError, config::S3Config};

/// Prefixo das imagens de produto no bucket
const PRODUCT_IMAGE_PREFIX: &str = "products";

/// Tamanho máximo aceito (5MB)
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

pub const SUPPORTED_IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Armazenamento de objetos: grava por chave e devolve a URL pública.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Extensão normalizada a partir do nome do arquivo.
pub fn image_extension(file_name: Option<&str>) -> Option<String> {
    let name = file_name?;
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| SUPPORTED_IMAGE_FORMATS.contains(&e.as_str()))
}

/// products/{uuid}.{ext} — chave aleatória, nunca colide.
pub fn product_image_key(extension: &str) -> String {
    format!("{PRODUCT_IMAGE_PREFIX}/{}.{extension}", Uuid::new_v4())
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[derive(Clone)]
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3BlobStore {
    pub async fn from_config(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let aws_config = loader.load().await;

        let region = aws_config
            .region()
            .map(|r| r.to_string())
            .or_else(|| config.region.clone())
            .unwrap_or_else(|| "us-east-1".to_string());

        Self {
            client: S3Client::new(&aws_config),
            public_base_url: public_base_url(config, &region),
            bucket: config.bucket.clone(),
        }
    }
}

pub fn public_base_url(config: &S3Config, region: &str) -> String {
    match &config.public_base_url {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => format!("https://{}.s3.{}.amazonaws.com", config.bucket, region),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "Falha no upload para o S3");
                AppError::ExternalService("Falha no upload da imagem.".to_string())
            })?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "Falha ao remover objeto do S3");
                AppError::ExternalService("Falha ao remover a imagem.".to_string())
            })?;
        Ok(())
    }
}
