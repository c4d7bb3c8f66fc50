// src/services/catalog_service.rs

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CatalogRepository,
    models::catalog::{
        ImageUpload, Product, ProductPayload, ProductStock, ProductView, ProductWithStock,
        DEFAULT_STOCK_LOCATION,
    },
    services::storage::{
        content_type_for, image_extension, product_image_key, BlobStore, MAX_IMAGE_SIZE,
        SUPPORTED_IMAGE_FORMATS,
    },
};

/// Imagem já gravada no bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub key: String,
    pub url: String,
}

#[derive(Clone)]
pub struct CatalogService {
    repo: CatalogRepository,
    pool: PgPool,
    blob_store: Option<Arc<dyn BlobStore>>,
}

impl CatalogService {
    pub fn new(repo: CatalogRepository, pool: PgPool, blob_store: Option<Arc<dyn BlobStore>>) -> Self {
        Self { repo, pool, blob_store }
    }

    // --- Leitura ---

    /// Todos os produtos (admin), ativos ou não.
    pub async fn list_products(&self) -> Result<Vec<ProductView>, AppError> {
        let rows = self.repo.list_products(false).await?;
        Ok(rows.into_iter().map(ProductView::from).collect())
    }

    /// Catálogo visto pelo vendedor: só produtos ativos.
    pub async fn list_catalog(&self) -> Result<Vec<ProductView>, AppError> {
        let rows = self.repo.list_products(true).await?;
        Ok(rows.into_iter().map(ProductView::from).collect())
    }

    pub async fn get_product(&self, id: Uuid) -> Result<ProductView, AppError> {
        self.repo
            .find_with_stock(id)
            .await?
            .map(ProductView::from)
            .ok_or_else(|| AppError::NotFound("Produto não encontrado.".to_string()))
    }

    // --- Imagem ---

    /// Sobe a imagem e devolve chave e URL pública. Sem armazenamento
    /// configurado o produto é salvo sem imagem.
    pub async fn upload_image(&self, image: Option<ImageUpload>) -> Result<Option<UploadedImage>, AppError> {
        let Some(image) = image.filter(|i| !i.bytes.is_empty()) else {
            return Ok(None);
        };

        let extension = image_extension(image.file_name.as_deref()).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Formato de imagem não suportado. Use: {}.",
                SUPPORTED_IMAGE_FORMATS.join(", ")
            ))
        })?;

        if image.bytes.len() > MAX_IMAGE_SIZE {
            return Err(AppError::BadRequest(
                "Imagem muito grande (máximo 5MB).".to_string(),
            ));
        }

        let Some(store) = &self.blob_store else {
            tracing::warn!("Imagem descartada: armazenamento de imagens não configurado");
            return Ok(None);
        };

        let content_type = image
            .content_type
            .clone()
            .filter(|ct| ct.starts_with("image/"))
            .unwrap_or_else(|| content_type_for(&extension).to_string());

        let key = product_image_key(&extension);
        let url = store.put(&key, image.bytes, &content_type).await?;
        tracing::debug!(key = %key, "Imagem de produto enviada");
        Ok(Some(UploadedImage { key, url }))
    }

    /// Remove do bucket uma imagem cujo produto não chegou a ser gravado.
    async fn discard_image(&self, image: Option<&UploadedImage>) {
        let (Some(image), Some(store)) = (image, &self.blob_store) else {
            return;
        };
        match store.delete(&image.key).await {
            Ok(()) => tracing::debug!(key = %image.key, "Imagem descartada após falha ao gravar o produto"),
            Err(e) => tracing::warn!(key = %image.key, error = %e, "Imagem órfã no armazenamento"),
        }
    }

    // --- Escrita ---

    /// Cria o produto e o saldo inicial no mesmo commit.
    pub async fn create_product(
        &self,
        payload: &ProductPayload,
        image: Option<ImageUpload>,
    ) -> Result<ProductView, AppError> {
        // Upload fora da transação: não segura conexão esperando o S3
        let image = self.upload_image(image).await?;
        let image_url = image.as_ref().map(|i| i.url.as_str());

        let (product, stock) = match self.insert_product(payload, image_url).await {
            Ok(created) => created,
            Err(e) => {
                self.discard_image(image.as_ref()).await;
                return Err(e);
            }
        };

        tracing::info!(product_id = %product.id, sku = %product.sku, "Produto criado");
        Ok(view_of(product, stock))
    }

    async fn insert_product(
        &self,
        payload: &ProductPayload,
        image_url: Option<&str>,
    ) -> Result<(Product, ProductStock), AppError> {
        let mut tx = self.pool.begin().await?;

        let product = self.repo.create_product(&mut *tx, payload, image_url).await?;
        let stock = self
            .repo
            .create_stock(&mut *tx, product.id, DEFAULT_STOCK_LOCATION, payload.initial_stock)
            .await?;

        tx.commit().await?;
        Ok((product, stock))
    }

    pub async fn update_product(
        &self,
        id: Uuid,
        payload: &ProductPayload,
        image: Option<ImageUpload>,
    ) -> Result<ProductView, AppError> {
        let image = self.upload_image(image).await?;
        let image_url = image.as_ref().map(|i| i.url.as_str());

        if let Err(e) = self.save_product(id, payload, image_url).await {
            self.discard_image(image.as_ref()).await;
            return Err(e);
        }
        self.get_product(id).await
    }

    async fn save_product(
        &self,
        id: Uuid,
        payload: &ProductPayload,
        image_url: Option<&str>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        self.repo
            .update_product(&mut *tx, id, payload)
            .await?
            .ok_or_else(|| AppError::NotFound("Produto não encontrado.".to_string()))?;

        // Imagem nova substitui a anterior; sem imagem, mantém a atual
        if let Some(url) = image_url {
            self.repo.set_image_url(&mut *tx, id, url).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn toggle_active(&self, id: Uuid) -> Result<Product, AppError> {
        let product = self
            .repo
            .toggle_active(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Produto não encontrado.".to_string()))?;

        tracing::info!(product_id = %id, active = product.active, "Produto ativado/desativado");
        Ok(product)
    }

    /// Produtos já usados em pedidos não podem ser apagados (Conflict).
    pub async fn delete_product(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete_product(&self.pool, id).await? {
            return Err(AppError::NotFound("Produto não encontrado.".to_string()));
        }
        tracing::info!(product_id = %id, "Produto excluído");
        Ok(())
    }

    /// Ajuste manual do físico. Nunca abaixo do que já está reservado.
    pub async fn set_stock(&self, product_id: Uuid, total_quantity: i32) -> Result<ProductStock, AppError> {
        if total_quantity < 0 {
            return Err(AppError::BadRequest("A quantidade não pode ser negativa.".to_string()));
        }

        match self
            .repo
            .set_total_quantity(&self.pool, product_id, total_quantity)
            .await?
        {
            Some(stock) => {
                tracing::info!(product_id = %product_id, total = total_quantity, "Estoque ajustado");
                Ok(stock)
            }
            None => {
                // Guarda falhou: ou não existe, ou o reservado é maior que o novo total
                let current = self
                    .repo
                    .find_with_stock(product_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Produto não encontrado.".to_string()))?;
                Err(AppError::Conflict(format!(
                    "Quantidade abaixo do reservado ({}).",
                    current.reserved_quantity
                )))
            }
        }
    }
}

fn view_of(product: Product, stock: ProductStock) -> ProductView {
    ProductView::from(ProductWithStock {
        product,
        location: stock.location,
        total_quantity: stock.total_quantity,
        reserved_quantity: stock.reserved_quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    /// Armazenamento em memória, guarda as chaves recebidas e removidas.
    #[derive(Default)]
    struct MemoryStore {
        keys: Mutex<Vec<(String, String)>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlobStore for MemoryStore {
        async fn put(&self, key: &str, _bytes: Vec<u8>, content_type: &str) -> Result<String, AppError> {
            self.keys
                .lock()
                .unwrap()
                .push((key.to_string(), content_type.to_string()));
            Ok(format!("https://cdn.test/{key}"))
        }

        async fn delete(&self, key: &str) -> Result<(), AppError> {
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    fn service(store: Option<Arc<dyn BlobStore>>) -> CatalogService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://fastdrop@localhost/fastdrop_test")
            .unwrap();
        CatalogService::new(CatalogRepository::new(pool.clone()), pool, store)
    }

    fn png(bytes: usize) -> ImageUpload {
        ImageUpload {
            file_name: Some("caneca.PNG".into()),
            content_type: Some("image/png".into()),
            bytes: vec![0u8; bytes],
        }
    }

    #[tokio::test]
    async fn image_goes_to_products_namespace() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(Some(store.clone()));

        let uploaded = svc.upload_image(Some(png(16))).await.unwrap().unwrap();

        let keys = store.keys.lock().unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].0.starts_with("products/"));
        assert!(keys[0].0.ends_with(".png"));
        assert_eq!(keys[0].1, "image/png");
        assert_eq!(uploaded.key, keys[0].0);
        assert_eq!(uploaded.url, format!("https://cdn.test/{}", keys[0].0));
    }

    #[tokio::test]
    async fn missing_or_empty_image_is_skipped() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(Some(store.clone()));

        assert_eq!(svc.upload_image(None).await.unwrap(), None);
        assert_eq!(svc.upload_image(Some(png(0))).await.unwrap(), None);
        assert!(store.keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn without_store_product_is_saved_without_image() {
        let svc = service(None);
        assert_eq!(svc.upload_image(Some(png(16))).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unsupported_or_oversized_images_are_rejected() {
        let svc = service(Some(Arc::new(MemoryStore::default())));

        let exe = ImageUpload {
            file_name: Some("virus.exe".into()),
            content_type: None,
            bytes: vec![1, 2, 3],
        };
        assert!(matches!(svc.upload_image(Some(exe)).await, Err(AppError::BadRequest(_))));

        let huge = png(MAX_IMAGE_SIZE + 1);
        assert!(matches!(svc.upload_image(Some(huge)).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn negative_stock_is_rejected_before_db() {
        let svc = service(None);
        let err = svc.set_stock(Uuid::new_v4(), -1).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    // --- Contra o banco ---

    fn db_service(pool: &PgPool, store: Option<Arc<dyn BlobStore>>) -> CatalogService {
        CatalogService::new(CatalogRepository::new(pool.clone()), pool.clone(), store)
    }

    #[sqlx::test]
    async fn product_and_stock_are_created_together(pool: PgPool) {
        let svc = db_service(&pool, None);
        let mut payload = fixtures::product_payload("CANECA", Decimal::new(1590, 2));
        payload.initial_stock = 12;

        let view = svc.create_product(&payload, None).await.unwrap();
        assert_eq!(view.product.sku, "CANECA");
        assert!(view.product.active);
        assert_eq!(view.stock.total_quantity, 12);
        assert_eq!(view.stock.available_quantity, 12);
        assert_eq!(view.stock.location, DEFAULT_STOCK_LOCATION);
    }

    #[sqlx::test]
    async fn duplicate_sku_conflicts_and_discards_uploaded_image(pool: PgPool) {
        let store = Arc::new(MemoryStore::default());
        let svc = db_service(&pool, Some(store.clone()));
        fixtures::product(&pool, "CANECA", 1).await;

        let payload = fixtures::product_payload("CANECA", Decimal::new(1590, 2));
        let err = svc.create_product(&payload, Some(png(16))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let uploaded: Vec<String> = store.keys.lock().unwrap().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(uploaded.len(), 1);
        assert_eq!(*store.deleted.lock().unwrap(), uploaded);
        assert_eq!(fixtures::count(&pool, "SELECT COUNT(*) FROM products").await, 1);
    }

    #[sqlx::test]
    async fn double_toggle_restores_active(pool: PgPool) {
        let svc = db_service(&pool, None);
        let product = fixtures::product(&pool, "CANECA", 1).await;
        assert!(product.active);

        assert!(!svc.toggle_active(product.id).await.unwrap().active);
        assert!(svc.toggle_active(product.id).await.unwrap().active);

        let err = svc.toggle_active(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[sqlx::test]
    async fn stock_cannot_drop_below_reserved(pool: PgPool) {
        let svc = db_service(&pool, None);
        let product = fixtures::product(&pool, "CANECA", 10).await;
        CatalogRepository::new(pool.clone())
            .reserve(&pool, product.id, 4)
            .await
            .unwrap()
            .unwrap();

        let err = svc.set_stock(product.id, 3).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stock = svc.set_stock(product.id, 4).await.unwrap();
        assert_eq!((stock.total_quantity, stock.reserved_quantity, stock.available()), (4, 4, 0));

        let err = svc.set_stock(Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[sqlx::test]
    async fn guarded_stock_updates_refuse_to_go_negative(pool: PgPool) {
        let repo = CatalogRepository::new(pool.clone());
        let product = fixtures::product(&pool, "CANECA", 5).await;

        assert!(repo.reserve(&pool, product.id, 6).await.unwrap().is_none());
        assert!(repo.reserve(&pool, product.id, 5).await.unwrap().is_some());
        assert!(repo.reserve(&pool, product.id, 1).await.unwrap().is_none());

        assert!(repo.release_reservation(&pool, product.id, 6).await.unwrap().is_none());
        let stock = repo.release_reservation(&pool, product.id, 2).await.unwrap().unwrap();
        assert_eq!((stock.total_quantity, stock.reserved_quantity), (5, 3));

        assert!(repo.consume_reservation(&pool, product.id, 4).await.unwrap().is_none());
        let stock = repo.consume_reservation(&pool, product.id, 3).await.unwrap().unwrap();
        assert_eq!((stock.total_quantity, stock.reserved_quantity), (2, 0));
    }

    #[sqlx::test]
    async fn unused_product_can_be_deleted_once(pool: PgPool) {
        let svc = db_service(&pool, None);
        let product = fixtures::product(&pool, "CANECA", 3).await;

        svc.delete_product(product.id).await.unwrap();
        assert_eq!(fixtures::count(&pool, "SELECT COUNT(*) FROM product_stock").await, 0);

        let err = svc.delete_product(product.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
