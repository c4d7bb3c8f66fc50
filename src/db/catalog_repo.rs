// src/db/catalog_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::catalog::{Product, ProductPayload, ProductStock, ProductWithStock},
};

const PRODUCT_WITH_STOCK: &str = r#"
    SELECT p.*, s.location, s.total_quantity, s.reserved_quantity
    FROM products p
    JOIN product_stock s ON s.product_id = p.id
"#;

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Leitura
    // ---

    pub async fn list_products(&self, only_active: bool) -> Result<Vec<ProductWithStock>, AppError> {
        let sql = if only_active {
            format!("{PRODUCT_WITH_STOCK} WHERE p.active = TRUE ORDER BY p.name ASC")
        } else {
            format!("{PRODUCT_WITH_STOCK} ORDER BY p.created_at DESC")
        };
        let rows = sqlx::query_as::<_, ProductWithStock>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn find_with_stock(&self, id: Uuid) -> Result<Option<ProductWithStock>, AppError> {
        let sql = format!("{PRODUCT_WITH_STOCK} WHERE p.id = $1");
        let row = sqlx::query_as::<_, ProductWithStock>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_products_by_ids<'e, E>(
        &self,
        executor: E,
        ids: &[Uuid],
    ) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(executor)
            .await?;
        Ok(products)
    }

    // ---
    // Escrita (transacional)
    // ---

    pub async fn create_product<'e, E>(
        &self,
        executor: E,
        fields: &ProductPayload,
        image_url: Option<&str>,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                id, sku, name, description, cost_price, wholesale_price, suggested_price,
                weight, width, height, length, image_url, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, TRUE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&fields.sku)
        .bind(&fields.name)
        .bind(fields.description.as_deref())
        .bind(fields.cost_price)
        .bind(fields.wholesale_price)
        .bind(fields.suggested_price)
        .bind(fields.weight)
        .bind(fields.width)
        .bind(fields.height)
        .bind(fields.length)
        .bind(image_url)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, format!("SKU '{}' já cadastrado.", fields.sku)))
    }

    pub async fn create_stock<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        location: &str,
        total_quantity: i32,
    ) -> Result<ProductStock, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let stock = sqlx::query_as::<_, ProductStock>(
            r#"
            INSERT INTO product_stock (id, product_id, location, total_quantity, reserved_quantity)
            VALUES ($1, $2, $3, $4, 0)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(location)
        .bind(total_quantity)
        .fetch_one(executor)
        .await?;
        Ok(stock)
    }

    pub async fn update_product<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        fields: &ProductPayload,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                sku = $2, name = $3, description = $4,
                cost_price = $5, wholesale_price = $6, suggested_price = $7,
                weight = $8, width = $9, height = $10, length = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&fields.sku)
        .bind(&fields.name)
        .bind(fields.description.as_deref())
        .bind(fields.cost_price)
        .bind(fields.wholesale_price)
        .bind(fields.suggested_price)
        .bind(fields.weight)
        .bind(fields.width)
        .bind(fields.height)
        .bind(fields.length)
        .fetch_optional(executor)
        .await
        .map_err(|e| map_unique_violation(e, format!("SKU '{}' já cadastrado.", fields.sku)))
    }

    pub async fn set_image_url<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        image_url: &str,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET image_url = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(image_url)
        .fetch_optional(executor)
        .await?;
        Ok(product)
    }

    // Inversão atômica: dois toggles seguidos voltam ao estado original
    pub async fn toggle_active<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET active = NOT active WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(product)
    }

    /// Apaga o produto (o saldo vai junto por cascade). Retorna `false` se não existia.
    pub async fn delete_product<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await
            .map_err(|e| {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_foreign_key_violation() {
                        return AppError::Conflict(
                            "Produto possui pedidos vinculados; desative-o em vez de excluir."
                                .to_string(),
                        );
                    }
                }
                AppError::DatabaseError(e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Saldo: toda alteração é um UPDATE atômico com guarda no WHERE.
    // `None` significa que a guarda falhou (ou o produto não tem saldo).
    // ---

    pub async fn set_total_quantity<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        total_quantity: i32,
    ) -> Result<Option<ProductStock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let stock = sqlx::query_as::<_, ProductStock>(
            r#"
            UPDATE product_stock
            SET total_quantity = $2, updated_at = NOW()
            WHERE product_id = $1 AND reserved_quantity <= $2
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(total_quantity)
        .fetch_optional(executor)
        .await?;
        Ok(stock)
    }

    /// Reserva `quantity` se houver saldo disponível.
    pub async fn reserve<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<ProductStock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let stock = sqlx::query_as::<_, ProductStock>(
            r#"
            UPDATE product_stock
            SET reserved_quantity = reserved_quantity + $2, updated_at = NOW()
            WHERE product_id = $1 AND total_quantity - reserved_quantity >= $2
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(executor)
        .await?;
        Ok(stock)
    }

    /// Expedição: baixa o físico e a reserva ao mesmo tempo.
    pub async fn consume_reservation<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<ProductStock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let stock = sqlx::query_as::<_, ProductStock>(
            r#"
            UPDATE product_stock
            SET total_quantity = total_quantity - $2,
                reserved_quantity = reserved_quantity - $2,
                updated_at = NOW()
            WHERE product_id = $1 AND reserved_quantity >= $2 AND total_quantity >= $2
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(executor)
        .await?;
        Ok(stock)
    }

    pub async fn release_reservation<'e, E>(
        &self,
        executor: E,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<ProductStock>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let stock = sqlx::query_as::<_, ProductStock>(
            r#"
            UPDATE product_stock
            SET reserved_quantity = reserved_quantity - $2, updated_at = NOW()
            WHERE product_id = $1 AND reserved_quantity >= $2
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(executor)
        .await?;
        Ok(stock)
    }
}
