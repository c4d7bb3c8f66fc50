// src/db/fixtures.rs
//
// Dados mínimos para os testes que rodam contra o banco (`#[sqlx::test]`).

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::{CatalogRepository, UserRepository, VendorRepository},
    models::{
        auth::{User, UserRole},
        catalog::{Product, ProductPayload, ProductStock, DEFAULT_STOCK_LOCATION},
        vendor::Vendor,
    },
};

/// Usuário vendedor + perfil, sem passar pelo bcrypt.
pub async fn vendor(pool: &PgPool) -> (User, Vendor) {
    let email = format!("vendedor-{}@fastdrop.com", Uuid::new_v4());
    let user = UserRepository::new(pool.clone())
        .create_user(pool, "Vendedor", &email, "hash", UserRole::Vendor, false)
        .await
        .unwrap();
    let vendor = VendorRepository::new(pool.clone())
        .create_vendor(pool, user.id, "Loja Teste", None, None)
        .await
        .unwrap();
    (user, vendor)
}

pub fn product_payload(sku: &str, wholesale_price: Decimal) -> ProductPayload {
    ProductPayload {
        sku: sku.into(),
        name: format!("Produto {sku}"),
        cost_price: Decimal::new(1050, 2),
        wholesale_price,
        ..Default::default()
    }
}

pub async fn product(pool: &PgPool, sku: &str, total_quantity: i32) -> Product {
    product_priced(pool, sku, total_quantity, Decimal::new(1590, 2)).await
}

pub async fn product_priced(pool: &PgPool, sku: &str, total_quantity: i32, price: Decimal) -> Product {
    let repo = CatalogRepository::new(pool.clone());
    let product = repo
        .create_product(pool, &product_payload(sku, price), None)
        .await
        .unwrap();
    repo.create_stock(pool, product.id, DEFAULT_STOCK_LOCATION, total_quantity)
        .await
        .unwrap();
    product
}

pub async fn stock(pool: &PgPool, product_id: Uuid) -> ProductStock {
    sqlx::query_as::<_, ProductStock>("SELECT * FROM product_stock WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn count(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await.unwrap()
}
