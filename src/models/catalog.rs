// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const DEFAULT_STOCK_LOCATION: &str = "CD-DEFAULT";

/// Maior valor que cabe em NUMERIC(10,2).
pub const MAX_MONEY: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Saldo disponível = total - reservado, nunca negativo.
pub fn available_stock(total_quantity: i32, reserved_quantity: i32) -> i32 {
    (total_quantity - reserved_quantity).max(0)
}

// --- Produto (catálogo) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[schema(example = "ABC1")]
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "10.50")]
    pub cost_price: Decimal,
    #[schema(example = "15.90")]
    pub wholesale_price: Decimal,
    pub suggested_price: Option<Decimal>,
    pub weight: Option<Decimal>, // kg
    pub width: Option<Decimal>,  // cm
    pub height: Option<Decimal>,
    pub length: Option<Decimal>,
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// --- Saldo do produto (tabela product_stock) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductStock {
    pub id: Uuid,
    pub product_id: Uuid,
    pub location: String,
    pub total_quantity: i32,
    pub reserved_quantity: i32,
    pub updated_at: DateTime<Utc>,
}

impl ProductStock {
    pub fn available(&self) -> i32 {
        available_stock(self.total_quantity, self.reserved_quantity)
    }
}

// Linha do JOIN products + product_stock
#[derive(Debug, Clone, FromRow)]
pub struct ProductWithStock {
    #[sqlx(flatten)]
    pub product: Product,
    pub location: String,
    pub total_quantity: i32,
    pub reserved_quantity: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub location: String,
    pub total_quantity: i32,
    pub reserved_quantity: i32,
    pub available_quantity: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub stock: StockLevel,
}

impl From<ProductWithStock> for ProductView {
    fn from(row: ProductWithStock) -> Self {
        ProductView {
            stock: StockLevel {
                available_quantity: available_stock(row.total_quantity, row.reserved_quantity),
                location: row.location,
                total_quantity: row.total_quantity,
                reserved_quantity: row.reserved_quantity,
            },
            product: row.product,
        }
    }
}

pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_money(val: &Decimal) -> Result<(), ValidationError> {
    validate_not_negative(val)?;
    if *val > MAX_MONEY {
        let mut err = ValidationError::new("range");
        err.message = Some("Valor acima do máximo permitido (99.999.999,99).".into());
        return Err(err);
    }
    Ok(())
}

// Campos do formulário de produto (multipart)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    #[validate(length(min = 1, max = 100, message = "O SKU é obrigatório."))]
    pub sku: String,

    #[validate(length(min = 1, max = 255, message = "O nome é obrigatório."))]
    pub name: String,

    pub description: Option<String>,

    #[validate(custom(function = "validate_money"))]
    pub cost_price: Decimal,

    #[validate(custom(function = "validate_money"))]
    pub wholesale_price: Decimal,

    #[validate(custom(function = "validate_money"))]
    pub suggested_price: Option<Decimal>,

    #[validate(custom(function = "validate_not_negative"))]
    pub weight: Option<Decimal>,
    #[validate(custom(function = "validate_not_negative"))]
    pub width: Option<Decimal>,
    #[validate(custom(function = "validate_not_negative"))]
    pub height: Option<Decimal>,
    #[validate(custom(function = "validate_not_negative"))]
    pub length: Option<Decimal>,

    // Estoque inicial (só usado na criação)
    #[validate(range(min = 0, message = "O estoque inicial não pode ser negativo."))]
    #[serde(default)]
    pub initial_stock: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetStockPayload {
    #[validate(range(min = 0, message = "A quantidade não pode ser negativa."))]
    pub total_quantity: i32,
}

/// Arquivo de imagem recebido no upload do produto.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_is_total_minus_reserved() {
        assert_eq!(available_stock(10, 0), 10);
        assert_eq!(available_stock(10, 3), 7);
        assert_eq!(available_stock(7, 7), 0);
    }

    #[test]
    fn available_never_goes_negative() {
        assert_eq!(available_stock(2, 5), 0);
        assert_eq!(available_stock(0, 1), 0);
    }

    #[test]
    fn negative_prices_are_rejected() {
        let payload = ProductPayload {
            sku: "ABC1".into(),
            name: "Caneca".into(),
            cost_price: Decimal::new(-1, 0),
            wholesale_price: Decimal::new(1590, 2),
            ..Default::default()
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("cost_price"));
    }

    #[test]
    fn empty_sku_is_rejected() {
        let payload = ProductPayload {
            name: "Caneca".into(),
            cost_price: Decimal::new(1000, 2),
            wholesale_price: Decimal::new(1590, 2),
            ..Default::default()
        };
        assert!(payload.validate().unwrap_err().field_errors().contains_key("sku"));
    }

    #[test]
    fn prices_must_fit_the_money_column() {
        assert_eq!(MAX_MONEY, "99999999.99".parse::<Decimal>().unwrap());

        let payload = ProductPayload {
            sku: "ABC1".into(),
            name: "Caneca".into(),
            cost_price: MAX_MONEY,
            wholesale_price: Decimal::new(100_000_000, 0),
            ..Default::default()
        };
        let errors = payload.validate().unwrap_err();
        assert!(!errors.field_errors().contains_key("cost_price"));
        assert!(errors.field_errors().contains_key("wholesale_price"));
    }
}
