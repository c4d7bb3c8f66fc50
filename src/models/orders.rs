// src/models/orders.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::catalog::{validate_money, MAX_MONEY};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_origin", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderOrigin {
    Erp,
    Manual,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Picking,
    Shipped,
    Delivered,
    Cancelled,
}

/// O que uma transição de status faz com o estoque reservado pelo pedido.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Baixa o total e libera a reserva (expedição).
    Consume,
    /// Só libera a reserva (cancelamento).
    Release,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Picking,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Picking => "picking",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Picking)
                | (Picking, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Picking, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Efeito no estoque de uma transição já validada.
    pub fn stock_effect(self, next: OrderStatus) -> StockEffect {
        match next {
            OrderStatus::Shipped => StockEffect::Consume,
            OrderStatus::Cancelled => StockEffect::Release,
            _ => StockEffect::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Pending,
    Approved,
    Rejected,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Created, Pending)
                | (Created, Approved)
                | (Created, Rejected)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Refunded)
        )
    }
}

// --- Structs de Operação ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub origin: OrderOrigin,
    pub external_order_id: Option<String>,
    pub external_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_document: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
    pub status: OrderStatus,
    #[schema(example = "31.50")]
    pub total_cost: Decimal,
    #[schema(example = "47.70")]
    pub total_vendor_price: Decimal,
    pub tracking_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    #[schema(example = 3)]
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub unit_vendor_price: Decimal,
    pub subtotal_cost: Decimal,
    pub subtotal_vendor_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    #[schema(example = "mercadopago")]
    pub provider: String,
    pub external_payment_id: Option<String>,
    pub status: PaymentStatus,
    pub amount: Option<Decimal>,
    pub raw_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub header: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

/// Linha de pedido já precificada, pronta para ser gravada.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub sku: String,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub unit_vendor_price: Decimal,
}

impl PricedLine {
    pub fn subtotal_cost(&self) -> Decimal {
        self.unit_cost * Decimal::from(self.quantity)
    }

    pub fn subtotal_vendor_price(&self) -> Decimal {
        self.unit_vendor_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub total_cost: Decimal,
    pub total_vendor_price: Decimal,
}

impl OrderTotals {
    pub fn from_lines(lines: &[PricedLine]) -> Self {
        lines.iter().fold(
            OrderTotals {
                total_cost: Decimal::ZERO,
                total_vendor_price: Decimal::ZERO,
            },
            |acc, line| OrderTotals {
                total_cost: acc.total_cost + line.subtotal_cost(),
                total_vendor_price: acc.total_vendor_price + line.subtotal_vendor_price(),
            },
        )
    }

    /// Todos os valores (subtotais e totais) cabem em NUMERIC(10,2)?
    pub fn fits_money_columns(&self, lines: &[PricedLine]) -> bool {
        self.total_cost <= MAX_MONEY
            && self.total_vendor_price <= MAX_MONEY
            && lines
                .iter()
                .all(|l| l.subtotal_cost() <= MAX_MONEY && l.subtotal_vendor_price() <= MAX_MONEY)
    }
}

// --- Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemPayload {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "A quantidade deve ser maior que zero."))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderPayload {
    pub origin: Option<OrderOrigin>,
    #[validate(length(max = 100))]
    pub external_order_id: Option<String>,
    #[validate(length(max = 100))]
    pub external_number: Option<String>,
    #[validate(length(max = 200))]
    pub customer_name: Option<String>,
    #[validate(length(max = 50))]
    pub customer_document: Option<String>,
    #[validate(length(max = 50))]
    pub customer_phone: Option<String>,
    #[validate(email(message = "O e-mail do cliente é inválido."))]
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,

    #[validate(length(min = 1, message = "O pedido precisa de ao menos um item."), nested)]
    pub items: Vec<OrderItemPayload>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusPayload {
    pub status: OrderStatus,
    #[validate(length(min = 1, max = 120))]
    pub tracking_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentPayload {
    #[validate(length(min = 1, max = 50))]
    pub provider: Option<String>,
    #[validate(length(max = 100))]
    pub external_payment_id: Option<String>,
    #[validate(custom(function = "validate_money"))]
    pub amount: Option<Decimal>,
    pub raw_response: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusPayload {
    pub status: PaymentStatus,
    pub raw_response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed_edges() -> Vec<(OrderStatus, OrderStatus)> {
        use OrderStatus::*;
        vec![
            (Pending, Picking),
            (Picking, Shipped),
            (Shipped, Delivered),
            (Pending, Cancelled),
            (Picking, Cancelled),
        ]
    }

    #[test]
    fn only_the_documented_edges_are_allowed() {
        let allowed = allowed_edges();
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from.as_str(),
                    to.as_str()
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            assert!(OrderStatus::ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn shipping_consumes_and_cancelling_releases() {
        assert_eq!(
            OrderStatus::Picking.stock_effect(OrderStatus::Shipped),
            StockEffect::Consume
        );
        assert_eq!(
            OrderStatus::Pending.stock_effect(OrderStatus::Cancelled),
            StockEffect::Release
        );
        assert_eq!(
            OrderStatus::Picking.stock_effect(OrderStatus::Cancelled),
            StockEffect::Release
        );
        assert_eq!(
            OrderStatus::Pending.stock_effect(OrderStatus::Picking),
            StockEffect::None
        );
        assert_eq!(
            OrderStatus::Shipped.stock_effect(OrderStatus::Delivered),
            StockEffect::None
        );
    }

    #[test]
    fn subtotals_and_totals_follow_unit_times_quantity() {
        let lines = vec![
            PricedLine {
                product_id: Uuid::new_v4(),
                sku: "ABC1".into(),
                quantity: 3,
                unit_cost: Decimal::new(1050, 2),
                unit_vendor_price: Decimal::new(1590, 2),
            },
            PricedLine {
                product_id: Uuid::new_v4(),
                sku: "XYZ9".into(),
                quantity: 2,
                unit_cost: Decimal::new(199, 2),
                unit_vendor_price: Decimal::new(350, 2),
            },
        ];

        assert_eq!(lines[0].subtotal_cost(), Decimal::new(3150, 2));
        assert_eq!(lines[0].subtotal_vendor_price(), Decimal::new(4770, 2));

        let totals = OrderTotals::from_lines(&lines);
        assert_eq!(totals.total_cost, Decimal::new(3548, 2));
        assert_eq!(totals.total_vendor_price, Decimal::new(5470, 2));
    }

    #[test]
    fn totals_beyond_the_money_column_are_flagged() {
        let line = |quantity| PricedLine {
            product_id: Uuid::new_v4(),
            sku: "CARO".into(),
            quantity,
            unit_cost: Decimal::new(50000, 2),
            unit_vendor_price: Decimal::new(100000, 2),
        };

        let ok = vec![line(10)];
        assert!(OrderTotals::from_lines(&ok).fits_money_columns(&ok));

        // 1000,00 x 200.000 = 200.000.000,00
        let too_big = vec![line(200_000)];
        assert!(!OrderTotals::from_lines(&too_big).fits_money_columns(&too_big));
    }

    #[test]
    fn items_payload_serializes_for_validation_messages() {
        let item = OrderItemPayload { product_id: Uuid::nil(), quantity: 2 };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["quantity"], 2);
        assert!(json.get("productId").is_some());
    }

    #[test]
    fn payment_refund_only_after_approval() {
        assert!(PaymentStatus::Approved.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Rejected.can_transition_to(PaymentStatus::Approved));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Approved));
    }

    #[test]
    fn order_without_items_fails_validation() {
        let payload = CreateOrderPayload {
            origin: None,
            external_order_id: None,
            external_number: None,
            customer_name: Some("Maria".into()),
            customer_document: None,
            customer_phone: None,
            customer_email: None,
            shipping_address: None,
            items: vec![],
        };
        assert!(payload.validate().is_err());
    }
}
