// src/db/order_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::orders::{
        CreateOrderPayload, Order, OrderItem, OrderOrigin, OrderStatus, OrderTotals, Payment,
        PaymentStatus, PricedLine,
    },
};

#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  PEDIDOS
    // =========================================================================

    pub async fn insert_order<'e, E>(
        &self,
        executor: E,
        vendor_id: Uuid,
        origin: OrderOrigin,
        header: &CreateOrderPayload,
        totals: OrderTotals,
    ) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, vendor_id, origin, external_order_id, external_number,
                customer_name, customer_document, customer_phone, customer_email,
                shipping_address, status, total_cost, total_vendor_price
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(vendor_id)
        .bind(origin)
        .bind(header.external_order_id.as_deref())
        .bind(header.external_number.as_deref())
        .bind(header.customer_name.as_deref())
        .bind(header.customer_document.as_deref())
        .bind(header.customer_phone.as_deref())
        .bind(header.customer_email.as_deref())
        .bind(header.shipping_address.as_deref())
        .bind(totals.total_cost)
        .bind(totals.total_vendor_price)
        .fetch_one(executor)
        .await?;
        Ok(order)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        line: &PricedLine,
    ) -> Result<OrderItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, sku, quantity,
                unit_cost, unit_vendor_price, subtotal_cost, subtotal_vendor_price
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(line.product_id)
        .bind(&line.sku)
        .bind(line.quantity)
        .bind(line.unit_cost)
        .bind(line.unit_vendor_price)
        .bind(line.subtotal_cost())
        .bind(line.subtotal_vendor_price())
        .fetch_one(executor)
        .await?;
        Ok(item)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Trava o pedido: transições concorrentes do mesmo pedido ficam em fila.
    pub async fn find_for_update<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(order)
    }

    pub async fn list_items<'e, E>(&self, executor: E, order_id: Uuid) -> Result<Vec<OrderItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY sku ASC",
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;
        Ok(items)
    }

    pub async fn list_all(&self) -> Result<Vec<Order>, AppError> {
        let orders = sqlx::query_as::<_, Order>("SELECT * FROM orders ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    pub async fn list_for_vendor(&self, vendor_id: Uuid) -> Result<Vec<Order>, AppError> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE vendor_id = $1 ORDER BY created_at DESC",
        )
        .bind(vendor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: OrderStatus,
        tracking_code: Option<&str>,
    ) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = $2,
                tracking_code = COALESCE($3, tracking_code),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(tracking_code)
        .fetch_one(executor)
        .await?;
        Ok(order)
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    pub async fn insert_payment<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        provider: &str,
        external_payment_id: Option<&str>,
        amount: Option<rust_decimal::Decimal>,
        raw_response: Option<&str>,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (id, order_id, provider, external_payment_id, status, amount, raw_response)
            VALUES ($1, $2, $3, $4, 'created', $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(provider)
        .bind(external_payment_id)
        .bind(amount)
        .bind(raw_response)
        .fetch_one(executor)
        .await?;
        Ok(payment)
    }

    pub async fn find_payment_for_update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(payment)
    }

    pub async fn update_payment_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: PaymentStatus,
        raw_response: Option<&str>,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, raw_response = COALESCE($3, raw_response), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(raw_response)
        .fetch_one(executor)
        .await?;
        Ok(payment)
    }

    pub async fn list_payments<'e, E>(&self, executor: E, order_id: Uuid) -> Result<Vec<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;
        Ok(payments)
    }
}
