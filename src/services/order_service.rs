// src/services/order_service.rs
//
// Pedidos do vendedor. O estoque é reservado na criação, baixado na
// expedição e devolvido no cancelamento, sempre na mesma transação que
// grava o pedido.

use std::collections::{BTreeMap, HashMap};

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CatalogRepository, OrderRepository},
    models::{
        catalog::Product,
        orders::{
            CreateOrderPayload, Order, OrderDetail, OrderItemPayload, OrderOrigin, OrderStatus,
            OrderTotals, Payment, PaymentStatus, PricedLine, RecordPaymentPayload, StockEffect,
        },
        vendor::Vendor,
    },
};

const DEFAULT_PAYMENT_PROVIDER: &str = "mercadopago";

/// Soma linhas repetidas do mesmo produto. A ordem (por id) é a ordem de
/// reserva, o que evita deadlock entre pedidos concorrentes.
pub fn merge_item_quantities(items: &[OrderItemPayload]) -> Result<BTreeMap<Uuid, i32>, AppError> {
    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest("A quantidade deve ser maior que zero.".to_string()));
        }
        let entry = merged.entry(item.product_id).or_insert(0);
        *entry = entry
            .checked_add(item.quantity)
            .ok_or_else(|| AppError::BadRequest("Quantidade excessiva.".to_string()))?;
    }
    Ok(merged)
}

/// Congela os preços do catálogo em cada linha.
pub fn price_lines(merged: &BTreeMap<Uuid, i32>, products: &[Product]) -> Result<Vec<PricedLine>, AppError> {
    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();

    merged
        .iter()
        .map(|(product_id, quantity)| {
            let product = by_id
                .get(product_id)
                .ok_or_else(|| AppError::NotFound(format!("Produto {product_id} não encontrado.")))?;
            if !product.active {
                return Err(AppError::BadRequest(format!(
                    "Produto '{}' está inativo.",
                    product.sku
                )));
            }
            Ok(PricedLine {
                product_id: product.id,
                sku: product.sku.clone(),
                quantity: *quantity,
                unit_cost: product.cost_price,
                unit_vendor_price: product.wholesale_price,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct OrderService {
    order_repo: OrderRepository,
    catalog_repo: CatalogRepository,
    pool: PgPool,
}

impl OrderService {
    pub fn new(order_repo: OrderRepository, catalog_repo: CatalogRepository, pool: PgPool) -> Self {
        Self { order_repo, catalog_repo, pool }
    }

    // =========================================================================
    //  CRIAÇÃO
    // =========================================================================

    pub async fn create_order(
        &self,
        vendor: &Vendor,
        payload: &CreateOrderPayload,
    ) -> Result<OrderDetail, AppError> {
        let merged = merge_item_quantities(&payload.items)?;
        if merged.is_empty() {
            return Err(AppError::BadRequest("O pedido precisa de ao menos um item.".to_string()));
        }
        let product_ids: Vec<Uuid> = merged.keys().copied().collect();

        let mut tx = self.pool.begin().await?;

        let products = self
            .catalog_repo
            .find_products_by_ids(&mut *tx, &product_ids)
            .await?;
        let lines = price_lines(&merged, &products)?;
        let totals = OrderTotals::from_lines(&lines);
        if !totals.fits_money_columns(&lines) {
            return Err(AppError::BadRequest(
                "Valor do pedido acima do máximo permitido (99.999.999,99).".to_string(),
            ));
        }

        // Reserva antes de gravar o pedido; qualquer falta desfaz tudo
        for line in &lines {
            if self
                .catalog_repo
                .reserve(&mut *tx, line.product_id, line.quantity)
                .await?
                .is_none()
            {
                return Err(AppError::Conflict(format!(
                    "Estoque insuficiente para o produto '{}'.",
                    line.sku
                )));
            }
        }

        let origin = payload.origin.unwrap_or(OrderOrigin::Manual);
        let header = self
            .order_repo
            .insert_order(&mut *tx, vendor.id, origin, payload, totals)
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            items.push(self.order_repo.insert_item(&mut *tx, header.id, line).await?);
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %header.id,
            vendor_id = %vendor.id,
            items = items.len(),
            total = %header.total_vendor_price,
            "Pedido criado"
        );
        Ok(OrderDetail { header, items, payments: Vec::new() })
    }

    // =========================================================================
    //  STATUS
    // =========================================================================

    /// `vendor_scope = Some(id)` restringe aos pedidos daquele vendedor
    /// (pedido alheio responde como inexistente).
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        tracking_code: Option<&str>,
        vendor_scope: Option<Uuid>,
    ) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .order_repo
            .find_for_update(&mut *tx, order_id)
            .await?
            .filter(|o| vendor_scope.is_none_or(|v| o.vendor_id == v))
            .ok_or_else(|| AppError::NotFound("Pedido não encontrado.".to_string()))?;

        if !current.status.can_transition_to(new_status) {
            return Err(AppError::invalid_order_transition(current.status, new_status));
        }

        let effect = current.status.stock_effect(new_status);
        if effect != StockEffect::None {
            let mut items = self.order_repo.list_items(&mut *tx, order_id).await?;
            // Mesma ordem de travamento da reserva em `create_order`
            items.sort_by_key(|item| item.product_id);
            for item in &items {
                let applied = match effect {
                    StockEffect::Consume => {
                        self.catalog_repo
                            .consume_reservation(&mut *tx, item.product_id, item.quantity)
                            .await?
                    }
                    StockEffect::Release => {
                        self.catalog_repo
                            .release_reservation(&mut *tx, item.product_id, item.quantity)
                            .await?
                    }
                    StockEffect::None => continue,
                };
                if applied.is_none() {
                    // Reserva menor que o pedido: saldo foi mexido por fora
                    tracing::error!(order_id = %order_id, sku = %item.sku, "Reserva inconsistente");
                    return Err(AppError::Conflict(format!(
                        "Reserva do produto '{}' inconsistente com o pedido.",
                        item.sku
                    )));
                }
            }
        }

        let tracking_code = tracking_code.map(str::trim).filter(|t| !t.is_empty());
        let order = self
            .order_repo
            .update_status(&mut *tx, order_id, new_status, tracking_code)
            .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            from = current.status.as_str(),
            to = new_status.as_str(),
            "Status do pedido alterado"
        );
        Ok(order)
    }

    /// Cancelamento pelo próprio vendedor.
    pub async fn cancel(&self, vendor: &Vendor, order_id: Uuid) -> Result<Order, AppError> {
        self.update_status(order_id, OrderStatus::Cancelled, None, Some(vendor.id))
            .await
    }

    // =========================================================================
    //  CONSULTA
    // =========================================================================

    pub async fn get_order(&self, order_id: Uuid, vendor_scope: Option<Uuid>) -> Result<OrderDetail, AppError> {
        let header = self
            .order_repo
            .find_by_id(order_id)
            .await?
            .filter(|o| vendor_scope.is_none_or(|v| o.vendor_id == v))
            .ok_or_else(|| AppError::NotFound("Pedido não encontrado.".to_string()))?;

        let items = self.order_repo.list_items(&self.pool, order_id).await?;
        let payments = self.order_repo.list_payments(&self.pool, order_id).await?;
        Ok(OrderDetail { header, items, payments })
    }

    pub async fn list_all(&self) -> Result<Vec<Order>, AppError> {
        self.order_repo.list_all().await
    }

    pub async fn list_for_vendor(&self, vendor_id: Uuid) -> Result<Vec<Order>, AppError> {
        self.order_repo.list_for_vendor(vendor_id).await
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    pub async fn record_payment(&self, order_id: Uuid, payload: &RecordPaymentPayload) -> Result<Payment, AppError> {
        let mut tx = self.pool.begin().await?;

        let order = self
            .order_repo
            .find_for_update(&mut *tx, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Pedido não encontrado.".to_string()))?;

        if order.status == OrderStatus::Cancelled {
            return Err(AppError::BadRequest(
                "Não é possível registrar pagamento de pedido cancelado.".to_string(),
            ));
        }

        let provider = payload
            .provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PAYMENT_PROVIDER);

        let payment = self
            .order_repo
            .insert_payment(
                &mut *tx,
                order_id,
                provider,
                payload.external_payment_id.as_deref(),
                payload.amount,
                payload.raw_response.as_deref(),
            )
            .await?;

        tx.commit().await?;
        tracing::info!(order_id = %order_id, payment_id = %payment.id, provider = %provider, "Pagamento registrado");
        Ok(payment)
    }

    pub async fn update_payment_status(
        &self,
        payment_id: Uuid,
        new_status: PaymentStatus,
        raw_response: Option<&str>,
    ) -> Result<Payment, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .order_repo
            .find_payment_for_update(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Pagamento não encontrado.".to_string()))?;

        if !current.status.can_transition_to(new_status) {
            return Err(AppError::InvalidTransition {
                from: current.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        let payment = self
            .order_repo
            .update_payment_status(&mut *tx, payment_id, new_status, raw_response)
            .await?;

        tx.commit().await?;
        tracing::info!(
            payment_id = %payment_id,
            from = current.status.as_str(),
            to = new_status.as_str(),
            "Status do pagamento alterado"
        );
        Ok(payment)
    }
}
