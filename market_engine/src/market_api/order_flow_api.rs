use std::{collections::HashMap, fmt::Debug};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{
        FullOrder,
        LineRequest,
        NewOrderNote,
        Order,
        OrderStatusChange,
        OrderStatusType,
        PaymentStatusType,
        ShippingInfo,
    },
    events::{
        EventProducers,
        OrderCreatedEvent,
        OrderPaidEvent,
        OrderStatusChangedEvent,
        PaymentFailedEvent,
        SettlementFaultEvent,
    },
    gateway::{GatewayEvent, IntentMetadata, PaymentGateway},
    market_api::{
        errors::OrderFlowError,
        order_objects::{price_order, CheckoutResult, OrderStatusUpdate, StatusUpdateExtras},
    },
    transitions::check_transition,
    traits::{MarketplaceDatabase, SettlementFault, SettlementOutcome},
};

pub const DEFAULT_CURRENCY: &str = "usd";

/// `OrderFlowApi` is the order lifecycle engine. It handles checkout, payment settlement in response to gateway
/// events, and seller-driven status changes.
#[derive(Clone)]
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    currency: String,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({})", self.currency)
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, currency: DEFAULT_CURRENCY.to_string() }
    }

    /// Sets the currency that new orders are priced in.
    pub fn with_currency<S: AsRef<str>>(mut self, currency: S) -> Self {
        self.currency = currency.as_ref().to_ascii_lowercase();
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    /// Creates a new order and requests a payment intent for it.
    ///
    /// Every requested product is looked up in the catalog, and its name and unit price are copied into the order.
    /// Nothing is reserved: stock is only checked here, and decremented when the payment settles.
    ///
    /// If the gateway cannot be reached, the order is kept (pending, with no payment reference) and
    /// [`OrderFlowError::GatewayUnavailable`] is returned. The buyer can then call
    /// [`Self::reissue_payment_intent`], or abandon the order.
    pub async fn create_order(
        &self,
        buyer_id: &str,
        seller_id: &str,
        items: &[LineRequest],
        shipping: ShippingInfo,
    ) -> Result<CheckoutResult, OrderFlowError> {
        if buyer_id.trim().is_empty() {
            return Err(OrderFlowError::MissingField("buyer_id".into()));
        }
        if seller_id.trim().is_empty() {
            return Err(OrderFlowError::MissingField("seller_id".into()));
        }
        if items.is_empty() {
            return Err(OrderFlowError::EmptyOrder);
        }
        if let Some(line) = items.iter().find(|l| l.quantity <= 0) {
            return Err(OrderFlowError::InvalidQuantity { product_id: line.product_id, quantity: line.quantity });
        }
        if let Some(field) = shipping.missing_field() {
            return Err(OrderFlowError::MissingField(field.into()));
        }
        let mut products = HashMap::with_capacity(items.len());
        for line in items {
            if products.contains_key(&line.product_id) {
                continue;
            }
            let product =
                self.db.fetch_product(line.product_id).await?.ok_or(OrderFlowError::ProductNotFound(line.product_id))?;
            products.insert(product.id, product);
        }
        let new_order = price_order(buyer_id, seller_id, items, &products, shipping, &self.currency, Utc::now())?;
        let order = self.db.insert_order(new_order).await?;
        if !order.totals_are_consistent() {
            error!("🔄️ Order {} was stored with inconsistent totals. {order:?}", order.order.order_number);
            return Err(OrderFlowError::InconsistentTotals(order.order.order_number));
        }
        debug!(
            "🔄️📦️ Order {} created for {buyer_id}. Total {} {}",
            order.order.order_number, order.order.total_amount, order.order.currency
        );
        let (result, order) = self.issue_payment_intent(order).await?;
        self.call_order_created_hook(order).await;
        Ok(result)
    }

    /// Requests a new payment intent for an order whose checkout could not reach the gateway.
    ///
    /// Only the buyer may do this, and only while the order is pending and has no payment reference.
    pub async fn reissue_payment_intent(&self, order_id: i64, buyer_id: &str) -> Result<CheckoutResult, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        if order.order.buyer_id != buyer_id {
            return Err(OrderFlowError::Forbidden(format!("Order {order_id} does not belong to {buyer_id}")));
        }
        if order.order.status != OrderStatusType::Pending || order.order.payment_status == PaymentStatusType::Paid {
            return Err(OrderFlowError::NotPayable {
                order_number: order.order.order_number,
                status: order.order.status,
            });
        }
        if order.order.payment_reference.is_some() {
            return Err(OrderFlowError::PaymentAlreadyInitiated(order_id));
        }
        let (result, _) = self.issue_payment_intent(order).await?;
        Ok(result)
    }

    async fn issue_payment_intent(&self, mut order: FullOrder) -> Result<(CheckoutResult, FullOrder), OrderFlowError> {
        let metadata = IntentMetadata {
            order_id: order.order.id,
            order_number: order.order.order_number.to_string(),
            buyer_id: order.order.buyer_id.clone(),
            seller_id: order.order.seller_id.clone(),
        };
        let intent = self
            .gateway
            .create_payment_intent(order.order.total_amount, &order.order.currency, &metadata)
            .await
            .map_err(|e| {
                warn!(
                    "🔄️💳️ Could not create a payment intent for order {}. The order stays pending without a payment \
                     reference. {e}",
                    metadata.order_number
                );
                OrderFlowError::from(e)
            })?;
        order.order = self.db.attach_payment_reference(order.order.id, &intent.id).await?;
        let result = CheckoutResult {
            order_id: order.order.id,
            order_number: order.order.order_number.clone(),
            payment_token: intent.client_secret,
        };
        info!("🔄️📦️ Order {} is awaiting payment {}", result.order_number, intent.id);
        Ok((result, order))
    }

    /// Applies a verified payment event.
    ///
    /// Business outcomes, including duplicate deliveries and faults, are all `Ok`. Faults have been journaled for
    /// follow-up by the time this returns. Only infrastructure failures are returned as errors.
    pub async fn settle_payment(&self, event: GatewayEvent) -> Result<SettlementOutcome, OrderFlowError> {
        let outcome = match event {
            GatewayEvent::PaymentSucceeded { reference, amount, currency } => {
                debug!("🔄️💰️ Payment {reference} succeeded for {amount}");
                self.db.settle_payment_success(&reference, amount, currency.as_deref()).await?
            },
            GatewayEvent::PaymentFailed { reference, reason } => {
                debug!("🔄️💰️ Payment {reference} failed. {reason}");
                self.db.settle_payment_failure(&reference, &reason).await?
            },
            GatewayEvent::Unknown { kind, .. } => {
                info!("🔄️💰️ Ignoring payment event of type {kind}");
                return Ok(SettlementOutcome::Ignored { kind });
            },
        };
        match &outcome {
            SettlementOutcome::Settled(order) => {
                info!("🔄️💰️ First settlement of order {}", order.order.order_number);
                self.call_order_paid_hook(order).await;
            },
            SettlementOutcome::PaymentFailed { order, reason } => {
                self.call_payment_failed_hook(order, reason).await;
            },
            SettlementOutcome::Duplicate { reference, order_id, .. } => {
                info!("🔄️💰️ Duplicate delivery for payment {reference} (order #{order_id}). No changes made.");
            },
            SettlementOutcome::Stale { reference, order_id, payment_status } => {
                info!("🔄️💰️ Stale event for payment {reference} (order #{order_id} is {payment_status}). No changes.");
            },
            SettlementOutcome::Fault(fault) => {
                self.call_settlement_fault_hook(fault.clone()).await;
            },
            SettlementOutcome::Ignored { .. } => {},
        }
        Ok(outcome)
    }

    /// Applies a status change requested by the seller of the order.
    ///
    /// Only the seller who owns the order may change its status, and only along the legal transitions in
    /// [`crate::transitions`]. Moving to `shipped` requires an estimated delivery date, and moving to `delivered`
    /// stamps the delivery time. Notes are appended to the order's note log.
    ///
    /// Asking to cancel an order that is already canceled succeeds without changing anything (`changed` is `false`).
    ///
    /// If the order changes between being read and being written (e.g. a payment settles at the same moment),
    /// [`OrderFlowError::Conflict`] is returned, and the caller may retry.
    pub async fn update_order_status(
        &self,
        order_id: i64,
        actor: &str,
        new_status: OrderStatusType,
        extras: StatusUpdateExtras,
    ) -> Result<OrderStatusUpdate, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        if order.order.seller_id != actor {
            return Err(OrderFlowError::Forbidden(format!("Only the seller of order {order_id} can change its status")));
        }
        let old_status = order.order.status;
        if old_status == OrderStatusType::Canceled && new_status == OrderStatusType::Canceled {
            info!("🔄️📦️ Order {} is already canceled. Duplicate cancel ignored.", order.order.order_number);
            return Ok(OrderStatusUpdate::new(order, false));
        }
        check_transition(old_status, new_status)?;
        let estimated_delivery = match new_status {
            OrderStatusType::Shipped => {
                Some(extras.estimated_delivery.ok_or(OrderFlowError::MissingField("estimated_delivery".into()))?)
            },
            _ => None,
        };
        let delivered_at = (new_status == OrderStatusType::Delivered).then(Utc::now);
        let note = extras
            .notes
            .filter(|n| !n.trim().is_empty())
            .map(|note| NewOrderNote { author: actor.to_string(), note });
        let change = OrderStatusChange {
            order_id,
            expected_version: order.order.version,
            new_status,
            estimated_delivery,
            delivered_at,
            note,
        };
        let updated = self.db.apply_status_change(change).await.map_err(|e| {
            debug!("🔄️📦️ Status change on order {order_id} failed. {e}");
            OrderFlowError::from(e)
        })?;
        info!("🔄️📦️ Order {} moved from {old_status} to {new_status} by {actor}", updated.order.order_number);
        self.call_status_changed_hook(&updated, old_status).await;
        Ok(OrderStatusUpdate::new(updated, true))
    }

    async fn call_order_created_hook(&self, order: FullOrder) {
        for emitter in &self.producers.order_created_producer {
            debug!("🔄️📦️ Notifying order created hook subscribers");
            emitter.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
    }

    async fn call_order_paid_hook(&self, order: &FullOrder) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️📦️ Notifying order paid hook subscribers");
            emitter.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    async fn call_payment_failed_hook(&self, order: &Order, reason: &str) {
        for emitter in &self.producers.payment_failed_producer {
            debug!("🔄️📦️ Notifying payment failed hook subscribers");
            emitter.publish_event(PaymentFailedEvent::new(order.clone(), reason.to_string())).await;
        }
    }

    async fn call_status_changed_hook(&self, order: &FullOrder, old_status: OrderStatusType) {
        for emitter in &self.producers.status_changed_producer {
            debug!("🔄️📦️ Notifying status changed hook subscribers");
            emitter.publish_event(OrderStatusChangedEvent::new(order.clone(), old_status)).await;
        }
    }

    async fn call_settlement_fault_hook(&self, fault: SettlementFault) {
        for emitter in &self.producers.settlement_fault_producer {
            debug!("🔄️📦️ Notifying settlement fault hook subscribers");
            emitter.publish_event(SettlementFaultEvent::new(fault.clone())).await;
        }
    }
}
