use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderCreatedEvent,
    OrderPaidEvent,
    OrderStatusChangedEvent,
    PaymentFailedEvent,
    SettlementFaultEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub payment_failed_producer: Vec<EventProducer<PaymentFailedEvent>>,
    pub status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub settlement_fault_producer: Vec<EventProducer<SettlementFaultEvent>>,
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
    pub on_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_settlement_fault: Option<EventHandler<SettlementFaultEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let EventHooks { on_order_created, on_order_paid, on_payment_failed, on_status_changed, on_settlement_fault } =
            hooks;
        Self {
            on_order_created: on_order_created.map(|f| EventHandler::new("order_created", buffer_size, f)),
            on_order_paid: on_order_paid.map(|f| EventHandler::new("order_paid", buffer_size, f)),
            on_payment_failed: on_payment_failed.map(|f| EventHandler::new("payment_failed", buffer_size, f)),
            on_status_changed: on_status_changed.map(|f| EventHandler::new("status_changed", buffer_size, f)),
            on_settlement_fault: on_settlement_fault.map(|f| EventHandler::new("settlement_fault", buffer_size, f)),
        }
    }

    /// One producer for every registered hook. Producers for hooks that were not registered stay empty, and
    /// publishing to them is a no-op.
    pub fn producers(&self) -> EventProducers {
        EventProducers {
            order_created_producer: self.on_order_created.iter().map(EventHandler::subscribe).collect(),
            order_paid_producer: self.on_order_paid.iter().map(EventHandler::subscribe).collect(),
            payment_failed_producer: self.on_payment_failed.iter().map(EventHandler::subscribe).collect(),
            status_changed_producer: self.on_status_changed.iter().map(EventHandler::subscribe).collect(),
            settlement_fault_producer: self.on_settlement_fault.iter().map(EventHandler::subscribe).collect(),
        }
    }

    /// Spawns a task for every registered handler. Each one runs until all of its producers have been dropped.
    pub async fn start_handlers(self) {
        let count = [
            self.on_order_created.map(spawn_handler),
            self.on_order_paid.map(spawn_handler),
            self.on_payment_failed.map(spawn_handler),
            self.on_status_changed.map(spawn_handler),
            self.on_settlement_fault.map(spawn_handler),
        ]
        .into_iter()
        .flatten()
        .count();
        debug!("📬️ Started {count} event handlers");
    }
}

fn spawn_handler<E: Send + 'static>(handler: EventHandler<E>) -> &'static str {
    let name = handler.name();
    tokio::spawn(handler.start_handler());
    name
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
    pub on_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_settlement_fault: Option<Handler<SettlementFaultEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    /// Operators will usually want to hook this one up to an alerting channel. Overbooked settlements need a refund.
    pub fn on_settlement_fault<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SettlementFaultEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_settlement_fault = Some(Arc::new(f));
        self
    }
}
