use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::{
    config::EngineConfig,
    events::{
        AllocationFailedEvent,
        EventHandler,
        EventProducer,
        Handler,
        MutationRequestedEvent,
        MutationStatusChangedEvent,
        OrderAllocatedEvent,
    },
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The publishing side of the configured hooks. Cheap to clone; every API that emits events holds a copy.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub mutation_requested_producer: Vec<EventProducer<MutationRequestedEvent>>,
    pub mutation_status_changed_producer: Vec<EventProducer<MutationStatusChangedEvent>>,
    pub order_allocated_producer: Vec<EventProducer<OrderAllocatedEvent>>,
    pub allocation_failed_producer: Vec<EventProducer<AllocationFailedEvent>>,
}

impl EventProducers {
    pub async fn publish_mutation_requested(&self, event: MutationRequestedEvent) {
        for producer in &self.mutation_requested_producer {
            trace!("📬️ Publishing mutation requested event for {}", event.mutation.id);
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_mutation_status_changed(&self, event: MutationStatusChangedEvent) {
        for producer in &self.mutation_status_changed_producer {
            trace!("📬️ Publishing status change event for mutation {}", event.mutation.id);
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_allocated(&self, event: OrderAllocatedEvent) {
        for producer in &self.order_allocated_producer {
            trace!("📬️ Publishing order allocated event for order {}", event.order_id);
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_allocation_failed(&self, event: AllocationFailedEvent) {
        for producer in &self.allocation_failed_producer {
            trace!("📬️ Publishing allocation failed event for order {}", event.order_id);
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_mutation_requested: Option<EventHandler<MutationRequestedEvent>>,
    pub on_mutation_status_changed: Option<EventHandler<MutationStatusChangedEvent>>,
    pub on_order_allocated: Option<EventHandler<OrderAllocatedEvent>>,
    pub on_allocation_failed: Option<EventHandler<AllocationFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_mutation_requested = hooks.on_mutation_requested.map(|f| EventHandler::new(buffer_size, f));
        let on_mutation_status_changed = hooks.on_mutation_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_order_allocated = hooks.on_order_allocated.map(|f| EventHandler::new(buffer_size, f));
        let on_allocation_failed = hooks.on_allocation_failed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_mutation_requested, on_mutation_status_changed, on_order_allocated, on_allocation_failed }
    }

    /// Handlers whose channels hold `config.event_buffer_size` events each.
    pub fn from_config(config: &EngineConfig, hooks: EventHooks) -> Self {
        debug!("📬️ Event channels hold {} events each", config.event_buffer_size);
        Self::new(config.event_buffer_size.max(1), hooks)
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_mutation_requested {
            result.mutation_requested_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_mutation_status_changed {
            result.mutation_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_allocated {
            result.order_allocated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_allocation_failed {
            result.allocation_failed_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per configured handler. Each task ends once every producer handed out by
    /// [`Self::producers`] has been dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_mutation_requested {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_mutation_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_allocated {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_allocation_failed {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_mutation_requested: Option<Handler<MutationRequestedEvent>>,
    pub on_mutation_status_changed: Option<Handler<MutationStatusChangedEvent>>,
    pub on_order_allocated: Option<Handler<OrderAllocatedEvent>>,
    pub on_allocation_failed: Option<Handler<AllocationFailedEvent>>,
}

impl EventHooks {
    pub fn on_mutation_requested<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MutationRequestedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_mutation_requested = Some(Arc::new(f));
        self
    }

    pub fn on_mutation_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MutationStatusChangedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_mutation_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_order_allocated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAllocatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_allocated = Some(Arc::new(f));
        self
    }

    pub fn on_allocation_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AllocationFailedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_allocation_failed = Some(Arc::new(f));
        self
    }
}
