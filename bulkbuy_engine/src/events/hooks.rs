use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, GroupEvent, GroupFinalizedEvent, Handler};

/// The set of producers handed to the flow API. Every state change is published to
/// each producer in `group_event_producer`; terminal outcomes additionally go to
/// `group_finalized_producer`.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub group_event_producer: Vec<EventProducer<GroupEvent>>,
    pub group_finalized_producer: Vec<EventProducer<GroupFinalizedEvent>>,
}

pub struct EventHandlers {
    pub on_group_event: Option<EventHandler<GroupEvent>>,
    pub on_group_finalized: Option<EventHandler<GroupFinalizedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_group_event = hooks.on_group_event.map(|f| EventHandler::new(buffer_size, f));
        let on_group_finalized = hooks.on_group_finalized.map(|f| EventHandler::new(buffer_size, f));
        Self { on_group_event, on_group_finalized }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_group_event {
            result.group_event_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_group_finalized {
            result.group_finalized_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns one task per configured handler. Each task runs until every producer
    /// for its channel has been dropped; the returned handles can be awaited for a
    /// clean drain on shutdown.
    pub fn start_handlers(self) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(handler) = self.on_group_event {
            handles.push(tokio::spawn(async move {
                handler.start_handler().await;
            }));
        }
        if let Some(handler) = self.on_group_finalized {
            handles.push(tokio::spawn(async move {
                handler.start_handler().await;
            }));
        }
        handles
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_group_event: Option<Handler<GroupEvent>>,
    pub on_group_finalized: Option<Handler<GroupFinalizedEvent>>,
}

impl EventHooks {
    pub fn on_group_event<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(GroupEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_group_event = Some(Arc::new(f));
        self
    }

    pub fn on_group_finalized<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(GroupFinalizedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_group_finalized = Some(Arc::new(f));
        self
    }
}
