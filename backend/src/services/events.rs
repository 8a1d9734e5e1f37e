//! Change notifications for sensor and observation updates.
//!
//! Listeners subscribe explicitly and keep the returned handle to unsubscribe.
//! A listener that fails or panics does not stop delivery to the others; its
//! failure is reported back to the publisher as a response message.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{ObservationId, ProcedureId, TemplateId};

/// Something that changed in a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SosEvent {
    SensorRegistered { service: String, procedure: ProcedureId },
    SensorDeleted { service: String, procedure: ProcedureId },
    ObservationsInserted {
        service: String,
        procedure: ProcedureId,
        observations: Vec<ObservationId>,
    },
    ObservationsRemoved {
        service: String,
        procedure: ProcedureId,
        series: usize,
    },
    TemplateCreated { service: String, template: TemplateId },
    ServiceStateChanged { service: String, state: String },
}

/// Identifies one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionHandle(Uuid);

/// Outcome of delivering an event to one listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EventResponse {
    Delivered { listener: String },
    Failed { listener: String, message: String },
}

impl EventResponse {
    pub fn is_failure(&self) -> bool {
        matches!(self, EventResponse::Failed { .. })
    }
}

type Listener = Arc<dyn Fn(&SosEvent) -> anyhow::Result<()> + Send + Sync>;

struct Subscription {
    handle: SubscriptionHandle,
    name: String,
    listener: Listener,
}

/// Registry of event listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under a display `name`.
    pub fn subscribe<F>(&self, name: impl Into<String>, listener: F) -> SubscriptionHandle
    where
        F: Fn(&SosEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handle = SubscriptionHandle(Uuid::new_v4());
        self.subscriptions.write().push(Subscription {
            handle,
            name: name.into(),
            listener: Arc::new(listener),
        });
        handle
    }

    /// Remove a subscription; false when the handle is unknown.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.handle != handle);
        subscriptions.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Deliver `event` to every listener, in subscription order.
    ///
    /// Listeners run outside the registry lock, so they may subscribe or
    /// unsubscribe themselves.
    pub fn publish(&self, event: &SosEvent) -> Vec<EventResponse> {
        let targets: Vec<(String, Listener)> = self
            .subscriptions
            .read()
            .iter()
            .map(|s| (s.name.clone(), Arc::clone(&s.listener)))
            .collect();

        targets
            .into_iter()
            .map(|(name, listener)| {
                match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                    Ok(Ok(())) => EventResponse::Delivered { listener: name },
                    Ok(Err(e)) => {
                        log::warn!("Listener {} failed: {:#}", name, e);
                        EventResponse::Failed {
                            listener: name,
                            message: e.to_string(),
                        }
                    }
                    Err(panic) => {
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "listener panicked".to_string());
                        log::warn!("Listener {} panicked: {}", name, message);
                        EventResponse::Failed {
                            listener: name,
                            message,
                        }
                    }
                }
            })
            .collect()
    }
}
