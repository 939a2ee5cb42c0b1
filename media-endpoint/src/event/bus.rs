//! Observer registry and dispatch for lifecycle events.
//!
//! Delivery is synchronous and follows registration order. A failing
//! observer, whether it returns an error or panics, is reported to the
//! [`DiagnosticSink`] and the remaining observers still receive the event.

use log::{trace, warn};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::{LifecycleEvent, LifecycleEventKind};

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;
pub type ObserverResult = std::result::Result<(), ObserverError>;

/// A lifecycle callback. Identity is the `Arc` allocation, so registering a
/// clone of the same `Observer` twice keeps a single entry.
pub type Observer = Arc<dyn Fn(&LifecycleEvent) -> ObserverResult + Send + Sync>;

/// Wraps a closure into an [`Observer`].
pub fn observer<F>(f: F) -> Observer
where
    F: Fn(&LifecycleEvent) -> ObserverResult + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_observer(a: &Observer, b: &Observer) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Why an observer did not handle an event.
#[derive(Debug)]
pub enum ObserverFailure {
    Error(ObserverError),
    Panic(String),
}

impl fmt::Display for ObserverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverFailure::Error(err) => write!(f, "returned error: {err}"),
            ObserverFailure::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// Receives observer failures, which are never returned to the emitter.
/// A panicking sink is logged and otherwise ignored.
pub trait DiagnosticSink: Send + Sync {
    fn observer_failed(&self, event: &LifecycleEvent, failure: &ObserverFailure);
}

/// Default sink, writing through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnosticSink;

impl DiagnosticSink for LogDiagnosticSink {
    fn observer_failed(&self, event: &LifecycleEvent, failure: &ObserverFailure) {
        warn!("observer for {event} {failure}");
    }
}

pub struct EventBus {
    observers: HashMap<LifecycleEventKind, Vec<Observer>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(Arc::new(LogDiagnosticSink))
    }
}

impl EventBus {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            observers: HashMap::new(),
            sink,
        }
    }

    /// Appends `observer` to the list for `kind`. Returns false when the
    /// same observer is already registered for that kind.
    pub fn register(&mut self, kind: LifecycleEventKind, observer: Observer) -> bool {
        let list = self.observers.entry(kind).or_default();
        if list.iter().any(|o| same_observer(o, &observer)) {
            return false;
        }
        list.push(observer);
        true
    }

    /// Removes `observer` from the list for `kind`. Returns false when it was
    /// not registered.
    pub fn unregister(&mut self, kind: LifecycleEventKind, observer: &Observer) -> bool {
        let Some(list) = self.observers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|o| !same_observer(o, observer));
        before != list.len()
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn observer_count(&self, kind: LifecycleEventKind) -> usize {
        self.observers.get(&kind).map_or(0, Vec::len)
    }

    /// Snapshots the observers currently registered for the event's kind.
    ///
    /// The snapshot is delivered later, without the owner's lock held.
    pub(crate) fn dispatch(&self, event: LifecycleEvent) -> Dispatch {
        let observers = self
            .observers
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        Dispatch {
            event,
            observers,
            sink: Arc::clone(&self.sink),
        }
    }
}

pub(crate) struct Dispatch {
    event: LifecycleEvent,
    observers: Vec<Observer>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Dispatch {
    /// Invokes every observer in order. Returns how many handled the event.
    pub(crate) fn deliver(self) -> usize {
        let mut delivered = 0;

        for observer in &self.observers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| observer(&self.event)));
            let failure = match result {
                Ok(Ok(())) => {
                    delivered += 1;
                    continue;
                }
                Ok(Err(err)) => ObserverFailure::Error(err),
                Err(payload) => ObserverFailure::Panic(panic_message(payload.as_ref())),
            };
            let reported = panic::catch_unwind(AssertUnwindSafe(|| {
                self.sink.observer_failed(&self.event, &failure)
            }));
            if reported.is_err() {
                warn!("diagnostic sink panicked on {} ({failure})", self.event);
            }
        }

        trace!(
            "delivered {} to {delivered}/{} observers",
            self.event,
            self.observers.len()
        );

        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
