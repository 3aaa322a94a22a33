//! Publish/subscribe registry with deferred delivery.
//!
//! Listeners are stored per event name in registration order. `emit` never
//! calls a listener itself: it snapshots the listeners registered for the
//! event and queues one delivery per listener onto a dedicated delivery
//! task. Deliveries run strictly in the order they were queued, so a
//! listener can never observe (or re-enter) the emitting call, and ordering
//! per event name matches emission order.
//!
//! The delivery task is spawned on the first Tokio runtime the dispatcher
//! meets: at construction, at [`EventDispatcher::start`], or at the first
//! `emit` inside a runtime. Deliveries queued before that wait in the
//! channel; none are dropped.
//!
//! # Panic-Free Guarantees
//!
//! - A panicking listener is caught and logged; remaining deliveries run.
//! - Lock poisoning is recovered rather than propagated.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A registered callback. Identity (for `off`) is the `Arc` allocation.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Wraps a closure into a [`Listener`].
pub fn listener<E, F>(f: F) -> Listener<E>
where
    F: Fn(&E) + Send + Sync + 'static,
{
    Arc::new(f)
}

type Registry<E> = HashMap<String, Vec<Listener<E>>>;

/// Receiving end of the delivery channel until a task takes it.
type PendingReceiver<E> = Option<mpsc::UnboundedReceiver<Delivery<E>>>;

/// One scheduled listener invocation.
struct Delivery<E> {
    event: String,
    listener: Listener<E>,
    payload: Arc<E>,
}

/// Event registry handle.
///
/// Cloning is cheap; all clones share the same listeners and delivery task.
/// The delivery task stops once every clone has been dropped and the
/// pending deliveries have run.
pub struct EventDispatcher<E> {
    listeners: Arc<Mutex<Registry<E>>>,
    deliveries: mpsc::UnboundedSender<Delivery<E>>,
    pending: Arc<Mutex<PendingReceiver<E>>>,
}

impl<E> Clone for EventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
            deliveries: self.deliveries.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<E> fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<String> = self.lock().keys().cloned().collect();
        f.debug_struct("EventDispatcher")
            .field("events", &events)
            .field("started", &self.is_started())
            .finish()
    }
}

impl<E: Send + Sync + 'static> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + Sync + 'static> EventDispatcher<E> {
    /// Creates a dispatcher, spawning its delivery task if called inside a
    /// Tokio runtime.
    pub fn new() -> Self {
        let (deliveries, receiver) = mpsc::unbounded_channel();
        let dispatcher = Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            deliveries,
            pending: Arc::new(Mutex::new(Some(receiver))),
        };

        if !dispatcher.start() {
            debug!("EventDispatcher created outside a Tokio runtime; delivery starts later");
        }
        dispatcher
    }

    /// Spawns the delivery task on the current runtime unless it already
    /// runs. Returns whether the task is running.
    pub fn start(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.is_none() {
            return true;
        }

        let Ok(runtime) = Handle::try_current() else {
            return false;
        };
        if let Some(receiver) = pending.take() {
            runtime.spawn(run_deliveries(receiver));
            debug!("Event delivery task started");
        }
        true
    }

    /// Schedules one deferred invocation of every listener registered for
    /// `event` right now, in registration order.
    ///
    /// Never blocks and never runs a listener on the caller's stack. With
    /// no listeners this is a no-op.
    pub fn emit(&self, event: &str, payload: E) {
        let snapshot: Vec<Listener<E>> = match self.lock().get(event) {
            Some(listeners) if !listeners.is_empty() => listeners.clone(),
            _ => return,
        };

        if !self.start() {
            debug!(event = %event, "No runtime yet; delivery deferred until one starts");
        }

        let payload = Arc::new(payload);
        for listener in snapshot {
            let delivery = Delivery {
                event: event.to_string(),
                listener,
                payload: Arc::clone(&payload),
            };
            if self.deliveries.send(delivery).is_err() {
                warn!(event = %event, "Delivery task stopped, dropping event");
                return;
            }
        }
    }
}

impl<E> EventDispatcher<E> {
    fn lock(&self) -> MutexGuard<'_, Registry<E>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the delivery task has been spawned.
    pub fn is_started(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// A handle that does not keep the registry or the delivery task alive.
    pub fn downgrade(&self) -> WeakEventDispatcher<E> {
        WeakEventDispatcher {
            listeners: Arc::downgrade(&self.listeners),
            deliveries: self.deliveries.downgrade(),
            pending: Arc::downgrade(&self.pending),
        }
    }

    /// Appends `listener` to the sequence for `event`.
    ///
    /// Registering the same listener twice stores it twice, and it is
    /// invoked twice per emission.
    pub fn on(&self, event: impl Into<String>, listener: Listener<E>) {
        let event = event.into();
        debug!(event = %event, "Listener registered");
        self.lock().entry(event).or_default().push(listener);
    }

    /// Removes every registration of `listener` for `event`.
    ///
    /// Returns the number of entries removed; zero if it was not registered.
    /// Deliveries already queued by an earlier `emit` still run.
    pub fn off(&self, event: &str, listener: &Listener<E>) -> usize {
        let mut registry = self.lock();
        let Some(listeners) = registry.get_mut(event) else {
            return 0;
        };

        let before = listeners.len();
        listeners.retain(|registered| !same_listener(registered, listener));
        let removed = before - listeners.len();

        if listeners.is_empty() {
            registry.remove(event);
        }

        debug!(event = %event, removed, "Listener removed");
        removed
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }
}

/// Non-owning counterpart of [`EventDispatcher`].
pub struct WeakEventDispatcher<E> {
    listeners: Weak<Mutex<Registry<E>>>,
    deliveries: mpsc::WeakUnboundedSender<Delivery<E>>,
    pending: Weak<Mutex<PendingReceiver<E>>>,
}

impl<E> Clone for WeakEventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Weak::clone(&self.listeners),
            deliveries: self.deliveries.clone(),
            pending: Weak::clone(&self.pending),
        }
    }
}

impl<E> fmt::Debug for WeakEventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEventDispatcher").finish_non_exhaustive()
    }
}

impl<E> WeakEventDispatcher<E> {
    /// The dispatcher, if any strong handle still exists.
    pub fn upgrade(&self) -> Option<EventDispatcher<E>> {
        Some(EventDispatcher {
            listeners: self.listeners.upgrade()?,
            deliveries: self.deliveries.upgrade()?,
            pending: self.pending.upgrade()?,
        })
    }
}

impl<E: Clone + Send + Sync + 'static> EventDispatcher<E> {
    /// Registers a listener that forwards every `event` payload into a
    /// channel.
    ///
    /// Returns the listener (for `off`) and the receiving end.
    pub fn subscribe(
        &self,
        event: impl Into<String>,
    ) -> (Listener<E>, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let forward: Listener<E> = listener(move |payload: &E| {
            // Receiver may be gone; nothing else to do then
            let _ = tx.send(payload.clone());
        });
        self.on(event, Arc::clone(&forward));
        (forward, rx)
    }
}

fn same_listener<E>(a: &Listener<E>, b: &Listener<E>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

async fn run_deliveries<E>(mut receiver: mpsc::UnboundedReceiver<Delivery<E>>) {
    while let Some(delivery) = receiver.recv().await {
        let Delivery {
            event,
            listener,
            payload,
        } = delivery;

        if catch_unwind(AssertUnwindSafe(|| listener(&payload))).is_err() {
            warn!(event = %event, "Listener panicked; continuing with remaining listeners");
        }
    }

    debug!("Event delivery task stopped");
}
