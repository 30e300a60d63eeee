//! Event system shared by the dispatcher and the partitioned table fetcher.
//!
//! Gives embedding applications a way to observe dispatch/fetch activity
//! without forcing a specific logging backend; each component still emits
//! `tracing` events directly for the logging contract (see crate docs),
//! independent of whether any listener is registered.

#[cfg(feature = "tracing")]
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Implemented by the event enum of each component (`DispatchEvent`,
/// `FetchEvent`, ...).
pub trait FleetEvent: Send + Sync + fmt::Debug {
    /// A short machine-readable event kind, e.g. `"retry"`, `"partition_loaded"`.
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// The diagnostic name of the component instance that emitted it (the
    /// dispatcher's `retryLogContext`, or the fetcher's partition id).
    fn pattern_name(&self) -> &str;
}

/// Implemented by anything that wants to receive events of type `E`.
pub trait EventListener<E: FleetEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners, cheap to clone and share across tasks.
#[derive(Clone)]
pub struct EventListeners<E: FleetEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: FleetEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to every registered listener.
    ///
    /// A panicking listener does not prevent the remaining listeners from
    /// running; with the `tracing` feature enabled the panic is logged as a
    /// warning, and with `metrics` enabled a counter is incremented.
    pub fn emit(&self, event: &E) {
        for (index, listener) in self.listeners.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            if let Err(_panic_payload) = result {
                #[cfg(feature = "tracing")]
                log_listener_panic(index, event, _panic_payload.as_ref());

                #[cfg(feature = "metrics")]
                record_listener_panic_metric(event);

                #[cfg(not(feature = "tracing"))]
                let _ = index;

                #[cfg(not(any(feature = "tracing", feature = "metrics")))]
                let _ = _panic_payload;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: FleetEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A function-based listener, for cases too small to warrant a named type.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<E>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: FleetEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

#[cfg(feature = "tracing")]
fn log_listener_panic<E: FleetEvent>(index: usize, event: &E, panic_payload: &(dyn Any + Send)) {
    let panic_message = panic_payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic_payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    tracing::warn!(
        listener_index = index,
        pattern = event.pattern_name(),
        event_type = event.event_type(),
        panic_message = %panic_message,
        "fleet event listener panicked"
    );
}

#[cfg(feature = "metrics")]
fn record_listener_panic_metric<E: FleetEvent>(event: &E) {
    let pattern_label = event.pattern_name().to_string();
    let event_type_label = event.event_type().to_string();

    metrics::counter!(
        "rpc_fleet_event_listener_panics_total",
        "pattern" => pattern_label,
        "event_type" => event_type_label
    )
    .increment(1);
}
