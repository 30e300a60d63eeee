use crate::config::{CallContext, DispatchMode};
use crate::events::DispatchEvent;
use rpc_fleet_balancer::{BalancedItem, LoadBalancer};
use rpc_fleet_capacity::ClaimContext;
use rpc_fleet_core::{Clock, ErrorClass, EventListeners, FleetError};
use std::future::Future;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Errors produced by a user-supplied operation must be classifiable so the
/// error handler (C2) and capacity monitor (C1) can react to them.
///
/// `is_cancelled` is a hook for callers that want to surface task
/// cancellation as [`FleetError::Cancelled`] instead of a fatal application
/// error; the default treats every error as a normal application failure.
pub trait DispatchError: std::error::Error + Send + Sync + 'static {
    fn class(&self) -> ErrorClass;

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// The retry/failover state machine ("C5"): composes a [`LoadBalancer`] with
/// a user-supplied async operation, handling selection, capacity claims, and
/// retries.
///
/// State machine: `Selecting -> Invoking -> {Succeeded | Failing}`,
/// `Failing -> (Backoff | Rotate | Give-up)`, `Backoff -> Selecting`,
/// `Rotate -> Selecting`. Terminal states are `Succeeded`, `Give-up`
/// ([`FleetError::GivenUp`]), and, courteous mode only, `NoCapacity`
/// ([`FleetError::NoCapacity`]).
///
/// The loop below is straight-line `async fn` with explicit `.await` points
/// at the operation future, the backoff sleep, and the capacity sleep — no
/// hand-written `Future`/`Poll` state machine is needed.
pub struct CallDispatcher<B> {
    balancer: Arc<LoadBalancer<B>>,
    clock: Arc<dyn Clock>,
    call_context: CallContext,
    claim_context: ClaimContext,
    retry_log_context: String,
    listeners: EventListeners<DispatchEvent>,
}

impl<B> CallDispatcher<B> {
    pub fn new(
        balancer: Arc<LoadBalancer<B>>,
        clock: Arc<dyn Clock>,
        call_context: CallContext,
        retry_log_context: impl Into<String>,
    ) -> Self {
        Self {
            balancer,
            clock,
            call_context,
            claim_context: ClaimContext::UNRESTRICTED,
            retry_log_context: retry_log_context.into(),
            listeners: EventListeners::new(),
        }
    }

    pub fn with_claim_context(mut self, claim_context: ClaimContext) -> Self {
        self.claim_context = claim_context;
        self
    }

    pub fn listeners(&self) -> &EventListeners<DispatchEvent> {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut EventListeners<DispatchEvent> {
        &mut self.listeners
    }

    /// Executes `operation` against the best available backend, retrying and
    /// failing over per `call_context`.
    ///
    /// Returns `Err(FleetError::NoCapacity)` when courteous mode exhausts its
    /// claim attempts without `force_call`; `Err(FleetError::GivenUp)` when
    /// the error handler signals give-up or `max_retries` is exceeded;
    /// `Err(FleetError::Cancelled)` when the operation's error reports
    /// [`DispatchError::is_cancelled`].
    pub async fn get<Op, Fut, R, E>(&self, operation: Op) -> Result<R, FleetError<E>>
    where
        Op: Fn(Arc<BalancedItem<B>>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: DispatchError,
    {
        let mut selected = match self.dispatch_once().await {
            Some(item) => item,
            None => return Err(self.no_capacity()),
        };

        let mut start = self.call_context.measure_call_time.then(|| self.clock.now());
        let num_items = self.balancer.size() as u32;
        let mut error_count = 0u32;
        let mut retry = 0u32;
        let mut call = operation(Arc::clone(&selected));

        loop {
            match call.await {
                Ok(result) => {
                    if let Some(t0) = start {
                        selected.sample(self.clock.now().duration_since(t0));
                    }
                    selected.capacity.on_success();
                    self.emit_success(retry + 1);
                    return Ok(result);
                }
                Err(error) => {
                    if error.is_cancelled() {
                        return Err(FleetError::Cancelled);
                    }

                    error_count += 1;
                    let class = error.class();
                    selected.capacity.on_error(class);
                    let verdict = selected.error_handler.verdict(error_count, class);
                    self.balancer.sort();

                    if verdict.is_give_up() || error_count > self.call_context.max_retries {
                        self.emit_give_up(error_count);
                        return Err(FleetError::GivenUp {
                            retry_log_context: self.retry_log_context.clone(),
                            source: error,
                        });
                    }

                    let peeked = self.balancer.peek();
                    let failing_over = retry + 1 < num_items && !Arc::ptr_eq(&peeked, &selected);
                    retry += 1;

                    if failing_over {
                        // Move to a different item: reset the per-item retry
                        // budget rather than carrying the old item's count.
                        error_count = retry.saturating_sub(1);
                        self.emit_failover(retry);
                    } else if let Some(delay) = verdict.delay() {
                        if !delay.is_zero() {
                            self.emit_backoff(error_count, delay);
                            self.clock.sleep(delay).await;
                        }
                    }

                    selected = match self.dispatch_once().await {
                        Some(item) => item,
                        None => return Err(self.no_capacity()),
                    };
                    start = self.call_context.measure_call_time.then(|| self.clock.now());
                    call = operation(Arc::clone(&selected));
                }
            }
        }
    }

    /// Selects (and, under greedy/courteous, claims capacity on) the item to
    /// invoke next. Returns `None` only when courteous mode exhausts
    /// `max_try_claim` without `force_call`.
    async fn dispatch_once(&self) -> Option<Arc<BalancedItem<B>>> {
        match self.call_context.mode {
            DispatchMode::Unchecked => Some(self.balancer.with_context()),
            DispatchMode::Greedy => {
                let selected = self.balancer.with_context();
                selected
                    .capacity
                    .claim(&self.claim_context, self.call_context.call_weight);
                Some(selected)
            }
            DispatchMode::Courteous => self.dispatch_courteous().await,
        }
    }

    async fn dispatch_courteous(&self) -> Option<Arc<BalancedItem<B>>> {
        let weight = self.call_context.call_weight;
        let ctx = &self.claim_context;
        let mut selected = self.balancer.with_context();

        for _attempt in 0..self.call_context.max_try_claim {
            if selected.capacity.try_claim(ctx, weight) {
                return Some(selected);
            }

            if self.balancer.size() > 1 {
                self.balancer.sort();
                let previous = Arc::clone(&selected);
                selected = self.balancer.with_context();

                if !Arc::ptr_eq(&selected, &previous) && selected.capacity.has_capacity(ctx, weight)
                {
                    continue;
                }

                let mut rotated = false;
                for item in self.balancer.items() {
                    if !Arc::ptr_eq(&item, &previous) && item.capacity.has_capacity(ctx, weight) {
                        selected = item;
                        rotated = true;
                        break;
                    }
                }
                if rotated {
                    continue;
                }
            }

            let delay = selected.capacity.duration_until(ctx, weight);
            if delay.is_zero() {
                selected.capacity.claim(ctx, weight);
                return Some(selected);
            }
            self.clock.sleep(delay).await;
            self.balancer.sort();
            selected = self.balancer.with_context();
        }

        if self.call_context.force_call {
            selected.capacity.claim(ctx, weight);
            Some(selected)
        } else {
            None
        }
    }

    fn no_capacity<E>(&self) -> FleetError<E> {
        self.emit_no_capacity();
        FleetError::NoCapacity
    }

    fn emit_success(&self, attempts: u32) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            retry_log_context = %self.retry_log_context,
            attempts,
            "call succeeded"
        );
        #[cfg(feature = "metrics")]
        counter!("rpc_fleet_dispatch_total", "result" => "success").increment(1);
        self.listeners.emit(&DispatchEvent::Success {
            retry_log_context: self.retry_log_context.clone(),
            timestamp: self.clock.now(),
            attempts,
        });
    }

    fn emit_backoff(&self, error_count: u32, delay: std::time::Duration) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            retry_log_context = %self.retry_log_context,
            error_count,
            delay_ms = delay.as_millis(),
            "call failed, sleeping before retry"
        );
        self.listeners.emit(&DispatchEvent::Backoff {
            retry_log_context: self.retry_log_context.clone(),
            timestamp: self.clock.now(),
            error_count,
            delay,
        });
    }

    fn emit_failover(&self, retry: u32) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            retry_log_context = %self.retry_log_context,
            retry,
            "rotating to a different backend"
        );
        self.listeners.emit(&DispatchEvent::Failover {
            retry_log_context: self.retry_log_context.clone(),
            timestamp: self.clock.now(),
            retry,
        });
    }

    fn emit_give_up(&self, attempts: u32) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            retry_log_context = %self.retry_log_context,
            attempts,
            "giving up on call"
        );
        #[cfg(feature = "metrics")]
        counter!("rpc_fleet_dispatch_total", "result" => "give_up").increment(1);
        self.listeners.emit(&DispatchEvent::GiveUp {
            retry_log_context: self.retry_log_context.clone(),
            timestamp: self.clock.now(),
            attempts,
        });
    }

    fn emit_no_capacity(&self) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            retry_log_context = %self.retry_log_context,
            "no capacity available across balancer"
        );
        #[cfg(feature = "metrics")]
        counter!("rpc_fleet_dispatch_total", "result" => "no_capacity").increment(1);
        self.listeners.emit(&DispatchEvent::NoCapacity {
            retry_log_context: self.retry_log_context.clone(),
            timestamp: self.clock.now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_fleet_capacity::CapacityConfig;
    use rpc_fleet_core::TestClock;
    use rpc_fleet_errorhandler::ErrorHandlerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct OpError(ErrorClass);

    impl std::fmt::Display for OpError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "op error: {:?}", self.0)
        }
    }
    impl std::error::Error for OpError {}
    impl DispatchError for OpError {
        fn class(&self) -> ErrorClass {
            self.0
        }
    }

    fn dispatcher(
        backends: Vec<&'static str>,
        clock: Arc<dyn Clock>,
        call_context: CallContext,
    ) -> CallDispatcher<&'static str> {
        let balancer = Arc::new(LoadBalancer::new(
            backends,
            CapacityConfig::default(),
            ErrorHandlerConfig::default().build(),
            clock.clone(),
        ));
        CallDispatcher::new(balancer, clock, call_context, "test")
    }

    #[tokio::test]
    async fn happy_path_returns_result_and_records_success() {
        let clock = Arc::new(TestClock::new());
        let dispatcher = dispatcher(vec!["a"], clock, CallContext::default());

        let result = dispatcher
            .get(|_item| async move { Ok::<_, OpError>(42) })
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn failover_rotates_away_from_an_unhealthy_item() {
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
        let dispatcher = dispatcher(
            vec!["a", "b"],
            clock,
            CallContext::builder().max_retries(5).build(),
        );

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let result = dispatcher
            .get(move |item| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if item.item == "a" {
                        Err(OpError(ErrorClass::Transient))
                    } else {
                        Ok(99)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 99);
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn fatal_error_gives_up_without_exhausting_retries() {
        let clock = Arc::new(TestClock::new());
        let dispatcher = dispatcher(vec!["a"], clock, CallContext::default());

        let err = dispatcher
            .get(|_item| async move { Err::<i32, _>(OpError(ErrorClass::Fatal)) })
            .await
            .unwrap_err();
        assert!(err.is_given_up());
    }

    #[tokio::test]
    async fn courteous_no_capacity_signals_without_force_call() {
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
        let call_context = CallContext::builder()
            .mode(DispatchMode::Courteous)
            .max_try_claim(2)
            .force_call(false)
            .build();
        let balancer = Arc::new(LoadBalancer::new(
            vec!["a"],
            CapacityConfig::builder().tokens(0).refill_per_second(0.0).build(),
            ErrorHandlerConfig::default().build(),
            clock.clone(),
        ));
        let dispatcher = CallDispatcher::new(balancer, clock, call_context, "test");

        let err = dispatcher
            .get(|_item| async move { Ok::<_, OpError>(1) })
            .await
            .unwrap_err();
        assert!(err.is_no_capacity());
    }
}
