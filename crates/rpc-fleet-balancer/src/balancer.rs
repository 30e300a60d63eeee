use crate::item::BalancedItem;
use rpc_fleet_capacity::{CapacityConfig, CapacityMonitor};
use rpc_fleet_core::Clock;
use rpc_fleet_errorhandler::ErrorHandler;
use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

/// An ordered collection of [`BalancedItem`]s offering a "best current"
/// selector and a re-sort operation ("C4" in the design overview).
///
/// The published ordering is protected by a single [`RwLock`]: `sort()`
/// takes the write side, `with_context`/`peek`/`items` take the read side.
/// Concurrent `with_context` calls against the same balancer observe
/// *eventually* consistent ordering, matching the specification's
/// concurrency model — `sort()` is not required to be linearizable.
pub struct LoadBalancer<B> {
    order: RwLock<Vec<Arc<BalancedItem<B>>>>,
}

impl<B> LoadBalancer<B> {
    /// Builds a balancer over `backends`, giving each one its own
    /// [`CapacityMonitor`] (cloned from `capacity_config`) and sharing the
    /// single `error_handler` across all of them, since the error handler is
    /// a pure function with no per-item state.
    ///
    /// Backends are not added or removed after construction; this matches
    /// the minimal core's lifecycle (see the data model section of the crate
    /// documentation).
    pub fn new(
        backends: Vec<B>,
        capacity_config: CapacityConfig,
        error_handler: Arc<dyn ErrorHandler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let items = backends
            .into_iter()
            .enumerate()
            .map(|(index, backend)| {
                Arc::new(BalancedItem::new(
                    backend,
                    Arc::new(CapacityMonitor::new(capacity_config.clone(), clock.clone())),
                    Arc::clone(&error_handler),
                    clock.clone(),
                    index,
                ))
            })
            .collect();

        Self {
            order: RwLock::new(items),
        }
    }

    /// Builds a balancer from items that already carry distinct
    /// configuration (heterogeneous backends).
    pub fn from_items(items: Vec<Arc<BalancedItem<B>>>) -> Self {
        Self {
            order: RwLock::new(items),
        }
    }

    /// Returns the current head, stable until the next `sort()`.
    pub fn with_context(&self) -> Arc<BalancedItem<B>> {
        let order = self.order.read().unwrap();
        Arc::clone(&order[0])
    }

    /// Returns the item that *would* be head after a hypothetical re-sort
    /// using fresh samples, without mutating the published order.
    pub fn peek(&self) -> Arc<BalancedItem<B>> {
        let order = self.order.read().unwrap();
        order
            .iter()
            .min_by(|a, b| rank_order(a, b))
            .map(Arc::clone)
            .expect("load balancer must have at least one item")
    }

    /// Materializes a new ordering using fresh samples.
    pub fn sort(&self) {
        let mut order = self.order.write().unwrap();
        order.sort_by(|a, b| rank_order(a, b));
    }

    /// A read-only snapshot of the current order.
    pub fn items(&self) -> Vec<Arc<BalancedItem<B>>> {
        self.order.read().unwrap().clone()
    }

    pub fn size(&self) -> usize {
        self.order.read().unwrap().len()
    }
}

/// The ordering key (descending preference): skip status first (non-skipped
/// wins), then health (higher wins), then latency EWMA (lower wins), then
/// stable insertion index. Total and deterministic given the sample vector.
fn rank_order<B>(a: &Arc<BalancedItem<B>>, b: &Arc<BalancedItem<B>>) -> Ordering {
    let a_skipped = a.is_skipped();
    let b_skipped = b.is_skipped();
    if a_skipped != b_skipped {
        // non-skipped (false) sorts first
        return a_skipped.cmp(&b_skipped);
    }

    let health_below_floor_a = a.health() < a.capacity.config().min_health_for_selection;
    let health_below_floor_b = b.health() < b.capacity.config().min_health_for_selection;
    if health_below_floor_a != health_below_floor_b {
        return health_below_floor_a.cmp(&health_below_floor_b);
    }

    // Higher health wins: compare b vs a so higher sorts first.
    match b.health().partial_cmp(&a.health()) {
        Some(Ordering::Equal) | None => {}
        Some(ord) => return ord,
    }

    // Lower latency wins.
    match a.latency_ewma().partial_cmp(&b.latency_ewma()) {
        Some(Ordering::Equal) | None => {}
        Some(ord) => return ord,
    }

    a.insertion_index.cmp(&b.insertion_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_fleet_core::SystemClock;
    use rpc_fleet_errorhandler::ErrorHandlerConfig;
    use std::time::Duration;

    fn balancer(n: usize) -> LoadBalancer<usize> {
        LoadBalancer::new(
            (0..n).collect(),
            CapacityConfig::default(),
            ErrorHandlerConfig::default().build(),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn sort_is_total_and_respects_insertion_order_on_ties() {
        let lb = balancer(4);
        lb.sort();
        let order = lb.items();
        for window in order.windows(2) {
            assert_ne!(rank_order(&window[0], &window[1]), Ordering::Greater);
        }
    }

    #[test]
    fn lower_latency_sorts_first() {
        let lb = balancer(2);
        let items = lb.items();
        items[0].sample(Duration::from_millis(100));
        items[1].sample(Duration::from_millis(10));
        lb.sort();
        assert_eq!(lb.with_context().item, 1);
    }

    #[test]
    fn skipped_items_are_never_head() {
        let lb = balancer(2);
        let items = lb.items();
        items[0].skip_for(Duration::from_secs(60));
        lb.sort();
        assert_eq!(lb.with_context().item, 1);
    }

    #[test]
    fn peek_does_not_mutate_published_order() {
        let lb = balancer(2);
        let items = lb.items();
        items[1].sample(Duration::from_millis(1));
        // head is still item 0 until sort() is called...
        assert_eq!(lb.with_context().item, 0);
        // ...even though peek() reports what *would* become head.
        assert_eq!(lb.peek().item, 1);
        assert_eq!(lb.with_context().item, 0);
    }
}
