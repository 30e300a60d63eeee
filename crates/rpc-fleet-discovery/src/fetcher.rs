use crate::cache::{partition_file_path, read_partition_cache, write_partition_cache};
use crate::config::DiscoveryConfig;
use crate::events::FetchEvent;
use crate::table::LookupTable;
use futures::future::BoxFuture;
use rpc_fleet_balancer::BalancedItem;
use rpc_fleet_core::{Clock, EventListeners, FleetEvent as _};
use rpc_fleet_dispatcher::{CallDispatcher, DispatchError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[cfg(feature = "metrics")]
use metrics::counter;

use arc_swap::ArcSwapOption;

/// One partition's fetch call, dispatched through the [`CallDispatcher`].
pub type PartitionHandler<B, T, E> =
    Arc<dyn Fn(Arc<BalancedItem<B>>) -> BoxFuture<'static, Result<Vec<Arc<T>>, E>> + Send + Sync>;

/// Something that can hand the discovery index a read-only snapshot of
/// `allTables`, without exposing how it is kept up to date.
///
/// [`PartitionedTableFetcher`] is the only implementation; the indirection
/// lets [`crate::DiscoveryIndex`] stay generic over `T` alone, matching the
/// specification's claim that the query path never calls the dispatcher.
pub trait TableSource<T>: Send + Sync {
    fn all_tables(&self) -> Option<Arc<Vec<Arc<T>>>>;
}

/// Concurrency-controlled crawler that populates each of `P` partitions with
/// tables via calls dispatched through the [`CallDispatcher`] ("C6").
pub struct PartitionedTableFetcher<B, T, E> {
    dispatcher: Arc<CallDispatcher<B>>,
    partition_handlers: Vec<PartitionHandler<B, T, E>>,
    config: DiscoveryConfig,
    clock: Arc<dyn Clock>,
    partitions: Vec<ArcSwapOption<Vec<Arc<T>>>>,
    all_tables: ArcSwapOption<Vec<Arc<T>>>,
    initialized: AtomicBool,
    initialized_notify: Notify,
    listeners: EventListeners<FetchEvent>,
}

impl<B, T, E> PartitionedTableFetcher<B, T, E>
where
    B: Send + Sync + 'static,
    T: LookupTable,
    E: DispatchError,
{
    pub fn new(
        dispatcher: Arc<CallDispatcher<B>>,
        partition_handlers: Vec<PartitionHandler<B, T, E>>,
        config: DiscoveryConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        assert_eq!(
            partition_handlers.len(),
            config.num_partitions as usize,
            "one partition call handler is required per configured partition"
        );

        let partitions = (0..partition_handlers.len())
            .map(|_| ArcSwapOption::from(None))
            .collect();

        Self {
            dispatcher,
            partition_handlers,
            config,
            clock,
            partitions,
            all_tables: ArcSwapOption::from(None),
            initialized: AtomicBool::new(false),
            initialized_notify: Notify::new(),
            listeners: EventListeners::new(),
        }
    }

    pub fn listeners(&self) -> &EventListeners<FetchEvent> {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut EventListeners<FetchEvent> {
        &mut self.listeners
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Resolves once the index has loaded at least
    /// [`DiscoveryConfig::initialized_threshold`] partitions, from either the
    /// disk cache or a live refresh.
    pub async fn wait_initialized(&self) {
        if self.is_initialized() {
            return;
        }
        let notified = self.initialized_notify.notified();
        if self.is_initialized() {
            return;
        }
        notified.await;
    }

    /// Loads whatever partitions are present under
    /// [`DiscoveryConfig::cache_directory`]. Indices beyond
    /// `config.num_partitions` are never consulted, so stray extra files are
    /// silently ignored.
    pub fn bootstrap_from_cache(self: &Arc<Self>) {
        let Some(directory) = self.config.cache_directory.clone() else {
            return;
        };

        for (partition, slot) in self.partitions.iter().enumerate() {
            let path = partition_file_path(&directory, partition as u32);
            match read_partition_cache(&path, partition as u32) {
                Ok(Some(raw)) => {
                    let tables: Vec<Arc<T>> = raw
                        .into_iter()
                        .filter_map(|(address, data)| {
                            T::deserialize(address, &data).ok().map(Arc::new)
                        })
                        .collect();
                    slot.store(Some(Arc::new(tables)));
                }
                Ok(None) => {}
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(partition, "partition cache file is corrupt, ignoring");
                }
            }
        }

        self.join_partitions();
        self.maybe_signal_initialized();
    }

    /// Launches `max_concurrent_requests` workers pulling the next partition
    /// index from a shared counter, fetches each through the dispatcher, and
    /// republishes `allTables`. If `reload_delay` is set, sleeps and repeats
    /// indefinitely; callers typically run this via `tokio::spawn`.
    pub async fn run(self: Arc<Self>) {
        loop {
            self.refresh_once().await;
            match self.config.reload_delay {
                Some(delay) => self.clock.sleep(delay).await,
                None => return,
            }
        }
    }

    pub async fn refresh_once(self: &Arc<Self>) {
        let num_partitions = self.partition_handlers.len();
        if num_partitions == 0 {
            return;
        }

        let next_index = Arc::new(AtomicUsize::new(0));
        let workers = (self.config.max_concurrent_requests.max(1) as usize).min(num_partitions);

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let fetcher = Arc::clone(self);
            let next_index = Arc::clone(&next_index);
            handles.push(tokio::spawn(async move {
                loop {
                    let partition = next_index.fetch_add(1, Ordering::SeqCst);
                    if partition >= fetcher.partition_handlers.len() {
                        return;
                    }
                    fetcher.fetch_partition(partition).await;
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        self.join_partitions();
        self.maybe_signal_initialized();
    }

    async fn fetch_partition(&self, partition: usize) {
        let start = self.clock.now();
        let handler = Arc::clone(&self.partition_handlers[partition]);

        match self.dispatcher.get(move |item| handler(item)).await {
            Ok(tables) => {
                let table_count = tables.len();
                let avg_unique_accounts = if table_count == 0 {
                    0.0
                } else {
                    tables.iter().map(|t| t.num_unique_accounts() as f64).sum::<f64>()
                        / table_count as f64
                };
                let elapsed = self.clock.now().duration_since(start);

                #[cfg(feature = "tracing")]
                tracing::info!(
                    partition,
                    table_count,
                    avg_unique_accounts,
                    elapsed_ms = elapsed.as_millis(),
                    "partition load completed"
                );

                let event = FetchEvent::PartitionLoaded {
                    timestamp: self.clock.now(),
                    partition: partition as u32,
                    table_count,
                    avg_unique_accounts,
                    elapsed,
                };
                self.listeners.emit(&event);

                if let Some(directory) = &self.config.cache_directory {
                    let path = partition_file_path(directory, partition as u32);
                    let serialized: Vec<_> = tables
                        .iter()
                        .map(|t| (t.address(), t.serialize()))
                        .collect();
                    if write_partition_cache(&path, &serialized).is_err() {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(partition, "failed to write partition cache");
                        self.listeners.emit(&FetchEvent::CacheWriteFailed {
                            timestamp: self.clock.now(),
                            partition: partition as u32,
                        });
                    }
                }

                self.partitions[partition].store(Some(Arc::new(tables)));
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(partition, "partition fetch failed");
                #[cfg(feature = "metrics")]
                counter!("rpc_fleet_partition_fetch_failures_total").increment(1);
                self.listeners.emit(&FetchEvent::PartitionFetchFailed {
                    timestamp: self.clock.now(),
                    partition: partition as u32,
                });
            }
        }
    }

    /// Merges the currently-populated partitions into a new `allTables`
    /// view, sorted by `numUniqueAccounts` descending, and republishes it.
    fn join_partitions(&self) {
        let mut merged: Vec<Arc<T>> = self
            .partitions
            .iter()
            .filter_map(|slot| slot.load_full())
            .flat_map(|partition| partition.as_ref().clone())
            .collect();
        merged.sort_by(|a, b| b.num_unique_accounts().cmp(&a.num_unique_accounts()));

        let table_count = merged.len();
        self.all_tables.store(Some(Arc::new(merged)));
        self.listeners.emit(&FetchEvent::Republished {
            timestamp: self.clock.now(),
            table_count,
        });
    }

    fn maybe_signal_initialized(&self) {
        if self.is_initialized() {
            return;
        }
        let loaded = self.partitions.iter().filter(|slot| slot.load().is_some()).count();
        if loaded >= self.config.initialized_threshold() {
            self.initialized.store(true, Ordering::Release);
            self.initialized_notify.notify_waiters();
        }
    }
}

impl<B, T, E> TableSource<T> for PartitionedTableFetcher<B, T, E>
where
    B: Send + Sync + 'static,
    T: LookupTable,
    E: DispatchError,
{
    fn all_tables(&self) -> Option<Arc<Vec<Arc<T>>>> {
        self.all_tables.load_full()
    }
}
