use std::time::Duration;

/// Tunables for a single backend's [`CapacityMonitor`](crate::CapacityMonitor).
///
/// # Example
///
/// ```
/// use rpc_fleet_capacity::CapacityConfig;
///
/// let config = CapacityConfig::builder()
///     .tokens(50)
///     .refill_per_second(10.0)
///     .burst(10)
///     .min_health_for_selection(0.3)
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapacityConfig {
    /// Initial and ceiling token count.
    pub tokens: u32,
    /// Tokens restored per second of elapsed wall-clock time.
    pub refill_per_second: f64,
    /// Additional tokens a call may draw against beyond the raw ceiling
    /// before being refused, used by [`ClaimContext::burst_allowance`].
    pub burst: u32,
    /// Health floor below which the load balancer should prefer other items
    /// even if this one would otherwise sort first.
    pub min_health_for_selection: f64,
    /// Size of the sliding outcome window used to compute health.
    pub error_window: usize,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            tokens: 100,
            refill_per_second: 10.0,
            burst: 0,
            min_health_for_selection: 0.0,
            error_window: 50,
        }
    }
}

impl CapacityConfig {
    pub fn builder() -> CapacityConfigBuilder {
        CapacityConfigBuilder::default()
    }
}

/// Builder for [`CapacityConfig`].
#[derive(Debug, Default)]
pub struct CapacityConfigBuilder {
    config: CapacityConfig,
}

impl CapacityConfigBuilder {
    pub fn tokens(mut self, tokens: u32) -> Self {
        self.config.tokens = tokens;
        self
    }

    pub fn refill_per_second(mut self, rate: f64) -> Self {
        self.config.refill_per_second = rate;
        self
    }

    pub fn burst(mut self, burst: u32) -> Self {
        self.config.burst = burst;
        self
    }

    pub fn min_health_for_selection(mut self, min_health: f64) -> Self {
        self.config.min_health_for_selection = min_health;
        self
    }

    pub fn error_window(mut self, window: usize) -> Self {
        self.config.error_window = window;
        self
    }

    pub fn build(self) -> CapacityConfig {
        self.config
    }
}

/// Per-call claim policy, passed to every [`CapacityMonitor`](crate::CapacityMonitor)
/// method as `context` in the specification text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimContext {
    /// The call is treated as requiring at least this many tokens even if
    /// `weight` is smaller, so that a burst of tiny calls cannot starve a
    /// backend with large ones.
    pub min_request_floor: u32,
    /// Extra tokens this call is permitted to draw against on top of the
    /// current balance before being refused.
    pub burst_allowance: u32,
}

impl ClaimContext {
    pub const UNRESTRICTED: ClaimContext = ClaimContext {
        min_request_floor: 0,
        burst_allowance: 0,
    };

    pub fn effective_requirement(&self, weight: u32) -> u32 {
        weight.max(self.min_request_floor)
    }
}

impl Default for ClaimContext {
    fn default() -> Self {
        Self::UNRESTRICTED
    }
}

/// Default token penalty applied on a [`ErrorClass::RateLimited`] outcome,
/// expressed as a fraction of `burst` (see [`CapacityConfig::burst`]).
pub const RATE_LIMIT_PENALTY_FRACTION: f64 = 0.5;

/// Default extra delay folded into `nextAvailableAt` on a rate-limited error.
pub const RATE_LIMIT_PENALTY_DELAY: Duration = Duration::from_millis(250);
