use crate::policy::{ErrorHandler, ExponentialBackoff, HttpErrorHandler, LinearBackoff};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rpc_fleet_core::ErrorClass;

/// Which built-in backoff shape to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackoffPolicy {
    Linear,
    Exponential,
}

/// Declarative configuration for an [`ErrorHandler`], matching the
/// enumerated configuration surface of the specification
/// (`policy`, `baseMillis`, `capMillis`, `fatalClasses`).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorHandlerConfig {
    pub policy: BackoffPolicy,
    pub base_millis: u32,
    pub cap_millis: u32,
    /// Error classes treated as immediately fatal regardless of policy.
    /// Defaults to `{Fatal}`; HTTP-flavored deployments leave this as-is and
    /// rely on the caller classifying non-429 4xx responses as `Fatal`.
    #[cfg_attr(feature = "serde", serde(skip, default = "default_fatal_classes"))]
    pub fatal_classes: HashSet<ErrorClass>,
}

fn default_fatal_classes() -> HashSet<ErrorClass> {
    let mut set = HashSet::new();
    set.insert(ErrorClass::Fatal);
    set
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            policy: BackoffPolicy::Exponential,
            base_millis: 10,
            cap_millis: 5_000,
            fatal_classes: default_fatal_classes(),
        }
    }
}

impl ErrorHandlerConfig {
    pub fn builder() -> ErrorHandlerConfigBuilder {
        ErrorHandlerConfigBuilder::default()
    }

    /// Builds the configured policy, wrapped so that any class listed in
    /// `fatal_classes` immediately gives up.
    pub fn build(self) -> Arc<dyn ErrorHandler> {
        let base = Duration::from_millis(self.base_millis as u64);
        let cap = Duration::from_millis(self.cap_millis as u64);
        let fatal_classes = self.fatal_classes;

        let inner: Arc<dyn ErrorHandler> = match self.policy {
            BackoffPolicy::Linear => Arc::new(LinearBackoff::new(base, cap_ratio(base, cap))),
            BackoffPolicy::Exponential => Arc::new(ExponentialBackoff::new(base, cap)),
        };

        Arc::new(ClassGatedHandler {
            inner,
            fatal_classes,
        })
    }
}

fn cap_ratio(base: Duration, cap: Duration) -> u32 {
    if base.is_zero() {
        1
    } else {
        (cap.as_secs_f64() / base.as_secs_f64()).max(1.0) as u32
    }
}

struct ClassGatedHandler {
    inner: Arc<dyn ErrorHandler>,
    fatal_classes: HashSet<ErrorClass>,
}

impl ErrorHandler for ClassGatedHandler {
    fn verdict(&self, error_count: u32, class: ErrorClass) -> crate::verdict::Verdict {
        if self.fatal_classes.contains(&class) {
            return crate::verdict::Verdict::GiveUp;
        }
        self.inner.verdict(error_count, class)
    }
}

/// Builder for [`ErrorHandlerConfig`].
#[derive(Debug, Default)]
pub struct ErrorHandlerConfigBuilder {
    config: ErrorHandlerConfig,
}

impl ErrorHandlerConfigBuilder {
    pub fn policy(mut self, policy: BackoffPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn base_millis(mut self, base_millis: u32) -> Self {
        self.config.base_millis = base_millis;
        self
    }

    pub fn cap_millis(mut self, cap_millis: u32) -> Self {
        self.config.cap_millis = cap_millis;
        self
    }

    pub fn fatal_classes(mut self, classes: impl IntoIterator<Item = ErrorClass>) -> Self {
        self.config.fatal_classes = classes.into_iter().collect();
        self
    }

    pub fn build(self) -> Arc<dyn ErrorHandler> {
        self.config.build()
    }
}

/// Also exposes the raw config (not just the built handler), for callers who
/// want to inspect or persist it.
impl ErrorHandlerConfigBuilder {
    pub fn into_config(self) -> ErrorHandlerConfig {
        self.config
    }
}
