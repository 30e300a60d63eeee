/// The three invocation policies the dispatcher can run a call under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// No capacity bookkeeping at all: select the current head and invoke.
    Unchecked,
    /// Unconditionally claims capacity (may overdraft) before invoking.
    Greedy,
    /// Attempts to claim capacity cooperatively, rotating between backends
    /// and sleeping for estimated availability before overdrafting.
    #[default]
    Courteous,
}

/// Per-call configuration consumed by the dispatcher's selection and
/// retry/failover loop.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Maximum number of retries *on the same item* before giving up on it.
    pub max_retries: u32,
    /// Token weight charged per invocation attempt.
    pub call_weight: u32,
    /// Whether to sample call latency into the selected item's EWMA.
    pub measure_call_time: bool,
    /// Number of claim attempts the courteous selector makes before falling
    /// back to `force_call` or signaling no capacity.
    pub max_try_claim: u32,
    /// If the courteous selector exhausts `max_try_claim` without finding
    /// capacity, force an overdrafted claim instead of signaling
    /// [`FleetError::NoCapacity`](rpc_fleet_core::FleetError::NoCapacity).
    pub force_call: bool,
    pub mode: DispatchMode,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            max_retries: 7,
            call_weight: 1,
            measure_call_time: true,
            max_try_claim: 3,
            force_call: false,
            mode: DispatchMode::default(),
        }
    }
}

impl CallContext {
    pub fn builder() -> CallContextBuilder {
        CallContextBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallContextBuilder {
    inner: CallContextOverrides,
}

#[derive(Debug, Clone, Default)]
struct CallContextOverrides {
    max_retries: Option<u32>,
    call_weight: Option<u32>,
    measure_call_time: Option<bool>,
    max_try_claim: Option<u32>,
    force_call: Option<bool>,
    mode: Option<DispatchMode>,
}

impl CallContextBuilder {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.inner.max_retries = Some(max_retries);
        self
    }

    pub fn call_weight(mut self, call_weight: u32) -> Self {
        self.inner.call_weight = Some(call_weight);
        self
    }

    pub fn measure_call_time(mut self, measure_call_time: bool) -> Self {
        self.inner.measure_call_time = Some(measure_call_time);
        self
    }

    pub fn max_try_claim(mut self, max_try_claim: u32) -> Self {
        self.inner.max_try_claim = Some(max_try_claim);
        self
    }

    pub fn force_call(mut self, force_call: bool) -> Self {
        self.inner.force_call = Some(force_call);
        self
    }

    pub fn mode(mut self, mode: DispatchMode) -> Self {
        self.inner.mode = Some(mode);
        self
    }

    pub fn build(self) -> CallContext {
        let defaults = CallContext::default();
        CallContext {
            max_retries: self.inner.max_retries.unwrap_or(defaults.max_retries),
            call_weight: self.inner.call_weight.unwrap_or(defaults.call_weight),
            measure_call_time: self
                .inner
                .measure_call_time
                .unwrap_or(defaults.measure_call_time),
            max_try_claim: self.inner.max_try_claim.unwrap_or(defaults.max_try_claim),
            force_call: self.inner.force_call.unwrap_or(defaults.force_call),
            mode: self.inner.mode.unwrap_or(defaults.mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_configuration() {
        let ctx = CallContext::default();
        assert_eq!(ctx.max_retries, 7);
        assert_eq!(ctx.call_weight, 1);
        assert_eq!(ctx.max_try_claim, 3);
        assert!(!ctx.force_call);
        assert_eq!(ctx.mode, DispatchMode::Courteous);
    }

    #[test]
    fn builder_overrides_only_what_is_set() {
        let ctx = CallContext::builder().max_retries(2).build();
        assert_eq!(ctx.max_retries, 2);
        assert_eq!(ctx.call_weight, 1);
    }
}
