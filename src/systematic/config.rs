//! Configuration for the systematic runtime.

use crate::util::DetRng;

/// Configuration for [`SystematicRuntime`](crate::SystematicRuntime).
#[derive(Debug, Clone)]
pub struct SystematicConfig {
    /// Seed driving every scheduling choice.
    pub seed: u64,
    /// Maximum number of dispatch steps before the run stops early.
    ///
    /// `None` disables the budget.
    pub max_steps: Option<u64>,
    /// Capacity of the trace buffer.
    pub trace_capacity: usize,
}

impl SystematicConfig {
    /// Creates a configuration with the given seed and default budgets.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            max_steps: Some(1_000_000),
            trace_capacity: 16_384,
        }
    }

    /// Sets the step budget.
    #[must_use]
    pub const fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Removes the step budget.
    #[must_use]
    pub const fn no_step_limit(mut self) -> Self {
        self.max_steps = None;
        self
    }

    /// Sets the trace buffer capacity.
    #[must_use]
    pub const fn trace_capacity(mut self, capacity: usize) -> Self {
        self.trace_capacity = capacity;
        self
    }

    /// Creates the deterministic RNG for this configuration.
    #[must_use]
    pub fn rng(&self) -> DetRng {
        DetRng::new(self.seed)
    }
}

impl Default for SystematicConfig {
    fn default() -> Self {
        Self::new(42)
    }
}
