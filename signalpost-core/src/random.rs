use std::sync::Mutex;

/// Source of randomness for template choice, slot minutes and the proactive
/// post coin flip. Injected so tests can pin outcomes.
pub trait RandomSource: Send + Sync {
    /// Uniform in `[0, 1)`.
    fn next_f64(&self) -> f64;

    /// Uniform in `0..upper`. `upper` must be non-zero.
    fn below(&self, upper: usize) -> usize;
}

#[derive(Debug)]
pub struct FastRandom {
    rng: Mutex<fastrand::Rng>,
}

impl FastRandom {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Default for FastRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for FastRandom {
    fn next_f64(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.f64(),
            Err(poisoned) => poisoned.into_inner().f64(),
        }
    }

    fn below(&self, upper: usize) -> usize {
        match self.rng.lock() {
            Ok(mut rng) => rng.usize(0..upper),
            Err(poisoned) => poisoned.into_inner().usize(0..upper),
        }
    }
}

/// Always returns the same values.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom {
    pub value: f64,
    pub index: usize,
}

impl FixedRandom {
    pub fn new(value: f64, index: usize) -> Self {
        Self { value, index }
    }
}

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.value
    }

    fn below(&self, upper: usize) -> usize {
        self.index.min(upper.saturating_sub(1))
    }
}
