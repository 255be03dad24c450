//! Failure injection for the unreliable endpoint
//!
//! Each call is an independent Bernoulli trial drawn from the thread-local
//! OS-seeded generator. It never touches the seeded source used for data
//! generation, so injected failures cannot change what a successful call
//! returns.

use meter_common::{MeterError, Result};
use rand::Rng;

/// Failure probability of `/measurements/very-reliable`
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnreliabilityInjector {
    probability: f64,
}

impl UnreliabilityInjector {
    pub fn new(probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(MeterError::config(format!(
                "Failure probability must be within [0, 1], got {probability}"
            )));
        }
        Ok(Self { probability })
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Roll once; `true` means the caller must answer with a transient error
    pub fn maybe_fail(&self) -> bool {
        self.maybe_fail_with(&mut rand::thread_rng())
    }

    pub fn maybe_fail_with<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.probability)
    }
}

impl Default for UnreliabilityInjector {
    fn default() -> Self {
        Self {
            probability: DEFAULT_FAILURE_PROBABILITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_rejects_out_of_range_probability() {
        assert!(UnreliabilityInjector::new(-0.1).is_err());
        assert!(UnreliabilityInjector::new(1.5).is_err());
        assert!(UnreliabilityInjector::new(f64::NAN).is_err());
        assert!(UnreliabilityInjector::new(0.0).is_ok());
        assert!(UnreliabilityInjector::new(1.0).is_ok());
    }

    #[test]
    fn test_extremes() {
        let never = UnreliabilityInjector::new(0.0).unwrap();
        let always = UnreliabilityInjector::new(1.0).unwrap();
        for _ in 0..100 {
            assert!(!never.maybe_fail());
            assert!(always.maybe_fail());
        }
    }

    #[test]
    fn test_failure_rate_near_probability() {
        let injector = UnreliabilityInjector::default();
        let mut rng = StdRng::seed_from_u64(7);
        let failures = (0..10_000)
            .filter(|_| injector.maybe_fail_with(&mut rng))
            .count();
        let rate = failures as f64 / 10_000.0;
        assert!((rate - 0.3).abs() < 0.03, "rate was {rate}");
    }
}
