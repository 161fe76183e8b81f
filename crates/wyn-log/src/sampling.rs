//! Per-level sampling to bound ingestion volume.
//!
//! A [`SamplingPolicy`] maps each level to a keep probability in `[0, 1]`.
//! Levels at or above [`SamplingPolicy::always_keep_from`] (errors and fatals
//! by default) bypass sampling entirely. The [`Sampler`] draws from a seeded
//! PCG stream so a fixed seed reproduces the same keep/drop decisions.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::level::LogLevel;
use crate::LogError;

// ---------------------------------------------------------------------------
// SamplingPolicy
// ---------------------------------------------------------------------------

/// Keep probabilities per level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingPolicy {
    /// Keep probability per level. Levels missing from the map are kept.
    pub rates: BTreeMap<LogLevel, f64>,
    /// Entries at or above this level are never sampled out.
    pub always_keep_from: LogLevel,
}

impl Default for SamplingPolicy {
    /// `Dev` kept at 25%, everything else at 100%.
    fn default() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert(LogLevel::Dev, 0.25);
        rates.insert(LogLevel::Info, 1.0);
        rates.insert(LogLevel::Warn, 1.0);
        rates.insert(LogLevel::Error, 1.0);
        rates.insert(LogLevel::Fatal, 1.0);
        Self {
            rates,
            always_keep_from: LogLevel::Error,
        }
    }
}

impl SamplingPolicy {
    /// Policy that keeps everything.
    pub fn keep_all() -> Self {
        Self {
            rates: BTreeMap::new(),
            always_keep_from: LogLevel::Error,
        }
    }

    /// Set the keep probability for one level.
    pub fn with_rate(mut self, level: LogLevel, rate: f64) -> Self {
        self.rates.insert(level, rate);
        self
    }

    /// Effective keep probability for `level`, clamped to `[0, 1]`.
    ///
    /// Levels at or above the always-keep threshold report `1.0` whatever the
    /// configured rate. NaN rates are treated as `1.0`.
    pub fn rate_for(&self, level: LogLevel) -> f64 {
        if level >= self.always_keep_from {
            return 1.0;
        }
        match self.rates.get(&level) {
            Some(rate) if rate.is_nan() => 1.0,
            Some(rate) => rate.clamp(0.0, 1.0),
            None => 1.0,
        }
    }

    /// Reject rates outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), LogError> {
        for (level, rate) in &self.rates {
            if !(0.0..=1.0).contains(rate) {
                return Err(LogError::InvalidConfig(format!(
                    "sampling rate for {level} must be within [0, 1], got {rate}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Draws keep/drop decisions for a [`SamplingPolicy`].
#[derive(Debug)]
pub struct Sampler {
    policy: Mutex<SamplingPolicy>,
    rng: Mutex<Pcg64>,
}

impl Sampler {
    /// Create a sampler. `seed` fixes the random stream; `None` seeds from
    /// system entropy.
    pub fn new(policy: SamplingPolicy, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_entropy(),
        };
        Self {
            policy: Mutex::new(policy),
            rng: Mutex::new(rng),
        }
    }

    /// Decide whether an entry at `level` is kept.
    ///
    /// Levels with an effective rate of `1.0` are kept without consuming a
    /// random draw.
    pub fn should_keep(&self, level: LogLevel) -> bool {
        let rate = self.policy.lock().rate_for(level);
        if rate >= 1.0 {
            return true;
        }
        if rate <= 0.0 {
            return false;
        }
        let draw: f64 = self.rng.lock().gen();
        draw < rate
    }

    /// Replace the active policy.
    pub fn set_policy(&self, policy: SamplingPolicy) {
        *self.policy.lock() = policy;
    }

    /// Copy of the active policy.
    pub fn policy(&self) -> SamplingPolicy {
        self.policy.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_severity_ignores_configured_rate() {
        let policy = SamplingPolicy::default()
            .with_rate(LogLevel::Error, 0.0)
            .with_rate(LogLevel::Fatal, 0.0);
        assert_eq!(policy.rate_for(LogLevel::Error), 1.0);
        assert_eq!(policy.rate_for(LogLevel::Fatal), 1.0);
    }

    #[test]
    fn rates_are_clamped_and_nan_keeps() {
        let policy = SamplingPolicy::keep_all()
            .with_rate(LogLevel::Dev, 4.0)
            .with_rate(LogLevel::Info, -1.0)
            .with_rate(LogLevel::Warn, f64::NAN);
        assert_eq!(policy.rate_for(LogLevel::Dev), 1.0);
        assert_eq!(policy.rate_for(LogLevel::Info), 0.0);
        assert_eq!(policy.rate_for(LogLevel::Warn), 1.0);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn zero_rate_drops_everything_below_threshold() {
        let sampler = Sampler::new(SamplingPolicy::keep_all().with_rate(LogLevel::Info, 0.0), Some(7));
        assert!((0..1000).all(|_| !sampler.should_keep(LogLevel::Info)));
        assert!((0..1000).all(|_| sampler.should_keep(LogLevel::Error)));
    }

    #[test]
    fn seeded_sampler_is_reproducible() {
        let policy = SamplingPolicy::keep_all().with_rate(LogLevel::Dev, 0.5);
        let a = Sampler::new(policy.clone(), Some(42));
        let b = Sampler::new(policy, Some(42));
        let run_a: Vec<bool> = (0..200).map(|_| a.should_keep(LogLevel::Dev)).collect();
        let run_b: Vec<bool> = (0..200).map(|_| b.should_keep(LogLevel::Dev)).collect();
        assert_eq!(run_a, run_b);
        let kept = run_a.iter().filter(|k| **k).count();
        assert!(kept > 50 && kept < 150, "kept {kept} of 200 at rate 0.5");
    }

    #[test]
    fn policy_deserializes_from_level_keys() {
        let policy: SamplingPolicy =
            serde_json::from_str(r#"{"rates": {"DEV": 0.1}, "always_keep_from": "WARN"}"#).unwrap();
        assert_eq!(policy.rate_for(LogLevel::Dev), 0.1);
        assert_eq!(policy.rate_for(LogLevel::Warn), 1.0);
    }
}
