//! Concurrency gate sizing

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounds for a counting semaphore sized from host parallelism
///
/// The resolved limit is `clamp(cores * multiplier, min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyLimit {
    /// Units per CPU core (default: 2)
    #[serde(default = "default_multiplier")]
    pub multiplier: usize,

    /// Lower bound (default: 2)
    #[serde(default = "default_min")]
    pub min: usize,

    /// Upper bound (default: 20)
    #[serde(default = "default_max")]
    pub max: usize,
}

fn default_multiplier() -> usize {
    2
}

fn default_min() -> usize {
    2
}

fn default_max() -> usize {
    20
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
            min: default_min(),
            max: default_max(),
        }
    }
}

impl ConcurrencyLimit {
    /// A limit that always resolves to `n`
    pub fn fixed(n: usize) -> Self {
        Self {
            multiplier: 1,
            min: n,
            max: n,
        }
    }

    /// Resolve against the host's core count
    pub fn resolve(&self) -> usize {
        self.resolve_for(num_cpus::get())
    }

    /// Resolve against a given core count
    pub fn resolve_for(&self, cores: usize) -> usize {
        let min = self.min.max(1);
        let max = self.max.max(min);
        cores.saturating_mul(self.multiplier).clamp(min, max)
    }

    /// Build a semaphore with the resolved number of permits
    pub fn semaphore(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.resolve()))
    }

    /// Validate the bounds
    pub fn validate(&self) -> Result<(), String> {
        if self.min == 0 {
            return Err("min concurrency must be at least 1".to_string());
        }
        if self.min > self.max {
            return Err("min concurrency cannot exceed max concurrency".to_string());
        }
        if self.multiplier == 0 {
            return Err("concurrency multiplier must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        let limit = ConcurrencyLimit::default();
        assert_eq!(limit.resolve_for(1), 2);
        assert_eq!(limit.resolve_for(4), 8);
        assert_eq!(limit.resolve_for(64), 20);
    }

    #[test]
    fn test_fixed() {
        let limit = ConcurrencyLimit::fixed(3);
        assert_eq!(limit.resolve_for(1), 3);
        assert_eq!(limit.resolve_for(128), 3);
        assert!(limit.validate().is_ok());
    }

    #[test]
    fn test_resolved_limit_is_within_bounds() {
        let limit = ConcurrencyLimit::default();
        let resolved = limit.resolve();
        assert!((limit.min..=limit.max).contains(&resolved));
        assert_eq!(limit.semaphore().available_permits(), resolved);
    }

    #[test]
    fn test_validation() {
        assert!(ConcurrencyLimit::fixed(0).validate().is_err());
        let inverted = ConcurrencyLimit {
            multiplier: 2,
            min: 10,
            max: 5,
        };
        assert!(inverted.validate().is_err());
        // Inverted bounds still resolve to something usable
        assert_eq!(inverted.resolve_for(1), 10);
    }
}
