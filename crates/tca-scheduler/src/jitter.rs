use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the scheduler's tick-to-tick jitter perturbation.
///
/// Abstracted behind a trait so tests can pin the sequence; production
/// wiring uses [`RandJitter`] seeded from OS entropy.
pub trait JitterSource: Send {
    /// Returns a perturbation in `±(poll_interval_seconds * jitter_ratio)`,
    /// symmetric and uniformly distributed. `jitter_ratio` of `0.0` always
    /// yields `0`.
    fn next_jitter_seconds(&mut self, poll_interval_seconds: i64, jitter_ratio: f64) -> i64;
}

/// `rand::rngs::StdRng`-backed jitter source, seedable for deterministic tests.
pub struct RandJitter {
    rng: StdRng,
}

impl RandJitter {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl JitterSource for RandJitter {
    fn next_jitter_seconds(&mut self, poll_interval_seconds: i64, jitter_ratio: f64) -> i64 {
        if jitter_ratio <= 0.0 || poll_interval_seconds <= 0 {
            return 0;
        }
        let bound = poll_interval_seconds as f64 * jitter_ratio;
        self.rng.gen_range(-bound..=bound).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ratio_is_always_zero() {
        let mut j = RandJitter::from_seed(1);
        for _ in 0..50 {
            assert_eq!(j.next_jitter_seconds(300, 0.0), 0);
        }
    }

    #[test]
    fn jitter_stays_within_bound() {
        let mut j = RandJitter::from_seed(42);
        for _ in 0..1000 {
            let v = j.next_jitter_seconds(300, 0.20);
            assert!(v >= -60 && v <= 60, "jitter {v} outside ±60s bound");
        }
    }

    #[test]
    fn same_seed_reproduces_same_sequence() {
        let mut a = RandJitter::from_seed(7);
        let mut b = RandJitter::from_seed(7);
        let seq_a: Vec<i64> = (0..20).map(|_| a.next_jitter_seconds(300, 0.2)).collect();
        let seq_b: Vec<i64> = (0..20).map(|_| b.next_jitter_seconds(300, 0.2)).collect();
        assert_eq!(seq_a, seq_b);
    }
}
