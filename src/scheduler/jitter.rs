//! Process-wide random source used to stagger cell updates.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

static RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

/// Return a random whole-millisecond duration in `[0, max)`.
///
/// A `max` below one millisecond disables jitter. The generator is seeded from
/// OS entropy on first use, whichever worker gets there first.
pub fn sample(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let rng = RNG.get_or_init(|| Mutex::new(StdRng::from_entropy()));
    let ms = match rng.lock() {
        Ok(mut rng) => rng.gen_range(0..max_ms),
        Err(poisoned) => poisoned.into_inner().gen_range(0..max_ms),
    };
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_max_disables_jitter() {
        assert_eq!(sample(Duration::ZERO), Duration::ZERO);
        assert_eq!(sample(Duration::from_micros(900)), Duration::ZERO);
    }

    #[test]
    fn test_sample_is_bounded() {
        let max = Duration::from_millis(25);
        for _ in 0..500 {
            let j = sample(max);
            assert!(j < max, "{:?} not below {:?}", j, max);
            assert_eq!(j.subsec_nanos() % 1_000_000, 0);
        }
    }

    #[test]
    fn test_concurrent_first_use() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| sample(Duration::from_secs(1))))
            .collect();
        for h in handles {
            assert!(h.join().unwrap() < Duration::from_secs(1));
        }
    }
}
