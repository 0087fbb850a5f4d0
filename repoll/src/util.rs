use rand::{thread_rng, Rng};
use std::time::Duration;

/// Doubles `current`, capped at `max`.
pub fn next_delay(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Uniform random duration in `[0, max)`. Zero when `max` is zero.
pub fn jitter(max: Duration) -> Duration {
    let upper = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
    if upper == 0 {
        return Duration::ZERO;
    }
    let mut rng = thread_rng();
    Duration::from_nanos(rng.gen_range(0..upper))
}
