//! Shared exponential-jitter backoff: initial 5s, capped at 300s, matching
//! the retry policy the fetcher, SPARQL client and RSS reader all share.

use rand::Rng;
use std::time::Duration;

pub const MAX_ATTEMPTS: u32 = 5;

const INITIAL_SECS: f64 = 5.0;
const MAX_SECS: f64 = 300.0;

pub fn duration_for_attempt(attempt: u32) -> Duration {
    let base = (INITIAL_SECS * 2f64.powi(attempt as i32 - 1)).min(MAX_SECS);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..base * 0.25);
    Duration::from_secs_f64(base + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_one_is_near_initial() {
        let d = duration_for_attempt(1).as_secs_f64();
        assert!((INITIAL_SECS..INITIAL_SECS * 1.25 + 0.01).contains(&d));
    }

    #[test]
    fn high_attempt_counts_stay_capped() {
        let d = duration_for_attempt(20).as_secs_f64();
        assert!(d <= MAX_SECS * 1.25);
    }
}
