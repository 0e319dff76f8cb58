//! Capped, jittered backoff between status polls.
//!
//! Many phrase lifecycles poll the same API concurrently; jitter keeps
//! them from synchronizing into bursts, and the cap keeps latency to
//! noticing completion bounded.

use std::time::Duration;

use rand::Rng;

const GROWTH: f64 = 1.5;
const JITTER_LOW: f64 = 0.8;
const JITTER_HIGH: f64 = 1.2;

/// Next base delay: grow by half, never past `max`.
pub fn next_delay(current: Duration, max: Duration) -> Duration {
    current.mul_f64(GROWTH).min(max)
}

/// Apply ±20% jitter to a base delay.
pub fn jittered(base: Duration) -> Duration {
    let factor = rand::rng().random_range(JITTER_LOW..JITTER_HIGH);
    base.mul_f64(factor)
}
