//! Per-provider call-rate ceilings.
//!
//! A throttle blocks the calling thread until the next request may go out.
//! It never fails: callers wait rather than give up.

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::thread;
use tracing::trace;

pub trait Throttle: Send + Sync {
    /// Block until one more call is allowed.
    fn acquire(&self);
}

/// Token-bucket limit of `n` calls per second.
pub struct RateLimit {
    limiter: DefaultDirectRateLimiter,
    clock: DefaultClock,
}

impl RateLimit {
    /// `calls` of zero is treated as one.
    pub fn per_second(calls: u32) -> Self {
        let calls = NonZeroU32::new(calls).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(calls)),
            clock: DefaultClock::default(),
        }
    }
}

impl Throttle for RateLimit {
    fn acquire(&self) {
        while let Err(not_until) = self.limiter.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            trace!(wait_ms = wait.as_millis() as u64, "rate limit reached, sleeping");
            thread::sleep(wait);
        }
    }
}

/// No-op throttle, for tests and local mirrors.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unthrottled;

impl Throttle for Unthrottled {
    fn acquire(&self) {}
}
