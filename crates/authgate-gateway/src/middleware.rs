//! Gateway middleware.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::num::NonZeroU32;

/// Per-address limiter for login e-mails.
pub struct EmailRateLimiter {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl EmailRateLimiter {
    /// Create a limiter allowing `per_minute` e-mails per address.
    #[must_use]
    pub fn new(per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Whether another e-mail to `address` is allowed now.
    ///
    /// Addresses are compared case-insensitively.
    #[must_use]
    pub fn check(&self, address: &str) -> bool {
        self.limiter
            .check_key(&address.trim().to_ascii_lowercase())
            .is_ok()
    }
}

impl Default for EmailRateLimiter {
    fn default() -> Self {
        Self::new(5)
    }
}
