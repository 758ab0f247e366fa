//! Blocking sleep abstraction so callers (and tests) can control backoff waits.

use std::time::Duration;

/// Something that can block the current thread for a duration.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper: `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
