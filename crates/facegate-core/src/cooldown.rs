//! Per-identity suppression of repeated decisions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Admits at most one decision per identity within `window`.
///
/// Only admitted decisions restart the window.
pub struct Cooldown {
    window: Duration,
    last: HashMap<String, Instant>,
    clock: Arc<dyn Clock>,
}

impl Cooldown {
    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            last: HashMap::new(),
            clock,
        }
    }

    /// Whether a decision for `name` may be emitted now. Records it if so.
    pub fn admit(&mut self, name: &str) -> bool {
        let now = self.clock.now();
        if let Some(&last) = self.last.get(name) {
            if now.saturating_duration_since(last) < self.window {
                tracing::trace!(name, "decision suppressed by cooldown");
                return false;
            }
        }
        self.last.insert(name.to_string(), now);
        true
    }
}
