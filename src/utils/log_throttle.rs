use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Rate limits one noisy log line to once per window, counting what it drops.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    window: Mutex<Option<Window>>,
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    suppressed: u64,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window: Mutex::new(None),
        }
    }

    /// Returns `Some(suppressed_count)` when the log should be emitted,
    /// otherwise `None` and the event is counted as suppressed for the active window.
    pub fn should_emit(&self) -> Option<u64> {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        match window.as_mut() {
            Some(w) if now.duration_since(w.started_at) < self.interval => {
                w.suppressed += 1;
                None
            }
            Some(w) => {
                let suppressed = w.suppressed;
                w.started_at = now;
                w.suppressed = 0;
                Some(suppressed)
            }
            None => {
                *window = Some(Window {
                    started_at: now,
                    suppressed: 0,
                });
                Some(0)
            }
        }
    }
}
