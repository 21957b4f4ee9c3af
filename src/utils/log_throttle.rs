use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug)]
struct WindowState {
    opened_at: Option<Instant>,
    suppressed: u64,
}

/// Rate limiter for repetitive log lines, keyed by an arbitrary string.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    windows: Mutex<HashMap<String, WindowState>>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// `Some(n)` if a line for `key` should be logged now, where `n` lines were
    /// swallowed since the last one. `None` means stay quiet.
    pub fn should_emit(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let window = windows.entry(key.to_string()).or_insert(WindowState {
            opened_at: None,
            suppressed: 0,
        });

        let expired = window
            .opened_at
            .map_or(true, |opened| now.duration_since(opened) >= self.interval);
        if !expired {
            window.suppressed += 1;
            return None;
        }
        window.opened_at = Some(now);
        Some(std::mem::take(&mut window.suppressed))
    }
}

#[cfg(test)]
mod tests {
    use super::LogThrottle;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn emits_then_suppresses_then_emits_with_count() {
        let throttle = LogThrottle::new(Duration::from_millis(20));
        let key = "api.anonymous_request";

        assert_eq!(throttle.should_emit(key), Some(0));
        assert_eq!(throttle.should_emit(key), None);
        assert_eq!(throttle.should_emit(key), None);
        assert_eq!(throttle.should_emit("other"), Some(0));

        sleep(Duration::from_millis(30));
        assert_eq!(throttle.should_emit(key), Some(2));
    }
}
