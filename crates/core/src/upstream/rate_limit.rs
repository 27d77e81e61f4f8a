use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// The timestamp list is only locked while it is pruned or appended to; a caller that has to
/// wait sleeps without the lock and re-checks on wake-up, since another caller may have taken
/// the freed slot in the meantime. Ordering among waiters is best-effort.
#[derive(Debug)]
pub struct RateLimiter {
    calls_per_minute: u32,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    // Zero disables limiting.
    pub fn new(calls_per_minute: u32) -> Self {
        Self {
            calls_per_minute,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.calls_per_minute == 0
    }

    pub async fn acquire(&self) {
        if self.is_disabled() {
            return;
        }

        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                prune(&mut calls, now);

                if calls.len() < self.calls_per_minute as usize {
                    calls.push_back(now);
                    return;
                }

                match calls.front() {
                    Some(oldest) => WINDOW.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };

            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                calls_per_minute = self.calls_per_minute,
                "upstream call budget exhausted; waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn in_window(&self) -> usize {
        let mut calls = self.calls.lock().await;
        prune(&mut calls, Instant::now());
        calls.len()
    }
}

fn prune(calls: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = calls.front() {
        if now.duration_since(*oldest) >= WINDOW {
            calls.pop_front();
        } else {
            break;
        }
    }
}
