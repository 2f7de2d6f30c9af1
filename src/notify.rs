// src/notify.rs
use async_trait::async_trait;
use tokio::time::{Duration, Instant};
use tracing::info;

/// Fire-and-forget human notification channel. Delivery failures are the
/// sink's problem: they get logged, never propagated into trading logic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);
}

/// Default sink: emits the message on a dedicated tracing target so the
/// audit log doubles as the notification stream.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) {
        info!(target: "sentinel::notify", "{text}");
    }
}

/// Rate limiter for repeated notifications of one ongoing condition,
/// e.g. a prolonged low-balance state.
#[derive(Debug)]
pub struct Cooldown {
    window: Duration,
    last_fired: Option<Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
        }
    }

    /// True (and arms the cooldown) if enough time has passed since the
    /// last allowed firing.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last_fired {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last_fired = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cooldown_throttles_within_window() {
        let mut cooldown = Cooldown::new(Duration::from_secs(3600));
        assert!(cooldown.allow());
        assert!(!cooldown.allow());

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(!cooldown.allow());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cooldown.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_rearms_immediately() {
        let mut cooldown = Cooldown::new(Duration::from_secs(60));
        assert!(cooldown.allow());
        cooldown.reset();
        assert!(cooldown.allow());
    }
}
