//! Shared hourly send budget.
//!
//! Campaigns on one provider account share a single counter so their
//! combined rate never exceeds the hourly cap. A slot is reserved before
//! the pacing phases start and released if the send ultimately fails, so
//! the cap holds even with concurrent campaigns racing between check and
//! send.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;

const WINDOW_SECS: i64 = 3600;

struct WindowState {
    window_start: DateTime<Utc>,
    used: u32,
}

/// Point-in-time accounting of the hourly window.
#[derive(Debug, Clone, Copy)]
pub struct BudgetStatus {
    pub window_start: DateTime<Utc>,
    pub used: u32,
    pub limit: u32,
}

impl BudgetStatus {
    pub fn exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

pub enum ReserveOutcome {
    Reserved(BudgetStatus),
    Exhausted(BudgetStatus),
}

pub struct RateBudget {
    max_per_hour: u32,
    inner: Mutex<WindowState>,
}

impl RateBudget {
    pub fn new(max_per_hour: u32) -> Self {
        Self::with_window(max_per_hour, Utc::now(), 0)
    }

    /// Seed the window explicitly, e.g. from a loaded snapshot after a
    /// process restart.
    pub fn with_window(max_per_hour: u32, window_start: DateTime<Utc>, used: u32) -> Self {
        Self {
            max_per_hour,
            inner: Mutex::new(WindowState { window_start, used }),
        }
    }

    pub fn limit(&self) -> u32 {
        self.max_per_hour
    }

    fn roll(&self, state: &mut WindowState) {
        let now = Utc::now();
        if now.signed_duration_since(state.window_start).num_seconds() >= WINDOW_SECS {
            state.window_start = now;
            state.used = 0;
        }
    }

    fn status_of(&self, state: &WindowState) -> BudgetStatus {
        BudgetStatus {
            window_start: state.window_start,
            used: state.used,
            limit: self.max_per_hour,
        }
    }

    /// Roll the window if elapsed and reserve one send slot.
    pub async fn try_reserve(&self) -> ReserveOutcome {
        let mut state = self.inner.lock().await;
        self.roll(&mut state);
        if state.used >= self.max_per_hour {
            ReserveOutcome::Exhausted(self.status_of(&state))
        } else {
            state.used += 1;
            ReserveOutcome::Reserved(self.status_of(&state))
        }
    }

    /// Return a reserved slot after a send that did not count (failed or
    /// abandoned before delivery).
    pub async fn release(&self) {
        let mut state = self.inner.lock().await;
        state.used = state.used.saturating_sub(1);
    }

    /// Current accounting, rolling the window first.
    pub async fn status(&self) -> BudgetStatus {
        let mut state = self.inner.lock().await;
        self.roll(&mut state);
        self.status_of(&state)
    }

    /// Adopt stricter accounting from a loaded snapshot: if the
    /// snapshot's window is still active and shows more usage than we
    /// know about, take it over. Keeps the cap honest across restarts.
    pub async fn absorb(&self, window_start: DateTime<Utc>, used: u32) {
        let now = Utc::now();
        if now.signed_duration_since(window_start).num_seconds() >= WINDOW_SECS {
            return;
        }
        let mut state = self.inner.lock().await;
        if used > state.used {
            state.window_start = window_start;
            state.used = used;
        }
    }
}

// Convenience for tests and snapshot seeding.
pub fn hours_ago(h: i64) -> DateTime<Utc> {
    Utc::now() - ChronoDuration::hours(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_until_exhausted() {
        let budget = RateBudget::new(2);
        assert!(matches!(
            budget.try_reserve().await,
            ReserveOutcome::Reserved(_)
        ));
        assert!(matches!(
            budget.try_reserve().await,
            ReserveOutcome::Reserved(_)
        ));
        match budget.try_reserve().await {
            ReserveOutcome::Exhausted(st) => {
                assert_eq!(st.used, 2);
                assert!(st.exhausted());
            }
            ReserveOutcome::Reserved(_) => panic!("third reserve should be rejected"),
        }
    }

    #[tokio::test]
    async fn test_release_frees_a_slot() {
        let budget = RateBudget::new(1);
        assert!(matches!(
            budget.try_reserve().await,
            ReserveOutcome::Reserved(_)
        ));
        budget.release().await;
        assert!(matches!(
            budget.try_reserve().await,
            ReserveOutcome::Reserved(_)
        ));
    }

    #[tokio::test]
    async fn test_elapsed_window_resets() {
        let budget = RateBudget::with_window(2, hours_ago(2), 2);
        let st = budget.status().await;
        assert_eq!(st.used, 0);
        assert!(!st.exhausted());
    }

    #[tokio::test]
    async fn test_absorb_adopts_active_window() {
        let budget = RateBudget::new(40);
        budget.absorb(Utc::now(), 7).await;
        assert_eq!(budget.status().await.used, 7);

        // A stale window is ignored.
        let budget = RateBudget::new(40);
        budget.absorb(hours_ago(3), 30).await;
        assert_eq!(budget.status().await.used, 0);
    }
}
