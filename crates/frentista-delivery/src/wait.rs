//! Interruptible waits — bounded sleeps that observe a cancel flag.
//!
//! Every pacing and backoff wait in the subsystem goes through here so
//! that pause/cancel is observed at sub-second granularity and no wait
//! ever blocks past its configured maximum.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(250);

/// Sleep for `total`, waking every tick to check `cancel`.
/// Returns false when cancelled before the full duration elapsed.
pub async fn interruptible_sleep(total: Duration, cancel: Option<&AtomicBool>) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if let Some(flag) = cancel
            && flag.load(Ordering::Relaxed)
        {
            return false;
        }
        let step = remaining.min(TICK);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
    match cancel {
        Some(flag) => !flag.load(Ordering::Relaxed),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_full_sleep_without_cancel() {
        let start = tokio::time::Instant::now();
        assert!(interruptible_sleep(Duration::from_secs(5), None).await);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cuts_sleep_short() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag2 = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            flag2.store(true, Ordering::Relaxed);
        });

        let start = tokio::time::Instant::now();
        let completed = interruptible_sleep(Duration::from_secs(60), Some(&flag)).await;
        assert!(!completed);
        // Observed within one tick of the flag flip, far before the minute.
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
