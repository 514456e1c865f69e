//! Integration tests for the round timer.
//!
//! Time is paused (`start_paused = true`), so sleeps resolve as soon as
//! the runtime has nothing else to do and durations are exact.

use std::time::Duration;

use tokio::time::Instant;
use trivia_timer::{DeadlineKind, RoundTimer, TimerStats};

// =========================================================================
// Slot behaviour
// =========================================================================

#[test]
fn test_new_timer_is_disarmed() {
    let timer = RoundTimer::new();
    assert!(!timer.is_armed());
    assert!(timer.pending().is_none());
    assert_eq!(timer.remaining(), None);
    assert_eq!(timer.stats(), TimerStats::default());
}

#[tokio::test(start_paused = true)]
async fn test_arm_sets_pending_deadline() {
    let mut timer = RoundTimer::new();
    timer.arm(DeadlineKind::RoundTimeout, 1, Duration::from_secs(15));

    let pending = timer.pending().copied().unwrap();
    assert_eq!(pending.kind, DeadlineKind::RoundTimeout);
    assert_eq!(pending.round, 1);
    assert_eq!(timer.remaining(), Some(Duration::from_secs(15)));
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_previous_deadline() {
    let mut timer = RoundTimer::new();
    timer.arm(DeadlineKind::RoundTimeout, 1, Duration::from_secs(15));
    timer.arm(DeadlineKind::RoundTimeout, 2, Duration::from_secs(15));

    assert_eq!(timer.pending().unwrap().round, 2);
    assert_eq!(timer.stats().armed, 2);
    assert_eq!(timer.stats().superseded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_clears_slot() {
    let mut timer = RoundTimer::new();
    timer.arm(DeadlineKind::GameEnding, 3, Duration::from_secs(5));

    let cancelled = timer.cancel().unwrap();
    assert_eq!(cancelled.kind, DeadlineKind::GameEnding);
    assert!(!timer.is_armed());
    assert!(timer.cancel().is_none(), "second cancel is a no-op");
    assert_eq!(timer.stats().superseded, 1);
}

// =========================================================================
// arm_if_sooner
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_arm_if_sooner_replaces_later_deadline() {
    let mut timer = RoundTimer::new();
    timer.arm(DeadlineKind::RoundTimeout, 1, Duration::from_secs(15));

    assert!(timer.arm_if_sooner(DeadlineKind::AllAnswered, 1, Duration::from_secs(2)));
    assert_eq!(timer.pending().unwrap().kind, DeadlineKind::AllAnswered);
}

#[tokio::test(start_paused = true)]
async fn test_arm_if_sooner_keeps_earlier_deadline() {
    let mut timer = RoundTimer::new();
    timer.arm(DeadlineKind::RoundTimeout, 1, Duration::from_secs(15));
    tokio::time::advance(Duration::from_secs(14)).await;

    assert!(!timer.arm_if_sooner(DeadlineKind::AllAnswered, 1, Duration::from_secs(2)));
    assert_eq!(timer.pending().unwrap().kind, DeadlineKind::RoundTimeout);
}

#[tokio::test(start_paused = true)]
async fn test_arm_if_sooner_arms_empty_slot() {
    let mut timer = RoundTimer::new();
    assert!(timer.arm_if_sooner(DeadlineKind::AllAnswered, 1, Duration::from_secs(2)));
    assert!(timer.is_armed());
}

// =========================================================================
// wait
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_fires_at_deadline_and_disarms() {
    let mut timer = RoundTimer::new();
    let start = Instant::now();
    timer.arm(DeadlineKind::RoundTimeout, 1, Duration::from_secs(15));

    let fired = timer.wait().await;

    assert_eq!(fired.kind, DeadlineKind::RoundTimeout);
    assert_eq!(fired.round, 1);
    assert_eq!(start.elapsed(), Duration::from_secs(15));
    assert!(!timer.is_armed());
    assert_eq!(timer.stats().fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_pends_when_disarmed() {
    let mut timer = RoundTimer::new();
    let result =
        tokio::time::timeout(Duration::from_secs(3600), timer.wait()).await;
    assert!(result.is_err(), "disarmed timer must never fire");
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_leaves_slot_armed() {
    let mut timer = RoundTimer::new();
    timer.arm(DeadlineKind::RoundTimeout, 1, Duration::from_secs(15));

    let result =
        tokio::time::timeout(Duration::from_secs(1), timer.wait()).await;
    assert!(result.is_err());
    assert!(timer.is_armed());
    assert_eq!(timer.remaining(), Some(Duration::from_secs(14)));
}

#[tokio::test(start_paused = true)]
async fn test_only_latest_deadline_fires_in_select_loop() {
    let mut timer = RoundTimer::new();
    timer.arm(DeadlineKind::RoundTimeout, 1, Duration::from_secs(15));

    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = tx.send(()).await;
    });

    let mut fired = Vec::new();
    let start = Instant::now();
    while fired.is_empty() {
        tokio::select! {
            Some(()) = rx.recv() => {
                // the all-answered trigger wins the race
                timer.arm_if_sooner(DeadlineKind::AllAnswered, 1, Duration::from_secs(2));
            }
            deadline = timer.wait() => fired.push(deadline),
        }
    }

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].kind, DeadlineKind::AllAnswered);
    assert_eq!(start.elapsed(), Duration::from_secs(7));
    assert!(!timer.is_armed(), "the round timeout must not fire afterwards");
}
