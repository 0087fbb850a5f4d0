use repoll::{PollConfig, PollError, Poller};
use std::convert::Infallible;
use std::future::Ready;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug, PartialEq)]
struct Status {
    status: &'static str,
}

type AttemptLog = Arc<Mutex<Vec<Duration>>>;

// Replays `script`, repeating its last entry, and logs when each attempt happened.
fn scripted(
    script: Vec<&'static str>,
    start: Instant,
    log: AttemptLog,
) -> impl FnMut() -> Ready<Result<Status, Infallible>> {
    let mut idx = 0;
    move || {
        log.lock().unwrap().push(start.elapsed());
        let status = script[idx.min(script.len() - 1)];
        idx += 1;
        std::future::ready(Ok(Status { status }))
    }
}

fn gaps(log: &AttemptLog) -> Vec<Duration> {
    let times = log.lock().unwrap();
    times.windows(2).map(|w| w[1] - w[0]).collect()
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

// The timer wheel has millisecond resolution, so allow a tick of slack.
fn assert_gaps(log: &AttemptLog, bases: &[u64]) {
    let gaps = gaps(log);
    assert_eq!(gaps.len(), bases.len(), "{gaps:?}");
    for (gap, base) in gaps.iter().zip(bases) {
        assert!(*gap >= ms(*base) && *gap <= ms(base + 1), "gap {gap:?} for base {base}ms");
    }
}

#[tokio::test(start_paused = true)]
async fn pending_three_times_then_done() {
    let start = Instant::now();
    let log = AttemptLog::default();
    let op = scripted(vec!["pending", "pending", "pending", "done"], start, log.clone());
    let cfg = PollConfig::new(|s: &Status| s.status == "pending")
        .initial_delay(ms(1_000))
        .max_delay(ms(60_000))
        .max_duration(ms(10_000));

    let out = Poller::new().poll(op, &cfg).await.unwrap();
    assert_eq!(out, Status { status: "done" });

    let gaps = gaps(&log);
    assert_eq!(gaps.len(), 3);
    for (gap, base) in gaps.iter().zip([1_000, 2_000, 4_000]) {
        assert!(*gap >= ms(base) && *gap <= ms(base + 100), "gap {gap:?} for base {base}ms");
    }
    assert!(start.elapsed() < ms(10_000));
}

#[tokio::test(start_paused = true)]
async fn always_pending_times_out_after_budget() {
    let start = Instant::now();
    let log = AttemptLog::default();
    let op = scripted(vec!["pending"], start, log.clone());
    let cfg = PollConfig::new(|s: &Status| s.status == "pending")
        .initial_delay(ms(1_000))
        .max_delay(ms(60_000))
        .max_duration(ms(10_000));

    let err = Poller::new().poll(op, &cfg).await.unwrap_err();
    // Checks at ~0, 1s, 3s, 7s are within budget; ~15s is the first past it.
    match err {
        PollError::Timeout { elapsed, attempts } => {
            assert_eq!(attempts, 5);
            assert!(elapsed > ms(10_000));
            assert!(elapsed < ms(15_400), "{elapsed:?}");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(log.lock().unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn concurrent_polls_keep_separate_schedules() {
    let start = Instant::now();
    let slow_log = AttemptLog::default();
    let fast_log = AttemptLog::default();
    let poller = Poller::new();
    let pending = |s: &Status| s.status == "pending";

    let slow_cfg = PollConfig::new(pending)
        .initial_delay(ms(1_000))
        .max_jitter(Duration::ZERO);
    let fast_cfg = PollConfig::new(pending)
        .initial_delay(ms(300))
        .max_jitter(Duration::ZERO);

    let slow = poller.poll(
        scripted(vec!["pending", "pending", "pending", "done"], start, slow_log.clone()),
        &slow_cfg,
    );
    let fast = poller.poll(
        scripted(vec!["pending", "pending", "done"], start, fast_log.clone()),
        &fast_cfg,
    );
    let (slow, fast) = tokio::join!(slow, fast);
    assert_eq!(slow.unwrap().status, "done");
    assert_eq!(fast.unwrap().status, "done");

    assert_gaps(&slow_log, &[1_000, 2_000, 4_000]);
    assert_gaps(&fast_log, &[300, 600]);
}

#[tokio::test(start_paused = true)]
async fn fresh_invocation_restarts_at_initial_delay() {
    let poller = Poller::new();
    let cfg = PollConfig::new(|s: &Status| s.status == "pending")
        .initial_delay(ms(500))
        .max_jitter(Duration::ZERO);

    for _ in 0..2 {
        let log = AttemptLog::default();
        let op = scripted(vec!["pending", "pending", "done"], Instant::now(), log.clone());
        poller.poll(op, &cfg).await.unwrap();
        assert_gaps(&log, &[500, 1_000]);
    }
}

#[tokio::test(start_paused = true)]
async fn spawned_poll_is_send() {
    let cfg = PollConfig::new(|s: &Status| s.status == "pending").max_jitter(Duration::ZERO);
    let handle = tokio::spawn(async move {
        let op = scripted(vec!["pending", "done"], Instant::now(), AttemptLog::default());
        repoll::poll_with_backoff(op, &cfg).await
    });
    assert_eq!(handle.await.unwrap().unwrap().status, "done");
}
