use std::future::Future;
use std::time::{Duration, Instant};

/// Time source used by the poller.
///
/// Abstracted so tests can observe every sleep without waiting on a real timer.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, dur: Duration) -> impl Future<Output = ()> + Send;
}

/// Tokio timer. Honors `tokio::time::pause`, so paused-time tests work unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(dur)
    }
}
