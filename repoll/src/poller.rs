//! Backoff poller.
//!
//! [`Poller::poll`] keeps invoking a request operation until the continuation
//! predicate of a [`PollConfig`] returns `false`. Between attempts it sleeps for
//! the current delay plus a small additive jitter. The delay doubles after every
//! sleep, up to [`BackoffSettings::max_delay`].
//!
//! Only the continuation decision is retried. A failed request ends the poll at
//! once with [`PollError::Operation`]; transport retry policy belongs to the
//! operation itself.
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use repoll::{poll_with_backoff, PollConfig};
//!
//! # async fn fetch_status() -> Result<String, std::io::Error> { Ok("done".into()) }
//! # async fn run() -> Result<(), repoll::PollError<std::io::Error>> {
//! let config = PollConfig::new(|status: &String| status == "pending")
//!     .initial_delay(Duration::from_millis(500))
//!     .max_duration(Duration::from_secs(60));
//! let status = poll_with_backoff(fetch_status, &config).await?;
//! # Ok(()) }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::error::PollError;
use crate::util::{jitter, next_delay};

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(5 * 60 * 1_000);
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_millis(10 * 60 * 1_000);
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(100);

/// Timing knobs of a poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffSettings {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Cap for the doubled delay.
    pub max_delay: Duration,
    /// Wall-clock budget, checked after each "continue" response.
    pub max_duration: Duration,
    /// Upper bound (exclusive) of the jitter added to every sleep. Zero disables it.
    pub max_jitter: Duration,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_duration: DEFAULT_MAX_DURATION,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl BackoffSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay.is_zero() {
            return Err("initial delay must be greater than zero".into());
        }
        if self.max_delay < self.initial_delay {
            return Err(format!(
                "max delay {:?} is shorter than initial delay {:?}",
                self.max_delay, self.initial_delay
            ));
        }
        if self.max_duration.is_zero() {
            return Err("max duration must be greater than zero".into());
        }
        Ok(())
    }
}

/// Settings plus the continuation predicate. `should_continue` returning
/// `true` means the response is still pending.
#[derive(Clone, Debug)]
pub struct PollConfig<P> {
    pub backoff: BackoffSettings,
    pub should_continue: P,
}

impl<P> PollConfig<P> {
    pub fn new(should_continue: P) -> Self {
        Self { backoff: BackoffSettings::default(), should_continue }
    }

    pub fn with_backoff(mut self, backoff: BackoffSettings) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn initial_delay(mut self, d: Duration) -> Self {
        self.backoff.initial_delay = d;
        self
    }

    pub fn max_delay(mut self, d: Duration) -> Self {
        self.backoff.max_delay = d;
        self
    }

    pub fn max_duration(mut self, d: Duration) -> Self {
        self.backoff.max_duration = d;
        self
    }

    pub fn max_jitter(mut self, d: Duration) -> Self {
        self.backoff.max_jitter = d;
        self
    }
}

// Loop state, local to one invocation.
struct PollAttempt {
    index: u32,
    current_delay: Duration,
    elapsed: Duration,
}

/// Runs polls against a [`Clock`], optionally bound to a cancellation token.
///
/// A `Poller` holds no per-poll state; one value can drive any number of
/// concurrent polls, each with its own delay schedule.
#[derive(Clone, Debug, Default)]
pub struct Poller<C = TokioClock> {
    clock: C,
    cancel: Option<CancellationToken>,
}

impl Poller<TokioClock> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Clock> Poller<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, cancel: None }
    }

    /// Checked before each request and raced against both the request and the sleep.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub async fn poll<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        config: &PollConfig<P>,
    ) -> Result<T, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
    {
        let settings = config.backoff;
        settings.validate().map_err(PollError::InvalidConfig)?;

        let start = self.clock.now();
        let mut attempt = PollAttempt {
            index: 0,
            current_delay: settings.initial_delay,
            elapsed: Duration::ZERO,
        };

        loop {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(PollError::Cancelled { attempts: attempt.index });
            }
            let value = match self.cancellable(operation()).await {
                Some(res) => res.map_err(PollError::Operation)?,
                None => return Err(PollError::Cancelled { attempts: attempt.index }),
            };
            let attempts = attempt.index + 1;
            attempt.elapsed = self.clock.now().saturating_duration_since(start);

            if !(config.should_continue)(&value) {
                info!(attempts, elapsed = ?attempt.elapsed, "poll reached terminal state");
                return Ok(value);
            }
            if attempt.elapsed > settings.max_duration {
                warn!(attempts, elapsed = ?attempt.elapsed, "poll timed out");
                return Err(PollError::Timeout { elapsed: attempt.elapsed, attempts });
            }

            let sleep_for = attempt.current_delay.saturating_add(jitter(settings.max_jitter));
            debug!(
                attempt = attempt.index,
                delay = ?attempt.current_delay,
                sleep = ?sleep_for,
                elapsed = ?attempt.elapsed,
                "still pending"
            );
            if self.cancellable(self.clock.sleep(sleep_for)).await.is_none() {
                return Err(PollError::Cancelled { attempts });
            }

            attempt.current_delay = next_delay(attempt.current_delay, settings.max_delay);
            attempt.index = attempts;
        }
    }

    async fn cancellable<Fut: Future>(&self, fut: Fut) -> Option<Fut::Output> {
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                out = fut => Some(out),
            },
            None => Some(fut.await),
        }
    }
}

/// Polls with the tokio clock and no cancellation.
pub async fn poll_with_backoff<T, E, F, Fut, P>(
    operation: F,
    config: &PollConfig<P>,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    Poller::new().poll(operation, config).await
}
