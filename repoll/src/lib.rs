//! Backoff polling.
//!
//! The core is [`Poller`]: it repeats a caller-supplied request until a
//! continuation predicate reports a terminal response, doubling the wait
//! between attempts and giving up after a total duration. The remaining
//! modules build the `repoll` CLI on top of it.

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod output;
pub mod poller;
pub mod proj;
pub mod util;

pub use clock::{Clock, TokioClock};
pub use error::PollError;
pub use poller::{poll_with_backoff, BackoffSettings, PollConfig, Poller};
