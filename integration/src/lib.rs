// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]
//! # Integration - Low-Level Plumbing
//!
//! Protocol-agnostic glue used by every process in the Kestrel ecosystem:
//!
//! * [`Terminal`] / [`Unrecoverable`] — trait vocabulary for "should this
//!   event loop stop" decisions (spec.md §5 cancellation/shutdown).
//! * [`backoff`] — exponential-with-jitter reconnect delay (spec.md §4.1).
//! * [`callback`] — a typed multi-subscriber callback registry, the single
//!   mechanism behind every `add_*_callback` hook in spec.md §9.
//! * [`error::SocketError`] — shared transport error vocabulary.

pub mod backoff;
pub mod callback;
pub mod error;

/// Something that can tell you whether it represents the end of a stream of
/// events (e.g. a `Shutdown` message terminates an `EngineEvent` stream).
pub trait Terminal {
    fn is_terminal(&self) -> bool;
}

/// Something that can classify its own errors as unrecoverable (process-fatal)
/// vs recoverable (retry in place). Used to decide, per spec.md §7, whether an
/// error is "Transport" (retry) or "Operation failed" (abort startup).
pub trait Unrecoverable {
    fn is_unrecoverable(&self) -> bool;
}
