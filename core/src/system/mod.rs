//! System-level process wiring (spec.md §2): the four processes, built from
//! the collaborators every other crate defines.
//!
//! * [`config`] — [`config::Config`] (spec.md §6.4).
//! * [`update_log`] — [`update_log::UpdateLogModel`], the replay log
//!   (spec.md §3 "UpdateLog").
//! * [`feed_publisher`] — thin wiring around
//!   [`kestrel_data::feed::FeedPublisher`] (spec.md §4.1).
//! * [`feed_logger`] — batches bus updates into [`update_log::UpdateLogModel`]
//!   rows (spec.md §2 "Feed Logger").
//! * [`orchestrator`] — drives [`crate::exchange_state::ExchangeState`] and a
//!   set of [`kestrel_trader::Strategy`] instances off the live bus (spec.md
//!   §2 "Strategy Orchestrator" / "Strategy").
//! * [`replay`] — replays recorded [`update_log::UpdateLogModel`] rows
//!   through the same hooks the live bus would drive (SPEC_FULL "Replay
//!   pacing").

pub mod config;
pub mod feed_logger;
pub mod feed_publisher;
pub mod orchestrator;
pub mod replay;
pub mod update_log;

pub use config::Config;
pub use update_log::UpdateLogModel;
