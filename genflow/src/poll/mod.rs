//! Create-then-poll state machine for vendor jobs.
//!
//! [`PollEngine`] submits a job, then re-fetches its status on an injected
//! [`Clock`] until the job is terminal or the budget in [`PollOptions`] runs
//! out.

mod clock;
mod engine;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{PollEngine, PollOptions};
