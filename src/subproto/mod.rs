//! Sub-protocols invoked by the cycle state machine: arbiter (forced
//! bug-demonstration), diagnostics (reviewer-requested runs), moderator
//! (deadlock resolution), and oscillation detection.

pub mod arbiter;
pub mod diagnostics;
pub mod moderator;
pub mod oscillation;
