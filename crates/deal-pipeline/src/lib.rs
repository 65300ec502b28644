//! Deal flow pipeline: qualifies newly discovered properties through an ordered
//! set of stages and dispatches the follow-up actions bound to each stage.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
