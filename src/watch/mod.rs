//! The per-server monitoring engine.

pub mod restart;
pub mod worker;

pub use restart::RestartSignal;
pub use worker::Worker;
