//! `fencewatch`: geofence enforcement for RCON-managed game servers
//!
//! This library monitors players on live multiplayer servers over an RCON
//! connection, enforces per-team map regions ("fences"), and escalates from
//! a warning message to a forced punishment when a player stays outside
//! their team's permitted area.

pub mod cli;
pub mod config;
pub mod error;
pub mod fence;
pub mod observability;
pub mod rcon;
pub mod watch;
