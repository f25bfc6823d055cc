// OutageSnap - platform/mod.rs
//
// Platform abstraction layer: config resolution, filesystem primitives,
// external commands.
// Must NOT depend on: core, app.

pub mod command;
pub mod config;
pub mod fs;
