// OutageSnap - app/mod.rs
//
// Application layer: snapshot orchestration, stage execution, source table
// loading.
// Dependencies: core, platform, util.

pub mod snapshot;
pub mod source_mgr;
pub mod stages;
