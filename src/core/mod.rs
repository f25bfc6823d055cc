// OutageSnap - core/mod.rs
//
// Core business logic layer: the time window model, log slicing, log source
// rules and modified-file collection.
// Must NOT depend on: app.

pub mod collector;
pub mod model;
pub mod slicer;
pub mod sources;
