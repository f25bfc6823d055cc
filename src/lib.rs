// OutageSnap - lib.rs
//
// Library entry point, exposing all modules for integration testing and
// programmatic use. The `outagesnap` binary in `main.rs` is a thin CLI over
// `app::snapshot`.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
