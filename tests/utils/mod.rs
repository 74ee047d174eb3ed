pub mod assertions;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::{collect_events, expect_event, expect_silence};
#[allow(unused_imports)]
pub use setup::{settle, spawn_relay, TestHub};
