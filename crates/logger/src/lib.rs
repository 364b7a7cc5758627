//! Tracing setup shared by the opsmon binaries.

mod subscriber;

pub use subscriber::{init as init_tracing, init_to_file};
