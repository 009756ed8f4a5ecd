//! Observability setup for msgchan binaries.

pub mod tracing_setup;

pub use tracing_setup::{LogOptions, filter_for_verbosity, init_tracing, shutdown_tracing};
