// Library root. Exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod alerts;
pub mod api;
pub mod clock;
pub mod custody;
pub mod db;
pub mod error;
pub mod metrics;
pub mod model;
pub mod repository;
pub mod resolver;
pub mod rules;
pub mod scheduler;

// These modules are only needed by the binary.
pub mod cli;
pub mod config;
pub mod logging;

#[cfg(test)]
pub(crate) mod testing;
