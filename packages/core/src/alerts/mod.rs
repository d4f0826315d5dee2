//! Alert raising and handling.
//!
//! Evaluators raise alerts through [`dedup::ensure_open_alert`]; operators
//! acknowledge and resolve them through [`lifecycle`].

pub mod dedup;
pub mod lifecycle;

pub use dedup::ensure_open_alert;
