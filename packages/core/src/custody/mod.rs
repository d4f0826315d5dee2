//! Custody lifecycle: the transition rules and the operations that apply
//! them.

pub mod machine;
pub mod service;

pub use machine::{ScanAction, ScanKind};
pub use service::{CustodyService, ScanOutcome};

#[cfg(test)]
mod tests;
