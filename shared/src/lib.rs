//! Shared types and domain logic for the Farm Operations platform
//!
//! This crate contains the pure parts of the scheduling and alerting engine:
//! models, the growth profile registry, the maintenance schedule generator,
//! crop lifecycle assessment and the condition rules. It performs no I/O and
//! is used by the backend and, through WASM, by the dashboard client.

pub mod lifecycle;
pub mod models;
pub mod registry;
pub mod rules;
pub mod schedule;
pub mod types;

pub use lifecycle::*;
pub use models::*;
pub use registry::*;
pub use rules::*;
pub use schedule::*;
pub use types::*;
