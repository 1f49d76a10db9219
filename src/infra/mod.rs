//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod memory;
pub mod runtime;
pub mod telemetry;
