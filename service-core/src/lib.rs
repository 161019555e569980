//! Infrastructure shared by the shop binaries: configuration, the common
//! error type, HTTP middleware and telemetry setup.

pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
