//! Metrics export module.
//!
//! Pushes the outcome of a check to external monitoring systems alongside the
//! exit code. Currently supports Prometheus Push Gateway.
//!
//! # Submodules
//!
//! - `prom` - Prometheus metrics integration

pub mod prom;
