//! clearquote: pricing and quoting rule engine for waste-clearance bookings.

pub mod config;
pub mod error;
pub mod pricing;
pub mod telemetry;
