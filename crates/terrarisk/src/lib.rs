//! Decision-support engine for the TerraRisk municipal risk workshop.
//!
//! Participant groups spend a limited credit budget on information layers,
//! rank ten municipalities by intervention priority, and are scored against a
//! deterministic platform ranking computed from the raw indicator data.

pub mod actions;
pub mod catalog;
pub mod comparison;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ledger;
pub mod ranking;
pub mod store;
pub mod telemetry;

/// Round half away from zero to a fixed number of decimal places, matching
/// the presentation rounding used across the API payloads.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
