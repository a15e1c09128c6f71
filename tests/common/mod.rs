//! Common test utilities and helper modules
//!
//! Fleets, an in-memory two-player harness and relay connection helpers.

pub mod fixtures;
pub mod relay_utils;
