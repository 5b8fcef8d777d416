//! # Simulation interface crate.
//!
//! Provides the wire-level interfaces between the bridge executable, the
//! vehicle simulation server, and the record consumers downstream of the
//! bridge.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Network module
pub mod net;

/// Quaternion ordering seam between internal and wire representations
pub mod quat;

/// Record definitions published by the bridge
pub mod records;

/// Telemetry and metadata definitions provided by the simulation server
pub mod telem;
