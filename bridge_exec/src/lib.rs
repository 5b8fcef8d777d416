//! # Bridge library.
//!
//! This library allows other crates in the workspace to access items defined
//! inside the bridge crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Bridge lifecycle - connects the telemetry client, odometry and outputs
pub mod bridge;

/// Velocity command subscriber - receives commands from the middleware
pub mod cmd_sub;

/// Frame calibrator - static sensor transforms and world alignment
pub mod frames;

/// Odometry integrator - dead-reckoning pose estimation from wheel rates
pub mod odometry;

/// Output sink - typed record channels published to the middleware
pub mod output;

/// Executable parameters
pub mod params;

/// Telemetry client - talks to the vehicle simulation server
pub mod telem_client;
