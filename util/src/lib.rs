//! Utility library for the Sim Bridge software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod logger;
pub mod params;
pub mod session;
pub mod time;
