//! # Bridge Executable Parameters
//!
//! This module provides parameters for the bridge executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Clone)]
pub struct BridgeExecParams {
    /// Network endpoint of the simulation server's status stream
    pub status_endpoint: String,

    /// Network endpoint of the simulation server's metadata socket
    pub meta_endpoint: String,

    /// Network endpoint of the simulation server's command socket
    pub cmd_endpoint: String,

    /// Network endpoint the bridge publishes records on
    pub record_endpoint: String,

    /// Network endpoint the bridge receives velocity commands on
    pub cmd_vel_endpoint: String,

    /// Timeout on a single status fetch in milliseconds
    pub status_timeout_ms: i32,

    /// Publish the map to odom alignment transform
    pub publish_map_alignment: bool,

    /// Publish the alignment transform once every this many cycles
    pub map_alignment_ratio: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BridgeExecParams {
    /// Point the three simulation-facing endpoints at a different host,
    /// keeping each endpoint's scheme and port.
    ///
    /// Backs the `--device` command line option, which redirects the bridge
    /// to another simulation server without editing the parameter file. The
    /// record and command endpoints are bound by the bridge itself and are
    /// left untouched.
    pub fn override_device(&mut self, device: &str) {
        self.status_endpoint = replace_host(&self.status_endpoint, device);
        self.meta_endpoint = replace_host(&self.meta_endpoint, device);
        self.cmd_endpoint = replace_host(&self.cmd_endpoint, device);
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Swap the host part of a `scheme://host:port` endpoint.
///
/// Endpoints without both a scheme separator and a port are returned
/// unchanged, the override only makes sense for transports with a host.
fn replace_host(endpoint: &str, host: &str) -> String {
    let scheme_end = match endpoint.find("://") {
        Some(i) => i + 3,
        None => return endpoint.to_string(),
    };

    match endpoint[scheme_end..].rfind(':') {
        Some(i) => format!(
            "{}{}{}",
            &endpoint[..scheme_end],
            host,
            &endpoint[scheme_end + i..]
        ),
        None => endpoint.to_string(),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn test_params() -> BridgeExecParams {
        BridgeExecParams {
            status_endpoint: "tcp://localhost:23000".into(),
            meta_endpoint: "tcp://localhost:23001".into(),
            cmd_endpoint: "tcp://localhost:23002".into(),
            record_endpoint: "tcp://*:23100".into(),
            cmd_vel_endpoint: "tcp://*:23101".into(),
            status_timeout_ms: 100,
            publish_map_alignment: false,
            map_alignment_ratio: 10,
        }
    }

    #[test]
    fn test_device_override_rewrites_simulation_endpoints() {
        let mut params = test_params();
        params.override_device("192.168.10.7");

        assert_eq!(params.status_endpoint, "tcp://192.168.10.7:23000");
        assert_eq!(params.meta_endpoint, "tcp://192.168.10.7:23001");
        assert_eq!(params.cmd_endpoint, "tcp://192.168.10.7:23002");

        // The bridge's own bound endpoints are untouched
        assert_eq!(params.record_endpoint, "tcp://*:23100");
        assert_eq!(params.cmd_vel_endpoint, "tcp://*:23101");
    }

    #[test]
    fn test_device_override_keeps_hostless_endpoints() {
        assert_eq!(
            replace_host("ipc:///tmp/status.sock", "devbox"),
            "ipc:///tmp/status.sock"
        );
        assert_eq!(replace_host("not-an-endpoint", "devbox"), "not-an-endpoint");
    }
}

