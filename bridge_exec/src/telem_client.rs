//! # Telemetry Client
//!
//! This module provides the connection to the vehicle simulation server. The
//! server exposes three sockets: a status stream the client subscribes to, a
//! metadata socket answering the one-shot geometry/world query at connection
//! time, and a command socket accepting velocity commands.
//!
//! `connect` may be called repeatedly: each call tears down any existing
//! sockets and builds fresh ones, which is how the bridge recovers from a
//! lost server or a restarted world.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use std::collections::HashMap;

use sim_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    telem::{
        MetadataRequest, MetadataResponse, Transform, VehicleGeometry, VehicleStatus,
        VelocityCommand, WorldCalibration,
    },
};

use crate::params::BridgeExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Client for the vehicle simulation server.
pub struct TelemClient {
    params: BridgeExecParams,

    sockets: Option<Sockets>,

    /// Transforms used when the server's metadata omits them. Registered
    /// before connection.
    default_transforms: HashMap<String, Transform>,

    geom: Option<VehicleGeometry>,

    world: WorldCalibration,
}

/// The client's live sockets, absent while disconnected.
struct Sockets {
    status: MonitoredSocket,
    _meta: MonitoredSocket,
    cmd: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TelemClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the server: {0}")]
    RecvError(zmq::Error),

    #[error("No status sample arrived within {0} ms")]
    StatusTimeout(i64),

    #[error("Could not serialize the data: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the server: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The server sent a message which was not valid UTF-8")]
    NonUtf8Response,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelemClient {
    /// Create a new, unconnected client.
    pub fn new(params: &BridgeExecParams) -> Self {
        Self {
            params: params.clone(),
            sockets: None,
            default_transforms: HashMap::new(),
            geom: None,
            world: WorldCalibration::invalid(),
        }
    }

    /// Register a fallback transform used when the server's metadata does not
    /// carry one under `name`. Rotation components are scalar-last.
    pub fn set_default_transform(&mut self, name: &str, trans: [f64; 3], rot_xyzw: [f64; 4]) {
        self.default_transforms
            .insert(name.to_string(), Transform { trans, rot_xyzw });
    }

    /// Connect to the simulation server and fetch the static metadata.
    ///
    /// Any existing sockets are dropped first, so this doubles as the
    /// reconnect path.
    pub fn connect(&mut self, ctx: &zmq::Context) -> Result<(), TelemClientError> {
        // Drop any previous connection before building a new one
        self.sockets = None;
        self.geom = None;
        self.world = WorldCalibration::invalid();

        let status_socket_options = SocketOptions {
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            subscribe: Some(Vec::new()),
            ..Default::default()
        };
        let meta_socket_options = SocketOptions {
            connect_timeout: 1000,
            linger: 1,
            recv_timeout: 1000,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };
        let cmd_socket_options = SocketOptions {
            connect_timeout: 1000,
            block_on_first_connect: false,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let status = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            status_socket_options,
            &self.params.status_endpoint,
        )
        .map_err(TelemClientError::SocketError)?;
        let meta = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            meta_socket_options,
            &self.params.meta_endpoint,
        )
        .map_err(TelemClientError::SocketError)?;
        let cmd = MonitoredSocket::new(
            ctx,
            zmq::PUSH,
            cmd_socket_options,
            &self.params.cmd_endpoint,
        )
        .map_err(TelemClientError::SocketError)?;

        // Fetch the static metadata over the REQ socket
        let request = serde_json::to_string(&MetadataRequest::Query)
            .map_err(TelemClientError::SerializationError)?;
        meta.send(&request, 0).map_err(TelemClientError::SendError)?;

        let msg = meta.recv_msg(0).map_err(TelemClientError::RecvError)?;
        let response: MetadataResponse = serde_json::from_str(
            msg.as_str().ok_or(TelemClientError::NonUtf8Response)?,
        )
        .map_err(TelemClientError::DeserializeError)?;

        let mut geom: VehicleGeometry = response.vehicle.into();

        // Fill in any transforms the server did not provide
        for (name, tf) in &self.default_transforms {
            geom.transforms
                .entry(name.clone())
                .or_insert_with(|| tf.clone());
        }

        debug!("Connected, geometry transforms: {:?}", geom.transforms.keys());

        self.world = match response.world {
            Some(meta) => meta.into(),
            None => WorldCalibration::invalid(),
        };
        self.geom = Some(geom);
        self.sockets = Some(Sockets {
            status,
            _meta: meta,
            cmd,
        });

        Ok(())
    }

    /// True while the client holds a live connection to the server on both
    /// the status and command sockets.
    ///
    /// A live status stream alone is not enough: commands must not be
    /// reported as forwarded while the command socket is down.
    pub fn is_valid(&self) -> bool {
        match self.sockets {
            Some(ref s) => s.cmd.connected() && s.status.connected(),
            None => false,
        }
    }

    /// Wait for one status sample, bounded by `timeout_ms`.
    pub fn get_status_one(&self, timeout_ms: i64) -> Result<VehicleStatus, TelemClientError> {
        let sockets = self.sockets.as_ref().ok_or(TelemClientError::NotConnected)?;

        let ready = sockets
            .status
            .poll(zmq::POLLIN, timeout_ms)
            .map_err(TelemClientError::RecvError)?;
        if ready == 0 {
            return Err(TelemClientError::StatusTimeout(timeout_ms));
        }

        let msg = sockets
            .status
            .recv_msg(zmq::DONTWAIT)
            .map_err(TelemClientError::RecvError)?;

        serde_json::from_str(msg.as_str().ok_or(TelemClientError::NonUtf8Response)?)
            .map_err(TelemClientError::DeserializeError)
    }

    /// Send a velocity command to the vehicle. Fire-and-forget: the server
    /// does not acknowledge commands.
    pub fn set_vw(&self, linear: f64, angular: f64) -> Result<(), TelemClientError> {
        let sockets = self.sockets.as_ref().ok_or(TelemClientError::NotConnected)?;

        let cmd_str = serde_json::to_string(&VelocityCommand { linear, angular })
            .map_err(TelemClientError::SerializationError)?;

        sockets
            .cmd
            .send(&cmd_str, zmq::DONTWAIT)
            .map_err(TelemClientError::SendError)
    }

    /// The vehicle geometry fetched at connection, or `None` while
    /// disconnected.
    pub fn geometry(&self) -> Option<&VehicleGeometry> {
        self.geom.as_ref()
    }

    /// The world calibration fetched at connection. Invalid while
    /// disconnected or when the server provided none.
    pub fn world(&self) -> &WorldCalibration {
        &self.world
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use sim_if::telem::VehicleMeta;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use std::thread;
    use std::time::Duration;

    fn test_params(status_port: u16, meta_port: u16, cmd_port: u16) -> BridgeExecParams {
        BridgeExecParams {
            status_endpoint: format!("tcp://127.0.0.1:{}", status_port),
            meta_endpoint: format!("tcp://127.0.0.1:{}", meta_port),
            cmd_endpoint: format!("tcp://127.0.0.1:{}", cmd_port),
            record_endpoint: "tcp://127.0.0.1:*".into(),
            cmd_vel_endpoint: "tcp://127.0.0.1:*".into(),
            status_timeout_ms: 2000,
            publish_map_alignment: false,
            map_alignment_ratio: 10,
        }
    }

    fn metadata_json() -> String {
        let vehicle = VehicleMeta {
            wheel_perimeter_l: 0.5,
            wheel_perimeter_r: 0.5,
            reduction_ratio: 15.0,
            tread_width: 0.3,
            transforms: HashMap::new(),
        };

        serde_json::to_string(&MetadataResponse {
            vehicle,
            world: None,
        })
        .expect("metadata should serialize")
    }

    /// Answer metadata queries until stopped. Any other server sockets are
    /// bound by the test itself.
    fn spawn_meta_server(
        ctx: &zmq::Context,
        meta_port: u16,
        stop: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        let ctx = ctx.clone();

        thread::spawn(move || {
            let rep = ctx.socket(zmq::REP).expect("REP socket");
            rep.bind(&format!("tcp://127.0.0.1:{}", meta_port))
                .expect("meta bind");

            let reply = metadata_json();

            while !stop.load(Ordering::Relaxed) {
                if rep.recv_msg(zmq::DONTWAIT).is_ok() {
                    rep.send(&reply, 0).expect("metadata reply");
                }
                thread::sleep(Duration::from_millis(5));
            }
        })
    }

    #[test]
    fn test_valid_needs_command_link() {
        let ctx = zmq::Context::new();
        let stop = Arc::new(AtomicBool::new(false));
        let meta_server = spawn_meta_server(&ctx, 25712, stop.clone());

        // Status endpoint live, command endpoint dead for now
        let status_pub = ctx.socket(zmq::PUB).expect("PUB socket");
        status_pub
            .bind("tcp://127.0.0.1:25711")
            .expect("status bind");

        thread::sleep(Duration::from_millis(100));

        let mut client = TelemClient::new(&test_params(25711, 25712, 25713));

        let mut connected = false;
        for _ in 0..10 {
            if client.connect(&ctx).is_ok() {
                connected = true;
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        assert!(connected, "client never connected to the loopback server");
        assert!(client.geometry().is_some());

        // A live status stream alone must not report the client as valid
        assert!(!client.is_valid());

        // Bring up a consumer for the command socket
        let cmd_pull = ctx.socket(zmq::PULL).expect("PULL socket");
        cmd_pull.bind("tcp://127.0.0.1:25713").expect("cmd bind");

        let mut valid = false;
        for _ in 0..200 {
            if client.is_valid() {
                valid = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(
            valid,
            "client never became valid after the command consumer appeared"
        );

        stop.store(true, Ordering::Relaxed);
        meta_server.join().expect("meta server thread");
    }
}
