//! # Velocity Command Subscriber
//!
//! Receives velocity commands from the middleware. Commands are queued on
//! the socket and drained once per driver cycle; the bridge forwards them to
//! the vehicle without acknowledgement or backpressure.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;

use sim_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    telem::VelocityCommand,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Subscriber for middleware velocity commands.
pub struct CmdSub {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CmdSubError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdSub {
    /// Create a new subscriber bound to the given endpoint.
    ///
    /// This function will not block until a commander connects.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, CmdSubError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            linger: 1,
            recv_timeout: 0,
            subscribe: Some(Vec::new()),
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, endpoint)
            .map_err(CmdSubError::SocketError)?;

        Ok(Self { socket })
    }

    /// Drain all commands which arrived since the last call.
    ///
    /// Unparsable messages are logged and skipped, they never stall the
    /// queue.
    pub fn drain(&self) -> Vec<VelocityCommand> {
        let mut cmds = Vec::new();

        loop {
            let msg = match self.socket.recv_msg(zmq::DONTWAIT) {
                Ok(m) => m,
                Err(zmq::Error::EAGAIN) => break,
                Err(e) => {
                    warn!("Error receiving velocity command: {}", e);
                    break;
                }
            };

            let cmd_str = match msg.as_str() {
                Some(s) => s,
                None => {
                    warn!("Non UTF-8 velocity command");
                    continue;
                }
            };

            match serde_json::from_str::<VelocityCommand>(cmd_str) {
                Ok(cmd) => cmds.push(cmd),
                Err(e) => warn!("Could not parse velocity command: {}", e),
            }
        }

        cmds
    }
}
