//! Main bridge executable entry point.
//!
//! # Architecture
//!
//! The executable runs a single-threaded driver loop around the bridge:
//!
//!     - Initialise session, logging and networking
//!     - Main loop:
//!         - If the bridge is unhealthy, re-initialise it with a bounded
//!           backoff (the process never gives up)
//!         - Drain pending velocity commands and forward them
//!         - Run one telemetry cycle
//!
//! While healthy the loop is paced by the status fetch inside
//! [`bridge_lib::bridge::Bridge::spin`], which blocks for at most the
//! configured status timeout.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use bridge_lib::{bridge::Bridge, cmd_sub::CmdSub, params::BridgeExecParams};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::thread;
use std::time::Duration;
use structopt::StructOpt;

// Internal
use sim_if::net::zmq;
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Initial delay between failed initialisation attempts.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound on the delay between failed initialisation attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line options for the bridge executable.
#[derive(Debug, StructOpt)]
#[structopt(name = "bridge_exec", about = "Vehicle simulation bridge")]
struct Opt {
    /// Parameter file, relative to the software root's params directory
    #[structopt(short, long, default_value = "bridge_exec.toml")]
    params: String,

    /// Host of the simulation server, overriding the hosts in the parameter
    /// file's endpoints
    #[structopt(short, long)]
    device: Option<String>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("bridge_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Vehicle Simulation Bridge\n");
    info!("Session directory: {:?}\n", session.session_root);

    let opt = Opt::from_args();

    // ---- LOAD PARAMETERS ----

    let mut params: BridgeExecParams =
        util::params::load(&opt.params).wrap_err("Could not load bridge params")?;

    info!("Exec parameters loaded from {:?}", opt.params);

    if let Some(ref device) = opt.device {
        params.override_device(device);
        info!("Simulation endpoints redirected to device {:?}", device);
    }

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let mut bridge =
        Bridge::new(&zmq_ctx, &params).wrap_err("Failed to initialise the Bridge")?;
    info!("Bridge initialised");

    let cmd_sub = CmdSub::new(&zmq_ctx, &params.cmd_vel_endpoint)
        .wrap_err("Failed to initialise the velocity command subscriber")?;
    info!("Velocity command subscriber initialised");

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut backoff = INITIAL_BACKOFF;

    loop {
        // If the bridge is down bring it back up before anything else
        if !bridge.is_running() {
            if bridge.error().is_empty() {
                info!("Initialising bridge");
            }
            else {
                info!("Initialising bridge: {}", bridge.error());
            }

            if bridge.initialize() {
                backoff = INITIAL_BACKOFF;
            }
            else {
                warn!(
                    "Bridge initialisation failed ({}), retrying in {:?}",
                    bridge.error(),
                    backoff
                );
                thread::sleep(backoff);
                backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
            }

            continue;
        }

        // ---- COMMAND PROCESSING ----

        for cmd in cmd_sub.drain() {
            bridge.handle_command(cmd);
        }

        // ---- TELEMETRY CYCLE ----

        bridge.spin();
    }
}
