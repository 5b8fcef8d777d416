//! # Bridge lifecycle
//!
//! Orchestrates the telemetry client, odometry integrator, frame calibrator
//! and output sink across a connect, calibrate, run cycle.
//!
//! The bridge moves through the states `Disconnected -> Connecting ->
//! Calibrating -> Running`; any failure drops it back to `Disconnected`
//! with a human readable error, and the driver loop in `main` keeps calling
//! [`Bridge::initialize`] until it comes back up. A restarted world (the
//! simulation clock jumping backwards) is treated the same way, since the
//! vehicle and world metadata may have changed along with the clock: the
//! whole frame set is recalibrated, not just the pose reset.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::Utc;
use log::{info, warn};

use sim_if::{
    net::zmq,
    quat,
    records::{ImuRecord, NavSatRecord, OdometryRecord, TransformRecord},
    telem::VelocityCommand,
};

use crate::{
    frames::{
        FrameSet, BASE_FRAME, BASE_GT_FRAME, IMU_FRAME, LATLON_FRAME, LIDAR_FRAME, MAP_FRAME,
        ODOM_FRAME,
    },
    odometry::{Accumulation, Odometry},
    output::{Channel, OutputSink, OutputSinkError},
    params::BridgeExecParams,
    telem_client::TelemClient,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The bridge between the vehicle simulation and the record consumers.
pub struct Bridge {
    ctx: zmq::Context,

    params: BridgeExecParams,

    telem: TelemClient,

    sink: OutputSink,

    /// Rebuilt from scratch on every initialisation.
    odo: Option<Odometry>,

    /// Rebuilt from scratch on every initialisation.
    frames: Option<FrameSet>,

    state: BridgeState,

    err: String,

    /// Cycle counter within the current `Running` session.
    seq: u64,

    ch_odom: Channel<OdometryRecord>,
    ch_odom_gt: Channel<OdometryRecord>,
    ch_imu: Channel<ImuRecord>,
    ch_navsat: Channel<NavSatRecord>,
    ch_tf: Channel<TransformRecord>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Lifecycle state of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Calibrating,
    Running,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Bridge {
    /// Create a new bridge. Registers the output channels and the default
    /// sensor transforms, but does not connect - call
    /// [`Bridge::initialize`] for that.
    pub fn new(ctx: &zmq::Context, params: &BridgeExecParams) -> Result<Self, OutputSinkError> {
        let mut sink = OutputSink::new(ctx, &params.record_endpoint)?;

        let ch_odom = sink.register("odom", ODOM_FRAME, BASE_FRAME);
        let ch_odom_gt = sink.register("odom_gt", ODOM_FRAME, BASE_GT_FRAME);
        let ch_imu = sink.register("imu", BASE_FRAME, IMU_FRAME);
        let ch_navsat = sink.register("gps/fix", BASE_FRAME, LATLON_FRAME);
        let ch_tf = sink.register("tf", "", "");

        let mut telem = TelemClient::new(params);

        // Register default transforms in case the server cannot provide such
        // information
        telem.set_default_transform("Lidar", [-0.22, 0.0, 0.518], [0.0, 0.0, 0.0, 1.0]);
        telem.set_default_transform("IMU", [0.0; 3], [0.0, 0.0, 0.0, 1.0]);

        Ok(Self {
            ctx: ctx.clone(),
            params: params.clone(),
            telem,
            sink,
            odo: None,
            frames: None,
            state: BridgeState::Disconnected,
            err: String::new(),
            seq: 0,
            ch_odom,
            ch_odom_gt,
            ch_imu,
            ch_navsat,
            ch_tf,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// True while the bridge is healthy and producing records.
    pub fn is_running(&self) -> bool {
        self.state == BridgeState::Running
    }

    /// The error which took the bridge out of `Running`, empty while
    /// healthy.
    pub fn error(&self) -> &str {
        &self.err
    }

    /// Bring the bridge up: connect, fetch a first status sample, build the
    /// odometry integrator, calibrate the frame set, and halt the vehicle.
    ///
    /// Returns `true` on success. On failure the state is `Disconnected` and
    /// [`Bridge::error`] describes what went wrong.
    pub fn initialize(&mut self) -> bool {
        self.seq = 0;
        self.state = BridgeState::Connecting;

        if let Err(e) = self.telem.connect(&self.ctx) {
            return self.fail(format!("Failed to connect: {}", e));
        }

        self.state = BridgeState::Calibrating;

        let st = match self.telem.get_status_one(self.params.status_timeout_ms as i64) {
            Ok(st) => st,
            Err(e) => return self.fail(format!("Status fetch failed: {}", e)),
        };

        let geom = match self.telem.geometry() {
            Some(g) => g.clone(),
            None => return self.fail("Connected but no vehicle geometry available".into()),
        };

        // Seed the integrator's clock from the first sample; the resulting
        // reset is expected and carries no pose
        let mut odo = Odometry::new(geom.clone());
        odo.accumulate(&st);
        self.odo = Some(odo);

        self.frames = Some(FrameSet::calibrate(&st, &geom, self.telem.world()));

        // Make sure the vehicle starts from rest
        if let Err(e) = self.telem.set_vw(0.0, 0.0) {
            warn!("Could not send the initial stop command: {}", e);
        }

        self.err.clear();
        self.state = BridgeState::Running;
        info!("Bridge initialised and running");

        true
    }

    /// Run one telemetry cycle: fetch a status sample, integrate it, and
    /// publish the resulting records.
    ///
    /// On failure the bridge leaves `Running` and the caller is expected to
    /// re-initialise it.
    pub fn spin(&mut self) {
        if self.state != BridgeState::Running {
            return;
        }

        let st = match self.telem.get_status_one(self.params.status_timeout_ms as i64) {
            Ok(st) => st,
            Err(e) => {
                self.fail(format!("Status fetch failed: {}", e));
                return;
            }
        };
        self.seq += 1;

        let stamp = Utc::now();

        let odo = match self.odo.as_mut() {
            Some(o) => o,
            None => {
                self.fail("Spin called before initialisation".into());
                return;
            }
        };

        match odo.accumulate(&st) {
            Accumulation::Reset => {
                // Static transforms and world alignment may have changed
                // along with the clock, so force a full re-initialisation
                self.fail("World restart detected".into());
                return;
            }
            Accumulation::Skipped => return,
            Accumulation::Updated => (),
        }

        let (x, y, th, vx, az) = (odo.x, odo.y, odo.th, odo.vx, odo.az);

        let frames = match self.frames.as_ref() {
            Some(f) => f.clone(),
            None => {
                self.fail("Spin called before calibration".into());
                return;
            }
        };

        // Estimated odometry
        let q = quat::from_yaw(th);
        if let Err(e) = self
            .sink
            .emit(&self.ch_odom, stamp, OdometryRecord::new([x, y, 0.0], &q, vx, az))
        {
            warn!("Could not publish odometry: {}", e);
        }
        if let Err(e) = self.sink.emit_transform(
            &self.ch_tf,
            stamp,
            ODOM_FRAME,
            BASE_FRAME,
            TransformRecord::new([x, y, 0.0], &q),
        ) {
            warn!("Could not publish odometry transform: {}", e);
        }

        // Ground truth, annotated with the estimated forward velocity and
        // the raw yaw rate
        let qgt = st.orientation();
        if let Err(e) = self.sink.emit(
            &self.ch_odom_gt,
            stamp,
            OdometryRecord::new(st.world_position, &qgt, vx, st.rz),
        ) {
            warn!("Could not publish ground-truth odometry: {}", e);
        }
        if let Err(e) = self.sink.emit_transform(
            &self.ch_tf,
            stamp,
            ODOM_FRAME,
            BASE_GT_FRAME,
            TransformRecord::new(st.world_position, &qgt),
        ) {
            warn!("Could not publish ground-truth transform: {}", e);
        }

        // Inertial sample: ground-truth orientation, raw rates and
        // accelerations from the physics engine
        if let Err(e) = self.sink.emit(
            &self.ch_imu,
            stamp,
            ImuRecord::new(
                st.orientation_wxyz,
                [st.rx, st.ry, st.rz],
                [st.ax, st.ay, st.az],
            ),
        ) {
            warn!("Could not publish inertial record: {}", e);
        }
        if let Err(e) = self.sink.emit_transform(
            &self.ch_tf,
            stamp,
            BASE_FRAME,
            IMU_FRAME,
            TransformRecord::new(frames.imu.trans, &frames.imu.rotation()),
        ) {
            warn!("Could not publish IMU transform: {}", e);
        }

        // Satellite fix from the raw latitude/longitude
        if let Err(e) = self.sink.emit(
            &self.ch_navsat,
            stamp,
            NavSatRecord::from_lat_lon(st.latitude, st.longitude),
        ) {
            warn!("Could not publish satellite fix: {}", e);
        }

        // Scanner position
        if let Err(e) = self.sink.emit_transform(
            &self.ch_tf,
            stamp,
            BASE_FRAME,
            LIDAR_FRAME,
            TransformRecord::new(frames.lidar.trans, &frames.lidar_rotation),
        ) {
            warn!("Could not publish lidar transform: {}", e);
        }

        // Map to odom alignment, parameter gated and off by default
        if self.params.publish_map_alignment
            && self.params.map_alignment_ratio > 0
            && self.seq % self.params.map_alignment_ratio == 0
        {
            if let Err(e) = self.sink.emit_transform(
                &self.ch_tf,
                stamp,
                MAP_FRAME,
                ODOM_FRAME,
                TransformRecord::new([0.0; 3], &frames.world_rotation),
            ) {
                warn!("Could not publish map alignment transform: {}", e);
            }
        }
    }

    /// Forward a velocity command to the vehicle. Only attempted while the
    /// telemetry client reports a live connection; dropped otherwise.
    pub fn handle_command(&mut self, cmd: VelocityCommand) {
        if !self.telem.is_valid() {
            return;
        }

        if let Err(e) = self.telem.set_vw(cmd.linear, cmd.angular) {
            warn!("Could not forward velocity command: {}", e);
        }
    }

    /// Drop out of `Running`, recording why.
    fn fail(&mut self, err: String) -> bool {
        self.state = BridgeState::Disconnected;
        self.err = err;
        false
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use sim_if::telem::{MetadataResponse, VehicleMeta, VehicleStatus};
    use std::collections::HashMap;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use std::thread;
    use std::time::Duration;

    fn test_params() -> BridgeExecParams {
        BridgeExecParams {
            // Wildcard port so parallel tests don't clash
            record_endpoint: "tcp://127.0.0.1:*".into(),
            cmd_vel_endpoint: "tcp://127.0.0.1:*".into(),
            status_endpoint: "tcp://127.0.0.1:1".into(),
            meta_endpoint: "tcp://127.0.0.1:1".into(),
            cmd_endpoint: "tcp://127.0.0.1:1".into(),
            status_timeout_ms: 10,
            publish_map_alignment: false,
            map_alignment_ratio: 10,
        }
    }

    fn sim_params(status_port: u16, meta_port: u16, cmd_port: u16) -> BridgeExecParams {
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

    fn status_json(sim_clock: f64) -> String {
        serde_json::to_string(&VehicleStatus {
            sim_clock,
            lrpm: 0.0,
            rrpm: 0.0,
            rx: 0.0,
            ry: 0.0,
            rz: 0.0,
            ax: 0.0,
            ay: 0.0,
            az: 0.0,
            world_position: [0.0; 3],
            orientation_wxyz: [1.0, 0.0, 0.0, 0.0],
            latitude: 0.0,
            longitude: 0.0,
        })
        .expect("status should serialize")
    }

    /// A stationary loopback simulation server. Streams statuses with a
    /// clock of 10 s, or 5 s once `regress` is raised, answers metadata
    /// queries and swallows velocity commands.
    fn spawn_sim_server(
        status_port: u16,
        meta_port: u16,
        cmd_port: u16,
        regress: Arc<AtomicBool>,
        stop: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let ctx = zmq::Context::new();

            let status = ctx.socket(zmq::PUB).expect("PUB socket");
            status
                .bind(&format!("tcp://127.0.0.1:{}", status_port))
                .expect("status bind");

            let meta = ctx.socket(zmq::REP).expect("REP socket");
            meta.bind(&format!("tcp://127.0.0.1:{}", meta_port))
                .expect("meta bind");

            let cmd = ctx.socket(zmq::PULL).expect("PULL socket");
            cmd.bind(&format!("tcp://127.0.0.1:{}", cmd_port))
                .expect("cmd bind");

            let metadata = serde_json::to_string(&MetadataResponse {
                vehicle: VehicleMeta {
                    wheel_perimeter_l: 0.5,
                    wheel_perimeter_r: 0.5,
                    reduction_ratio: 15.0,
                    tread_width: 0.3,
                    transforms: HashMap::new(),
                },
                world: None,
            })
            .expect("metadata should serialize");

            while !stop.load(Ordering::Relaxed) {
                if meta.recv_msg(zmq::DONTWAIT).is_ok() {
                    meta.send(&metadata, 0).expect("metadata reply");
                }
                let _ = cmd.recv_msg(zmq::DONTWAIT);

                let clock = if regress.load(Ordering::Relaxed) {
                    5.0
                }
                else {
                    10.0
                };
                let sample = status_json(clock);
                status.send(&sample, 0).expect("status publish");

                thread::sleep(Duration::from_millis(5));
            }
        })
    }

    #[test]
    fn test_new_bridge_is_disconnected() {
        let ctx = zmq::Context::new();
        let mut bridge = Bridge::new(&ctx, &test_params()).expect("bridge should construct");

        assert_eq!(bridge.state(), BridgeState::Disconnected);
        assert!(!bridge.is_running());
        assert!(bridge.error().is_empty());

        // Spinning before initialisation is a no-op, not a panic
        bridge.spin();
        assert_eq!(bridge.state(), BridgeState::Disconnected);

        // Commands while disconnected are dropped silently
        bridge.handle_command(VelocityCommand {
            linear: 1.0,
            angular: 0.0,
        });
    }

    #[test]
    fn test_world_restart_drops_to_disconnected() {
        let regress = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let server = spawn_sim_server(25721, 25722, 25723, regress.clone(), stop.clone());

        thread::sleep(Duration::from_millis(100));

        let ctx = zmq::Context::new();
        let mut bridge =
            Bridge::new(&ctx, &sim_params(25721, 25722, 25723)).expect("bridge should construct");

        // The server may still be binding, retry as the driver loop would
        let mut up = false;
        for _ in 0..20 {
            if bridge.initialize() {
                up = true;
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        assert!(up, "initialisation failed: {}", bridge.error());
        assert_eq!(bridge.state(), BridgeState::Running);

        // A steady clock keeps the bridge up
        for _ in 0..5 {
            bridge.spin();
        }
        assert!(bridge.is_running(), "bridge dropped early: {}", bridge.error());

        // Wind the simulation clock backwards
        regress.store(true, Ordering::Relaxed);

        for _ in 0..500 {
            bridge.spin();
            if !bridge.is_running() {
                break;
            }
        }

        assert_eq!(bridge.state(), BridgeState::Disconnected);
        assert_eq!(bridge.error(), "World restart detected");

        stop.store(true, Ordering::Relaxed);
        server.join().expect("server thread");
    }
}
