//! # Odometry integrator
//!
//! Dead-reckoning pose estimation from wheel angular rates. One status sample
//! is consumed per cycle and integrated into a planar pose using a simple
//! Euler step. The yaw rate is taken from the body angular rate sensor, not
//! derived from the differential wheel speeds.
//!
//! The simulation clock embedded in each sample drives two edge-case
//! policies:
//! - a clock that goes backwards means the simulated world was restarted,
//!   so the accumulated pose is zeroed and the caller is told about the
//!   discontinuity;
//! - a clock step below one millisecond is ignored entirely, guarding the
//!   integration against numerically noisy time steps.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use sim_if::telem::{VehicleGeometry, VehicleStatus};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Clock steps below this many seconds are not integrated.
const MIN_TIME_STEP_S: f64 = 0.001;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Accumulated planar pose and velocity estimate.
pub struct Odometry {
    geom: VehicleGeometry,

    /// Simulation clock of the last integrated sample. Starts at `f64::MAX`
    /// so the very first sample always takes the reset branch.
    last_clock: f64,

    /// Accumulated X position in metres.
    pub x: f64,

    /// Accumulated Y position in metres.
    pub y: f64,

    /// Accumulated heading in radians. Not wrapped into `[-pi, pi]`.
    pub th: f64,

    /// Forward velocity of the last update in metres/second.
    pub vx: f64,

    /// Yaw rate of the last update in radians/second.
    pub az: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Outcome of accumulating one status sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    /// The sample's clock was behind the last one, the world was restarted
    /// and the pose has been zeroed.
    Reset,

    /// The clock step was below the minimum, nothing was integrated.
    Skipped,

    /// The pose and velocities were updated.
    Updated,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Odometry {
    /// Create a fresh integrator for a vehicle with the given geometry.
    pub fn new(geom: VehicleGeometry) -> Self {
        Self {
            geom,
            last_clock: std::f64::MAX,
            x: 0.0,
            y: 0.0,
            th: 0.0,
            vx: 0.0,
            az: 0.0,
        }
    }

    /// Integrate one status sample into the pose estimate.
    pub fn accumulate(&mut self, st: &VehicleStatus) -> Accumulation {
        if self.last_clock > st.sim_clock {
            // Clock went backwards: the world restarted, zero the pose. The
            // velocities are left as they were.
            self.last_clock = st.sim_clock;
            self.x = 0.0;
            self.y = 0.0;
            self.th = 0.0;
            return Accumulation::Reset;
        }

        let dt = st.sim_clock - self.last_clock;

        if dt < MIN_TIME_STEP_S {
            // last_clock is deliberately not advanced here, the skipped
            // interval is folded into the next update
            return Accumulation::Skipped;
        }
        self.last_clock = st.sim_clock;

        // Wheel linear speeds. The right wheel's rate is negated due to its
        // mounting orientation.
        let vr = -st.rrpm * self.geom.wheel_perimeter_r / self.geom.reduction_ratio / 60.0;
        let vl = st.lrpm * self.geom.wheel_perimeter_l / self.geom.reduction_ratio / 60.0;
        let vx = (vr + vl) / 2.0;

        // Yaw rate from the angular velocity sensor rather than from
        // (vr - vl) / tread_width
        let az = st.rz;

        let dx = vx * self.th.cos() * dt;
        let dy = vx * self.th.sin() * dt;
        self.x += dx;
        self.y += dy;
        self.th += az * dt;
        self.vx = vx;
        self.az = az;

        Accumulation::Updated
    }

    /// Override the pose estimate. Velocities and the clock are untouched.
    pub fn reset(&mut self, x: f64, y: f64, th: f64) {
        self.x = x;
        self.y = y;
        self.th = th;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn test_geom() -> VehicleGeometry {
        VehicleGeometry {
            wheel_perimeter_l: 0.5,
            wheel_perimeter_r: 0.5,
            reduction_ratio: 1.0,
            tread_width: 0.4,
            transforms: HashMap::new(),
        }
    }

    fn status(sim_clock: f64, lrpm: f64, rrpm: f64, rz: f64) -> VehicleStatus {
        VehicleStatus {
            sim_clock,
            lrpm,
            rrpm,
            rx: 0.0,
            ry: 0.0,
            rz,
            ax: 0.0,
            ay: 0.0,
            az: 0.0,
            world_position: [0.0; 3],
            orientation_wxyz: [1.0, 0.0, 0.0, 0.0],
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    #[test]
    fn test_first_sample_resets() {
        let mut odo = Odometry::new(test_geom());
        odo.x = 3.0;
        odo.y = -1.0;
        odo.th = 0.5;

        assert_eq!(odo.accumulate(&status(10.0, 0.0, 0.0, 0.0)), Accumulation::Reset);
        assert_eq!(odo.x, 0.0);
        assert_eq!(odo.y, 0.0);
        assert_eq!(odo.th, 0.0);
        assert_eq!(odo.last_clock, 10.0);
    }

    #[test]
    fn test_clock_regression_resets_pose_only() {
        let mut odo = Odometry::new(test_geom());
        odo.accumulate(&status(10.0, 0.0, 0.0, 0.0));
        odo.accumulate(&status(11.0, 600.0, -600.0, 0.0));
        assert!(odo.vx > 0.0);

        let vx_before = odo.vx;
        assert_eq!(odo.accumulate(&status(0.5, 0.0, 0.0, 0.0)), Accumulation::Reset);
        assert_eq!((odo.x, odo.y, odo.th), (0.0, 0.0, 0.0));

        // Velocities survive a reset
        assert_eq!(odo.vx, vx_before);
    }

    #[test]
    fn test_sub_millisecond_step_is_skipped() {
        let mut odo = Odometry::new(test_geom());
        odo.accumulate(&status(5.0, 0.0, 0.0, 0.0));

        assert_eq!(
            odo.accumulate(&status(5.0005, 600.0, -600.0, 1.0)),
            Accumulation::Skipped
        );
        assert_eq!((odo.x, odo.y, odo.th), (0.0, 0.0, 0.0));
        assert_eq!(odo.last_clock, 5.0);
    }

    #[test]
    fn test_straight_line_update() {
        let mut odo = Odometry::new(test_geom());
        odo.accumulate(&status(0.0, 0.0, 0.0, 0.0));

        // 600 rpm on both wheels (right negated by mounting) over one second:
        // v = 600 * 0.5 / 1 / 60 = 5 m/s
        assert_eq!(
            odo.accumulate(&status(1.0, 600.0, -600.0, 0.0)),
            Accumulation::Updated
        );
        assert!((odo.vx - 5.0).abs() < 1e-12);
        assert!((odo.x - 5.0).abs() < 1e-12);
        assert!(odo.y.abs() < 1e-12);
        assert!(odo.th.abs() < 1e-12);
    }

    #[test]
    fn test_euler_step_matches_closed_form() {
        let mut odo = Odometry::new(test_geom());
        odo.accumulate(&status(0.0, 0.0, 0.0, 0.0));
        odo.reset(1.0, 2.0, 0.3);

        let th0 = odo.th;
        let dt = 0.5;
        assert_eq!(
            odo.accumulate(&status(dt, 240.0, -240.0, 0.2)),
            Accumulation::Updated
        );

        // v = 240 * 0.5 / 60 = 2 m/s
        let vx = 2.0;
        assert!((odo.x - (1.0 + vx * th0.cos() * dt)).abs() < 1e-12);
        assert!((odo.y - (2.0 + vx * th0.sin() * dt)).abs() < 1e-12);
        assert!((odo.th - (0.3 + 0.2 * dt)).abs() < 1e-12);
        assert!((odo.az - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_reset() {
        let mut odo = Odometry::new(test_geom());
        odo.accumulate(&status(0.0, 0.0, 0.0, 0.0));
        odo.accumulate(&status(1.0, 600.0, -600.0, 0.5));

        odo.reset(0.0, 0.0, 0.0);
        assert_eq!((odo.x, odo.y, odo.th), (0.0, 0.0, 0.0));

        // reset does not touch the clock, so the next sample integrates
        // normally rather than resetting
        assert_eq!(
            odo.accumulate(&status(2.0, 0.0, 0.0, 0.0)),
            Accumulation::Updated
        );
    }
}
