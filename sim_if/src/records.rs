//! # Published record definitions
//!
//! Records are the abstract outputs of the bridge: pose, inertial,
//! satellite-fix and transform data, each wrapped in a [`RecordHeader`]
//! naming the frame pair it relates. Quaternions in records are scalar-first,
//! produced through [`crate::quat`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use nalgebra::UnitQuaternion;
use serde::Serialize;

use crate::quat;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Satellite fix status: unaugmented fix available.
pub const NAVSAT_STATUS_FIX: i8 = 0;

/// Satellite service flag: GPS constellation.
pub const NAVSAT_SERVICE_GPS: u16 = 1;

/// Position covariance is approximated, not measured.
pub const NAVSAT_COVARIANCE_APPROXIMATED: u8 = 1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Header common to every published record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordHeader {
    /// Frame the record is expressed in.
    pub frame_id: String,

    /// Frame the record describes.
    pub child_frame_id: String,

    /// Wall-clock timestamp of publication.
    pub stamp: DateTime<Utc>,
}

/// A record together with its header, as placed on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct Stamped<T: Serialize> {
    pub header: RecordHeader,
    pub data: T,
}

/// Pose and velocity of a body frame, either estimated or ground truth.
#[derive(Debug, Clone, Serialize)]
pub struct OdometryRecord {
    /// Position in metres.
    pub position: [f64; 3],

    /// Orientation, scalar-first.
    pub orientation_wxyz: [f64; 4],

    /// Pose covariance placeholder, all zero.
    pub pose_covariance: [[f64; 6]; 6],

    /// Linear velocity in metres/second.
    pub linear_velocity: [f64; 3],

    /// Angular velocity in radians/second.
    pub angular_velocity: [f64; 3],

    /// Twist covariance placeholder, all zero.
    pub twist_covariance: [[f64; 6]; 6],
}

/// Inertial sample: ground-truth orientation plus raw rate and acceleration.
#[derive(Debug, Clone, Serialize)]
pub struct ImuRecord {
    /// Orientation, scalar-first.
    pub orientation_wxyz: [f64; 4],

    /// Angular velocity in radians/second.
    pub angular_velocity: [f64; 3],

    /// Linear acceleration in metres/second^2.
    pub linear_acceleration: [f64; 3],

    /// Orientation covariance placeholder, all zero (unknown).
    pub orientation_covariance: [[f64; 3]; 3],

    /// Angular velocity covariance placeholder, all zero (unknown).
    pub angular_velocity_covariance: [[f64; 3]; 3],

    /// Linear acceleration covariance placeholder, all zero (unknown).
    pub linear_acceleration_covariance: [[f64; 3]; 3],
}

/// A geodetic satellite fix.
#[derive(Debug, Clone, Serialize)]
pub struct NavSatRecord {
    /// Fix status, see the `NAVSAT_STATUS_*` constants.
    pub status: i8,

    /// Service flags, see the `NAVSAT_SERVICE_*` constants.
    pub service: u16,

    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// Altitude in metres. NaN signals "unknown".
    pub altitude: f64,

    /// Position covariance, identity-like diagonal.
    pub position_covariance: [[f64; 3]; 3],

    /// How the position covariance was obtained, see the
    /// `NAVSAT_COVARIANCE_*` constants.
    pub position_covariance_type: u8,
}

/// A transform between two named frames.
#[derive(Debug, Clone, Serialize)]
pub struct TransformRecord {
    /// Translation in metres.
    pub translation: [f64; 3],

    /// Rotation, scalar-first.
    pub rotation_wxyz: [f64; 4],
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OdometryRecord {
    /// Build an odometry record with zeroed covariance placeholders and a
    /// planar twist of forward speed `vx` and yaw rate `az`.
    pub fn new(position: [f64; 3], orientation: &UnitQuaternion<f64>, vx: f64, az: f64) -> Self {
        Self {
            position,
            orientation_wxyz: quat::to_wxyz(orientation),
            pose_covariance: [[0.0; 6]; 6],
            linear_velocity: [vx, 0.0, 0.0],
            angular_velocity: [0.0, 0.0, az],
            twist_covariance: [[0.0; 6]; 6],
        }
    }
}

impl ImuRecord {
    /// Build an inertial record with all covariances marked unknown.
    pub fn new(
        orientation_wxyz: [f64; 4],
        angular_velocity: [f64; 3],
        linear_acceleration: [f64; 3],
    ) -> Self {
        Self {
            orientation_wxyz,
            angular_velocity,
            linear_acceleration,
            orientation_covariance: [[0.0; 3]; 3],
            angular_velocity_covariance: [[0.0; 3]; 3],
            linear_acceleration_covariance: [[0.0; 3]; 3],
        }
    }
}

impl NavSatRecord {
    /// Build a fix from raw latitude/longitude with an approximated identity
    /// position covariance and unknown altitude.
    pub fn from_lat_lon(latitude: f64, longitude: f64) -> Self {
        let mut position_covariance = [[0.0; 3]; 3];
        position_covariance[0][0] = 1.0;
        position_covariance[1][1] = 1.0;
        position_covariance[2][2] = 1.0;

        Self {
            status: NAVSAT_STATUS_FIX,
            service: NAVSAT_SERVICE_GPS,
            latitude,
            longitude,
            altitude: std::f64::NAN,
            position_covariance,
            position_covariance_type: NAVSAT_COVARIANCE_APPROXIMATED,
        }
    }
}

impl TransformRecord {
    /// Build a transform record from internal translation and rotation.
    pub fn new(translation: [f64; 3], rotation: &UnitQuaternion<f64>) -> Self {
        Self {
            translation,
            rotation_wxyz: quat::to_wxyz(rotation),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_navsat_defaults() {
        let nav = NavSatRecord::from_lat_lon(35.68, 139.76);

        assert!(nav.altitude.is_nan());
        assert_eq!(nav.status, NAVSAT_STATUS_FIX);
        assert_eq!(nav.service, NAVSAT_SERVICE_GPS);
        assert_eq!(nav.position_covariance_type, NAVSAT_COVARIANCE_APPROXIMATED);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq!(nav.position_covariance[i][j], expected);
            }
        }
    }

    #[test]
    fn test_odometry_twist_is_planar() {
        let odo = OdometryRecord::new(
            [1.0, 2.0, 0.0],
            &nalgebra::UnitQuaternion::identity(),
            0.7,
            -0.2,
        );

        assert_eq!(odo.linear_velocity, [0.7, 0.0, 0.0]);
        assert_eq!(odo.angular_velocity, [0.0, 0.0, -0.2]);
        assert_eq!(odo.orientation_wxyz, [1.0, 0.0, 0.0, 0.0]);
    }
}
