//! # Telemetry definitions
//!
//! This module defines the messages exchanged with the vehicle simulation
//! server: the per-cycle vehicle status, the static vehicle/world metadata
//! fetched once at connection, and the velocity command sent back to the
//! vehicle.
//!
//! All quaternions on the wire are scalar-first `(w, x, y, z)`. The internal
//! [`Transform`] and [`WorldCalibration`] types store scalar-last
//! `(x, y, z, w)` components, converted through [`crate::quat`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::quat;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One sample of the vehicle's telemetry stream.
///
/// Produced by the simulation server once per cycle and discarded after
/// processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleStatus {
    /// Monotonic simulation clock in seconds. Goes backwards only when the
    /// simulated world is restarted.
    pub sim_clock: f64,

    /// Left wheel angular rate in revolutions per minute.
    pub lrpm: f64,

    /// Right wheel angular rate in revolutions per minute.
    pub rrpm: f64,

    /// Body angular rate about the X axis in radians/second.
    pub rx: f64,

    /// Body angular rate about the Y axis in radians/second.
    pub ry: f64,

    /// Body angular rate about the Z axis in radians/second.
    pub rz: f64,

    /// Body linear acceleration along the X axis in metres/second^2.
    pub ax: f64,

    /// Body linear acceleration along the Y axis in metres/second^2.
    pub ay: f64,

    /// Body linear acceleration along the Z axis in metres/second^2.
    pub az: f64,

    /// Ground-truth position in the world frame in metres.
    pub world_position: [f64; 3],

    /// Ground-truth orientation in the world frame, scalar-first.
    pub orientation_wxyz: [f64; 4],

    /// Geodetic latitude in degrees.
    pub latitude: f64,

    /// Geodetic longitude in degrees.
    pub longitude: f64,
}

/// A static transform between two frames, internal representation.
///
/// The rotation is stored scalar-last. Use [`Transform::rotation`] to get a
/// composable rotation out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Translation in metres.
    pub trans: [f64; 3],

    /// Rotation components in `(x, y, z, w)` order.
    pub rot_xyzw: [f64; 4],
}

/// Wire form of a static transform, as sent by the simulation server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformMsg {
    /// Translation in metres.
    pub trans: [f64; 3],

    /// Rotation components in `(w, x, y, z)` order.
    pub rot_wxyz: [f64; 4],
}

/// Static vehicle geometry, read once at connection and immutable thereafter.
#[derive(Debug, Clone)]
pub struct VehicleGeometry {
    /// Perimeter of the left wheel in metres.
    pub wheel_perimeter_l: f64,

    /// Perimeter of the right wheel in metres.
    pub wheel_perimeter_r: f64,

    /// Gear reduction ratio between motor and wheel.
    pub reduction_ratio: f64,

    /// Distance between the wheel contact points in metres.
    pub tread_width: f64,

    /// Static sensor-mount transforms keyed by sensor name, for example
    /// "Lidar" and "IMU".
    pub transforms: HashMap<String, Transform>,
}

/// Wire form of the vehicle geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleMeta {
    pub wheel_perimeter_l: f64,
    pub wheel_perimeter_r: f64,
    pub reduction_ratio: f64,
    pub tread_width: f64,
    pub transforms: HashMap<String, TransformMsg>,
}

/// World calibration data, internal representation.
#[derive(Debug, Clone)]
pub struct WorldCalibration {
    /// Whether the server provided world calibration data. When false the
    /// remaining fields are placeholders and world alignment is identity.
    pub valid: bool,

    /// Geodetic latitude of the world origin in degrees.
    pub latitude0: f64,

    /// Geodetic longitude of the world origin in degrees.
    pub longitude0: f64,

    /// Reference location in the world frame in metres.
    pub reference_location: [f64; 3],

    /// Reference rotation components in `(x, y, z, w)` order.
    pub reference_rotation_xyzw: [f64; 4],
}

/// Wire form of the world calibration data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldMeta {
    pub latitude0: f64,
    pub longitude0: f64,
    pub reference_location: [f64; 3],
    pub reference_rotation_wxyz: [f64; 4],
}

/// Response to the metadata query issued at connection time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub vehicle: VehicleMeta,

    /// `None` when the server has no world calibration to offer.
    pub world: Option<WorldMeta>,
}

/// A velocity command for the vehicle.
///
/// Arrives from the middleware on the command channel and is forwarded
/// verbatim to the simulation server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Forward speed in metres/second.
    pub linear: f64,

    /// Yaw rate in radians/second.
    pub angular: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Requests the bridge can make on the metadata socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MetadataRequest {
    /// Ask for the vehicle geometry and world calibration.
    Query,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VehicleStatus {
    /// Ground-truth orientation as a composable rotation.
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        quat::from_wxyz(self.orientation_wxyz)
    }
}

impl Transform {
    /// An identity transform at the given translation.
    pub fn at(trans: [f64; 3]) -> Self {
        Self {
            trans,
            rot_xyzw: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// The rotation part of the transform.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        quat::from_xyzw(self.rot_xyzw)
    }

    /// The translation part of the transform.
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.trans[0], self.trans[1], self.trans[2])
    }
}

impl From<TransformMsg> for Transform {
    fn from(msg: TransformMsg) -> Self {
        Self {
            trans: msg.trans,
            rot_xyzw: quat::wxyz_to_xyzw(msg.rot_wxyz),
        }
    }
}

impl From<VehicleMeta> for VehicleGeometry {
    fn from(meta: VehicleMeta) -> Self {
        Self {
            wheel_perimeter_l: meta.wheel_perimeter_l,
            wheel_perimeter_r: meta.wheel_perimeter_r,
            reduction_ratio: meta.reduction_ratio,
            tread_width: meta.tread_width,
            transforms: meta
                .transforms
                .into_iter()
                .map(|(name, msg)| (name, msg.into()))
                .collect(),
        }
    }
}

impl WorldCalibration {
    /// The calibration used when the server provides no world data: invalid,
    /// identity rotation, zero origin.
    pub fn invalid() -> Self {
        Self {
            valid: false,
            latitude0: 0.0,
            longitude0: 0.0,
            reference_location: [0.0; 3],
            reference_rotation_xyzw: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// The reference rotation as a composable rotation.
    pub fn reference_rotation(&self) -> UnitQuaternion<f64> {
        quat::from_xyzw(self.reference_rotation_xyzw)
    }
}

impl From<WorldMeta> for WorldCalibration {
    fn from(meta: WorldMeta) -> Self {
        Self {
            valid: true,
            latitude0: meta.latitude0,
            longitude0: meta.longitude0,
            reference_location: meta.reference_location,
            reference_rotation_xyzw: quat::wxyz_to_xyzw(meta.reference_rotation_wxyz),
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
    fn test_transform_ordering_seam() {
        // A 90 degree yaw is (0, 0, sqrt(2)/2, sqrt(2)/2) scalar-last
        let half_sqrt2 = std::f64::consts::FRAC_1_SQRT_2;
        let msg = TransformMsg {
            trans: [1.0, 2.0, 3.0],
            rot_wxyz: [half_sqrt2, 0.0, 0.0, half_sqrt2],
        };

        let tf: Transform = msg.into();
        assert_eq!(tf.rot_xyzw, [0.0, 0.0, half_sqrt2, half_sqrt2]);

        let (_, _, yaw) = tf.rotation().euler_angles();
        assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_status_wire_format() {
        let msg = r#"{
            "sim_clock": 12.5,
            "lrpm": 120.0, "rrpm": -120.0,
            "rx": 0.0, "ry": 0.0, "rz": 0.1,
            "ax": 0.0, "ay": 0.0, "az": 9.81,
            "world_position": [1.0, 2.0, 0.5],
            "orientation_wxyz": [1.0, 0.0, 0.0, 0.0],
            "latitude": 35.68, "longitude": 139.76
        }"#;

        let st: VehicleStatus = serde_json::from_str(msg).expect("status should parse");

        assert_eq!(st.sim_clock, 12.5);
        assert_eq!(st.world_position, [1.0, 2.0, 0.5]);
        assert_eq!(st.orientation(), UnitQuaternion::identity());
    }

    #[test]
    fn test_world_calibration_default_is_identity() {
        let world = WorldCalibration::invalid();

        assert!(!world.valid);
        assert_eq!(
            world.reference_rotation(),
            nalgebra::UnitQuaternion::identity()
        );
    }
}
