//! # Frame calibrator
//!
//! Derives the static frame set used by the bridge: the lidar and IMU mount
//! transforms from the vehicle geometry and the rotation aligning the map
//! frame with the odometry frame. Calibration runs once per initialisation
//! and the result is immutable until the next re-initialisation, which
//! rebuilds it in full.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use nalgebra::UnitQuaternion;

use sim_if::{
    quat,
    telem::{Transform, VehicleGeometry, VehicleStatus, WorldCalibration},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Fixed yaw correction between the geodetic axis convention (x north) and
/// the world axis convention (x east).
const GEO_TO_WORLD_YAW_RAD: f64 = std::f64::consts::FRAC_PI_2;

/// Frame id of the map frame.
pub const MAP_FRAME: &str = "map";

/// Frame id of the odometry frame.
pub const ODOM_FRAME: &str = "odom";

/// Frame id of the vehicle body frame.
pub const BASE_FRAME: &str = "base_link";

/// Frame id of the ground-truth body frame.
pub const BASE_GT_FRAME: &str = "base_link_gt";

/// Frame id of the IMU mount.
pub const IMU_FRAME: &str = "imu_link";

/// Frame id of the lidar mount.
pub const LIDAR_FRAME: &str = "lidar3d_link";

/// Frame id of the satellite fix antenna.
pub const LATLON_FRAME: &str = "latlon";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The static frame set derived during initialisation.
#[derive(Debug, Clone)]
pub struct FrameSet {
    /// Lidar mount transform relative to the body frame.
    pub lidar: Transform,

    /// Lidar mount rotation, pre-resolved for per-cycle publication.
    pub lidar_rotation: UnitQuaternion<f64>,

    /// IMU mount transform relative to the body frame.
    pub imu: Transform,

    /// Rotation aligning the map frame against the odometry frame. Identity
    /// when no world calibration is available.
    pub world_rotation: UnitQuaternion<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FrameSet {
    /// Calibrate the frame set from the first status sample and the static
    /// vehicle/world metadata.
    pub fn calibrate(
        first_status: &VehicleStatus,
        geom: &VehicleGeometry,
        world: &WorldCalibration,
    ) -> Self {
        let lidar = named_transform(geom, "Lidar");
        let imu = named_transform(geom, "IMU");
        let lidar_rotation = lidar.rotation();

        let world_rotation = if world.valid {
            info!(
                "World calibration: lat0 {} lon0 {} location {:?} rotation (xyzw) {:?}",
                world.latitude0,
                world.longitude0,
                world.reference_location,
                world.reference_rotation_xyzw
            );

            first_status.orientation()
                * world.reference_rotation()
                * quat::from_yaw(GEO_TO_WORLD_YAW_RAD)
        }
        else {
            UnitQuaternion::identity()
        };

        info!(
            "Vehicle geometry: tread {} wheel perimeter R/L {}/{} reduction ratio {}",
            geom.tread_width,
            geom.wheel_perimeter_r,
            geom.wheel_perimeter_l,
            geom.reduction_ratio
        );

        Self {
            lidar,
            lidar_rotation,
            imu,
            world_rotation,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Look up a named mount transform, falling back to identity if the geometry
/// is missing it.
fn named_transform(geom: &VehicleGeometry, name: &str) -> Transform {
    match geom.transforms.get(name) {
        Some(tf) => tf.clone(),
        None => {
            warn!("No \"{}\" transform in the vehicle geometry, using identity", name);
            Transform::at([0.0; 3])
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn test_status(orientation_wxyz: [f64; 4]) -> VehicleStatus {
        VehicleStatus {
            sim_clock: 0.0,
            lrpm: 0.0,
            rrpm: 0.0,
            rx: 0.0,
            ry: 0.0,
            rz: 0.0,
            ax: 0.0,
            ay: 0.0,
            az: 0.0,
            world_position: [0.0; 3],
            orientation_wxyz,
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    fn test_geom() -> VehicleGeometry {
        let mut transforms = HashMap::new();
        transforms.insert(
            "Lidar".to_string(),
            Transform {
                trans: [-0.22, 0.0, 0.518],
                rot_xyzw: [0.0, 0.0, 0.0, 1.0],
            },
        );
        transforms.insert("IMU".to_string(), Transform::at([0.0; 3]));

        VehicleGeometry {
            wheel_perimeter_l: 0.5,
            wheel_perimeter_r: 0.5,
            reduction_ratio: 1.0,
            tread_width: 0.4,
            transforms,
        }
    }

    #[test]
    fn test_invalid_world_gives_identity_alignment() {
        let frames = FrameSet::calibrate(
            &test_status([1.0, 0.0, 0.0, 0.0]),
            &test_geom(),
            &WorldCalibration::invalid(),
        );

        assert_eq!(frames.world_rotation, UnitQuaternion::identity());
        assert_eq!(frames.lidar.trans, [-0.22, 0.0, 0.518]);
    }

    #[test]
    fn test_identity_composition_is_yaw_correction() {
        // With identity ground truth and identity reference rotation the
        // alignment collapses to the fixed 90 degree yaw correction
        let world = WorldCalibration {
            valid: true,
            latitude0: 0.0,
            longitude0: 0.0,
            reference_location: [0.0; 3],
            reference_rotation_xyzw: [0.0, 0.0, 0.0, 1.0],
        };

        let frames =
            FrameSet::calibrate(&test_status([1.0, 0.0, 0.0, 0.0]), &test_geom(), &world);

        let expected = quat::from_yaw(GEO_TO_WORLD_YAW_RAD);
        assert!((frames.world_rotation.angle_to(&expected)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_transform_falls_back_to_identity() {
        let mut geom = test_geom();
        geom.transforms.remove("IMU");

        let frames = FrameSet::calibrate(
            &test_status([1.0, 0.0, 0.0, 0.0]),
            &geom,
            &WorldCalibration::invalid(),
        );

        assert_eq!(frames.imu, Transform::at([0.0; 3]));
    }
}
