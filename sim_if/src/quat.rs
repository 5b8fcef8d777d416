//! # Quaternion ordering seam
//!
//! The bridge stores quaternions internally in `(x, y, z, w)` component order,
//! while the simulation server's metadata and the published records use
//! `(w, x, y, z)` order. Every crossing between the two orderings must go
//! through the functions in this module, never through ad-hoc index
//! shuffling at the call site.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Quaternion, UnitQuaternion};

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build a rotation from a scalar-first `(w, x, y, z)` component array.
pub fn from_wxyz(q: [f64; 4]) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3]))
}

/// Build a rotation from a scalar-last `(x, y, z, w)` component array.
pub fn from_xyzw(q: [f64; 4]) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(q[3], q[0], q[1], q[2]))
}

/// Return the scalar-first `(w, x, y, z)` component array of a rotation.
pub fn to_wxyz(q: &UnitQuaternion<f64>) -> [f64; 4] {
    [q.w, q.i, q.j, q.k]
}

/// Return the scalar-last `(x, y, z, w)` component array of a rotation.
pub fn to_xyzw(q: &UnitQuaternion<f64>) -> [f64; 4] {
    [q.i, q.j, q.k, q.w]
}

/// Reorder a scalar-first component array into scalar-last order.
pub fn wxyz_to_xyzw(q: [f64; 4]) -> [f64; 4] {
    [q[1], q[2], q[3], q[0]]
}

/// Reorder a scalar-last component array into scalar-first order.
pub fn xyzw_to_wxyz(q: [f64; 4]) -> [f64; 4] {
    [q[3], q[0], q[1], q[2]]
}

/// Build a rotation of `yaw_rad` radians about the positive Z axis.
pub fn from_yaw(yaw_rad: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ordering_round_trip() {
        let wxyz = [0.5, -0.5, 0.5, -0.5];

        assert_eq!(xyzw_to_wxyz(wxyz_to_xyzw(wxyz)), wxyz);
        assert_eq!(to_wxyz(&from_wxyz(wxyz)), wxyz);
        assert_eq!(to_xyzw(&from_xyzw(wxyz_to_xyzw(wxyz))), wxyz_to_xyzw(wxyz));
    }

    #[test]
    fn test_identity() {
        // Identity is (1, 0, 0, 0) scalar-first and (0, 0, 0, 1) scalar-last
        let ident = UnitQuaternion::identity();
        assert_eq!(to_wxyz(&ident), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(to_xyzw(&ident), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_from_yaw() {
        let q = from_yaw(std::f64::consts::FRAC_PI_2);
        let (roll, pitch, yaw) = q.euler_angles();

        assert!(roll.abs() < 1e-12);
        assert!(pitch.abs() < 1e-12);
        assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
