use super::pbc::PeriodicBox;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// How a pairwise force vector is reduced to a single scalar for scalar and
/// punctual-stress output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vector2Scalar {
    /// The Euclidean norm of the force vector (always non-negative).
    #[default]
    Norm,
    /// The signed projection of the force onto the displacement between the
    /// two entities; positive when force and displacement point the same way
    /// (repulsion), negative otherwise (attraction).
    Projection,
}

/// Reduces a pairwise force to a signed scalar for the entity pair at
/// positions `x_i` and `x_j`, honoring the periodic box for the displacement.
pub fn signed_scalar(
    force: &Vector3<f64>,
    x_i: &Point3<f64>,
    x_j: &Point3<f64>,
    pbc: &PeriodicBox,
    v2s: Vector2Scalar,
) -> f64 {
    match v2s {
        Vector2Scalar::Norm => force.norm(),
        Vector2Scalar::Projection => {
            let r = pbc.displacement(x_i, x_j);
            let nr = r.norm();
            if nr == 0.0 { 0.0 } else { r.dot(force) / nr }
        }
    }
}

/// Like [`signed_scalar`] but with the sign stripped, as used by punctual
/// stress where each pairwise magnitude loads both endpoints.
pub fn unsigned_scalar(
    force: &Vector3<f64>,
    x_i: &Point3<f64>,
    x_j: &Point3<f64>,
    pbc: &PeriodicBox,
    v2s: Vector2Scalar,
) -> f64 {
    signed_scalar(force, x_i, x_j, pbc, v2s).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_reduction_ignores_positions() {
        let f = Vector3::new(3.0, 4.0, 0.0);
        let s = signed_scalar(
            &f,
            &Point3::origin(),
            &Point3::new(0.0, 0.0, 1.0),
            &PeriodicBox::none(),
            Vector2Scalar::Norm,
        );
        assert_eq!(s, 5.0);
    }

    #[test]
    fn projection_is_positive_along_displacement() {
        let f = Vector3::new(2.0, 0.0, 0.0);
        let s = signed_scalar(
            &f,
            &Point3::origin(),
            &Point3::new(4.0, 0.0, 0.0),
            &PeriodicBox::none(),
            Vector2Scalar::Projection,
        );
        assert!((s - 2.0).abs() < 1e-12);
    }

    #[test]
    fn projection_is_negative_against_displacement() {
        let f = Vector3::new(-2.0, 0.0, 0.0);
        let s = signed_scalar(
            &f,
            &Point3::origin(),
            &Point3::new(4.0, 0.0, 0.0),
            &PeriodicBox::none(),
            Vector2Scalar::Projection,
        );
        assert!((s + 2.0).abs() < 1e-12);
        let u = unsigned_scalar(
            &f,
            &Point3::origin(),
            &Point3::new(4.0, 0.0, 0.0),
            &PeriodicBox::none(),
            Vector2Scalar::Projection,
        );
        assert!((u - 2.0).abs() < 1e-12);
    }

    #[test]
    fn projection_of_coincident_entities_is_zero() {
        let f = Vector3::new(1.0, 1.0, 1.0);
        let s = signed_scalar(
            &f,
            &Point3::origin(),
            &Point3::origin(),
            &PeriodicBox::none(),
            Vector2Scalar::Projection,
        );
        assert_eq!(s, 0.0);
    }
}
