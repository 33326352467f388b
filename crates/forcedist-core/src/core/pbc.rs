use nalgebra::{Matrix3, Point3, Vector3};

/// A triclinic periodic box given by its three row vectors, with the GROMACS
/// lower-triangular convention: `a = (ax, 0, 0)`, `b = (bx, by, 0)`,
/// `c = (cx, cy, cz)`.
///
/// A zero box disables wrapping entirely (vacuum systems).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    matrix: Matrix3<f64>,
}

impl PeriodicBox {
    pub fn new(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    /// A box that performs no wrapping.
    pub fn none() -> Self {
        Self {
            matrix: Matrix3::zeros(),
        }
    }

    /// The minimum-image displacement vector from `from` to `to`.
    ///
    /// Box vectors are peeled off from the last axis to the first so that the
    /// triclinic off-diagonal components are handled before the axes they
    /// project onto.
    pub fn displacement(&self, from: &Point3<f64>, to: &Point3<f64>) -> Vector3<f64> {
        let mut d = to - from;
        for axis in (0..3).rev() {
            let length = self.matrix[(axis, axis)];
            if length > 0.0 {
                let shift = (d[axis] / length).round();
                if shift != 0.0 {
                    d -= self.matrix.row(axis).transpose() * shift;
                }
            }
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_box_keeps_plain_difference() {
        let pbc = PeriodicBox::none();
        let d = pbc.displacement(&Point3::new(1.0, 2.0, 3.0), &Point3::new(4.0, 6.0, 3.0));
        assert_eq!(d, Vector3::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn rectangular_box_wraps_to_nearest_image() {
        let pbc = PeriodicBox::new(Matrix3::from_diagonal(&Vector3::new(10.0, 10.0, 10.0)));
        let d = pbc.displacement(&Point3::new(1.0, 0.0, 0.0), &Point3::new(9.5, 0.0, 0.0));
        assert!((d.x - (-1.5)).abs() < 1e-12);
        assert_eq!(d.y, 0.0);
    }

    #[test]
    fn displacement_inside_box_is_unchanged() {
        let pbc = PeriodicBox::new(Matrix3::from_diagonal(&Vector3::new(10.0, 10.0, 10.0)));
        let d = pbc.displacement(&Point3::new(2.0, 2.0, 2.0), &Point3::new(5.0, 3.0, 4.0));
        assert_eq!(d, Vector3::new(3.0, 1.0, 2.0));
    }
}
