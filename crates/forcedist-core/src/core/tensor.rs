use nalgebra::Vector3;
use std::ops::{Add, AddAssign};

/// A symmetric 3x3 tensor stored as its six independent components.
///
/// Used for per-atom virial stress. The full tensor is never materialized;
/// the symmetric components are enough for accumulation, output, and the
/// von Mises reduction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SymmetricTensor {
    pub xx: f64,
    pub yy: f64,
    pub zz: f64,
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,
}

impl SymmetricTensor {
    /// Builds the symmetric part of the outer product `r (x) f`.
    ///
    /// Off-diagonal components take the first factor from `r` and the second
    /// from `f`, matching the virial convention `r[dim1] * f[dim2]`.
    pub fn outer(r: &Vector3<f64>, f: &Vector3<f64>) -> Self {
        Self {
            xx: r.x * f.x,
            yy: r.y * f.y,
            zz: r.z * f.z,
            xy: r.x * f.y,
            xz: r.x * f.z,
            yz: r.y * f.z,
        }
    }

    /// Accumulates `weight * other` component-wise.
    pub fn accumulate(&mut self, other: &Self, weight: f64) {
        self.xx += weight * other.xx;
        self.yy += weight * other.yy;
        self.zz += weight * other.zz;
        self.xy += weight * other.xy;
        self.xz += weight * other.xz;
        self.yz += weight * other.yz;
    }

    /// The rotation-invariant von Mises scalar summarizing the tensor's shear
    /// magnitude. All terms are squared, so no sign flip is needed when
    /// applying it to a virial rather than a stress.
    pub fn von_mises(&self) -> f64 {
        let d_xy = self.xx - self.yy;
        let d_yz = self.yy - self.zz;
        let d_zx = self.zz - self.xx;
        (0.5 * (d_xy * d_xy + d_yz * d_yz + d_zx * d_zx
            + 6.0 * (self.xy * self.xy + self.xz * self.xz + self.yz * self.yz)))
            .sqrt()
    }
}

impl Add for SymmetricTensor {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let mut out = self;
        out.accumulate(&rhs, 1.0);
        out
    }
}

impl AddAssign for SymmetricTensor {
    fn add_assign(&mut self, rhs: Self) {
        self.accumulate(&rhs, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_product_uses_first_factor_rows() {
        let r = Vector3::new(1.0, 2.0, 3.0);
        let f = Vector3::new(4.0, 5.0, 6.0);
        let t = SymmetricTensor::outer(&r, &f);
        assert_eq!(t.xx, 4.0);
        assert_eq!(t.yy, 10.0);
        assert_eq!(t.zz, 18.0);
        assert_eq!(t.xy, 5.0);
        assert_eq!(t.xz, 6.0);
        assert_eq!(t.yz, 12.0);
    }

    #[test]
    fn accumulate_applies_weight() {
        let mut t = SymmetricTensor::default();
        let v = SymmetricTensor {
            xx: 2.0,
            yy: 4.0,
            zz: 6.0,
            xy: 1.0,
            xz: 3.0,
            yz: 5.0,
        };
        t.accumulate(&v, 0.5);
        t.accumulate(&v, 0.5);
        assert_eq!(t, v);
    }

    #[test]
    fn von_mises_of_uniaxial_diagonal_tensor() {
        let t = SymmetricTensor {
            xx: 3.0,
            ..Default::default()
        };
        assert!((t.von_mises() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn von_mises_of_hydrostatic_tensor_is_zero() {
        let t = SymmetricTensor {
            xx: 2.5,
            yy: 2.5,
            zz: 2.5,
            ..Default::default()
        };
        assert_eq!(t.von_mises(), 0.0);
    }
}
