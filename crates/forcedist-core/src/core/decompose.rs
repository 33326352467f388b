//! Pairwise decomposition of multi-body interaction forces.
//!
//! Angle (3-body) and dihedral (4-body) force-field terms produce one force
//! per participating atom. Force distribution analysis needs those forces
//! re-expressed as pairwise contributions whose net effect on every atom
//! reconstructs the original forces, without double counting. The angle case
//! is a projection onto the apex force direction; the dihedral case requires a
//! trigonometric split of the projected outer forces onto the two inner force
//! directions.
//!
//! Every decomposed pair force follows the convention "force exerted on the
//! first atom of the pair by the second".

use nalgebra::Vector3;

/// Denominators smaller than this abort a decomposition. The raw kernel
/// forces are single-precision in origin, so a tighter bound would only
/// amplify noise into huge pairwise values.
const DEGENERACY_EPS: f64 = 1.19209290e-7;

/// Pairwise contributions of a 3-body angle force.
///
/// Field names encode the pair: `f_j_i` acts on atom `j` and comes from atom
/// `i`, and so on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnglePairForces {
    pub f_j_i: Vector3<f64>,
    pub f_i_k: Vector3<f64>,
    pub f_j_k: Vector3<f64>,
}

/// Splits an angle interaction's three atom forces into three pairwise forces
/// for the pairs (j,i), (i,k) and (j,k), where `j` is the apex atom.
///
/// The forces on the outer atoms are projected onto the direction of the apex
/// force to obtain the components transmitted through the two arms; the
/// remainder of `f_i` becomes the outer-outer contribution. When the three
/// input forces balance (`f_i + f_j + f_k == 0`, which every angle kernel
/// guarantees), the pairwise set reconstructs all three inputs exactly.
///
/// Returns `None` when the summed norms are exactly zero: no records are
/// emitted at all, which is deliberately distinct from recording zero forces.
pub fn decompose_angle(
    f_i: &Vector3<f64>,
    f_j: &Vector3<f64>,
    f_k: &Vector3<f64>,
) -> Option<AnglePairForces> {
    if f_i.norm() + f_j.norm() + f_k.norm() == 0.0 {
        return None;
    }

    let uf_j = f_j.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
    // |f_i| * (uf_i . uf_j) collapses to f_i . uf_j, which also stays finite
    // for a zero outer force.
    let n_j_i = -f_i.dot(&uf_j);
    let n_j_k = -f_k.dot(&uf_j);
    let f_j_i = uf_j * n_j_i;
    let f_j_k = uf_j * n_j_k;
    let f_i_k = f_j_i + f_i;

    Some(AnglePairForces { f_j_i, f_i_k, f_j_k })
}

/// Pairwise contributions of a 4-body dihedral force, covering all six pairs
/// among the atoms (i, j, k, l) with `j` and `k` the inner axis atoms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DihedralPairForces {
    pub f_j_i: Vector3<f64>,
    pub f_k_i: Vector3<f64>,
    pub f_l_i: Vector3<f64>,
    pub f_j_k: Vector3<f64>,
    pub f_j_l: Vector3<f64>,
    pub f_k_l: Vector3<f64>,
}

/// Splits a dihedral interaction's four atom forces into six pairwise forces.
///
/// The negated inner forces are combined into a joint vector, the outer
/// forces are projected onto the outer-force sum direction, and each signed
/// projection is split into components along the two inner force directions
/// using the sine/cosine relation of the triangle they form with the joint
/// vector. The (j,k) pair takes the remainder of `f_j`; the (l,i) pair takes
/// the remainder of `f_i`. When the four input forces balance, the pairwise
/// set reconstructs all four inputs exactly.
///
/// Returns `None`, emitting no records, whenever a denominator falls below a
/// fixed epsilon: a zero combined outer force, a near-zero joint-vector/inner
/// force product, or a degenerate triangle. These are genuine physical edge
/// cases (near-zero force geometries), dropped rather than amplified into
/// numerically unstable pairwise values.
pub fn decompose_dihedral(
    f_i: &Vector3<f64>,
    f_j: &Vector3<f64>,
    f_k: &Vector3<f64>,
    f_l: &Vector3<f64>,
) -> Option<DihedralPairForces> {
    if f_i.norm() + f_j.norm() + f_k.norm() + f_l.norm() == 0.0 {
        return None;
    }

    let f_mj = -f_j;
    let f_mk = -f_k;
    let f_ipl = f_i + f_l;
    let f_jpk = f_mj + f_mk;
    let uf_jpk = f_jpk.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
    let uf_j = f_mj.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
    let uf_k = f_mk.try_normalize(0.0).unwrap_or_else(Vector3::zeros);

    let nf_ipl = f_ipl.norm();
    if nf_ipl < DEGENERACY_EPS {
        return None;
    }

    // Signed projections of the outer forces on the combined outer direction,
    // carried along the joint inner vector.
    let p_i = f_i.dot(&f_ipl) / nf_ipl;
    let p_l = f_l.dot(&f_ipl) / nf_ipl;
    let f_jpk_i = uf_jpk * p_i;

    let nf_jpk = f_jpk.norm();
    let nf_j = f_mj.norm();
    let nf_k = f_mk.norm();

    // a = angle between the joint vector and -f_j, b = the same for -f_k;
    // cos from the dot product, sin from the cross product.
    let njpk_j = nf_jpk * nf_j;
    let njpk_k = nf_jpk * nf_k;
    if njpk_j < DEGENERACY_EPS || njpk_k < DEGENERACY_EPS {
        return None;
    }
    let cos_a = f_jpk.dot(&f_mj) / njpk_j;
    let sin_a = f_jpk.cross(&f_mj).norm() / njpk_j;
    let cos_b = f_jpk.dot(&f_mk) / njpk_k;
    let sin_b = f_jpk.cross(&f_mk).norm() / njpk_k;

    // In a triangle with one known side and two known angles, the two other
    // sides follow from the sine rule; this is its denominator sin(a + b).
    let sin_a_cos_b_p_sin_b_cos_a = sin_a * cos_b + sin_b * cos_a;
    if sin_a_cos_b_p_sin_b_cos_a < DEGENERACY_EPS {
        return None;
    }

    let f_j_i = uf_j * (-p_i * sin_b / sin_a_cos_b_p_sin_b_cos_a);
    let f_k_i = uf_k * (-p_i * sin_a / sin_a_cos_b_p_sin_b_cos_a);
    let f_j_l = uf_j * (-p_l * sin_b / sin_a_cos_b_p_sin_b_cos_a);
    let f_k_l = uf_k * (-p_l * sin_a / sin_a_cos_b_p_sin_b_cos_a);

    // Remainders keep the per-atom sums exact: the (j,k) pair absorbs what
    // the splits did not attribute to j, the (l,i) pair what the projection
    // did not attribute to i.
    let f_j_k = f_j - (f_j_i + f_j_l);
    let f_l_i = f_jpk_i - f_i;

    Some(DihedralPairForces {
        f_j_i,
        f_k_i,
        f_l_i,
        f_j_k,
        f_j_l,
        f_k_l,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn assert_vec_close(actual: &Vector3<f64>, expected: &Vector3<f64>, tol: f64) {
        assert!(
            (actual - expected).norm() < tol,
            "expected {expected:?}, got {actual:?}"
        );
    }

    /// Harmonic angle kernel forces for the triplet (i, j, k) with apex j.
    fn angle_kernel_forces(
        xi: Point3<f64>,
        xj: Point3<f64>,
        xk: Point3<f64>,
    ) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let r_ij = xi - xj;
        let r_kj = xk - xj;
        let (nij, nkj) = (r_ij.norm(), r_kj.norm());
        let cos_t = r_ij.dot(&r_kj) / (nij * nkj);
        let theta = cos_t.acos();
        let dvdt = 3.0 * (theta - 1.9);
        let st = -dvdt / theta.sin();
        let f_i = (r_kj / nkj - r_ij * (cos_t / nij)) * (st / nij);
        let f_k = (r_ij / nij - r_kj * (cos_t / nkj)) * (st / nkj);
        let f_j = -(f_i + f_k);
        (f_i, f_j, f_k)
    }

    /// Proper-dihedral kernel forces for the quadruplet (i, j, k, l).
    fn dihedral_kernel_forces(
        xi: Point3<f64>,
        xj: Point3<f64>,
        xk: Point3<f64>,
        xl: Point3<f64>,
    ) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let r_ij = xi - xj;
        let r_kj = xk - xj;
        let r_kl = xk - xl;
        let m = r_ij.cross(&r_kj);
        let n = r_kj.cross(&r_kl);
        let nrkj = r_kj.norm();
        let phi = (m.cross(&n).dot(&r_kj) / nrkj).atan2(m.dot(&n));
        let ddphi = -5.0 * (phi + 0.3).sin();
        let f_i = m * (-ddphi * nrkj / m.dot(&m));
        let f_l = n * (ddphi * nrkj / n.dot(&n));
        let p = r_ij.dot(&r_kj) / (nrkj * nrkj);
        let q = r_kl.dot(&r_kj) / (nrkj * nrkj);
        let svec = f_i * p - f_l * q;
        let f_j = svec - f_i;
        let f_k = -svec - f_l;
        (f_i, f_j, f_k, f_l)
    }

    #[test]
    fn angle_decomposition_reconstructs_each_atom_force() {
        let (f_i, f_j, f_k) = angle_kernel_forces(
            Point3::new(0.0, 1.1, 0.2),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.4, 0.0, -0.3),
        );
        let d = decompose_angle(&f_i, &f_j, &f_k).unwrap();

        // Records act on their first atom and pull the reaction off the second.
        let net_i = -d.f_j_i + d.f_i_k;
        let net_j = d.f_j_i + d.f_j_k;
        let net_k = -d.f_i_k - d.f_j_k;
        assert_vec_close(&net_i, &f_i, 1e-9);
        assert_vec_close(&net_j, &f_j, 1e-9);
        assert_vec_close(&net_k, &f_k, 1e-9);
    }

    #[test]
    fn angle_decomposition_skips_zero_forces() {
        let zero = Vector3::zeros();
        assert_eq!(decompose_angle(&zero, &zero, &zero), None);
    }

    #[test]
    fn angle_decomposition_with_zero_apex_force_gives_outer_pair_only() {
        let f_i = Vector3::new(0.0, 2.0, 0.0);
        let f_k = Vector3::new(0.0, -2.0, 0.0);
        let d = decompose_angle(&f_i, &Vector3::zeros(), &f_k).unwrap();
        assert_eq!(d.f_j_i, Vector3::zeros());
        assert_eq!(d.f_j_k, Vector3::zeros());
        assert_eq!(d.f_i_k, f_i);
    }

    #[test]
    fn dihedral_decomposition_reconstructs_each_atom_force() {
        let geometries = [
            [
                Point3::new(0.0, 0.5, 1.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.5, 0.0, 0.0),
                Point3::new(1.8, 1.0, -0.7),
            ],
            [
                Point3::new(0.2, -0.9, 0.4),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.2, 0.3, 0.1),
                Point3::new(2.0, -0.5, 0.9),
            ],
            [
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, -1.0, 0.5),
            ],
        ];
        for [xi, xj, xk, xl] in geometries {
            let (f_i, f_j, f_k, f_l) = dihedral_kernel_forces(xi, xj, xk, xl);
            let d = decompose_dihedral(&f_i, &f_j, &f_k, &f_l).unwrap();

            let net_i = -d.f_j_i - d.f_k_i - d.f_l_i;
            let net_j = d.f_j_i + d.f_j_k + d.f_j_l;
            let net_k = d.f_k_i - d.f_j_k + d.f_k_l;
            let net_l = d.f_l_i - d.f_j_l - d.f_k_l;
            assert_vec_close(&net_i, &f_i, 1e-9);
            assert_vec_close(&net_j, &f_j, 1e-9);
            assert_vec_close(&net_k, &f_k, 1e-9);
            assert_vec_close(&net_l, &f_l, 1e-9);
        }
    }

    #[test]
    fn dihedral_decomposition_skips_zero_forces() {
        let zero = Vector3::zeros();
        assert_eq!(decompose_dihedral(&zero, &zero, &zero, &zero), None);
    }

    #[test]
    fn dihedral_decomposition_skips_cancelling_outer_forces() {
        // f_i + f_l == 0 makes the outer projection denominator vanish.
        let f_i = Vector3::new(0.0, 1.0, 0.0);
        let f_l = Vector3::new(0.0, -1.0, 0.0);
        let f_j = Vector3::new(1.0, -0.5, 0.0);
        let f_k = Vector3::new(-1.0, 0.5, 0.0);
        assert_eq!(decompose_dihedral(&f_i, &f_j, &f_k, &f_l), None);
    }

    #[test]
    fn dihedral_decomposition_skips_collinear_inner_forces() {
        // Parallel inner forces collapse the projection triangle to a line.
        let f_i = Vector3::new(0.5, 1.0, 0.0);
        let f_l = Vector3::new(-0.5, 1.0, 0.0);
        let f_j = Vector3::new(0.0, -1.0, 0.0);
        let f_k = Vector3::new(0.0, -1.0, 0.0);
        assert_eq!(decompose_dihedral(&f_i, &f_j, &f_k, &f_l), None);
    }
}
