use crate::core::tensor::SymmetricTensor;
use nalgebra::Vector3;

const HALF: f64 = 1.0 / 2.0;
const THIRD: f64 = 1.0 / 3.0;
const QUARTER: f64 = 0.25;

/// Per-atom virial stress accumulation.
///
/// Each bonded, angle, or dihedral contribution builds one geometric tensor
/// and distributes it over the participating atoms with a fixed fractional
/// weight (1/2, 1/3, 1/4), so the sum over all atoms reconstructs the full
/// system virial exactly. Created inactive unless a virial output mode is
/// configured; when inactive every call is a cheap no-op, checked first.
#[derive(Debug)]
pub struct VirialAccumulator {
    active: bool,
    tensors: Vec<SymmetricTensor>,
}

impl VirialAccumulator {
    pub fn new(active: bool, atom_count: usize) -> Self {
        Self {
            active,
            tensors: if active {
                vec![SymmetricTensor::default(); atom_count]
            } else {
                Vec::new()
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Adds `weight * tensor` into the atom's running tensor.
    pub fn add(&mut self, atom: usize, tensor: &SymmetricTensor, weight: f64) {
        if !self.active {
            return;
        }
        self.tensors[atom].accumulate(tensor, weight);
    }

    /// Bond contribution: the outer product of the displacement with the
    /// scaled displacement, half to each atom. The origin sits on one of the
    /// two atoms, which for a pair makes no difference.
    pub fn add_bond(&mut self, ai: usize, aj: usize, f: f64, d: &Vector3<f64>) {
        if !self.active {
            return;
        }
        let tensor = SymmetricTensor::outer(d, &(d * f));
        self.add(ai, &tensor, HALF);
        self.add(aj, &tensor, HALF);
    }

    /// Angle contribution with the origin translated onto the apex atom j:
    /// `vir = r_ij (x) f_i + r_kj (x) f_k`, a third to each atom.
    pub fn add_angle(
        &mut self,
        ai: usize,
        aj: usize,
        ak: usize,
        r_ij: &Vector3<f64>,
        r_kj: &Vector3<f64>,
        f_i: &Vector3<f64>,
        f_k: &Vector3<f64>,
    ) {
        if !self.active {
            return;
        }
        let tensor = SymmetricTensor::outer(r_ij, f_i) + SymmetricTensor::outer(r_kj, f_k);
        self.add(ai, &tensor, THIRD);
        self.add(aj, &tensor, THIRD);
        self.add(ak, &tensor, THIRD);
    }

    /// Dihedral contribution with the origin translated onto the second atom:
    /// `vir = r_ij (x) f_i + r_kj (x) f_k + (r_kj - r_kl) (x) f_l`, a quarter
    /// to each atom.
    #[allow(clippy::too_many_arguments)]
    pub fn add_dihedral(
        &mut self,
        i: usize,
        j: usize,
        k: usize,
        l: usize,
        f_i: &Vector3<f64>,
        f_k: &Vector3<f64>,
        f_l: &Vector3<f64>,
        r_ij: &Vector3<f64>,
        r_kj: &Vector3<f64>,
        r_kl: &Vector3<f64>,
    ) {
        if !self.active {
            return;
        }
        let r_lj = r_kj - r_kl;
        let tensor = SymmetricTensor::outer(r_ij, f_i)
            + SymmetricTensor::outer(r_kj, f_k)
            + SymmetricTensor::outer(&r_lj, f_l);
        self.add(i, &tensor, QUARTER);
        self.add(j, &tensor, QUARTER);
        self.add(k, &tensor, QUARTER);
        self.add(l, &tensor, QUARTER);
    }

    pub fn tensors(&self) -> &[SymmetricTensor] {
        &self.tensors
    }

    /// Resets all tensors to zero for the next frame.
    pub fn clear(&mut self) {
        for tensor in &mut self.tensors {
            *tensor = SymmetricTensor::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(tensors: &[SymmetricTensor]) -> SymmetricTensor {
        tensors
            .iter()
            .fold(SymmetricTensor::default(), |acc, t| acc + *t)
    }

    fn assert_tensor_close(a: &SymmetricTensor, b: &SymmetricTensor, tol: f64) {
        for (x, y) in [
            (a.xx, b.xx),
            (a.yy, b.yy),
            (a.zz, b.zz),
            (a.xy, b.xy),
            (a.xz, b.xz),
            (a.yz, b.yz),
        ] {
            assert!((x - y).abs() < tol, "expected {b:?}, got {a:?}");
        }
    }

    #[test]
    fn inactive_accumulator_ignores_contributions() {
        let mut virial = VirialAccumulator::new(false, 4);
        virial.add_bond(0, 1, 2.0, &Vector3::new(1.0, 0.0, 0.0));
        assert!(virial.tensors().is_empty());
    }

    #[test]
    fn bond_weights_reconstruct_full_tensor() {
        let mut virial = VirialAccumulator::new(true, 2);
        let d = Vector3::new(1.0, 2.0, -0.5);
        virial.add_bond(0, 1, 3.0, &d);
        let expected = SymmetricTensor::outer(&d, &(d * 3.0));
        assert_tensor_close(&total(virial.tensors()), &expected, 1e-12);
    }

    #[test]
    fn angle_weights_reconstruct_full_tensor() {
        let mut virial = VirialAccumulator::new(true, 3);
        let r_ij = Vector3::new(0.0, 1.0, 0.3);
        let r_kj = Vector3::new(1.2, 0.0, -0.1);
        let f_i = Vector3::new(0.5, -0.2, 0.0);
        let f_k = Vector3::new(-0.3, 0.1, 0.4);
        virial.add_angle(0, 1, 2, &r_ij, &r_kj, &f_i, &f_k);
        let expected = SymmetricTensor::outer(&r_ij, &f_i) + SymmetricTensor::outer(&r_kj, &f_k);
        assert_tensor_close(&total(virial.tensors()), &expected, 1e-12);
    }

    #[test]
    fn dihedral_weights_reconstruct_full_tensor() {
        let mut virial = VirialAccumulator::new(true, 4);
        let r_ij = Vector3::new(0.0, 0.5, 1.0);
        let r_kj = Vector3::new(1.5, 0.0, 0.0);
        let r_kl = Vector3::new(-0.3, -1.0, 0.7);
        let f_i = Vector3::new(0.2, 0.0, -0.4);
        let f_k = Vector3::new(-0.1, 0.3, 0.2);
        let f_l = Vector3::new(0.4, -0.2, 0.1);
        virial.add_dihedral(0, 1, 2, 3, &f_i, &f_k, &f_l, &r_ij, &r_kj, &r_kl);
        let r_lj = r_kj - r_kl;
        let expected = SymmetricTensor::outer(&r_ij, &f_i)
            + SymmetricTensor::outer(&r_kj, &f_k)
            + SymmetricTensor::outer(&r_lj, &f_l);
        assert_tensor_close(&total(virial.tensors()), &expected, 1e-12);
    }

    #[test]
    fn clear_zeroes_all_tensors() {
        let mut virial = VirialAccumulator::new(true, 2);
        virial.add_bond(0, 1, 1.0, &Vector3::x());
        virial.clear();
        assert_eq!(total(virial.tensors()), SymmetricTensor::default());
    }
}
