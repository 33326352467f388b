use crate::core::models::topology::Topology;
use nalgebra::{Point3, Vector3};

/// Mass-weighted centers of mass for every residue, computed from the atoms
/// belonging to the monitored groups.
///
/// Residues with no contributing mass stay at the origin rather than failing:
/// this is the normal situation for residues none of whose atoms are tracked.
pub fn residues_com(topology: &Topology, positions: &[Point3<f64>]) -> Vec<Point3<f64>> {
    let mut mass = vec![0.0; topology.residue_count()];
    let mut weighted = vec![Vector3::zeros(); topology.residue_count()];

    for atom in 0..topology.atom_count() {
        if !topology.atom_in_groups(atom) {
            continue;
        }
        let residue = topology.residue_of(atom);
        let m = topology.mass(atom);
        mass[residue] += m;
        weighted[residue] += positions[atom].coords * m;
    }

    weighted
        .into_iter()
        .zip(mass)
        .map(|(sum, m)| {
            if m != 0.0 {
                Point3::from(sum / m)
            } else {
                Point3::origin()
            }
        })
        .collect()
}
