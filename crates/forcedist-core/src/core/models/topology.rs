use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TopologyError {
    #[error("Mass table length {masses} does not match atom count {atoms}")]
    MassTableMismatch { atoms: usize, masses: usize },

    #[error("Atom {atom} maps to residue {residue}, but only {residues} residues exist")]
    ResidueIndexOutOfRange {
        atom: usize,
        residue: usize,
        residues: usize,
    },

    #[error("Monitored group contains atom index {atom}, but only {atoms} atoms exist")]
    GroupIndexOutOfRange { atom: usize, atoms: usize },
}

/// The static per-run topology view consumed by force distribution analysis:
/// atom masses, the atom-to-residue mapping, and the two monitored atom
/// groups whose cross interactions are tracked.
///
/// The host's molecule blocks are flattened into plain per-atom tables before
/// construction; this core never traverses topology structures itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    masses: Vec<f64>,
    atom_to_residue: Vec<usize>,
    residue_count: usize,
    in_group1: Vec<bool>,
    in_group2: Vec<bool>,
    /// Dense renumbering of atoms that belong to either group, in ascending
    /// system order; used by the legacy compatibility layout.
    tracked: Vec<usize>,
    sys_to_tracked: Vec<Option<usize>>,
}

impl Topology {
    /// Builds a topology from per-atom tables and the two monitored groups
    /// (lists of atom indices). `residue_count` may exceed the highest mapped
    /// residue index; residues without atoms are legal.
    ///
    /// # Errors
    ///
    /// Fails when the mass table length disagrees with the residue mapping,
    /// when a residue index exceeds `residue_count`, or when a group names an
    /// atom outside the system.
    pub fn new(
        masses: Vec<f64>,
        atom_to_residue: Vec<usize>,
        residue_count: usize,
        group1: &[usize],
        group2: &[usize],
    ) -> Result<Self, TopologyError> {
        let atoms = atom_to_residue.len();
        if masses.len() != atoms {
            return Err(TopologyError::MassTableMismatch {
                atoms,
                masses: masses.len(),
            });
        }
        for (atom, &residue) in atom_to_residue.iter().enumerate() {
            if residue >= residue_count {
                return Err(TopologyError::ResidueIndexOutOfRange {
                    atom,
                    residue,
                    residues: residue_count,
                });
            }
        }

        let mut in_group1 = vec![false; atoms];
        let mut in_group2 = vec![false; atoms];
        for &atom in group1 {
            if atom >= atoms {
                return Err(TopologyError::GroupIndexOutOfRange { atom, atoms });
            }
            in_group1[atom] = true;
        }
        for &atom in group2 {
            if atom >= atoms {
                return Err(TopologyError::GroupIndexOutOfRange { atom, atoms });
            }
            in_group2[atom] = true;
        }

        let mut tracked = Vec::new();
        let mut sys_to_tracked = vec![None; atoms];
        for atom in 0..atoms {
            if in_group1[atom] || in_group2[atom] {
                sys_to_tracked[atom] = Some(tracked.len());
                tracked.push(atom);
            }
        }

        Ok(Self {
            masses,
            atom_to_residue,
            residue_count,
            in_group1,
            in_group2,
            tracked,
            sys_to_tracked,
        })
    }

    pub fn atom_count(&self) -> usize {
        self.atom_to_residue.len()
    }

    pub fn residue_count(&self) -> usize {
        self.residue_count
    }

    pub fn mass(&self, atom: usize) -> f64 {
        self.masses[atom]
    }

    pub fn residue_of(&self, atom: usize) -> usize {
        self.atom_to_residue[atom]
    }

    /// The symmetric cross-group check: one atom must come from group 1 and
    /// the other from group 2, in either order.
    pub fn atoms_in_groups(&self, i: usize, j: usize) -> bool {
        (self.in_group1[i] && self.in_group2[j]) || (self.in_group1[j] && self.in_group2[i])
    }

    /// Whether the atom belongs to either monitored group.
    pub fn atom_in_groups(&self, atom: usize) -> bool {
        self.in_group1[atom] || self.in_group2[atom]
    }

    /// Whether the two monitored groups contain exactly the same atoms, which
    /// the legacy compatibility layout requires.
    pub fn groups_identical(&self) -> bool {
        self.in_group1 == self.in_group2
    }

    /// Atoms belonging to either group, ascending.
    pub fn tracked_atoms(&self) -> &[usize] {
        &self.tracked
    }

    /// The dense index of an atom within [`Self::tracked_atoms`], if tracked.
    pub fn tracked_index(&self, atom: usize) -> Option<usize> {
        self.sys_to_tracked[atom]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_residue_topology() -> Topology {
        // Atoms 0-2 in residue 0, atoms 3-4 in residue 1.
        Topology::new(
            vec![12.0, 1.0, 1.0, 16.0, 1.0],
            vec![0, 0, 0, 1, 1],
            2,
            &[0, 1, 2],
            &[3, 4],
        )
        .unwrap()
    }

    #[test]
    fn counts_and_residue_mapping_are_exposed() {
        let top = two_residue_topology();
        assert_eq!(top.atom_count(), 5);
        assert_eq!(top.residue_count(), 2);
        assert_eq!(top.residue_of(4), 1);
    }

    #[test]
    fn atoms_in_groups_is_symmetric_and_cross_group() {
        let top = two_residue_topology();
        assert!(top.atoms_in_groups(0, 3));
        assert!(top.atoms_in_groups(3, 0));
        // Both from group 1: not a monitored pair.
        assert!(!top.atoms_in_groups(0, 1));
        assert!(!top.atoms_in_groups(3, 4));
    }

    #[test]
    fn tracked_atoms_are_densely_renumbered() {
        let top = Topology::new(vec![1.0; 6], vec![0, 0, 1, 1, 2, 2], 3, &[1, 4], &[4, 5]).unwrap();
        assert_eq!(top.tracked_atoms(), &[1, 4, 5]);
        assert_eq!(top.tracked_index(4), Some(1));
        assert_eq!(top.tracked_index(0), None);
        assert!(!top.atom_in_groups(0));
        assert!(top.atom_in_groups(5));
    }

    #[test]
    fn identical_groups_are_detected() {
        let top = Topology::new(vec![1.0; 3], vec![0, 0, 0], 1, &[0, 2], &[2, 0]).unwrap();
        assert!(top.groups_identical());
        let top = two_residue_topology();
        assert!(!top.groups_identical());
    }

    #[test]
    fn mismatched_mass_table_is_rejected() {
        let result = Topology::new(vec![1.0; 2], vec![0, 0, 0], 1, &[], &[]);
        assert_eq!(
            result.unwrap_err(),
            TopologyError::MassTableMismatch { atoms: 3, masses: 2 }
        );
    }

    #[test]
    fn out_of_range_group_atom_is_rejected() {
        let result = Topology::new(vec![1.0; 3], vec![0, 0, 0], 1, &[0], &[5]);
        assert_eq!(
            result.unwrap_err(),
            TopologyError::GroupIndexOutOfRange { atom: 5, atoms: 3 }
        );
    }
}
