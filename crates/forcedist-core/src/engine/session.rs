use super::com::residues_com;
use super::error::FdaError;
use super::settings::{EntityClass, FdaSettings, OnePair, OutputMode};
use super::store::DistributedForces;
use super::virial::VirialAccumulator;
use super::writer::{CompatRecord, FrameWriter};
use crate::core::decompose::{decompose_angle, decompose_dihedral};
use crate::core::interactions::Interaction;
use crate::core::models::topology::Topology;
use crate::core::pairs::{PairKey, oriented};
use crate::core::pbc::PeriodicBox;
use crate::core::projection::{Vector2Scalar, signed_scalar};
use crate::core::tensor::SymmetricTensor;
use nalgebra::{Point3, Vector3};
use std::io::Write;
use tracing::{debug, info, trace};

/// One entity class's result pipeline: its output mode, its pairwise force
/// store, and its frame writer. Instantiated twice per session, once for
/// atoms and once for residues.
struct ForceBase<W: Write> {
    entity: EntityClass,
    mode: OutputMode,
    forces: DistributedForces,
    writer: Option<FrameWriter<W>>,
}

impl<W: Write> ForceBase<W> {
    fn new(entity: EntityClass, mode: OutputMode, sink: Option<W>) -> Result<Self, FdaError> {
        if mode.is_active() && sink.is_none() {
            return Err(FdaError::MissingSink { entity, mode });
        }
        Ok(Self {
            entity,
            mode,
            forces: DistributedForces::new(),
            writer: sink.map(FrameWriter::new),
        })
    }

    /// Whether any non-trivial pairwise output is requested for this entity
    /// class; when false, accumulation is skipped entirely.
    fn tracks_pairwise(&self) -> bool {
        self.mode.is_pairwise_or_punctual()
    }

    fn frames_written(&self) -> u64 {
        self.writer.as_ref().map_or(0, FrameWriter::frames_written)
    }
}

/// Dense entity numbering for the legacy half-matrix layout: atoms map
/// through the tracked-atom renumbering, residues are already dense.
enum CompatIndexing<'a> {
    Atoms(&'a Topology),
    Residues(usize),
}

impl CompatIndexing<'_> {
    fn len(&self) -> usize {
        match self {
            CompatIndexing::Atoms(topology) => topology.tracked_atoms().len(),
            CompatIndexing::Residues(count) => *count,
        }
    }

    fn dense(&self, entity: usize) -> Option<usize> {
        match self {
            CompatIndexing::Atoms(topology) => topology.tracked_index(entity),
            CompatIndexing::Residues(_) => Some(entity),
        }
    }

    /// The legacy pair index `min * len + max` over the dense numbering.
    fn half_matrix(&self, i: usize, j: usize) -> Option<usize> {
        let (ii, jj) = (self.dense(i)?, self.dense(j)?);
        let (lo, hi) = if ii > jj { (jj, ii) } else { (ii, jj) };
        Some(lo * self.len() + hi)
    }
}

fn compat_records_from_summed(
    forces: &DistributedForces,
    positions: &[Point3<f64>],
    pbc: &PeriodicBox,
    v2s: Vector2Scalar,
    indexing: &CompatIndexing<'_>,
) -> Vec<CompatRecord> {
    forces
        .summed_records()
        .filter_map(|(i, j, record)| {
            let index = indexing.half_matrix(i, j)?;
            let value = signed_scalar(&record.force, &positions[i], &positions[j], pbc, v2s);
            Some(CompatRecord {
                index,
                value,
                code: record.kinds.compat_code(),
            })
        })
        .collect()
}

fn compat_records_from_scalar(
    forces: &DistributedForces,
    indexing: &CompatIndexing<'_>,
) -> Vec<CompatRecord> {
    forces
        .scalar_records()
        .filter_map(|(i, j, record)| {
            Some(CompatRecord {
                index: indexing.half_matrix(i, j)?,
                value: record.value,
                code: record.kinds.compat_code(),
            })
        })
        .collect()
}

/// One force distribution analysis run.
///
/// The host simulation engine drives the session once per force-evaluation
/// step: it feeds raw per-interaction forces through the `add_*` methods
/// while computing forces, then calls [`FdaSession::end_frame`] with the
/// step's coordinates. Interactions are filtered by the configured kind mask
/// and monitored group pair, canonicalized to ordered pairs, and routed into
/// the atom-based and residue-based stores independently. Multi-body angle
/// and dihedral forces are first decomposed into pairwise contributions.
///
/// All state is exclusively owned by the session for the lifetime of the run;
/// there is no internal threading and no locking.
pub struct FdaSession<W: Write> {
    settings: FdaSettings,
    topology: Topology,
    atom_based: ForceBase<W>,
    residue_based: ForceBase<W>,
    virial: VirialAccumulator,
    /// Steps accumulated in the current time-averaging window; reset on flush.
    averaging_steps: u32,
}

impl<W: Write> FdaSession<W> {
    /// Creates a session, validating the settings against each other and
    /// against the topology. A sink must be provided for every entity class
    /// whose output mode is active.
    pub fn new(
        settings: FdaSettings,
        topology: Topology,
        atom_sink: Option<W>,
        residue_sink: Option<W>,
    ) -> Result<Self, FdaError> {
        settings.validate()?;
        if (settings.atom_based == OutputMode::CompatAscii
            || settings.residue_based == OutputMode::CompatAscii)
            && !topology.groups_identical()
        {
            return Err(FdaError::CompatGroupMismatch);
        }

        let atom_based = ForceBase::new(EntityClass::Atoms, settings.atom_based, atom_sink)?;
        let residue_based =
            ForceBase::new(EntityClass::Residues, settings.residue_based, residue_sink)?;
        let virial =
            VirialAccumulator::new(settings.atom_based.is_virial(), topology.atom_count());

        info!(
            atom_based = %settings.atom_based,
            residue_based = %settings.residue_based,
            interactions = %settings.interactions,
            "force distribution analysis session initialized"
        );

        Ok(Self {
            settings,
            topology,
            atom_based,
            residue_based,
            virial,
            averaging_steps: 0,
        })
    }

    /// Records a bonded interaction: `force` is the force exerted on atom `i`
    /// by atom `j`. No-op when the kind is not tracked or neither atom
    /// belongs to the monitored group pair. Callers guarantee `i != j`.
    pub fn add_bonded(&mut self, i: usize, j: usize, kind: Interaction, force: Vector3<f64>) {
        if !self.settings.interactions.contains(kind) {
            return;
        }
        if !self.topology.atoms_in_groups(i, j) {
            return;
        }
        self.add_bonded_nocheck(i, j, kind, force);
    }

    /// The routing step shared by every interaction path, after filtering.
    ///
    /// The residue pair is canonicalized independently of the atom pair: it
    /// is possible that `i > j` while `residue(i) < residue(j)`, so the sign
    /// flip has to be decided separately for each entity class. Atoms never
    /// coincide here, but their residues may; a residue's interaction with
    /// itself carries no information and is skipped.
    fn add_bonded_nocheck(&mut self, i: usize, j: usize, kind: Interaction, force: Vector3<f64>) {
        if self.residue_based.tracks_pairwise() {
            let (pair, swapped) =
                PairKey::ordered(self.topology.residue_of(i), self.topology.residue_of(j));
            if pair.low != pair.high {
                let force = oriented(force, swapped);
                match self.settings.one_pair {
                    OnePair::Detailed => {
                        self.residue_based
                            .forces
                            .add_detailed(pair.low, pair.high, force, kind)
                    }
                    OnePair::Summed => {
                        self.residue_based
                            .forces
                            .add_summed(pair.low, pair.high, force, kind.mask())
                    }
                }
            }
        }

        if self.atom_based.tracks_pairwise() {
            let (pair, swapped) = PairKey::ordered(i, j);
            let force = oriented(force, swapped);
            match self.settings.one_pair {
                OnePair::Detailed => {
                    self.atom_based
                        .forces
                        .add_detailed(pair.low, pair.high, force, kind)
                }
                OnePair::Summed => {
                    self.atom_based
                        .forces
                        .add_summed(pair.low, pair.high, force, kind.mask())
                }
            }
        }
    }

    /// Records a non-bonded interaction of a single kind, given as a signed
    /// scalar magnitude along the displacement `(dx, dy, dz)`, the same form
    /// the non-bonded kernels produce it in.
    pub fn add_nonbonded_single(
        &mut self,
        i: usize,
        j: usize,
        kind: Interaction,
        force: f64,
        dx: f64,
        dy: f64,
        dz: f64,
    ) {
        if !self.settings.interactions.contains(kind) {
            return;
        }
        if !self.topology.atoms_in_groups(i, j) {
            return;
        }
        self.add_bonded_nocheck(i, j, kind, Vector3::new(force * dx, force * dy, force * dz));
    }

    /// Records a non-bonded interaction where the kernel computed both the
    /// Coulomb and Lennard-Jones scalars at once; cheaper than two single
    /// calls because the filters and the residue lookup run only once.
    ///
    /// In summed mode the two scalars combine into one vector before storage;
    /// in detailed mode they stay separate records.
    pub fn add_nonbonded(
        &mut self,
        i: usize,
        j: usize,
        coulomb: f64,
        lj: f64,
        dx: f64,
        dy: f64,
        dz: f64,
    ) {
        // Cheapest checks first: fall back to the single-kind path when only
        // one of the two kinds is tracked.
        let track_coulomb = self.settings.interactions.contains(Interaction::Coulomb);
        let track_lj = self.settings.interactions.contains(Interaction::Lj);
        match (track_coulomb, track_lj) {
            (false, false) => return,
            (true, false) => {
                return self.add_nonbonded_single(i, j, Interaction::Coulomb, coulomb, dx, dy, dz);
            }
            (false, true) => {
                return self.add_nonbonded_single(i, j, Interaction::Lj, lj, dx, dy, dz);
            }
            (true, true) => {}
        }
        if !self.topology.atoms_in_groups(i, j) {
            return;
        }

        let d = Vector3::new(dx, dy, dz);

        if self.residue_based.tracks_pairwise() {
            let (pair, swapped) =
                PairKey::ordered(self.topology.residue_of(i), self.topology.residue_of(j));
            if pair.low != pair.high {
                let (coulomb, lj) = if swapped { (-coulomb, -lj) } else { (coulomb, lj) };
                match self.settings.one_pair {
                    OnePair::Detailed => {
                        self.residue_based.forces.add_detailed(
                            pair.low,
                            pair.high,
                            d * coulomb,
                            Interaction::Coulomb,
                        );
                        self.residue_based.forces.add_detailed(
                            pair.low,
                            pair.high,
                            d * lj,
                            Interaction::Lj,
                        );
                    }
                    OnePair::Summed => self.residue_based.forces.add_summed(
                        pair.low,
                        pair.high,
                        d * (coulomb + lj),
                        Interaction::Coulomb.mask() | Interaction::Lj.mask(),
                    ),
                }
            }
        }

        if self.atom_based.tracks_pairwise() {
            let (pair, swapped) = PairKey::ordered(i, j);
            let (coulomb, lj) = if swapped { (-coulomb, -lj) } else { (coulomb, lj) };
            match self.settings.one_pair {
                OnePair::Detailed => {
                    self.atom_based.forces.add_detailed(
                        pair.low,
                        pair.high,
                        d * coulomb,
                        Interaction::Coulomb,
                    );
                    self.atom_based
                        .forces
                        .add_detailed(pair.low, pair.high, d * lj, Interaction::Lj);
                }
                OnePair::Summed => self.atom_based.forces.add_summed(
                    pair.low,
                    pair.high,
                    d * (coulomb + lj),
                    Interaction::Coulomb.mask() | Interaction::Lj.mask(),
                ),
            }
        }
    }

    /// Records a 3-body angle interaction by decomposing the per-atom forces
    /// into three pairwise contributions. Degenerate inputs are dropped
    /// without emitting records.
    pub fn add_angle(
        &mut self,
        ai: usize,
        aj: usize,
        ak: usize,
        f_i: &Vector3<f64>,
        f_j: &Vector3<f64>,
        f_k: &Vector3<f64>,
    ) {
        let Some(d) = decompose_angle(f_i, f_j, f_k) else {
            return;
        };
        self.add_bonded(aj, ai, Interaction::Angle, d.f_j_i);
        self.add_bonded(ai, ak, Interaction::Angle, d.f_i_k);
        self.add_bonded(aj, ak, Interaction::Angle, d.f_j_k);
    }

    /// Records a 4-body dihedral interaction by decomposing the per-atom
    /// forces into six pairwise contributions. Degenerate geometries are
    /// dropped without emitting records.
    #[allow(clippy::too_many_arguments)]
    pub fn add_dihedral(
        &mut self,
        i: usize,
        j: usize,
        k: usize,
        l: usize,
        f_i: &Vector3<f64>,
        f_j: &Vector3<f64>,
        f_k: &Vector3<f64>,
        f_l: &Vector3<f64>,
    ) {
        let Some(d) = decompose_dihedral(f_i, f_j, f_k, f_l) else {
            return;
        };
        self.add_bonded(j, i, Interaction::Dihedral, d.f_j_i);
        self.add_bonded(k, i, Interaction::Dihedral, d.f_k_i);
        self.add_bonded(l, i, Interaction::Dihedral, d.f_l_i);
        self.add_bonded(j, k, Interaction::Dihedral, d.f_j_k);
        self.add_bonded(j, l, Interaction::Dihedral, d.f_j_l);
        self.add_bonded(k, l, Interaction::Dihedral, d.f_k_l);
    }

    /// Adds `weight * tensor` to an atom's virial; no-op unless virial-stress
    /// output is configured.
    pub fn add_virial(&mut self, atom: usize, tensor: &SymmetricTensor, weight: f64) {
        self.virial.add(atom, tensor, weight);
    }

    /// Virial contribution of a bond, half to each atom.
    pub fn add_virial_bond(&mut self, ai: usize, aj: usize, f: f64, dx: f64, dy: f64, dz: f64) {
        self.virial.add_bond(ai, aj, f, &Vector3::new(dx, dy, dz));
    }

    /// Virial contribution of an angle, a third to each atom.
    #[allow(clippy::too_many_arguments)]
    pub fn add_virial_angle(
        &mut self,
        ai: usize,
        aj: usize,
        ak: usize,
        r_ij: &Vector3<f64>,
        r_kj: &Vector3<f64>,
        f_i: &Vector3<f64>,
        f_k: &Vector3<f64>,
    ) {
        self.virial.add_angle(ai, aj, ak, r_ij, r_kj, f_i, f_k);
    }

    /// Virial contribution of a dihedral, a quarter to each atom.
    #[allow(clippy::too_many_arguments)]
    pub fn add_virial_dihedral(
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
        self.virial
            .add_dihedral(i, j, k, l, f_i, f_k, f_l, r_ij, r_kj, r_kl);
    }

    /// Closes the current step. All `add_*` calls of the frame must have
    /// completed (host responsibility; the core does not defend against
    /// out-of-order calls).
    ///
    /// Without time averaging this writes one frame per call. With a window
    /// configured, summed vectors are merged into the running scalar store
    /// (against atom coordinates and per-step residue centers of mass) and a
    /// frame is written only when the window fills. Per-frame accumulation is
    /// cleared either way.
    pub fn end_frame(
        &mut self,
        positions: &[Point3<f64>],
        pbc: &PeriodicBox,
    ) -> Result<(), FdaError> {
        trace!(step = self.averaging_steps, "closing frame");
        if self.settings.time_averaging_period == 1 {
            self.write_frame(positions, pbc)?;
        } else {
            let v2s = self.settings.vector_to_scalar;
            if self.atom_based.tracks_pairwise() {
                self.atom_based
                    .forces
                    .summed_merge_to_scalar(positions, pbc, v2s);
            }
            if self.residue_based.tracks_pairwise() {
                let com = residues_com(&self.topology, positions);
                self.residue_based
                    .forces
                    .summed_merge_to_scalar(&com, pbc, v2s);
            }
            self.averaging_steps += 1;
            let period = self.settings.time_averaging_period;
            if period != 0 && self.averaging_steps >= period {
                self.write_scalar_time_averages()?;
            }
        }

        self.atom_based.forces.clear();
        self.residue_based.forces.clear();
        self.virial.clear();
        Ok(())
    }

    /// Writes the pending time-averaging window, if any: divides the scalar
    /// stores by the elapsed step count, writes one scalar (or compatibility)
    /// frame per active entity class, and resets the window.
    pub fn write_scalar_time_averages(&mut self) -> Result<(), FdaError> {
        if self.averaging_steps == 0 {
            return Ok(());
        }
        let steps = f64::from(self.averaging_steps);
        debug!(steps = self.averaging_steps, "writing scalar time averages");

        if self.atom_based.tracks_pairwise() {
            self.atom_based.forces.scalar_real_divide(steps);
            Self::flush_scalar(&mut self.atom_based, CompatIndexing::Atoms(&self.topology))?;
        }
        if self.residue_based.tracks_pairwise() {
            self.residue_based.forces.scalar_real_divide(steps);
            Self::flush_scalar(
                &mut self.residue_based,
                CompatIndexing::Residues(self.topology.residue_count()),
            )?;
        }
        self.averaging_steps = 0;
        Ok(())
    }

    fn flush_scalar(
        base: &mut ForceBase<W>,
        indexing: CompatIndexing<'_>,
    ) -> Result<(), FdaError> {
        let Some(writer) = base.writer.as_mut() else {
            return Ok(());
        };
        if base.mode == OutputMode::CompatAscii {
            let records = compat_records_from_scalar(&base.forces, &indexing);
            writer.write_compat_frame(&records)?;
        } else {
            writer.write_scalar_frame(&base.forces)?;
        }
        base.forces.clear_scalar();
        Ok(())
    }

    /// Writes one frame directly from the per-frame stores, used when no
    /// time-averaging window is configured. Residue-based output is written
    /// against the residues' centers of mass.
    fn write_frame(
        &mut self,
        positions: &[Point3<f64>],
        pbc: &PeriodicBox,
    ) -> Result<(), FdaError> {
        Self::write_entity_frame(
            &mut self.atom_based,
            &self.settings,
            positions,
            pbc,
            &self.virial,
            CompatIndexing::Atoms(&self.topology),
        )?;

        if self.residue_based.mode.is_pairwise_or_punctual() {
            let com = residues_com(&self.topology, positions);
            Self::write_entity_frame(
                &mut self.residue_based,
                &self.settings,
                &com,
                pbc,
                &self.virial,
                CompatIndexing::Residues(self.topology.residue_count()),
            )?;
        }
        Ok(())
    }

    fn write_entity_frame(
        base: &mut ForceBase<W>,
        settings: &FdaSettings,
        positions: &[Point3<f64>],
        pbc: &PeriodicBox,
        virial: &VirialAccumulator,
        indexing: CompatIndexing<'_>,
    ) -> Result<(), FdaError> {
        let Some(writer) = base.writer.as_mut() else {
            return Ok(());
        };
        let v2s = settings.vector_to_scalar;
        match (settings.one_pair, base.mode) {
            (_, OutputMode::None) => {}
            (OnePair::Detailed, OutputMode::PairwiseForcesVector) => {
                writer.write_detailed_frame(&base.forces, positions, pbc, true, v2s)?
            }
            (OnePair::Detailed, OutputMode::PairwiseForcesScalar) => {
                writer.write_detailed_frame(&base.forces, positions, pbc, false, v2s)?
            }
            (OnePair::Summed, OutputMode::PairwiseForcesVector) => {
                writer.write_summed_frame(&base.forces, positions, pbc, true, v2s)?
            }
            (OnePair::Summed, OutputMode::PairwiseForcesScalar) => {
                writer.write_summed_frame(&base.forces, positions, pbc, false, v2s)?
            }
            (OnePair::Summed, OutputMode::PunctualStress) => writer.write_punctual_frame(
                &base.forces,
                positions.len(),
                positions,
                pbc,
                v2s,
                settings.no_end_zeros,
            )?,
            (OnePair::Summed, OutputMode::VirialStress) => {
                writer.write_virial_frame(virial.tensors())?
            }
            (OnePair::Summed, OutputMode::VirialStressVonMises) => {
                writer.write_von_mises_frame(virial.tensors())?
            }
            (OnePair::Summed, OutputMode::CompatAscii) => {
                let records =
                    compat_records_from_summed(&base.forces, positions, pbc, v2s, &indexing);
                writer.write_compat_frame(&records)?;
            }
            // Validation rules these combinations out at construction;
            // reaching one means an internal inconsistency.
            (one_pair, mode) => {
                return Err(FdaError::UnsupportedOutput {
                    entity: base.entity,
                    mode,
                    one_pair,
                });
            }
        }
        Ok(())
    }

    /// Flushes a trailing partial averaging window, writes the compatibility
    /// trailer where applicable, and returns the sinks to the host.
    pub fn finalize(mut self) -> Result<(Option<W>, Option<W>), FdaError> {
        self.write_scalar_time_averages()?;
        let atoms = Self::close(self.atom_based)?;
        let residues = Self::close(self.residue_based)?;
        Ok((atoms, residues))
    }

    fn close(base: ForceBase<W>) -> Result<Option<W>, FdaError> {
        match base.writer {
            Some(mut writer) => {
                if base.mode == OutputMode::CompatAscii {
                    writer.write_compat_footer()?;
                }
                writer.flush()?;
                Ok(Some(writer.into_inner()))
            }
            None => Ok(None),
        }
    }

    pub fn settings(&self) -> &FdaSettings {
        &self.settings
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn atom_forces(&self) -> &DistributedForces {
        &self.atom_based.forces
    }

    pub fn residue_forces(&self) -> &DistributedForces {
        &self.residue_based.forces
    }

    pub fn virial_tensors(&self) -> &[SymmetricTensor] {
        self.virial.tensors()
    }

    pub fn atom_frames_written(&self) -> u64 {
        self.atom_based.frames_written()
    }

    pub fn residue_frames_written(&self) -> u64 {
        self.residue_based.frames_written()
    }
}
