use crate::core::interactions::{Interaction, InteractionMask};
use crate::core::pbc::PeriodicBox;
use crate::core::projection::{Vector2Scalar, signed_scalar};
use nalgebra::{Point3, Vector3};
use std::collections::BTreeMap;

/// A summed pairwise force: one accumulated vector per pair, with a bitmask
/// recording every interaction kind that contributed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummedForce {
    pub force: Vector3<f64>,
    pub kinds: InteractionMask,
}

/// A scalar pairwise force, produced by projecting summed vectors; the value
/// accumulates across a time-averaging window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarForce {
    pub value: f64,
    pub kinds: InteractionMask,
}

/// Pairwise force records for one entity class (atoms or residues), keyed by
/// entity index and, inside each entity, by partner index.
///
/// The canonical-order rule guarantees `entity < partner` for every stored
/// record; no self-pairs exist. Insertion accumulates, never overwrites, and
/// iteration is entity-ascending then partner-ascending, so output is stable
/// across runs.
///
/// Three representations coexist: `detailed` keeps one vector per interaction
/// kind, `summed` one vector per pair with a kind bitmask, and `scalar` the
/// projected per-pair value used by time-averaged output. Which ones are
/// populated depends on the session's pairing mode and averaging window.
#[derive(Debug, Default, PartialEq)]
pub struct DistributedForces {
    detailed: BTreeMap<usize, BTreeMap<usize, BTreeMap<Interaction, Vector3<f64>>>>,
    summed: BTreeMap<usize, BTreeMap<usize, SummedForce>>,
    scalar: BTreeMap<usize, BTreeMap<usize, ScalarForce>>,
}

impl DistributedForces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates a force for the (entity, partner, kind) triple, creating
    /// the record on first use.
    pub fn add_detailed(&mut self, i: usize, j: usize, force: Vector3<f64>, kind: Interaction) {
        debug_assert!(i < j, "pairs must be canonically ordered");
        let slot = self
            .detailed
            .entry(i)
            .or_default()
            .entry(j)
            .or_default()
            .entry(kind)
            .or_insert_with(Vector3::zeros);
        *slot += force;
    }

    /// Accumulates a force for the (entity, partner) pair and ORs the
    /// contributing kinds into the record's bitmask.
    pub fn add_summed(&mut self, i: usize, j: usize, force: Vector3<f64>, kinds: InteractionMask) {
        debug_assert!(i < j, "pairs must be canonically ordered");
        let record = self
            .summed
            .entry(i)
            .or_default()
            .entry(j)
            .or_insert(SummedForce {
                force: Vector3::zeros(),
                kinds: InteractionMask::NONE,
            });
        record.force += force;
        record.kinds |= kinds;
    }

    /// Projects every summed vector to a scalar against the entity positions
    /// and merges the results into the scalar store. Values accumulate across
    /// repeated calls, which is what builds up a time-averaging window.
    pub fn summed_merge_to_scalar(
        &mut self,
        positions: &[Point3<f64>],
        pbc: &PeriodicBox,
        v2s: Vector2Scalar,
    ) {
        for (&i, partners) in &self.summed {
            for (&j, record) in partners {
                let value = signed_scalar(&record.force, &positions[i], &positions[j], pbc, v2s);
                let slot = self
                    .scalar
                    .entry(i)
                    .or_default()
                    .entry(j)
                    .or_insert(ScalarForce {
                        value: 0.0,
                        kinds: InteractionMask::NONE,
                    });
                slot.value += value;
                slot.kinds |= record.kinds;
            }
        }
    }

    /// Divides every scalar value by `divisor` (the elapsed step count of a
    /// time-averaging window).
    pub fn scalar_real_divide(&mut self, divisor: f64) {
        for partners in self.scalar.values_mut() {
            for record in partners.values_mut() {
                record.value /= divisor;
            }
        }
    }

    /// Drops the per-frame accumulation (detailed and summed records). The
    /// scalar store survives: it carries state across an averaging window.
    pub fn clear(&mut self) {
        self.detailed.clear();
        self.summed.clear();
    }

    /// Drops the scalar records after an averaging window has been written.
    pub fn clear_scalar(&mut self) {
        self.scalar.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.detailed.is_empty() && self.summed.is_empty() && self.scalar.is_empty()
    }

    /// Detailed records as (entity, partner, kind, force), in stable order.
    pub fn detailed_records(
        &self,
    ) -> impl Iterator<Item = (usize, usize, Interaction, Vector3<f64>)> + '_ {
        self.detailed.iter().flat_map(|(&i, partners)| {
            partners.iter().flat_map(move |(&j, kinds)| {
                kinds.iter().map(move |(&kind, &force)| (i, j, kind, force))
            })
        })
    }

    /// Summed records as (entity, partner, record), in stable order.
    pub fn summed_records(&self) -> impl Iterator<Item = (usize, usize, SummedForce)> + '_ {
        self.summed.iter().flat_map(|(&i, partners)| {
            partners.iter().map(move |(&j, &record)| (i, j, record))
        })
    }

    /// Scalar records as (entity, partner, record), in stable order.
    pub fn scalar_records(&self) -> impl Iterator<Item = (usize, usize, ScalarForce)> + '_ {
        self.scalar.iter().flat_map(|(&i, partners)| {
            partners.iter().map(move |(&j, &record)| (i, j, record))
        })
    }
}
