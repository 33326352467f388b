use super::store::DistributedForces;
use crate::core::pbc::PeriodicBox;
use crate::core::projection::{Vector2Scalar, signed_scalar, unsigned_scalar};
use crate::core::tensor::SymmetricTensor;
use nalgebra::Point3;
use std::io::{self, Write};

/// One interaction of a legacy compatibility frame, already mapped onto the
/// dense half-matrix: `index = min * len + max` over the dense entity
/// numbering, preserving the layout of the original pairwise-force files.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompatRecord {
    pub index: usize,
    pub value: f64,
    pub code: char,
}

/// Serializes accumulated per-frame (or time-averaged) state into one of the
/// plain-text output encodings.
///
/// Owns its sink and the frame counter. The counter advances by exactly one
/// per frame written, independent of how many records the frame carried --
/// including zero, so empty frames still consume a frame number.
#[derive(Debug)]
pub struct FrameWriter<W: Write> {
    sink: W,
    frames: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, frames: 0 }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Writes one frame of detailed pairwise records: `i j fx fy fz type` in
    /// vector form, `i j value type` with the projected scalar otherwise.
    /// `positions` must be indexed by entity (atom coordinates or residue
    /// centers of mass).
    pub fn write_detailed_frame(
        &mut self,
        forces: &DistributedForces,
        positions: &[Point3<f64>],
        pbc: &PeriodicBox,
        vector: bool,
        v2s: Vector2Scalar,
    ) -> io::Result<()> {
        writeln!(self.sink, "frame {}", self.frames)?;
        for (i, j, kind, force) in forces.detailed_records() {
            let tag = kind.mask().bits();
            if vector {
                writeln!(
                    self.sink,
                    "{} {} {:e} {:e} {:e} {}",
                    i, j, force.x, force.y, force.z, tag
                )?;
            } else {
                let value = signed_scalar(&force, &positions[i], &positions[j], pbc, v2s);
                writeln!(self.sink, "{} {} {:e} {}", i, j, value, tag)?;
            }
        }
        self.frames += 1;
        Ok(())
    }

    /// Writes one frame of summed pairwise records; the type tag carries the
    /// OR'd bitmask of every kind that contributed to the pair.
    pub fn write_summed_frame(
        &mut self,
        forces: &DistributedForces,
        positions: &[Point3<f64>],
        pbc: &PeriodicBox,
        vector: bool,
        v2s: Vector2Scalar,
    ) -> io::Result<()> {
        writeln!(self.sink, "frame {}", self.frames)?;
        for (i, j, record) in forces.summed_records() {
            let tag = record.kinds.bits();
            if vector {
                writeln!(
                    self.sink,
                    "{} {} {:e} {:e} {:e} {}",
                    i, j, record.force.x, record.force.y, record.force.z, tag
                )?;
            } else {
                let value =
                    signed_scalar(&record.force, &positions[i], &positions[j], pbc, v2s);
                writeln!(self.sink, "{} {} {:e} {}", i, j, value, tag)?;
            }
        }
        self.frames += 1;
        Ok(())
    }

    /// Writes one frame of scalar records, the time-averaged form.
    pub fn write_scalar_frame(&mut self, forces: &DistributedForces) -> io::Result<()> {
        writeln!(self.sink, "frame {}", self.frames)?;
        for (i, j, record) in forces.scalar_records() {
            writeln!(
                self.sink,
                "{} {} {:e} {}",
                i, j, record.value, record.kinds.bits()
            )?;
        }
        self.frames += 1;
        Ok(())
    }

    /// Writes one punctual-stress frame: a single line of per-entity scalar
    /// sums in entity order, every pairwise magnitude loading both endpoints.
    /// With `no_end_zeros` the trailing zero columns are trimmed.
    pub fn write_punctual_frame(
        &mut self,
        forces: &DistributedForces,
        entity_count: usize,
        positions: &[Point3<f64>],
        pbc: &PeriodicBox,
        v2s: Vector2Scalar,
        no_end_zeros: bool,
    ) -> io::Result<()> {
        let mut per_entity = vec![0.0f64; entity_count];
        for (i, j, record) in forces.summed_records() {
            let value = unsigned_scalar(&record.force, &positions[i], &positions[j], pbc, v2s);
            per_entity[i] += value;
            per_entity[j] += value;
        }

        let mut end = per_entity.len();
        if no_end_zeros {
            while end > 0 && per_entity[end - 1] == 0.0 {
                end -= 1;
            }
        }
        for (column, value) in per_entity[..end].iter().enumerate() {
            if column > 0 {
                write!(self.sink, " ")?;
            }
            write!(self.sink, "{value:e}")?;
        }
        writeln!(self.sink)?;
        self.frames += 1;
        Ok(())
    }

    /// Writes one virial-stress frame: per atom, the six tensor components in
    /// the order XX YY ZZ XY XZ YZ, sign-negated because the reported stress
    /// is the negative virial.
    pub fn write_virial_frame(&mut self, tensors: &[SymmetricTensor]) -> io::Result<()> {
        writeln!(self.sink, "frame {}", self.frames)?;
        for t in tensors {
            writeln!(
                self.sink,
                "{:e} {:e} {:e} {:e} {:e} {:e}",
                -t.xx, -t.yy, -t.zz, -t.xy, -t.xz, -t.yz
            )?;
        }
        self.frames += 1;
        Ok(())
    }

    /// Writes one von Mises frame: a single line with one rotation-invariant
    /// scalar per atom. No sign flip is needed, every term is squared.
    pub fn write_von_mises_frame(&mut self, tensors: &[SymmetricTensor]) -> io::Result<()> {
        for (column, t) in tensors.iter().enumerate() {
            if column > 0 {
                write!(self.sink, " ")?;
            }
            write!(self.sink, "{:e}", t.von_mises())?;
        }
        writeln!(self.sink)?;
        self.frames += 1;
        Ok(())
    }

    /// Writes one legacy compatibility block. The records must already carry
    /// their half-matrix indices; this writer only lays out the block:
    /// delimiters, the frame number, the interaction count, then the index,
    /// force, and interaction-code lines.
    pub fn write_compat_frame(&mut self, records: &[CompatRecord]) -> io::Result<()> {
        writeln!(self.sink, "<begin_block>")?;
        writeln!(self.sink, "frame {}", self.frames)?;
        writeln!(self.sink, "interactions {}", records.len())?;
        for (column, record) in records.iter().enumerate() {
            let sep = if column > 0 { " " } else { "" };
            write!(self.sink, "{sep}{}", record.index)?;
        }
        writeln!(self.sink)?;
        for (column, record) in records.iter().enumerate() {
            let sep = if column > 0 { " " } else { "" };
            write!(self.sink, "{sep}{:e}", record.value)?;
        }
        writeln!(self.sink)?;
        for (column, record) in records.iter().enumerate() {
            let sep = if column > 0 { " " } else { "" };
            write!(self.sink, "{sep}{}", record.code)?;
        }
        writeln!(self.sink)?;
        writeln!(self.sink, "<end_block>")?;
        self.frames += 1;
        Ok(())
    }

    /// Writes the compatibility trailer carrying the total frame count, the
    /// piece the original format kept in its header.
    pub fn write_compat_footer(&mut self) -> io::Result<()> {
        writeln!(self.sink, "frames_total {}", self.frames)?;
        Ok(())
    }
}
