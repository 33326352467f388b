use phf::phf_map;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;
use thiserror::Error;

/// A single kind of interaction tracked by force distribution analysis.
///
/// Bonded kinds arise from explicit topology connectivity, non-bonded kinds
/// from pair interactions between non-adjacent atoms. The discriminant doubles
/// as the bit position inside an [`InteractionMask`], so the numeric type tags
/// written to output files are stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Interaction {
    Bond = 0,
    Angle = 1,
    Dihedral = 2,
    Polar = 3,
    Coulomb = 4,
    Lj = 5,
    Nb14 = 6,
}

impl Interaction {
    /// All kinds, in bit order. Detailed output iterates kinds in this order.
    pub const ALL: [Interaction; 7] = [
        Interaction::Bond,
        Interaction::Angle,
        Interaction::Dihedral,
        Interaction::Polar,
        Interaction::Coulomb,
        Interaction::Lj,
        Interaction::Nb14,
    ];

    /// The single-bit mask selecting only this kind.
    pub const fn mask(self) -> InteractionMask {
        InteractionMask(1 << self as u16)
    }

    /// Keyword used in configuration files and output headers.
    pub const fn name(self) -> &'static str {
        match self {
            Interaction::Bond => "bond",
            Interaction::Angle => "angle",
            Interaction::Dihedral => "dihedral",
            Interaction::Polar => "polar",
            Interaction::Coulomb => "coulomb",
            Interaction::Lj => "lj",
            Interaction::Nb14 => "nb14",
        }
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`Interaction`] tags backed by a bit field.
///
/// Used both as the configured filter of tracked interaction types (an
/// interaction whose kind is not in the mask is discarded before any
/// accumulation) and as the per-record bookkeeping of which kinds contributed
/// to a summed pairwise force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InteractionMask(u16);

impl InteractionMask {
    pub const NONE: Self = Self(0);
    pub const BOND: Self = Interaction::Bond.mask();
    pub const ANGLE: Self = Interaction::Angle.mask();
    pub const DIHEDRAL: Self = Interaction::Dihedral.mask();
    pub const POLAR: Self = Interaction::Polar.mask();
    pub const COULOMB: Self = Interaction::Coulomb.mask();
    pub const LJ: Self = Interaction::Lj.mask();
    pub const NB14: Self = Interaction::Nb14.mask();
    pub const ALL_BONDED: Self = Self(Self::BOND.0 | Self::ANGLE.0 | Self::DIHEDRAL.0);
    pub const ALL_NONBONDED: Self =
        Self(Self::POLAR.0 | Self::COULOMB.0 | Self::LJ.0 | Self::NB14.0);
    pub const ALL: Self = Self(Self::ALL_BONDED.0 | Self::ALL_NONBONDED.0);

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, kind: Interaction) -> bool {
        self.0 & kind.mask().0 != 0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// The raw bit representation, written as the numeric type tag in
    /// pairwise output records.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Iterates the kinds present in the mask, in bit order.
    pub fn kinds(self) -> impl Iterator<Item = Interaction> {
        Interaction::ALL.into_iter().filter(move |k| self.contains(*k))
    }

    /// One-letter tag used by the legacy compatibility layout, which cannot
    /// carry a full bitmask: single kinds map to their initial, anything
    /// mixed collapses to 'm'.
    pub fn compat_code(self) -> char {
        let mut kinds = self.kinds();
        match (kinds.next(), kinds.next()) {
            (Some(kind), None) => match kind {
                Interaction::Bond => 'b',
                Interaction::Angle => 'a',
                Interaction::Dihedral => 'd',
                Interaction::Polar => 'p',
                Interaction::Coulomb => 'c',
                Interaction::Lj => 'l',
                Interaction::Nb14 => 'n',
            },
            (None, _) => 'x',
            _ => 'm',
        }
    }
}

impl From<Interaction> for InteractionMask {
    fn from(kind: Interaction) -> Self {
        kind.mask()
    }
}

impl BitOr for InteractionMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for InteractionMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for InteractionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        if *self == Self::ALL {
            return f.write_str("all");
        }
        let mut first = true;
        for kind in self.kinds() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(kind.name())?;
            first = false;
        }
        Ok(())
    }
}

/// Keyword table for parsing interaction selections from configuration input.
/// Aggregate keywords expand to the corresponding group masks.
static INTERACTION_KEYWORDS: phf::Map<&'static str, u16> = phf_map! {
    "bond" => InteractionMask::BOND.0,
    "angle" => InteractionMask::ANGLE.0,
    "dihedral" => InteractionMask::DIHEDRAL.0,
    "polar" => InteractionMask::POLAR.0,
    "coulomb" => InteractionMask::COULOMB.0,
    "lj" => InteractionMask::LJ.0,
    "vdw" => InteractionMask::LJ.0,
    "nb14" => InteractionMask::NB14.0,
    "bonded" => InteractionMask::ALL_BONDED.0,
    "nonbonded" => InteractionMask::ALL_NONBONDED.0,
    "all" => InteractionMask::ALL.0,
    "none" => InteractionMask::NONE.0,
};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unknown interaction keyword: '{0}'")]
pub struct ParseInteractionMaskError(String);

impl FromStr for InteractionMask {
    type Err = ParseInteractionMaskError;

    /// Parses a whitespace- or comma-separated list of interaction keywords,
    /// OR-combining the selections (e.g. `"bond angle"`, `"nonbonded"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = InteractionMask::NONE;
        for word in s.split(|c: char| c == ',' || c.is_whitespace()) {
            if word.is_empty() {
                continue;
            }
            let bits = INTERACTION_KEYWORDS
                .get(word.to_ascii_lowercase().as_str())
                .ok_or_else(|| ParseInteractionMaskError(word.to_string()))?;
            mask.0 |= *bits;
        }
        Ok(mask)
    }
}

impl Serialize for InteractionMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InteractionMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_kind_mask_contains_only_that_kind() {
        let mask = InteractionMask::COULOMB;
        assert!(mask.contains(Interaction::Coulomb));
        assert!(!mask.contains(Interaction::Lj));
        assert!(!mask.contains(Interaction::Bond));
    }

    #[test]
    fn aggregate_masks_partition_all() {
        assert_eq!(
            InteractionMask::ALL_BONDED | InteractionMask::ALL_NONBONDED,
            InteractionMask::ALL
        );
        assert!(!InteractionMask::ALL_BONDED.intersects(InteractionMask::ALL_NONBONDED));
    }

    #[test]
    fn or_combination_accumulates_kinds() {
        let mut mask = InteractionMask::from(Interaction::Coulomb);
        mask |= Interaction::Lj.mask();
        assert_eq!(mask, InteractionMask::COULOMB | InteractionMask::LJ);
        assert_eq!(mask.kinds().count(), 2);
    }

    #[test]
    fn bits_are_stable_type_tags() {
        assert_eq!(InteractionMask::BOND.bits(), 1);
        assert_eq!(InteractionMask::ANGLE.bits(), 2);
        assert_eq!(InteractionMask::DIHEDRAL.bits(), 4);
        assert_eq!(InteractionMask::COULOMB.bits(), 16);
        assert_eq!(InteractionMask::LJ.bits(), 32);
    }

    #[test]
    fn parses_keyword_lists() {
        let mask: InteractionMask = "bond angle".parse().unwrap();
        assert_eq!(mask, InteractionMask::BOND | InteractionMask::ANGLE);
        let mask: InteractionMask = "nonbonded".parse().unwrap();
        assert_eq!(mask, InteractionMask::ALL_NONBONDED);
        let mask: InteractionMask = "All".parse().unwrap();
        assert_eq!(mask, InteractionMask::ALL);
    }

    #[test]
    fn parse_rejects_unknown_keyword() {
        let result = "bond torsion".parse::<InteractionMask>();
        assert_eq!(
            result,
            Err(ParseInteractionMaskError("torsion".to_string()))
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        for mask in [
            InteractionMask::BOND,
            InteractionMask::COULOMB | InteractionMask::LJ,
            InteractionMask::ALL,
            InteractionMask::NONE,
        ] {
            let rendered = mask.to_string();
            assert_eq!(rendered.parse::<InteractionMask>().unwrap(), mask);
        }
    }
}
