use crate::core::interactions::InteractionMask;
use crate::core::projection::Vector2Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Compatibility output cannot represent detailed pairwise interactions")]
    CompatWithDetailed,

    #[error("Virial stress output ({mode}) is only available for atom-based results")]
    VirialForResidues { mode: OutputMode },

    #[error("Output mode {mode} requires summed pairing")]
    RequiresSummed { mode: OutputMode },

    #[error("Time averaging is only available for scalar output, not {mode}")]
    TimeAveragingUnsupported { mode: OutputMode },

    #[error("Time averaging requires summed pairing")]
    TimeAveragingRequiresSummed,

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
}

/// The entity class a result store aggregates over. The atom-based and
/// residue-based pipelines are the same component instantiated twice; this
/// tag tells them apart in diagnostics and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityClass {
    Atoms,
    Residues,
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityClass::Atoms => f.write_str("atom-based"),
            EntityClass::Residues => f.write_str("residue-based"),
        }
    }
}

/// Global pairing mode: whether multiple interaction kinds for the same pair
/// stay distinguishable or merge into one vector with a kind bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnePair {
    Detailed,
    #[default]
    Summed,
}

/// The output encoding selected independently for atom-based and
/// residue-based results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// No output for this entity class; accumulation is skipped entirely.
    #[default]
    None,
    /// One line per pairwise record with the raw force components.
    PairwiseForcesVector,
    /// One line per pairwise record with the projected scalar force.
    PairwiseForcesScalar,
    /// One per-entity scalar per frame, each pairwise magnitude loading both
    /// endpoints.
    PunctualStress,
    /// Six virial stress tensor components per atom (atom-based only).
    VirialStress,
    /// The von Mises scalar of the virial stress per atom (atom-based only).
    VirialStressVonMises,
    /// The legacy half-matrix compatibility layout.
    CompatAscii,
}

impl OutputMode {
    pub fn is_active(self) -> bool {
        self != OutputMode::None
    }

    /// Whether this mode consumes pairwise (or punctual) force records, i.e.
    /// whether accumulation must run at all for the entity class.
    pub fn is_pairwise_or_punctual(self) -> bool {
        matches!(
            self,
            OutputMode::PairwiseForcesVector
                | OutputMode::PairwiseForcesScalar
                | OutputMode::PunctualStress
                | OutputMode::CompatAscii
        )
    }

    /// Whether this mode consumes the per-atom virial accumulator.
    pub fn is_virial(self) -> bool {
        matches!(
            self,
            OutputMode::VirialStress | OutputMode::VirialStressVonMises
        )
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputMode::None => "none",
            OutputMode::PairwiseForcesVector => "pairwise_forces_vector",
            OutputMode::PairwiseForcesScalar => "pairwise_forces_scalar",
            OutputMode::PunctualStress => "punctual_stress",
            OutputMode::VirialStress => "virial_stress",
            OutputMode::VirialStressVonMises => "virial_stress_von_mises",
            OutputMode::CompatAscii => "compat_ascii",
        };
        f.write_str(name)
    }
}

/// Configuration of one force distribution analysis run.
///
/// Loadable from TOML (every field optional, falling back to the defaults)
/// or assembled through [`FdaSettingsBuilder`]. Invalid mode combinations are
/// rejected by [`FdaSettings::validate`] before any simulation step runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FdaSettings {
    /// Interaction kinds to track; anything else is discarded before
    /// accumulation.
    pub interactions: InteractionMask,
    /// Pairing mode shared by the atom-based and residue-based stores.
    pub one_pair: OnePair,
    /// Output encoding for atom-based results.
    pub atom_based: OutputMode,
    /// Output encoding for residue-based results.
    pub residue_based: OutputMode,
    /// Vector-to-scalar reduction used by scalar and punctual-stress output.
    pub vector_to_scalar: Vector2Scalar,
    /// Number of steps per averaging window; 1 disables averaging, 0
    /// accumulates until the session is finalized.
    pub time_averaging_period: u32,
    /// Trim trailing zero columns from punctual-stress lines.
    pub no_end_zeros: bool,
}

impl Default for FdaSettings {
    fn default() -> Self {
        Self {
            interactions: InteractionMask::ALL,
            one_pair: OnePair::Summed,
            atom_based: OutputMode::None,
            residue_based: OutputMode::None,
            vector_to_scalar: Vector2Scalar::Norm,
            time_averaging_period: 1,
            no_end_zeros: false,
        }
    }
}

impl FdaSettings {
    pub fn builder() -> FdaSettingsBuilder {
        FdaSettingsBuilder::default()
    }

    /// Parses settings from a TOML document and validates them.
    pub fn from_toml_str(input: &str) -> Result<Self, SettingsError> {
        let settings: FdaSettings = toml::from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads and parses a TOML settings file.
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    /// Rejects mode combinations the output formats cannot represent.
    ///
    /// These are configuration mistakes, reported before the first step:
    /// compatibility output under detailed pairing, virial stress for
    /// residue-based results, punctual stress or virial output under detailed
    /// pairing, and time averaging with a non-scalar output mode.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (entity, mode) in [
            (EntityClass::Atoms, self.atom_based),
            (EntityClass::Residues, self.residue_based),
        ] {
            if mode == OutputMode::CompatAscii && self.one_pair == OnePair::Detailed {
                return Err(SettingsError::CompatWithDetailed);
            }
            if entity == EntityClass::Residues && mode.is_virial() {
                return Err(SettingsError::VirialForResidues { mode });
            }
            if self.one_pair == OnePair::Detailed
                && (mode == OutputMode::PunctualStress || mode.is_virial())
            {
                return Err(SettingsError::RequiresSummed { mode });
            }
            if self.time_averaging_period != 1
                && mode.is_active()
                && !matches!(
                    mode,
                    OutputMode::PairwiseForcesScalar | OutputMode::CompatAscii
                )
            {
                return Err(SettingsError::TimeAveragingUnsupported { mode });
            }
        }
        if self.time_averaging_period != 1 && self.one_pair == OnePair::Detailed {
            return Err(SettingsError::TimeAveragingRequiresSummed);
        }
        Ok(())
    }
}

/// Builder over the default settings, validating on [`FdaSettingsBuilder::build`].
#[derive(Debug, Default, Clone)]
pub struct FdaSettingsBuilder {
    settings: FdaSettings,
}

impl FdaSettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interactions(mut self, mask: InteractionMask) -> Self {
        self.settings.interactions = mask;
        self
    }

    pub fn one_pair(mut self, mode: OnePair) -> Self {
        self.settings.one_pair = mode;
        self
    }

    pub fn atom_based(mut self, mode: OutputMode) -> Self {
        self.settings.atom_based = mode;
        self
    }

    pub fn residue_based(mut self, mode: OutputMode) -> Self {
        self.settings.residue_based = mode;
        self
    }

    pub fn vector_to_scalar(mut self, v2s: Vector2Scalar) -> Self {
        self.settings.vector_to_scalar = v2s;
        self
    }

    pub fn time_averaging_period(mut self, period: u32) -> Self {
        self.settings.time_averaging_period = period;
        self
    }

    pub fn no_end_zeros(mut self, trim: bool) -> Self {
        self.settings.no_end_zeros = trim;
        self
    }

    pub fn build(self) -> Result<FdaSettings, SettingsError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
