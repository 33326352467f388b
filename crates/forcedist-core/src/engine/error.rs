use thiserror::Error;

use super::settings::{EntityClass, OnePair, OutputMode, SettingsError};
use crate::core::models::topology::TopologyError;

#[derive(Debug, Error)]
pub enum FdaError {
    #[error("Invalid settings: {source}")]
    Settings {
        #[from]
        source: SettingsError,
    },

    #[error("Invalid topology: {source}")]
    Topology {
        #[from]
        source: TopologyError,
    },

    #[error("Compatibility output requires identical monitored groups")]
    CompatGroupMismatch,

    #[error("{entity} output is configured as {mode} but no sink was provided")]
    MissingSink { entity: EntityClass, mode: OutputMode },

    #[error("{entity} output mode {mode} is not implemented for {one_pair:?} pairing")]
    UnsupportedOutput {
        entity: EntityClass,
        mode: OutputMode,
        one_pair: OnePair,
    },

    #[error("I/O error while writing results: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
