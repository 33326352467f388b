//! # Engine Module
//!
//! The stateful layer of force distribution analysis, owned by a single
//! simulation run and driven synchronously by the host's force-evaluation
//! step. No internal threading, no suspension points; every call runs to
//! completion before returning, and all state is exclusively owned by one
//! [`FdaSession`].
//!
//! ## Architecture
//!
//! - **Session** ([`session`]) - The [`FdaSession`] entry point: interaction
//!   filtering, pair canonicalization, routing into the atom- and
//!   residue-based stores, frame lifecycle, and time averaging
//! - **Configuration** ([`settings`]) - Settings struct, builder, TOML loading,
//!   and the configuration-incompatibility validation
//! - **Force Stores** ([`store`]) - Detailed, summed, and scalar pairwise
//!   force records keyed by entity and partner index
//! - **Virial Accumulation** ([`virial`]) - Per-atom symmetric stress tensors
//!   with fixed per-interaction distribution weights
//! - **Residue Centers of Mass** ([`com`]) - Mass-weighted residue positions
//!   for residue-based aggregation
//! - **Frame Writing** ([`writer`]) - Serialization of accumulated state into
//!   the plain-text output encodings
//! - **Error Handling** ([`error`]) - The engine-level error type

pub mod com;
pub mod error;
pub mod session;
pub mod settings;
pub mod store;
pub mod virial;
pub mod writer;

pub use error::FdaError;
pub use session::FdaSession;
pub use settings::{EntityClass, FdaSettings, FdaSettingsBuilder, OnePair, OutputMode};
