//! # Core Module
//!
//! Stateless building blocks for force distribution analysis. Everything in
//! this layer is a pure data type or a pure function: no accumulation state,
//! no I/O handles, no frame lifecycle.
//!
//! ## Architecture
//!
//! - **Interaction Tags** ([`interactions`]) - Interaction kinds and the bit-mask
//!   sets used for filtering and per-record type bookkeeping
//! - **Pair Canonicalization** ([`pairs`]) - The ordered-pair convention that
//!   removes sign ambiguity and duplicate storage
//! - **Force Decomposition** ([`decompose`]) - The pairwise splitting algebra for
//!   angle and dihedral multi-body forces
//! - **Virial Tensors** ([`tensor`]) - Symmetric 3x3 tensors with the von Mises
//!   reduction
//! - **Scalar Projections** ([`projection`]) - Vector-to-scalar reductions for
//!   scalar and punctual-stress output
//! - **Periodic Boundaries** ([`pbc`]) - Minimum-image displacement in triclinic
//!   boxes
//! - **Topology View** ([`models`]) - Masses, residue mapping, and monitored
//!   group membership as flat per-atom tables

pub mod decompose;
pub mod interactions;
pub mod models;
pub mod pairs;
pub mod pbc;
pub mod projection;
pub mod tensor;
