//! Rust AFQMC - phaseless auxiliary-field quantum Monte Carlo in Rust
//!
//! This crate propagates an ensemble of weighted Slater-determinant walkers
//! in imaginary time with the phaseless constraint, controls the walker
//! population and accumulates ground-state energy estimates. Electrons may
//! be coupled to quantized boson modes.

pub mod afqmc;
pub mod error;
pub mod estimators;
pub mod io;
pub mod linalg;
pub mod propagation;
pub mod provenance;
pub mod systems;
pub mod walkers;
pub mod wavefunction;

// Re-export commonly used types at crate root
pub use afqmc::{Afqmc, EnergySample, SimulationResult, WallTimings};
pub use error::{AfqmcError, Result};
pub use estimators::{block_average, BlockAnalysis, EnergyComponents, PropertyAccumulator, WindowEstimate};
pub use io::{AfqmcConfig, CheckpointHook, EnergyScheme, NoCheckpoint, PopControlScheme};
pub use propagation::{PhaselessUpdate, PropagationTimings, Propagator};
pub use provenance::ProvenanceLog;
pub use systems::{BosonCoupling, Hamiltonian};
pub use walkers::{PopulationControl, Walker, WalkerEnsemble};
pub use wavefunction::{SingleDeterminant, TrialWavefunction};

#[cfg(test)]
mod tests;
