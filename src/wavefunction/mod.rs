//! Wavefunction module - trial states used for importance sampling.

mod slater;
mod traits;

pub use slater::{coherent_state, SingleDeterminant};
pub use traits::{MixedGreens, TrialWavefunction};
