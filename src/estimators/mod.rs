//! Estimators module - energies, the windowed accumulator and blocking analysis.

mod accumulator;
pub mod analysis;
mod energy;

pub use accumulator::{PropertyAccumulator, WindowEstimate};
pub use analysis::{block_average, BlockAnalysis};
pub use energy::{electronic_energy, EnergyComponents};
