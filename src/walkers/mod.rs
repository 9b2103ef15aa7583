//! Walkers module - the weighted determinant population and its control.

mod ensemble;
pub mod population;
mod walker;

pub use ensemble::WalkerEnsemble;
pub use population::PopulationControl;
pub use walker::Walker;
