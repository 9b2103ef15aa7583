//! Systems module - Hamiltonian data and closed-form model systems.

mod hamiltonian;
pub mod models;

pub use hamiltonian::{BosonCoupling, Hamiltonian};
