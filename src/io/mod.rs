//! IO module - run configuration and checkpoint hooks.

mod checkpoint;
mod config;

pub use checkpoint::{CheckpointHook, NoCheckpoint};
pub use config::{AfqmcConfig, EnergyScheme, PopControlScheme};
