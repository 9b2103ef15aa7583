//! Checkpoint hook invoked by the driver loop.
//!
//! The on-disk format belongs to whoever implements the hook; the driver only
//! decides when it is called.

use crate::error::Result;
use crate::walkers::WalkerEnsemble;

pub trait CheckpointHook {
    /// Called after the accumulation phase of `step` when
    /// `(step + 1) % checkpoint_freq == 0`.
    fn save(&mut self, step: usize, walkers: &WalkerEnsemble, eshift: f64) -> Result<()>;
}

/// Hook that does nothing, used when no checkpointing is requested.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCheckpoint;

impl CheckpointHook for NoCheckpoint {
    fn save(&mut self, _step: usize, _walkers: &WalkerEnsemble, _eshift: f64) -> Result<()> {
        Ok(())
    }
}
