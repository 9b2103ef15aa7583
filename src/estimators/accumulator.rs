//! Windowed accumulation of ensemble weights and energies, and the
//! energy-shift feedback derived from it.

use num_complex::Complex64;
use serde::Serialize;

use crate::linalg::ZERO;
use crate::walkers::WalkerEnsemble;

const WEIGHT: usize = 0;
const UNSCALED_WEIGHT: usize = 1;
const EHYBRID: usize = 2;
const ELOCAL: usize = 3;

/// Averages over one accumulation window.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct WindowEstimate {
    /// Total weight averaged over the steps of the window
    pub weight: f64,
    pub unscaled_weight: f64,
    pub ehybrid: Complex64,
    pub elocal: Complex64,
}

#[derive(Debug, Clone)]
pub struct PropertyAccumulator {
    freq: usize,
    buffer: [Complex64; 4],
    eshift: f64,
}

impl PropertyAccumulator {
    pub fn new(property_calc_freq: usize) -> Self {
        Self { freq: property_calc_freq, buffer: [ZERO; 4], eshift: 0.0 }
    }

    pub fn eshift(&self) -> f64 {
        self.eshift
    }

    /// Seed the shift from the ensemble before the first step.
    pub fn initialize(&mut self, walkers: &WalkerEnsemble) -> f64 {
        let total = walkers.total_weight();
        if total > 0.0 {
            let weighted: Complex64 = walkers.iter().map(|w| w.ehybrid * w.weight).sum();
            self.eshift = weighted.re / total;
        }
        self.buffer = [ZERO; 4];
        tracing::debug!("initial energy shift {:.8}", self.eshift);
        self.eshift
    }

    fn stack(&mut self, walkers: &WalkerEnsemble) {
        for walker in walkers.iter() {
            self.buffer[WEIGHT] += walker.weight;
            self.buffer[UNSCALED_WEIGHT] += walker.unscaled_weight;
            self.buffer[EHYBRID] += walker.ehybrid * walker.weight;
            self.buffer[ELOCAL] += walker.eloc * walker.weight;
        }
    }

    /// Add the ensemble at `step` to the window; on the last step of a
    /// window return its averages, update eshift and start a new window.
    pub fn property_stack(&mut self, walkers: &WalkerEnsemble, step: usize) -> Option<WindowEstimate> {
        self.stack(walkers);
        if (step + 1) % self.freq != 0 {
            return None;
        }

        let weight = self.buffer[WEIGHT].re;
        let steps = self.freq as f64;
        let estimate = if weight > 0.0 {
            let estimate = WindowEstimate {
                weight: weight / steps,
                unscaled_weight: self.buffer[UNSCALED_WEIGHT].re / steps,
                ehybrid: self.buffer[EHYBRID] / weight,
                elocal: self.buffer[ELOCAL] / weight,
            };
            self.eshift = estimate.ehybrid.re;
            estimate
        } else {
            tracing::warn!("step {}: no weight left in the accumulation window", step);
            WindowEstimate { weight: 0.0, unscaled_weight: 0.0, ehybrid: ZERO, elocal: ZERO }
        };
        self.buffer = [ZERO; 4];
        Some(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::models;
    use crate::wavefunction::SingleDeterminant;
    use approx::assert_relative_eq;

    fn ensemble(energies: &[(f64, f64)]) -> WalkerEnsemble {
        let ham = models::tight_binding_dimer(0.5);
        let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
        let mut walkers = WalkerEnsemble::new(&trial, energies.len());
        for (walker, &(w, e)) in walkers.walkers.iter_mut().zip(energies) {
            walker.weight = w;
            walker.unscaled_weight = 2.0 * w;
            walker.ehybrid = Complex64::new(e, 0.1);
            walker.eloc = Complex64::new(e - 0.5, 0.0);
        }
        walkers
    }

    #[test]
    fn test_initial_shift_is_weighted_hybrid_energy() {
        let walkers = ensemble(&[(1.0, -1.0), (3.0, -2.0)]);
        let mut acc = PropertyAccumulator::new(5);
        assert_relative_eq!(acc.initialize(&walkers), -1.75);
        assert_relative_eq!(acc.eshift(), -1.75);
    }

    #[test]
    fn test_window_averages_and_shift_update() {
        let walkers = ensemble(&[(1.0, -1.0), (3.0, -2.0)]);
        let mut acc = PropertyAccumulator::new(3);
        acc.initialize(&walkers);
        assert!(acc.property_stack(&walkers, 0).is_none());
        assert!(acc.property_stack(&walkers, 1).is_none());
        let estimate = acc.property_stack(&walkers, 2).unwrap();
        assert_relative_eq!(estimate.weight, 4.0);
        assert_relative_eq!(estimate.unscaled_weight, 8.0);
        assert_relative_eq!(estimate.ehybrid.re, -1.75);
        assert_relative_eq!(estimate.ehybrid.im, 0.1);
        assert_relative_eq!(estimate.elocal.re, -2.25);
        assert_relative_eq!(acc.eshift(), -1.75);
    }

    #[test]
    fn test_buffer_resets_between_windows() {
        let mut acc = PropertyAccumulator::new(2);
        let first = ensemble(&[(1.0, -1.0)]);
        let second = ensemble(&[(2.0, -3.0)]);
        acc.property_stack(&first, 0);
        acc.property_stack(&first, 1).unwrap();
        acc.property_stack(&second, 2);
        let estimate = acc.property_stack(&second, 3).unwrap();
        assert_relative_eq!(estimate.weight, 2.0);
        assert_relative_eq!(estimate.ehybrid.re, -3.0);
        assert_relative_eq!(acc.eshift(), -3.0);
    }
}
