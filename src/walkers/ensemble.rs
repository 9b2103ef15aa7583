//! Fixed-size walker population and its re-orthogonalization.

use num_complex::Complex64;
use rayon::prelude::*;

use super::walker::Walker;
use crate::linalg::{qr_ortho, ZERO};
use crate::wavefunction::TrialWavefunction;

#[derive(Debug, Clone)]
pub struct WalkerEnsemble {
    pub walkers: Vec<Walker>,
    /// Spin multiplicity of each coefficient matrix (2 for restricted walkers)
    deg: f64,
}

impl WalkerEnsemble {
    /// `nwalkers` copies of the trial state, each with weight 1.
    pub fn new<T: TrialWavefunction>(trial: &T, nwalkers: usize) -> Self {
        let phi: Vec<_> = (0..trial.ncomponents()).map(|s| trial.psi(s).clone()).collect();
        let boson = trial.boson_trial().to_vec();
        let mut walkers = vec![Walker::new(phi, boson, ZERO); nwalkers];
        trial.ovlp_with_walkers(&mut walkers);
        Self { walkers, deg: trial.spin_degeneracy() }
    }

    pub fn len(&self) -> usize {
        self.walkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walkers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Walker> {
        self.walkers.iter()
    }

    pub fn spin_degeneracy(&self) -> f64 {
        self.deg
    }

    pub fn total_weight(&self) -> f64 {
        self.walkers.iter().map(|w| w.weight).sum()
    }

    pub fn total_unscaled_weight(&self) -> f64 {
        self.walkers.iter().map(|w| w.unscaled_weight).sum()
    }

    pub fn num_alive(&self) -> usize {
        self.walkers.iter().filter(|w| w.is_alive()).count()
    }

    /// QR-orthonormalize every live walker.
    ///
    /// The removed norm deg * sum ln|R_ii| goes into `log_det` and the stored
    /// overlap is divided by its exponential. Boson states are renormalized
    /// to unit norm with the same bookkeeping.
    pub fn orthogonalization(&mut self) {
        let deg = self.deg;
        self.walkers.par_iter_mut().filter(|w| w.is_alive()).for_each(|walker| {
            let mut log_det = 0.0;
            for phi in walker.phi.iter_mut() {
                let (q, ld) = qr_ortho(phi);
                *phi = q;
                log_det += deg * ld;
            }
            for chi in walker.boson.iter_mut() {
                let norm = chi.norm();
                if norm > 0.0 {
                    *chi /= Complex64::new(norm, 0.0);
                    log_det += norm.ln();
                }
            }
            walker.log_det += log_det;
            walker.ovlp /= log_det.exp();
        });
    }
}
