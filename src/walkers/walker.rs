use num_complex::Complex64;

use crate::linalg::{CMatrix, CVector, ZERO};

/// One weighted Slater determinant (plus boson state) in the random walk.
#[derive(Debug, Clone)]
pub struct Walker {
    /// Orbital coefficients per spin component, norb x nocc
    pub phi: Vec<CMatrix>,
    /// Fock-space amplitudes per boson mode
    pub boson: Vec<CVector>,
    pub weight: f64,
    /// Weight before the last branching rescale
    pub unscaled_weight: f64,
    /// Accumulated log|R| removed by orthogonalization
    pub log_det: f64,
    /// <Psi_T|phi>, kept consistent with the normalization of phi
    pub ovlp: Complex64,
    pub ehybrid: Complex64,
    pub eloc: Complex64,
}

impl Walker {
    pub fn new(phi: Vec<CMatrix>, boson: Vec<CVector>, ovlp: Complex64) -> Self {
        Self {
            phi,
            boson,
            weight: 1.0,
            unscaled_weight: 1.0,
            log_det: 0.0,
            ovlp,
            ehybrid: ZERO,
            eloc: ZERO,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.weight > 0.0
    }

    /// Zero the weight and energies so the walker drops out of every sum.
    pub fn kill(&mut self) {
        self.weight = 0.0;
        self.unscaled_weight = 0.0;
        self.ehybrid = ZERO;
        self.eloc = ZERO;
    }
}
