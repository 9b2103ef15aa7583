//! Single Slater determinant trial state.

use nalgebra::SymmetricEigen;
use num_complex::Complex64;

use super::traits::TrialWavefunction;
use crate::error::{AfqmcError, Result};
use crate::linalg::{trace_product, CMatrix, CVector};
use crate::systems::{BosonCoupling, Hamiltonian};

/// Coherent shifts far outside [0, 1] are not variationally meaningful.
const COUPLING_VAR_BOUNDS: (f64, f64) = (-0.05, 1.05);

/// Reference determinant, optionally dressed with one coherent state per boson mode.
#[derive(Debug, Clone)]
pub struct SingleDeterminant {
    psi: Vec<CMatrix>,
    boson: Vec<CVector>,
}

impl SingleDeterminant {
    /// Wrap precomputed occupied coefficients (one matrix per spin component).
    pub fn new(psi: Vec<CMatrix>) -> Result<Self> {
        if psi.is_empty() || psi.len() > 2 {
            return Err(AfqmcError::ShapeMismatch {
                what: "trial".into(),
                expected: "1 or 2 spin components".into(),
                found: format!("{}", psi.len()),
            });
        }
        let norb = psi[0].nrows();
        for (s, c) in psi.iter().enumerate() {
            if c.nrows() != norb || c.ncols() == 0 || c.ncols() > norb {
                return Err(AfqmcError::ShapeMismatch {
                    what: format!("trial[{s}]"),
                    expected: format!("{norb} x (1..={norb})"),
                    found: format!("{}x{}", c.nrows(), c.ncols()),
                });
            }
            let det = (c.adjoint() * c).determinant();
            if !(det.norm() > 1e-12) {
                return Err(AfqmcError::SingularTrial(s));
            }
        }
        Ok(Self { psi, boson: Vec::new() })
    }

    /// Fill the lowest eigenvectors of each one-body matrix.
    pub fn aufbau(ham: &Hamiltonian, nocc: &[usize]) -> Result<Self> {
        if nocc.len() != ham.ncomponents() {
            return Err(AfqmcError::ShapeMismatch {
                what: "occupation".into(),
                expected: format!("{} spin components", ham.ncomponents()),
                found: format!("{}", nocc.len()),
            });
        }
        let psi = ham
            .h1e
            .iter()
            .zip(nocc.iter())
            .map(|(h, &n)| lowest_eigenvectors(h, n))
            .collect();
        Self::new(psi)
    }
}

impl TrialWavefunction for SingleDeterminant {
    fn ncomponents(&self) -> usize {
        self.psi.len()
    }

    fn psi(&self, s: usize) -> &CMatrix {
        &self.psi[s]
    }

    fn boson_trial(&self) -> &[CVector] {
        &self.boson
    }

    /// Coherent state |z_v> per mode with z_v = -f_v <G_v>_T / w_v.
    ///
    /// <G_v>_T is the trial expectation of sqrt(w_v/2) g_v . rho and f_v the
    /// variational fraction `coupling_var`.
    fn initialize_boson_trial(&mut self, bosons: &BosonCoupling) -> Result<()> {
        let deg = self.spin_degeneracy();
        let mut densities = Vec::with_capacity(self.ncomponents());
        for s in 0..self.ncomponents() {
            densities.push(self.density(s).ok_or(AfqmcError::SingularTrial(s))?);
        }

        self.boson = (0..bosons.nmodes())
            .map(|v| {
                let f = bosons.coupling_var[v];
                if f < COUPLING_VAR_BOUNDS.0 || f > COUPLING_VAR_BOUNDS.1 {
                    tracing::warn!("coupling_var[{}] = {} is outside [0, 1]", v, f);
                }
                let w = bosons.freq[v];
                let scale = Complex64::new(deg * (0.5 * w).sqrt(), 0.0);
                let g_mean: Complex64 = densities
                    .iter()
                    .map(|rho| trace_product(&bosons.gmat[v], rho))
                    .sum::<Complex64>()
                    * scale;
                let z = -g_mean * f / w;
                tracing::debug!("boson mode {}: coherent shift z = {:.6}", v, z);
                coherent_state(z, bosons.nboson_states[v])
            })
            .collect();
        Ok(())
    }
}

fn lowest_eigenvectors(h: &CMatrix, n: usize) -> CMatrix {
    let eigen = SymmetricEigen::new(h.clone());
    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let cols: Vec<_> = order.iter().take(n).map(|&k| eigen.eigenvectors.column(k)).collect();
    CMatrix::from_columns(&cols)
}

/// Truncated, renormalized coherent state e^{-|z|^2/2} z^n / sqrt(n!).
pub fn coherent_state(z: Complex64, nstates: usize) -> CVector {
    let mut amp = CVector::zeros(nstates);
    let mut term = Complex64::new((-0.5 * z.norm_sqr()).exp(), 0.0);
    for n in 0..nstates {
        amp[n] = term;
        term *= z / ((n + 1) as f64).sqrt();
    }
    let norm = amp.norm();
    amp / Complex64::new(norm, 0.0)
}
