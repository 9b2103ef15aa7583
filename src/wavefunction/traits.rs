//! Trial wavefunction interface used for importance sampling.
//!
//! A trial state is a set of occupied-orbital coefficient matrices psi_s
//! (norb x nocc, one per spin component). For a walker phi the mixed
//! Green's function is G_s = Theta_s psi_s^H with Theta_s = phi_s (psi_s^H phi_s)^-1,
//! so that tr(A G_s) = tr(psi_s^H A Theta_s) only needs the half-rotated
//! operator psi_s^H A.

use num_complex::Complex64;

use crate::error::Result;
use crate::linalg::{CMatrix, CVector, ONE};
use crate::systems::BosonCoupling;
use crate::walkers::Walker;

/// Walker-trial overlap together with the Theta matrices.
#[derive(Debug, Clone)]
pub struct MixedGreens {
    /// Theta_s = phi_s (psi_s^H phi_s)^-1, norb x nocc
    pub theta: Vec<CMatrix>,
    /// <Psi_T|phi>, fermionic part only
    pub ovlp: Complex64,
}

pub trait TrialWavefunction: Sync {
    /// Number of spin components (1 = closed-shell restricted, 2 = unrestricted).
    fn ncomponents(&self) -> usize;

    /// Occupied coefficients of spin component `s`.
    fn psi(&self, s: usize) -> &CMatrix;

    /// Coherent-state trial of each boson mode; empty without bosons.
    fn boson_trial(&self) -> &[CVector] {
        &[]
    }

    /// Prepare the boson part of the trial from the electronic density.
    /// Trials without a boson part leave it empty.
    fn initialize_boson_trial(&mut self, _bosons: &BosonCoupling) -> Result<()> {
        Ok(())
    }

    fn norb(&self) -> usize {
        self.psi(0).nrows()
    }

    fn nocc(&self, s: usize) -> usize {
        self.psi(s).ncols()
    }

    /// Multiplicity of each component: a restricted matrix stands for both spins.
    fn spin_degeneracy(&self) -> f64 {
        if self.ncomponents() == 1 { 2.0 } else { 1.0 }
    }

    /// Mixed Green's function of a walker, `None` if psi^H phi is singular.
    fn mixed_greens(&self, phi: &[CMatrix]) -> Option<MixedGreens> {
        let deg = self.spin_degeneracy() as i32;
        let mut ovlp = ONE;
        let mut theta = Vec::with_capacity(phi.len());
        for (s, phi_s) in phi.iter().enumerate() {
            let smat = self.psi(s).adjoint() * phi_s;
            let det = smat.determinant();
            if det.norm() == 0.0 || !det.is_finite() {
                return None;
            }
            let inv = smat.try_inverse()?;
            ovlp *= det.powi(deg);
            theta.push(phi_s * inv);
        }
        Some(MixedGreens { theta, ovlp })
    }

    /// Fermionic overlap <Psi_T|phi>.
    fn overlap(&self, phi: &[CMatrix]) -> Complex64 {
        let deg = self.spin_degeneracy() as i32;
        phi.iter()
            .enumerate()
            .map(|(s, phi_s)| (self.psi(s).adjoint() * phi_s).determinant().powi(deg))
            .product()
    }

    /// Bosonic overlap prod_v <chi_T,v|chi_v>.
    fn boson_overlap(&self, chi: &[CVector]) -> Complex64 {
        self.boson_trial()
            .iter()
            .zip(chi.iter())
            .map(|(t, c)| t.dotc(c))
            .product()
    }

    /// One-body density of the trial itself, psi (psi^H psi)^-1 psi^H.
    fn density(&self, s: usize) -> Option<CMatrix> {
        let psi = self.psi(s);
        let inv = (psi.adjoint() * psi).try_inverse()?;
        Some(psi * inv * psi.adjoint())
    }

    /// psi_s^H A for every operator, indexed [s][n].
    fn half_rotate(&self, ops: &[CMatrix]) -> Vec<Vec<CMatrix>> {
        (0..self.ncomponents())
            .map(|s| {
                let psi_h = self.psi(s).adjoint();
                ops.iter().map(|op| &psi_h * op).collect()
            })
            .collect()
    }

    /// Refresh the stored overlap of every walker.
    fn ovlp_with_walkers(&self, walkers: &mut [Walker]) {
        for walker in walkers.iter_mut() {
            walker.ovlp = self.overlap(&walker.phi) * self.boson_overlap(&walker.boson);
        }
    }
}
