//! Phaseless propagation of coupled electron-boson walkers.
//!
//! The dipole self-energy 1/2 (g_v . rho)^2 is absorbed into the auxiliary
//! fields (each g_v becomes an extra field, 1/2 g_v g_v is added to h1e so the
//! -1/2 L L term cancels). The bilinear coupling is propagated with mixed
//! mean-field estimates taken before each step:
//! exp(-dt <G_v> (a_v + a+_v)) on the bosons and
//! exp(-dt sum_v <a_v + a+_v> geb_v) on the electrons, with geb_v = sqrt(w_v/2) g_v.

use nalgebra::DVector;
use num_complex::Complex64;

use super::phaseless::StepExtension;
use crate::error::{AfqmcError, Result};
use crate::estimators::EnergyComponents;
use crate::linalg::{trace_product, CMatrix, CVector, ZERO};
use crate::systems::BosonCoupling;
use crate::walkers::Walker;
use crate::wavefunction::{MixedGreens, TrialWavefunction};

/// Fields with a smaller norm carry no dipole self-energy worth sampling.
const FIELD_NORM_CUTOFF: f64 = 1e-10;

/// One truncated boson mode.
#[derive(Debug, Clone)]
pub(crate) struct BosonMode {
    pub freq: f64,
    /// Occupation numbers 0..nstates
    pub number: DVector<f64>,
    /// exp(-dt/2 w n) on the diagonal
    half_step: CVector,
    /// a + a+
    pub displacement: CMatrix,
}

impl BosonMode {
    fn new(freq: f64, nstates: usize, dt: f64) -> Self {
        let number = DVector::from_fn(nstates, |n, _| n as f64);
        let half_step = number.map(|n| Complex64::new((-0.5 * dt * freq * n).exp(), 0.0));
        let displacement = CMatrix::from_fn(nstates, nstates, |i, j| {
            if i + 1 == j {
                Complex64::new((j as f64).sqrt(), 0.0)
            } else if j + 1 == i {
                Complex64::new((i as f64).sqrt(), 0.0)
            } else {
                ZERO
            }
        });
        Self { freq, number, half_step, displacement }
    }
}

/// Additional one-body matrices and fields for the Pauli-Fierz Hamiltonian.
pub(crate) fn dressed_integrals(
    h1e: &[CMatrix],
    chol: &[CMatrix],
    bosons: &BosonCoupling,
) -> (Vec<CMatrix>, Vec<CMatrix>) {
    let norb = h1e[0].nrows();
    let mut dse = CMatrix::zeros(norb, norb);
    let mut fields = chol.to_vec();
    for g in bosons.gmat.iter() {
        dse += g * g * Complex64::new(0.5, 0.0);
        if g.norm() > FIELD_NORM_CUTOFF {
            fields.push(g.clone());
        }
    }
    let h1e = h1e.iter().map(|h| h + &dse).collect();
    (h1e, fields)
}

/// Mixed estimates of one walker before the step.
#[derive(Debug, Clone)]
pub(crate) struct ModeEstimates {
    /// <G_v> = deg sum_s tr(psi_s^H geb_v Theta_s)
    coupling: Vec<Complex64>,
    /// <a_v + a+_v>
    displacement: Vec<Complex64>,
}

#[derive(Debug, Clone)]
pub(crate) struct BosonExtension {
    dt: f64,
    deg: f64,
    modes: Vec<BosonMode>,
    geb: Vec<CMatrix>,
    /// psi_s^H geb_v, indexed [s][v]
    rgeb: Vec<Vec<CMatrix>>,
    boson_trial: Vec<CVector>,
}

impl BosonExtension {
    pub fn new<T: TrialWavefunction>(bosons: &BosonCoupling, trial: &T, dt: f64) -> Result<Self> {
        let boson_trial = trial.boson_trial().to_vec();
        let shapes_match = boson_trial.len() == bosons.nmodes()
            && boson_trial.iter().zip(&bosons.nboson_states).all(|(chi, &n)| chi.len() == n);
        if !shapes_match {
            return Err(AfqmcError::ShapeMismatch {
                what: "boson trial".into(),
                expected: format!("Fock states {:?}", bosons.nboson_states),
                found: format!("{:?}", boson_trial.iter().map(|c| c.len()).collect::<Vec<_>>()),
            });
        }

        let geb: Vec<CMatrix> = bosons
            .gmat
            .iter()
            .zip(&bosons.freq)
            .map(|(g, w)| g * Complex64::new((0.5 * w).sqrt(), 0.0))
            .collect();
        let rgeb = trial.half_rotate(&geb);
        let modes = bosons
            .freq
            .iter()
            .zip(&bosons.nboson_states)
            .map(|(&w, &n)| BosonMode::new(w, n, dt))
            .collect();

        Ok(Self { dt, deg: trial.spin_degeneracy(), modes, geb, rgeb, boson_trial })
    }

    fn coupling(&self, greens: &MixedGreens) -> Vec<Complex64> {
        (0..self.modes.len())
            .map(|v| {
                self.rgeb
                    .iter()
                    .zip(&greens.theta)
                    .map(|(r, t)| trace_product(&r[v], t))
                    .sum::<Complex64>()
                    * self.deg
            })
            .collect()
    }

    /// <chi_T|op|chi> / <chi_T|chi> per mode.
    fn mixed(&self, walker: &Walker, op: impl Fn(&BosonMode, &CVector) -> CVector) -> Vec<Complex64> {
        self.modes
            .iter()
            .zip(&self.boson_trial)
            .zip(&walker.boson)
            .map(|((mode, trial), chi)| {
                let ovlp = trial.dotc(chi);
                if ovlp.norm() == 0.0 {
                    return ZERO;
                }
                trial.dotc(&op(mode, chi)) / ovlp
            })
            .collect()
    }

    fn displacement(&self, walker: &Walker) -> Vec<Complex64> {
        self.mixed(walker, |mode, chi| &mode.displacement * chi)
    }
}

impl StepExtension for BosonExtension {
    type Estimates = ModeEstimates;

    fn pre_step(&self, walker: &Walker, greens: &MixedGreens) -> ModeEstimates {
        ModeEstimates {
            coupling: self.coupling(greens),
            displacement: self.displacement(walker),
        }
    }

    fn post_step(&self, walker: &mut Walker, estimates: &ModeEstimates) {
        for ((mode, chi), g) in self.modes.iter().zip(walker.boson.iter_mut()).zip(&estimates.coupling) {
            let bilinear = (&mode.displacement * (-*g * self.dt)).exp();
            let half = chi.component_mul(&mode.half_step);
            *chi = (bilinear * half).component_mul(&mode.half_step);
        }

        let norb = walker.phi[0].nrows();
        let mut op = CMatrix::zeros(norb, norb);
        for (geb, x) in self.geb.iter().zip(&estimates.displacement) {
            op += geb * (-*x * self.dt);
        }
        let propagator = op.exp();
        for phi in walker.phi.iter_mut() {
            *phi = &propagator * &*phi;
        }
    }

    fn energy(&self, walker: &Walker, greens: &MixedGreens) -> EnergyComponents {
        let occupation = self.mixed(walker, |mode, chi| {
            chi.component_mul(&mode.number.map(|n| Complex64::new(n, 0.0)))
        });
        let boson: Complex64 = self.modes.iter().zip(&occupation).map(|(m, n)| *n * m.freq).sum();
        let bilinear: Complex64 = self
            .coupling(greens)
            .iter()
            .zip(self.displacement(walker))
            .map(|(g, x)| *g * x)
            .sum();
        EnergyComponents { boson, bilinear, ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::models;
    use crate::wavefunction::{coherent_state, SingleDeterminant};
    use approx::assert_relative_eq;

    #[test]
    fn test_ladder_operator_matrix() {
        let mode = BosonMode::new(1.0, 4, 0.01);
        assert_relative_eq!(mode.displacement[(0, 1)].re, 1.0);
        assert_relative_eq!(mode.displacement[(2, 1)].re, 2f64.sqrt());
        assert_relative_eq!(mode.displacement[(2, 3)].re, 3f64.sqrt());
        assert_eq!(mode.displacement[(0, 2)], ZERO);
        assert_relative_eq!(mode.half_step[2].re, (-0.01f64).exp());
    }

    #[test]
    fn test_dressed_integrals_add_dse_and_fields() {
        let ham = models::cavity_dimer(0.5, 1.0, 0.2, 3);
        let bosons = ham.bosons.as_ref().unwrap();
        let (h1e, fields) = dressed_integrals(&ham.h1e, &ham.chol, bosons);
        assert_eq!(fields.len(), ham.chol.len() + 1);
        // 1/2 g g = 1/2 lambda^2 on the diagonal
        assert_relative_eq!((h1e[0][(0, 0)] - ham.h1e[0][(0, 0)]).re, 0.02, epsilon = 1e-14);

        let uncoupled = models::cavity_dimer(0.5, 1.0, 0.0, 3);
        let (h1e, fields) = dressed_integrals(&uncoupled.h1e, &uncoupled.chol, uncoupled.bosons.as_ref().unwrap());
        assert_eq!(fields.len(), uncoupled.chol.len());
        assert_eq!(h1e[0], uncoupled.h1e[0]);
    }

    #[test]
    fn test_coherent_state_mixed_estimates() {
        let ham = models::cavity_dimer(0.5, 2.0, 0.2, 12);
        let mut trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
        let bosons = ham.bosons.as_ref().unwrap();
        trial.initialize_boson_trial(bosons).unwrap();
        let ext = BosonExtension::new(bosons, &trial, 0.01).unwrap();

        let z = 0.25;
        let phi = vec![trial.psi(0).clone()];
        let walker = Walker::new(phi, vec![coherent_state(Complex64::new(z, 0.0), 12)], ZERO);
        let x = ext.displacement(&walker);
        // <0|(a + a+)|z> / <0|z> = z
        assert_relative_eq!(x[0].re, z, epsilon = 1e-10);

        let greens = trial.mixed_greens(&walker.phi).unwrap();
        let energy = ext.energy(&walker, &greens);
        // <0|n|z> = 0 and the symmetric dipole has <G> = 0
        assert_relative_eq!(energy.boson.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(energy.bilinear.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mismatched_boson_trial_rejected() {
        let ham = models::cavity_dimer(0.5, 1.0, 0.2, 3);
        let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
        let result = BosonExtension::new(ham.bosons.as_ref().unwrap(), &trial, 0.01);
        assert!(matches!(result, Err(AfqmcError::ShapeMismatch { .. })));
    }
}
