//! Phaseless propagation of determinant walkers.
//!
//! One step applies B = exp(-dt/2 h') exp(i sqrt(dt) sum_n (x_n - xbar_n) L_n) exp(-dt/2 h')
//! with h' = h - 1/2 sum_n L_n L_n + sum_n vbar_n L_n, the two-body factor
//! expanded as a truncated Taylor series.

use std::time::Instant;

use nalgebra::DVector;
use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use super::weight::{phaseless_update, StepFactors, UpdateParams};
use super::PropagationTimings;
use crate::error::{AfqmcError, Result};
use crate::estimators::{electronic_energy, EnergyComponents};
use crate::io::{AfqmcConfig, EnergyScheme};
use crate::linalg::{apply_taylor, trace_product, CMatrix, I, ZERO};
use crate::walkers::{Walker, WalkerEnsemble};
use crate::wavefunction::{MixedGreens, TrialWavefunction};

/// Work the electron-boson variant adds around the fermionic step.
pub(crate) trait StepExtension: Sync {
    /// Mixed estimates taken before the step.
    type Estimates: Send + Sync;

    fn pre_step(&self, walker: &Walker, greens: &MixedGreens) -> Self::Estimates;

    fn post_step(&self, walker: &mut Walker, estimates: &Self::Estimates);

    /// Contributions beyond the electronic energy.
    fn energy(&self, walker: &Walker, greens: &MixedGreens) -> EnergyComponents;
}

impl StepExtension for () {
    type Estimates = ();

    fn pre_step(&self, _walker: &Walker, _greens: &MixedGreens) {}

    fn post_step(&self, _walker: &mut Walker, _estimates: &()) {}

    fn energy(&self, _walker: &Walker, _greens: &MixedGreens) -> EnergyComponents {
        EnergyComponents::default()
    }
}

/// Tables shared by both propagator variants, built once per run.
#[derive(Debug, Clone)]
pub(crate) struct PhaselessCore {
    pub dt: f64,
    sqrt_dt: f64,
    taylor_order: usize,
    scheme: EnergyScheme,
    pub deg: f64,
    pub ecore: f64,
    /// E_core - 1/2 sum_n vbar_n^2
    pub energy_offset: f64,
    fields: Vec<CMatrix>,
    /// Mean-field shift vbar_n = deg sum_s tr(L_n G_T,s)
    pub vbar: Vec<f64>,
    exp_h1e: Vec<CMatrix>,
    rh1: Vec<CMatrix>,
    rchol: Vec<Vec<CMatrix>>,
    pub timings: PropagationTimings,
}

impl PhaselessCore {
    /// `h1e` and `fields` are the one-body matrices and auxiliary fields
    /// actually propagated, which may extend the bare Hamiltonian.
    pub fn build<T: TrialWavefunction>(
        h1e: Vec<CMatrix>,
        fields: Vec<CMatrix>,
        ecore: f64,
        trial: &T,
        config: &AfqmcConfig,
    ) -> Result<Self> {
        let deg = trial.spin_degeneracy();
        let mut densities = Vec::with_capacity(trial.ncomponents());
        for s in 0..trial.ncomponents() {
            densities.push(trial.density(s).ok_or(AfqmcError::SingularTrial(s))?);
        }

        let vbar: Vec<f64> = fields
            .iter()
            .map(|l| deg * densities.iter().map(|rho| trace_product(l, rho).re).sum::<f64>())
            .collect();

        let norb = trial.norb();
        let mut ll = CMatrix::zeros(norb, norb);
        let mut mean_field = CMatrix::zeros(norb, norb);
        for (l, v) in fields.iter().zip(&vbar) {
            ll += l * l;
            mean_field += l * Complex64::new(*v, 0.0);
        }
        let half_dt = Complex64::new(-0.5 * config.dt, 0.0);
        let exp_h1e = h1e
            .iter()
            .map(|h| ((h - &ll * Complex64::new(0.5, 0.0) + &mean_field) * half_dt).exp())
            .collect();

        let rh1 = (0..trial.ncomponents()).map(|s| trial.psi(s).adjoint() * &h1e[s]).collect();
        let rchol = trial.half_rotate(&fields);
        let energy_offset = ecore - 0.5 * vbar.iter().map(|v| v * v).sum::<f64>();
        tracing::debug!(
            "phaseless tables: {} fields, energy offset {:.8}",
            fields.len(),
            energy_offset
        );

        Ok(Self {
            dt: config.dt,
            sqrt_dt: config.dt.sqrt(),
            taylor_order: config.taylor_order,
            scheme: config.energy_scheme,
            deg,
            ecore,
            energy_offset,
            fields,
            vbar,
            exp_h1e,
            rh1,
            rchol,
            timings: PropagationTimings::default(),
        })
    }

    pub fn nfields(&self) -> usize {
        self.fields.len()
    }

    /// xbar_n = -i sqrt(dt) (vbias_n - vbar_n), vbias_n = deg sum_s tr(psi_s^H L_n Theta_s).
    fn force_bias(&self, theta: &[CMatrix]) -> Vec<Complex64> {
        (0..self.nfields())
            .map(|n| {
                let vbias: Complex64 = self
                    .rchol
                    .iter()
                    .zip(theta)
                    .map(|(r, t)| trace_product(&r[n], t))
                    .sum::<Complex64>()
                    * self.deg;
                -I * self.sqrt_dt * (vbias - self.vbar[n])
            })
            .collect()
    }

    /// Apply B(x - xbar) to the walker and return (cfb, cmf).
    fn step_fermions(&self, walker: &mut Walker, x: &DVector<f64>, xbar: &[Complex64]) -> (Complex64, Complex64) {
        let shifted: Vec<Complex64> = x.iter().zip(xbar).map(|(xi, xb)| *xi - *xb).collect();

        let norb = self.exp_h1e[0].nrows();
        let mut op = CMatrix::zeros(norb, norb);
        for (l, s) in self.fields.iter().zip(&shifted) {
            op += l * (I * self.sqrt_dt * *s);
        }
        for (s, phi) in walker.phi.iter_mut().enumerate() {
            let mut next = &self.exp_h1e[s] * &*phi;
            apply_taylor(&op, &mut next, self.taylor_order);
            *phi = &self.exp_h1e[s] * next;
        }

        let mut cfb = ZERO;
        for (xi, xb) in x.iter().zip(xbar) {
            let xb = *xb;
            cfb += xb * *xi - 0.5 * xb * xb;
        }
        let cmf_sum: Complex64 = shifted.iter().zip(&self.vbar).map(|(s, v)| *s * *v).sum();
        let cmf = -I * self.sqrt_dt * cmf_sum;
        (cfb, cmf)
    }

    /// Overlap and local energy of a walker in its current state.
    fn walker_energy<T, E>(&self, trial: &T, walker: &Walker, ext: &E) -> Option<(Complex64, EnergyComponents)>
    where
        T: TrialWavefunction,
        E: StepExtension,
    {
        let greens = trial.mixed_greens(&walker.phi)?;
        let ovlp = greens.ovlp * trial.boson_overlap(&walker.boson);
        let mut energy = electronic_energy(self.ecore, &self.rh1, &self.rchol, &greens.theta, self.deg);
        let extra = ext.energy(walker, &greens);
        energy.boson = extra.boson;
        energy.bilinear = extra.bilinear;
        energy.total += extra.boson + extra.bilinear;
        Some((ovlp, energy))
    }

    pub fn propagate<T, E, R>(
        &mut self,
        trial: &T,
        ensemble: &mut WalkerEnsemble,
        eshift: f64,
        rng: &mut R,
        ext: &E,
    ) where
        T: TrialWavefunction,
        E: StepExtension,
        R: Rng,
    {
        let start = Instant::now();
        let before: Vec<Option<(Vec<Complex64>, E::Estimates)>> = ensemble
            .walkers
            .par_iter()
            .map(|walker| {
                if !walker.is_alive() {
                    return None;
                }
                let greens = trial.mixed_greens(&walker.phi)?;
                Some((self.force_bias(&greens.theta), ext.pre_step(walker, &greens)))
            })
            .collect();
        self.timings.force_bias += start.elapsed();

        // drawn serially so the stream does not depend on the thread count
        let start = Instant::now();
        let nfields = self.nfields();
        let fields: Vec<DVector<f64>> = (0..ensemble.len())
            .map(|_| DVector::from_fn(nfields, |_, _| rng.sample(StandardNormal)))
            .collect();
        self.timings.gaussian += start.elapsed();

        let start = Instant::now();
        let factors: Vec<Option<(Complex64, Complex64)>> = ensemble
            .walkers
            .par_iter_mut()
            .zip(fields.par_iter())
            .zip(before.par_iter())
            .map(|((walker, x), before)| {
                let (xbar, _) = before.as_ref()?;
                Some(self.step_fermions(walker, x, xbar))
            })
            .collect();
        self.timings.propagate += start.elapsed();

        let start = Instant::now();
        ensemble
            .walkers
            .par_iter_mut()
            .zip(before.par_iter())
            .for_each(|(walker, before)| {
                if let Some((_, estimates)) = before {
                    ext.post_step(walker, estimates);
                }
            });
        self.timings.boson += start.elapsed();

        let start = Instant::now();
        let params = UpdateParams {
            dt: self.dt,
            eshift,
            energy_offset: self.energy_offset,
            scheme: self.scheme,
        };
        ensemble
            .walkers
            .par_iter_mut()
            .zip(factors.par_iter())
            .for_each(|(walker, factors)| {
                let Some((cfb, cmf)) = factors else {
                    if walker.is_alive() {
                        tracing::debug!("walker with vanishing trial overlap removed");
                        walker.kill();
                    }
                    return;
                };
                let Some((ovlp_new, energy)) = self.walker_energy(trial, walker, ext) else {
                    walker.kill();
                    return;
                };
                let step = StepFactors { ovlp_old: walker.ovlp, ovlp_new, cfb: *cfb, cmf: *cmf };
                let update = phaseless_update(walker.weight, &step, &params, energy.total);
                if update.alive {
                    walker.unscaled_weight *= update.weight / walker.weight;
                    walker.weight = update.weight;
                    walker.ovlp = ovlp_new;
                    walker.ehybrid = update.hybrid_energy;
                    walker.eloc = energy.total;
                } else {
                    walker.kill();
                }
            });
        self.timings.update_weight += start.elapsed();
    }

    /// Weighted mixed-estimator energy of the ensemble.
    pub fn local_energy<T, E>(&self, trial: &T, ensemble: &WalkerEnsemble, ext: &E) -> EnergyComponents
    where
        T: TrialWavefunction,
        E: StepExtension,
    {
        let (sum, total_weight) = ensemble
            .walkers
            .par_iter()
            .filter(|w| w.is_alive())
            .filter_map(|w| self.walker_energy(trial, w, ext).map(|(_, e)| (e * w.weight, w.weight)))
            .reduce(
                || (EnergyComponents::default(), 0.0),
                |(mut a, wa), (b, wb)| {
                    a += b;
                    (a, wa + wb)
                },
            );
        if total_weight > 0.0 {
            sum * (1.0 / total_weight)
        } else {
            sum
        }
    }

    /// Set every live walker's hybrid and local energy to its mixed estimate.
    pub fn initialize_energies<T, E>(&self, trial: &T, ensemble: &mut WalkerEnsemble, ext: &E)
    where
        T: TrialWavefunction,
        E: StepExtension,
    {
        ensemble.walkers.par_iter_mut().filter(|w| w.is_alive()).for_each(|walker| {
            match self.walker_energy(trial, walker, ext) {
                Some((_, energy)) => {
                    walker.eloc = energy.total;
                    walker.ehybrid = energy.total;
                }
                None => walker.kill(),
            }
        });
    }
}
