//! Propagation module - phaseless imaginary-time steps of the walker ensemble.

mod phaseless;
mod elec_boson;
pub mod weight;

use std::time::Duration;

use rand::Rng;

use self::phaseless::PhaselessCore;
use self::elec_boson::{dressed_integrals, BosonExtension};
use crate::error::{AfqmcError, Result};
use crate::estimators::EnergyComponents;
use crate::io::AfqmcConfig;
use crate::systems::{BosonCoupling, Hamiltonian};
use crate::walkers::WalkerEnsemble;
use crate::wavefunction::TrialWavefunction;

pub use weight::{phaseless_update, PhaselessUpdate, StepFactors, UpdateParams};

/// Accumulated wall time of the propagation sub-phases.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagationTimings {
    pub force_bias: Duration,
    pub gaussian: Duration,
    /// One-body and two-body fermionic step
    pub propagate: Duration,
    /// Boson and bilinear steps
    pub boson: Duration,
    /// Overlap, local energy and phaseless weight update
    pub update_weight: Duration,
}

impl PropagationTimings {
    pub fn total(&self) -> Duration {
        self.force_bias + self.gaussian + self.propagate + self.boson + self.update_weight
    }
}

/// Purely electronic phaseless propagator.
#[derive(Debug, Clone)]
pub struct Phaseless {
    core: PhaselessCore,
}

impl Phaseless {
    pub fn new<T: TrialWavefunction>(ham: &Hamiltonian, trial: &T, config: &AfqmcConfig) -> Result<Self> {
        let core = PhaselessCore::build(ham.h1e.clone(), ham.chol.clone(), ham.ecore, trial, config)?;
        Ok(Self { core })
    }
}

/// Phaseless propagator for electrons coupled to boson modes.
#[derive(Debug, Clone)]
pub struct PhaselessElecBoson {
    core: PhaselessCore,
    bosons: BosonExtension,
}

impl PhaselessElecBoson {
    pub fn new<T: TrialWavefunction>(
        ham: &Hamiltonian,
        coupling: &BosonCoupling,
        trial: &T,
        config: &AfqmcConfig,
    ) -> Result<Self> {
        let (h1e, fields) = dressed_integrals(&ham.h1e, &ham.chol, coupling);
        let core = PhaselessCore::build(h1e, fields, ham.ecore, trial, config)?;
        let bosons = BosonExtension::new(coupling, trial, config.dt)?;
        Ok(Self { core, bosons })
    }
}

#[derive(Debug, Clone)]
pub enum Propagator {
    Bare(Phaseless),
    ElectronBoson(PhaselessElecBoson),
}

impl Propagator {
    /// Validate the Hamiltonian against the trial and precompute the
    /// propagation tables. Boson modes select the electron-boson variant.
    pub fn build<T: TrialWavefunction>(ham: &Hamiltonian, trial: &T, config: &AfqmcConfig) -> Result<Self> {
        ham.validate(config.chol_thresh)?;
        if trial.norb() != ham.norb() || trial.ncomponents() != ham.ncomponents() {
            return Err(AfqmcError::ShapeMismatch {
                what: "trial".into(),
                expected: format!("{} components over {} orbitals", ham.ncomponents(), ham.norb()),
                found: format!("{} components over {} orbitals", trial.ncomponents(), trial.norb()),
            });
        }
        let propagator = match &ham.bosons {
            None => Propagator::Bare(Phaseless::new(ham, trial, config)?),
            Some(coupling) => Propagator::ElectronBoson(PhaselessElecBoson::new(ham, coupling, trial, config)?),
        };
        tracing::info!(
            "built {} propagator with {} auxiliary fields",
            match propagator {
                Propagator::Bare(_) => "phaseless",
                Propagator::ElectronBoson(_) => "electron-boson phaseless",
            },
            propagator.nfields()
        );
        Ok(propagator)
    }

    fn core(&self) -> &PhaselessCore {
        match self {
            Propagator::Bare(p) => &p.core,
            Propagator::ElectronBoson(p) => &p.core,
        }
    }

    pub fn nfields(&self) -> usize {
        self.core().nfields()
    }

    pub fn dt(&self) -> f64 {
        self.core().dt
    }

    /// E_core - 1/2 sum_n vbar_n^2
    pub fn energy_offset(&self) -> f64 {
        self.core().energy_offset
    }

    pub fn mean_field_shift(&self) -> &[f64] {
        &self.core().vbar
    }

    pub fn timings(&self) -> &PropagationTimings {
        &self.core().timings
    }

    /// Advance every live walker by one time step.
    pub fn propagate_walkers<T, R>(&mut self, trial: &T, walkers: &mut WalkerEnsemble, eshift: f64, rng: &mut R)
    where
        T: TrialWavefunction,
        R: Rng,
    {
        match self {
            Propagator::Bare(p) => p.core.propagate(trial, walkers, eshift, rng, &()),
            Propagator::ElectronBoson(p) => p.core.propagate(trial, walkers, eshift, rng, &p.bosons),
        }
    }

    /// Weighted mixed-estimator energy of the ensemble.
    pub fn local_energy<T: TrialWavefunction>(&self, trial: &T, walkers: &WalkerEnsemble) -> EnergyComponents {
        match self {
            Propagator::Bare(p) => p.core.local_energy(trial, walkers, &()),
            Propagator::ElectronBoson(p) => p.core.local_energy(trial, walkers, &p.bosons),
        }
    }

    /// Seed each walker's hybrid and local energy with its mixed estimate.
    pub fn initialize_energies<T: TrialWavefunction>(&self, trial: &T, walkers: &mut WalkerEnsemble) {
        match self {
            Propagator::Bare(p) => p.core.initialize_energies(trial, walkers, &()),
            Propagator::ElectronBoson(p) => p.core.initialize_energies(trial, walkers, &p.bosons),
        }
    }
}
