//! Driver loop of a phaseless AFQMC run.

use std::time::{Duration, Instant};

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::error::Result;
use crate::estimators::{block_average, BlockAnalysis, EnergyComponents, PropertyAccumulator, WindowEstimate};
use crate::io::{AfqmcConfig, CheckpointHook, NoCheckpoint};
use crate::propagation::{PropagationTimings, Propagator};
use crate::provenance::ProvenanceLog;
use crate::systems::Hamiltonian;
use crate::walkers::{PopulationControl, WalkerEnsemble};
use crate::wavefunction::TrialWavefunction;

/// Energy snapshot at the end of an accumulation window.
#[derive(Serialize, Debug, Clone)]
pub struct EnergySample {
    /// Number of completed steps
    pub step: usize,
    pub time: f64,
    /// Real part of the ensemble mixed-estimator energy
    pub energy: f64,
    pub components: EnergyComponents,
    pub window: WindowEstimate,
    pub eshift: f64,
    pub num_alive: usize,
}

/// Wall time per phase of the loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallTimings {
    pub propagation: Duration,
    pub propagation_breakdown: PropagationTimings,
    pub weight_control: Duration,
    pub orthogonalization: Duration,
    pub observables: Duration,
    pub checkpoint: Duration,
    pub total: Duration,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub samples: Vec<EnergySample>,
    pub timings: WallTimings,
    pub dt: f64,
}

impl SimulationResult {
    /// Blocking analysis of the sample energies after `equilibration_steps`.
    pub fn block_average(&self, equilibration_steps: usize) -> Option<BlockAnalysis> {
        let energies: Vec<f64> = self
            .samples
            .iter()
            .filter(|s| s.step > equilibration_steps)
            .map(|s| s.energy)
            .collect();
        block_average(&energies, 0)
    }
}

pub struct Afqmc<T: TrialWavefunction> {
    config: AfqmcConfig,
    trial: T,
    propagator: Propagator,
    walkers: WalkerEnsemble,
    accumulator: PropertyAccumulator,
    control: PopulationControl,
    rng: StdRng,
}

impl<T: TrialWavefunction> Afqmc<T> {
    /// Validate the inputs and set up the propagator and walker ensemble.
    pub fn new(ham: &Hamiltonian, mut trial: T, config: AfqmcConfig) -> Result<Self> {
        config.validate()?;
        if let Some(bosons) = &ham.bosons {
            trial.initialize_boson_trial(bosons)?;
        }
        let propagator = Propagator::build(ham, &trial, &config)?;
        let walkers = WalkerEnsemble::new(&trial, config.num_walkers);
        let accumulator = PropertyAccumulator::new(config.property_calc_freq);
        let control = PopulationControl::from_config(&config);
        let rng = StdRng::seed_from_u64(config.random_seed);
        Ok(Self { config, trial, propagator, walkers, accumulator, control, rng })
    }

    pub fn config(&self) -> &AfqmcConfig {
        &self.config
    }

    pub fn trial(&self) -> &T {
        &self.trial
    }

    pub fn propagator(&self) -> &Propagator {
        &self.propagator
    }

    pub fn walkers(&self) -> &WalkerEnsemble {
        &self.walkers
    }

    pub fn walkers_mut(&mut self) -> &mut WalkerEnsemble {
        &mut self.walkers
    }

    pub fn eshift(&self) -> f64 {
        self.accumulator.eshift()
    }

    /// Run without checkpointing.
    pub fn run(&mut self) -> Result<SimulationResult> {
        let mut provenance = ProvenanceLog::new();
        self.kernel(&mut provenance, &mut NoCheckpoint)
    }

    fn sample(&self, step: usize, window: WindowEstimate) -> EnergySample {
        let components = self.propagator.local_energy(&self.trial, &self.walkers);
        EnergySample {
            step,
            time: step as f64 * self.config.dt,
            energy: components.total.re,
            components,
            window,
            eshift: self.accumulator.eshift(),
            num_alive: self.walkers.num_alive(),
        }
    }

    pub fn kernel(
        &mut self,
        provenance: &mut ProvenanceLog,
        checkpoint: &mut dyn CheckpointHook,
    ) -> Result<SimulationResult> {
        let run_start = Instant::now();
        let mut timings = WallTimings::default();
        provenance.record("zhang2013af", "phaseless auxiliary-field QMC with complex fields");
        if matches!(self.propagator, Propagator::ElectronBoson(_)) {
            provenance.record("pra2024", "QED auxiliary-field QMC for electron-boson coupled systems");
        }

        let nsteps = self.config.nsteps();
        tracing::info!(
            "AFQMC: {} walkers, dt = {}, {} steps, {} auxiliary fields",
            self.walkers.len(),
            self.config.dt,
            nsteps,
            self.propagator.nfields()
        );

        let start = Instant::now();
        self.walkers.orthogonalization();
        timings.orthogonalization += start.elapsed();

        let start = Instant::now();
        self.propagator.initialize_energies(&self.trial, &mut self.walkers);
        let eshift = self.accumulator.initialize(&self.walkers);
        let total_weight = self.walkers.total_weight();
        let initial = WindowEstimate {
            weight: total_weight,
            unscaled_weight: self.walkers.total_unscaled_weight(),
            ehybrid: Complex64::new(eshift, 0.0),
            elocal: Complex64::new(eshift, 0.0),
        };
        let mut samples = vec![self.sample(0, initial)];
        timings.observables += start.elapsed();
        tracing::info!("step {:>8}  time {:>10.4}  energy {:>14.8}", 0, 0.0, samples[0].energy);

        for step in 0..nsteps {
            if (step + 1) % self.config.renorm_freq == 0 {
                let start = Instant::now();
                self.walkers.orthogonalization();
                timings.orthogonalization += start.elapsed();
            }

            let start = Instant::now();
            let eshift = self.accumulator.eshift();
            self.propagator.propagate_walkers(&self.trial, &mut self.walkers, eshift, &mut self.rng);
            timings.propagation += start.elapsed();

            let start = Instant::now();
            self.walkers.weight_control(step, &self.control, &mut self.rng);
            timings.weight_control += start.elapsed();

            let start = Instant::now();
            if let Some(window) = self.accumulator.property_stack(&self.walkers, step) {
                let sample = self.sample(step + 1, window);
                tracing::info!(
                    "step {:>8}  time {:>10.4}  energy {:>14.8}  ehybrid {:>14.8}  weight {:>10.4}",
                    sample.step,
                    sample.time,
                    sample.energy,
                    window.ehybrid.re,
                    window.weight
                );
                samples.push(sample);
            }
            timings.observables += start.elapsed();

            if self.config.checkpoint_freq > 0 && (step + 1) % self.config.checkpoint_freq == 0 {
                let start = Instant::now();
                checkpoint.save(step, &self.walkers, self.accumulator.eshift())?;
                timings.checkpoint += start.elapsed();
            }
        }

        timings.propagation_breakdown = *self.propagator.timings();
        timings.total = run_start.elapsed();
        Ok(SimulationResult { samples, timings, dt: self.config.dt })
    }
}
