use approx::assert_relative_eq;
use num_complex::Complex64;

use crate::error::{AfqmcError, Result};
use crate::estimators::electronic_energy;
use crate::io::{AfqmcConfig, CheckpointHook, EnergyScheme, NoCheckpoint, PopControlScheme};
use crate::linalg::{orthonormality_error, trace_product, CMatrix};
use crate::provenance::ProvenanceLog;
use crate::systems::{models, BosonCoupling, Hamiltonian};
use crate::walkers::WalkerEnsemble;
use crate::wavefunction::{SingleDeterminant, TrialWavefunction};
use crate::Afqmc;

fn c(x: f64) -> Complex64 {
    Complex64::new(x, 0.0)
}

fn run(ham: &Hamiltonian, config: AfqmcConfig) -> crate::SimulationResult {
    let trial = SingleDeterminant::aufbau(ham, &[1]).unwrap();
    Afqmc::new(ham, trial, config).unwrap().run().unwrap()
}

#[derive(Default)]
struct RecordingHook {
    steps: Vec<usize>,
    total_weights: Vec<f64>,
}

impl CheckpointHook for RecordingHook {
    fn save(&mut self, step: usize, walkers: &WalkerEnsemble, _eshift: f64) -> Result<()> {
        self.steps.push(step);
        self.total_weights.push(walkers.total_weight());
        Ok(())
    }
}

struct FailingHook;

impl CheckpointHook for FailingHook {
    fn save(&mut self, step: usize, _walkers: &WalkerEnsemble, _eshift: f64) -> Result<()> {
        Err(AfqmcError::Checkpoint { step, reason: "disk full".into() })
    }
}

#[test]
fn test_tight_binding_dimer_converges_to_exact_energy() {
    let ham = models::tight_binding_dimer(0.5);
    let exact = models::two_electron_singlet_energy(&ham);
    let config = AfqmcConfig {
        dt: 0.01,
        num_walkers: 200,
        nsteps: Some(2000),
        random_seed: 7,
        ..AfqmcConfig::default()
    };
    let result = run(&ham, config);
    assert_eq!(result.samples.len(), 2000 / 10 + 1);

    let stats = result.block_average(500).unwrap();
    assert_eq!(stats.nsamples, 150);
    assert!((stats.mean - exact).abs() < 1e-2, "{} vs exact {}", stats.mean, exact);
    assert!(stats.error < 1e-2);
}

#[test]
fn test_hubbard_dimer_recovers_correlation_energy() {
    let ham = models::hubbard_dimer(1.0, 1.0);
    let exact = models::two_electron_singlet_energy(&ham);
    assert_relative_eq!(exact, -1.5615528128, epsilon = 1e-9);

    let base = AfqmcConfig {
        dt: 0.01,
        num_walkers: 100,
        nsteps: Some(1000),
        random_seed: 3,
        ..AfqmcConfig::default()
    };
    let hybrid = run(&ham, base.clone()).block_average(200).unwrap();
    // the restricted Hartree-Fock trial alone gives -1.5
    assert!(hybrid.mean < -1.52 && hybrid.mean > -1.60, "hybrid energy {}", hybrid.mean);

    let local = run(&ham, AfqmcConfig { energy_scheme: EnergyScheme::Local, ..base })
        .block_average(200)
        .unwrap();
    assert!((hybrid.mean - local.mean).abs() < 0.03, "{} vs {}", hybrid.mean, local.mean);
}

#[test]
fn test_comb_population_control_run() {
    let ham = models::hubbard_dimer(1.0, 1.0);
    let config = AfqmcConfig {
        dt: 0.01,
        num_walkers: 50,
        nsteps: Some(300),
        pop_control: PopControlScheme::Comb,
        ..AfqmcConfig::default()
    };
    let result = run(&ham, config);
    for sample in result.samples.iter() {
        assert!(sample.energy.is_finite());
        assert_eq!(sample.num_alive, 50);
    }
}

#[test]
fn test_zero_taylor_order_is_deterministic_one_body_projection() {
    let ham = models::hubbard_dimer(1.0, 1.0);
    let norm = (1.0f64 + 0.09).sqrt();
    let psi = CMatrix::from_column_slice(2, 1, &[c(1.0 / norm), c(0.3 / norm)]);
    let trial = SingleDeterminant::new(vec![psi.clone()]).unwrap();
    let config = AfqmcConfig {
        dt: 0.01,
        nsteps: Some(40),
        num_walkers: 4,
        taylor_order: 0,
        ..AfqmcConfig::default()
    };
    let result = Afqmc::new(&ham, trial.clone(), config).unwrap().run().unwrap();

    // exp(-dt/2 h')^2 per step with the mean-field shifted one-body matrix
    let rho = trial.density(0).unwrap();
    let mut shifted = ham.h1e[0].clone();
    for l in ham.chol.iter() {
        let vbar = 2.0 * trace_product(l, &rho).re;
        shifted -= l * l * c(0.5);
        shifted += l * c(vbar);
    }
    let half = (shifted * c(-0.005)).exp();
    let rh1 = vec![psi.adjoint() * &ham.h1e[0]];
    let rchol = trial.half_rotate(&ham.chol);

    let mut phi = psi.clone();
    let mut steps_done = 0;
    for sample in result.samples.iter() {
        while steps_done < sample.step {
            phi = &half * (&half * phi);
            steps_done += 1;
        }
        let theta = &phi * (psi.adjoint() * &phi).try_inverse().unwrap();
        let expected = electronic_energy(ham.ecore, &rh1, &rchol, &[theta], 2.0);
        assert_relative_eq!(sample.energy, expected.total.re, epsilon = 1e-10);
    }
    assert_eq!(steps_done, 40);
}

#[test]
fn test_zero_coupling_cavity_matches_bare_run() {
    let bare = models::hubbard_dimer(1.0, 1.0);
    let uncoupled = models::hubbard_dimer(1.0, 1.0).with_bosons(BosonCoupling {
        freq: vec![1.0],
        gmat: vec![CMatrix::zeros(2, 2)],
        nboson_states: vec![4],
        coupling_var: vec![1.0],
    });
    let config = AfqmcConfig { dt: 0.01, num_walkers: 20, nsteps: Some(100), ..AfqmcConfig::default() };

    let reference = run(&bare, config.clone());
    let coupled = run(&uncoupled, config);
    assert_eq!(reference.samples.len(), coupled.samples.len());
    for (a, b) in reference.samples.iter().zip(coupled.samples.iter()) {
        assert_relative_eq!(a.energy, b.energy, epsilon = 1e-10);
        assert_relative_eq!(a.window.weight, b.window.weight, epsilon = 1e-10);
        assert_relative_eq!(a.window.ehybrid.re, b.window.ehybrid.re, epsilon = 1e-10);
        assert_relative_eq!(b.components.boson.re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(b.components.bilinear.re, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn test_cavity_run_reports_boson_components() {
    let ham = models::cavity_dimer(0.5, 1.0, 0.1, 6);
    let config = AfqmcConfig { dt: 0.01, num_walkers: 20, nsteps: Some(100), ..AfqmcConfig::default() };
    let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
    let mut afqmc = Afqmc::new(&ham, trial, config).unwrap();
    let mut provenance = ProvenanceLog::new();
    let result = afqmc.kernel(&mut provenance, &mut NoCheckpoint).unwrap();

    assert!(provenance.contains("pra2024"));
    for sample in result.samples.iter() {
        assert!(sample.energy.is_finite());
        let parts = sample.components.one_body + sample.components.two_body + sample.components.boson
            + sample.components.bilinear;
        assert_relative_eq!(parts.re + ham.ecore, sample.energy, epsilon = 1e-10);
    }
}

#[test]
fn test_bare_run_has_no_boson_reference() {
    let ham = models::tight_binding_dimer(0.5);
    let config = AfqmcConfig { nsteps: Some(10), num_walkers: 4, ..AfqmcConfig::default() };
    let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
    let mut afqmc = Afqmc::new(&ham, trial, config).unwrap();
    let mut provenance = ProvenanceLog::new();
    afqmc.kernel(&mut provenance, &mut NoCheckpoint).unwrap();
    assert!(provenance.contains("zhang2013af"));
    assert!(!provenance.contains("pra2024"));
}

#[test]
fn test_out_of_range_coupling_var_still_runs() {
    let mut ham = models::cavity_dimer(0.5, 1.0, 0.1, 6);
    if let Some(bosons) = ham.bosons.as_mut() {
        bosons.coupling_var = vec![1.5];
    }
    let config = AfqmcConfig { dt: 0.01, num_walkers: 10, nsteps: Some(50), ..AfqmcConfig::default() };
    let result = run(&ham, config);
    assert!(result.samples.iter().all(|s| s.energy.is_finite()));
}

#[test]
fn test_checkpoint_cadence() {
    let ham = models::hubbard_dimer(1.0, 1.0);
    let config = AfqmcConfig {
        dt: 0.01,
        num_walkers: 10,
        nsteps: Some(20),
        checkpoint_freq: 5,
        ..AfqmcConfig::default()
    };
    let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
    let mut afqmc = Afqmc::new(&ham, trial, config.clone()).unwrap();
    let mut hook = RecordingHook::default();
    afqmc.kernel(&mut ProvenanceLog::new(), &mut hook).unwrap();
    assert_eq!(hook.steps, vec![4, 9, 14, 19]);
    assert!(hook.total_weights.iter().all(|w| *w > 0.0));

    let disabled = AfqmcConfig { checkpoint_freq: 0, ..config };
    let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
    let mut afqmc = Afqmc::new(&ham, trial, disabled).unwrap();
    let mut hook = RecordingHook::default();
    afqmc.kernel(&mut ProvenanceLog::new(), &mut hook).unwrap();
    assert!(hook.steps.is_empty());
}

#[test]
fn test_checkpoint_failure_aborts_run() {
    let ham = models::hubbard_dimer(1.0, 1.0);
    let config = AfqmcConfig { num_walkers: 4, nsteps: Some(10), checkpoint_freq: 3, ..AfqmcConfig::default() };
    let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
    let mut afqmc = Afqmc::new(&ham, trial, config).unwrap();
    let err = afqmc.kernel(&mut ProvenanceLog::new(), &mut FailingHook).unwrap_err();
    assert!(matches!(err, AfqmcError::Checkpoint { step: 2, .. }));
}

#[test]
fn test_walkers_orthonormal_after_orthogonalization() {
    let ham = models::hubbard_dimer(1.0, 2.0);
    let config = AfqmcConfig { dt: 0.01, num_walkers: 16, nsteps: Some(23), ..AfqmcConfig::default() };
    let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
    let mut afqmc = Afqmc::new(&ham, trial, config).unwrap();
    afqmc.run().unwrap();

    afqmc.walkers_mut().orthogonalization();
    let first: Vec<_> = afqmc.walkers().iter().map(|w| (w.phi[0].clone(), w.log_det)).collect();
    for walker in afqmc.walkers().iter().filter(|w| w.is_alive()) {
        assert!(orthonormality_error(&walker.phi[0]) < 1e-10);
        let direct = afqmc.trial().overlap(&walker.phi);
        assert_relative_eq!(walker.ovlp.re, direct.re, epsilon = 1e-8);
    }

    afqmc.walkers_mut().orthogonalization();
    for (walker, (phi, log_det)) in afqmc.walkers().iter().zip(first.iter()) {
        assert!((&walker.phi[0] - phi).norm() < 1e-10);
        assert_relative_eq!(walker.log_det, *log_det, epsilon = 1e-10);
    }
}

#[test]
fn test_same_seed_reproduces_run() {
    let ham = models::hubbard_dimer(1.0, 1.0);
    let config = AfqmcConfig { dt: 0.01, num_walkers: 16, nsteps: Some(60), random_seed: 11, ..AfqmcConfig::default() };
    let a = run(&ham, config.clone());
    let b = run(&ham, config);
    for (x, y) in a.samples.iter().zip(b.samples.iter()) {
        assert_relative_eq!(x.energy, y.energy, epsilon = 1e-12);
        assert_relative_eq!(x.window.weight, y.window.weight, epsilon = 1e-10);
    }
}

#[test]
fn test_invalid_config_rejected_before_run() {
    let ham = models::hubbard_dimer(1.0, 1.0);
    let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
    let config = AfqmcConfig { dt: -0.01, ..AfqmcConfig::default() };
    assert!(matches!(Afqmc::new(&ham, trial, config), Err(AfqmcError::InvalidConfig(_))));
}

#[test]
fn test_run_settings_exposed_after_setup() {
    let ham = models::hubbard_dimer(1.0, 1.0);
    let trial = SingleDeterminant::aufbau(&ham, &[1]).unwrap();
    let config = AfqmcConfig { dt: 0.02, total_time: 1.0, num_walkers: 8, ..AfqmcConfig::default() };
    let afqmc = Afqmc::new(&ham, trial, config).unwrap();
    assert_eq!(afqmc.config().nsteps(), 50);
    assert_relative_eq!(afqmc.propagator().dt(), 0.02);
    assert_eq!(afqmc.propagator().nfields(), 2);
    assert_eq!(afqmc.walkers().len(), 8);
}
