use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use rust_afqmc::systems::models;
use rust_afqmc::{Afqmc, AfqmcConfig, NoCheckpoint, ProvenanceLog, Result, SingleDeterminant};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Model {
    /// Two-site tight binding with a number-operator field
    TightBinding,
    /// Two-site Hubbard model
    Hubbard,
    /// Tight-binding dimer coupled to one cavity mode
    Cavity,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    #[arg(short, long, value_enum, default_value = "hubbard")]
    model: Model,

    /// Hopping amplitude
    #[arg(short, long, default_value_t = 1.0)]
    t: f64,

    /// Two-body interaction strength
    #[arg(short, long, default_value_t = 1.0)]
    u: f64,

    /// Cavity frequency
    #[arg(long, default_value_t = 1.0)]
    freq: f64,

    /// Light-matter coupling strength
    #[arg(long, default_value_t = 0.05)]
    lambda: f64,

    /// Fock states kept for the cavity mode
    #[arg(long, default_value_t = 8)]
    nboson_states: usize,

    /// Steps discarded before the blocking analysis
    #[arg(long, default_value_t = 0)]
    equilibration: usize,

    /// Write the energy samples to this YAML file
    #[arg(short, long)]
    output: Option<String>,
}

fn run(args: &Args) -> Result<()> {
    let config = if std::path::Path::new(&args.config).exists() {
        AfqmcConfig::from_yaml_file(&args.config)?
    } else {
        tracing::warn!("{} not found, using default parameters", args.config);
        AfqmcConfig::default()
    };

    let ham = match args.model {
        Model::TightBinding => models::tight_binding_dimer(args.u),
        Model::Hubbard => models::hubbard_dimer(args.t, args.u),
        Model::Cavity => models::cavity_dimer(args.u, args.freq, args.lambda, args.nboson_states),
    };
    let exact = models::two_electron_singlet_energy(&ham);
    let trial = SingleDeterminant::aufbau(&ham, &[1])?;

    let mut afqmc = Afqmc::new(&ham, trial, config)?;
    let mut provenance = ProvenanceLog::new();
    let result = afqmc.kernel(&mut provenance, &mut NoCheckpoint)?;

    println!("AFQMC results for the {:?} model", args.model);
    println!("----------------------------------------");
    println!(
        "{} walkers, {} steps of dt = {}, {} auxiliary fields",
        afqmc.walkers().len(),
        afqmc.config().nsteps(),
        afqmc.propagator().dt(),
        afqmc.propagator().nfields()
    );
    match result.block_average(args.equilibration) {
        Some(stats) => {
            println!("Energy: {:.6} ± {:.6} Ha", stats.mean, stats.error);
            println!("Autocorrelation time: {:.2} samples", stats.autocorrelation_time);
        }
        None => println!("Not enough samples after equilibration for a blocking analysis"),
    }
    if matches!(args.model, Model::Cavity) {
        println!("Electronic reference (no cavity): {:.6} Ha", exact);
    } else {
        println!("Exact diagonalization: {:.6} Ha", exact);
    }

    let t = &result.timings;
    println!("Wall time (s)");
    println!("  Propagation       : {:9.3}", t.propagation.as_secs_f64());
    println!("    force bias      : {:9.3}", t.propagation_breakdown.force_bias.as_secs_f64());
    println!("    random fields   : {:9.3}", t.propagation_breakdown.gaussian.as_secs_f64());
    println!("    propagate       : {:9.3}", t.propagation_breakdown.propagate.as_secs_f64());
    println!("    bosons          : {:9.3}", t.propagation_breakdown.boson.as_secs_f64());
    println!("    update weights  : {:9.3}", t.propagation_breakdown.update_weight.as_secs_f64());
    println!("  Weight control    : {:9.3}", t.weight_control.as_secs_f64());
    println!("  Orthogonalization : {:9.3}", t.orthogonalization.as_secs_f64());
    println!("  Observables       : {:9.3}", t.observables.as_secs_f64());
    println!("  Checkpoint        : {:9.3}", t.checkpoint.as_secs_f64());
    println!("  Total             : {:9.3}", t.total.as_secs_f64());

    println!("References");
    for (i, reference) in provenance.entries().iter().enumerate() {
        println!("  [{}] {}: {}", i + 1, reference.key, reference.description);
    }

    if let Some(path) = &args.output {
        let file = std::fs::File::create(path)?;
        serde_yaml::to_writer(file, &result.samples)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
