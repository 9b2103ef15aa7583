//! Run configuration, read from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AfqmcError, Result};

/// Which energy drives the walker weight update.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnergyScheme {
    #[default]
    Hybrid,
    Local,
}

/// Branching rule used by the population controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PopControlScheme {
    #[default]
    PairBranch,
    Comb,
}

/// Parameters of one fixed-step AFQMC run.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AfqmcConfig {
    /// Imaginary-time step
    pub dt: f64,
    /// Total imaginary time, used when `nsteps` is not given
    pub total_time: f64,
    pub nsteps: Option<usize>,
    pub num_walkers: usize,
    /// Re-orthogonalization period in steps
    pub renorm_freq: usize,
    /// Weight control period in steps
    pub pop_control_freq: usize,
    /// Length of the estimator window in steps
    pub property_calc_freq: usize,
    pub random_seed: u64,
    /// Order of the truncated exponential in the two-body step
    pub taylor_order: usize,
    pub energy_scheme: EnergyScheme,
    pub pop_control: PopControlScheme,
    /// Pair branching: walkers below `min_weight * mean` are candidates for removal
    pub min_weight: f64,
    /// Pair branching: walkers above `max_weight * mean` are candidates for splitting
    pub max_weight: f64,
    /// Truncation threshold the Cholesky fields were produced with
    pub chol_thresh: f64,
    /// Checkpoint hook period in steps, 0 disables it
    pub checkpoint_freq: usize,
}

impl Default for AfqmcConfig {
    fn default() -> Self {
        Self {
            dt: 0.005,
            total_time: 5.0,
            nsteps: None,
            num_walkers: 100,
            renorm_freq: 5,
            pop_control_freq: 5,
            property_calc_freq: 10,
            random_seed: 1,
            taylor_order: 6,
            energy_scheme: EnergyScheme::Hybrid,
            pop_control: PopControlScheme::PairBranch,
            min_weight: 0.1,
            max_weight: 4.0,
            chol_thresh: 1.0e-6,
            checkpoint_freq: 0,
        }
    }
}

impl AfqmcConfig {
    /// Read a configuration from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: AfqmcConfig = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: AfqmcConfig = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of steps: explicit `nsteps`, otherwise `total_time / dt`.
    pub fn nsteps(&self) -> usize {
        match self.nsteps {
            Some(n) => n,
            // rounded so that e.g. 5.0 / 0.005 gives 1000 and not 999
            None => (self.total_time / self.dt).round() as usize,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(AfqmcError::InvalidConfig(format!("dt must be positive, got {}", self.dt)));
        }
        if self.nsteps.is_none() && !(self.total_time.is_finite() && self.total_time >= 0.0) {
            return Err(AfqmcError::InvalidConfig(format!(
                "total_time must be non-negative, got {}",
                self.total_time
            )));
        }
        if self.num_walkers == 0 {
            return Err(AfqmcError::InvalidConfig("num_walkers must be at least 1".into()));
        }
        for (name, freq) in [
            ("renorm_freq", self.renorm_freq),
            ("pop_control_freq", self.pop_control_freq),
            ("property_calc_freq", self.property_calc_freq),
        ] {
            if freq == 0 {
                return Err(AfqmcError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }
        if !(self.chol_thresh.is_finite() && self.chol_thresh > 0.0) {
            return Err(AfqmcError::InvalidConfig(format!(
                "chol_thresh must be positive, got {}",
                self.chol_thresh
            )));
        }
        if !(self.min_weight >= 0.0 && self.min_weight < 1.0 && self.max_weight > 1.0) {
            return Err(AfqmcError::InvalidConfig(format!(
                "branching bounds need 0 <= min_weight < 1 < max_weight, got {} and {}",
                self.min_weight, self.max_weight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nsteps_from_total_time() {
        let config = AfqmcConfig::default();
        assert_eq!(config.nsteps(), 1000);

        let config = AfqmcConfig { nsteps: Some(42), ..AfqmcConfig::default() };
        assert_eq!(config.nsteps(), 42);
    }

    #[test]
    fn test_yaml_partial_keys() {
        let yaml = "dt: 0.01\nnum_walkers: 200\nenergy_scheme: local\npop_control: comb\n";
        let config = AfqmcConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.num_walkers, 200);
        assert_eq!(config.energy_scheme, EnergyScheme::Local);
        assert_eq!(config.pop_control, PopControlScheme::Comb);
        assert_eq!(config.taylor_order, 6);
        assert_eq!(config.nsteps(), 500);
    }

    #[test]
    fn test_yaml_round_trip_defaults() {
        let text = serde_yaml::to_string(&AfqmcConfig::default()).unwrap();
        let config = AfqmcConfig::from_yaml_str(&text).unwrap();
        assert_eq!(config.renorm_freq, 5);
        assert_eq!(config.property_calc_freq, 10);
        assert_eq!(config.energy_scheme, EnergyScheme::Hybrid);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_dt = AfqmcConfig { dt: 0.0, ..AfqmcConfig::default() };
        assert!(matches!(bad_dt.validate(), Err(AfqmcError::InvalidConfig(_))));

        let no_walkers = AfqmcConfig { num_walkers: 0, ..AfqmcConfig::default() };
        assert!(no_walkers.validate().is_err());

        let zero_freq = AfqmcConfig { renorm_freq: 0, ..AfqmcConfig::default() };
        assert!(zero_freq.validate().is_err());
    }
}
