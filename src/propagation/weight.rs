//! Phaseless weight update.
//!
//! For one walker step the importance-sampled weight factor is
//! I = (ovlp_new / ovlp_old) exp(cfb + cmf), which defines the hybrid
//! energy E_hyb = -ln(I) / dt + E_offset. The phaseless projection keeps
//! |I| scaled by max(0, cos dtheta), dtheta being the phase of the overlap
//! ratio including the mean-field rotation.

use num_complex::Complex64;

use crate::io::EnergyScheme;
use crate::linalg::ZERO;

/// Per-step factors of one walker.
#[derive(Debug, Clone, Copy)]
pub struct StepFactors {
    pub ovlp_old: Complex64,
    pub ovlp_new: Complex64,
    /// sum_n x_n xbar_n - 1/2 sum_n xbar_n^2
    pub cfb: Complex64,
    /// -i sqrt(dt) sum_n (x_n - xbar_n) vbar_n
    pub cmf: Complex64,
}

/// Run-wide inputs of the update.
#[derive(Debug, Clone, Copy)]
pub struct UpdateParams {
    pub dt: f64,
    pub eshift: f64,
    /// E_core - 1/2 sum_n vbar_n^2
    pub energy_offset: f64,
    pub scheme: EnergyScheme,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaselessUpdate {
    pub weight: f64,
    pub hybrid_energy: Complex64,
    pub alive: bool,
}

impl PhaselessUpdate {
    fn dead() -> Self {
        Self { weight: 0.0, hybrid_energy: ZERO, alive: false }
    }
}

/// Real energies are bounded to eshift +/- sqrt(2/dt) before exponentiation.
fn clip(energy: Complex64, eshift: f64, dt: f64) -> Complex64 {
    let bound = (2.0 / dt).sqrt();
    Complex64::new(energy.re.clamp(eshift - bound, eshift + bound), energy.im)
}

pub fn phaseless_update(
    weight: f64,
    factors: &StepFactors,
    params: &UpdateParams,
    local_energy: Complex64,
) -> PhaselessUpdate {
    debug_assert!(params.dt > 0.0);
    let ratio = factors.ovlp_new / factors.ovlp_old;
    if !(ratio.is_finite() && ratio.norm() > 0.0) {
        return PhaselessUpdate::dead();
    }

    let dt = params.dt;
    let hybrid = -(ratio.ln() + factors.cfb + factors.cmf) / dt + params.energy_offset;
    let hybrid = clip(hybrid, params.eshift, dt);

    let dtheta = ratio.arg() + factors.cmf.im;
    let cosine = dtheta.cos().max(0.0);

    let energy = match params.scheme {
        EnergyScheme::Hybrid => hybrid.re,
        EnergyScheme::Local => clip(local_energy, params.eshift, dt).re,
    };
    let new_weight = weight * (-dt * (energy - params.eshift)).exp() * cosine;

    if !(new_weight.is_finite() && new_weight > 0.0) {
        if !new_weight.is_finite() {
            tracing::debug!("non-finite weight {} treated as walker death", new_weight);
        }
        return PhaselessUpdate { hybrid_energy: hybrid, ..PhaselessUpdate::dead() };
    }
    PhaselessUpdate { weight: new_weight, hybrid_energy: hybrid, alive: true }
}
