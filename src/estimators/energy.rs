//! Mixed-estimator energy of a determinant walker.

use std::ops::{AddAssign, Mul};

use num_complex::Complex64;
use serde::Serialize;

use crate::linalg::{trace_product, CMatrix, ZERO};

/// Energy split into its physical contributions.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyComponents {
    pub total: Complex64,
    pub one_body: Complex64,
    pub two_body: Complex64,
    /// sum_v w_v <n_v>
    pub boson: Complex64,
    /// sum_v <G_v><a_v + a+_v>
    pub bilinear: Complex64,
}

impl AddAssign for EnergyComponents {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.one_body += other.one_body;
        self.two_body += other.two_body;
        self.boson += other.boson;
        self.bilinear += other.bilinear;
    }
}

impl Mul<f64> for EnergyComponents {
    type Output = Self;

    fn mul(self, w: f64) -> Self {
        Self {
            total: self.total * w,
            one_body: self.one_body * w,
            two_body: self.two_body * w,
            boson: self.boson * w,
            bilinear: self.bilinear * w,
        }
    }
}

/// Electronic mixed estimate from half-rotated integrals.
///
/// `rh1[s] = psi_s^H h_s`, `rchol[s][n] = psi_s^H L_n`, `theta[s]` the
/// walker's Theta matrices and `deg` the spin multiplicity of each component.
///
/// E1 = deg sum_s tr(rh1_s Theta_s),
/// E2 = 1/2 sum_n [(deg sum_s tr T_ns)^2 - deg sum_s tr(T_ns T_ns)],
/// with T_ns = rchol[s][n] Theta_s.
pub fn electronic_energy(
    ecore: f64,
    rh1: &[CMatrix],
    rchol: &[Vec<CMatrix>],
    theta: &[CMatrix],
    deg: f64,
) -> EnergyComponents {
    let one_body: Complex64 = rh1.iter().zip(theta).map(|(h, t)| trace_product(h, t)).sum::<Complex64>() * deg;

    let nfields = rchol.first().map_or(0, |r| r.len());
    let mut two_body = ZERO;
    for n in 0..nfields {
        let mut coulomb = ZERO;
        let mut exchange = ZERO;
        for (rchol_s, theta_s) in rchol.iter().zip(theta) {
            let t = &rchol_s[n] * theta_s;
            coulomb += t.trace();
            exchange += trace_product(&t, &t);
        }
        two_body += 0.5 * (coulomb * coulomb * deg * deg - exchange * deg);
    }

    EnergyComponents {
        total: one_body + two_body + ecore,
        one_body,
        two_body,
        ..Default::default()
    }
}
