//! Hamiltonian data consumed by the propagator.
//!
//! H = sum_pq h_pq rho_pq + 1/2 sum_n (sum_pq L_n,pq rho_pq)^2 - 1/2 sum_pq (L L)_pq rho_pq + E_core
//!
//! where rho_pq = sum_sigma c+_p,sigma c_q,sigma and (pq|rs) ~ sum_n L_n,pq L_n,rs.

use nalgebra::SymmetricEigen;
use num_complex::Complex64;

use crate::error::{AfqmcError, Result};
use crate::linalg::{hermitian_deviation, CMatrix};

/// Bilinear electron-boson coupling (Pauli-Fierz form, length gauge).
///
/// H_eb = sum_v w_v a+_v a_v + sum_v sqrt(w_v / 2) (g_v . rho)(a+_v + a_v) + 1/2 sum_v (g_v . rho)^2
#[derive(Debug, Clone)]
pub struct BosonCoupling {
    /// Mode frequencies
    pub freq: Vec<f64>,
    /// Coupling matrix per mode, norb x norb
    pub gmat: Vec<CMatrix>,
    /// Fock-space truncation per mode
    pub nboson_states: Vec<usize>,
    /// Variational fraction of the coherent shift per mode
    pub coupling_var: Vec<f64>,
}

impl BosonCoupling {
    pub fn nmodes(&self) -> usize {
        self.freq.len()
    }

    fn validate(&self, norb: usize) -> Result<()> {
        let nmodes = self.nmodes();
        for (what, len) in [
            ("gmat", self.gmat.len()),
            ("nboson_states", self.nboson_states.len()),
            ("coupling_var", self.coupling_var.len()),
        ] {
            if len != nmodes {
                return Err(AfqmcError::ShapeMismatch {
                    what: format!("boson coupling {what}"),
                    expected: format!("{nmodes} modes"),
                    found: format!("{len}"),
                });
            }
        }
        for (v, g) in self.gmat.iter().enumerate() {
            check_square(&format!("gmat[{v}]"), g, norb)?;
            check_hermitian(&format!("gmat[{v}]"), g)?;
        }
        if let Some(w) = self.freq.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
            return Err(AfqmcError::InvalidConfig(format!("boson frequency must be positive, got {w}")));
        }
        if self.nboson_states.iter().any(|&n| n == 0) {
            return Err(AfqmcError::InvalidConfig("each boson mode needs at least one Fock state".into()));
        }
        Ok(())
    }
}

/// One/two-body integrals in an orthonormal orbital basis.
#[derive(Debug, Clone)]
pub struct Hamiltonian {
    /// One-body matrix per spin component (1 = restricted, 2 = unrestricted)
    pub h1e: Vec<CMatrix>,
    /// Cholesky fields L_n, each norb x norb
    pub chol: Vec<CMatrix>,
    /// Constant energy (nuclear repulsion, frozen core)
    pub ecore: f64,
    /// Reference (pq|rs) at ((p*n+q)*n+r)*n+s, only used to check the fields
    pub eri: Option<Vec<Complex64>>,
    pub bosons: Option<BosonCoupling>,
}

impl Hamiltonian {
    pub fn new(h1e: Vec<CMatrix>, chol: Vec<CMatrix>, ecore: f64) -> Self {
        Self { h1e, chol, ecore, eri: None, bosons: None }
    }

    pub fn with_eri(mut self, eri: Vec<Complex64>) -> Self {
        self.eri = Some(eri);
        self
    }

    pub fn with_bosons(mut self, bosons: BosonCoupling) -> Self {
        self.bosons = Some(bosons);
        self
    }

    pub fn norb(&self) -> usize {
        self.h1e.first().map_or(0, |h| h.nrows())
    }

    pub fn ncomponents(&self) -> usize {
        self.h1e.len()
    }

    pub fn nfields(&self) -> usize {
        self.chol.len()
    }

    /// Shape, hermiticity and low-rank consistency checks.
    ///
    /// Runs once when the propagator is built; an under-resolved Cholesky
    /// decomposition corrupts every later estimate, so it fails here.
    pub fn validate(&self, chol_thresh: f64) -> Result<()> {
        let norb = self.norb();
        if norb == 0 || !(1..=2).contains(&self.ncomponents()) {
            return Err(AfqmcError::ShapeMismatch {
                what: "h1e".into(),
                expected: "1 or 2 non-empty spin components".into(),
                found: format!("{} components of size {norb}", self.ncomponents()),
            });
        }
        for (s, h) in self.h1e.iter().enumerate() {
            check_square(&format!("h1e[{s}]"), h, norb)?;
            check_hermitian(&format!("h1e[{s}]"), h)?;
        }
        for (n, l) in self.chol.iter().enumerate() {
            check_square(&format!("chol[{n}]"), l, norb)?;
            check_hermitian(&format!("chol[{n}]"), l)?;
        }
        self.check_rank(chol_thresh)?;
        if let Some(eri) = &self.eri {
            let residual = self.eri_residual(eri)?;
            tracing::debug!("Cholesky reconstruction residual {:.3e}", residual);
            if residual > chol_thresh {
                return Err(AfqmcError::CholeskyInconsistent { residual, thresh: chol_thresh });
            }
        }
        if let Some(bosons) = &self.bosons {
            bosons.validate(norb)?;
        }
        Ok(())
    }

    /// Null or linearly dependent fields indicate a truncation threshold set
    /// below the numerical noise of the decomposition.
    fn check_rank(&self, chol_thresh: f64) -> Result<()> {
        for (n, l) in self.chol.iter().enumerate() {
            if !l.iter().all(|x| x.is_finite()) {
                return Err(AfqmcError::RankDeficient(format!("field {n} has non-finite entries")));
            }
            let norm = l.norm();
            if norm < chol_thresh {
                return Err(AfqmcError::RankDeficient(format!(
                    "field {n} has norm {norm:.3e} below chol_thresh"
                )));
            }
        }
        let nfields = self.nfields();
        if nfields < 2 {
            return Ok(());
        }
        // Gram matrix of the flattened fields
        let gram = CMatrix::from_fn(nfields, nfields, |a, b| self.chol[a].dotc(&self.chol[b]));
        let eigen = SymmetricEigen::new(gram);
        let smallest = eigen.eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
        if smallest < chol_thresh * chol_thresh {
            return Err(AfqmcError::RankDeficient(format!(
                "field Gram matrix has eigenvalue {smallest:.3e} below chol_thresh^2"
            )));
        }
        Ok(())
    }

    fn eri_residual(&self, eri: &[Complex64]) -> Result<f64> {
        let n = self.norb();
        if eri.len() != n.pow(4) {
            return Err(AfqmcError::ShapeMismatch {
                what: "eri".into(),
                expected: format!("{} entries", n.pow(4)),
                found: format!("{}", eri.len()),
            });
        }
        let mut residual: f64 = 0.0;
        for p in 0..n {
            for q in 0..n {
                for r in 0..n {
                    for s in 0..n {
                        let approx: Complex64 = self.chol.iter().map(|l| l[(p, q)] * l[(r, s)]).sum();
                        let exact = eri[((p * n + q) * n + r) * n + s];
                        residual = residual.max((exact - approx).norm());
                    }
                }
            }
        }
        Ok(residual)
    }
}

fn check_square(what: &str, m: &CMatrix, norb: usize) -> Result<()> {
    if m.nrows() != norb || m.ncols() != norb {
        return Err(AfqmcError::ShapeMismatch {
            what: what.to_string(),
            expected: format!("{norb}x{norb}"),
            found: format!("{}x{}", m.nrows(), m.ncols()),
        });
    }
    Ok(())
}

fn check_hermitian(what: &str, m: &CMatrix) -> Result<()> {
    let deviation = hermitian_deviation(m);
    if deviation > 1e-8 {
        return Err(AfqmcError::NonHermitian { what: what.to_string(), deviation });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::to_complex;
    use crate::systems::models;
    use nalgebra::DMatrix;

    #[test]
    fn test_hubbard_fields_reproduce_eri() {
        let ham = models::hubbard_dimer(1.0, 2.0);
        assert!(ham.eri.is_some());
        ham.validate(1e-8).unwrap();
    }

    #[test]
    fn test_truncated_fields_rejected() {
        // drop one of the two on-site fields: (11|11) is lost entirely
        let mut ham = models::hubbard_dimer(1.0, 2.0);
        ham.chol.truncate(1);
        match ham.validate(1e-6) {
            Err(AfqmcError::CholeskyInconsistent { residual, .. }) => {
                assert!((residual - 2.0).abs() < 1e-12)
            }
            other => panic!("expected CholeskyInconsistent, got {other:?}"),
        }
    }

    #[test]
    fn test_null_field_rejected() {
        let mut ham = models::tight_binding_dimer(0.5);
        ham.chol.push(to_complex(&DMatrix::zeros(2, 2)));
        assert!(matches!(ham.validate(1e-6), Err(AfqmcError::RankDeficient(_))));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut ham = models::tight_binding_dimer(0.5);
        let copy = ham.chol[0].clone();
        ham.chol.push(copy);
        assert!(matches!(ham.validate(1e-6), Err(AfqmcError::RankDeficient(_))));
    }

    #[test]
    fn test_non_hermitian_field_rejected() {
        let mut ham = models::tight_binding_dimer(0.5);
        ham.chol[0][(0, 1)] = Complex64::new(0.3, 0.0);
        assert!(matches!(ham.validate(1e-6), Err(AfqmcError::NonHermitian { .. })));
    }

    #[test]
    fn test_complex_eri_compared_in_full() {
        let l = CMatrix::from_row_slice(
            2,
            2,
            &[
                Complex64::new(1.0, 0.0),
                Complex64::new(0.0, 0.5),
                Complex64::new(0.0, -0.5),
                Complex64::new(1.0, 0.0),
            ],
        );
        let n: usize = 2;
        let eri: Vec<Complex64> = (0..n.pow(4))
            .map(|idx| {
                let (p, q, r, s) = (idx / 8, (idx / 4) % 2, (idx / 2) % 2, idx % 2);
                l[(p, q)] * l[(r, s)]
            })
            .collect();
        let h1e = models::tight_binding_dimer(0.5).h1e;

        let ham = Hamiltonian::new(h1e.clone(), vec![l.clone()], 0.0).with_eri(eri.clone());
        ham.validate(1e-8).unwrap();

        let real_part: Vec<Complex64> = eri.iter().map(|x| Complex64::new(x.re, 0.0)).collect();
        let ham = Hamiltonian::new(h1e, vec![l], 0.0).with_eri(real_part);
        match ham.validate(1e-8) {
            Err(AfqmcError::CholeskyInconsistent { residual, .. }) => {
                assert!((residual - 0.5).abs() < 1e-12)
            }
            other => panic!("expected CholeskyInconsistent, got {other:?}"),
        }
    }
}
