//! Closed-form model Hamiltonians used by the demo binary and the tests.

use nalgebra::{DMatrix, SymmetricEigen};
use num_complex::Complex64;

use super::hamiltonian::{BosonCoupling, Hamiltonian};
use crate::linalg::to_complex;

/// Two-site tight-binding model with one-body matrix [[0,-1],[-1,0]] and a
/// single field proportional to the identity, L = sqrt(u) I.
///
/// The field couples to the total number operator, so for two electrons the
/// interaction is the constant u and the exact ground state energy is -2 + u.
pub fn tight_binding_dimer(u: f64) -> Hamiltonian {
    let h = DMatrix::from_row_slice(2, 2, &[0.0, -1.0, -1.0, 0.0]);
    let l = DMatrix::<f64>::identity(2, 2) * u.sqrt();
    let eri = eri_from_real_fields(&[l.clone()]);
    Hamiltonian::new(vec![to_complex(&h)], vec![to_complex(&l)], 0.0).with_eri(eri)
}

/// Two-site Hubbard model, H = -t sum_sigma (c+_0 c_1 + h.c.) + U sum_i n_i,up n_i,down.
///
/// The on-site interaction factorizes into one field per site, L_i = sqrt(U) e_i e_i^T.
pub fn hubbard_dimer(t: f64, u: f64) -> Hamiltonian {
    let h = DMatrix::from_row_slice(2, 2, &[0.0, -t, -t, 0.0]);
    let fields: Vec<DMatrix<f64>> = (0..2)
        .map(|i| {
            let mut l = DMatrix::zeros(2, 2);
            l[(i, i)] = u.sqrt();
            l
        })
        .collect();
    let eri = eri_from_real_fields(&fields);
    Hamiltonian::new(vec![to_complex(&h)], fields.iter().map(to_complex).collect(), 0.0).with_eri(eri)
}

/// Tight-binding dimer coupled to one cavity mode through the site dipole
/// operator diag(1, -1).
pub fn cavity_dimer(u: f64, freq: f64, lambda: f64, nboson_states: usize) -> Hamiltonian {
    let dipole = DMatrix::from_row_slice(2, 2, &[lambda, 0.0, 0.0, -lambda]);
    tight_binding_dimer(u).with_bosons(BosonCoupling {
        freq: vec![freq],
        gmat: vec![to_complex(&dipole)],
        nboson_states: vec![nboson_states],
        coupling_var: vec![1.0],
    })
}

/// (pq|rs) = sum_n L_n,pq L_n,rs for real fields.
pub fn eri_from_real_fields(fields: &[DMatrix<f64>]) -> Vec<Complex64> {
    let n = fields.first().map_or(0, |l| l.nrows());
    let mut eri = vec![Complex64::new(0.0, 0.0); n.pow(4)];
    for p in 0..n {
        for q in 0..n {
            for r in 0..n {
                for s in 0..n {
                    let value: f64 = fields.iter().map(|l| l[(p, q)] * l[(r, s)]).sum();
                    eri[((p * n + q) * n + r) * n + s] = Complex64::new(value, 0.0);
                }
            }
        }
    }
    eri
}

/// Exact two-electron singlet ground-state energy of a restricted Hamiltonian.
///
/// The spatial wavefunction is C_pq phi_p(1) phi_q(2) with C symmetric, and
/// (H C)_pq = sum_a h_pa C_aq + sum_b h_qb C_pb + sum_ab (pa|qb) C_ab.
/// Diagonalizes H in the basis of symmetric pairs p <= q.
pub fn two_electron_singlet_energy(ham: &Hamiltonian) -> f64 {
    let n = ham.norb();
    let h = &ham.h1e[0];
    let eri = |p: usize, q: usize, r: usize, s: usize| -> f64 {
        match &ham.eri {
            Some(eri) => eri[((p * n + q) * n + r) * n + s].re,
            None => ham.chol.iter().map(|l| (l[(p, q)] * l[(r, s)]).re).sum(),
        }
    };

    // full product-space matrix acting on vec(C), index p*n+q
    let full = DMatrix::<f64>::from_fn(n * n, n * n, |row, col| {
        let (p, q) = (row / n, row % n);
        let (a, b) = (col / n, col % n);
        let mut value = eri(p, a, q, b);
        if b == q {
            value += h[(p, a)].re;
        }
        if a == p {
            value += h[(q, b)].re;
        }
        value
    });

    // orthonormal basis of symmetric C
    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|p| (p..n).map(move |q| (p, q))).collect();
    let basis = DMatrix::<f64>::from_fn(n * n, pairs.len(), |row, k| {
        let (p, q) = pairs[k];
        let (i, j) = (row / n, row % n);
        if p == q {
            if i == p && j == p { 1.0 } else { 0.0 }
        } else if (i, j) == (p, q) || (i, j) == (q, p) {
            std::f64::consts::FRAC_1_SQRT_2
        } else {
            0.0
        }
    });

    let reduced = basis.transpose() * full * &basis;
    let eigen = SymmetricEigen::new(reduced);
    eigen.eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min) + ham.ecore
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tight_binding_exact_energy() {
        let ham = tight_binding_dimer(0.5);
        assert_relative_eq!(two_electron_singlet_energy(&ham), -1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_hubbard_exact_energy() {
        let (t, u) = (1.0, 1.0);
        let ham = hubbard_dimer(t, u);
        let exact = 0.5 * (u - (u * u + 16.0 * t * t).sqrt());
        assert_relative_eq!(two_electron_singlet_energy(&ham), exact, epsilon = 1e-12);
    }

    #[test]
    fn test_non_interacting_limit() {
        let ham = hubbard_dimer(1.0, 0.0);
        assert_relative_eq!(two_electron_singlet_energy(&ham), -2.0, epsilon = 1e-12);
    }
}
