//! Small dense linear-algebra helpers on complex matrices.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

pub type CMatrix = DMatrix<Complex64>;
pub type CVector = DVector<Complex64>;

pub const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };
pub const ONE: Complex64 = Complex64 { re: 1.0, im: 0.0 };
pub const I: Complex64 = Complex64 { re: 0.0, im: 1.0 };

/// Promote a real matrix to a complex one.
pub fn to_complex(m: &DMatrix<f64>) -> CMatrix {
    m.map(|x| Complex64::new(x, 0.0))
}

/// tr(AB) without forming the product.
pub fn trace_product(a: &CMatrix, b: &CMatrix) -> Complex64 {
    debug_assert_eq!(a.ncols(), b.nrows());
    debug_assert_eq!(a.nrows(), b.ncols());
    let mut acc = ZERO;
    for i in 0..a.nrows() {
        for k in 0..a.ncols() {
            acc += a[(i, k)] * b[(k, i)];
        }
    }
    acc
}

/// Largest elementwise deviation of `m` from its adjoint.
pub fn hermitian_deviation(m: &CMatrix) -> f64 {
    let mut dev: f64 = 0.0;
    for i in 0..m.nrows() {
        for j in 0..m.ncols() {
            dev = dev.max((m[(i, j)] - m[(j, i)].conj()).norm());
        }
    }
    dev
}

/// phi <- sum_{k=0}^{order} op^k / k! phi
///
/// `order == 0` leaves `phi` untouched.
pub fn apply_taylor(op: &CMatrix, phi: &mut CMatrix, order: usize) {
    let mut term = phi.clone();
    for k in 0..order {
        term = op * term / Complex64::new((k + 1) as f64, 0.0);
        *phi += &term;
    }
}

/// Thin QR of a coefficient matrix with the R diagonal made real positive.
///
/// Returns the orthonormal factor and sum_i ln|R_ii|. Fixing the phase of R
/// makes the factorization unique, so an already orthonormal input comes back
/// unchanged with a zero log-determinant.
pub fn qr_ortho(phi: &CMatrix) -> (CMatrix, f64) {
    let qr = phi.clone().qr();
    let mut q = qr.q();
    let r = qr.r();
    let mut log_det = 0.0;
    for i in 0..r.nrows().min(q.ncols()) {
        let rii = r[(i, i)];
        let magnitude = rii.norm();
        log_det += magnitude.ln();
        if magnitude > 0.0 {
            let phase = rii / magnitude;
            let mut column = q.column_mut(i);
            column *= phase;
        }
    }
    (q, log_det)
}

/// Maximum deviation of phi^H phi from the identity.
pub fn orthonormality_error(phi: &CMatrix) -> f64 {
    let gram = phi.adjoint() * phi;
    let n = gram.nrows();
    let mut err: f64 = 0.0;
    for i in 0..n {
        for j in 0..n {
            let target = if i == j { ONE } else { ZERO };
            err = err.max((gram[(i, j)] - target).norm());
        }
    }
    err
}
