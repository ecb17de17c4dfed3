//! Power-injection Jacobian w.r.t. voltage magnitude/angle, and the 4-block
//! real Jacobian used by Newton-Raphson (spec §4.5 steps 2, 4).
//!
//! `dsbus_dv` is carried over near-verbatim from the teacher's
//! `src/basic/dsbus_dv.rs` (MATPOWER TN2 formulae). `build_jacobian`
//! generalizes the teacher's `newtonpf.rs::build_jacobian`: the teacher
//! relies on buses being pre-permuted so pv/pq/ext form contiguous blocks
//! and slices by a single split point; here pv/pq are arbitrary index sets
//! (no bus permutation), so blocks are extracted with an explicit
//! index-based submatrix selector instead of contiguous ranges.

use std::collections::HashMap;

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

use crate::sparse::{csc_hstack, csc_vstack, Conjugate, RealImage};

/// Computes `dS/dVm` and `dS/dVa`, the Jacobians of nodal power injection
/// with respect to voltage magnitude and angle (MATPOWER TN2: R. D.
/// Zimmerman, "AC Power Flows, Generalized OPF Costs and their Derivatives
/// using Complex Matrix Notation").
#[allow(non_snake_case)]
pub fn dsbus_dv(
    ybus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
    v_norm: &DVector<Complex64>,
) -> (CscMatrix<Complex64>, CscMatrix<Complex64>) {
    let pattern = CscMatrix::identity(v.len());
    let ibus = ybus * v;

    let mut diag_v_norm = pattern.clone();
    let mut diag_v = pattern.clone();
    let mut diag_ibus = pattern;
    diag_v_norm.values_mut().copy_from_slice(v_norm.as_slice());
    diag_v.values_mut().copy_from_slice(v.as_slice());
    diag_ibus.values_mut().copy_from_slice(ibus.as_slice());

    let ds_dvm = &diag_v * (ybus * &diag_v_norm).conjugate() + diag_ibus.conjugate() * &diag_v_norm;
    let ds_dva = &diag_v * (diag_ibus - ybus * &diag_v).conjugate() * Complex64::i();
    (ds_dvm, ds_dva)
}

/// Builds a `rows.len() x cols.len()` submatrix picking arbitrary (not
/// necessarily contiguous) rows and columns out of `mat`.
fn select_submatrix(mat: &CscMatrix<f64>, rows: &[usize], cols: &[usize]) -> CscMatrix<f64> {
    let row_pos: HashMap<usize, usize> = rows.iter().enumerate().map(|(i, &r)| (r, i)).collect();
    let col_pos: HashMap<usize, usize> = cols.iter().enumerate().map(|(i, &c)| (c, i)).collect();

    let mut coo = CooMatrix::new(rows.len(), cols.len());
    for (r, c, v) in mat.triplet_iter() {
        if let (Some(&rp), Some(&cp)) = (row_pos.get(&r), col_pos.get(&c)) {
            coo.push(rp, cp, *v);
        }
    }
    CscMatrix::from(&coo)
}

/// Assembles the 4-block real Jacobian
/// `[∂P/∂θ, ∂P/∂|V|; ∂Q/∂θ, ∂Q/∂|V|]` restricted to `(pv ∪ pq)` rows/cols for
/// the `θ` blocks and `pq` rows/cols for the `|V|` blocks (spec §4.5 step 4).
#[allow(non_snake_case)]
pub fn build_jacobian(
    ds_dvm: &CscMatrix<Complex64>,
    ds_dva: &CscMatrix<Complex64>,
    pvpq: &[usize],
    pq: &[usize],
) -> CscMatrix<f64> {
    let (dva_real, dva_imag) = ds_dva.real_imag();
    let (dvm_real, dvm_imag) = ds_dvm.real_imag();

    let j11 = select_submatrix(&dva_real, pvpq, pvpq);
    let j12 = select_submatrix(&dvm_real, pvpq, pq);
    let j21 = select_submatrix(&dva_imag, pq, pvpq);
    let j22 = select_submatrix(&dvm_imag, pq, pq);

    csc_vstack(&[&csc_hstack(&[&j11, &j12]), &csc_hstack(&[&j21, &j22])])
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Complex;
    use nalgebra_sparse::CooMatrix;

    #[test]
    fn select_submatrix_picks_expected_entries() {
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 1.0);
        coo.push(1, 1, 2.0);
        coo.push(2, 2, 3.0);
        coo.push(0, 2, 9.0);
        let mat = CscMatrix::from(&coo);
        let sub = select_submatrix(&mat, &[2, 0], &[2, 0]);
        assert_eq!(sub.get_entry(0, 0).unwrap().into_value(), 3.0);
        assert_eq!(sub.get_entry(1, 1).unwrap().into_value(), 1.0);
        assert_eq!(sub.get_entry(0, 1).unwrap().into_value(), 9.0);
    }

    #[test]
    fn dsbus_dv_matches_flat_bus_with_no_coupling() {
        let mut coo = CooMatrix::new(1, 1);
        coo.push(0, 0, Complex::new(0.0, -10.0));
        let ybus = CscMatrix::from(&coo);
        let v = DVector::from_element(1, Complex::new(1.0, 0.0));
        let v_norm = v.clone();
        let (dvm, dva) = dsbus_dv(&ybus, &v, &v_norm);
        assert_eq!(dvm.nrows(), 1);
        assert_eq!(dva.nrows(), 1);
    }
}
