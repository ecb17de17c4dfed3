//! DC (linearized) power flow (spec §4.6): `|V|=1pu`, `r≈0`, small angles, no
//! reactive power — a single sparse real solve on `B` with the slack
//! row/column removed.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

use super::{RSparseSolver, Solve};
use crate::error::{PowerFlowError, Result};

pub struct DcSolution {
    pub v: DVector<Complex64>,
}

/// Strips row/column `slack` from a real CSC matrix.
fn strip_slack(b: &CscMatrix<f64>, slack: usize) -> CscMatrix<f64> {
    let keep: Vec<usize> = (0..b.nrows()).filter(|&i| i != slack).collect();
    let pos: std::collections::HashMap<usize, usize> =
        keep.iter().enumerate().map(|(i, &k)| (k, i)).collect();
    let mut coo = CooMatrix::new(keep.len(), keep.len());
    for (r, c, v) in b.triplet_iter() {
        if let (Some(&rp), Some(&cp)) = (pos.get(&r), pos.get(&c)) {
            coo.push(rp, cp, *v);
        }
    }
    CscMatrix::from(&coo)
}

/// Solves the DC power-flow linearization (spec §4.6 steps 1-6). `y_dc` is
/// the assembler's output with `ac_flag=false` (susceptance-only `Y`, real
/// `S`); `v0` supplies the slack-bus angle via `arg(v0[slack])` and the
/// PV/slack voltage-magnitude setpoints (spec §9 open question: this engine
/// follows the legacy convention of reusing `arg(V0[slack])` rather than
/// hardcoding 0).
#[allow(non_snake_case)]
pub fn dc_pf(
    y_dc: &CscMatrix<Complex64>,
    s_dc: &DVector<Complex64>,
    v0: &DVector<Complex64>,
    pv: &[usize],
    slack: usize,
    bus_connected: &[bool],
) -> Result<DcSolution> {
    let k = y_dc.nrows();
    let b: CscMatrix<f64> = {
        let mut coo = CooMatrix::new(k, k);
        for (r, c, v) in y_dc.triplet_iter() {
            coo.push(r, c, v.re);
        }
        CscMatrix::from(&coo)
    };
    let b_reduced = strip_slack(&b, slack);
    let p: Vec<f64> = s_dc
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != slack)
        .map(|(_, v)| v.re)
        .collect();

    let n = b_reduced.nrows();
    let (mut ap, mut ai, mut ax) = b_reduced.disassemble();
    let mut rhs = p;
    let mut solver = RSparseSolver::default();
    solver
        .solve(&mut ap, &mut ai, &mut ax, &mut rhs, n)
        .map_err(|reason| PowerFlowError::DcSingular {
            reason: reason.to_string(),
        })?;

    let mut theta = vec![0.0; k];
    let mut idx = 0;
    for i in 0..k {
        if i == slack {
            continue;
        }
        theta[i] = rhs[idx];
        idx += 1;
    }
    theta[slack] = v0[slack].arg();

    let vm: Vec<f64> = (0..k)
        .map(|i| {
            if !bus_connected[i] {
                0.0
            } else if i == slack || pv.contains(&i) {
                v0[i].norm()
            } else {
                1.0
            }
        })
        .collect();

    let v = DVector::from_iterator(
        k,
        (0..k).map(|i| Complex64::from_polar(vm[i], theta[i])),
    );
    Ok(DcSolution { v })
}
