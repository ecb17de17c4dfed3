//! AC power flow via polar-coordinate Newton-Raphson (spec §4.5).
//!
//! Loop structure follows the teacher's `src/basic/newtonpf.rs::newton_pf`;
//! generalized from the teacher's permuted-bus-order shortcut (pv/pq/ext
//! contiguous thanks to a reordering permutation matrix) to explicit
//! `pv`/`pq` index slices, since this engine does not reorder buses — the
//! bus index mapper's solver ids are authoritative end to end.

use std::time::{Duration, Instant};

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use super::{RSparseSolver, Solve};
use crate::error::{PowerFlowError, Result};
use crate::jacobian::{build_jacobian, dsbus_dv};

/// Persists the Newton-Raphson iterate across solves so a caller can
/// warm-start from the previous solution (spec §5, §9 "mutable solver state
/// across calls"). Cleared on [`crate::grid::Grid::reset`].
#[derive(Default)]
pub struct SolverState {
    pub v: DVector<Complex64>,
    pub jacobian: Option<CscMatrix<f64>>,
    pub iterations: usize,
    pub converged: bool,
    pub elapsed: Duration,
    linear_solver: RSparseSolver,
}

impl SolverState {
    pub fn clear(&mut self) {
        self.v = DVector::zeros(0);
        self.jacobian = None;
        self.iterations = 0;
        self.converged = false;
        self.elapsed = Duration::default();
        self.linear_solver.reset();
    }
}

pub struct AcSolution {
    pub v: DVector<Complex64>,
    pub iterations: usize,
}

#[allow(non_snake_case)]
fn mismatch(
    ybus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
    s: &DVector<Complex64>,
) -> DVector<Complex64> {
    v.component_mul(&(ybus * v).conjugate()) - s
}

fn assemble_f(mis: &DVector<Complex64>, pvpq: &[usize], pq: &[usize]) -> DVector<f64> {
    let mut f = DVector::zeros(pvpq.len() + pq.len());
    for (row, &bus) in pvpq.iter().enumerate() {
        f[row] = mis[bus].re;
    }
    for (row, &bus) in pq.iter().enumerate() {
        f[pvpq.len() + row] = mis[bus].im;
    }
    f
}

fn apply_update(
    v: &mut DVector<Complex64>,
    delta: &DVector<f64>,
    pvpq: &[usize],
    pq: &[usize],
) {
    let mut vm: Vec<f64> = v.iter().map(|c| c.norm()).collect();
    let mut va: Vec<f64> = v.iter().map(|c| c.arg()).collect();
    for (row, &bus) in pvpq.iter().enumerate() {
        va[bus] -= delta[row];
    }
    for (row, &bus) in pq.iter().enumerate() {
        vm[bus] -= delta[pvpq.len() + row];
    }
    for i in 0..v.len() {
        v[i] = Complex64::from_polar(vm[i], va[i]);
    }
}

/// Runs polar Newton-Raphson to convergence (spec §4.5). `state` carries the
/// previous iterate forward as the initial guess when its length matches
/// `v_init`'s; otherwise `v_init` seeds a cold start.
#[allow(non_snake_case)]
pub fn ac_pf(
    ybus: &CscMatrix<Complex64>,
    sbus: &DVector<Complex64>,
    v_init: &DVector<Complex64>,
    pv: &[usize],
    pq: &[usize],
    max_iter: usize,
    tol: f64,
    state: &mut SolverState,
) -> Result<AcSolution> {
    let start = Instant::now();
    let k = v_init.len();
    let pvpq: Vec<usize> = pv.iter().chain(pq.iter()).copied().collect();

    let mut v = if state.v.len() == k {
        state.v.clone()
    } else {
        v_init.clone()
    };

    let mut mis = mismatch(ybus, &v, sbus);
    let mut f = assemble_f(&mis, &pvpq, pq);

    for iteration in 0..max_iter {
        if f.amax() < tol {
            state.v = v.clone();
            state.iterations = iteration;
            state.converged = true;
            state.elapsed = start.elapsed();
            return Ok(AcSolution {
                v,
                iterations: iteration,
            });
        }

        let vm_phase = v.map(|c| c / c.norm());
        let (ds_dvm, ds_dva) = dsbus_dv(ybus, &v, &vm_phase);
        let jacobian = build_jacobian(&ds_dvm, &ds_dva, &pvpq, pq);
        let n = jacobian.nrows();

        // Solve J*dx = F (not negated); apply_update subtracts dx, matching
        // the teacher's update_v convention.
        let (mut ap, mut ai, mut ax) = jacobian.clone().disassemble();
        let mut rhs: Vec<f64> = f.iter().copied().collect();
        state
            .linear_solver
            .solve(&mut ap, &mut ai, &mut ax, &mut rhs, n)
            .map_err(|reason| PowerFlowError::JacobianSingular {
                iteration,
                reason: reason.to_string(),
            })?;
        state.jacobian = Some(jacobian);

        let delta = DVector::from_vec(rhs);
        apply_update(&mut v, &delta, &pvpq, pq);

        mis = mismatch(ybus, &v, sbus);
        f = assemble_f(&mis, &pvpq, pq);
    }

    state.converged = false;
    state.elapsed = start.elapsed();
    Err(PowerFlowError::MaxIterExceeded {
        max_iter,
        residual: f.amax(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    #[test]
    fn two_bus_resistive_line_converges_to_expected_voltage() {
        // spec §8 scenario (a): 138kV buses, r=0.01 x=0.1 pu on 100MVA,
        // slack V=1.02 at bus0, load P=50MW Q=20MVAr at bus1.
        let y_series = Complex64::new(1.0, 0.0) / Complex64::new(0.01, 0.1);
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, y_series);
        coo.push(1, 1, y_series);
        coo.push(0, 1, -y_series);
        coo.push(1, 0, -y_series);
        let ybus = CscMatrix::from(&coo);

        let sbus = DVector::from_vec(vec![
            Complex64::new(0.0, 0.0),
            Complex64::new(-0.5, -0.2),
        ]);
        let v_init = DVector::from_vec(vec![
            Complex64::from_polar(1.02, 0.0),
            Complex64::new(1.0, 0.0),
        ]);

        let mut state = SolverState::default();
        let solution = ac_pf(&ybus, &sbus, &v_init, &[], &[1], 10, 1e-8, &mut state).unwrap();

        assert!(solution.iterations <= 4);
        assert!((solution.v[1].re - 1.0118).abs() < 1e-3);
        assert!((solution.v[1].im - (-0.0516)).abs() < 1e-3);
    }
}
