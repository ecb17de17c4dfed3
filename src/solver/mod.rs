//! Sparse linear solve backend, AC Newton-Raphson, and the DC linearization.

mod rsparse_backend;

pub mod dc;
pub mod newton_raphson;

pub use dc::{dc_pf, DcSolution};
pub use newton_raphson::{ac_pf, AcSolution, SolverState};
pub use rsparse_backend::RSparseSolver;

/// Backend abstraction over a real-valued sparse direct solver, kept
/// trait-based so a second backend (teacher offers `faer`/`klu`) can be
/// added later without touching the Newton-Raphson loop.
///
/// Mirrors the teacher's `src/basic/solver.rs::Solve` trait.
#[allow(non_snake_case)]
pub trait Solve {
    /// Factorizes and solves `A x = b` in place: `Ap`/`Ai`/`Ax` are the CSC
    /// column pointers/row indices/values of `A`; `b` holds the right-hand
    /// side on entry and the solution on return.
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str>;

    /// Drops any cached symbolic factorization (called on `reset()`).
    fn reset(&mut self);
}
