//! Error taxonomy for the power-flow engine.
//!
//! Input-validation errors are raised before any mutation and leave the grid
//! untouched. Convergence failures (`JacobianSingular`, `DcSingular`,
//! `MaxIterExceeded`) are reported through the same enum but are handled as
//! non-fatal by [`crate::grid::Grid`]: the facade clears results and returns
//! the zero-length sentinel voltage vector rather than propagating the error
//! to the caller of `ac_pf`/`dc_pf`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PowerFlowError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PowerFlowError {
    #[error("initial voltage vector has length {actual}, expected {expected}")]
    InputSizeMismatch { expected: usize, actual: usize },

    #[error("slack bus {bus} is not connected")]
    SlackDisconnected { bus: usize },

    #[error("slack generator id {id} is invalid ({reason})")]
    SlackInvalid { id: usize, reason: &'static str },

    #[error("element {element} of family {family} references disconnected bus {bus}")]
    DisconnectedBusReferenced {
        family: &'static str,
        element: usize,
        bus: usize,
    },

    #[error("element {element} of family {family} has invalid (negative) bus id {bus}")]
    InvalidBusId {
        family: &'static str,
        element: usize,
        bus: i64,
    },

    #[error("Jacobian factorization failed at iteration {iteration}: {reason}")]
    JacobianSingular { iteration: usize, reason: String },

    #[error("DC admittance factorization failed: {reason}")]
    DcSingular { reason: String },

    #[error("Newton-Raphson did not converge within {max_iter} iterations (final residual {residual:e})")]
    MaxIterExceeded { max_iter: usize, residual: f64 },
}
