//! Sparse-matrix helpers used by the Jacobian assembly: real/imaginary
//! splitting, conjugation, and CSC block/hstack/vstack composition.

pub(crate) mod conj;
pub(crate) mod slice;
pub(crate) mod stack;

pub(crate) use conj::{Conjugate, RealImage};
pub(crate) use slice::{slice_csc_matrix, slice_csc_matrix_block};
pub(crate) use stack::{csc_hstack, csc_vstack};
