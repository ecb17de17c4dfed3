//! Scalar type and default tolerances.
//!
//! The engine is built for `f64` throughout, mirroring the teacher crate's
//! own choice to hard-code `Complex64`/`f64` rather than stay generic over
//! `nalgebra::RealField`.

/// Ground node sentinel used in per-element bus references (matches the
/// teacher's `GND` convention in `src/basic/system/system.rs`).
pub const GND: i64 = -1;

pub type Real = f64;

pub const DEFAULT_TOLERANCE: Real = 1e-8;
pub const DEFAULT_MAX_ITER: usize = 10;
