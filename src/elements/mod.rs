//! Typed grid elements and the stamping contract (spec §4.1).
//!
//! Every element family implements [`Element`]: it knows how to append its
//! own contribution to the sparse `Y` triplet list and to the dense `S`
//! vector, and (for generators) how to mark its bus PV. Families are kept as
//! plain structs in per-family `Vec`s on [`crate::grid::Grid`] rather than
//! behind a `dyn Element` or an ECS scheduler — see DESIGN.md for why a
//! closed, explicit set of families was chosen over dynamic dispatch.

pub mod generator;
pub mod line;
pub mod load;
pub mod shunt;
pub mod static_gen;
pub mod storage;
pub mod transformer;

pub use generator::Generator;
pub use line::Line;
pub use load::Load;
pub use shunt::Shunt;
pub use static_gen::StaticGen;
pub use storage::Storage;
pub use transformer::Transformer;

use nalgebra::DVector;
use num_complex::Complex64;

use crate::bus::BusIndexMapper;
use crate::error::Result;

/// Sparse triplet accumulator for one call to [`crate::assembler::assemble`].
pub type Triplets = Vec<(usize, usize, Complex64)>;

/// Common stamping contract shared by every element family (spec §4.1).
///
/// `stamp_y`/`stamp_s` must be no-ops (not errors) when the element itself is
/// inactive; they must error with
/// [`crate::error::PowerFlowError::DisconnectedBusReferenced`] when the
/// element is active but references a disconnected bus — that is a modelling
/// error, not a quiet skip (spec §3 invariant).
pub trait Element {
    /// Family name used in error messages and logging (`"line"`, `"trafo"`, ...).
    const FAMILY: &'static str;

    fn in_service(&self) -> bool;

    /// Append this element's contribution to the Y triplet list.
    fn stamp_y(
        &self,
        id: usize,
        ac: bool,
        buses: &BusIndexMapper,
        base_mva: f64,
        triplets: &mut Triplets,
    ) -> Result<()>;

    /// Add this element's contribution to the dense S vector (indexed by
    /// solver bus id).
    fn stamp_s(
        &self,
        id: usize,
        ac: bool,
        buses: &BusIndexMapper,
        base_mva: f64,
        s: &mut DVector<Complex64>,
    ) -> Result<()>;
}
