//! Bus data and the external-id <-> solver-id index mapper (spec §3, §4.2).

use crate::error::{PowerFlowError, Result};

/// An electrical node, identified by a stable external index.
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    /// Nominal base voltage, kV.
    pub vn_kv: f64,
    /// Whether the bus is currently connected to the network.
    pub in_service: bool,
}

impl Bus {
    pub fn new(vn_kv: f64, in_service: bool) -> Self {
        Self { vn_kv, in_service }
    }
}

/// Bijection between external bus ids (stable, may include disconnected
/// buses) and solver bus ids (dense, connected-only).
///
/// Rebuilt from scratch on every [`crate::grid::Grid::reset`]; see spec §4.2.
#[derive(Debug, Clone, Default)]
pub struct BusIndexMapper {
    /// `ext_to_solver[i]` is `Some(j)` if external bus `i` is connected and
    /// maps to solver id `j`, `None` otherwise.
    ext_to_solver: Vec<Option<usize>>,
    /// `solver_to_ext[j] == i` iff `ext_to_solver[i] == Some(j)`.
    solver_to_ext: Vec<usize>,
}

impl BusIndexMapper {
    /// Scans `bus_status` in order and assigns dense ids to connected buses.
    pub fn build(bus_status: &[bool]) -> Self {
        let mut ext_to_solver = vec![None; bus_status.len()];
        let mut solver_to_ext = Vec::with_capacity(bus_status.len());
        for (ext, &connected) in bus_status.iter().enumerate() {
            if connected {
                ext_to_solver[ext] = Some(solver_to_ext.len());
                solver_to_ext.push(ext);
            }
        }
        Self {
            ext_to_solver,
            solver_to_ext,
        }
    }

    pub fn n_ext(&self) -> usize {
        self.ext_to_solver.len()
    }

    pub fn n_solver(&self) -> usize {
        self.solver_to_ext.len()
    }

    /// Returns the dense solver id for a connected external bus, `None` if
    /// the bus is out of range or disconnected.
    pub fn solver_id(&self, ext: usize) -> Option<usize> {
        self.ext_to_solver.get(ext).copied().flatten()
    }

    pub fn ext_id(&self, solver: usize) -> usize {
        self.solver_to_ext[solver]
    }

    /// Resolves an external bus id that is expected to be connected,
    /// surfacing [`PowerFlowError::InvalidBusId`] for a negative id and
    /// [`PowerFlowError::DisconnectedBusReferenced`] for a disconnected one.
    pub fn require_connected(
        &self,
        ext: i64,
        family: &'static str,
        element: usize,
    ) -> Result<usize> {
        if ext < 0 {
            return Err(PowerFlowError::InvalidBusId {
                family,
                element,
                bus: ext,
            });
        }
        self.solver_id(ext as usize)
            .ok_or(PowerFlowError::DisconnectedBusReferenced {
                family,
                element,
                bus: ext as usize,
            })
    }
}
