//! Storage: positive `P` is discharging (injection into the bus). Treated as
//! always-active; the "deactivate on zero P" policy mentioned in the source
//! comments is deliberately not implemented (spec §9 open question).

use serde::{Deserialize, Serialize};
use nalgebra::DVector;
use num_complex::Complex64;

use super::{Element, Triplets};
use crate::bus::BusIndexMapper;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
    pub in_service: bool,
    pub result: Option<StorageResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageResult {
    pub p_mw: f64,
    pub q_mvar: f64,
    pub vm_pu: f64,
}

impl Storage {
    pub fn new(bus: i64, p_mw: f64, q_mvar: f64, in_service: bool) -> Self {
        Self {
            bus,
            p_mw,
            q_mvar,
            in_service,
            result: None,
        }
    }

    pub fn compute_results(
        &mut self,
        v_solver: &DVector<Complex64>,
        buses: &BusIndexMapper,
        id: usize,
    ) {
        if !self.in_service {
            self.result = None;
            return;
        }
        let Ok(bus) = buses.require_connected(self.bus, Storage::FAMILY, id) else {
            self.result = None;
            return;
        };
        self.result = Some(StorageResult {
            p_mw: self.p_mw,
            q_mvar: self.q_mvar,
            vm_pu: v_solver[bus].norm(),
        });
    }
}

impl Element for Storage {
    const FAMILY: &'static str = "storage";

    fn in_service(&self) -> bool {
        self.in_service
    }

    fn stamp_y(
        &self,
        _id: usize,
        _ac: bool,
        _buses: &BusIndexMapper,
        _base_mva: f64,
        _triplets: &mut Triplets,
    ) -> Result<()> {
        Ok(())
    }

    fn stamp_s(
        &self,
        id: usize,
        _ac: bool,
        buses: &BusIndexMapper,
        base_mva: f64,
        s: &mut DVector<Complex64>,
    ) -> Result<()> {
        if !self.in_service {
            return Ok(());
        }
        let bus = buses.require_connected(self.bus, Storage::FAMILY, id)?;
        s[bus] += Complex64::new(self.p_mw, self.q_mvar) / base_mva;
        Ok(())
    }
}
