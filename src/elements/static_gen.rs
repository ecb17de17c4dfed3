//! Static generator: constant-power, modeled as negative load (spec §3).

use serde::{Deserialize, Serialize};
use nalgebra::DVector;
use num_complex::Complex64;

use super::{Element, Triplets};
use crate::bus::BusIndexMapper;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticGen {
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
    pub q_min_mvar: f64,
    pub q_max_mvar: f64,
    pub in_service: bool,
    pub result: Option<StaticGenResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StaticGenResult {
    pub p_mw: f64,
    pub q_mvar: f64,
    pub vm_pu: f64,
}

impl StaticGen {
    pub fn new(
        bus: i64,
        p_mw: f64,
        q_mvar: f64,
        q_min_mvar: f64,
        q_max_mvar: f64,
        in_service: bool,
    ) -> Self {
        Self {
            bus,
            p_mw,
            q_mvar,
            q_min_mvar,
            q_max_mvar,
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
        let Ok(bus) = buses.require_connected(self.bus, StaticGen::FAMILY, id) else {
            self.result = None;
            return;
        };
        self.result = Some(StaticGenResult {
            p_mw: self.p_mw,
            q_mvar: self.q_mvar,
            vm_pu: v_solver[bus].norm(),
        });
    }
}

impl Element for StaticGen {
    const FAMILY: &'static str = "sgen";

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
        let bus = buses.require_connected(self.bus, StaticGen::FAMILY, id)?;
        s[bus] += Complex64::new(self.p_mw, self.q_mvar) / base_mva;
        Ok(())
    }
}
