//! Voltage-controlled (PV) generator: contributes `+P` to S and marks its
//! bus PV unless the bus is slack (spec §3, §4.1, §4.4).

use serde::{Deserialize, Serialize};
use nalgebra::DVector;
use num_complex::Complex64;

use super::{Element, Triplets};
use crate::bus::BusIndexMapper;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    pub bus: i64,
    /// Active power setpoint, MW.
    pub p_mw: f64,
    /// Voltage magnitude setpoint, pu.
    pub vm_pu: f64,
    pub q_min_mvar: f64,
    pub q_max_mvar: f64,
    pub in_service: bool,
    pub result: Option<GeneratorResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorResult {
    pub p_mw: f64,
    pub q_mvar: f64,
    pub vm_pu: f64,
    /// Set when the reconstructed Q hit `q_min`/`q_max` (spec §4.7, seed
    /// scenario (c)); informational only, never enforced during iteration.
    pub q_limit_hit: bool,
}

impl Generator {
    pub fn new(
        bus: i64,
        p_mw: f64,
        vm_pu: f64,
        q_min_mvar: f64,
        q_max_mvar: f64,
        in_service: bool,
    ) -> Self {
        Self {
            bus,
            p_mw,
            vm_pu,
            q_min_mvar,
            q_max_mvar,
            in_service,
            result: None,
        }
    }
}

impl Element for Generator {
    const FAMILY: &'static str = "gen";

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
        let bus = buses.require_connected(self.bus, Generator::FAMILY, id)?;
        s[bus] += Complex64::new(self.p_mw / base_mva, 0.0);
        Ok(())
    }
}

impl Generator {
    /// Marks this generator's bus PV unless it is the slack bus
    /// (spec §4.1, §4.4). Returns `Ok(false)` if the bus is disconnected or
    /// the generator inactive (no classification contributed).
    pub fn classify_pv(
        &self,
        id: usize,
        slack_solver_id: usize,
        buses: &BusIndexMapper,
        pv: &mut [bool],
    ) -> Result<bool> {
        if !self.in_service {
            return Ok(false);
        }
        let bus = buses.require_connected(self.bus, Generator::FAMILY, id)?;
        if bus != slack_solver_id {
            pv[bus] = true;
            return Ok(true);
        }
        Ok(false)
    }
}
