//! Fixed shunt: AC stamps a diagonal Y entry; DC stamps its active power into
//! S directly (spec §3, §4.6). See `DESIGN.md` for why the same element
//! contributes through different primitives depending on `ac_flag`.

use serde::{Deserialize, Serialize};
use nalgebra::DVector;
use num_complex::Complex64;

use super::{Element, Triplets};
use crate::bus::BusIndexMapper;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shunt {
    pub bus: i64,
    /// Active power at 1 pu voltage, MW.
    pub p_mw: f64,
    /// Reactive power at 1 pu voltage, MVAr (positive = inductive).
    pub q_mvar: f64,
    pub in_service: bool,
    pub result: Option<ShuntResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShuntResult {
    pub p_mw: f64,
    pub q_mvar: f64,
    pub vm_pu: f64,
}

impl Shunt {
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
        let Ok(bus) = buses.require_connected(self.bus, Shunt::FAMILY, id) else {
            self.result = None;
            return;
        };
        self.result = Some(ShuntResult {
            p_mw: self.p_mw,
            q_mvar: self.q_mvar,
            vm_pu: v_solver[bus].norm(),
        });
    }
}

impl Element for Shunt {
    const FAMILY: &'static str = "shunt";

    fn in_service(&self) -> bool {
        self.in_service
    }

    fn stamp_y(
        &self,
        id: usize,
        ac: bool,
        buses: &BusIndexMapper,
        base_mva: f64,
        triplets: &mut Triplets,
    ) -> Result<()> {
        if !self.in_service || !ac {
            return Ok(());
        }
        let bus = buses.require_connected(self.bus, Shunt::FAMILY, id)?;
        let y = -Complex64::new(self.p_mw, self.q_mvar) / base_mva;
        triplets.push((bus, bus, y));
        Ok(())
    }

    fn stamp_s(
        &self,
        id: usize,
        ac: bool,
        buses: &BusIndexMapper,
        base_mva: f64,
        s: &mut DVector<Complex64>,
    ) -> Result<()> {
        if !self.in_service || ac {
            return Ok(());
        }
        let bus = buses.require_connected(self.bus, Shunt::FAMILY, id)?;
        s[bus] -= Complex64::new(self.p_mw / base_mva, 0.0);
        Ok(())
    }
}
