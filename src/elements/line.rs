//! Transmission line (branch) element: π-model series impedance plus total
//! shunt charging, split half per end (spec §3, §6).
//!
//! Stamping formulas are grounded on the teacher's pandapower line converter
//! (`examples/chengts95-rustpower/src/io/pandapower/network_converter.rs::line_to_admit`),
//! generalized from raw ohm/km + length to the already-per-unit r/x/h this
//! engine's elements store.

use serde::{Deserialize, Serialize};
use nalgebra::DVector;
use num_complex::Complex64;

use super::{Element, Triplets};
use crate::bus::BusIndexMapper;
use crate::error::{PowerFlowError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub from_bus: i64,
    pub to_bus: i64,
    /// Series resistance, pu.
    pub r: f64,
    /// Series reactance, pu.
    pub x: f64,
    /// Total shunt charging admittance, pu (split h/2 at each end).
    pub h: Complex64,
    pub in_service: bool,
    pub result: Option<LineResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LineResult {
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    pub i_from_ka: f64,
    pub i_to_ka: f64,
}

impl Line {
    pub fn new(from_bus: i64, to_bus: i64, r: f64, x: f64, h: Complex64, in_service: bool) -> Self {
        Self {
            from_bus,
            to_bus,
            r,
            x,
            h,
            in_service,
            result: None,
        }
    }

    fn y_series(&self) -> Complex64 {
        Complex64::new(self.r, self.x).finv()
    }

    fn endpoints(&self, buses: &BusIndexMapper, id: usize) -> Result<(usize, usize)> {
        let f = buses.require_connected(self.from_bus, Line::FAMILY, id)?;
        let t = buses.require_connected(self.to_bus, Line::FAMILY, id)?;
        Ok((f, t))
    }

    /// Computes from/to-end complex power and current magnitude (kA) from
    /// the solved voltage phasors at both ends (spec §4.7).
    pub fn compute_results(
        &mut self,
        v_solver: &DVector<Complex64>,
        buses: &BusIndexMapper,
        base_mva: f64,
        id: usize,
        v_base_kv: f64,
    ) {
        if !self.in_service {
            self.result = None;
            return;
        }
        let Ok((f, t)) = self.endpoints(buses, id) else {
            self.result = None;
            return;
        };
        let vf = v_solver[f];
        let vt = v_solver[t];
        let y = self.y_series();
        let half_shunt = self.h / 2.0;

        let i_from = (vf - vt) * y + vf * half_shunt;
        let i_to = (vt - vf) * y + vt * half_shunt;
        let s_from = vf * i_from.conj();
        let s_to = vt * i_to.conj();

        let i_base_ka = base_mva / (v_base_kv * 3f64.sqrt());
        self.result = Some(LineResult {
            p_from_mw: s_from.re * base_mva,
            q_from_mvar: s_from.im * base_mva,
            p_to_mw: s_to.re * base_mva,
            q_to_mvar: s_to.im * base_mva,
            i_from_ka: i_from.norm() * i_base_ka,
            i_to_ka: i_to.norm() * i_base_ka,
        });
    }
}

trait ComplexInv {
    fn finv(self) -> Self;
}
impl ComplexInv for Complex64 {
    fn finv(self) -> Self {
        Complex64::new(1.0, 0.0) / self
    }
}

impl Element for Line {
    const FAMILY: &'static str = "line";

    fn in_service(&self) -> bool {
        self.in_service
    }

    fn stamp_y(
        &self,
        id: usize,
        ac: bool,
        buses: &BusIndexMapper,
        _base_mva: f64,
        triplets: &mut Triplets,
    ) -> Result<()> {
        if !self.in_service {
            return Ok(());
        }
        let (f, t) = self.endpoints(buses, id)?;
        if ac {
            let y = self.y_series();
            let half_shunt = self.h / 2.0;
            triplets.push((f, f, y + half_shunt));
            triplets.push((t, t, y + half_shunt));
            triplets.push((f, t, -y));
            triplets.push((t, f, -y));
        } else {
            if self.x == 0.0 {
                return Err(PowerFlowError::DcSingular {
                    reason: format!("line {id} has zero reactance"),
                });
            }
            let b = 1.0 / self.x;
            triplets.push((f, f, Complex64::new(b, 0.0)));
            triplets.push((t, t, Complex64::new(b, 0.0)));
            triplets.push((f, t, Complex64::new(-b, 0.0)));
            triplets.push((t, f, Complex64::new(-b, 0.0)));
        }
        Ok(())
    }

    fn stamp_s(
        &self,
        _id: usize,
        _ac: bool,
        _buses: &BusIndexMapper,
        _base_mva: f64,
        _s: &mut DVector<Complex64>,
    ) -> Result<()> {
        Ok(())
    }
}
