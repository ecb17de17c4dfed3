//! The facade: owns every element collection and the bus table, and drives
//! the per-solve state machine (spec §4.8):
//!
//! `clean -> (mutation) -> dirty -> pre_process_solver -> assembled ->
//! solver.compute_pf -> {converged|diverged} -> project_or_reset -> clean'`
//!
//! Any topology or setpoint mutation marks the grid dirty; the next
//! `ac_pf`/`dc_pf` call rebuilds the bus index mapper, bus classification,
//! and `Y`/`S` from scratch before solving. Convergence failure is
//! non-fatal (spec §7): it clears element results, leaves the grid dirty,
//! and returns the zero-length sentinel vector. Structural errors (raised
//! during `pre_process_solver`/assembly) restore nothing since they are
//! raised before any solver state is touched.

use std::time::Duration;

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;
use tracing::{debug, instrument, warn};

use crate::assembler::{apply_slack_correction, assemble, ElementFamilies};
use crate::bus::BusIndexMapper;
use crate::classifier::{classify, BusClassification};
use crate::elements::{Generator, Line, Load, Shunt, StaticGen, Storage, Transformer};
use crate::error::{PowerFlowError, Result};
use crate::projector::{project, ProjectionContext};
use crate::solver::{ac_pf as run_ac_pf, dc_pf as run_dc_pf, SolverState};
use crate::state::{GridState, STATE_VERSION};
use crate::topology::{resolve_target_bus, ElementEnd, ElementFamily, TopologyTables};

/// Owns the network and runs power flows against it.
pub struct Grid {
    sn_mva: f64,
    init_vm_pu: f64,
    bus_vn_kv: Vec<f64>,
    bus_status: Vec<bool>,

    lines: Vec<Line>,
    trafos: Vec<Transformer>,
    shunts: Vec<Shunt>,
    loads: Vec<Load>,
    gens: Vec<Generator>,
    sgens: Vec<StaticGen>,
    storages: Vec<Storage>,

    slack_gen_id: usize,
    topo_tables: TopologyTables,

    dirty: bool,
    buses: BusIndexMapper,
    classification: Option<BusClassification>,
    y: Option<CscMatrix<Complex64>>,
    s: Option<DVector<Complex64>>,

    solver_state: SolverState,
}

impl Grid {
    pub fn new(sn_mva: f64, bus_vn_kv: Vec<f64>, init_vm_pu: f64, slack_gen_id: usize) -> Self {
        let bus_status = vec![true; bus_vn_kv.len()];
        let buses = BusIndexMapper::build(&bus_status);
        Self {
            sn_mva,
            init_vm_pu,
            bus_vn_kv,
            bus_status,
            lines: Vec::new(),
            trafos: Vec::new(),
            shunts: Vec::new(),
            loads: Vec::new(),
            gens: Vec::new(),
            sgens: Vec::new(),
            storages: Vec::new(),
            slack_gen_id,
            topo_tables: TopologyTables::new(),
            dirty: true,
            buses,
            classification: None,
            y: None,
            s: None,
            solver_state: SolverState::default(),
        }
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // -- element registration --------------------------------------------

    pub fn add_line(&mut self, line: Line) -> usize {
        self.lines.push(line);
        self.mark_dirty();
        self.lines.len() - 1
    }

    pub fn add_trafo(&mut self, trafo: Transformer) -> usize {
        self.trafos.push(trafo);
        self.mark_dirty();
        self.trafos.len() - 1
    }

    pub fn add_shunt(&mut self, shunt: Shunt) -> usize {
        self.shunts.push(shunt);
        self.mark_dirty();
        self.shunts.len() - 1
    }

    pub fn add_load(&mut self, load: Load) -> usize {
        self.loads.push(load);
        self.mark_dirty();
        self.loads.len() - 1
    }

    pub fn add_gen(&mut self, gen: Generator) -> usize {
        self.gens.push(gen);
        self.mark_dirty();
        self.gens.len() - 1
    }

    pub fn add_sgen(&mut self, sgen: StaticGen) -> usize {
        self.sgens.push(sgen);
        self.mark_dirty();
        self.sgens.len() - 1
    }

    pub fn add_storage(&mut self, storage: Storage) -> usize {
        self.storages.push(storage);
        self.mark_dirty();
        self.storages.len() - 1
    }

    pub fn register_topo_slot(&mut self, family: ElementFamily, element_id: usize, end: ElementEnd, substation_id: usize) {
        self.topo_tables.push(family, element_id, end, substation_id);
    }

    // -- topology mutations ------------------------------------------------

    pub fn set_line_active(&mut self, id: usize, active: bool) {
        self.lines[id].in_service = active;
        self.mark_dirty();
    }

    pub fn set_trafo_active(&mut self, id: usize, active: bool) {
        self.trafos[id].in_service = active;
        self.mark_dirty();
    }

    pub fn set_gen_active(&mut self, id: usize, active: bool) {
        self.gens[id].in_service = active;
        self.mark_dirty();
    }

    pub fn set_load_active(&mut self, id: usize, active: bool) {
        self.loads[id].in_service = active;
        self.mark_dirty();
    }

    pub fn set_sgen_active(&mut self, id: usize, active: bool) {
        self.sgens[id].in_service = active;
        self.mark_dirty();
    }

    pub fn set_storage_active(&mut self, id: usize, active: bool) {
        self.storages[id].in_service = active;
        self.mark_dirty();
    }

    pub fn set_line_endpoint(&mut self, id: usize, end: ElementEnd, bus: i64) {
        match end {
            ElementEnd::From => self.lines[id].from_bus = bus,
            ElementEnd::To => self.lines[id].to_bus = bus,
            ElementEnd::Only => unreachable!("line has two ends"),
        }
        self.mark_dirty();
    }

    pub fn set_trafo_endpoint(&mut self, id: usize, end: ElementEnd, bus: i64) {
        match end {
            ElementEnd::From => self.trafos[id].hv_bus = bus,
            ElementEnd::To => self.trafos[id].lv_bus = bus,
            ElementEnd::Only => unreachable!("trafo has two ends"),
        }
        self.mark_dirty();
    }

    // -- continuous setpoint mutations -------------------------------------

    pub fn set_gen_p(&mut self, id: usize, p_mw: f64) {
        self.gens[id].p_mw = p_mw;
        self.mark_dirty();
    }

    pub fn set_gen_v(&mut self, id: usize, vm_pu: f64) {
        self.gens[id].vm_pu = vm_pu;
        self.mark_dirty();
    }

    pub fn set_load_p(&mut self, id: usize, p_mw: f64) {
        self.loads[id].p_mw = p_mw;
        self.mark_dirty();
    }

    pub fn set_load_q(&mut self, id: usize, q_mvar: f64) {
        self.loads[id].q_mvar = q_mvar;
        self.mark_dirty();
    }

    pub fn set_storage_p(&mut self, id: usize, p_mw: f64) {
        self.storages[id].p_mw = p_mw;
        self.mark_dirty();
    }

    // -- vectorized environment-facing topology API (spec §6) --------------

    /// `active[i] = [busbar0_active, busbar1_active]` for original bus `i`.
    /// Splits every original bus into two virtual buses at offset
    /// `nb_bus_before`, resizing `bus_status`/`bus_vn_kv` on first call.
    #[instrument(skip(self, active))]
    pub fn update_bus_status(&mut self, nb_bus_before: usize, active: &[[bool; 2]]) {
        let total = nb_bus_before * 2;
        if self.bus_status.len() < total {
            self.bus_status.resize(total, false);
            let base = self.bus_vn_kv.clone();
            self.bus_vn_kv.resize(total, 0.0);
            for i in 0..nb_bus_before {
                self.bus_vn_kv[nb_bus_before + i] = base.get(i).copied().unwrap_or(0.0);
            }
        }
        for (i, &[bb0, bb1]) in active.iter().enumerate().take(nb_bus_before) {
            self.bus_status[i] = bb0;
            self.bus_status[nb_bus_before + i] = bb1;
        }
        debug!(nb_bus_before, "updated bus status");
        self.mark_dirty();
    }

    /// `has_changed[pos]` gates whether topology-vector position `pos` is
    /// applied this call; `new_values[pos]` is interpreted per spec §6:
    /// `<=0` deactivates the element, `1`/`2` reconnects it to busbar 0/1 of
    /// its substation.
    #[instrument(skip(self, has_changed, new_values))]
    pub fn update_topo(&mut self, has_changed: &[bool], new_values: &[i32], n_sub: usize) {
        let slots = self.topo_tables.slots.clone();
        for (pos, slot) in slots.iter().enumerate() {
            if !has_changed.get(pos).copied().unwrap_or(false) {
                continue;
            }
            let value = new_values.get(pos).copied().unwrap_or(0);
            let target = resolve_target_bus(slot, value, n_sub);
            self.apply_topo_slot(slot.family, slot.element_id, slot.end, target);
        }
        self.mark_dirty();
    }

    fn apply_topo_slot(
        &mut self,
        family: ElementFamily,
        element_id: usize,
        end: ElementEnd,
        target: Option<i64>,
    ) {
        let active = target.is_some();
        match family {
            ElementFamily::Line => {
                if let Some(bus) = target {
                    self.set_line_endpoint(element_id, end, bus);
                }
                self.lines[element_id].in_service = active;
            }
            ElementFamily::Transformer => {
                if let Some(bus) = target {
                    self.set_trafo_endpoint(element_id, end, bus);
                }
                self.trafos[element_id].in_service = active;
            }
            ElementFamily::Generator => {
                if let Some(bus) = target {
                    self.gens[element_id].bus = bus;
                }
                self.gens[element_id].in_service = active;
            }
            ElementFamily::Load => {
                if let Some(bus) = target {
                    self.loads[element_id].bus = bus;
                }
                self.loads[element_id].in_service = active;
            }
            ElementFamily::StaticGen => {
                if let Some(bus) = target {
                    self.sgens[element_id].bus = bus;
                }
                self.sgens[element_id].in_service = active;
            }
            ElementFamily::Storage => {
                if let Some(bus) = target {
                    self.storages[element_id].bus = bus;
                }
                self.storages[element_id].in_service = active;
            }
        }
    }

    pub fn update_gens_p(&mut self, has_changed: &[bool], new_values: &[f64]) {
        for (id, &changed) in has_changed.iter().enumerate() {
            if changed {
                self.gens[id].p_mw = new_values[id];
            }
        }
        self.mark_dirty();
    }

    pub fn update_gens_v(&mut self, has_changed: &[bool], new_values: &[f64]) {
        for (id, &changed) in has_changed.iter().enumerate() {
            if changed {
                self.gens[id].vm_pu = new_values[id];
            }
        }
        self.mark_dirty();
    }

    pub fn update_loads_p(&mut self, has_changed: &[bool], new_values: &[f64]) {
        for (id, &changed) in has_changed.iter().enumerate() {
            if changed {
                self.loads[id].p_mw = new_values[id];
            }
        }
        self.mark_dirty();
    }

    pub fn update_loads_q(&mut self, has_changed: &[bool], new_values: &[f64]) {
        for (id, &changed) in has_changed.iter().enumerate() {
            if changed {
                self.loads[id].q_mvar = new_values[id];
            }
        }
        self.mark_dirty();
    }

    pub fn update_storages_p(&mut self, has_changed: &[bool], new_values: &[f64]) {
        for (id, &changed) in has_changed.iter().enumerate() {
            if changed {
                self.storages[id].p_mw = new_values[id];
            }
        }
        self.mark_dirty();
    }

    // -- solve pipeline ------------------------------------------------------

    /// Rebuilds the bus index mapper and classification from current state
    /// (spec §4.8 `dirty -> pre_process_solver`). Structural errors here
    /// leave `self` otherwise untouched.
    fn pre_process_solver(&mut self) -> Result<()> {
        self.buses = BusIndexMapper::build(&self.bus_status);
        self.classification = Some(classify(&self.buses, &self.gens, self.slack_gen_id)?);
        Ok(())
    }

    fn families(&self) -> ElementFamilies<'_> {
        ElementFamilies {
            lines: &self.lines,
            trafos: &self.trafos,
            shunts: &self.shunts,
            loads: &self.loads,
            gens: &self.gens,
            sgens: &self.sgens,
            storages: &self.storages,
        }
    }

    fn default_v0(&self) -> DVector<Complex64> {
        let k = self.buses.n_solver();
        let mut v = DVector::from_element(k, Complex64::new(self.init_vm_pu, 0.0));
        for gen in self.gens.iter().filter(|g| g.in_service && g.bus >= 0) {
            if let Some(solver_id) = self.buses.solver_id(gen.bus as usize) {
                v[solver_id] = Complex64::new(gen.vm_pu, 0.0);
            }
        }
        v
    }

    /// Runs AC Newton-Raphson (spec §4.5, §4.8). `v0` seeds the initial
    /// guess; pass an empty vector to use the grid's default flat/generator
    /// start. Returns the zero-length sentinel on non-convergence rather
    /// than an `Err` (spec §7).
    #[instrument(skip(self, v0))]
    pub fn ac_pf(&mut self, v0: &[Complex64], max_iter: usize, tol: f64) -> Result<DVector<Complex64>> {
        self.pre_process_solver()?;
        let classification = self.classification.clone().expect("set by pre_process_solver");

        let mut assembled = assemble(&self.families(), true, &self.buses, self.sn_mva)?;
        apply_slack_correction(&mut assembled.s, classification.slack);

        let v_init = if v0.is_empty() {
            self.default_v0()
        } else {
            if v0.len() != self.buses.n_solver() {
                return Err(PowerFlowError::InputSizeMismatch {
                    expected: self.buses.n_solver(),
                    actual: v0.len(),
                });
            }
            DVector::from_row_slice(v0)
        };

        self.y = Some(assembled.y.clone());
        self.s = Some(assembled.s.clone());

        match run_ac_pf(
            &assembled.y,
            &assembled.s,
            &v_init,
            &classification.pv,
            &classification.pq,
            max_iter,
            tol,
            &mut self.solver_state,
        ) {
            Ok(solution) => {
                debug!(iterations = solution.iterations, "ac_pf converged");
                self.run_projection(&assembled.y, &solution.v, classification.slack);
                self.dirty = false;
                Ok(solution.v)
            }
            Err(err) => {
                warn!(%err, "ac_pf did not converge");
                self.clear_results();
                self.dirty = true;
                Ok(DVector::zeros(0))
            }
        }
    }

    /// Runs the DC (linearized) power flow (spec §4.6, §4.8). Same
    /// convergence-sentinel convention as [`Grid::ac_pf`], though DC failure
    /// (`DcSingular`) only occurs for a structurally singular `B` (e.g. an
    /// islanded bus), which is effectively always structural rather than a
    /// non-convergence outcome; it is still surfaced as an error.
    #[instrument(skip(self, v0))]
    pub fn dc_pf(&mut self, v0: &[Complex64]) -> Result<DVector<Complex64>> {
        self.pre_process_solver()?;
        let classification = self.classification.clone().expect("set by pre_process_solver");

        let assembled = assemble(&self.families(), false, &self.buses, self.sn_mva)?;
        let v_init = if v0.is_empty() {
            self.default_v0()
        } else {
            if v0.len() != self.buses.n_solver() {
                return Err(PowerFlowError::InputSizeMismatch {
                    expected: self.buses.n_solver(),
                    actual: v0.len(),
                });
            }
            DVector::from_row_slice(v0)
        };

        self.y = Some(assembled.y.clone());
        self.s = Some(assembled.s.clone());

        let connected: Vec<bool> = (0..self.buses.n_solver()).map(|_| true).collect();
        let solution = run_dc_pf(
            &assembled.y,
            &assembled.s,
            &v_init,
            &classification.pv,
            classification.slack,
            &connected,
        )?;

        self.run_projection(&assembled.y, &solution.v, classification.slack);
        self.dirty = false;
        Ok(solution.v)
    }

    fn run_projection(&mut self, y: &CscMatrix<Complex64>, v: &DVector<Complex64>, _slack: usize) {
        let ctx = ProjectionContext {
            v,
            y,
            buses: &self.buses,
            base_mva: self.sn_mva,
            bus_vn_kv: &self.bus_vn_kv,
            slack_gen_id: self.slack_gen_id,
        };
        project(
            &ctx,
            &mut self.lines,
            &mut self.trafos,
            &mut self.shunts,
            &mut self.loads,
            &mut self.gens,
            &mut self.sgens,
            &mut self.storages,
        );
    }

    fn clear_results(&mut self) {
        for l in &mut self.lines {
            l.result = None;
        }
        for t in &mut self.trafos {
            t.result = None;
        }
        for s in &mut self.shunts {
            s.result = None;
        }
        for l in &mut self.loads {
            l.result = None;
        }
        for g in &mut self.gens {
            g.result = None;
        }
        for s in &mut self.sgens {
            s.result = None;
        }
        for s in &mut self.storages {
            s.result = None;
        }
    }

    /// Checks a candidate solution's Kirchhoff mismatch against `tol`
    /// (spec §4.8 `check_solution`). When `enforce_limits` is set, also
    /// requires every in-service generator's reconstructed Q (if projected)
    /// to lie within its `[q_min, q_max]` band.
    pub fn check_solution(&self, v: &DVector<Complex64>, tol: f64, enforce_limits: bool) -> bool {
        let (Some(y), Some(s)) = (&self.y, &self.s) else {
            return false;
        };
        if v.len() != y.nrows() {
            return false;
        }
        let mismatch = v.component_mul(&(y * v).conjugate()) - s;
        if mismatch.iter().any(|m| m.norm() > tol) {
            return false;
        }
        if enforce_limits {
            for gen in &self.gens {
                if !gen.in_service {
                    continue;
                }
                if let Some(result) = gen.result {
                    if result.q_mvar < gen.q_min_mvar - tol || result.q_mvar > gen.q_max_mvar + tol {
                        return false;
                    }
                }
            }
        }
        true
    }

    // -- accessors ------------------------------------------------------------

    pub fn y(&self) -> Option<&CscMatrix<Complex64>> {
        self.y.as_ref()
    }

    pub fn s(&self) -> Option<&DVector<Complex64>> {
        self.s.as_ref()
    }

    pub fn pv(&self) -> &[usize] {
        self.classification.as_ref().map_or(&[], |c| &c.pv)
    }

    pub fn pq(&self) -> &[usize] {
        self.classification.as_ref().map_or(&[], |c| &c.pq)
    }

    pub fn jacobian(&self) -> Option<&CscMatrix<f64>> {
        self.solver_state.jacobian.as_ref()
    }

    pub fn v(&self) -> &DVector<Complex64> {
        &self.solver_state.v
    }

    pub fn iterations(&self) -> usize {
        self.solver_state.iterations
    }

    pub fn elapsed(&self) -> Duration {
        self.solver_state.elapsed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn buses(&self) -> &BusIndexMapper {
        &self.buses
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn trafos(&self) -> &[Transformer] {
        &self.trafos
    }

    pub fn shunts(&self) -> &[Shunt] {
        &self.shunts
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn gens(&self) -> &[Generator] {
        &self.gens
    }

    pub fn sgens(&self) -> &[StaticGen] {
        &self.sgens
    }

    pub fn storages(&self) -> &[Storage] {
        &self.storages
    }

    /// Discards solver warm-start state and marks the grid dirty, forcing
    /// the next solve to rebuild everything from scratch.
    pub fn reset(&mut self) {
        self.solver_state.clear();
        self.y = None;
        self.s = None;
        self.classification = None;
        self.dirty = true;
    }

    // -- snapshot/restore (spec §6) --------------------------------------------

    pub fn snapshot(&self) -> GridState {
        GridState {
            version: STATE_VERSION.to_string(),
            init_vm_pu: self.init_vm_pu,
            sn_mva: self.sn_mva,
            bus_vn_kv: self.bus_vn_kv.clone(),
            bus_status: self.bus_status.clone(),
            lines_state: self.lines.clone(),
            shunts_state: self.shunts.clone(),
            trafos_state: self.trafos.clone(),
            gens_state: self.gens.clone(),
            loads_state: self.loads.clone(),
            sgens_state: self.sgens.clone(),
            storages_state: self.storages.clone(),
            slack_gen_id: self.slack_gen_id,
        }
    }

    pub fn restore(&mut self, state: GridState) {
        self.init_vm_pu = state.init_vm_pu;
        self.sn_mva = state.sn_mva;
        self.bus_vn_kv = state.bus_vn_kv;
        self.bus_status = state.bus_status;
        self.lines = state.lines_state;
        self.shunts = state.shunts_state;
        self.trafos = state.trafos_state;
        self.gens = state.gens_state;
        self.loads = state.loads_state;
        self.sgens = state.sgens_state;
        self.storages = state.storages_state;
        self.slack_gen_id = state.slack_gen_id;
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn two_bus_grid() -> Grid {
        let mut grid = Grid::new(100.0, vec![138.0, 138.0], 1.0, 0);
        grid.add_gen(Generator::new(0, 0.0, 1.02, -100.0, 100.0, true));
        grid.add_line(Line::new(0, 1, 0.01, 0.1, Complex64::new(0.0, 0.0), true));
        grid.add_load(Load::new(1, 50.0, 20.0, true));
        grid
    }

    #[test]
    fn ac_pf_converges_for_two_bus_scenario() {
        let mut grid = two_bus_grid();
        let v = grid.ac_pf(&[], 10, 1e-8).unwrap();
        assert_eq!(v.len(), 2);
        assert!((v[1].re - 1.0118).abs() < 1e-3);
    }

    #[test]
    fn slack_disconnect_is_an_error() {
        let mut grid = two_bus_grid();
        grid.bus_status[0] = false;
        let err = grid.ac_pf(&[], 10, 1e-8).unwrap_err();
        assert!(matches!(err, PowerFlowError::SlackDisconnected { .. }));
    }

    #[test]
    fn dc_pf_matches_ac_angle_for_lossless_line() {
        let mut grid = Grid::new(100.0, vec![138.0, 138.0], 1.0, 0);
        grid.add_gen(Generator::new(0, 0.0, 1.0, -100.0, 100.0, true));
        grid.add_line(Line::new(0, 1, 0.0, 0.1, Complex64::new(0.0, 0.0), true));
        grid.add_load(Load::new(1, 50.0, 0.0, true));
        let v_dc = grid.dc_pf(&[]).unwrap();
        assert!((v_dc[1].arg() - (-0.05)).abs() < 1e-6);
    }

    #[test]
    fn islanded_bus_yields_singular_error() {
        let mut grid = Grid::new(100.0, vec![138.0, 138.0, 138.0], 1.0, 0);
        grid.add_gen(Generator::new(0, 0.0, 1.0, -100.0, 100.0, true));
        // bus 2 only connects to bus 1, but bus 1 has no generator and no
        // path back to the slack at bus 0: island.
        grid.add_load(Load::new(2, 10.0, 0.0, true));
        let err = grid.dc_pf(&[]);
        assert!(err.is_err());
    }

    #[test]
    fn snapshot_round_trips_through_restore() {
        let mut grid = two_bus_grid();
        grid.ac_pf(&[], 10, 1e-8).unwrap();
        let snap = grid.snapshot();
        let mut restored = Grid::new(1.0, vec![], 1.0, 0);
        restored.restore(snap);
        assert_eq!(restored.lines.len(), 1);
        assert_eq!(restored.gens.len(), 1);
        assert!(restored.is_dirty());
    }
}
