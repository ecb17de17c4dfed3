//! Computes per-element P/Q/V/I from the solved voltage and the original
//! topology (spec §4.7).

use std::collections::HashMap;

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::bus::BusIndexMapper;
use crate::elements::{Generator, Line, Load, Shunt, StaticGen, Storage, Transformer};

pub struct ProjectionContext<'a> {
    pub v: &'a DVector<Complex64>,
    pub y: &'a CscMatrix<Complex64>,
    pub buses: &'a BusIndexMapper,
    pub base_mva: f64,
    pub bus_vn_kv: &'a [f64],
    pub slack_gen_id: usize,
}

#[allow(clippy::too_many_arguments)]
pub fn project(
    ctx: &ProjectionContext,
    lines: &mut [Line],
    trafos: &mut [Transformer],
    shunts: &mut [Shunt],
    loads: &mut [Load],
    gens: &mut [Generator],
    sgens: &mut [StaticGen],
    storages: &mut [Storage],
) {
    for (id, line) in lines.iter_mut().enumerate() {
        let v_base = ctx.bus_vn_kv.get(line.from_bus.max(0) as usize).copied().unwrap_or(1.0);
        line.compute_results(ctx.v, ctx.buses, ctx.base_mva, id, v_base);
    }
    for (id, trafo) in trafos.iter_mut().enumerate() {
        let v_hv = ctx.bus_vn_kv.get(trafo.hv_bus.max(0) as usize).copied().unwrap_or(1.0);
        let v_lv = ctx.bus_vn_kv.get(trafo.lv_bus.max(0) as usize).copied().unwrap_or(1.0);
        trafo.compute_results(ctx.v, ctx.buses, ctx.base_mva, id, v_hv, v_lv);
    }
    for (id, shunt) in shunts.iter_mut().enumerate() {
        shunt.compute_results(ctx.v, ctx.buses, id);
    }
    for (id, load) in loads.iter_mut().enumerate() {
        load.compute_results(ctx.v, ctx.buses, id);
    }
    for (id, sgen) in sgens.iter_mut().enumerate() {
        sgen.compute_results(ctx.v, ctx.buses, id);
    }
    for (id, storage) in storages.iter_mut().enumerate() {
        storage.compute_results(ctx.v, ctx.buses, id);
    }

    project_generators(ctx, loads, gens, sgens, storages);
}

/// Reconstructs each generator's Q (and, for the slack generator, its extra
/// P residual) from the network-demanded injection at its bus (spec §4.7):
/// `Q_computed_bus - (sum of other elements' signed Q contributions)`,
/// split across co-located generators proportionally to their Q-limit
/// spread (equal split falls out naturally when every spread is equal).
fn project_generators(
    ctx: &ProjectionContext,
    loads: &[Load],
    gens: &mut [Generator],
    sgens: &[StaticGen],
    storages: &[Storage],
) {
    let s_computed = ctx.v.component_mul(&(ctx.y * ctx.v).conjugate());

    let mut other_s_by_bus: HashMap<i64, Complex64> = HashMap::new();
    for load in loads.iter().filter(|l| l.in_service) {
        *other_s_by_bus.entry(load.bus).or_default() -=
            Complex64::new(load.p_mw, load.q_mvar) / ctx.base_mva;
    }
    for sgen in sgens.iter().filter(|s| s.in_service) {
        *other_s_by_bus.entry(sgen.bus).or_default() +=
            Complex64::new(sgen.p_mw, sgen.q_mvar) / ctx.base_mva;
    }
    for storage in storages.iter().filter(|s| s.in_service) {
        *other_s_by_bus.entry(storage.bus).or_default() +=
            Complex64::new(storage.p_mw, storage.q_mvar) / ctx.base_mva;
    }

    let mut gens_by_bus: HashMap<i64, Vec<usize>> = HashMap::new();
    for (id, gen) in gens.iter().enumerate() {
        if gen.in_service {
            gens_by_bus.entry(gen.bus).or_default().push(id);
        }
    }

    for (bus, gen_ids) in gens_by_bus {
        let Some(solver_id) = ctx.buses.solver_id(bus as usize) else {
            continue;
        };
        let other = other_s_by_bus.get(&bus).copied().unwrap_or_default();
        let residual = s_computed[solver_id] - other;
        let total_q_mvar = residual.im * ctx.base_mva;

        let weights: Vec<f64> = gen_ids
            .iter()
            .map(|&id| (gens[id].q_max_mvar - gens[id].q_min_mvar).max(0.0))
            .collect();
        let weight_sum: f64 = weights.iter().sum();

        for (i, &id) in gen_ids.iter().enumerate() {
            let share = if weight_sum > 0.0 {
                weights[i] / weight_sum
            } else {
                1.0 / gen_ids.len() as f64
            };
            let mut q_mvar = total_q_mvar * share;
            let mut q_limit_hit = false;
            let (qmin, qmax) = (gens[id].q_min_mvar, gens[id].q_max_mvar);
            if q_mvar > qmax {
                q_mvar = qmax;
                q_limit_hit = true;
            } else if q_mvar < qmin {
                q_mvar = qmin;
                q_limit_hit = true;
            }

            let mut p_mw = gens[id].p_mw;
            if id == ctx.slack_gen_id {
                p_mw = residual.re * ctx.base_mva;
            }

            gens[id].result = Some(crate::elements::generator::GeneratorResult {
                p_mw,
                q_mvar,
                vm_pu: ctx.v[solver_id].norm(),
                q_limit_hit,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{assemble, ElementFamilies};
    use crate::solver::{ac_pf, SolverState};

    #[test]
    fn generator_q_clamped_at_limit_when_demand_exceeds_it() {
        // spec §8 scenario (c): slack V=1.05, PV gen at bus1 with
        // Qmin=-10 Qmax=10, load at bus1 needs Q > 10 MVAr.
        let status = vec![true, true];
        let buses = BusIndexMapper::build(&status);
        let lines = vec![Line::new(0, 1, 0.01, 0.1, Complex64::new(0.0, 0.0), true)];
        let trafos = vec![];
        let shunts = vec![];
        let loads = vec![Load::new(1, 30.0, 25.0, true)];
        let mut gens = vec![
            Generator::new(0, 0.0, 1.05, -1e9, 1e9, true),
            Generator::new(1, 20.0, 1.02, -10.0, 10.0, true),
        ];
        let sgens = vec![];
        let storages = vec![];
        let families = ElementFamilies {
            lines: &lines,
            trafos: &trafos,
            shunts: &shunts,
            loads: &loads,
            gens: &gens,
            sgens: &sgens,
            storages: &storages,
        };
        let mut assembled = assemble(&families, true, &buses, 100.0).unwrap();
        crate::assembler::apply_slack_correction(&mut assembled.s, 0);

        let v_init = DVector::from_vec(vec![
            Complex64::new(1.05, 0.0),
            Complex64::new(1.02, 0.0),
        ]);
        let mut state = SolverState::default();
        let solution = ac_pf(
            &assembled.y,
            &assembled.s,
            &v_init,
            &[1],
            &[],
            10,
            1e-8,
            &mut state,
        )
        .unwrap();

        let ctx = ProjectionContext {
            v: &solution.v,
            y: &assembled.y,
            buses: &buses,
            base_mva: 100.0,
            bus_vn_kv: &[138.0, 138.0],
            slack_gen_id: 0,
        };
        let mut lines_mut = lines;
        let mut trafos_mut = trafos;
        let mut shunts_mut = shunts;
        let mut loads_mut = loads;
        let mut sgens_mut = sgens;
        let mut storages_mut = storages;
        project(
            &ctx,
            &mut lines_mut,
            &mut trafos_mut,
            &mut shunts_mut,
            &mut loads_mut,
            &mut gens,
            &mut sgens_mut,
            &mut storages_mut,
        );

        let result = gens[1].result.unwrap();
        assert!((result.q_mvar - 10.0).abs() < 1e-9);
        assert!(result.q_limit_hit);
    }
}
