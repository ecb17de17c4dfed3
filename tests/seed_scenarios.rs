//! End-to-end seed scenarios.

use acgrid_pf::error::PowerFlowError;
use acgrid_pf::grid::Grid;
use acgrid_pf::elements::{Generator, Line, Load};
use num_complex::Complex64;

fn two_bus_base() -> Grid {
    let mut grid = Grid::new(100.0, vec![138.0, 138.0], 1.0, 0);
    grid.add_gen(Generator::new(0, 0.0, 1.02, -100.0, 100.0, true));
    grid.add_line(Line::new(0, 1, 0.01, 0.1, Complex64::new(0.0, 0.0), true));
    grid.add_load(Load::new(1, 50.0, 20.0, true));
    grid
}

#[test]
fn scenario_a_two_bus_resistive_line() {
    let mut grid = two_bus_base();
    let v = grid.ac_pf(&[], 10, 1e-8).unwrap();
    assert_eq!(v.len(), 2);
    assert!((v[1].re - 1.0118).abs() < 1e-4);
    assert!((v[1].im - (-0.0516)).abs() < 1e-4);
    assert!(grid.iterations() <= 4);
}

#[test]
fn scenario_b_slack_disconnect() {
    let mut grid = two_bus_base();
    grid.update_bus_status(2, &[[false, false], [true, false]]);
    let err = grid.ac_pf(&[], 10, 1e-8).unwrap_err();
    assert!(matches!(err, PowerFlowError::SlackDisconnected { .. }));
}

#[test]
fn scenario_c_pv_limit_respected() {
    let mut grid = Grid::new(100.0, vec![138.0, 138.0], 1.0, 0);
    grid.add_gen(Generator::new(0, 0.0, 1.05, -1e9, 1e9, true));
    grid.add_gen(Generator::new(1, 20.0, 1.02, -10.0, 10.0, true));
    grid.add_line(Line::new(0, 1, 0.01, 0.1, Complex64::new(0.0, 0.0), true));
    grid.add_load(Load::new(1, 30.0, 25.0, true));
    grid.ac_pf(&[], 10, 1e-8).unwrap();
    let gen1 = &grid.gens()[1];
    let result = gen1.result.expect("gen 1 projected");
    assert!((result.q_mvar - 10.0).abs() < 1e-6);
    assert!(result.q_limit_hit);
}

#[test]
fn scenario_d_dc_matches_ac_for_lossless_line() {
    let mut grid = Grid::new(100.0, vec![138.0, 138.0], 1.0, 0);
    grid.add_gen(Generator::new(0, 0.0, 1.0, -100.0, 100.0, true));
    grid.add_line(Line::new(0, 1, 0.0, 0.1, Complex64::new(0.0, 0.0), true));
    grid.add_load(Load::new(1, 50.0, 0.0, true));

    let v_ac = grid.ac_pf(&[], 20, 1e-10).unwrap();
    grid.reset();
    let v_dc = grid.dc_pf(&[]).unwrap();

    assert!((v_ac[1].arg() - v_dc[1].arg()).abs() < 1e-6);
}

#[test]
fn scenario_e_islanded_network_is_singular() {
    let mut grid = Grid::new(100.0, vec![138.0, 138.0, 138.0], 1.0, 0);
    grid.add_gen(Generator::new(0, 0.0, 1.0, -100.0, 100.0, true));
    grid.add_line(Line::new(0, 1, 0.01, 0.1, Complex64::new(0.0, 0.0), true));
    // bus 2 is active but has no elements connecting it to the rest of the
    // network: islanded.
    grid.add_load(Load::new(2, 10.0, 0.0, true));

    let dc_err = grid.dc_pf(&[]).unwrap_err();
    assert!(matches!(dc_err, PowerFlowError::DcSingular { .. }));

    let ac_err = grid.ac_pf(&[], 10, 1e-8).unwrap_err();
    assert!(matches!(ac_err, PowerFlowError::JacobianSingular { .. }));
}

#[test]
fn scenario_f_topology_split_preserves_total_load() {
    // A small ring standing in for the reference multi-bus case: splitting
    // one substation into two busbars, with half the load moved to the new
    // busbar, must leave total load and convergence behavior unchanged.
    let mut grid = Grid::new(100.0, vec![138.0; 3], 1.0, 0);
    grid.add_gen(Generator::new(0, 0.0, 1.0, -100.0, 100.0, true));
    grid.add_line(Line::new(0, 1, 0.01, 0.1, Complex64::new(0.0, 0.0), true));
    grid.add_line(Line::new(1, 2, 0.01, 0.1, Complex64::new(0.0, 0.0), true));
    let load_a = grid.add_load(Load::new(1, 30.0, 10.0, true));
    let load_b = grid.add_load(Load::new(2, 30.0, 10.0, true));

    let total_before: f64 = grid.loads().iter().map(|l| l.p_mw).sum();

    // Split substation 1 (bus index 1) into busbar 0 (itself) and busbar 1
    // (offset by nb_bus_before=3): move load_a's other half onto the new
    // busbar, keep both busbars active.
    grid.update_bus_status(3, &[[true, false], [true, true], [true, false]]);
    grid.set_load_p(load_a, 15.0);
    let _ = load_b;
    let extra_load_on_new_busbar = Load::new(1 + 3, 15.0, 5.0, true);
    grid.add_load(extra_load_on_new_busbar);

    let total_after: f64 = grid.loads().iter().map(|l| l.p_mw).sum();
    assert!((total_before - total_after).abs() < 1e-9);

    let v = grid.ac_pf(&[], 10, 1e-8).unwrap();
    assert!(!v.is_empty());
    assert!(grid.iterations() <= 6);
}
