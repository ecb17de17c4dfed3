//! Builds the sparse nodal admittance matrix `Y` and the dense complex
//! injection vector `S` by summing element contributions (spec §4.3).

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

use crate::bus::BusIndexMapper;
use crate::elements::{Element, Generator, Line, Load, Shunt, StaticGen, Storage, Transformer};
use crate::error::Result;

/// One family of each element type, borrowed from [`crate::grid::Grid`].
pub struct ElementFamilies<'a> {
    pub lines: &'a [Line],
    pub trafos: &'a [Transformer],
    pub shunts: &'a [Shunt],
    pub loads: &'a [Load],
    pub gens: &'a [Generator],
    pub sgens: &'a [StaticGen],
    pub storages: &'a [Storage],
}

pub struct Assembled {
    pub y: CscMatrix<Complex64>,
    pub s: DVector<Complex64>,
}

/// Pre-reserve capacity: `N_bus + 4*(N_line + N_trafo) + N_shunt` (spec §4.3
/// step 1).
fn estimate_nnz(families: &ElementFamilies, n_bus: usize) -> usize {
    n_bus + 4 * (families.lines.len() + families.trafos.len()) + families.shunts.len()
}

/// Assembles `(Y, S)` for the given element families. `ac` selects the AC
/// (full complex) or DC (susceptance-only, real S) stamping path (spec
/// §4.3, §4.6). Summation order across families is irrelevant; duplicate
/// triplet coordinates are summed by `CooMatrix -> CscMatrix` conversion.
pub fn assemble(
    families: &ElementFamilies,
    ac: bool,
    buses: &BusIndexMapper,
    base_mva: f64,
) -> Result<Assembled> {
    let k = buses.n_solver();
    let mut triplets = Vec::with_capacity(estimate_nnz(families, k));

    macro_rules! stamp_family_y {
        ($items:expr) => {
            for (id, item) in $items.iter().enumerate() {
                item.stamp_y(id, ac, buses, base_mva, &mut triplets)?;
            }
        };
    }
    stamp_family_y!(families.lines);
    stamp_family_y!(families.trafos);
    stamp_family_y!(families.shunts);
    stamp_family_y!(families.loads);
    stamp_family_y!(families.gens);
    stamp_family_y!(families.sgens);
    stamp_family_y!(families.storages);

    let mut coo = CooMatrix::new(k, k);
    coo.reserve(triplets.len());
    for (r, c, v) in triplets {
        coo.push(r, c, v);
    }
    let y = CscMatrix::from(&coo);

    let mut s = DVector::zeros(k);
    macro_rules! stamp_family_s {
        ($items:expr) => {
            for (id, item) in $items.iter().enumerate() {
                item.stamp_s(id, ac, buses, base_mva, &mut s)?;
            }
        };
    }
    stamp_family_s!(families.lines);
    stamp_family_s!(families.trafos);
    stamp_family_s!(families.shunts);
    stamp_family_s!(families.loads);
    stamp_family_s!(families.gens);
    stamp_family_s!(families.sgens);
    stamp_family_s!(families.storages);

    if !ac {
        s.apply(|v| *v = Complex64::new(v.re, 0.0));
    }

    Ok(Assembled { y, s })
}

/// Adjusts the slack bus's `S` entry so `sum(S).real == 0` (spec §4.3 step
/// 5) — enforces active-power balance in the initial estimate; the Newton
/// iteration refines it from there.
pub fn apply_slack_correction(s: &mut DVector<Complex64>, slack: usize) {
    let total_real: f64 = s.iter().map(|v| v.re).sum();
    let correction = total_real - s[slack].re;
    s[slack] = Complex64::new(-correction, s[slack].im);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::generator::Generator as Gen;

    #[test]
    fn symmetric_for_pure_lines() {
        let status = vec![true, true];
        let buses = BusIndexMapper::build(&status);
        let lines = vec![Line::new(0, 1, 0.01, 0.1, Complex64::new(0.0, 0.0), true)];
        let trafos = vec![];
        let shunts = vec![];
        let loads = vec![Load::new(1, 50.0, 20.0, true)];
        let gens = vec![Gen::new(0, 0.0, 1.02, -100.0, 100.0, true)];
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
        let assembled = assemble(&families, true, &buses, 100.0).unwrap();
        let y = &assembled.y;
        assert_eq!(y.get_entry(0, 1).unwrap().into_value(), y.get_entry(1, 0).unwrap().into_value());
    }
}
