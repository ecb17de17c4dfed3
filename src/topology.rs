//! Vectorized topology-update tables (spec §6 "Topology update").
//!
//! Each original bus/substation can be split into two virtual busbars
//! (offset `0` and offset `n_sub`); `update_bus_status` toggles each
//! busbar's connection status directly, while `update_topo` re-routes a
//! single element endpoint to one busbar or the other (or deactivates it)
//! addressed by its position in a flat topology vector. The position ->
//! (element, end) and element -> substation mappings are the `*_pos_topo_vect`
//! / `*_to_subid` tables spec §6 describes; they are modeled here as a single
//! `TopologyTables` lookup rather than one table per family, since the
//! lookup itself is identical regardless of family.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementFamily {
    Line,
    Transformer,
    Generator,
    Load,
    StaticGen,
    Storage,
}

/// Which endpoint of the element a topology-vector slot controls. Lines and
/// transformers have two addressable ends; every other family has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementEnd {
    Only,
    From,
    To,
}

#[derive(Debug, Clone, Copy)]
pub struct TopoVectSlot {
    pub family: ElementFamily,
    pub element_id: usize,
    pub end: ElementEnd,
    /// Substation id this endpoint normally belongs to (busbar `0` = this
    /// id, busbar `1` = `substation_id + n_sub`).
    pub substation_id: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TopologyTables {
    pub slots: Vec<TopoVectSlot>,
}

impl TopologyTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, family: ElementFamily, element_id: usize, end: ElementEnd, substation_id: usize) {
        self.slots.push(TopoVectSlot {
            family,
            element_id,
            end,
            substation_id,
        });
    }
}

/// Resolves a `new_values` entry (spec §6: `v<=0` deactivate, `v==1`
/// original bus, `v==2` original bus + `n_sub`) to the external bus id a
/// slot should connect to, or `None` if it means "deactivate".
pub fn resolve_target_bus(slot: &TopoVectSlot, value: i32, n_sub: usize) -> Option<i64> {
    if value <= 0 {
        None
    } else {
        Some(slot.substation_id as i64 + (value as i64 - 1) * n_sub as i64)
    }
}
