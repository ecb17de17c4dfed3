//! Snapshot/restore format for a [`crate::grid::Grid`] (spec §6 "State
//! serialization format"). Each `*_state` field is the element collection's
//! own `serde` representation; this module stays opaque to what's inside.

use serde::{Deserialize, Serialize};

use crate::elements::{Generator, Line, Load, Shunt, StaticGen, Storage, Transformer};

/// Format tag bumped whenever the tuple shape below changes.
pub const STATE_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridState {
    pub version: String,
    pub init_vm_pu: f64,
    pub sn_mva: f64,
    pub bus_vn_kv: Vec<f64>,
    pub bus_status: Vec<bool>,
    pub lines_state: Vec<Line>,
    pub shunts_state: Vec<Shunt>,
    pub trafos_state: Vec<Transformer>,
    pub gens_state: Vec<Generator>,
    pub loads_state: Vec<Load>,
    pub sgens_state: Vec<StaticGen>,
    pub storages_state: Vec<Storage>,
    pub slack_gen_id: usize,
}
