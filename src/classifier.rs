//! Partitions solver buses into `{slack, pv, pq}` (spec §4.4).

use crate::bus::BusIndexMapper;
use crate::elements::Generator;
use crate::error::{PowerFlowError, Result};

#[derive(Debug, Clone)]
pub struct BusClassification {
    pub slack: usize,
    pub pv: Vec<usize>,
    pub pq: Vec<usize>,
}

/// `pv` = buses hosting at least one active voltage-controlled generator,
/// excluding slack. `pq` = every other connected solver bus except slack.
pub fn classify(
    buses: &BusIndexMapper,
    generators: &[Generator],
    slack_gen_id: usize,
) -> Result<BusClassification> {
    let slack_gen =
        generators
            .get(slack_gen_id)
            .ok_or(PowerFlowError::SlackInvalid {
                id: slack_gen_id,
                reason: "generator id out of range",
            })?;
    if !slack_gen.in_service {
        return Err(PowerFlowError::SlackInvalid {
            id: slack_gen_id,
            reason: "slack generator is inactive",
        });
    }
    let slack = buses
        .solver_id(slack_gen.bus as usize)
        .ok_or(PowerFlowError::SlackDisconnected {
            bus: slack_gen.bus as usize,
        })?;

    let mut is_pv = vec![false; buses.n_solver()];
    for (id, gen) in generators.iter().enumerate() {
        gen.classify_pv(id, slack, buses, &mut is_pv)?;
    }

    let mut pv = Vec::new();
    let mut pq = Vec::new();
    for solver_id in 0..buses.n_solver() {
        if solver_id == slack {
            continue;
        }
        if is_pv[solver_id] {
            pv.push(solver_id);
        } else {
            pq.push(solver_id);
        }
    }

    Ok(BusClassification { slack, pv, pq })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_cover_every_bus_exactly_once() {
        let status = vec![true, true, true];
        let buses = BusIndexMapper::build(&status);
        let gens = vec![
            Generator::new(0, 0.0, 1.0, -10.0, 10.0, true),
            Generator::new(1, 50.0, 1.02, -10.0, 10.0, true),
        ];
        let classification = classify(&buses, &gens, 0).unwrap();
        assert_eq!(classification.slack, 0);
        assert_eq!(classification.pv, vec![1]);
        assert_eq!(classification.pq, vec![2]);
    }

    #[test]
    fn slack_disconnected_is_an_error() {
        let status = vec![false, true];
        let buses = BusIndexMapper::build(&status);
        let gens = vec![Generator::new(0, 0.0, 1.0, -10.0, 10.0, true)];
        let err = classify(&buses, &gens, 0).unwrap_err();
        assert!(matches!(err, PowerFlowError::SlackDisconnected { bus: 0 }));
    }
}
