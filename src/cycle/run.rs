use std::sync::Arc;

use crate::{
    cycle::def::{Cycle, PhaseIdx},
    cycle::entity::{Entity, advance},
    foundation::error::TableauResult,
    geometry::frame::{Aggregate, Frame, Load, PhaseCount},
    geometry::resolve::{Decorations, resolve_entities},
    viewport::Viewport,
};

/// One instance of a cycle: a fresh entity set advancing from `started_at_ms`.
///
/// A restart builds a new `CycleRun`; entities are never carried over.
#[derive(Clone, Debug)]
pub struct CycleRun {
    cycle: Arc<Cycle>,
    started_at_ms: f64,
    horizon_ms: f64,
    entities: Vec<Entity>,
    /// Whether the overflow rule has already accounted for the entity's arrival.
    counted: Vec<bool>,
}

impl CycleRun {
    pub fn new(cycle: Arc<Cycle>, started_at_ms: f64) -> Self {
        let n = cycle.def().entities.len();
        let entities = (0..n as u32)
            .map(|i| Entity::spawn(&cycle, i, started_at_ms))
            .collect();
        Self {
            cycle,
            started_at_ms,
            horizon_ms: started_at_ms,
            entities,
            counted: vec![false; n],
        }
    }

    pub fn cycle(&self) -> &Arc<Cycle> {
        &self.cycle
    }

    pub fn started_at_ms(&self) -> f64 {
        self.started_at_ms
    }

    /// Latest time the run has been advanced to.
    pub fn horizon_ms(&self) -> f64 {
        self.horizon_ms
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Advances every entity with the same timestamp, then applies the overflow rule to
    /// the arrivals in the order they happened. Going backwards in time is a no-op.
    pub fn advance_to(&mut self, now_ms: f64) {
        if now_ms < self.horizon_ms {
            return;
        }
        self.horizon_ms = now_ms;

        for e in &mut self.entities {
            if let std::borrow::Cow::Owned(next) = advance(e, &self.cycle, now_ms) {
                *e = next;
            }
        }
        self.apply_overflow();
    }

    fn apply_overflow(&mut self) {
        let Some(rule) = self.cycle.overflow else {
            return;
        };
        let reserved = self
            .cycle
            .def()
            .overflow
            .as_ref()
            .map_or(0.0, |o| o.reserved);

        let mut arrivals: Vec<(f64, usize)> = self
            .entities
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.counted[*i])
            .filter_map(|(i, e)| e.first_entry_from(rule.counted_from).map(|h| (h.at_ms, i)))
            .collect();
        arrivals.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (at_ms, arriving) in arrivals {
            self.counted[arriving] = true;
            let live = |e: &Entity, counted: bool| counted && e.phase() < rule.forgotten;

            let mut load = reserved
                + self
                    .entities
                    .iter()
                    .zip(&self.counted)
                    .filter(|(e, c)| live(e, **c))
                    .map(|(e, _)| e.weight)
                    .sum::<f64>();

            // Oldest first; stop as soon as the load is at or below the threshold.
            for i in 0..self.entities.len() {
                if load <= rule.threshold {
                    break;
                }
                if !live(&self.entities[i], self.counted[i]) {
                    continue;
                }
                load -= self.entities[i].weight;
                self.entities[i].evict(rule.forgotten, at_ms);
                tracing::debug!(entity = i, at_ms, load, "entity forgotten by overflow rule");
            }
        }
    }

    /// Whether every entity rests in a terminal phase whose own duration has played out.
    pub fn is_settled(&self, t_ms: f64) -> bool {
        self.entities.iter().all(|e| {
            let h = e.entry_at(t_ms);
            self.cycle.is_terminal(h.phase) && t_ms >= h.at_ms + e.dwell_ms(h.phase)
        })
    }

    /// Latest time at which any entity finishes its current terminal phase, if all are
    /// terminal.
    pub(crate) fn rest_time(&self) -> Option<f64> {
        self.entities.iter().try_fold(self.started_at_ms, |acc, e| {
            let p = e.phase();
            self.cycle
                .is_terminal(p)
                .then(|| acc.max(e.phase_start_ms() + e.dwell_ms(p)))
        })
    }

    /// Schedule-derived time at which every entity reaches its first terminal phase.
    fn planned_rest_ms(&self) -> f64 {
        let n = self.cycle.phase_count();
        self.entities.iter().fold(self.started_at_ms, |acc, e| {
            let mut t = self.started_at_ms;
            for i in 0..n {
                let p = PhaseIdx(i as u16);
                t += e.dwell_ms(p);
                if self.cycle.is_terminal(p) {
                    break;
                }
            }
            acc.max(t)
        })
    }

    /// Advances straight to the settled state and returns the time it settles at.
    pub fn settle(&mut self) -> f64 {
        let mut t = self.planned_rest_ms().max(self.horizon_ms);
        self.advance_to(t);
        // Evictions can move entities into terminal phases with their own duration.
        while let Some(rest) = self.rest_time() {
            if rest <= t {
                break;
            }
            t = rest;
            self.advance_to(t);
        }
        t
    }

    /// Counts and load derived from entity phases at `t_ms`.
    pub fn aggregate(&self, t_ms: f64) -> Aggregate {
        let def = self.cycle.def();
        let mut counts = vec![0usize; def.phases.len()];
        let mut at_rest = 0;
        for e in &self.entities {
            let p = e.entry_at(t_ms).phase;
            counts[p.index()] += 1;
            if self.cycle.is_terminal(p) {
                at_rest += 1;
            }
        }

        let load = def.overflow.as_ref().zip(self.cycle.overflow).map(|(rule, idx)| {
            let used = rule.reserved
                + self
                    .entities
                    .iter()
                    .filter(|e| {
                        let p = e.entry_at(t_ms).phase;
                        p >= idx.counted_from && p < idx.forgotten
                    })
                    .map(|e| e.weight)
                    .sum::<f64>();
            Load {
                used,
                capacity: rule.capacity,
                threshold: idx.threshold,
                fraction: (used / rule.capacity).min(1.0),
            }
        });

        Aggregate {
            phases: def
                .phases
                .iter()
                .zip(counts)
                .map(|(p, count)| PhaseCount {
                    name: p.name.clone(),
                    count,
                })
                .collect(),
            at_rest,
            total: self.entities.len(),
            load,
        }
    }

    /// Resolves every entity at `t_ms`. Valid for any `t_ms` up to the advanced horizon;
    /// the same `t_ms` always yields the same frame.
    pub fn resolve(
        &self,
        t_ms: f64,
        viewport: Viewport,
        decorations: Decorations,
    ) -> TableauResult<Frame> {
        let entities = resolve_entities(self, t_ms, &viewport, decorations)?;
        Ok(Frame {
            generation: Default::default(),
            iteration: 0,
            now_ms: t_ms,
            cycle_ms: t_ms - self.started_at_ms,
            viewport,
            entities,
            aggregate: self.aggregate(t_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::ease::{Curve, Ease};
    use crate::cycle::def::{
        CycleDef, EntityDef, JitterSpec, Looping, Motion, OverflowRule, PhaseDef,
    };
    use crate::foundation::core::{Anchor, Placement};

    fn ledger(weights: &[f64], capacity: f64) -> Arc<Cycle> {
        let entities = weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                EntityDef::new(
                    Placement::at(Anchor::px(0.0, 0.0)),
                    Placement::at(Anchor::px(0.0, 0.0)),
                )
                .weight(*w)
                .spawn_delay(100.0 * i as f64)
            })
            .collect();
        Arc::new(
            Cycle::new(CycleDef {
                name: "ledger".to_owned(),
                seed: 0,
                phases: vec![
                    PhaseDef::new("hidden", 0.0, Motion::hold_source()),
                    PhaseDef::new("entering", 50.0, Motion::travel(Curve::Ease(Ease::OutCubic))),
                    PhaseDef::new("resident", 0.0, Motion::hold_target()).terminal(),
                    PhaseDef::new("forgotten", 80.0, Motion::hold_target()).terminal(),
                ],
                entities,
                looping: Looping::Once,
                jitter: JitterSpec::default(),
                overflow: Some(OverflowRule {
                    capacity,
                    threshold_ratio: 0.5,
                    reserved: 10.0,
                    counted_from: "entering".to_owned(),
                    forgotten: "forgotten".to_owned(),
                }),
                stack: None,
            })
            .unwrap(),
        )
    }

    fn forgotten(run: &CycleRun) -> Vec<u32> {
        run.entities()
            .iter()
            .filter(|e| e.phase() == PhaseIdx(3))
            .map(|e| e.id.0)
            .collect()
    }

    #[test]
    fn eviction_stops_at_threshold() {
        // threshold = 50; reserved 10.
        let mut run = CycleRun::new(ledger(&[20.0, 20.0, 20.0], 100.0), 0.0);
        run.advance_to(150.0);
        assert!(forgotten(&run).is_empty());
        assert_eq!(run.aggregate(150.0).load.unwrap().used, 50.0);

        run.advance_to(250.0);
        assert_eq!(forgotten(&run), vec![0]);
        assert_eq!(run.aggregate(250.0).load.unwrap().used, 50.0);
    }

    #[test]
    fn batch_and_incremental_advance_agree() {
        let weights = [12.0, 30.0, 5.0, 18.0, 22.0, 9.0];
        let mut batch = CycleRun::new(ledger(&weights, 100.0), 0.0);
        batch.advance_to(2_000.0);

        let mut step = CycleRun::new(ledger(&weights, 100.0), 0.0);
        let mut t = 0.0;
        while t <= 2_000.0 {
            step.advance_to(t);
            t += 7.0;
        }
        step.advance_to(2_000.0);

        assert_eq!(batch.entities(), step.entities());
    }

    #[test]
    fn eviction_time_is_the_arrival_time() {
        let mut run = CycleRun::new(ledger(&[30.0, 30.0], 100.0), 0.0);
        run.advance_to(10_000.0);
        let first = &run.entities()[0];
        assert_eq!(first.phase(), PhaseIdx(3));
        assert_eq!(first.phase_start_ms(), 100.0);
    }

    #[test]
    fn settle_waits_for_terminal_durations() {
        let mut run = CycleRun::new(ledger(&[30.0, 30.0], 100.0), 0.0);
        let t = run.settle();
        // Entity 0 forgotten at 100 for 80ms; entity 1 resident at 150.
        assert_eq!(t, 180.0);
        assert!(run.is_settled(t));
        assert!(!run.is_settled(170.0));
    }

    #[test]
    fn aggregate_counts_phases_at_time() {
        let mut run = CycleRun::new(ledger(&[1.0, 1.0, 1.0], 100.0), 0.0);
        run.advance_to(500.0);
        let a = run.aggregate(120.0);
        let counts: Vec<usize> = a.phases.iter().map(|p| p.count).collect();
        assert_eq!(counts, vec![1, 1, 1, 0]);
        assert_eq!(a.at_rest, 1);
        assert_eq!(a.total, 3);
    }
}
