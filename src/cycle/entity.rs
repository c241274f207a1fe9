use std::borrow::Cow;

use smallvec::SmallVec;

use crate::{
    cycle::def::{Cycle, Jitter, PhaseIdx},
    foundation::core::{EntityId, Placement},
    foundation::math::Rng64,
};

/// Time at which an entity entered a phase.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct PhaseEntry {
    pub phase: PhaseIdx,
    pub at_ms: f64,
}

/// One animated unit owned by a running cycle.
///
/// The phase-entry history is append-only while the cycle advances, so any timestamp up to
/// the advanced horizon can be resolved again with the same result.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub spawn_delay_ms: f64,
    pub source: Placement,
    pub target: Placement,
    pub weight: f64,
    pub jitter: Jitter,
    durations: SmallVec<[f64; 6]>,
    history: SmallVec<[PhaseEntry; 6]>,
}

impl Entity {
    pub(crate) fn spawn(cycle: &Cycle, index: u32, started_at_ms: f64) -> Self {
        let def = cycle.def();
        let e = &def.entities[index as usize];
        let durations = def
            .phases
            .iter()
            .map(|p| e.durations.get(&p.name).copied().unwrap_or(p.duration_ms))
            .collect();
        let jitter = e.jitter.unwrap_or_else(|| {
            let mut rng = Rng64::for_entity(def.seed, index);
            Jitter {
                phase: rng.range([0.0, std::f64::consts::TAU]),
                freq: rng.range(def.jitter.freq),
                amp: rng.range(def.jitter.amp),
            }
        });

        let mut history = SmallVec::new();
        history.push(PhaseEntry {
            phase: PhaseIdx::INITIAL,
            at_ms: started_at_ms,
        });

        Self {
            id: EntityId(index),
            spawn_delay_ms: e.spawn_delay_ms,
            source: e.source,
            target: e.target,
            weight: e.weight,
            jitter,
            durations,
            history,
        }
    }

    pub fn phase(&self) -> PhaseIdx {
        self.current().phase
    }

    pub fn phase_start_ms(&self) -> f64 {
        self.current().at_ms
    }

    pub fn history(&self) -> &[PhaseEntry] {
        &self.history
    }

    /// Time spent in `phase` before leaving it. The initial phase includes the spawn delay.
    pub fn dwell_ms(&self, phase: PhaseIdx) -> f64 {
        let base = self.durations.get(phase.index()).copied().unwrap_or(0.0);
        if phase == PhaseIdx::INITIAL {
            base + self.spawn_delay_ms
        } else {
            base
        }
    }

    /// The phase the entity was in at `t`. Times before the cycle start map to the
    /// initial entry.
    pub fn entry_at(&self, t_ms: f64) -> PhaseEntry {
        let idx = self.history.partition_point(|e| e.at_ms <= t_ms);
        self.history[idx.saturating_sub(1)]
    }

    /// First entry into `phase` or any later phase.
    pub fn first_entry_from(&self, phase: PhaseIdx) -> Option<PhaseEntry> {
        self.history.iter().copied().find(|e| e.phase >= phase)
    }

    /// Moves the entity to `to` at `at_ms`, dropping anything it did after that instant.
    pub(crate) fn evict(&mut self, to: PhaseIdx, at_ms: f64) {
        self.history.retain(|e| e.at_ms <= at_ms);
        if self.phase() < to {
            self.history.push(PhaseEntry { phase: to, at_ms });
        }
    }

    fn current(&self) -> PhaseEntry {
        // `spawn` always records the initial entry.
        self.history[self.history.len() - 1]
    }
}

/// Moves `entity` through every phase boundary it has crossed by `now_ms`.
///
/// Boundaries are taken from the schedule (`entry + dwell`), not from `now_ms`, so the
/// result does not depend on how often this is called. Phases are entered strictly in
/// order, including zero-length ones. Terminal phases never advance. Returns the input
/// unchanged (borrowed) when no boundary was crossed.
pub fn advance<'a>(entity: &'a Entity, cycle: &Cycle, now_ms: f64) -> Cow<'a, Entity> {
    let mut out: Option<Entity> = None;
    loop {
        let cur = out.as_ref().unwrap_or(entity);
        let phase = cur.phase();
        if cycle.is_terminal(phase) || phase.index() + 1 >= cycle.phase_count() {
            break;
        }
        let leave_at = cur.phase_start_ms() + cur.dwell_ms(phase);
        if now_ms < leave_at {
            break;
        }
        out.get_or_insert_with(|| entity.clone())
            .history
            .push(PhaseEntry {
                phase: PhaseIdx(phase.0 + 1),
                at_ms: leave_at,
            });
    }
    match out {
        Some(e) => Cow::Owned(e),
        None => Cow::Borrowed(entity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::ease::{Curve, Ease};
    use crate::cycle::def::{CycleDef, EntityDef, JitterSpec, Looping, Motion, PhaseDef};
    use crate::foundation::core::Anchor;

    fn cycle(durations: [f64; 3]) -> Cycle {
        Cycle::new(CycleDef {
            name: "t".to_owned(),
            seed: 9,
            phases: vec![
                PhaseDef::new("a", durations[0], Motion::hold_source()),
                PhaseDef::new("b", durations[1], Motion::travel(Curve::Ease(Ease::Linear))),
                PhaseDef::new("c", durations[2], Motion::hold_target()),
                PhaseDef::new("d", 0.0, Motion::hold_target()).terminal(),
            ],
            entities: vec![
                EntityDef::new(
                    Placement::at(Anchor::px(0.0, 0.0)),
                    Placement::at(Anchor::px(10.0, 10.0)),
                )
                .spawn_delay(50.0),
                EntityDef::new(
                    Placement::at(Anchor::px(0.0, 0.0)),
                    Placement::at(Anchor::px(10.0, 10.0)),
                )
                .duration("b", 300.0),
            ],
            looping: Looping::Once,
            jitter: JitterSpec {
                freq: [0.02, 0.035],
                amp: [12.0, 28.0],
            },
            overflow: None,
            stack: None,
        })
        .unwrap()
    }

    #[test]
    fn no_transition_borrows_input() {
        let c = cycle([100.0, 100.0, 100.0]);
        let e = Entity::spawn(&c, 0, 0.0);
        assert!(matches!(advance(&e, &c, 149.0), Cow::Borrowed(_)));
        assert!(matches!(advance(&e, &c, 150.0), Cow::Owned(_)));
    }

    #[test]
    fn spawn_delay_extends_initial_phase_only() {
        let c = cycle([100.0, 100.0, 100.0]);
        let e = Entity::spawn(&c, 0, 1000.0);
        let e = advance(&e, &c, 1_000_000.0).into_owned();
        let at: Vec<f64> = e.history().iter().map(|h| h.at_ms).collect();
        assert_eq!(at, vec![1000.0, 1150.0, 1250.0, 1350.0]);
    }

    #[test]
    fn zero_durations_still_visit_every_phase_in_order() {
        let c = cycle([0.0, 0.0, 0.0]);
        let e = Entity::spawn(&c, 1, 0.0);
        let e = advance(&e, &c, 0.0).into_owned();
        let phases: Vec<u16> = e.history().iter().map(|h| h.phase.0).collect();
        assert_eq!(phases, vec![0, 1, 2, 3]);
    }

    #[test]
    fn boundaries_do_not_depend_on_tick_rate() {
        let c = cycle([100.0, 100.0, 100.0]);
        let start = Entity::spawn(&c, 1, 0.0);

        let coarse = advance(&start, &c, 10_000.0).into_owned();
        let mut fine = start.clone();
        let mut t = 0.0;
        while t < 10_000.0 {
            fine = advance(&fine, &c, t).into_owned();
            t += 16.7;
        }
        fine = advance(&fine, &c, 10_000.0).into_owned();
        assert_eq!(coarse, fine);
        assert_eq!(coarse.history()[2].at_ms, 400.0);
    }

    #[test]
    fn phase_index_is_monotonic() {
        let c = cycle([30.0, 70.0, 20.0]);
        let mut e = Entity::spawn(&c, 0, 0.0);
        let mut last = e.phase();
        for step in 0..100 {
            e = advance(&e, &c, f64::from(step) * 5.0).into_owned();
            assert!(e.phase() >= last);
            last = e.phase();
        }
        assert_eq!(last, PhaseIdx(3));
    }

    #[test]
    fn terminal_phase_is_a_no_op() {
        let c = cycle([0.0, 0.0, 0.0]);
        let e = advance(&Entity::spawn(&c, 1, 0.0), &c, 5.0).into_owned();
        assert!(matches!(advance(&e, &c, 1.0e9), Cow::Borrowed(_)));
    }

    #[test]
    fn entry_lookup_answers_past_times() {
        let c = cycle([100.0, 100.0, 100.0]);
        let e = advance(&Entity::spawn(&c, 1, 0.0), &c, 1.0e6).into_owned();
        assert_eq!(e.entry_at(-5.0).phase, PhaseIdx(0));
        assert_eq!(e.entry_at(99.9).phase, PhaseIdx(0));
        assert_eq!(e.entry_at(100.0).phase, PhaseIdx(1));
        assert_eq!(e.entry_at(450.0).phase, PhaseIdx(2));
        assert_eq!(e.first_entry_from(PhaseIdx(2)).unwrap().at_ms, 400.0);
    }

    #[test]
    fn jitter_is_seeded_and_in_range() {
        let c = cycle([1.0, 1.0, 1.0]);
        let a = Entity::spawn(&c, 0, 0.0);
        let b = Entity::spawn(&c, 0, 500.0);
        assert_eq!(a.jitter, b.jitter);
        assert!((0.02..=0.035).contains(&a.jitter.freq));
        assert!((12.0..=28.0).contains(&a.jitter.amp));
        assert_ne!(a.jitter, Entity::spawn(&c, 1, 0.0).jitter);
    }

    #[test]
    fn evict_truncates_later_history() {
        let c = cycle([100.0, 100.0, 100.0]);
        let mut e = advance(&Entity::spawn(&c, 1, 0.0), &c, 450.0).into_owned();
        e.evict(PhaseIdx(3), 150.0);
        let phases: Vec<(u16, f64)> = e.history().iter().map(|h| (h.phase.0, h.at_ms)).collect();
        assert_eq!(phases, vec![(0, 0.0), (1, 100.0), (3, 150.0)]);
    }
}
