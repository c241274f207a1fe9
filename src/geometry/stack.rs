use kurbo::Point;

use crate::{
    cycle::def::{StackIdx, StackLayout},
    cycle::entity::Entity,
    foundation::math::lerp,
    viewport::Viewport,
};

/// Stack slot of an entity at `t_ms`: top-left corner and block height.
pub(crate) struct Slot {
    pub(crate) top_left: Point,
    pub(crate) height: f64,
}

/// Entry time into the stack, or `None` if `e` has not joined by `t_ms`.
fn joined_at(e: &Entity, idx: StackIdx, t_ms: f64) -> Option<f64> {
    e.history()
        .iter()
        .take_while(|h| h.at_ms <= t_ms)
        .find(|h| h.phase >= idx.member_from)
        .map(|h| h.at_ms)
}

fn is_member(e: &Entity, idx: StackIdx, t_ms: f64) -> bool {
    idx.contains(e.entry_at(t_ms).phase)
}

/// Stacked height below `me` at `t_ms`: newer members sit underneath older ones.
///
/// `me` is always treated as a member, so it keeps a slot while travelling in and after
/// leaving.
fn offset_below(entities: &[Entity], me: usize, layout: &StackLayout, idx: StackIdx, t_ms: f64) -> f64 {
    let mine = (joined_at(&entities[me], idx, t_ms).unwrap_or(f64::INFINITY), me);
    entities
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != me)
        .filter(|(_, e)| is_member(e, idx, t_ms))
        .filter(|(j, e)| {
            let theirs = (joined_at(e, idx, t_ms).unwrap_or(f64::INFINITY), *j);
            theirs.0.total_cmp(&mine.0).then(theirs.1.cmp(&mine.1)).is_gt()
        })
        .map(|(_, e)| layout.block_height(e.weight) + layout.gap)
        .sum()
}

/// Resolves the slot of entity `me`.
///
/// Whenever membership changes, the slot slides from wherever it was displayed to the new
/// layout over `reflow_ms`. A change landing mid-slide restarts from the displayed
/// position, so the slot never jumps.
pub(crate) fn slot(
    entities: &[Entity],
    me: usize,
    layout: &StackLayout,
    idx: StackIdx,
    t_ms: f64,
    vp: &Viewport,
) -> Slot {
    let mut changes: Vec<f64> = entities
        .iter()
        .flat_map(|e| e.history().iter().map(|h| h.at_ms))
        .filter(|at| *at <= t_ms)
        .collect();
    changes.sort_by(f64::total_cmp);
    changes.dedup();

    let offset_at = |at: f64| offset_below(entities, me, layout, idx, at);
    let eased = |since: f64, until: f64| {
        if layout.reflow_ms <= 0.0 {
            1.0
        } else {
            layout.reflow_ease.apply((until - since) / layout.reflow_ms)
        }
    };

    let mut iter = changes.into_iter();
    let offset = match iter.next() {
        None => offset_at(t_ms),
        Some(first) => {
            // (slide start time, displayed offset at that time, target offset)
            let mut seg = (first, offset_at(first), offset_at(first));
            for at in iter {
                let target = offset_at(at);
                if target == seg.2 {
                    continue;
                }
                let shown = lerp(seg.1, seg.2, eased(seg.0, at));
                seg = (at, shown, target);
            }
            lerp(seg.1, seg.2, eased(seg.0, t_ms))
        }
    };

    let height = layout.block_height(entities[me].weight);
    let bottom = layout.bottom_left.resolve(vp);
    Slot {
        top_left: Point::new(bottom.x, bottom.y - offset - height),
        height,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::animation::ease::{Curve, Ease};
    use crate::cycle::def::{Cycle, CycleDef, EntityDef, JitterSpec, Looping, Motion, PhaseDef};
    use crate::cycle::run::CycleRun;
    use crate::foundation::core::{Anchor, Placement};

    fn stacked(reflow_ms: f64) -> Arc<Cycle> {
        let entities = [100.0, 200.0, 300.0]
            .iter()
            .enumerate()
            .map(|(i, w)| {
                EntityDef::new(Placement::at(Anchor::px(0.0, 0.0)), Placement::stack_slot())
                    .weight(*w)
                    .spawn_delay(1_000.0 * i as f64)
            })
            .collect();
        Arc::new(
            Cycle::new(CycleDef {
                name: "stack".to_owned(),
                seed: 0,
                phases: vec![
                    PhaseDef::new("hidden", 0.0, Motion::hold_source()),
                    PhaseDef::new("entering", 100.0, Motion::travel(Curve::Ease(Ease::Linear))),
                    PhaseDef::new("resident", 0.0, Motion::hold_target()).terminal(),
                ],
                entities,
                looping: Looping::Once,
                jitter: JitterSpec::default(),
                overflow: None,
                stack: Some(StackLayout {
                    bottom_left: Anchor::px(10.0, 400.0),
                    gap: 4.0,
                    min_height: 20.0,
                    max_height: 40.0,
                    max_weight: 400.0,
                    member_from: "entering".to_owned(),
                    member_until: None,
                    reflow_ms,
                    reflow_ease: Ease::Linear,
                }),
            })
            .unwrap(),
        )
    }

    fn top(run: &CycleRun, me: usize, t: f64) -> f64 {
        let cycle = run.cycle();
        let (layout, idx) = cycle.stack_layout().unwrap();
        let vp = Viewport::new(800.0, 600.0, 1.0).unwrap();
        slot(run.entities(), me, layout, idx, t, &vp).top_left.y
    }

    #[test]
    fn newest_block_sits_at_the_bottom() {
        let mut run = CycleRun::new(stacked(0.0), 0.0);
        run.advance_to(5_000.0);
        // Heights 25, 30, 35.
        assert_eq!(top(&run, 2, 5_000.0), 400.0 - 35.0);
        assert_eq!(top(&run, 1, 5_000.0), 400.0 - 35.0 - 4.0 - 30.0);
        assert_eq!(top(&run, 0, 5_000.0), 400.0 - 35.0 - 4.0 - 30.0 - 4.0 - 25.0);
    }

    #[test]
    fn reflow_slides_instead_of_jumping() {
        let mut run = CycleRun::new(stacked(200.0), 0.0);
        run.advance_to(5_000.0);
        let before = top(&run, 0, 999.0);
        let mid = top(&run, 0, 1_100.0);
        let after = top(&run, 0, 1_200.0);
        assert_eq!(before, 375.0);
        assert_eq!(after, 375.0 - 34.0);
        assert!(mid < before && mid > after);
        assert!((mid - (375.0 - 17.0)).abs() < 1e-9);
    }

    #[test]
    fn entering_entity_targets_the_bottom_slot() {
        let mut run = CycleRun::new(stacked(0.0), 0.0);
        run.advance_to(5_000.0);
        assert_eq!(top(&run, 2, 0.0), 400.0 - 35.0);
    }
}
