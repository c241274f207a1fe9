use std::sync::Arc;

use crate::{
    cycle::def::{Cycle, CycleDef},
    cycle::run::CycleRun,
    foundation::core::{Generation, Spot},
    foundation::error::TableauResult,
    geometry::frame::{Frame, ResolvedEntity},
    geometry::resolve::Decorations,
    scheduler::host::{Host, Renderer},
    scheduler::timeline::Timeline,
    viewport::{Viewport, ViewportAdapter},
};

/// The user's motion preference, sampled once when a widget mounts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPreference {
    #[default]
    NoPreference,
    Reduce,
}

impl MotionPreference {
    pub fn from_reduced(reduced: bool) -> Self {
        if reduced { Self::Reduce } else { Self::NoPreference }
    }
}

/// What a mount produced. A mount is either animated or static, never both.
#[derive(Debug)]
pub enum Mounted {
    /// A running Timeline; the caller drives its wakes and cancels it on unmount.
    Animated(Timeline),
    /// The single settled frame that was rendered. Nothing is scheduled.
    Static(Frame),
}

impl Mounted {
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }

    /// Releases everything an animated mount holds. Static mounts hold nothing.
    pub fn unmount<H: Host + ?Sized>(&mut self, host: &mut H) {
        if let Self::Animated(timeline) = self {
            timeline.cancel(host);
        }
    }
}

/// Mounts `def` according to `preference`.
///
/// With [`MotionPreference::Reduce`] the cycle is settled immediately and rendered exactly
/// once with static decorations; no timer or subscription is created. A definition error
/// is returned on both paths.
pub fn mount<H: Host + ?Sized, R: Renderer + ?Sized>(
    def: CycleDef,
    preference: MotionPreference,
    viewport: ViewportAdapter,
    now_ms: f64,
    host: &mut H,
    renderer: &mut R,
) -> TableauResult<Mounted> {
    match preference {
        MotionPreference::NoPreference => {
            let mut timeline = Timeline::new(viewport);
            timeline.start(def, now_ms, host)?;
            Ok(Mounted::Animated(timeline))
        }
        MotionPreference::Reduce => {
            let frame = settled_frame(def, viewport.current(), now_ms)?;
            if let Err(err) = renderer.draw(&frame) {
                tracing::warn!(error = %err, "renderer failed to draw static frame");
            }
            Ok(Mounted::Static(frame))
        }
    }
}

/// Resolves the frame a cycle started at `now_ms` shows once every entity is at rest.
///
/// If the settled geometry cannot be resolved the frame degrades to each entity's plain
/// target placement at full opacity.
pub fn settled_frame(def: CycleDef, viewport: Viewport, now_ms: f64) -> TableauResult<Frame> {
    let cycle = Arc::new(Cycle::new(def)?);
    let mut run = CycleRun::new(cycle, now_ms);
    let t = run.settle();
    match run.resolve(t, viewport, Decorations::Static) {
        Ok(frame) => Ok(frame),
        Err(err) => {
            tracing::warn!(error = %err, "settled frame failed; using plain target geometry");
            Ok(plain_targets(&run, t, viewport))
        }
    }
}

fn plain_targets(run: &CycleRun, t_ms: f64, viewport: Viewport) -> Frame {
    let cycle = run.cycle();
    let stack_origin = cycle
        .def()
        .stack
        .as_ref()
        .map(|s| s.bottom_left.resolve(&viewport));
    let entities = run
        .entities()
        .iter()
        .zip(&cycle.def().entities)
        .map(|(e, def)| {
            let base = match e.target.spot {
                Spot::At(anchor) => anchor.resolve(&viewport),
                Spot::StackSlot => stack_origin.unwrap_or_default(),
            };
            let at = base + e.target.offset;
            let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
            ResolvedEntity {
                id: e.id,
                label: def.label.clone(),
                phase: cycle.phase(e.phase()).name.clone(),
                x: finite(at.x),
                y: finite(at.y),
                opacity: 1.0,
                scale: 1.0,
                weight: e.weight,
                height: None,
            }
        })
        .collect();
    Frame {
        generation: Generation::default(),
        iteration: 0,
        now_ms: t_ms,
        cycle_ms: t_ms - run.started_at_ms(),
        viewport,
        entities,
        aggregate: run.aggregate(t_ms),
    }
}
