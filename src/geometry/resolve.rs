use std::f64::consts::FRAC_PI_2;

use kurbo::{Point, Vec2};

use crate::{
    animation::ease::oscillate,
    cycle::def::{Cycle, End, Motion, Orbit},
    cycle::entity::Entity,
    cycle::run::CycleRun,
    foundation::core::{Placement, Spot},
    foundation::error::{TableauError, TableauResult},
    foundation::math::lerp,
    geometry::frame::ResolvedEntity,
    geometry::stack,
    viewport::Viewport,
};

/// Whether decorative, clock-driven motion (drift, orbit, twinkle, pulse) is sampled.
///
/// `Static` renders every decoration at its rest value; directed motion is unaffected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Decorations {
    #[default]
    Animated,
    Static,
}

/// Resolved endpoint of a placement: position, scale, opacity, stack height.
#[derive(Clone, Copy, Debug)]
struct Pose {
    at: Point,
    scale: f64,
    opacity: f64,
    height: Option<f64>,
}

struct Ctx<'a> {
    run: &'a CycleRun,
    t_ms: f64,
    vp: &'a Viewport,
    decorations: Decorations,
}

impl Ctx<'_> {
    fn cycle(&self) -> &Cycle {
        self.run.cycle()
    }

    fn pose(&self, index: usize, p: &Placement) -> Pose {
        let (base, height) = match p.spot {
            Spot::At(anchor) => (anchor.resolve(self.vp), None),
            Spot::StackSlot => match self.cycle().stack_layout() {
                Some((layout, idx)) => {
                    let s = stack::slot(self.run.entities(), index, layout, idx, self.t_ms, self.vp);
                    (s.top_left, Some(s.height))
                }
                // Rejected by validation; keep the frame renderable regardless.
                None => (Point::ORIGIN, None),
            },
        };
        Pose {
            at: base + p.offset,
            scale: p.scale,
            opacity: p.opacity,
            height,
        }
    }

    fn animated(&self) -> bool {
        self.decorations == Decorations::Animated
    }
}

/// Resolves every entity of `run` at `t_ms` against `vp`.
///
/// Pure in its inputs: the same run, time, viewport and decorations always give the same
/// result.
pub(crate) fn resolve_entities(
    run: &CycleRun,
    t_ms: f64,
    vp: &Viewport,
    decorations: Decorations,
) -> TableauResult<Vec<ResolvedEntity>> {
    let ctx = Ctx {
        run,
        t_ms,
        vp,
        decorations,
    };
    run.entities()
        .iter()
        .enumerate()
        .map(|(i, e)| resolve_one(&ctx, i, e))
        .collect()
}

fn resolve_one(ctx: &Ctx<'_>, index: usize, e: &Entity) -> TableauResult<ResolvedEntity> {
    let cycle = ctx.cycle();
    let entry = e.entry_at(ctx.t_ms);
    let phase = cycle.phase(entry.phase);
    let dwell = e.dwell_ms(entry.phase);
    let elapsed = (ctx.t_ms - entry.at_ms).max(0.0);
    let progress = if dwell > 0.0 {
        (elapsed / dwell).min(1.0)
    } else {
        1.0
    };

    let src = ctx.pose(index, &e.source);
    let dst = ctx.pose(index, &e.target);
    let end = |at: End| match at {
        End::Source => (src, 0.0),
        End::Target => (dst, 1.0),
    };

    let mut scale_mul = 1.0;
    let mut opacity_mul = 1.0;
    let (at, c) = match phase.motion {
        Motion::Hold { at } => {
            let (pose, c) = end(at);
            (pose.at, c)
        }
        Motion::Travel { curve, drift } => {
            let c = curve.apply(progress);
            let mut at = src.at.lerp(dst.at, c);
            if let Some(drift) = drift
                && ctx.animated()
            {
                let sway = oscillate(elapsed * e.jitter.freq + e.jitter.phase) * e.jitter.amp;
                at += drift.axis * (sway * (1.0 - c));
            }
            (at, c)
        }
        Motion::Shift { at, offset, curve } => {
            let (pose, c) = end(at);
            (pose.at + offset * curve.apply(progress), c)
        }
        Motion::Orbit(orbit) => {
            let (pose, c) = end(orbit.at);
            let (delta, s, o) = orbit_sample(&orbit, e, ctx);
            scale_mul = s;
            opacity_mul = o;
            (pose.at + delta, c)
        }
    };

    let opacity = lerp(src.opacity, dst.opacity, c)
        * phase.opacity.sample(elapsed, progress)
        * opacity_mul;
    let scale = lerp(src.scale, dst.scale, c) * scale_mul;
    let height = dst.height.or(src.height);

    if ![at.x, at.y, opacity, scale].iter().all(|v| v.is_finite()) {
        return Err(TableauError::geometry(format!(
            "entity {} resolved to non-finite geometry in phase '{}' at {} ms",
            e.id.0, phase.name, ctx.t_ms
        )));
    }

    Ok(ResolvedEntity {
        id: e.id,
        label: cycle.def().entities[index].label.clone(),
        phase: phase.name.clone(),
        x: at.x,
        y: at.y,
        opacity: opacity.clamp(0.0, 1.0),
        scale,
        weight: e.weight,
        height,
    })
}

/// Orbit displacement, scale multiplier and opacity multiplier on the absolute clock.
fn orbit_sample(orbit: &Orbit, e: &Entity, ctx: &Ctx<'_>) -> (Vec2, f64, f64) {
    if !ctx.animated() {
        let level = orbit.twinkle.map_or(1.0, |tw| tw.static_level);
        return (Vec2::ZERO, 1.0, level * orbit.brightness);
    }
    let t = ctx.t_ms;
    let j = e.jitter;
    let orbit_phase = j.phase * 1.7;
    let delta = Vec2::new(
        oscillate(t * orbit.speed + orbit_phase + FRAC_PI_2) * orbit.radius * ctx.vp.width,
        oscillate(t * orbit.speed * 0.7 + orbit_phase + 1.0) * orbit.radius * ctx.vp.height,
    );
    let twinkle = orbit.twinkle.map_or(1.0, |tw| {
        tw.base + tw.depth * oscillate(t * tw.rate * j.freq + j.phase)
    });
    let pulse = 1.0 + orbit.pulse * oscillate(t * orbit.pulse_rate + j.phase * 2.0);
    (delta, pulse, twinkle * orbit.brightness)
}
