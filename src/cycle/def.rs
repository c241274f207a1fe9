use std::collections::{BTreeMap, BTreeSet};

use crate::{
    animation::ease::{Curve, Ease},
    foundation::core::{Anchor, Placement, Spot, Vec2},
    foundation::error::{TableauError, TableauResult},
};

/// Index of a phase within its cycle's ordered phase list.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PhaseIdx(pub u16);

impl PhaseIdx {
    pub const INITIAL: PhaseIdx = PhaseIdx(0);

    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Authoring-level description of one animation cycle.
///
/// Loaded from JSON or built by the presets; turned into a checked [`Cycle`] by
/// [`Cycle::new`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CycleDef {
    pub name: String,
    /// Seed for generated jitter.
    #[serde(default)]
    pub seed: u64,
    /// Ordered phases. Every entity starts in the first one.
    pub phases: Vec<PhaseDef>,
    pub entities: Vec<EntityDef>,
    #[serde(default)]
    pub looping: Looping,
    /// Ranges for jitter generated for entities without an explicit one.
    #[serde(default)]
    pub jitter: JitterSpec,
    #[serde(default)]
    pub overflow: Option<OverflowRule>,
    #[serde(default)]
    pub stack: Option<StackLayout>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseDef {
    pub name: String,
    pub duration_ms: f64,
    #[serde(default)]
    pub transition: Transition,
    pub motion: Motion,
    #[serde(default)]
    pub opacity: OpacityRamp,
}

impl PhaseDef {
    pub fn new(name: impl Into<String>, duration_ms: f64, motion: Motion) -> Self {
        Self {
            name: name.into(),
            duration_ms,
            transition: Transition::After,
            motion,
            opacity: OpacityRamp::default(),
        }
    }

    pub fn terminal(mut self) -> Self {
        self.transition = Transition::Terminal;
        self
    }

    pub fn ramp(mut self, from: f64, to: f64, ramp_ms: f64) -> Self {
        self.opacity = OpacityRamp {
            from,
            to,
            ramp_ms,
            delay_ms: 0.0,
        };
        self
    }

    /// Holds the ramp's `from` value for `delay_ms` after phase entry.
    pub fn ramp_after(mut self, delay_ms: f64) -> Self {
        self.opacity.delay_ms = delay_ms;
        self
    }
}

/// What happens when an entity has spent its phase duration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Move on to the next phase in order.
    #[default]
    After,
    /// Valid end state. Only the cycle's overflow rule can move an entity out of it.
    Terminal,
}

/// Which endpoint a stationary motion sits at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum End {
    Source,
    Target,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Motion {
    Hold {
        at: End,
    },
    /// Directed motion from source to target.
    Travel {
        curve: Curve,
        /// Decorative sideways sway, decaying to zero with progress.
        #[serde(default)]
        drift: Option<Drift>,
    },
    /// Moves away from an endpoint by `offset` (a "forgotten" block sliding out).
    Shift {
        at: End,
        offset: Vec2,
        curve: Curve,
    },
    Orbit(Orbit),
}

impl Motion {
    pub fn hold_source() -> Self {
        Self::Hold { at: End::Source }
    }

    pub fn hold_target() -> Self {
        Self::Hold { at: End::Target }
    }

    pub fn travel(curve: Curve) -> Self {
        Self::Travel { curve, drift: None }
    }
}

/// Sway direction; frequency, amplitude and phase come from the entity's jitter.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Drift {
    pub axis: Vec2,
}

/// Slow orbit with optional twinkle and pulse, sampled on the absolute clock.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Orbit {
    pub at: End,
    /// Orbit radius as a fraction of the viewport width (x) and height (y).
    pub radius: f64,
    /// Angular speed in radians per millisecond.
    pub speed: f64,
    /// Opacity multiplier for this phase.
    #[serde(default = "one")]
    pub brightness: f64,
    #[serde(default)]
    pub twinkle: Option<Twinkle>,
    /// Scale pulse amplitude; 0 disables it.
    #[serde(default)]
    pub pulse: f64,
    #[serde(default)]
    pub pulse_rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Twinkle {
    pub base: f64,
    pub depth: f64,
    /// Radians per millisecond, multiplied by the entity's jitter frequency.
    pub rate: f64,
    /// Level used when decorations are off.
    pub static_level: f64,
}

/// Opacity ramp over a short window, starting `delay_ms` after phase entry.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OpacityRamp {
    pub from: f64,
    pub to: f64,
    #[serde(default)]
    pub ramp_ms: f64,
    /// Time `from` is held before the ramp starts.
    #[serde(default)]
    pub delay_ms: f64,
}

impl Default for OpacityRamp {
    fn default() -> Self {
        Self {
            from: 1.0,
            to: 1.0,
            ramp_ms: 0.0,
            delay_ms: 0.0,
        }
    }
}

impl OpacityRamp {
    /// `to` is forced once the phase is complete so the ramp never snaps afterwards.
    pub fn sample(self, elapsed_ms: f64, progress: f64) -> f64 {
        if progress >= 1.0 {
            return self.to;
        }
        let since = elapsed_ms - self.delay_ms;
        if since < 0.0 {
            return self.from;
        }
        if self.ramp_ms <= 0.0 {
            return self.to;
        }
        let k = (since / self.ramp_ms).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * k
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EntityDef {
    #[serde(default)]
    pub label: Option<String>,
    /// Extra time spent in the initial phase, for staggered starts.
    #[serde(default)]
    pub spawn_delay_ms: f64,
    pub source: Placement,
    pub target: Placement,
    /// Contribution to the overflow load and to stacked block height.
    #[serde(default)]
    pub weight: f64,
    /// Per-entity phase duration overrides, keyed by phase name.
    #[serde(default)]
    pub durations: BTreeMap<String, f64>,
    #[serde(default)]
    pub jitter: Option<Jitter>,
}

impl EntityDef {
    pub fn new(source: Placement, target: Placement) -> Self {
        Self {
            label: None,
            spawn_delay_ms: 0.0,
            source,
            target,
            weight: 0.0,
            durations: BTreeMap::new(),
            jitter: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn spawn_delay(mut self, ms: f64) -> Self {
        self.spawn_delay_ms = ms;
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn duration(mut self, phase: impl Into<String>, ms: f64) -> Self {
        self.durations.insert(phase.into(), ms);
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Some(jitter);
        self
    }
}

/// Fixed per-entity constants for decorative motion. Never used for control flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Jitter {
    /// Phase offset in radians.
    pub phase: f64,
    /// Frequency in radians per millisecond (or a speed multiplier for twinkle).
    pub freq: f64,
    pub amp: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JitterSpec {
    pub freq: [f64; 2],
    pub amp: [f64; 2],
}

impl Default for JitterSpec {
    fn default() -> Self {
        Self {
            freq: [0.0, 0.0],
            amp: [0.0, 0.0],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Looping {
    #[default]
    Once,
    /// Discard every entity and start a fresh cycle after `hold_ms`.
    Restart { hold_ms: f64 },
}

/// Bounded accumulation: forget the oldest counted entities while the load is over the
/// threshold.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverflowRule {
    pub capacity: f64,
    /// Fraction of `capacity` above which eviction starts.
    pub threshold_ratio: f64,
    /// Always-present load (a pinned system prompt).
    #[serde(default)]
    pub reserved: f64,
    /// First phase whose entities count toward the load.
    pub counted_from: String,
    /// Terminal phase evicted entities jump to.
    pub forgotten: String,
}

impl OverflowRule {
    pub fn threshold(&self) -> f64 {
        self.capacity * self.threshold_ratio
    }
}

/// Bottom-up stack of blocks inside a container; newest entity at the bottom.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StackLayout {
    /// Bottom-left corner of the stack area.
    pub bottom_left: Anchor,
    pub gap: f64,
    pub min_height: f64,
    pub max_height: f64,
    /// Weight that maps to `max_height`.
    pub max_weight: f64,
    /// First phase in which an entity occupies a slot.
    pub member_from: String,
    /// First phase in which it no longer does.
    #[serde(default)]
    pub member_until: Option<String>,
    /// Duration of the slide when slots shift.
    #[serde(default)]
    pub reflow_ms: f64,
    #[serde(default = "default_reflow_ease")]
    pub reflow_ease: Ease,
}

fn default_reflow_ease() -> Ease {
    Ease::OutCubic
}

fn one() -> f64 {
    1.0
}

impl StackLayout {
    pub fn block_height(&self, weight: f64) -> f64 {
        self.min_height + (weight / self.max_weight) * (self.max_height - self.min_height)
    }
}

impl CycleDef {
    pub fn from_json(s: &str) -> TableauResult<Self> {
        serde_json::from_str(s).map_err(|e| TableauError::serde(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> TableauResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TableauError::serde(e.to_string()))
    }

    pub fn phase_index(&self, name: &str) -> Option<PhaseIdx> {
        self.phases
            .iter()
            .position(|p| p.name == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(PhaseIdx)
    }

    /// Checks every authoring rule. [`Cycle::new`] calls this.
    pub fn validate(&self) -> TableauResult<()> {
        self.check().map(|_| ())
    }

    fn check(&self) -> TableauResult<Indices> {
        if self.phases.is_empty() {
            return Err(TableauError::config("cycle must define at least one phase"));
        }
        if self.phases.len() > usize::from(u16::MAX) {
            return Err(TableauError::config("cycle defines too many phases"));
        }
        if self.entities.is_empty() {
            return Err(TableauError::config("cycle must have at least one entity"));
        }
        if u32::try_from(self.entities.len()).is_err() {
            return Err(TableauError::config("cycle has too many entities"));
        }

        let mut seen = BTreeSet::new();
        for p in &self.phases {
            if p.name.is_empty() {
                return Err(TableauError::config("phase names must not be empty"));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(TableauError::config(format!(
                    "duplicate phase name '{}'",
                    p.name
                )));
            }
            check_duration(&format!("phase '{}' duration", p.name), p.duration_ms)?;
            check_duration(&format!("phase '{}' opacity ramp", p.name), p.opacity.ramp_ms)?;
            check_duration(
                &format!("phase '{}' opacity ramp delay", p.name),
                p.opacity.delay_ms,
            )?;
            for v in [p.opacity.from, p.opacity.to] {
                if !v.is_finite() {
                    return Err(TableauError::config(format!(
                        "phase '{}' opacity must be finite",
                        p.name
                    )));
                }
            }
            check_motion(&p.name, &p.motion)?;
        }

        if !self
            .phases
            .iter()
            .any(|p| p.transition == Transition::Terminal)
        {
            return Err(TableauError::config("phase graph has no terminal state"));
        }
        if let Some(last) = self.phases.last()
            && last.transition != Transition::Terminal
        {
            return Err(TableauError::config(format!(
                "last phase '{}' must be terminal",
                last.name
            )));
        }
        let first_terminal = self
            .phases
            .iter()
            .position(|p| p.transition == Transition::Terminal)
            .unwrap_or(0);

        if let Looping::Restart { hold_ms } = self.looping {
            check_duration("hold before restart", hold_ms)?;
        }
        for range in [self.jitter.freq, self.jitter.amp] {
            if !range.iter().all(|v| v.is_finite()) || range[0] > range[1] {
                return Err(TableauError::config(
                    "jitter ranges must be finite with lo <= hi",
                ));
            }
        }

        for (i, e) in self.entities.iter().enumerate() {
            check_duration(&format!("entity {i} spawn delay"), e.spawn_delay_ms)?;
            if !e.weight.is_finite() || e.weight < 0.0 {
                return Err(TableauError::config(format!(
                    "entity {i} weight must be finite and >= 0"
                )));
            }
            for (phase, ms) in &e.durations {
                if self.phase_index(phase).is_none() {
                    return Err(TableauError::config(format!(
                        "entity {i} overrides unknown phase '{phase}'"
                    )));
                }
                check_duration(&format!("entity {i} duration for '{phase}'"), *ms)?;
            }
            for p in [&e.source, &e.target] {
                let anchor = match p.spot {
                    Spot::At(a) => [a.fx, a.fy, a.dx, a.dy],
                    Spot::StackSlot => [0.0; 4],
                };
                let rest = [p.offset.x, p.offset.y, p.scale, p.opacity];
                if !anchor.iter().chain(&rest).all(|v| v.is_finite()) {
                    return Err(TableauError::config(format!(
                        "entity {i} placement must be finite"
                    )));
                }
                if p.uses_stack() && self.stack.is_none() {
                    return Err(TableauError::config(format!(
                        "entity {i} uses a stack slot but the cycle has no stack layout"
                    )));
                }
            }
        }

        let overflow = match &self.overflow {
            None => None,
            Some(rule) => {
                if !rule.capacity.is_finite() || rule.capacity <= 0.0 {
                    return Err(TableauError::config("overflow capacity must be > 0"));
                }
                if !(rule.threshold_ratio > 0.0 && rule.threshold_ratio <= 1.0) {
                    return Err(TableauError::config(
                        "overflow threshold_ratio must be in (0, 1]",
                    ));
                }
                if !rule.reserved.is_finite() || rule.reserved < 0.0 {
                    return Err(TableauError::config("overflow reserved must be >= 0"));
                }
                let from = self.named("overflow counted_from", &rule.counted_from)?;
                let forgotten = self.named("overflow forgotten", &rule.forgotten)?;
                if forgotten <= from {
                    return Err(TableauError::config(
                        "overflow forgotten phase must come after counted_from",
                    ));
                }
                if from.index() > first_terminal {
                    return Err(TableauError::config(
                        "overflow counted_from phase is unreachable",
                    ));
                }
                if self.phases[forgotten.index()].transition != Transition::Terminal {
                    return Err(TableauError::config(
                        "overflow forgotten phase must be terminal",
                    ));
                }
                Some(OverflowIdx {
                    counted_from: from,
                    forgotten,
                    threshold: rule.threshold(),
                })
            }
        };

        let stack = match &self.stack {
            None => None,
            Some(s) => {
                for (name, v) in [
                    ("gap", s.gap),
                    ("min_height", s.min_height),
                    ("max_height", s.max_height),
                ] {
                    if !v.is_finite() || v < 0.0 {
                        return Err(TableauError::config(format!(
                            "stack {name} must be finite and >= 0"
                        )));
                    }
                }
                if !s.max_weight.is_finite() || s.max_weight <= 0.0 {
                    return Err(TableauError::config("stack max_weight must be > 0"));
                }
                check_duration("stack reflow", s.reflow_ms)?;
                let from = self.named("stack member_from", &s.member_from)?;
                let until = match &s.member_until {
                    Some(name) => {
                        let u = self.named("stack member_until", name)?;
                        if u <= from {
                            return Err(TableauError::config(
                                "stack member_until must come after member_from",
                            ));
                        }
                        Some(u)
                    }
                    None => None,
                };
                Some(StackIdx {
                    member_from: from,
                    member_until: until,
                })
            }
        };

        Ok(Indices { overflow, stack })
    }

    fn named(&self, what: &str, name: &str) -> TableauResult<PhaseIdx> {
        self.phase_index(name)
            .ok_or_else(|| TableauError::config(format!("{what} names unknown phase '{name}'")))
    }
}

fn check_duration(what: &str, ms: f64) -> TableauResult<()> {
    if !ms.is_finite() {
        return Err(TableauError::config(format!("{what} must be finite")));
    }
    if ms < 0.0 {
        return Err(TableauError::config(format!(
            "{what} must not be negative, got {ms}"
        )));
    }
    Ok(())
}

fn check_motion(phase: &str, m: &Motion) -> TableauResult<()> {
    let bad = |msg: &str| TableauError::config(format!("phase '{phase}': {msg}"));
    match m {
        Motion::Hold { .. } => Ok(()),
        Motion::Travel { curve, drift } => {
            curve.validate().map_err(bad)?;
            if let Some(d) = drift
                && !(d.axis.x.is_finite() && d.axis.y.is_finite())
            {
                return Err(bad("drift axis must be finite"));
            }
            Ok(())
        }
        Motion::Shift { offset, curve, .. } => {
            curve.validate().map_err(bad)?;
            if !(offset.x.is_finite() && offset.y.is_finite()) {
                return Err(bad("shift offset must be finite"));
            }
            Ok(())
        }
        Motion::Orbit(o) => {
            let mut vals = vec![o.radius, o.speed, o.brightness, o.pulse, o.pulse_rate];
            if let Some(t) = o.twinkle {
                vals.extend([t.base, t.depth, t.rate, t.static_level]);
            }
            if vals.iter().all(|v| v.is_finite()) {
                Ok(())
            } else {
                Err(bad("orbit parameters must be finite"))
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct OverflowIdx {
    pub(crate) counted_from: PhaseIdx,
    pub(crate) forgotten: PhaseIdx,
    pub(crate) threshold: f64,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct StackIdx {
    pub(crate) member_from: PhaseIdx,
    pub(crate) member_until: Option<PhaseIdx>,
}

impl StackIdx {
    pub(crate) fn contains(self, phase: PhaseIdx) -> bool {
        phase >= self.member_from && self.member_until.is_none_or(|u| phase < u)
    }
}

#[derive(Clone, Copy, Debug)]
struct Indices {
    overflow: Option<OverflowIdx>,
    stack: Option<StackIdx>,
}

/// A validated cycle definition with its phase references resolved to indices.
#[derive(Clone, Debug)]
pub struct Cycle {
    def: CycleDef,
    pub(crate) overflow: Option<OverflowIdx>,
    pub(crate) stack: Option<StackIdx>,
}

impl Cycle {
    /// Validates `def`. Configuration errors surface here, before anything is scheduled.
    pub fn new(def: CycleDef) -> TableauResult<Self> {
        let idx = def.check()?;
        Ok(Self {
            def,
            overflow: idx.overflow,
            stack: idx.stack,
        })
    }

    pub fn def(&self) -> &CycleDef {
        &self.def
    }

    pub fn phase(&self, idx: PhaseIdx) -> &PhaseDef {
        &self.def.phases[idx.index()]
    }

    pub fn phase_count(&self) -> usize {
        self.def.phases.len()
    }

    pub fn is_terminal(&self, idx: PhaseIdx) -> bool {
        self.phase(idx).transition == Transition::Terminal
    }

    pub(crate) fn stack_layout(&self) -> Option<(&StackLayout, StackIdx)> {
        self.def.stack.as_ref().zip(self.stack)
    }
}
