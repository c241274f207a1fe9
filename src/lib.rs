//! Tableau is a deterministic, phase-based timeline engine for illustrative explainer
//! animations.
//!
//! A cycle is an ordered list of named phases plus a set of entities (tokens, message
//! blocks, cards, stars) that move through them. The engine only produces geometry; a
//! swappable [`Renderer`] paints it.
//!
//! # Pipeline overview
//!
//! 1. **Define**: author a [`CycleDef`] (JSON or the [`presets`]) and validate it into a [`Cycle`].
//! 2. **Advance**: a [`CycleRun`] moves every [`Entity`] through its phases with [`advance`],
//!    using schedule-exact phase boundaries and the cycle's overflow rule.
//! 3. **Resolve**: the run resolves a [`Frame`] for any instant against the current [`Viewport`].
//! 4. **Drive**: a [`Timeline`] requests frames from a [`Host`], handles completion, hold and
//!    restart, and guards every timer with a [`Generation`].
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic**: the same cycle, viewport and timestamps give bit-identical frames.
//! - **No ambient state**: the reduced-motion preference and the clock are passed in.
//!
//! [`mount`] is the usual entry point for hosts: it honours [`MotionPreference::Reduce`]
//! by rendering one settled frame instead of starting a Timeline.
#![forbid(unsafe_code)]

mod animation;
mod cycle;
mod foundation;
mod gate;
mod geometry;
mod scheduler;
mod viewport;

/// Ready-made cycles for the explainer widgets.
pub mod presets;

pub use animation::ease::{Curve, Ease, oscillate};
pub use cycle::def::{
    Cycle, CycleDef, Drift, End, EntityDef, Jitter, JitterSpec, Looping, Motion, OpacityRamp,
    Orbit, OverflowRule, PhaseDef, PhaseIdx, StackLayout, Transition, Twinkle,
};
pub use cycle::entity::{Entity, PhaseEntry, advance};
pub use cycle::run::CycleRun;
pub use foundation::core::{Anchor, EntityId, Generation, Placement, Point, Spot, Vec2};
pub use foundation::error::{TableauError, TableauResult};
pub use gate::{MotionPreference, Mounted, mount, settled_frame};
pub use geometry::{Aggregate, Decorations, Frame, Load, PhaseCount, ResolvedEntity};
pub use scheduler::{
    CycleEvent, FrameDriver, FrameLog, HeadlessHost, HeadlessOpts, Host, HostSurface, Renderer,
    SubscriptionId, TimerId, Timeline, TimelineState, Wake, WakeKind,
};
pub use viewport::{SizingPolicy, SurfaceSize, Viewport, ViewportAdapter};
