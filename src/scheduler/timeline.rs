use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    cycle::def::{Cycle, CycleDef, Looping},
    cycle::run::CycleRun,
    foundation::core::Generation,
    foundation::error::{TableauError, TableauResult},
    geometry::frame::Frame,
    geometry::resolve::Decorations,
    scheduler::host::{CycleEvent, Host, Renderer, TimerId, Wake, WakeKind},
    viewport::{SurfaceSize, ViewportAdapter},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineState {
    Idle,
    Running,
    /// Every entity is at rest; a restart may be pending.
    Completed,
    Cancelled,
}

/// Drives one cycle definition on a host: frame requests, completion, hold and restart.
///
/// Every timer the Timeline creates is tagged with its current [`Generation`]. Starting,
/// restarting, superseding and cancelling all move to a new generation, so a wake created
/// for an earlier instance is dropped without touching state.
#[derive(Debug)]
pub struct Timeline {
    state: TimelineState,
    generation: Generation,
    iteration: u64,
    run: Option<CycleRun>,
    viewport: ViewportAdapter,
    pending: SmallVec<[TimerId; 2]>,
}

impl Timeline {
    pub fn new(viewport: ViewportAdapter) -> Self {
        Self {
            state: TimelineState::Idle,
            generation: Generation::default(),
            iteration: 0,
            run: None,
            viewport,
            pending: SmallVec::new(),
        }
    }

    pub fn state(&self) -> TimelineState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn viewport(&self) -> &ViewportAdapter {
        &self.viewport
    }

    pub fn run(&self) -> Option<&CycleRun> {
        self.run.as_ref()
    }

    /// Timers created by this Timeline that have neither fired nor been cleared.
    pub fn pending_timers(&self) -> usize {
        self.pending.len()
    }

    /// Validates `def` and starts driving it from `now_ms`.
    ///
    /// A malformed definition is returned as an error before anything is scheduled, and
    /// the Timeline is left as it was.
    #[tracing::instrument(skip(self, def, host), fields(cycle = %def.name))]
    pub fn start<H: Host + ?Sized>(
        &mut self,
        def: CycleDef,
        now_ms: f64,
        host: &mut H,
    ) -> TableauResult<()> {
        let cycle = Arc::new(Cycle::new(def)?);
        self.begin(cycle, now_ms, host);
        self.iteration = 0;
        tracing::debug!(generation = self.generation.0, "timeline started");
        Ok(())
    }

    /// Replaces the running cycle with `def` (the next sentence, a new script).
    ///
    /// Counts as a new iteration. Validation errors leave the current cycle running.
    pub fn supersede<H: Host + ?Sized>(
        &mut self,
        def: CycleDef,
        now_ms: f64,
        host: &mut H,
    ) -> TableauResult<()> {
        let cycle = Arc::new(Cycle::new(def)?);
        self.begin(cycle, now_ms, host);
        self.iteration += 1;
        tracing::debug!(
            generation = self.generation.0,
            iteration = self.iteration,
            "cycle superseded"
        );
        Ok(())
    }

    fn begin<H: Host + ?Sized>(&mut self, cycle: Arc<Cycle>, now_ms: f64, host: &mut H) {
        self.clear_timers(host);
        self.viewport.attach(host);
        self.generation = self.generation.next();
        self.run = Some(CycleRun::new(cycle, now_ms));
        self.state = TimelineState::Running;
        self.request_frame(host);
    }

    /// Stops ticking and releases every timer and the resize subscription.
    ///
    /// Safe to call repeatedly and before `start`.
    pub fn cancel<H: Host + ?Sized>(&mut self, host: &mut H) {
        self.clear_timers(host);
        self.viewport.detach(host);
        if matches!(
            self.state,
            TimelineState::Running | TimelineState::Completed
        ) {
            self.generation = self.generation.next();
            self.state = TimelineState::Cancelled;
            tracing::debug!(generation = self.generation.0, "timeline cancelled");
        }
    }

    /// Stages a new surface size; it becomes visible at the start of the next tick.
    pub fn notify_resize(&mut self, size: SurfaceSize) -> TableauResult<()> {
        if !self.viewport.is_attached() {
            return Ok(());
        }
        self.viewport.stage(size)
    }

    /// Advances every entity to `now_ms` and resolves a frame.
    ///
    /// Staged viewport changes are committed first, so the whole frame uses one snapshot.
    pub fn tick(&mut self, now_ms: f64) -> TableauResult<Frame> {
        self.viewport.commit();
        let viewport = self.viewport.current();
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| TableauError::Other(anyhow::anyhow!("timeline was never started")))?;
        run.advance_to(now_ms);
        let mut frame = run.resolve(now_ms, viewport, Decorations::Animated)?;
        frame.generation = self.generation;
        frame.iteration = self.iteration;
        Ok(frame)
    }

    /// Entry point for every host timer the Timeline created.
    pub fn on_wake<H: Host + ?Sized, R: Renderer + ?Sized>(
        &mut self,
        id: TimerId,
        wake: Wake,
        now_ms: f64,
        host: &mut H,
        renderer: &mut R,
    ) {
        self.pending.retain(|p| *p != id);
        if wake.generation != self.generation {
            tracing::trace!(
                stale = wake.generation.0,
                current = self.generation.0,
                "stale wake dropped"
            );
            return;
        }
        match (wake.kind, self.state) {
            (WakeKind::Frame, TimelineState::Running) => self.on_frame(now_ms, host, renderer),
            (WakeKind::Restart, TimelineState::Completed) => self.restart(now_ms, host, renderer),
            (kind, state) => tracing::trace!(?kind, ?state, "wake ignored"),
        }
    }

    fn on_frame<H: Host + ?Sized, R: Renderer + ?Sized>(
        &mut self,
        now_ms: f64,
        host: &mut H,
        renderer: &mut R,
    ) {
        match self.tick(now_ms) {
            Ok(frame) => {
                if let Err(err) = renderer.draw(&frame) {
                    tracing::warn!(error = %err, now_ms, "renderer failed to draw frame");
                }
            }
            Err(err) => tracing::warn!(error = %err, now_ms, "frame could not be resolved"),
        }

        let Some(run) = &self.run else {
            return;
        };
        if !run.is_settled(now_ms) {
            self.request_frame(host);
            return;
        }

        let settled_at = run.rest_time().unwrap_or(now_ms);
        let looping = run.cycle().def().looping;
        self.state = TimelineState::Completed;
        tracing::debug!(
            generation = self.generation.0,
            iteration = self.iteration,
            settled_at,
            "cycle completed"
        );
        renderer.cycle_event(CycleEvent::Completed {
            generation: self.generation,
            iteration: self.iteration,
        });

        if let Looping::Restart { hold_ms } = looping {
            let delay = (settled_at + hold_ms - now_ms).max(0.0);
            let id = host.set_timeout(
                delay,
                Wake {
                    generation: self.generation,
                    kind: WakeKind::Restart,
                },
            );
            self.pending.push(id);
        }
    }

    fn restart<H: Host + ?Sized, R: Renderer + ?Sized>(
        &mut self,
        now_ms: f64,
        host: &mut H,
        renderer: &mut R,
    ) {
        let Some(cycle) = self.run.as_ref().map(|r| r.cycle().clone()) else {
            return;
        };
        self.generation = self.generation.next();
        self.iteration += 1;
        self.run = Some(CycleRun::new(cycle, now_ms));
        self.state = TimelineState::Running;
        tracing::debug!(
            generation = self.generation.0,
            iteration = self.iteration,
            "cycle restarted"
        );
        renderer.cycle_event(CycleEvent::Restarted {
            generation: self.generation,
            iteration: self.iteration,
        });
        self.request_frame(host);
    }

    fn request_frame<H: Host + ?Sized>(&mut self, host: &mut H) {
        let id = host.request_frame(Wake {
            generation: self.generation,
            kind: WakeKind::Frame,
        });
        self.pending.push(id);
    }

    fn clear_timers<H: Host + ?Sized>(&mut self, host: &mut H) {
        for id in self.pending.drain(..) {
            host.clear(id);
        }
    }
}
