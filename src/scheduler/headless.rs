use slotmap::SlotMap;

use crate::{
    foundation::error::TableauResult,
    geometry::frame::Frame,
    scheduler::host::{
        CycleEvent, FrameDriver, HostSurface, Renderer, SubscriptionId, TimerId, Wake,
    },
    scheduler::timeline::Timeline,
    viewport::SurfaceSize,
};

/// Options for [`HeadlessHost`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadlessOpts {
    /// Virtual display refresh rate. Frame requests fire on multiples of `1000 / refresh_hz`.
    pub refresh_hz: f64,
}

impl Default for HeadlessOpts {
    fn default() -> Self {
        Self { refresh_hz: 60.0 }
    }
}

#[derive(Clone, Copy, Debug)]
struct PendingTimer {
    due_ms: f64,
    seq: u64,
    wake: Wake,
}

/// Deterministic host with a virtual clock, for tests and offline runs.
///
/// Nothing happens until [`run_until`](Self::run_until) is called; timers then fire in
/// `(due time, creation order)` order and the clock jumps from one to the next.
#[derive(Debug)]
pub struct HeadlessHost {
    frame_ms: f64,
    now_ms: f64,
    surface: SurfaceSize,
    timers: SlotMap<TimerId, PendingTimer>,
    subscriptions: SlotMap<SubscriptionId, ()>,
    seq: u64,
    timers_created: u64,
}

impl HeadlessHost {
    pub fn new(opts: HeadlessOpts, surface: SurfaceSize) -> Self {
        Self {
            frame_ms: 1000.0 / opts.refresh_hz.max(1.0),
            now_ms: 0.0,
            surface,
            timers: SlotMap::with_key(),
            subscriptions: SlotMap::with_key(),
            seq: 0,
            timers_created: 0,
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn frame_interval_ms(&self) -> f64 {
        self.frame_ms
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Frame requests and timeouts created since construction.
    pub fn timers_created(&self) -> u64 {
        self.timers_created
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Changes the surface size and notifies `timeline` if anything is subscribed.
    pub fn resize(&mut self, size: SurfaceSize, timeline: &mut Timeline) -> TableauResult<()> {
        self.surface = size;
        if self.subscriptions.is_empty() {
            return Ok(());
        }
        timeline.notify_resize(size)
    }

    /// Fires every timer due at or before `until_ms`, then moves the clock to `until_ms`.
    /// Returns the number of wakes delivered.
    pub fn run_until<R: Renderer + ?Sized>(
        &mut self,
        until_ms: f64,
        timeline: &mut Timeline,
        renderer: &mut R,
    ) -> usize {
        let mut delivered = 0;
        while let Some((id, due_ms)) = self.next_due()
            && due_ms <= until_ms
        {
            let Some(timer) = self.timers.remove(id) else {
                break;
            };
            self.now_ms = self.now_ms.max(timer.due_ms);
            timeline.on_wake(id, timer.wake, self.now_ms, self, renderer);
            delivered += 1;
        }
        self.now_ms = self.now_ms.max(until_ms);
        delivered
    }

    fn next_due(&self) -> Option<(TimerId, f64)> {
        self.timers
            .iter()
            .min_by(|a, b| a.1.due_ms.total_cmp(&b.1.due_ms).then(a.1.seq.cmp(&b.1.seq)))
            .map(|(id, t)| (id, t.due_ms))
    }

    fn schedule(&mut self, due_ms: f64, wake: Wake) -> TimerId {
        self.seq += 1;
        self.timers_created += 1;
        self.timers.insert(PendingTimer {
            due_ms,
            seq: self.seq,
            wake,
        })
    }
}

impl FrameDriver for HeadlessHost {
    /// Next refresh boundary strictly after the current time.
    fn request_frame(&mut self, wake: Wake) -> TimerId {
        let mut k = (self.now_ms / self.frame_ms).floor() + 1.0;
        while k * self.frame_ms <= self.now_ms {
            k += 1.0;
        }
        self.schedule(k * self.frame_ms, wake)
    }

    fn set_timeout(&mut self, delay_ms: f64, wake: Wake) -> TimerId {
        self.schedule(self.now_ms + delay_ms.max(0.0), wake)
    }

    fn clear(&mut self, id: TimerId) {
        self.timers.remove(id);
    }
}

impl HostSurface for HeadlessHost {
    fn surface_size(&self) -> SurfaceSize {
        self.surface
    }

    fn subscribe_resize(&mut self) -> SubscriptionId {
        self.subscriptions.insert(())
    }

    fn unsubscribe_resize(&mut self, id: SubscriptionId) {
        self.subscriptions.remove(id);
    }
}

/// Renderer that keeps every frame and cycle event it receives.
#[derive(Debug, Default)]
pub struct FrameLog {
    pub frames: Vec<Frame>,
    pub events: Vec<CycleEvent>,
}

impl Renderer for FrameLog {
    fn draw(&mut self, frame: &Frame) -> anyhow::Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn cycle_event(&mut self, event: CycleEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Generation;
    use crate::scheduler::host::WakeKind;

    fn wake() -> Wake {
        Wake {
            generation: Generation(1),
            kind: WakeKind::Frame,
        }
    }

    #[test]
    fn frames_land_on_refresh_boundaries() {
        let mut h = HeadlessHost::new(
            HeadlessOpts { refresh_hz: 50.0 },
            SurfaceSize::new(10.0, 10.0, 1.0),
        );
        h.request_frame(wake());
        assert_eq!(h.next_due().unwrap().1, 20.0);
        h.now_ms = 20.0;
        h.request_frame(wake());
        assert_eq!(h.next_due().unwrap().1, 20.0);
        assert_eq!(h.timers.values().map(|t| t.due_ms).fold(0.0, f64::max), 40.0);
    }

    #[test]
    fn cleared_timers_never_fire() {
        let mut h = HeadlessHost::new(HeadlessOpts::default(), SurfaceSize::new(10.0, 10.0, 1.0));
        let a = h.set_timeout(5.0, wake());
        h.clear(a);
        h.clear(a);
        assert_eq!(h.pending_timers(), 0);
        assert_eq!(h.timers_created(), 1);
    }

    #[test]
    fn subscriptions_are_counted() {
        let mut h = HeadlessHost::new(HeadlessOpts::default(), SurfaceSize::new(10.0, 10.0, 1.0));
        let s = h.subscribe_resize();
        assert_eq!(h.active_subscriptions(), 1);
        h.unsubscribe_resize(s);
        assert_eq!(h.active_subscriptions(), 0);
    }
}
