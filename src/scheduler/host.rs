use slotmap::new_key_type;

use crate::{
    foundation::core::Generation,
    geometry::frame::Frame,
    viewport::SurfaceSize,
};

new_key_type! {
    /// Handle to a pending frame request or timeout.
    pub struct TimerId;
    /// Handle to a resize subscription.
    pub struct SubscriptionId;
}

/// Why a Timeline asked to be woken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeKind {
    /// Next display refresh.
    Frame,
    /// Hold-before-restart elapsed.
    Restart,
}

/// Payload the host hands back when a timer fires. Carries the generation that was
/// current when the timer was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Wake {
    pub generation: Generation,
    pub kind: WakeKind,
}

/// Per-frame redraw opportunities and one-shot timeouts provided by the host.
///
/// Every returned [`TimerId`] must stay revocable through [`clear`](Self::clear) until it
/// fires. Clearing an unknown or already fired id is a no-op.
pub trait FrameDriver {
    fn request_frame(&mut self, wake: Wake) -> TimerId;
    fn set_timeout(&mut self, delay_ms: f64, wake: Wake) -> TimerId;
    fn clear(&mut self, id: TimerId);
}

/// The rendering surface whose size the viewport follows.
pub trait HostSurface {
    fn surface_size(&self) -> SurfaceSize;
    fn subscribe_resize(&mut self) -> SubscriptionId;
    fn unsubscribe_resize(&mut self, id: SubscriptionId);
}

/// Everything a running Timeline needs from its host.
pub trait Host: FrameDriver + HostSurface {}

impl<T: FrameDriver + HostSurface + ?Sized> Host for T {}

/// Cycle boundary notifications, for widgets with cycle-level UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleEvent {
    /// Every entity rests in a terminal phase.
    Completed { generation: Generation, iteration: u64 },
    /// A fresh cycle instance replaced the completed one.
    Restarted { generation: Generation, iteration: u64 },
}

/// Consumer of resolved frames. Painting is entirely its business.
///
/// Errors are logged by the Timeline and never stop the clock.
pub trait Renderer {
    fn draw(&mut self, frame: &Frame) -> anyhow::Result<()>;

    fn cycle_event(&mut self, _event: CycleEvent) {}
}
