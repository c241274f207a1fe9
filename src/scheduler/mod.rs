pub(crate) mod headless;
pub(crate) mod host;
pub(crate) mod timeline;

pub use headless::{FrameLog, HeadlessHost, HeadlessOpts};
pub use host::{
    CycleEvent, FrameDriver, Host, HostSurface, Renderer, SubscriptionId, TimerId, Wake,
    WakeKind,
};
pub use timeline::{Timeline, TimelineState};
