use crate::{
    foundation::error::TableauResult,
    scheduler::host::{HostSurface, SubscriptionId},
    viewport::snapshot::{SizingPolicy, SurfaceSize, Viewport},
};

/// Keeps one [`Viewport`] snapshot current for a mounted Timeline.
///
/// Resize notifications are staged and only become visible through [`commit`](Self::commit),
/// which the Timeline calls at the start of a tick. Readers therefore see either the old
/// snapshot or the new one, never a mix, and never a change in the middle of a tick.
#[derive(Debug)]
pub struct ViewportAdapter {
    policy: SizingPolicy,
    current: Viewport,
    staged: Option<Viewport>,
    subscription: Option<SubscriptionId>,
}

impl ViewportAdapter {
    pub fn new(policy: SizingPolicy, initial: SurfaceSize) -> TableauResult<Self> {
        Ok(Self {
            policy,
            current: policy.snapshot(initial)?,
            staged: None,
            subscription: None,
        })
    }

    pub fn policy(&self) -> SizingPolicy {
        self.policy
    }

    pub fn current(&self) -> Viewport {
        self.current
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribes to host resizes and stages the surface's current size. Attaching twice
    /// keeps the existing subscription.
    ///
    /// A surface that cannot be measured yet (a hidden container reporting 0×0) keeps the
    /// current snapshot; the next valid resize replaces it.
    pub fn attach<S: HostSurface + ?Sized>(&mut self, surface: &mut S) {
        if self.subscription.is_some() {
            return;
        }
        let size = surface.surface_size();
        match self.policy.snapshot(size) {
            Ok(next) => self.staged = Some(next),
            Err(err) => tracing::debug!(
                error = %err,
                width = size.width,
                height = size.height,
                "surface not measurable at attach; keeping current viewport"
            ),
        }
        self.subscription = Some(surface.subscribe_resize());
    }

    pub fn detach<S: HostSurface + ?Sized>(&mut self, surface: &mut S) {
        if let Some(id) = self.subscription.take() {
            surface.unsubscribe_resize(id);
        }
        self.staged = None;
    }

    /// Stages a fresh snapshot for `size`. Repeated calls before the next commit coalesce;
    /// only the latest size survives. An invalid size leaves everything untouched.
    pub fn stage(&mut self, size: SurfaceSize) -> TableauResult<()> {
        let next = self.policy.snapshot(size)?;
        self.staged = Some(next);
        Ok(())
    }

    /// Publishes the staged snapshot, if any. Returns whether the published snapshot changed.
    pub fn commit(&mut self) -> bool {
        match self.staged.take() {
            Some(next) if next != self.current => {
                tracing::debug!(
                    width = next.width,
                    height = next.height,
                    pixel_density = next.pixel_density,
                    "viewport snapshot replaced"
                );
                self.current = next;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::headless::{HeadlessHost, HeadlessOpts};

    fn host() -> HeadlessHost {
        HeadlessHost::new(HeadlessOpts::default(), SurfaceSize::new(400.0, 300.0, 1.0))
    }

    #[test]
    fn staged_sizes_are_invisible_until_commit() {
        let mut a = ViewportAdapter::new(SizingPolicy::Fill, SurfaceSize::new(400.0, 300.0, 1.0))
            .unwrap();
        a.stage(SurfaceSize::new(500.0, 300.0, 1.0)).unwrap();
        a.stage(SurfaceSize::new(640.0, 480.0, 2.0)).unwrap();
        assert_eq!(a.current().width, 400.0);

        assert!(a.commit());
        assert_eq!(a.current(), Viewport::new(640.0, 480.0, 2.0).unwrap());
        assert!(!a.commit());
    }

    #[test]
    fn invalid_size_keeps_previous_snapshot() {
        let mut a = ViewportAdapter::new(SizingPolicy::Fill, SurfaceSize::new(400.0, 300.0, 1.0))
            .unwrap();
        assert!(a.stage(SurfaceSize::new(0.0, 300.0, 1.0)).is_err());
        assert!(!a.commit());
        assert_eq!(a.current().width, 400.0);
    }

    #[test]
    fn attach_is_idempotent_and_detach_releases() {
        let mut h = host();
        let mut a = ViewportAdapter::new(SizingPolicy::Fill, h.surface_size()).unwrap();
        a.attach(&mut h);
        a.attach(&mut h);
        assert_eq!(h.active_subscriptions(), 1);

        a.detach(&mut h);
        a.detach(&mut h);
        assert_eq!(h.active_subscriptions(), 0);
        assert!(!a.is_attached());
    }

    #[test]
    fn attach_to_hidden_surface_keeps_snapshot() {
        let mut h = HeadlessHost::new(HeadlessOpts::default(), SurfaceSize::new(0.0, 0.0, 1.0));
        let mut a = ViewportAdapter::new(SizingPolicy::Fill, SurfaceSize::new(400.0, 300.0, 1.0))
            .unwrap();
        a.attach(&mut h);
        assert!(a.is_attached());
        assert!(!a.commit());
        assert_eq!(a.current(), Viewport::new(400.0, 300.0, 1.0).unwrap());
    }
}
