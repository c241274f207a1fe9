//! Viewport snapshots and the adapter that keeps them current across host resizes.

pub(crate) mod adapter;
pub(crate) mod snapshot;

pub use adapter::ViewportAdapter;
pub use snapshot::{SizingPolicy, SurfaceSize, Viewport};
