pub(crate) mod frame;
pub(crate) mod resolve;
pub(crate) mod stack;

pub use frame::{Aggregate, Frame, Load, PhaseCount, ResolvedEntity};
pub use resolve::Decorations;
