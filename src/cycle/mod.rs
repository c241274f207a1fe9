//! Cycle definitions, entities and a single running cycle instance.

pub(crate) mod def;
pub(crate) mod entity;
pub(crate) mod run;
