use crate::{
    foundation::core::{EntityId, Generation},
    foundation::math::Fnv1a64,
    viewport::Viewport,
};

/// Fully resolved, renderer-agnostic snapshot of one instant.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Frame {
    pub generation: Generation,
    /// Restarts and supersedes since the timeline was started.
    pub iteration: u64,
    pub now_ms: f64,
    /// Time since the current cycle instance began.
    pub cycle_ms: f64,
    pub viewport: Viewport,
    pub entities: Vec<ResolvedEntity>,
    pub aggregate: Aggregate,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ResolvedEntity {
    pub id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub phase: String,
    pub x: f64,
    pub y: f64,
    pub opacity: f64,
    pub scale: f64,
    pub weight: f64,
    /// Block height when the entity is laid out in a stack; `(x, y)` is then its top-left.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// Values derived from entity phases for on-screen counters and bars.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Aggregate {
    pub phases: Vec<PhaseCount>,
    /// Entities resting in a terminal phase.
    pub at_rest: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<Load>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PhaseCount {
    pub name: String,
    pub count: usize,
}

/// Overflow accounting at the frame's instant.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Load {
    pub used: f64,
    pub capacity: f64,
    pub threshold: f64,
    /// `used / capacity`, capped at 1.
    pub fraction: f64,
}

impl Aggregate {
    pub fn count(&self, phase: &str) -> usize {
        self.phases
            .iter()
            .find(|p| p.name == phase)
            .map_or(0, |p| p.count)
    }
}

impl Frame {
    /// Stable hash of the frame's visible content.
    ///
    /// Covers the viewport, every entity and the aggregate; generation and absolute time
    /// are left out. A restart reproduces the first cycle's fingerprints only when no
    /// phase uses orbit motion, which samples the absolute clock.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Fnv1a64::new_default();
        h.write_f64(self.cycle_ms);
        h.write_f64(self.viewport.width);
        h.write_f64(self.viewport.height);
        h.write_f64(self.viewport.pixel_density);
        h.write_u64(self.entities.len() as u64);
        for e in &self.entities {
            h.write_u64(u64::from(e.id.0));
            h.write_bytes(e.phase.as_bytes());
            h.write_f64(e.x);
            h.write_f64(e.y);
            h.write_f64(e.opacity);
            h.write_f64(e.scale);
            h.write_f64(e.height.unwrap_or(-1.0));
        }
        for p in &self.aggregate.phases {
            h.write_u64(p.count as u64);
        }
        if let Some(load) = self.aggregate.load {
            h.write_f64(load.used);
        }
        h.finish()
    }

    pub fn entity(&self, id: u32) -> Option<&ResolvedEntity> {
        self.entities.iter().find(|e| e.id.0 == id)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
