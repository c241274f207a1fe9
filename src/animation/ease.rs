/// Normalized easing curve: maps progress in `[0, 1]` to eased progress in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
}

impl Ease {
    pub const ALL: [Ease; 7] = [
        Ease::Linear,
        Ease::InQuad,
        Ease::OutQuad,
        Ease::InOutQuad,
        Ease::InCubic,
        Ease::OutCubic,
        Ease::InOutCubic,
    ];

    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
        }
    }
}

/// Sinusoidal oscillator for decorative motion. Unbounded input, output in `[-1, 1]`;
/// callers scale it.
pub fn oscillate(angle: f64) -> f64 {
    angle.sin()
}

/// Progress curve of a directed motion.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    Ease(Ease),
    /// Fall-and-settle: `early` runs `early_rate` times faster and dominates at the start,
    /// `late` takes over as progress approaches 1. The weight of `late` is the raw
    /// progress, so both endpoints are exact and the blend is continuous.
    Blend {
        early: Ease,
        early_rate: f64,
        late: Ease,
    },
}

impl Curve {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Ease(e) => e.apply(t),
            Self::Blend {
                early,
                early_rate,
                late,
            } => {
                let a = early.apply((t * early_rate).min(1.0));
                let b = late.apply(t);
                a * (1.0 - t) + b * t
            }
        }
    }

    pub(crate) fn validate(self) -> Result<(), &'static str> {
        match self {
            Self::Ease(_) => Ok(()),
            Self::Blend { early_rate, .. } => {
                if early_rate.is_finite() && early_rate > 0.0 {
                    Ok(())
                } else {
                    Err("blend early_rate must be finite and > 0")
                }
            }
        }
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::Ease(Ease::Linear)
    }
}
