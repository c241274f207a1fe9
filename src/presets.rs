//! Ready-made cycles for the four explainer widgets.
//!
//! Each preset is an ordinary [`CycleDef`]; hosts may serialize, tweak and validate it like
//! any hand-written cycle.

use std::str::FromStr;

use crate::{
    animation::ease::{Curve, Ease},
    cycle::def::{
        CycleDef, Drift, End, EntityDef, Jitter, JitterSpec, Looping, Motion, Orbit,
        OverflowRule, PhaseDef, StackLayout, Twinkle,
    },
    foundation::core::{Anchor, Placement, Vec2},
    foundation::error::TableauError,
    foundation::math::Rng64,
    viewport::{SizingPolicy, SurfaceSize},
};

/// Sentences for the token rain, already split into subword tokens.
pub const SENTENCES: [&[&str]; 3] = [
    &[
        "The", " quick", " brown", " fox", " jumps", " over", " the", " lazy", " dog",
    ],
    &[
        "Write", " me", " a", " poem", " about", " the", " ocean", " at", " mid", "night",
    ],
    &[
        "You", " are", " a", " helpful", " coding", " assist", "ant",
    ],
];

const PILL_CHAR_W: f64 = 7.0;
const PILL_PAD: f64 = 16.0;

fn pill_width(token: &str) -> f64 {
    token.chars().count() as f64 * PILL_CHAR_W + PILL_PAD
}

/// Left edges of a centred row of pills, relative to the row centre.
fn centred_row(widths: &[f64], gap: f64) -> Vec<f64> {
    let total = widths.iter().sum::<f64>() + gap * widths.len().saturating_sub(1) as f64;
    let mut x = -total / 2.0;
    widths
        .iter()
        .map(|w| {
            let left = x;
            x += w + gap;
            left
        })
        .collect()
}

/// A sentence breaks into tokens that fall, one after another, into a buffer row at the
/// bottom. `sentence` wraps around [`SENTENCES`].
pub fn token_rain(sentence: usize) -> CycleDef {
    let index = sentence % SENTENCES.len();
    let tokens = SENTENCES[index];
    let widths: Vec<f64> = tokens.iter().map(|t| pill_width(t)).collect();
    let source_x = centred_row(&widths, 6.0);
    let buffer_x = centred_row(&widths, 4.0);

    let entities = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            EntityDef::new(
                Placement::at(Anchor::frac(0.5, 0.0).offset(source_x[i], 60.0)),
                Placement::at(Anchor::frac(0.5, 1.0).offset(buffer_x[i], -60.0)),
            )
            .label(*token)
            .spawn_delay(180.0 * i as f64)
            .duration("falling", 1_800.0 + 80.0 * i as f64)
        })
        .collect();

    CycleDef {
        name: format!("token-rain-{index}"),
        seed: 0x7A1E_5EED ^ index as u64,
        phases: vec![
            // Sentence shown for 1.4 s, then fades out over 0.6 s while splitting apart.
            PhaseDef::new("source", 2_100.0, Motion::hold_source())
                .ramp(1.0, 0.0, 600.0)
                .ramp_after(1_400.0),
            PhaseDef::new(
                "falling",
                1_800.0,
                Motion::Travel {
                    // The widget positions with OutCubic alone; blending in the slow InQuad
                    // start gives the drop a visible acceleration.
                    curve: Curve::Blend {
                        early: Ease::InQuad,
                        early_rate: 0.7,
                        late: Ease::OutCubic,
                    },
                    drift: Some(Drift {
                        axis: Vec2::new(1.0, 0.0),
                    }),
                },
            )
            .ramp(0.0, 1.0, 200.0),
            PhaseDef::new("landed", 0.0, Motion::hold_target()).terminal(),
        ],
        entities,
        looping: Looping::Restart { hold_ms: 2_200.0 },
        jitter: JitterSpec {
            freq: [0.02, 0.035],
            amp: [12.0, 28.0],
        },
        overflow: None,
        stack: None,
    }
}

/// Scripted chat messages: (label, tokens).
pub const MESSAGES: [(&str, f64); 12] = [
    ("User", 142.0),
    ("AI", 386.0),
    ("User", 98.0),
    ("AI", 512.0),
    ("User", 210.0),
    ("AI", 648.0),
    ("User", 176.0),
    ("AI", 890.0),
    ("User", 124.0),
    ("AI", 720.0),
    ("User", 308.0),
    ("AI", 564.0),
];

pub const SYSTEM_PROMPT_TOKENS: f64 = 280.0;
pub const CONTEXT_CAPACITY: f64 = 4_096.0;

/// Messages stack up in a context window; once the window passes 88% the oldest ones are
/// forgotten. Arrival gaps are seeded from `seed`.
pub fn context_window(seed: u64) -> CycleDef {
    let mut rng = Rng64::new(seed);
    let mut at = 800.0;
    let entities = MESSAGES
        .iter()
        .map(|(label, tokens)| {
            let e = EntityDef::new(
                Placement::stack_slot().with_offset(0.0, 20.0).with_opacity(0.0),
                Placement::stack_slot(),
            )
            .label(*label)
            .weight(*tokens)
            .spawn_delay(at);
            at += 1_500.0 + 500.0 * rng.next_f64_01();
            e
        })
        .collect();

    CycleDef {
        name: "context-window".to_owned(),
        seed,
        phases: vec![
            PhaseDef::new("queued", 0.0, Motion::hold_source()),
            PhaseDef::new("entering", 600.0, Motion::travel(Curve::Ease(Ease::OutQuad))),
            PhaseDef::new("resident", 0.0, Motion::hold_target()).terminal(),
            PhaseDef::new(
                "forgotten",
                800.0,
                Motion::Shift {
                    at: End::Target,
                    offset: Vec2::new(0.0, 30.0),
                    curve: Curve::Ease(Ease::OutQuad),
                },
            )
            .ramp(1.0, 0.0, 500.0)
            .terminal(),
        ],
        entities,
        looping: Looping::Restart { hold_ms: 3_000.0 },
        jitter: JitterSpec::default(),
        overflow: Some(OverflowRule {
            capacity: CONTEXT_CAPACITY,
            threshold_ratio: 0.88,
            reserved: SYSTEM_PROMPT_TOKENS,
            counted_from: "entering".to_owned(),
            forgotten: "forgotten".to_owned(),
        }),
        stack: Some(StackLayout {
            bottom_left: Anchor::px(96.0, 414.0),
            gap: 4.0,
            min_height: 22.0,
            max_height: 58.0,
            max_weight: 900.0,
            member_from: "entering".to_owned(),
            member_until: Some("forgotten".to_owned()),
            reflow_ms: 600.0,
            reflow_ease: Ease::OutCubic,
        }),
    }
}

/// Skills and the share of each that AI can take on.
pub const SKILLS: [(&str, f64); 8] = [
    ("Data entry", 90.0),
    ("Writing first drafts", 70.0),
    ("Code scaffolding", 65.0),
    ("Research synthesis", 50.0),
    ("Strategic planning", 35.0),
    ("Empathy in a crisis", 10.0),
    ("Original questions", 5.0),
    ("Creative vision", 15.0),
];

const BAR_Y: f64 = 155.0;
const BAR_X: [f64; 2] = [50.0, 550.0];
const CARD_OFFSETS: [f64; 4] = [38.0, 70.0, 38.0, 70.0];

/// Cards appear at the centre of a human-to-AI bar and slide to their position on it,
/// alternating above and below.
pub fn skill_spectrum() -> CycleDef {
    let centre = (BAR_X[0] + BAR_X[1]) / 2.0;
    let appear = |i: usize| 500.0 + 700.0 * i as f64;
    let fade_at = appear(SKILLS.len()) + 650.0 + 600.0 + 4_000.0;

    let entities = SKILLS
        .iter()
        .enumerate()
        .map(|(i, (name, ai))| {
            let offset = CARD_OFFSETS[i / 2];
            let y = if i % 2 == 0 { BAR_Y - offset } else { BAR_Y + offset };
            let x = BAR_X[0] + ai / 100.0 * (BAR_X[1] - BAR_X[0]);
            EntityDef::new(
                Placement::at(Anchor::px(centre, y)).with_opacity(0.0),
                Placement::at(Anchor::px(x, y)),
            )
            .label(*name)
            .weight(*ai)
            .spawn_delay(appear(i))
            .duration("placed", fade_at - appear(i) - 650.0)
        })
        .collect();

    CycleDef {
        name: "skill-spectrum".to_owned(),
        seed: 0,
        phases: vec![
            PhaseDef::new("hidden", 0.0, Motion::hold_source()),
            PhaseDef::new("sliding", 650.0, Motion::travel(Curve::Ease(Ease::OutQuad))),
            PhaseDef::new("placed", 0.0, Motion::hold_target()).terminal(),
        ],
        entities,
        looping: Looping::Restart { hold_ms: 1_000.0 },
        jitter: JitterSpec::default(),
        overflow: None,
        stack: None,
    }
}

struct Cluster {
    label: &'static str,
    centre: (f64, f64),
    spread: f64,
    /// (name, ox, oy, twinkle offset, twinkle speed)
    tools: &'static [(&'static str, f64, f64, f64, f64)],
}

const CLUSTERS: [Cluster; 5] = [
    Cluster {
        label: "IMAGE GEN",
        centre: (0.2, 0.22),
        spread: 0.12,
        tools: &[
            ("Midjourney", 0.0, -0.3, 0.0, 1.0),
            ("DALL·E", -0.35, 0.15, 1.2, 0.8),
            ("Stable Diffusion", 0.4, 0.1, 2.5, 1.1),
            ("Flux", -0.1, 0.45, 3.8, 0.9),
            ("Ideogram", 0.3, -0.35, 5.0, 1.2),
        ],
    },
    Cluster {
        label: "VIDEO",
        centre: (0.78, 0.2),
        spread: 0.1,
        tools: &[
            ("Sora", 0.0, -0.35, 0.7, 0.9),
            ("Runway", -0.4, 0.1, 2.1, 1.1),
            ("Kling", 0.35, 0.15, 3.3, 0.7),
            ("Pika", 0.0, 0.4, 4.6, 1.3),
        ],
    },
    Cluster {
        label: "MUSIC & AUDIO",
        centre: (0.82, 0.55),
        spread: 0.09,
        tools: &[
            ("Suno", -0.3, -0.25, 1.1, 1.0),
            ("Udio", 0.35, -0.15, 2.4, 0.85),
            ("ElevenLabs", 0.0, 0.35, 4.0, 1.15),
        ],
    },
    Cluster {
        label: "RESEARCH",
        centre: (0.2, 0.72),
        spread: 0.11,
        tools: &[
            ("Perplexity", 0.0, -0.35, 0.3, 1.05),
            ("Elicit", -0.4, 0.1, 1.8, 0.75),
            ("NotebookLM", 0.35, 0.05, 3.1, 1.2),
            ("Claude Research", 0.0, 0.4, 4.5, 0.95),
        ],
    },
    Cluster {
        label: "CODING",
        centre: (0.72, 0.78),
        spread: 0.12,
        tools: &[
            ("Claude Code", 0.0, -0.3, 0.5, 1.1),
            ("Cursor", -0.4, 0.05, 1.9, 0.8),
            ("Copilot", 0.38, 0.0, 3.2, 1.0),
            ("Windsurf", -0.15, 0.4, 4.4, 1.25),
            ("Replit", 0.25, 0.38, 5.7, 0.9),
        ],
    },
];

const CLUSTER_SPOTLIGHT_MS: f64 = 4_000.0;

fn star(brightness: f64, pulse: f64) -> Motion {
    Motion::Orbit(Orbit {
        at: End::Target,
        radius: 0.4 * 0.003,
        speed: 0.0003,
        brightness,
        twinkle: Some(Twinkle {
            base: 0.55,
            depth: 0.45,
            rate: 0.0015,
            static_level: 0.85,
        }),
        pulse,
        pulse_rate: 0.002,
    })
}

/// Tool stars grouped in clusters; the spotlight moves from cluster to cluster.
pub fn constellation() -> CycleDef {
    let n = CLUSTERS.len();
    let entities = CLUSTERS
        .iter()
        .enumerate()
        .flat_map(|(ci, cluster)| {
            cluster.tools.iter().map(move |(name, ox, oy, offset, speed)| {
                let at = Anchor::frac(
                    cluster.centre.0 + ox * cluster.spread,
                    cluster.centre.1 + oy * cluster.spread,
                );
                EntityDef::new(Placement::at(at), Placement::at(at))
                    .label(format!("{} / {name}", cluster.label))
                    .spawn_delay(CLUSTER_SPOTLIGHT_MS * ci as f64)
                    .duration("resting", CLUSTER_SPOTLIGHT_MS * (n - 1 - ci) as f64)
                    .jitter(Jitter {
                        phase: *offset,
                        freq: *speed,
                        amp: 0.0,
                    })
            })
        })
        .collect();

    CycleDef {
        name: "constellation".to_owned(),
        seed: 0,
        phases: vec![
            PhaseDef::new("waiting", 0.0, star(0.65, 0.0)),
            PhaseDef::new("spotlit", CLUSTER_SPOTLIGHT_MS, star(1.0, 0.25)),
            PhaseDef::new("resting", 0.0, star(0.65, 0.0)).terminal(),
        ],
        entities,
        looping: Looping::Restart { hold_ms: 0.0 },
        jitter: JitterSpec::default(),
        overflow: None,
        stack: None,
    }
}

/// The built-in presets, with the surface each was designed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    TokenRain,
    ContextWindow,
    SkillSpectrum,
    Constellation,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::TokenRain,
        Preset::ContextWindow,
        Preset::SkillSpectrum,
        Preset::Constellation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TokenRain => "token-rain",
            Self::ContextWindow => "context-window",
            Self::SkillSpectrum => "skill-spectrum",
            Self::Constellation => "constellation",
        }
    }

    pub fn cycle(self) -> CycleDef {
        match self {
            Self::TokenRain => token_rain(0),
            Self::ContextWindow => context_window(0),
            Self::SkillSpectrum => skill_spectrum(),
            Self::Constellation => constellation(),
        }
    }

    pub fn sizing(self) -> SizingPolicy {
        match self {
            Self::TokenRain => SizingPolicy::AspectRatio { ratio: 0.9 },
            Self::ContextWindow => SizingPolicy::Fixed {
                width: 440.0,
                height: 460.0,
            },
            Self::SkillSpectrum => SizingPolicy::Fixed {
                width: 600.0,
                height: 340.0,
            },
            Self::Constellation => SizingPolicy::AspectRatio { ratio: 9.0 / 16.0 },
        }
    }

    /// Surface size to use when the host does not report one.
    pub fn default_surface(self) -> SurfaceSize {
        match self {
            Self::TokenRain => SurfaceSize::new(500.0, 450.0, 1.0),
            Self::ContextWindow => SurfaceSize::new(440.0, 460.0, 1.0),
            Self::SkillSpectrum => SurfaceSize::new(600.0, 340.0, 1.0),
            Self::Constellation => SurfaceSize::new(900.0, 506.25, 1.0),
        }
    }
}

impl FromStr for Preset {
    type Err = TableauError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                TableauError::config(format!(
                    "unknown preset '{s}' (expected one of: {})",
                    names.join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cycle::def::Cycle;
    use crate::cycle::run::CycleRun;
    use crate::geometry::resolve::Decorations;
    use crate::viewport::Viewport;

    #[test]
    fn every_preset_validates() {
        for p in Preset::ALL {
            Cycle::new(p.cycle()).unwrap();
            assert_eq!(p.name().parse::<Preset>().unwrap(), p);
        }
        for i in 0..SENTENCES.len() {
            Cycle::new(token_rain(i)).unwrap();
        }
        assert!("nope".parse::<Preset>().is_err());
    }

    #[test]
    fn rows_are_centred() {
        let xs = centred_row(&[10.0, 20.0], 4.0);
        assert_eq!(xs, vec![-17.0, -3.0]);
    }

    #[test]
    fn token_rain_staggers_and_lengthens_falls() {
        let def = token_rain(0);
        assert_eq!(def.entities.len(), 9);
        let last = &def.entities[8];
        assert_eq!(last.spawn_delay_ms, 1_440.0);
        assert_eq!(last.durations["falling"], 2_440.0);
        assert_eq!(last.label.as_deref(), Some(" dog"));
    }

    #[test]
    fn sentence_holds_then_fades_before_tokens_fall() {
        let mut run = CycleRun::new(Arc::new(Cycle::new(token_rain(0)).unwrap()), 0.0);
        run.advance_to(2_050.0);
        let vp = Viewport::new(500.0, 450.0, 1.0).unwrap();
        let opacity = |t: f64| {
            let frame = run.resolve(t, vp, Decorations::Animated).unwrap();
            assert!(frame.entities.iter().all(|e| e.phase == "source"));
            frame.entities[0].opacity
        };
        assert_eq!(opacity(0.0), 1.0);
        assert_eq!(opacity(1_399.0), 1.0);
        assert_eq!(opacity(1_700.0), 0.5);
        assert_eq!(opacity(2_000.0), 0.0);
    }

    #[test]
    fn spectrum_cards_leave_together() {
        let def = skill_spectrum();
        let ends: Vec<f64> = def
            .entities
            .iter()
            .map(|e| e.spawn_delay_ms + 650.0 + e.durations["placed"])
            .collect();
        assert!(ends.iter().all(|t| *t == ends[0]));
        assert_eq!(ends[0], 11_350.0);
    }

    #[test]
    fn context_window_is_seeded() {
        let a = context_window(7);
        let b = context_window(7);
        let c = context_window(8);
        let delays = |d: &CycleDef| d.entities.iter().map(|e| e.spawn_delay_ms).collect::<Vec<_>>();
        assert_eq!(delays(&a), delays(&b));
        assert_ne!(delays(&a), delays(&c));
        assert_eq!(a.entities[0].spawn_delay_ms, 800.0);
    }
}
