use std::sync::Arc;

use tableau::{
    Cycle, CycleDef, CycleRun, Decorations, Frame, FrameLog, HeadlessHost, HeadlessOpts,
    SizingPolicy, SurfaceSize, Timeline, Viewport, ViewportAdapter, presets,
};

fn mix64(mut z: u64) -> u64 {
    // SplitMix64 mixing function.
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn digest_u64(bytes: &[u8]) -> u64 {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for chunk in bytes.chunks(8) {
        let mut v = 0u64;
        for (i, &b) in chunk.iter().enumerate() {
            v |= (b as u64) << (i * 8);
        }
        state = mix64(state ^ v);
    }
    state
}

fn digest_frames(frames: &[Frame]) -> u64 {
    frames.iter().fold(0u64, |acc, f| {
        let bytes = serde_json::to_vec(f).unwrap();
        mix64(acc ^ digest_u64(&bytes))
    })
}

fn headless_run(def: CycleDef, sizing: SizingPolicy, surface: SurfaceSize, until: f64) -> Vec<Frame> {
    let mut host = HeadlessHost::new(HeadlessOpts::default(), surface);
    let mut timeline = Timeline::new(ViewportAdapter::new(sizing, surface).unwrap());
    let mut log = FrameLog::default();
    timeline.start(def, 0.0, &mut host).unwrap();
    host.run_until(until, &mut timeline, &mut log);
    log.frames
}

#[test]
fn headless_runs_are_byte_identical() {
    for preset in presets::Preset::ALL {
        let a = headless_run(preset.cycle(), preset.sizing(), preset.default_surface(), 12_000.0);
        let b = headless_run(preset.cycle(), preset.sizing(), preset.default_surface(), 12_000.0);
        assert!(!a.is_empty(), "{}", preset.name());
        assert_eq!(digest_frames(&a), digest_frames(&b), "{}", preset.name());
    }
}

#[test]
fn explicit_tick_sequence_is_deterministic() {
    let surface = SurfaceSize::new(500.0, 450.0, 2.0);
    let ticks: Vec<f64> = (0..400).map(|i| f64::from(i) * 17.3).collect();
    let run = || {
        let mut host = HeadlessHost::new(HeadlessOpts::default(), surface);
        let mut timeline =
            Timeline::new(ViewportAdapter::new(SizingPolicy::Fill, surface).unwrap());
        timeline.start(presets::token_rain(1), 0.0, &mut host).unwrap();
        ticks
            .iter()
            .map(|t| timeline.tick(*t).unwrap().fingerprint())
            .collect::<Vec<u64>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn frames_do_not_depend_on_tick_rate() {
    let cycle = Arc::new(Cycle::new(presets::context_window(3)).unwrap());
    let vp = Viewport::new(440.0, 460.0, 1.0).unwrap();
    let samples = [900.0, 2_750.5, 9_999.0, 15_000.0, 19_321.0, 24_000.0];

    let sample_with_step = |step: f64| {
        let mut run = CycleRun::new(cycle.clone(), 0.0);
        let mut t = 0.0;
        let mut out = Vec::new();
        for s in samples {
            while t < s {
                run.advance_to(t);
                t += step;
            }
            run.advance_to(s);
            out.push(run.resolve(s, vp, Decorations::Animated).unwrap().fingerprint());
        }
        out
    };

    let coarse = sample_with_step(250.0);
    assert_eq!(coarse, sample_with_step(16.0));
    assert_eq!(coarse, sample_with_step(6.944));
}

#[test]
fn past_instants_resolve_identically_after_advancing() {
    let cycle = Arc::new(Cycle::new(presets::token_rain(0)).unwrap());
    let vp = Viewport::new(500.0, 450.0, 1.0).unwrap();

    let mut run = CycleRun::new(cycle, 0.0);
    run.advance_to(3_000.0);
    let early = run.resolve(3_000.0, vp, Decorations::Animated).unwrap();
    run.advance_to(9_000.0);
    let again = run.resolve(3_000.0, vp, Decorations::Animated).unwrap();
    assert_eq!(early, again);
}

#[test]
fn json_fixture_round_trips() {
    let s = include_str!("data/drop.json");
    let def = CycleDef::from_json(s).unwrap();
    def.validate().unwrap();

    let back = CycleDef::from_json(&def.to_json_pretty().unwrap()).unwrap();
    let vp = Viewport::new(400.0, 300.0, 1.0).unwrap();
    let fp = |d: CycleDef| {
        let mut run = CycleRun::new(Arc::new(Cycle::new(d).unwrap()), 0.0);
        run.advance_to(700.0);
        run.resolve(700.0, vp, Decorations::Animated).unwrap().fingerprint()
    };
    assert_eq!(fp(def), fp(back));
}

#[test]
fn restart_offset_only_shows_in_clock_driven_cycles() {
    let vp = Viewport::new(400.0, 300.0, 1.0).unwrap();
    let fp_at = |def: CycleDef, start: f64| {
        let mut run = CycleRun::new(Arc::new(Cycle::new(def).unwrap()), start);
        run.advance_to(start + 500.0);
        run.resolve(start + 500.0, vp, Decorations::Animated)
            .unwrap()
            .fingerprint()
    };

    let drop = CycleDef::from_json(include_str!("data/drop.json")).unwrap();
    assert_eq!(fp_at(drop.clone(), 0.0), fp_at(drop, 1_234.5));

    assert_ne!(
        fp_at(presets::constellation(), 0.0),
        fp_at(presets::constellation(), 1_234.5)
    );
}
