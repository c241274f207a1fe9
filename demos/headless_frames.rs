use tableau::{FrameLog, HeadlessHost, HeadlessOpts, Timeline, ViewportAdapter, presets::Preset};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    for preset in Preset::ALL {
        let surface = preset.default_surface();
        let mut host = HeadlessHost::new(HeadlessOpts::default(), surface);
        let mut timeline = Timeline::new(ViewportAdapter::new(preset.sizing(), surface)?);
        let mut log = FrameLog::default();

        timeline.start(preset.cycle(), 0.0, &mut host)?;
        host.run_until(15_000.0, &mut timeline, &mut log);
        timeline.cancel(&mut host);

        let rest = log
            .frames
            .iter()
            .filter(|f| f.aggregate.at_rest == f.aggregate.total)
            .count();
        println!(
            "{}: {} frames, {} cycle events, {} fully at rest",
            preset.name(),
            log.frames.len(),
            log.events.len(),
            rest
        );
    }

    Ok(())
}
