use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use tableau::{
    CycleDef, CycleEvent, Frame, HeadlessHost, HeadlessOpts, MotionPreference, Mounted, Renderer,
    SizingPolicy, SurfaceSize, ViewportAdapter, presets::Preset,
};

#[derive(Parser, Debug)]
#[command(name = "tableau", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a cycle on a virtual clock and print frames as JSON lines.
    Run(RunArgs),
    /// Validate a cycle JSON file.
    Validate(ValidateArgs),
    /// Print a preset's cycle definition as JSON.
    Show(ShowArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Built-in preset (token-rain, context-window, skill-spectrum, constellation).
    #[arg(long, conflicts_with = "cycle", required_unless_present = "cycle")]
    preset: Option<String>,

    /// Cycle definition JSON.
    #[arg(long)]
    cycle: Option<PathBuf>,

    /// Stop the virtual clock at this time (ms).
    #[arg(long, default_value_t = 10_000.0)]
    until: f64,

    /// Surface width in CSS pixels.
    #[arg(long)]
    width: Option<f64>,

    /// Surface height in CSS pixels.
    #[arg(long)]
    height: Option<f64>,

    /// Device pixel ratio.
    #[arg(long, default_value_t = 1.0)]
    density: f64,

    /// Render the single settled frame instead of animating.
    #[arg(long, default_value_t = false)]
    reduced_motion: bool,

    /// Print every n-th frame.
    #[arg(long, default_value_t = 1)]
    every: usize,

    /// Virtual display refresh rate.
    #[arg(long, default_value_t = 60.0)]
    refresh_hz: f64,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Cycle definition JSON.
    #[arg(long)]
    cycle: PathBuf,
}

#[derive(Parser, Debug)]
struct ShowArgs {
    /// Built-in preset name.
    #[arg(long)]
    preset: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Validate(args) => cmd_validate(args),
        Command::Show(args) => cmd_show(args),
    }
}

fn read_cycle(path: &PathBuf) -> anyhow::Result<CycleDef> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read cycle '{}'", path.display()))?;
    CycleDef::from_json(&text).with_context(|| format!("parse cycle '{}'", path.display()))
}

/// Writes sampled frames to stdout and cycle boundaries to stderr.
struct JsonLines {
    every: usize,
    seen: usize,
    out: std::io::Stdout,
}

impl Renderer for JsonLines {
    fn draw(&mut self, frame: &Frame) -> anyhow::Result<()> {
        let keep = self.seen % self.every == 0;
        self.seen += 1;
        if keep {
            let line = frame.to_json()?;
            writeln!(self.out.lock(), "{line}")?;
        }
        Ok(())
    }

    fn cycle_event(&mut self, event: CycleEvent) {
        match event {
            CycleEvent::Completed { iteration, .. } => {
                eprintln!("cycle {iteration} completed");
            }
            CycleEvent::Restarted { iteration, .. } => {
                eprintln!("cycle {iteration} started");
            }
        }
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let (def, sizing, default_surface) = match (&args.preset, &args.cycle) {
        (Some(name), _) => {
            let preset: Preset = name.parse()?;
            (preset.cycle(), preset.sizing(), preset.default_surface())
        }
        (None, Some(path)) => (
            read_cycle(path)?,
            SizingPolicy::Fill,
            SurfaceSize::new(800.0, 450.0, 1.0),
        ),
        (None, None) => anyhow::bail!("either --preset or --cycle is required"),
    };

    let surface = SurfaceSize::new(
        args.width.unwrap_or(default_surface.width),
        args.height.unwrap_or(default_surface.height),
        args.density,
    );
    let mut host = HeadlessHost::new(
        HeadlessOpts {
            refresh_hz: args.refresh_hz,
        },
        surface,
    );
    let viewport = ViewportAdapter::new(sizing, surface)?;
    let mut renderer = JsonLines {
        every: args.every.max(1),
        seen: 0,
        out: std::io::stdout(),
    };

    let mounted = tableau::mount(
        def,
        MotionPreference::from_reduced(args.reduced_motion),
        viewport,
        0.0,
        &mut host,
        &mut renderer,
    )?;

    match mounted {
        Mounted::Static(_) => {}
        Mounted::Animated(mut timeline) => {
            host.run_until(args.until, &mut timeline, &mut renderer);
            timeline.cancel(&mut host);
        }
    }
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let def = read_cycle(&args.cycle)?;
    def.validate()
        .with_context(|| format!("validate cycle '{}'", args.cycle.display()))?;
    eprintln!(
        "ok: '{}' ({} phases, {} entities)",
        def.name,
        def.phases.len(),
        def.entities.len()
    );
    Ok(())
}

fn cmd_show(args: ShowArgs) -> anyhow::Result<()> {
    let preset: Preset = args.preset.parse()?;
    println!("{}", preset.cycle().to_json_pretty()?);
    Ok(())
}
