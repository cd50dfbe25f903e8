use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use formation_timeline_core::{
    FramePacer, MonotonicTime, PlaybackController, ProjectState, RenderEvent, TimeMap, TimelineConfig,
    TimelineError, VirtualTrack, Zoom,
};
use tracing_subscriber::EnvFilter;

fn main() -> formation_timeline_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo { output } => run_demo(&output),
        Commands::Resolve {
            project,
            at_ms,
            audio_seconds,
        } => run_resolve(&project, at_ms, audio_seconds),
        Commands::Ruler {
            project,
            zoom,
            audio_seconds,
        } => run_ruler(&project, zoom, audio_seconds),
        Commands::Play {
            project,
            audio_seconds,
            from,
            config,
        } => run_play(&project, audio_seconds, from.as_deref(), config.as_deref()),
    }
}

fn run_demo(output: &Path) -> formation_timeline_core::Result<()> {
    let sample = ProjectState::sample();
    sample.write_json_file(output)?;
    tracing::info!(?output, formations = sample.formations.len(), "sample project written");
    Ok(())
}

fn run_resolve(
    project: &Path,
    at_ms: f64,
    audio_seconds: Option<f64>,
) -> formation_timeline_core::Result<()> {
    let store = ProjectState::from_json_file(project)?.into_store(Default::default());
    let map = TimeMap::new(store.formations(), audio_seconds);
    let event = map.resolve_at_global_ms(at_ms)?;
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

fn run_ruler(
    project: &Path,
    zoom: f64,
    audio_seconds: Option<f64>,
) -> formation_timeline_core::Result<()> {
    let store = ProjectState::from_json_file(project)?.into_store(Default::default());
    let map = TimeMap::new(store.formations(), audio_seconds);
    let zoom = Zoom::new(zoom);
    let summary = serde_json::json!({
        "zoom": zoom.label(),
        "total_seconds": map.total_duration_seconds(),
        "total_px": map.total_duration_pixels(zoom),
        "blocks": map.formation_blocks(zoom),
        "ticks": map.ruler(zoom),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_play(
    project: &Path,
    audio_seconds: Option<f64>,
    from: Option<&str>,
    config: Option<&Path>,
) -> formation_timeline_core::Result<()> {
    let config = match config {
        Some(path) => TimelineConfig::from_json_file(path)?,
        None => TimelineConfig::default(),
    };
    let mut pacer = FramePacer::from_config(&config.playback);
    let mut controller =
        PlaybackController::from_project(ProjectState::from_json_file(project)?, config);

    if let Some(seconds) = audio_seconds {
        controller.load_audio(Box::new(VirtualTrack::silent(seconds, MonotonicTime::new())));
    }
    if let Some(id) = from {
        controller.select_formation(id)?;
    }

    let mut shown: Option<(usize, bool)> = None;
    controller.subscribe(move |event: &RenderEvent| {
        let now = (event.formation_index(), event.is_transition());
        if shown != Some(now) {
            shown = Some(now);
            match event {
                RenderEvent::Transition(t) => tracing::info!(
                    from = %t.from.name,
                    to = %t.to.name,
                    "transition"
                ),
                RenderEvent::Pause(p) => tracing::info!(formation = %p.formation.name, "hold"),
            }
        }
    });

    let ticket = controller
        .play(pacer.now_ms())
        .ok_or_else(|| TimelineError::msg("nothing to play"))?;
    let outcome = pacer.run(&mut controller, ticket, |_, _| {});

    tracing::info!(
        ?outcome,
        timecode = %controller.session().timecode(),
        "playback done"
    );
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Formation timeline playback engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the built-in sample choreography.
    Demo {
        /// Where to write the project JSON.
        output: PathBuf,
    },
    /// Print what the stage shows at one instant.
    Resolve {
        /// Project JSON file.
        project: PathBuf,
        /// Global time in milliseconds.
        #[arg(long)]
        at_ms: f64,
        /// Length of the audio track, if any.
        #[arg(long)]
        audio_seconds: Option<f64>,
    },
    /// Print the ruler ticks and formation blocks.
    Ruler {
        project: PathBuf,
        #[arg(long, default_value_t = 1.0)]
        zoom: f64,
        #[arg(long)]
        audio_seconds: Option<f64>,
    },
    /// Play the choreography in real time and log what the stage shows.
    Play {
        project: PathBuf,
        /// Play against a silent track of this length.
        #[arg(long)]
        audio_seconds: Option<f64>,
        /// Formation id to start from.
        #[arg(long)]
        from: Option<String>,
        /// Optional JSON configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
