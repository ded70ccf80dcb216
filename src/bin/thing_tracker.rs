use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use thing_tracker::app::{App, RefreshRequest};
use thing_tracker::config::{ConfigLoader, ConfigOverrides};
use thing_tracker::error::TrackerError;
use thing_tracker::output::{JsonOutput, OutputMode, summary_line};
use thing_tracker::thumbnail::CommandRenderer;

#[derive(Parser)]
#[command(name = "thing-tracker")]
#[command(about = "Merge a thing description into the tracker index")]
#[command(version, author)]
struct Cli {
    /// A JSON thing description
    #[arg(short, long)]
    file: Utf8PathBuf,

    /// Base URL for thing-local paths
    #[arg(short, long)]
    base: Option<String>,

    /// README to mine for description, license, instructions and related things
    #[arg(short, long)]
    readme: Option<Utf8PathBuf>,

    /// Config file (defaults to ./thing-tracker.json when present)
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Tracker document to update
    #[arg(long)]
    tracker: Option<Utf8PathBuf>,

    /// Root directory for staged thumbnails
    #[arg(long)]
    thumbnails: Option<Utf8PathBuf>,

    /// STL rasterizer program (defaults to stl-thumb on PATH)
    #[arg(long)]
    renderer: Option<Utf8PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<TrackerError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TrackerError) -> u8 {
    match error {
        TrackerError::InputRead(_) | TrackerError::InputSyntax { .. } => 1,
        TrackerError::BaseUnresolved(_) => 2,
        TrackerError::InputSchema { .. } | TrackerError::InvalidThingId(_) => 3,
        TrackerError::Render { .. } | TrackerError::MissingTool(_) => 4,
        TrackerError::AssetCopy { .. } | TrackerError::Filesystem(_) => 5,
        TrackerError::ConfigRead(_) | TrackerError::ConfigParse(_) => 6,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let cwd = std::env::current_dir().into_diagnostic()?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|_| miette::miette!("working directory is not a UTF-8 path"))?;
    let resolved = ConfigLoader::resolve(cli.config.as_deref(), &cwd)?;
    let resolved = ConfigLoader::apply_overrides(
        resolved,
        ConfigOverrides {
            tracker: cli.tracker,
            thumbnails: cli.thumbnails,
            base: cli.base,
            renderer: cli.renderer,
        },
    );

    let renderer = match &resolved.renderer {
        Some(program) => CommandRenderer::with_program(program.as_std_path()),
        None => CommandRenderer::new(),
    };
    let app = App::new(resolved.store(), renderer);
    let request = RefreshRequest {
        thing_path: cli.file,
        base: resolved.base.clone(),
        readme: cli.readme,
    };

    let result = app.refresh(&request)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_refresh(&result).into_diagnostic()?,
        OutputMode::Human => println!("{}", summary_line(&result)),
    }
    Ok(())
}
