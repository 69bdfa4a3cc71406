//! sprite-tools: collision map solidifiers and a GIF assembler for sprite sheets.

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use log_dep::{debug, error, LevelFilter};

use sprite_tools::{
    animate,
    config::{AnimationSettings, SolidifyMode, SolidifySettings},
    error::{Error, Result},
    labeling::Connectivity,
    solidify,
    toml::{read_config_file, ConfigFile},
    DistanceMetric, Rgb,
};

#[derive(Parser)]
#[command(name = "sprite-tools")]
#[command(about = "Sprite-sheet post-processing: collision regions and GIF loops")]
#[command(version)]
struct Cli {
    /// TOML file with default overrides ([solidify] and [gif] sections)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Repaint the single largest marker region with a solid color
    Collision(SolidifyArgs),

    /// Repaint every marker region of at least --min-pixels pixels
    AntiCollision(AntiCollisionArgs),

    /// Assemble a directory of frames into an animated GIF
    Gif(GifArgs),
}

#[derive(Args)]
struct SolidifyArgs {
    /// Input image
    input: PathBuf,

    /// Output image (default: <input>_collision.<ext> or <input>_anti_collision.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fill color for repainted regions [default: 255 255 255]
    #[arg(short = 'c', long = "color", num_args = 3, value_names = ["R", "G", "B"], allow_negative_numbers = true)]
    color: Option<Vec<i64>>,

    /// Maximum color distance from the marker [default: 100]
    #[arg(short, long, allow_negative_numbers = true)]
    tolerance: Option<i64>,

    /// Marker color to detect [default: 234 0 249]
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"], allow_negative_numbers = true, conflicts_with = "pink")]
    marker: Option<Vec<i64>>,

    /// Color distance metric [default: euclidean]
    #[arg(long, value_enum, conflicts_with = "pink")]
    metric: Option<DistanceMetric>,

    /// Detect any shade of pink instead of a single marker color
    #[arg(long)]
    pink: bool,

    /// Pixel neighbourhood used to join regions [default: four]
    #[arg(long, value_enum)]
    connectivity: Option<Connectivity>,

    /// Write a JSON region report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct AntiCollisionArgs {
    #[command(flatten)]
    common: SolidifyArgs,

    /// Smallest region, in pixels, that gets repainted [default: 1000]
    #[arg(short, long, allow_negative_numbers = true)]
    min_pixels: Option<i64>,

    /// Repaint everything outside the selected regions with this color
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"], allow_negative_numbers = true)]
    background: Option<Vec<i64>>,
}

#[derive(Args)]
struct GifArgs {
    /// Directory of frames, or a comma-separated list of frame files
    input: String,

    /// Output GIF [default: output.gif]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Milliseconds per frame [default: 500]
    #[arg(short, long, allow_negative_numbers = true)]
    duration: Option<i64>,

    /// Number of loops, 0 for infinite [default: 0]
    #[arg(short = 'l', long = "loop", allow_negative_numbers = true)]
    loop_count: Option<i64>,

    /// Shrink frames to fit this box, keeping aspect ratio
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"], allow_negative_numbers = true)]
    max_size: Option<Vec<i64>>,

    /// Scale frames to exactly this size
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"], allow_negative_numbers = true)]
    target_size: Option<Vec<i64>>,

    /// File extensions to pick up from the input directory
    #[arg(long, num_args = 1..)]
    extensions: Option<Vec<String>>,

    /// Background that transparent pixels are flattened onto [default: 255 255 255]
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"], allow_negative_numbers = true)]
    matte: Option<Vec<i64>>,
}

fn rgb(values: Option<Vec<i64>>) -> Result<Option<Rgb>> {
    match values.as_deref() {
        None => Ok(None),
        Some(&[r, g, b]) => Rgb::from_components(r, g, b).map(Some),
        Some(other) => Err(Error::InvalidColor(format!("{other:?}"))),
    }
}

fn pair(values: Option<Vec<i64>>) -> Option<[i64; 2]> {
    values.and_then(|values| values.try_into().ok())
}

impl SolidifyArgs {
    fn settings(&self) -> Result<SolidifySettings> {
        Ok(SolidifySettings {
            marker: rgb(self.marker.clone())?,
            fill: rgb(self.color.clone())?,
            tolerance: self.tolerance,
            metric: self.metric,
            connectivity: self.connectivity,
            pink: self.pink.then_some(true),
            ..Default::default()
        })
    }
}

impl GifArgs {
    fn settings(self) -> Result<AnimationSettings> {
        Ok(AnimationSettings {
            duration_ms: self.duration,
            loop_count: self.loop_count,
            extensions: self.extensions,
            matte: rgb(self.matte)?,
            max_size: pair(self.max_size),
            target_size: pair(self.target_size),
        })
    }
}

fn run(command: Command, file: ConfigFile) -> Result<()> {
    match command {
        Command::Collision(args) => {
            let config = args.settings()?.or(file.solidify).resolve(
                SolidifyMode::Largest,
                args.input,
                args.output,
                args.report,
            )?;
            debug!("{config:?}");
            solidify::run(&config)?;
        }
        Command::AntiCollision(args) => {
            let flags = SolidifySettings {
                min_pixels: args.min_pixels,
                background: rgb(args.background)?,
                ..args.common.settings()?
            };
            let common = args.common;
            let config = flags.or(file.solidify).resolve(
                SolidifyMode::Threshold,
                common.input,
                common.output,
                common.report,
            )?;
            debug!("{config:?}");
            solidify::run(&config)?;
        }
        Command::Gif(args) => {
            let input = args.input.clone();
            let output = args.output.clone();
            let config = args.settings()?.or(file.gif).resolve(&input, output)?;
            debug!("{config:?}");
            animate::run(&config)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    if let Err(err) = sprite_tools::log::init(level, cli.log_file.as_deref()) {
        eprintln!("{err}");
        return ExitCode::from(73);
    }

    let result = match &cli.config {
        Some(path) => read_config_file(path),
        None => Ok(ConfigFile::default()),
    }
    .and_then(|file| run(cli.command, file));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
