//! captionburn CLI: segment transcripts, preview overlays, burn captions.
//!
//! Usage:
//!   captionburn segment <TRANSCRIPT>            Group timed words into captions
//!   captionburn render-frame <PAYLOAD> -t <T>   Render one overlay frame
//!   captionburn export <VIDEO> <PAYLOAD>        Burn captions into a video
//!   captionburn check                           Check ffmpeg and fonts

use std::path::PathBuf;

use captionburn_common::config::{config_file_path, AppConfig, RasterizerKind};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "captionburn",
    about = "Burn word-animated captions into videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/captionburn/config.json); must parse when given
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group a transcript's timed words into display captions
    Segment {
        /// Transcript JSON (flat words or pre-grouped segments)
        transcript: PathBuf,

        /// Clip duration in seconds (defaults to the transcript's own)
        #[arg(long)]
        duration: Option<f64>,

        /// Output format: json|srt|vtt (defaults to the output extension)
        #[arg(short, long)]
        format: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a single caption overlay frame to PNG
    RenderFrame {
        /// Caption payload JSON
        payload: PathBuf,

        /// Playback timestamp in seconds or HH:MM:SS.mmm
        #[arg(short, long)]
        time: String,

        /// Output PNG path
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,

        /// Rasterizer backend: document|canvas
        #[arg(long)]
        rasterizer: Option<RasterizerKind>,

        /// Canvas width (overrides the payload)
        #[arg(long)]
        width: Option<u32>,

        /// Canvas height (overrides the payload)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Burn captions into a video
    Export {
        /// Source video
        video: PathBuf,

        /// Caption payload JSON
        payload: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Parallel frame workers
        #[arg(long)]
        concurrency: Option<usize>,

        /// Rasterizer backend: document|canvas
        #[arg(long)]
        rasterizer: Option<RasterizerKind>,

        /// Longest accepted source duration in seconds
        #[arg(long, conflicts_with = "no_duration_cap")]
        max_duration: Option<f64>,

        /// Accept sources of any duration
        #[arg(long)]
        no_duration_cap: bool,

        /// Also write an SRT/VTT sidecar of the payload captions
        #[arg(long)]
        subtitles: Option<PathBuf>,
    },

    /// Check ffmpeg availability and font resolution
    Check {
        /// Font family to resolve (defaults to the caption style default)
        #[arg(long)]
        family: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config_file_path);
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    captionburn_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Segment {
            transcript,
            duration,
            format,
            output,
        } => commands::segment::run(transcript, duration, format, output),
        Commands::RenderFrame {
            payload,
            time,
            output,
            rasterizer,
            width,
            height,
        } => {
            commands::render_frame::run(&config, payload, time, output, rasterizer, width, height)
                .await
        }
        Commands::Export {
            video,
            payload,
            output,
            fps,
            concurrency,
            rasterizer,
            max_duration,
            no_duration_cap,
            subtitles,
        } => {
            let overrides = commands::export::Overrides {
                fps,
                concurrency,
                rasterizer,
                max_duration,
                no_duration_cap,
            };
            commands::export::run(&config, video, payload, output, overrides, subtitles).await
        }
        Commands::Check { family } => commands::check::run(&config, &config_path, family).await,
    }
}
