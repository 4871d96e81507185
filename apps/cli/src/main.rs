mod bot;
mod play;
mod sim_player;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hitline_domain::{generate_chart, ChartExporter, JsonExporter};
use hitline_engine::EngineConfig;
use hitline_services::{LogScoreSink, ScoreSink};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::bot::AutoPlayer;
use crate::play::PlayerSetup;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play and generate Hitline charts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a chart headless with the autoplay bot
    Play(PlayArgs),
    /// Write a generated practice chart
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Path to a chart JSON file
    chart: PathBuf,
    /// Engine config (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Step frames on a manual clock instead of waiting in real time
    #[arg(long)]
    simulate: bool,
    /// Start playback from this chart position
    #[arg(long, default_value_t = 0.0)]
    start_from_ms: f64,
    /// Maximum timing error of the bot
    #[arg(long, default_value_t = 20.0)]
    jitter_ms: f64,
    /// Fraction of notes the bot skips
    #[arg(long, default_value_t = 0.0)]
    miss_rate: f64,
    /// Fractional speed error of the simulated media player
    #[arg(long, default_value_t = 0.0)]
    media_drift: f64,
    /// Delay before the simulated player reports ready
    #[arg(long, default_value_t = 500.0)]
    player_ready_ms: f64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Chart length in seconds
    #[arg(long, default_value_t = 60.0)]
    seconds: f64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Output file; prints to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        match cli.command {
            Command::Play(args) => run_play(args).await,
            Command::Generate(args) => run_generate(args).await,
        }
    })
}

async fn run_play(args: PlayArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let mut chart = play::load_chart(&args.chart).await?;
    if args.start_from_ms > 0.0 {
        chart = chart
            .starting_at(args.start_from_ms)
            .with_context(|| format!("starting from {} ms", args.start_from_ms))?;
    }
    let schedule = AutoPlayer::new(args.jitter_ms, args.miss_rate, args.seed).schedule(&chart);
    let setup = PlayerSetup {
        ready_after_ms: args.player_ready_ms,
        drift: args.media_drift,
    };
    info!(chart = %chart.id, inputs = schedule.len(), simulate = args.simulate, "playing chart");

    let report = if args.simulate {
        play::simulate(chart, config, &schedule, setup)
    } else {
        play::realtime(chart, config, schedule, setup).await?
    };
    LogScoreSink.submit(&report).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_generate(args: GenerateArgs) -> Result<()> {
    let chart = generate_chart(args.seconds * 1000.0, args.seed)
        .with_context(|| format!("generating a {} s chart", args.seconds))?;
    let bytes = JsonExporter.export(&chart)?;
    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(notes = chart.notes.len(), path = %path.display(), "chart written");
        }
        None => println!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}
