mod cli;

use sampleflow::{
    config,
    pipeline::{Callbacks, Demuxer, TrackConfig},
    worker::{ChunkLogStage, VideoProcessor, Worker},
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io::Write;
use std::path::Path;
use tokio_util::io::ReaderStream;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "sampleflow=debug,sampleflow_media=trace".to_string()
        } else {
            "sampleflow=info,sampleflow_media=info".to_string()
        }
    });

    // stdout carries chunk logs and worker replies
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Probe { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, &config))
        }
        Commands::Run {
            input,
            preset,
            output,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(&input, preset, output.as_deref(), &config))
        }
        Commands::Worker => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve_worker(config))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("sampleflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn open_stream(
    path: &Path,
    config: &config::Config,
) -> Result<ReaderStream<tokio::fs::File>> {
    if !path.exists() {
        anyhow::bail!("File does not exist: {:?}", path);
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {:?}", path))?;
    Ok(ReaderStream::with_capacity(
        file,
        config.pipeline.read_chunk_size,
    ))
}

async fn probe_file(file: &Path, json: bool, config: &config::Config) -> Result<()> {
    let stream = open_stream(file, config).await?;

    let mut resolved: Option<TrackConfig> = None;
    let summary = Demuxer::from_config(&config.pipeline)
        .run(
            stream,
            Callbacks::new(|track| resolved = Some(track), |_| {}),
        )
        .await
        .with_context(|| format!("Failed to probe {:?}", file))?;

    let Some(track) = resolved else {
        anyhow::bail!("{:?} contains no media", file);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&track)?);
    } else {
        println!("File: {}", file.display());
        println!("Codec: {}", track.codec);
        println!("Coded size: {}x{}", track.coded_width, track.coded_height);
        println!("Duration: {:.3}s", track.duration_secs);
        println!("Description: {} bytes", track.description.len());
        println!(
            "Samples: {} ({} key)",
            summary.chunks_emitted, summary.key_chunks
        );
    }

    Ok(())
}

async fn run_file(
    input: &Path,
    preset: Option<String>,
    output: Option<&Path>,
    config: &config::Config,
) -> Result<()> {
    let encoder = match preset {
        Some(name) => config.encoder.with_preset(&name)?,
        None => config.encoder.clone(),
    };

    let stream = open_stream(input, config).await?;
    let out: Box<dyn Write + Send> = match output {
        Some(path) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {:?}", path))?,
        )),
        None => Box::new(std::io::stdout()),
    };

    tracing::info!("Processing file: {:?}", input);
    let mut stage = ChunkLogStage::new(out);
    let report = VideoProcessor::new(Demuxer::from_config(&config.pipeline))
        .start(stream, &encoder, &mut stage)
        .await?;

    eprintln!(
        "Emitted {} chunks ({} key, {} bytes) from {} bytes read",
        report.stage.chunks, report.stage.key_chunks, report.stage.bytes, report.summary.bytes_read
    );
    Ok(())
}

async fn serve_worker(config: config::Config) -> Result<()> {
    let worker = Worker::new(config);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let handled = worker.serve(stdin, tokio::io::stdout()).await?;
    tracing::info!("Worker handled {} requests", handled);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Read chunk size: {}", config.pipeline.read_chunk_size);
            println!("  Samples per batch: {}", config.pipeline.samples_per_batch);
            println!("  Encoder: {} @ {} bps", config.encoder.codec, config.encoder.bitrate);
            println!("  Preset: {}", config.encoder.preset);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Preset: {}", config.encoder.preset);
        }
    }

    Ok(())
}
