//! FrameSight command-line binary.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use framesight_media::{is_video_file, ImageSource};
use framesight_models::{AnalysisTemplate, BatchMode, OutputFormat};
use framesight_pipeline::{ImageTask, PipelineConfig, PipelineError, VideoAnalysis, VideoAnalyzer};
use framesight_vision::{AnalysisOutput, VisionClient};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "FrameSight: analyze videos frame by frame, or single images, with a vision model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a video frame by frame, or describe an image
    Analyze(AnalyzeArgs),
    /// Rank two or more images against weighted criteria
    Judge(JudgeArgs),
    /// Describe how a subject changes across a series of images
    Evolution(EvolutionArgs),
    /// Find trends in metrics across images taken over time
    TimeSeries(TimeSeriesArgs),
    /// Generate accessibility alt-text for an image
    AltText(AltTextArgs),
    /// Analyze an image in character, using a built-in persona and style
    PersonaStyle(PersonaStyleArgs),
}

/// Options shared by every request.
#[derive(Args, Debug)]
struct RequestArgs {
    /// System prompt (defaults to one matching the output format)
    #[arg(long = "system-prompt")]
    system_prompt: Option<String>,

    /// Output format: text, json, md or markdown
    #[arg(long, default_value = "text")]
    output: OutputFormat,

    /// Stream the response as it is generated
    #[arg(long)]
    stream: bool,

    /// Text the assistant answer starts with
    #[arg(long)]
    prefill: Option<String>,

    /// Response budget per request
    #[arg(long)]
    max_tokens: Option<u32>,
}

impl RequestArgs {
    fn template(self, default_max_tokens: u32) -> AnalysisTemplate {
        AnalysisTemplate {
            prompt: None,
            persona: None,
            system: self.system_prompt,
            output_format: self.output,
            stream: self.stream,
            max_tokens: self.max_tokens.unwrap_or(default_max_tokens),
            prefill: self.prefill,
        }
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Video file, image file or image URL
    #[arg(value_name = "INPUT")]
    input: String,

    /// Persona woven into the generated prompt
    #[arg(long)]
    persona: Option<String>,

    /// Custom prompt replacing the generated description prompt
    #[arg(long)]
    prompt: Option<String>,

    #[command(flatten)]
    request: RequestArgs,

    /// Frames between two sampled frames (videos only)
    #[arg(long)]
    frame_interval: Option<u64>,

    /// Decode workers (default: number of CPU cores)
    #[arg(long)]
    num_workers: Option<usize>,

    /// Frames per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Analyze each batch of frames as one group
    #[arg(long)]
    group: bool,
}

#[derive(Args, Debug)]
struct JudgeArgs {
    /// Image files or URLs to compare
    #[arg(value_name = "IMAGES", required = true)]
    images: Vec<String>,

    /// Comma-separated criteria
    #[arg(long, value_delimiter = ',', required = true)]
    criteria: Vec<String>,

    /// Comma-separated weights, one per criterion
    #[arg(long, value_delimiter = ',', required = true)]
    weights: Vec<f64>,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(Args, Debug)]
struct EvolutionArgs {
    /// Image files or URLs, oldest first
    #[arg(value_name = "IMAGES", required = true)]
    images: Vec<String>,

    /// Comma-separated time points, one per image
    #[arg(long, value_delimiter = ',', required = true)]
    time_points: Vec<String>,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(Args, Debug)]
struct TimeSeriesArgs {
    /// Image files or URLs, oldest first
    #[arg(value_name = "IMAGES", required = true)]
    images: Vec<String>,

    /// Comma-separated time points, one per image
    #[arg(long, value_delimiter = ',', required = true)]
    time_points: Vec<String>,

    /// Comma-separated metrics to track
    #[arg(long, value_delimiter = ',', required = true)]
    metrics: Vec<String>,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(Args, Debug)]
struct AltTextArgs {
    /// Image file or URL
    #[arg(value_name = "IMAGE")]
    image: String,

    #[command(flatten)]
    request: RequestArgs,
}

#[derive(Args, Debug)]
struct PersonaStyleArgs {
    /// Image file or URL
    #[arg(value_name = "IMAGE")]
    image: String,

    /// Built-in persona: art_critic, botanist or fashion_designer
    #[arg(long)]
    persona: String,

    /// Built-in style: noir_detective, victorian_gent or sci_fi_author
    #[arg(long)]
    style: String,

    #[command(flatten)]
    request: RequestArgs,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Human-readable logs on stderr by default, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("framesight=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::from_env();

    match cli.command {
        Commands::Analyze(args) => analyze(config, args).await,
        Commands::Judge(args) => {
            let task = ImageTask::Judge {
                criteria: trimmed(args.criteria),
                weights: args.weights,
            };
            run_task(config, args.images, task, args.request).await
        }
        Commands::Evolution(args) => {
            let task = ImageTask::Evolution {
                time_points: trimmed(args.time_points),
            };
            run_task(config, args.images, task, args.request).await
        }
        Commands::TimeSeries(args) => {
            let task = ImageTask::TimeSeries {
                time_points: trimmed(args.time_points),
                metrics: trimmed(args.metrics),
            };
            run_task(config, args.images, task, args.request).await
        }
        Commands::AltText(args) => {
            run_task(config, vec![args.image], ImageTask::AltText, args.request).await
        }
        Commands::PersonaStyle(args) => {
            let task = ImageTask::PersonaStyle {
                persona: args.persona,
                style: args.style,
            };
            run_task(config, vec![args.image], task, args.request).await
        }
    }
}

fn trimmed(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn build_analyzer(config: PipelineConfig) -> Result<VideoAnalyzer> {
    let client = VisionClient::from_env().context("failed to configure the vision client")?;
    let analyzer = VideoAnalyzer::new(config, Arc::new(client)).map_err(staged)?;
    info!("Pipeline config: {:?}", analyzer.config());
    Ok(analyzer)
}

async fn analyze(mut config: PipelineConfig, args: AnalyzeArgs) -> Result<()> {
    if let Some(stride) = args.frame_interval {
        config.frame_stride = stride;
    }
    if args.num_workers.is_some() {
        config.workers = args.num_workers;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.group {
        config.batch_mode = BatchMode::Grouped;
    }

    let output_format = args.request.output;
    let mut template = args.request.template(config.max_tokens);
    template.prompt = args.prompt;
    template.persona = args.persona;

    let analyzer = build_analyzer(config)?;

    let source = ImageSource::parse(&args.input);
    if matches!(source, ImageSource::Path(_)) && is_video_file(&args.input) {
        let analysis = analyzer
            .analyze_video(&args.input, &template)
            .await
            .map_err(staged)?;
        print_video(&analysis, output_format)
    } else {
        let output = analyzer
            .analyze_images(vec![source], &template)
            .await
            .map_err(staged)?;
        print_image(output, output_format, ImageTask::Describe.analysis_type()).await
    }
}

async fn run_task(
    config: PipelineConfig,
    inputs: Vec<String>,
    task: ImageTask,
    request: RequestArgs,
) -> Result<()> {
    let output_format = request.output;
    let template = request.template(config.max_tokens);
    let sources = inputs.iter().map(|input| ImageSource::parse(input)).collect();

    let analyzer = build_analyzer(config)?;
    let output = analyzer
        .analyze_task(sources, &task, &template)
        .await
        .map_err(staged)?;
    print_image(output, output_format, task.analysis_type()).await
}

/// Attach the failing stage to a pipeline error.
fn staged(error: PipelineError) -> anyhow::Error {
    let stage = error.stage();
    anyhow::Error::new(error).context(format!("{} stage failed", stage))
}

fn print_video(analysis: &VideoAnalysis, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        let frames: Vec<Value> = analysis
            .frames
            .iter()
            .map(|frame| {
                json!({
                    "frame_number": frame.frame_number,
                    "timestamp": frame.timestamp,
                    "result": frame.structured().unwrap_or_else(|| Value::String(frame.result.clone())),
                })
            })
            .collect();
        let envelope = json!({
            "metadata": analysis.metadata,
            "frames": frames,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    for frame in &analysis.frames {
        println!(
            "Frame {} ({:.2}s): {}",
            frame.frame_number, frame.timestamp, frame.result
        );
    }
    Ok(())
}

async fn print_image(output: AnalysisOutput, format: OutputFormat, analysis_type: &str) -> Result<()> {
    match output {
        AnalysisOutput::Stream(mut chunks) => {
            let mut stdout = std::io::stdout();
            while let Some(chunk) = chunks.next().await {
                write!(stdout, "{}", chunk?)?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
        }
        AnalysisOutput::Complete(text) if format == OutputFormat::Json => {
            let result = serde_json::from_str::<Value>(&text)
                .ok()
                .filter(Value::is_object)
                .unwrap_or_else(|| json!({ "description": text }));
            let envelope = json!({
                "result": result,
                "analysis_type": analysis_type,
            });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        AnalysisOutput::Complete(text) => println!("{}", text),
    }
    Ok(())
}
