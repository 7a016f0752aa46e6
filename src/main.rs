use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use interview_distill::io::read_product_summary;
use interview_distill::stages::CONTINUED_MARKER;
use interview_distill::{
    approximate_tokens, chunk_turns, index_chunks, parse_turns, read_transcript,
    write_outcome_json, AnthropicClient, AnthropicConfig, ChunkerConfig, CompressionConfig,
    EmbeddingConfig, ExtractionConfig, FailurePolicy, IndexConfig, JsonlChunkStore,
    OpenAiEmbeddingClient, Pipeline, PipelineConfig, ProcessingOutcome, ResilienceConfig,
    ResilientBackend, SummaryReport,
};

#[derive(Parser)]
#[command(name = "interview-distill")]
#[command(author, version, about = "Interview transcript distillation and PMF scoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract insights from an interview transcript and score product-market fit
    Process {
        /// Input transcript file (plain text, "Speaker: text" lines)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the processing outcome (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Short description of the product under discussion
        #[arg(long, conflicts_with = "product_summary_file")]
        product_summary: Option<String>,

        /// File containing the product description
        #[arg(long)]
        product_summary_file: Option<PathBuf>,

        /// Output file for a human-readable report (text)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Interview identifier (random UUID when omitted)
        #[arg(long)]
        interview_id: Option<String>,

        /// Token count at which a chunk is flushed
        #[arg(long, default_value = "1400")]
        target_tokens: usize,

        /// Token count above which a single turn is split
        #[arg(long, default_value = "1700")]
        max_tokens: usize,

        /// Transcripts estimated below this many tokens use a single extraction call
        #[arg(long, default_value = "6000")]
        simple_threshold: usize,

        /// Evidence entries kept per pain in the scoring payload
        #[arg(long, default_value = "2")]
        max_quotes_per_pain: usize,

        /// Fail the transcript when any chunk extraction fails
        #[arg(long)]
        abort_on_chunk_failure: bool,

        /// Timeout for a single LLM call in seconds
        #[arg(long, default_value = "120")]
        timeout_secs: u64,

        /// Retries after a transient LLM failure
        #[arg(long, default_value = "2")]
        max_retries: u32,

        /// Embed chunks and append them to this JSON-lines file
        #[arg(long)]
        index_output: Option<PathBuf>,

        /// Embedding calls in flight at once
        #[arg(long, default_value = "4")]
        embed_concurrency: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Analyze a transcript without calling any model
    Analyze {
        /// Input transcript file (plain text, "Speaker: text" lines)
        #[arg(short, long)]
        input: PathBuf,

        /// Token count at which a chunk is flushed
        #[arg(long, default_value = "1400")]
        target_tokens: usize,

        /// Token count above which a single turn is split
        #[arg(long, default_value = "1700")]
        max_tokens: usize,

        /// Transcripts estimated below this many tokens use a single extraction call
        #[arg(long, default_value = "6000")]
        simple_threshold: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

struct ProcessArgs {
    input: PathBuf,
    output: PathBuf,
    product_summary: Option<String>,
    product_summary_file: Option<PathBuf>,
    report: Option<PathBuf>,
    interview_id: Option<String>,
    config: PipelineConfig,
    resilience: ResilienceConfig,
    index_output: Option<PathBuf>,
    embed_concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            product_summary,
            product_summary_file,
            report,
            interview_id,
            target_tokens,
            max_tokens,
            simple_threshold,
            max_quotes_per_pain,
            abort_on_chunk_failure,
            timeout_secs,
            max_retries,
            index_output,
            embed_concurrency,
            verbose,
        } => {
            setup_logging(verbose);
            let config = PipelineConfig {
                simple_mode_max_tokens: simple_threshold,
                chunker: ChunkerConfig {
                    target_tokens,
                    max_tokens,
                },
                extraction: ExtractionConfig {
                    failure_policy: if abort_on_chunk_failure {
                        FailurePolicy::Abort
                    } else {
                        FailurePolicy::SkipChunk
                    },
                    ..Default::default()
                },
                compression: CompressionConfig {
                    max_quotes_per_pain,
                    ..Default::default()
                },
                ..Default::default()
            };
            let resilience = ResilienceConfig {
                call_timeout: Duration::from_secs(timeout_secs),
                max_retries,
                ..Default::default()
            };
            process_interview(ProcessArgs {
                input,
                output,
                product_summary,
                product_summary_file,
                report,
                interview_id,
                config,
                resilience,
                index_output,
                embed_concurrency,
            })
            .await
        }
        Commands::Analyze {
            input,
            target_tokens,
            max_tokens,
            simple_threshold,
            verbose,
        } => {
            setup_logging(verbose);
            let chunker = ChunkerConfig {
                target_tokens,
                max_tokens,
            };
            analyze_transcript(input, &chunker, simple_threshold)
        }
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn process_interview(args: ProcessArgs) -> Result<()> {
    info!("Loading transcript from {:?}", args.input);
    let transcript = read_transcript(&args.input)?;
    let product_summary =
        read_product_summary(args.product_summary, args.product_summary_file.as_deref())?;
    if product_summary.is_empty() {
        warn!("No product summary given; scoring will rely on the transcript alone");
    }
    let interview_id = args
        .interview_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let api_config = AnthropicConfig::from_env()?;
    let backend = ResilientBackend::new(AnthropicClient::new(api_config), args.resilience.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current call and stopping");
            on_interrupt.cancel();
        }
    });

    let pipeline = Pipeline::new(backend, args.config).with_cancellation(cancel);
    let processed = pipeline
        .process_interview_with_artifacts(&interview_id, &transcript, &product_summary)
        .await
        .with_context(|| format!("Failed to process interview {}", interview_id))?;
    let outcome = &processed.outcome;

    write_outcome_json(outcome, &args.output)?;
    info!("Output written to {:?}", args.output);

    if let Some(report_path) = &args.report {
        SummaryReport::new(outcome).write_file(report_path)?;
        info!("Report written to {:?}", report_path);
    }

    if let Some(index_path) = &args.index_output {
        let embedder = ResilientBackend::new(
            OpenAiEmbeddingClient::new(EmbeddingConfig::from_env()?),
            args.resilience,
        );
        let store = JsonlChunkStore::new(index_path);
        let index = index_chunks(
            &embedder,
            &store,
            &interview_id,
            &processed.artifacts.chunks,
            &processed.artifacts.extractions,
            &IndexConfig {
                concurrency: args.embed_concurrency,
            },
        )
        .await
        .with_context(|| format!("Failed to store chunk records in {:?}", index_path))?;
        info!(
            "Index: {} chunks embedded, {} failed, {} records written to {:?}",
            index.embedded, index.failed, index.inserted, index_path
        );
    }

    let scoring = outcome.scoring();
    match outcome {
        ProcessingOutcome::Simple { extraction, .. } => info!(
            "Complete: PMF {:.0}/100 (confidence {:.2}), {} pains, {} feature requests",
            scoring.pmf_score,
            scoring.confidence,
            extraction.pains.len(),
            extraction.feature_requests.len()
        ),
        ProcessingOutcome::Hierarchical { merged, chunks, .. } => info!(
            "Complete: PMF {:.0}/100 (confidence {:.2}), {} pains, {} feature requests from {} chunks ({} skipped, {} suspect id collisions)",
            scoring.pmf_score,
            scoring.confidence,
            merged.pains.len(),
            merged.feature_requests.len(),
            chunks,
            merged.stats.skipped_chunks,
            merged.stats.suspect_id_collisions
        ),
    }

    Ok(())
}

fn analyze_transcript(input: PathBuf, chunker: &ChunkerConfig, simple_threshold: usize) -> Result<()> {
    info!("Analyzing transcript from {:?}", input);
    let transcript = read_transcript(&input)?;
    let token_estimate = approximate_tokens(&transcript);
    let turns = parse_turns(&transcript);

    println!("Transcript Analysis");
    println!("===================");
    println!("Characters: {}", transcript.chars().count());
    println!("Estimated tokens: {}", token_estimate);
    println!(
        "Mode: {}",
        if token_estimate < simple_threshold {
            "simple"
        } else {
            "hierarchical"
        }
    );
    println!("Turns: {}", turns.len());
    println!();

    println!("Speaker Statistics");
    println!("------------------");
    let mut speakers: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for turn in &turns {
        let entry = speakers.entry(turn.speaker.as_str()).or_default();
        entry.0 += 1;
        entry.1 += approximate_tokens(&turn.text);
    }
    for (speaker, (turn_count, tokens)) in &speakers {
        println!(
            "{}: {} turns, ~{} tokens ({:.1}%)",
            speaker,
            turn_count,
            tokens,
            *tokens as f64 / token_estimate.max(1) as f64 * 100.0
        );
    }
    println!();

    let chunks = chunk_turns(&turns, chunker)?;
    let sizes: Vec<usize> = chunks.iter().map(|c| c.token_estimate()).collect();
    let continued = chunks
        .iter()
        .filter(|c| c.text.ends_with(CONTINUED_MARKER))
        .count();

    println!("Chunks");
    println!("------");
    println!(
        "Chunks at target {} / max {}: {}",
        chunker.target_tokens,
        chunker.max_tokens,
        chunks.len()
    );
    if !sizes.is_empty() {
        println!(
            "Tokens per chunk: min {}, avg {}, max {}",
            sizes.iter().min().copied().unwrap_or(0),
            sizes.iter().sum::<usize>() / sizes.len(),
            sizes.iter().max().copied().unwrap_or(0)
        );
    }
    println!("Split-turn segments: {}", continued);

    Ok(())
}
