//! # CLI Module
//!
//! Command-line interface for the hash-signing pipeline.
//!
//! ## Usage
//! ```bash
//! # Sign the reference input (0 1 1 2 3 5 8)
//! signer sign
//!
//! # Sign your own values with a salt
//! signer sign 4 8 15 16 23 42 --salt pepper
//!
//! # First 20 Fibonacci numbers, no artificial latency, JSON output
//! signer sign --fibonacci 20 --throttled-latency-ms 0 --unthrottled-latency-ms 0 --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use hash_signer::core::hasher::{HashAlgorithmKind, HasherConfig};
use hash_signer::core::signer::{SignOutcome, Signer, REFERENCE_INPUT};
use hash_signer::core::stages::SourceStage;
use hash_signer::error::Result;
use hash_signer::events::{Event, EventChannel, PipelineEvent, StageEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::thread;
use std::time::Duration;

/// Hash Signer - chained digests over a streaming pipeline
#[derive(Parser, Debug)]
#[command(name = "signer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign a sequence of integers
    Sign {
        /// Values to sign (defaults to 0 1 1 2 3 5 8)
        #[arg(allow_negative_numbers = true, conflicts_with = "fibonacci")]
        values: Vec<i64>,

        /// Sign the first N Fibonacci numbers instead
        #[arg(long)]
        fibonacci: Option<usize>,

        /// Salt appended to every hash input
        #[arg(long, default_value = "")]
        salt: String,

        /// Branches per item in MultiHash
        #[arg(short, long, default_value = "6")]
        fan_out: usize,

        /// Separator between combined digests
        #[arg(long, default_value = "_")]
        separator: String,

        /// Algorithm behind the throttled primitive
        #[arg(long, default_value = "md5")]
        throttled: Algorithm,

        /// Algorithm behind the unthrottled primitive
        #[arg(long, default_value = "crc32")]
        unthrottled: Algorithm,

        /// Artificial latency of each throttled call
        #[arg(long, default_value = "10")]
        throttled_latency_ms: u64,

        /// Artificial latency of each unthrottled call
        #[arg(long, default_value = "1000")]
        unthrottled_latency_ms: u64,

        /// Buffer size of the streams between stages (0 = rendezvous)
        #[arg(long, default_value = "0")]
        stream_capacity: usize,

        /// Items each hashing stage works on at once
        #[arg(long, default_value = "64")]
        max_in_flight: usize,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    /// MD5, hex digest
    Md5,
    /// CRC-32/IEEE, decimal checksum
    Crc32,
}

impl From<Algorithm> for HashAlgorithmKind {
    fn from(algo: Algorithm) -> Self {
        match algo {
            Algorithm::Md5 => HashAlgorithmKind::Md5,
            Algorithm::Crc32 => HashAlgorithmKind::Crc32,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// The combined digest only
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sign {
            values,
            fibonacci,
            salt,
            fan_out,
            separator,
            throttled,
            unthrottled,
            throttled_latency_ms,
            unthrottled_latency_ms,
            stream_capacity,
            max_in_flight,
            output,
            verbose,
        } => {
            let throttled = HashAlgorithmKind::from(throttled);
            let unthrottled = HashAlgorithmKind::from(unthrottled);
            let hasher = HasherConfig::new()
                .salt(salt)
                .throttled(throttled)
                .unthrottled(unthrottled)
                .throttled_latency(Duration::from_millis(throttled_latency_ms))
                .unthrottled_latency(Duration::from_millis(unthrottled_latency_ms));

            let signer = Signer::builder()
                .hasher(hasher)
                .fan_out(fan_out)
                .separator(separator)
                .stream_capacity(stream_capacity)
                .max_in_flight(max_in_flight)
                .build()?;

            if verbose && matches!(output, OutputFormat::Pretty) {
                let term = Term::stderr();
                for (role, kind) in [("throttled", throttled), ("unthrottled", unthrottled)] {
                    term.write_line(&format!(
                        "  {:<12} {}",
                        style(role).dim(),
                        kind.description()
                    ))
                    .ok();
                }
            }

            let source = match fibonacci {
                Some(count) => SourceStage::from_fn(move || fibonacci_numbers().take(count)),
                None if values.is_empty() => SourceStage::from_values(REFERENCE_INPUT.to_vec()),
                None => SourceStage::from_values(values),
            };

            run_sign(&signer, source, output, verbose)
        }
    }
}

fn run_sign(
    signer: &Signer,
    source: SourceStage,
    output: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Hash Signer").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let (sender, receiver) = EventChannel::new();

    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();

    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Stage(StageEvent::Finished {
                    name,
                    items_emitted,
                    ..
                }) => {
                    if verbose {
                        pb.println(format!("  {} {} ({} items)", style("✓").green(), name, items_emitted));
                    }
                    pb.set_message(format!("{name} done"));
                }
                Event::Stage(StageEvent::Failed { name, message, .. }) => {
                    pb.println(format!("  {} {}: {}", style("✗").red(), name, message));
                }
                Event::Pipeline(PipelineEvent::Started { stages }) => {
                    pb.set_message(format!("running {stages} stages"));
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Error { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = signer.sign_source(source, &sender);

    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let outcome = result?;
    match output {
        OutputFormat::Pretty => print_pretty_results(&term, &outcome, verbose),
        OutputFormat::Json => print_json_results(signer, &outcome)?,
        OutputFormat::Minimal => println!("{}", outcome.combined),
    }

    Ok(())
}

fn print_pretty_results(term: &Term, outcome: &SignOutcome, verbose: bool) {
    term.write_line(&format!("{} Signing Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  finished in {:.2}s",
        outcome.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} throttled calls ({} contended waits)",
        style(outcome.guard.acquisitions).cyan(),
        style(outcome.guard.contended).dim()
    ))
    .ok();

    if verbose {
        for stage in &outcome.stages {
            term.write_line(&format!(
                "  {} {:<16} {} items",
                style(format!("[{}]", stage.index)).dim(),
                stage.name,
                stage.items_emitted
            ))
            .ok();
        }
    }

    term.write_line("").ok();
    println!("{}", outcome.combined);
}

fn print_json_results(signer: &Signer, outcome: &SignOutcome) -> Result<()> {
    let output = serde_json::json!({
        "combined": outcome.combined,
        "config": signer.config(),
        "duration_ms": outcome.duration_ms,
        "guard": outcome.guard,
        "stages": outcome.stages.iter().map(|stage| {
            serde_json::json!({
                "index": stage.index,
                "name": stage.name,
                "items_emitted": stage.items_emitted,
            })
        }).collect::<Vec<_>>(),
    });

    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|e| hash_signer::SignerError::Config(format!("cannot render JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

/// Fibonacci numbers starting 0, 1, 1, 2, ... until i64 overflows
fn fibonacci_numbers() -> impl Iterator<Item = i64> + Send {
    std::iter::successors(Some((0_i64, 1_i64)), |&(a, b)| {
        a.checked_add(b).map(|next| (b, next))
    })
    .map(|(a, _)| a)
}
