use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracedup::core::impact::RiskTier;
use tracedup::core::record::{Record, RecordTable};
use tracedup::services::pipeline::AnalysisReport;
use tracedup::{AnalysisConfig, AnalysisPipeline};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tracedup", version, about = "Near-duplicate detection over event-log case keys")]
struct Cli {
    /// JSON config file (default: <config dir>/tracedup/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate labeled synthetic duplicates from an event log
    Generate {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        generator: GeneratorArgs,
        /// Write labeled rows as JSON lines here
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Detect, classify and score duplicates in an event log as is
    Detect {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        detection: DetectionArgs,
        /// Write impact records as JSON lines here
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Inject synthetic duplicates, detect them and report recall
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        detection: DetectionArgs,
        #[command(flatten)]
        generator: GeneratorArgs,
        /// Write the full report as JSON here
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// CSV with columns record_key,actor,activity,timestamp,amount
    #[arg(short, long, value_name = "CSV")]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct DetectionArgs {
    /// Minimum key similarity (0-100)
    #[arg(long)]
    threshold: Option<f64>,
    /// Requested comparison budget
    #[arg(long)]
    max_comparisons: Option<usize>,
}

#[derive(Args, Debug)]
struct GeneratorArgs {
    /// Number of source keys to duplicate
    #[arg(long)]
    count: Option<usize>,
    /// Share of sources that receive fuzzy-detectable variants
    #[arg(long)]
    fuzzy_ratio: Option<f64>,
    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

impl DetectionArgs {
    fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(threshold) = self.threshold {
            config.detection.threshold = threshold;
        }
        if let Some(max) = self.max_comparisons {
            config.detection.max_comparisons = max;
        }
    }
}

impl GeneratorArgs {
    fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(count) = self.count {
            config.generator.count = count;
        }
        if let Some(ratio) = self.fuzzy_ratio {
            config.generator.fuzzy_ratio = ratio;
        }
        if self.seed.is_some() {
            config.generator.seed = self.seed;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AnalysisConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Generate {
            input,
            generator,
            output,
        } => {
            generator.apply(&mut config);
            let pipeline = AnalysisPipeline::new(config)?;
            let table = RecordTable::new(read_records(&input.input)?)?;

            let dataset = benchmark("generating duplicates", || pipeline.generate(&table))?;
            let rows = dataset.rows();
            write_json_lines(&output, &rows)?;
            println!(
                "✅ Generated {} variants ({} rows) from {} keys",
                dataset.len(),
                rows.len(),
                table.key_count()
            );
        }

        Commands::Detect {
            input,
            detection,
            output,
        } => {
            detection.apply(&mut config);
            let pipeline = AnalysisPipeline::new(config)?;
            let table = RecordTable::new(read_records(&input.input)?)?;

            let result = benchmark("detecting duplicates", || pipeline.detect(&table));
            write_json_lines(&output, &result.impacts)?;
            println!(
                "✅ Found {} candidate pairs in {} keys ({} comparisons of {} budget)",
                result.pairs.len(),
                table.key_count(),
                result.stats.comparisons_attempted,
                result.stats.budget
            );
            if result.stats.exhausted {
                println!("⚠️  Comparison budget exhausted; results are partial.");
            }
        }

        Commands::Analyze {
            input,
            detection,
            generator,
            output,
        } => {
            detection.apply(&mut config);
            generator.apply(&mut config);
            let pipeline = AnalysisPipeline::new(config)?;
            let records = read_records(&input.input)?;

            let report = benchmark("full analysis", || pipeline.run(records))?;
            print_report(&report);

            if let Some(path) = output {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create report file {:?}", path))?;
                serde_json::to_writer_pretty(BufWriter::new(file), &report)
                    .with_context(|| format!("Failed to write report to {:?}", path))?;
                println!("\n✅ Wrote report to {}", path.display());
            }
        }
    }

    Ok(())
}

/// Read the event log CSV into records.
fn read_records(path: &Path) -> Result<Vec<Record>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Reading {}…", path.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open input {:?}", path))?;
    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<Record>().enumerate() {
        let record = row.with_context(|| format!("Invalid row {} in {:?}", i + 1, path))?;
        records.push(record);
        if i % 10_000 == 0 {
            spinner.tick();
        }
    }

    spinner.finish_with_message(format!("Read {} records", records.len()));
    Ok(records)
}

/// Write one JSON object per line.
fn write_json_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create output {:?}", path))?;
    let mut out = BufWriter::new(file);
    for item in items {
        writeln!(out, "{}", serde_json::to_string(item)?)?;
    }
    out.flush()
        .with_context(|| format!("Failed to write output {:?}", path))?;
    println!("▶ Wrote {} lines to {}", items.len(), path.display());
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    let evaluation = &report.evaluation;
    println!("\n🔎 Recall by difficulty class:");
    for (name, recall) in [
        ("fuzzy-detectable", evaluation.fuzzy),
        ("non-fuzzy-detectable", evaluation.non_fuzzy),
        ("overall", evaluation.overall()),
    ] {
        println!(
            "   {:<22} {}/{} rows ({:.1}%), {} missed",
            name,
            recall.detected,
            recall.total,
            recall.rate() * 100.0,
            recall.missed()
        );
    }

    let summary = &report.summary;
    println!("\n📊 {} candidate pairs", summary.pair_count);
    if let (Some(sim), Some(mean), Some(median)) =
        (summary.mean_similarity, summary.mean_hours, summary.median_hours)
    {
        println!("   mean similarity {:.1}", sim);
        println!("   time gap: mean {:.2}h, median {:.2}h", mean, median);
    }

    println!("\n⚖️  Risk distribution:");
    for tier in [RiskTier::Critical, RiskTier::High, RiskTier::Medium, RiskTier::Low] {
        println!("   {:<8} {}", tier.as_str(), report.risk.count(tier));
    }
    println!("   total exposure {:.2}", report.risk.total_exposure);

    let stats = &report.detection.stats;
    if stats.exhausted {
        println!(
            "\n⚠️  Comparison budget of {} exhausted after {} of {} blocks; results are partial.",
            stats.budget, stats.blocks_examined, stats.blocks
        );
    }
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
