//! Bundled fallback file generator
//!
//! Fetches a full catalog for one locale (or every locale emojibase
//! publishes) and writes it in the fallback file format the index reads
//! when it has neither network nor cache.
//!
//! Run with: cargo run -p fallback-gen -- --locale de --pretty

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use emoji_index::fallback::{locale_file_name, DEFAULT_FALLBACK_BASE_NAME};
use emoji_index::locale::emojibase_locale;
use emoji_index::source::{
    write_entries, EmojiDataSource, EmojibaseSource, FileSource, SystemSource, EMOJIBASE_LOCALES,
};
use emoji_index::{resolve_source, CatalogIndex, DataSource, IndexConfig, Locale, Platform};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Locale to generate (e.g. "en", "de", "zh-Hant")
    #[arg(short, long, default_value = "en")]
    locale: String,

    /// Generate every locale emojibase publishes
    #[arg(long)]
    all_locales: bool,

    /// Platform whose image set filters the catalog (apple, linux, windows)
    #[arg(short, long)]
    platform: Option<String>,

    /// Where entries come from: auto, emoji-data, emojibase, system or file:<path>
    #[arg(short, long, default_value = "auto")]
    source: String,

    /// Output file (single locale only; defaults to <base-name>-<locale>.json)
    #[arg(short, long, conflicts_with = "all_locales")]
    output: Option<PathBuf>,

    /// Directory for generated files
    #[arg(short = 'd', long, default_value = ".")]
    output_dir: PathBuf,

    /// File name prefix for generated files
    #[arg(long, default_value = DEFAULT_FALLBACK_BASE_NAME)]
    base_name: String,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Index configuration providing feed URLs and timeouts
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Concurrent locales with --all-locales
    #[arg(short = 'C', long, default_value_t = 4)]
    concurrency: usize,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, PartialEq)]
enum SourceKind {
    Auto,
    EmojiData,
    Emojibase,
    System,
    File(PathBuf),
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(path) = s.strip_prefix("file:") {
            if path.is_empty() {
                bail!("file source needs a path: file:<path>");
            }
            return Ok(SourceKind::File(PathBuf::from(path)));
        }
        match s {
            "auto" => Ok(SourceKind::Auto),
            "emoji-data" => Ok(SourceKind::EmojiData),
            "emojibase" => Ok(SourceKind::Emojibase),
            "system" => Ok(SourceKind::System),
            other => bail!("unknown source {other:?}"),
        }
    }
}

/// What one generated file contains
struct Summary {
    locale: Locale,
    source_id: String,
    path: PathBuf,
    sections: Vec<(&'static str, usize)>,
    total: usize,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_source(
    kind: &SourceKind,
    locale: &Locale,
    platform: Platform,
    config: &IndexConfig,
) -> Result<Arc<dyn DataSource>> {
    let timeout = config.source.request_timeout();
    let source: Arc<dyn DataSource> = match kind {
        SourceKind::Auto => resolve_source(locale, platform, &config.source)?,
        SourceKind::EmojiData => Arc::new(
            EmojiDataSource::new(&config.source.emoji_data_url, platform.image_vendor())?
                .with_timeout(timeout),
        ),
        SourceKind::Emojibase => {
            let code = emojibase_locale(locale)
                .with_context(|| format!("emojibase has no data for {locale}"))?;
            Arc::new(
                EmojibaseSource::new(&config.source.emojibase_base_url, code)?
                    .with_shortcodes(true)
                    .with_timeout(timeout),
            )
        }
        SourceKind::System => Arc::new(SystemSource::new()),
        SourceKind::File(path) => Arc::new(FileSource::new(path.clone())),
    };
    Ok(source)
}

async fn generate(source: Arc<dyn DataSource>, locale: Locale, path: PathBuf, pretty: bool) -> Result<Summary> {
    let source_id = source.identifier();
    debug!(source = %source_id, locale = %locale, "fetching");
    let entries = source
        .fetch()
        .await
        .with_context(|| format!("Failed to fetch {source_id}"))?;

    // Counts reflect what the index will actually serve
    let catalog = CatalogIndex::build(&entries);
    if catalog.is_empty() {
        bail!("{source_id} produced no usable entries for {locale}");
    }
    let sections = catalog
        .sections()
        .iter()
        .map(|s| (s.category.display_name(), s.emojis.len()))
        .collect();

    write_entries(&path, &entries, pretty)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), entries = entries.len(), "fallback file written");

    Ok(Summary {
        locale,
        source_id,
        path,
        sections,
        total: catalog.len(),
    })
}

fn print_summary(summary: &Summary) {
    println!(
        "{} ({}) -> {}: {} emoji",
        summary.locale,
        summary.source_id,
        summary.path.display(),
        summary.total
    );
    for (category, count) in &summary.sections {
        println!("  {category:<20} {count:>5}");
    }
}

fn output_path(args: &Args, locale: &Locale) -> PathBuf {
    args.output.clone().unwrap_or_else(|| {
        args.output_dir
            .join(locale_file_name(&args.base_name, Some(&locale.identifier())))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => IndexConfig::load_toml(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => IndexConfig::default(),
    };
    let platform = match &args.platform {
        Some(p) => p.parse::<Platform>().map_err(anyhow::Error::msg)?,
        None => config.platform,
    };
    let kind: SourceKind = args.source.parse()?;

    if !args.all_locales {
        let locale: Locale = args.locale.parse().map_err(anyhow::Error::msg)?;
        let source = build_source(&kind, &locale, platform, &config)?;

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        spinner.set_message(format!("Fetching {}...", source.identifier()));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let path = output_path(&args, &locale);
        let summary = generate(source, locale, path, args.pretty).await;
        spinner.finish_and_clear();
        print_summary(&summary?);
        return Ok(());
    }

    let locales = EMOJIBASE_LOCALES
        .iter()
        .map(|code| code.parse::<Locale>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;

    let pb = ProgressBar::new(locales.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut jobs = Vec::with_capacity(locales.len());
    for locale in locales {
        let source = build_source(&kind, &locale, platform, &config)?;
        let path = output_path(&args, &locale);
        jobs.push(generate(source, locale, path, args.pretty));
    }

    let mut summaries = Vec::new();
    let mut failures = 0usize;
    let mut results = futures::stream::iter(jobs).buffer_unordered(args.concurrency.max(1));
    while let Some(result) = results.next().await {
        match result {
            Ok(summary) => {
                pb.set_message(summary.locale.to_string());
                summaries.push(summary);
            }
            Err(e) => {
                failures += 1;
                pb.println(format!("Locale failed: {e:#}"));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Generation complete");

    summaries.sort_by(|a, b| a.locale.identifier().cmp(&b.locale.identifier()));
    for summary in &summaries {
        print_summary(summary);
    }
    if failures > 0 {
        bail!("{failures} locale(s) failed");
    }
    Ok(())
}
