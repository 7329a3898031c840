use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use motionviz::{
    ConfigFile, DataLayout, GcsStore, PipelineOptions, Processor, TfRecordScenarioDecoder,
    VideoRenderProcessor, DEFAULT_BUCKET, DEFAULT_PREFIX,
};

#[derive(Parser, Debug)]
#[command(name = "motionviz", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download, render and record any scenario files not yet processed.
    Update(UpdateArgs),
    /// Regenerate the markdown gallery from the rendered artifacts.
    Gallery(GalleryArgs),
}

#[derive(Parser, Debug)]
struct UpdateArgs {
    /// Working directory holding data/ and tmp/.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Optional JSON config file (root, bucket, prefix).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remote bucket to list.
    #[arg(long)]
    bucket: Option<String>,

    /// Object name prefix to list under.
    #[arg(long)]
    prefix: Option<String>,

    /// Visit pending items in random order.
    #[arg(long)]
    random: bool,
}

#[derive(Parser, Debug)]
struct GalleryArgs {
    /// Working directory holding data/ and tmp/.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Optional JSON config file (root, bucket, prefix).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Update(args) => cmd_update(args),
        Command::Gallery(args) => cmd_gallery(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ConfigFile> {
    match path {
        Some(path) => Ok(ConfigFile::load(path)?),
        None => Ok(ConfigFile::default()),
    }
}

fn resolve_layout(root: PathBuf, cfg: &ConfigFile) -> DataLayout {
    // An explicit --root wins; "." is the flag's default, so only then does
    // the config file's root apply.
    if root == PathBuf::from(".") {
        if let Some(cfg_root) = &cfg.root {
            return DataLayout::new(cfg_root);
        }
    }
    DataLayout::new(root)
}

fn cmd_update(args: UpdateArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_ref())?;
    let layout = resolve_layout(args.root, &cfg);

    let bucket = args
        .bucket
        .or(cfg.bucket)
        .unwrap_or_else(|| DEFAULT_BUCKET.to_string());
    let prefix = args
        .prefix
        .or(cfg.prefix)
        .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

    let store = GcsStore::new(bucket, prefix);
    let decoder = TfRecordScenarioDecoder;
    let mut processors: Vec<Box<dyn Processor>> =
        vec![Box::new(VideoRenderProcessor::new(&layout)?)];

    let summary = motionviz::run_pipeline(
        &store,
        &decoder,
        &layout,
        &mut processors,
        PipelineOptions {
            shuffle: args.random,
        },
    )
    .context("pipeline run failed")?;

    println!(
        "{} listed, {} skipped, {} succeeded, {} failed",
        summary.listed,
        summary.skipped,
        summary.succeeded,
        summary.failed.len()
    );
    for (name, reason) in &summary.failed {
        eprintln!("failed: {name}: {reason}");
    }
    // Partial failure still exits zero; the summary and ledger say what is
    // left for the next run.
    if summary.succeeded == 0 && !summary.failed.is_empty() {
        anyhow::bail!("all {} attempted item(s) failed", summary.failed.len());
    }
    Ok(())
}

fn cmd_gallery(args: GalleryArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_ref())?;
    let layout = resolve_layout(args.root, &cfg);

    let pages = motionviz::gallery::generate_gallery(&layout)?;
    println!("wrote {pages} gallery page(s) under {}", layout.data_dir().display());
    Ok(())
}
