use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "certforge", version)]
struct Cli {
    /// Log per-row diagnostics to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every roster row and write the archive plus a JSON manifest.
    Render(RenderArgs),
    /// Render a single recipient to a PDF.
    Preview(PreviewArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Batch description JSON.
    #[arg(long)]
    config: PathBuf,

    /// Directory receiving the archive and manifest.
    #[arg(long)]
    out_dir: PathBuf,

    /// Compose rows on a worker pool.
    #[arg(long)]
    parallel: bool,

    /// Worker threads (defaults to the number of cores).
    #[arg(long)]
    threads: Option<usize>,

    /// Rows per scheduling chunk in parallel mode.
    #[arg(long, default_value_t = 16)]
    chunk_size: usize,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Batch description JSON.
    #[arg(long)]
    config: PathBuf,

    /// Recipient name.
    #[arg(long)]
    name: String,

    /// Output PDF path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Preview(args) => cmd_preview(args),
    }
}

fn config_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = certforge::BatchConfig::from_path(&args.config)?;
    let base = config_dir(&args.config);
    let template = Arc::new(cfg.load_template(base)?);
    let signers = cfg.load_signers(base)?;

    let mut options = cfg.batch_options();
    options.threading = certforge::BatchThreading {
        parallel: args.parallel,
        chunk_size: args.chunk_size,
        threads: args.threads,
    };
    let job = certforge::BatchJob::new(
        cfg.build_roster(&signers),
        cfg.prize_assignments(),
        chrono::Local::now().naive_local(),
    )
    .with_options(options);

    let mut pipeline = certforge::BatchPipeline::new(template);
    let cancel = certforge::CancelToken::new();
    let mut progress = |p: &certforge::Progress| {
        eprintln!(
            "[{:>3.0}%] row {}/{}: {:?}",
            p.fraction() * 100.0,
            p.row,
            p.total,
            p.outcome
        );
    };
    let report = pipeline.run(&job, &cancel, &mut progress)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    let archive_path = args.out_dir.join(&report.archive.file_name);
    std::fs::write(&archive_path, &report.archive.bytes)
        .with_context(|| format!("write archive '{}'", archive_path.display()))?;

    let manifest_path = archive_path.with_extension("manifest.json");
    std::fs::write(&manifest_path, report.manifest.to_json_pretty()?)
        .with_context(|| format!("write manifest '{}'", manifest_path.display()))?;

    println!(
        "wrote {} ({} succeeded, {} skipped, {} failed)",
        archive_path.display(),
        report.manifest.succeeded,
        report.manifest.skipped,
        report.manifest.failed
    );
    for failure in &report.manifest.failures {
        println!("  row {} '{}': {}", failure.row, failure.recipient, failure.reason);
    }
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let cfg = certforge::BatchConfig::from_path(&args.config)?;
    let base = config_dir(&args.config);
    let template = Arc::new(cfg.load_template(base)?);
    let signers = cfg.load_signers(base)?;

    let mut request = cfg.request_for(&args.name, &signers);
    if let Some(rank) = cfg.prize_assignments().rank_for(&args.name)
        && request.kind == certforge::CertificateKind::Excellence
    {
        request = request.with_prize_rank(rank);
    }

    let mut composer = certforge::CertificateComposer::with_parley(template)?;
    let doc = composer.compose(&request)?;
    std::fs::write(&args.out, &doc.bytes)
        .with_context(|| format!("write pdf '{}'", args.out.display()))?;
    println!("wrote {} (sha256 {})", args.out.display(), doc.sha256);
    Ok(())
}
