//! `llp` — thin CLI shell around `llp-core`'s parse/export/chain pipeline.
//!
//! Mirrors the original tool's three subcommands one flag at a time. This
//! binary owns argument parsing, config-file defaults, logging setup, and
//! exit-code mapping; all ingestion/normalization/rendering logic lives in
//! `llp-core`.

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use llp_core::error::{InputError, PipelineError};
use llp_core::pipeline::{self, CancelToken};
use llp_core::provider::ProviderId;
use llp_core::types::{ExportPolicy, ExportRequest, Formatting, ParseRequest, SplitSpec};

#[derive(Parser)]
#[command(name = "llp", about = "Normalize vendor LLM chat exports into a diffable archive")]
struct Cli {
    /// UI locale, falling back to `LLP_LOCALE` then `en`. Never read by the
    /// core pipeline itself.
    #[arg(long, global = true)]
    lang: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a raw export into normalized per-thread JSONL plus a manifest.
    Parse {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        outdir: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = false)]
        fail_fast: bool,
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Export a normalized thread JSONL into one or more Markdown files.
    Export {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        tz: Option<String>,
        #[arg(long, value_parser = ["none", "light"])]
        formatting: Option<String>,
        #[arg(long)]
        split: Option<String>,
        #[arg(long)]
        split_soft_overflow: Option<f64>,
        #[arg(long, default_value_t = false)]
        split_hard: bool,
        #[arg(long, default_value_t = false)]
        split_preview: bool,
        #[arg(long)]
        tiny_tail_threshold: Option<usize>,
    },
    /// Parse and export every resulting thread in one invocation.
    Chain {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        outdir: Option<PathBuf>,
        #[arg(long)]
        tz: Option<String>,
        #[arg(long, value_parser = ["none", "light"])]
        formatting: Option<String>,
        #[arg(long)]
        split: Option<String>,
        #[arg(long)]
        split_soft_overflow: Option<f64>,
        #[arg(long, default_value_t = false)]
        split_hard: bool,
        #[arg(long, default_value_t = false)]
        split_preview: bool,
        #[arg(long)]
        tiny_tail_threshold: Option<usize>,
        /// Already-parsed root (`<outdir>/<provider>`); skips the parse phase.
        #[arg(long)]
        parsed_root: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        fail_fast: bool,
        #[arg(long)]
        jobs: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let locale = cli
        .lang
        .clone()
        .or_else(|| std::env::var("LLP_LOCALE").ok())
        .unwrap_or_else(|| "en".to_string());
    tracing::debug!(locale = %locale, "resolved UI locale");

    let config = config::Config::load().unwrap_or_default();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(cli.command, &config));

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            let code = exit_code_for(&err);
            tracing::error!(error = %err, "llp failed");
            std::process::exit(code);
        }
    }
}

async fn run(command: Command, config: &config::Config) -> anyhow::Result<()> {
    match command {
        Command::Parse {
            provider,
            input,
            outdir,
            dry_run,
            fail_fast,
            jobs,
        } => run_parse_command(provider, input, outdir, dry_run, fail_fast, jobs, config).await,
        Command::Export {
            input,
            out,
            tz,
            formatting,
            split,
            split_soft_overflow,
            split_hard,
            split_preview,
            tiny_tail_threshold,
        } => run_export_command(
            input,
            out,
            tz,
            formatting,
            split,
            split_soft_overflow,
            split_hard,
            split_preview,
            tiny_tail_threshold,
            config,
        ),
        Command::Chain {
            provider,
            input,
            outdir,
            tz,
            formatting,
            split,
            split_soft_overflow,
            split_hard,
            split_preview,
            tiny_tail_threshold,
            parsed_root,
            fail_fast,
            jobs,
        } => {
            run_chain_command(
                provider,
                input,
                outdir,
                tz,
                formatting,
                split,
                split_soft_overflow,
                split_hard,
                split_preview,
                tiny_tail_threshold,
                parsed_root,
                fail_fast,
                jobs,
                config,
            )
            .await
        }
    }
}

async fn run_parse_command(
    provider: String,
    input: PathBuf,
    outdir: Option<PathBuf>,
    dry_run: bool,
    fail_fast: bool,
    jobs: Option<usize>,
    config: &config::Config,
) -> anyhow::Result<()> {
    llp_core::reader::require_exists(&input).map_err(input_error_to_anyhow)?;

    let provider: ProviderId = provider
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let outdir = outdir.unwrap_or_else(|| PathBuf::from(&config.parse.outdir));
    let jobs = jobs.unwrap_or(config.parse.jobs).max(1);

    tracing::info!(%provider, input = %input.display(), outdir = %outdir.join(provider.as_str()).display(), dry_run, fail_fast, "starting parse");

    let req = ParseRequest {
        provider,
        input_path: input,
        outdir,
        dry_run,
        fail_fast,
        jobs,
    };

    let cancel = CancelToken::new();
    let stats = pipeline::run_parse(&req, &cancel)
        .await
        .map_err(pipeline_error_to_anyhow)?;

    tracing::info!(
        threads = stats.threads,
        messages = stats.messages,
        errors = stats.total_errors(),
        skipped = stats.skipped,
        "parsed {} thread(s) ({} messages)",
        stats.threads,
        stats.messages
    );
    Ok(())
}

fn input_error_to_anyhow(e: InputError) -> anyhow::Error {
    anyhow::Error::new(e)
}

fn run_export_command(
    input: PathBuf,
    out: Option<PathBuf>,
    tz: Option<String>,
    formatting: Option<String>,
    split: Option<String>,
    split_soft_overflow: Option<f64>,
    split_hard: bool,
    split_preview: bool,
    tiny_tail_threshold: Option<usize>,
    config: &config::Config,
) -> anyhow::Result<()> {
    llp_core::reader::require_exists(&input).map_err(input_error_to_anyhow)?;

    let policy = build_export_policy(
        tz,
        formatting,
        split,
        split_soft_overflow,
        split_hard,
        split_preview,
        tiny_tail_threshold,
        config,
    )?;

    tracing::info!(input = %input.display(), "starting export");
    let req = ExportRequest {
        parsed_path: input,
        out_path: out,
        policy,
    };
    let outcome = pipeline::run_export(&req).map_err(export_error_to_anyhow)?;

    if let Some(preview) = outcome.preview {
        tracing::info!(
            estimated_bytes = preview.estimated_bytes,
            message_count = preview.message_count,
            "preview only (no files written)"
        );
    } else if outcome.paths.len() == 1 {
        tracing::info!("exported 1 markdown file");
    } else {
        tracing::info!(parts = outcome.paths.len(), "exported markdown files");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_chain_command(
    provider: Option<String>,
    input: Option<PathBuf>,
    outdir: Option<PathBuf>,
    tz: Option<String>,
    formatting: Option<String>,
    split: Option<String>,
    split_soft_overflow: Option<f64>,
    split_hard: bool,
    split_preview: bool,
    tiny_tail_threshold: Option<usize>,
    parsed_root: Option<PathBuf>,
    fail_fast: bool,
    jobs: Option<usize>,
    config: &config::Config,
) -> anyhow::Result<()> {
    let policy = build_export_policy(
        tz,
        formatting,
        split,
        split_soft_overflow,
        split_hard,
        split_preview,
        tiny_tail_threshold,
        config,
    )?;

    let (parse_req, root) = match parsed_root {
        Some(root) => {
            tracing::info!(root = %root.display(), "using existing parsed root");
            (None, root)
        }
        None => {
            let provider_name = provider.ok_or_else(|| anyhow::anyhow!("--provider is required unless --parsed-root is given"))?;
            let input = input.ok_or_else(|| anyhow::anyhow!("--input is required unless --parsed-root is given"))?;
            llp_core::reader::require_exists(&input).map_err(input_error_to_anyhow)?;
            let provider: ProviderId = provider_name.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let outdir = outdir.unwrap_or_else(|| PathBuf::from(&config.parse.outdir)).join("output");
            let root = outdir.join(provider.as_str());
            let req = ParseRequest {
                provider,
                input_path: input,
                outdir,
                dry_run: false,
                fail_fast,
                jobs: jobs.unwrap_or(config.parse.jobs).max(1),
            };
            (Some(req), root)
        }
    };

    let cancel = CancelToken::new();
    let stats = pipeline::run_chain(parse_req.as_ref(), &root, &policy, &cancel)
        .await
        .map_err(pipeline_error_to_anyhow)?;

    if fail_fast && stats.failed > 0 {
        anyhow::bail!("{} export(s) failed during chain", stats.failed);
    }

    tracing::info!(
        threads = stats.threads,
        exported = stats.exported,
        failed = stats.failed,
        "chain complete: exported {} markdown set(s) from {} thread(s) (failed: {})",
        stats.exported,
        stats.threads,
        stats.failed
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_export_policy(
    tz: Option<String>,
    formatting: Option<String>,
    split: Option<String>,
    split_soft_overflow: Option<f64>,
    split_hard: bool,
    split_preview: bool,
    tiny_tail_threshold: Option<usize>,
    config: &config::Config,
) -> anyhow::Result<ExportPolicy> {
    let formatting = match formatting.unwrap_or_else(|| config.export.formatting.clone()).as_str() {
        "none" => Formatting::None,
        _ => Formatting::Light,
    };
    let split = match split {
        Some(s) => SplitSpec::parse(&s).map_err(anyhow::Error::from)?,
        None => SplitSpec::None,
    };

    Ok(ExportPolicy {
        formatting,
        timezone: tz.unwrap_or_else(|| config.export.tz.clone()),
        split,
        split_hard,
        soft_overflow: split_soft_overflow.unwrap_or(config.export.split_soft_overflow),
        tiny_tail_threshold: tiny_tail_threshold.unwrap_or(config.export.tiny_tail_threshold),
        preview: split_preview,
    })
}

fn export_error_to_anyhow(e: PipelineError) -> anyhow::Error {
    anyhow::Error::new(e).context("export failed")
}

fn pipeline_error_to_anyhow(e: PipelineError) -> anyhow::Error {
    anyhow::Error::new(e)
}

/// Map a failure back to the documented exit code: `2` input/path problems,
/// `3` permission denied, `4` missing parsed root on chain, `5` export
/// failure, `99` unclassified.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(pipeline_err) = err.downcast_ref::<PipelineError>() {
        return match pipeline_err {
            PipelineError::Input(InputError::PermissionDenied(_)) => 3,
            PipelineError::Input(_) => 2,
            PipelineError::MissingParsedRoot(_) => 4,
            PipelineError::Write(_) | PipelineError::Config(_) => 5,
            PipelineError::TooManyAdapterErrors { .. }
            | PipelineError::FailFastValidation(_)
            | PipelineError::Cancelled => 99,
        };
    }
    if let Some(input_err) = err.downcast_ref::<InputError>() {
        return match input_err {
            InputError::PermissionDenied(_) => 3,
            _ => 2,
        };
    }
    99
}
