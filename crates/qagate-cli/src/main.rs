//! qagate - quality gate CLI for polyglot monorepos
//!
//! Runs the right formatters, linters, tests, builds and scanners for the
//! stacks a change touches, and folds their output into one verdict.
//!
//! ## Commands
//!
//! - `check`: run checks and report a green/yellow/red verdict
//! - `fix`: run formatter fix templates
//! - `tools`: list registered tools and whether they are installed
//! - `detect`: print the scopes detected in the repository
//!
//! Exit codes: `0` pass, `1` red (or yellow with `--fail-on-yellow`),
//! `2` configuration or usage error, `3` internal error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{warn, Level};

use qagate_ci::{cancel_pair, CancelSignal, Orchestrator};
use qagate_core::{
    init_tracing, render, render_text, write_report, ConfigOverrides, Dimension, ExecutionRequest,
    Mode, QaConfig, QaError, ReportFormat, RequestError, RequestFields, RunKind, ScopeSelector,
};

#[derive(Parser)]
#[command(name = "qagate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Quality gate orchestration for polyglot monorepos", long_about = None)]
struct Cli {
    /// Repository root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Configuration file (default: <root>/qagate.toml)
    #[arg(short, long, global = true, env = "QAGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run quality checks and report a verdict
    Check {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Dimensions to check (default: all)
        #[arg(short, long = "dimension", value_delimiter = ',')]
        dimensions: Vec<String>,

        /// fast, full or dod
        #[arg(short, long, default_value = "full")]
        mode: String,

        /// Treat a yellow verdict as failure
        #[arg(long)]
        fail_on_yellow: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Apply formatter fixes
    Fix {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// List registered tools and their availability
    Tools {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the scopes detected in the repository
    Detect {
        /// Print JSON instead of one scope per line
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Restrict the run to these files
    files: Vec<PathBuf>,

    /// Scopes to run, or `auto` to detect them
    #[arg(short, long = "scope", value_delimiter = ',')]
    scopes: Vec<String>,

    /// Run only these tools
    #[arg(short, long = "tool", value_delimiter = ',')]
    tools: Vec<String>,

    /// Only consider files changed against the base ref
    #[arg(long)]
    changed_only: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Parallel tool slots (default: number of CPUs)
    #[arg(short, long, env = "QAGATE_JOBS")]
    jobs: Option<usize>,

    /// Default per-tool timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Report format: text, json or markdown
    #[arg(short, long, default_value = "text")]
    format: ReportFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.json_logs, level);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let root = std::fs::canonicalize(&cli.root)
        .map_err(|e| QaError::Configuration(format!("root {}: {e}", cli.root.display())))?;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Check {
            selection,
            dimensions,
            mode,
            fail_on_yellow,
            run,
        } => {
            let fields = check_fields(&selection, &dimensions, &mode)?;
            let overrides = overrides(&run, fail_on_yellow);
            cmd_run(&root, config_path, &overrides, fields, &run).await
        }
        Commands::Fix { selection, run } => {
            let fields = fix_fields(&selection)?;
            let overrides = overrides(&run, false);
            cmd_run(&root, config_path, &overrides, fields, &run).await
        }
        Commands::Tools { json } => cmd_tools(&root, config_path, json).await,
        Commands::Detect { json } => cmd_detect(&root, config_path, json).await,
    }
}

/// Exit code for an error that escaped a command.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<QaError>())
        .map_or(3, QaError::exit_code)
}

fn overrides(run: &RunArgs, fail_on_yellow: bool) -> ConfigOverrides {
    ConfigOverrides {
        jobs: run.jobs,
        timeout_secs: run.timeout,
        fail_on_yellow: fail_on_yellow.then_some(true),
    }
}

fn check_fields(
    selection: &SelectionArgs,
    dimensions: &[String],
    mode: &str,
) -> Result<RequestFields, QaError> {
    let dimensions = dimensions
        .iter()
        .filter(|d| !d.trim().is_empty())
        .map(|d| d.parse::<Dimension>())
        .collect::<Result<Vec<_>, RequestError>>()?;
    let mode: Mode = mode.parse()?;
    Ok(RequestFields {
        dimensions,
        mode,
        kind: RunKind::Check,
        ..selection_fields(selection)?
    })
}

fn fix_fields(selection: &SelectionArgs) -> Result<RequestFields, QaError> {
    Ok(RequestFields {
        kind: RunKind::Fix,
        ..selection_fields(selection)?
    })
}

fn selection_fields(selection: &SelectionArgs) -> Result<RequestFields, QaError> {
    Ok(RequestFields {
        scopes: ScopeSelector::parse_list(&selection.scopes)?,
        tools: selection.tools.clone(),
        files: selection.files.clone(),
        changed_only: selection.changed_only,
        ..Default::default()
    })
}

fn load_config(root: &Path, config_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<QaConfig> {
    let config = QaConfig::discover(root, config_path)?.apply_overrides(overrides)?;
    Ok(config)
}

fn interrupt_signal() -> CancelSignal {
    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping running tools");
            handle.cancel();
        }
    });
    signal
}

async fn cmd_run(
    root: &Path,
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
    fields: RequestFields,
    run: &RunArgs,
) -> Result<u8> {
    let config = load_config(root, config_path, overrides)?;
    let fail_on_yellow = config.run.fail_on_yellow;
    let orchestrator = Orchestrator::new(root, config)?;
    let request = ExecutionRequest::new(fields)?;

    let report = orchestrator.execute(&request, interrupt_signal()).await?;

    let rendered = render(&report, run.format)?;
    match &run.output {
        Some(path) => {
            write_report(path, &rendered)?;
            print!("{}", render_text(&report));
            println!("report written to {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(report.exit_code(fail_on_yellow))
}

async fn cmd_tools(root: &Path, config_path: Option<&Path>, json: bool) -> Result<u8> {
    let config = load_config(root, config_path, &ConfigOverrides::default())?;
    let orchestrator = Orchestrator::new(root, config)?;
    let listing = orchestrator.tool_listing().await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&listing).context("serialize tool listing")?
        );
        return Ok(0);
    }

    for tool in &listing {
        let dimensions: Vec<&str> = tool.dimensions.iter().map(|d| d.as_str()).collect();
        let (status, detail) = match &tool.availability {
            None => ("disabled", String::new()),
            Some(a) if a.available => ("available", a.version.clone().unwrap_or_default()),
            Some(a) => ("missing", a.reason.clone().unwrap_or_default()),
        };
        println!(
            "{:<14} {:<10} {:<28} {}",
            tool.id,
            status,
            dimensions.join(","),
            detail
        );
    }
    Ok(0)
}

async fn cmd_detect(root: &Path, config_path: Option<&Path>, json: bool) -> Result<u8> {
    let config = load_config(root, config_path, &ConfigOverrides::default())?;
    let orchestrator = Orchestrator::new(root, config)?;
    let scopes = orchestrator.detect_scopes().await?;

    if json {
        println!("{}", serde_json::to_string(&scopes).context("serialize scopes")?);
    } else {
        for scope in &scopes {
            println!("{scope}");
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_arguments_parse() {
        let cli = Cli::try_parse_from([
            "qagate",
            "check",
            "web/src/app.tsx",
            "--dimension",
            "format,lint",
            "--scope",
            "frontend",
            "--mode",
            "fast",
            "--jobs",
            "3",
            "--format",
            "json",
        ])
        .unwrap();
        let Commands::Check {
            selection,
            dimensions,
            mode,
            run,
            ..
        } = cli.command
        else {
            panic!("expected check");
        };
        assert_eq!(run.jobs, Some(3));
        assert_eq!(run.format, ReportFormat::Json);

        let fields = check_fields(&selection, &dimensions, &mode).unwrap();
        assert_eq!(fields.dimensions, vec![Dimension::Format, Dimension::Lint]);
        assert_eq!(fields.mode, Mode::Fast);
        assert_eq!(
            fields.scopes,
            ScopeSelector::Named(vec!["frontend".to_string()])
        );
        assert_eq!(fields.files, vec![PathBuf::from("web/src/app.tsx")]);
    }

    #[test]
    fn test_unknown_dimension_is_a_usage_error() {
        let selection = SelectionArgs {
            files: vec![],
            scopes: vec![],
            tools: vec![],
            changed_only: false,
        };
        let err = check_fields(&selection, &["style".to_string()], "full").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = check_fields(&selection, &[], "paranoid").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_fix_defaults_to_format_kind() {
        let cli = Cli::try_parse_from(["qagate", "fix", "--tool", "prettier"]).unwrap();
        let Commands::Fix { selection, .. } = cli.command else {
            panic!("expected fix");
        };
        let fields = fix_fields(&selection).unwrap();
        assert_eq!(fields.kind, RunKind::Fix);
        assert_eq!(fields.tools, vec!["prettier".to_string()]);
        assert_eq!(fields.scopes, ScopeSelector::Auto);
    }

    #[test]
    fn test_error_exit_codes() {
        let config_err = anyhow::Error::new(QaError::Configuration("bad".into()));
        assert_eq!(exit_code_for(&config_err), 2);
        let invariant = anyhow::Error::new(QaError::AggregationInvariant("dup".into()))
            .context("aggregating");
        assert_eq!(exit_code_for(&invariant), 3);
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), 3);
    }
}
