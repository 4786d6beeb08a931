//! CLI entry point for promguard.
//!
//! This module is intentionally thin: it handles argument parsing, IO
//! and exit codes. All business logic lives in the `promguard-app`
//! crate.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use promguard_app::{
    render_github_annotations, render_text, report_exit_code, runtime_error_report, write_report,
    LintInput, LintScope,
};
use promguard_settings::Overrides;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "promguard",
    version,
    about = "Static analysis linter for Prometheus rule files"
)]
struct Cli {
    /// Directory rule-file globs are resolved against.
    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,

    /// Path to promguard config TOML, relative to the root.
    #[arg(long, default_value = "promguard.toml")]
    config: Utf8PathBuf,

    /// Override profile (strict|warn).
    #[arg(long)]
    profile: Option<String>,

    /// Override when to fail the lint (bug|warning).
    #[arg(long)]
    fail_on: Option<String>,

    /// Override maximum problems to emit.
    #[arg(long)]
    max_problems: Option<u32>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lint rule files and write a report.
    Lint {
        /// Git base revision; with --head, only change states from this
        /// diff are applied (e.g. origin/main).
        #[arg(long)]
        base: Option<String>,
        /// Git head revision (e.g. HEAD).
        #[arg(long)]
        head: Option<String>,

        /// Where to write the JSON report.
        #[arg(long, default_value = "artifacts/promguard/report.json")]
        report_out: Utf8PathBuf,

        /// Global deadline for the run, e.g. "5m".
        #[arg(long)]
        deadline: Option<String>,
    },

    /// Render GitHub Actions annotations from an existing JSON report.
    Annotations {
        /// Path to the JSON report file.
        #[arg(long, default_value = "artifacts/promguard/report.json")]
        report: Utf8PathBuf,

        /// Maximum number of annotations to emit.
        #[arg(long, default_value = "10")]
        max: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Lint {
            ref base,
            ref head,
            ref report_out,
            ref deadline,
        } => cmd_lint(&cli, base.clone(), head.clone(), report_out, deadline.as_deref()),
        Commands::Annotations { report, max } => cmd_annotations(&report, max),
    }
}

fn cmd_lint(
    cli: &Cli,
    base: Option<String>,
    head: Option<String>,
    report_out: &Utf8PathBuf,
    deadline: Option<&str>,
) -> anyhow::Result<()> {
    let root = cli
        .root
        .canonicalize_utf8()
        .unwrap_or_else(|_| cli.root.clone());

    let result = (|| -> anyhow::Result<i32> {
        if !root.exists() {
            anyhow::bail!("root does not exist: {root}");
        }
        // Load config if present; a missing file is allowed (defaults apply).
        let cfg_path = root.join(&cli.config);
        let cfg_text = std::fs::read_to_string(&cfg_path).unwrap_or_default();

        let scope = match (base, head) {
            (Some(base), Some(head)) => LintScope::Git { base, head },
            (None, None) => LintScope::Glob,
            _ => anyhow::bail!("--base and --head must be used together"),
        };

        let deadline = deadline
            .map(parse_deadline)
            .transpose()
            .context("parse --deadline")?;

        let output = promguard_app::run_lint(LintInput {
            root: &root,
            config_text: &cfg_text,
            overrides: Overrides {
                profile: cli.profile.clone(),
                fail_on: cli.fail_on.clone(),
                max_problems: cli.max_problems,
            },
            scope,
            deadline,
        })?;

        write_report(report_out, &output.report).context("write report json")?;
        print!("{}", render_text(&output.report));

        Ok(report_exit_code(&output.report))
    })();

    match result {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let report = runtime_error_report(&format!("{err:#}"));
            let _ = write_report(report_out, &report);
            eprintln!("promguard error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn parse_deadline(text: &str) -> anyhow::Result<Duration> {
    Ok(promguard_types::parse_duration(text)?)
}

fn cmd_annotations(report_path: &Utf8PathBuf, max: usize) -> anyhow::Result<()> {
    let report_text = std::fs::read_to_string(report_path)
        .with_context(|| format!("read report: {report_path}"))?;
    let report = serde_json::from_str(&report_text)
        .with_context(|| format!("parse report JSON: {report_path}"))?;

    for annotation in render_github_annotations(&report).into_iter().take(max) {
        println!("{annotation}");
    }
    Ok(())
}
