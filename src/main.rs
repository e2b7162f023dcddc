use anyhow::{Context, Result};
use clap::Parser;
use codescribe::config::load_config;
use codescribe::document::{build_document, to_pretty_json, write_document, RunOptions};
use codescribe::history::GitCli;
use codescribe::inspector::analyze_file;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "codescribe")]
#[command(version)]
#[command(about = "Extract imports, functions, classes and git history from a source tree into JSON")]
struct Cli {
    /// Directory to scan
    #[arg(value_name = "ROOT", default_value = ".")]
    root: PathBuf,

    /// Write the document here instead of {ROOT}/{output_dir}/parsed_code.json
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Read git history from this working copy instead of ROOT
    #[arg(long, value_name = "DIR")]
    git_dir: Option<PathBuf>,

    /// Also print the document to stdout
    #[arg(long)]
    stdout: bool,

    /// Skip the git log entirely
    #[arg(long)]
    no_history: bool,

    /// Extract files one at a time instead of on the thread pool
    #[arg(long)]
    sequential: bool,

    /// Extract a single file and print its record as JSON
    #[arg(long, value_name = "FILE_PATH", conflicts_with_all = ["output", "git_dir", "stdout"])]
    inspect: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Some(p) = cli.inspect {
        let record = analyze_file(&p);
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let root = cli.root;
    let mut cfg = load_config(&root);
    if cli.no_history {
        cfg.history.enabled = false;
    }
    if cli.sequential {
        cfg.parallel = false;
    }
    let output_path = cli.output.unwrap_or_else(|| cfg.output_path(&root));
    let git = GitCli::new(Duration::from_secs(cfg.history.timeout_secs));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} extracting... {pos} files")
            .context("Invalid progress template")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));

    let mut opts = RunOptions::new(&root, cfg);
    opts.git_dir = cli.git_dir;
    let extraction = build_document(&opts, &git, &|| spinner.inc(1));
    let extraction = match extraction {
        Ok(e) => e,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    let errors = extraction.document.codebase.iter().filter(|r| r.is_error()).count();
    spinner.finish_and_clear();

    write_document(&extraction.document, &output_path)?;

    if cli.stdout {
        println!("{}", to_pretty_json(&extraction.document)?);
    }

    eprintln!(
        "Parsing complete. {} files ({} with errors), {} commits. Results saved at {}",
        extraction.document.codebase.len(),
        errors,
        extraction.document.git_commits.len(),
        output_path.display()
    );

    Ok(())
}
