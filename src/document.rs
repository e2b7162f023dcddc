use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::history::HistorySource;
use crate::inspector::extract_all;
use crate::model::{CommitRecord, FileRecord, ParsedDocument};
use crate::scanner::{scan_workspace, ScanOptions};

/// Inputs for one extraction run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Scan root.
    pub root: PathBuf,
    /// Working copy for `git log`; the scan root when `None`.
    pub git_dir: Option<PathBuf>,
    pub config: Config,
}

impl RunOptions {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            git_dir: None,
            config,
        }
    }
}

/// The aggregate plus any non-fatal problems met while building it.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: ParsedDocument,
    pub warnings: Vec<String>,
}

pub fn aggregate(codebase: Vec<FileRecord>, git_commits: Vec<CommitRecord>) -> ParsedDocument {
    ParsedDocument { codebase, git_commits }
}

/// Scan, extract every file, read history, and combine.
///
/// Fails only when the scan root is unusable. `on_file` fires once per extracted
/// file, possibly from several threads.
pub fn build_document(
    opts: &RunOptions,
    history: &dyn HistorySource,
    on_file: &(dyn Fn() + Sync),
) -> Result<Extraction> {
    let cfg = &opts.config;
    let entries = scan_workspace(&ScanOptions {
        root: opts.root.clone(),
        exclude_dir_names: cfg.scan.exclude_dir_names.clone(),
        respect_ignore_files: cfg.scan.respect_ignore_files,
    })?;
    tracing::debug!(files = entries.len(), root = %opts.root.display(), "scan complete");

    let codebase = extract_all(&entries, cfg.parallel, on_file);

    let mut warnings = Vec::new();
    let git_commits = if cfg.history.enabled {
        let git_dir = opts.git_dir.as_deref().unwrap_or(&opts.root);
        match history.commits(git_dir) {
            Ok(commits) => commits,
            Err(e) => {
                tracing::warn!("{e}");
                warnings.push(e.to_string());
                vec![]
            }
        }
    } else {
        vec![]
    };

    Ok(Extraction {
        document: aggregate(codebase, git_commits),
        warnings,
    })
}

/// Pretty JSON with four-space indentation.
pub fn to_pretty_json(doc: &ParsedDocument) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

pub fn write_document(doc: &ParsedDocument, output_path: &Path) -> Result<()> {
    if let Some(dir) = output_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }
    let json = to_pretty_json(doc)?;
    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    Ok(())
}
