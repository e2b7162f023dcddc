use anyhow::{bail, Context, Result};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// File-name suffixes that take part in extraction. Matched case-sensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".py", ".js", ".ts", ".java", ".rb", ".go", ".cpp", ".c", ".cs"];

pub fn is_supported(file_name: &str) -> bool {
    SUPPORTED_EXTENSIONS.iter().any(|ext| file_name.ends_with(ext))
}

fn excluded_dir_overrides(root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // Override globs are whitelists unless negated; only negated globs are added here,
    // so anything not matched stays eligible.
    for d in exclude_dir_names {
        let d = d.trim().trim_matches('/');
        if d.is_empty() {
            continue;
        }
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    /// Relative to the scan root, always `/`-separated.
    pub rel_path: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub exclude_dir_names: Vec<String>,
    pub respect_ignore_files: bool,
}

/// Walk `opts.root` and return every file whose name carries a supported suffix.
///
/// Unreadable directory entries are skipped with a warning; only a missing or
/// non-directory root is an error.
pub fn scan_workspace(opts: &ScanOptions) -> Result<Vec<FileEntry>> {
    let root = &opts.root;
    let meta = std::fs::metadata(root)
        .with_context(|| format!("Scan root does not exist: {}", root.display()))?;
    if !meta.is_dir() {
        bail!("Scan root is not a directory: {}", root.display());
    }

    let overrides = excluded_dir_overrides(root, &opts.exclude_dir_names)?;
    let walker = WalkBuilder::new(root)
        .standard_filters(opts.respect_ignore_files)
        .overrides(overrides)
        .build();

    let mut entries = Vec::new();
    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };

        // Links are not followed into directories, but a link to a regular file counts.
        let is_file = match dent.file_type() {
            Some(ft) if ft.is_symlink() => std::fs::metadata(dent.path()).map(|m| m.is_file()).unwrap_or(false),
            Some(ft) => ft.is_file(),
            None => false,
        };
        if !is_file {
            continue;
        }

        let file_name = dent.file_name().to_string_lossy().to_string();
        if !is_supported(&file_name) {
            continue;
        }

        let abs_path = dent.into_path();
        let rel_path = path_relative_to(&abs_path, root)?;
        entries.push(FileEntry {
            abs_path,
            rel_path,
            file_name,
        });
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}

fn path_relative_to(path: &Path, base: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(base)
        .with_context(|| format!("{} is not under {}", path.display(), base.display()))?;
    Ok(normalize_path_for_output(rel))
}

pub fn normalize_path_for_output(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}
