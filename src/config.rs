use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional per-project config file, looked up in the scan root.
pub const CONFIG_FILE_NAME: &str = ".codescribe.json";

/// File name of the aggregate document inside `output_dir`.
pub const OUTPUT_FILE_NAME: &str = "parsed_code.json";

/// Controls workspace scanning behavior (what to skip).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree (e.g. "node_modules", "vendor").
    ///
    /// These are compared against path components, not full paths.
    pub exclude_dir_names: Vec<String>,

    /// Honour `.gitignore`, `.ignore` and hidden-file rules while walking.
    /// Off by default: every file under the root is a candidate.
    pub respect_ignore_files: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// When false the git log is never invoked and `git_commits` is empty.
    pub enabled: bool,

    /// Upper bound on the `git log` subprocess. Expiry counts as "no history".
    pub timeout_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output directory, relative to the scan root unless absolute.
    pub output_dir: PathBuf,
    /// Extract files on the rayon pool. Output order is identical either way.
    pub parallel: bool,
    pub scan: ScanConfig,
    pub history: HistoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".codescribe"),
            parallel: true,
            scan: ScanConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// Where the aggregate document is written for a given scan root.
    pub fn output_path(&self, root: &Path) -> PathBuf {
        let dir = if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            root.join(&self.output_dir)
        };
        dir.join(OUTPUT_FILE_NAME)
    }
}

pub fn load_config(root: &Path) -> Config {
    let primary = root.join(CONFIG_FILE_NAME);

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
        tracing::warn!("ignoring malformed {}: {e}", primary.display());
        Config::default()
    })
}
