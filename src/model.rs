use serde::{Deserialize, Serialize};

/// One extracted function or method definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub parameters: Vec<String>,

    /// Reserved for a return annotation; never populated.
    #[serde(default)]
    pub returns: Option<String>,

    #[serde(default)]
    pub docstring: Option<String>,

    /// Verbatim source of the definition. Only the Python extractor knows exact bounds.
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,

    #[serde(default)]
    pub docstring: Option<String>,

    #[serde(default)]
    pub code: Option<String>,
}

/// Everything extracted from a single source file.
///
/// A record is produced for every classified file. When something went wrong
/// (unreadable file, Python syntax error) `error` is set and the definition
/// lists are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Base file name.
    pub file: String,

    /// Path relative to the scan root, `/`-separated.
    pub path: String,

    #[serde(default)]
    pub docstring: Option<String>,

    #[serde(default)]
    pub imports: Vec<String>,

    #[serde(default)]
    pub functions: Vec<FunctionRecord>,

    #[serde(default)]
    pub classes: Vec<ClassRecord>,

    /// Lossily decoded file contents. Absent only when the file could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileRecord {
    pub fn new(file: impl Into<String>, path: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            path: path.into(),
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Record for a file whose contents never made it into memory.
    pub fn unreadable(file: impl Into<String>, path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            path: path.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub author: String,
    /// ISO-8601 timestamp exactly as printed by `git log --date=iso`.
    pub date: String,
    pub message: String,
}

/// The aggregate written to `parsed_code.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub codebase: Vec<FileRecord>,
    pub git_commits: Vec<CommitRecord>,
}
