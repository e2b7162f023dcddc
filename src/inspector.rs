use rayon::prelude::*;
use std::path::Path;

use crate::model::FileRecord;
use crate::python::PythonExtractor;
use crate::scanner::{normalize_path_for_output, FileEntry};
use crate::universal::UniversalExtractor;

/// Produces a [`FileRecord`] from a file's identity and decoded text.
///
/// Implementations must not fail: problems are reported through
/// [`FileRecord::error`] so one bad file never aborts a run.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// `file` is the base name, `path` the root-relative path.
    fn extract(&self, file: &str, path: &str, source_text: &str) -> FileRecord;
}

/// Suffix routed to the tree-sitter extractor; everything else gets the regex fallback.
pub const PRECISE_EXTENSION: &str = ".py";

pub fn extractor_for(file_name: &str) -> &'static dyn Extractor {
    static PYTHON: PythonExtractor = PythonExtractor;
    static UNIVERSAL: UniversalExtractor = UniversalExtractor;

    if file_name.ends_with(PRECISE_EXTENSION) {
        &PYTHON
    } else {
        &UNIVERSAL
    }
}

/// Extract already-decoded text, routing on the file name.
pub fn extract_source(file: &str, path: &str, source_text: &str) -> FileRecord {
    let extractor = extractor_for(file);
    tracing::debug!(path, extractor = extractor.name(), "extracting");
    extractor.extract(file, path, source_text)
}

/// Read one file (lossy UTF-8) and extract it. Read failures become error records.
pub fn extract_file(abs_path: &Path, rel_path: &str) -> FileRecord {
    let file = abs_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| rel_path.to_string());

    match std::fs::read(abs_path) {
        Ok(bytes) => {
            let source_text = String::from_utf8_lossy(&bytes);
            extract_source(&file, rel_path, &source_text)
        }
        Err(e) => {
            tracing::warn!("failed to read {}: {e}", abs_path.display());
            FileRecord::unreadable(file, rel_path, format!("Error reading {}: {e}", abs_path.display()))
        }
    }
}

/// Inspect a single file outside of a workspace scan.
pub fn analyze_file(path: &Path) -> FileRecord {
    extract_file(path, &normalize_path_for_output(path))
}

/// Extract every scanned entry. Output order always matches `entries`.
pub fn extract_all(entries: &[FileEntry], parallel: bool, on_done: impl Fn() + Sync) -> Vec<FileRecord> {
    let run = |entry: &FileEntry| {
        let record = extract_file(&entry.abs_path, &entry.rel_path);
        on_done();
        record
    };

    if parallel {
        entries.par_iter().map(run).collect()
    } else {
        entries.iter().map(run).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{scan_workspace, ScanOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn routes_by_suffix() {
        assert_eq!(extractor_for("a.py").name(), "python");
        assert_eq!(extractor_for("b.rb").name(), "universal");
        assert_eq!(extractor_for("c.ts").name(), "universal");
        assert_eq!(extractor_for("d.PY").name(), "universal");
    }

    #[test]
    fn python_file_goes_through_the_precise_path() {
        let src = "def foo(x, y):\n    \"\"\"doc\"\"\"\n    pass\n";
        let rec = extract_source("a.py", "a.py", src);
        assert!(rec.error.is_none());
        assert_eq!(rec.functions.len(), 1);
        assert_eq!(rec.functions[0].docstring.as_deref(), Some("doc"));
        assert!(rec.functions[0].code.is_some());
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.js");
        std::fs::write(&path, b"function ok(a) {}\n// \xff\xfe broken\n").unwrap();

        let rec = extract_file(&path, "bad.js");
        assert!(rec.error.is_none());
        let code = rec.code.unwrap();
        assert!(code.contains('\u{FFFD}'));
        assert!(code.starts_with("function ok(a)"));
        assert_eq!(rec.functions[0].name, "ok");
    }

    #[test]
    fn invalid_utf8_python_still_yields_a_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin.py");
        std::fs::write(&path, b"# caf\xe9\ndef f():\n    pass\n").unwrap();

        let rec = extract_file(&path, "latin.py");
        assert!(rec.code.unwrap().contains('\u{FFFD}'));
        assert_eq!(rec.functions.len(), 1);
    }

    #[test]
    fn unreadable_file_becomes_error_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.py");

        let rec = extract_file(&path, "gone.py");
        assert_eq!(rec.file, "gone.py");
        let err = rec.error.expect("error must be recorded");
        assert!(err.starts_with("Error reading"), "{err}");
        assert!(rec.code.is_none());
        assert!(rec.functions.is_empty() && rec.classes.is_empty() && rec.imports.is_empty());
    }

    #[test]
    fn parallel_and_sequential_agree_on_order() {
        let tmp = TempDir::new().unwrap();
        for i in 0..24 {
            let dir = tmp.path().join(format!("pkg{}", i % 4));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(format!("m{i}.py")), format!("def f{i}():\n    pass\n")).unwrap();
            std::fs::write(dir.join(format!("m{i}.go")), format!("func g{i}() {{}}\n")).unwrap();
        }
        let entries = scan_workspace(&ScanOptions {
            root: tmp.path().to_path_buf(),
            ..ScanOptions::default()
        })
        .unwrap();

        let done = AtomicUsize::new(0);
        let par = extract_all(&entries, true, || {
            done.fetch_add(1, Ordering::Relaxed);
        });
        let seq = extract_all(&entries, false, || {});

        assert_eq!(done.load(Ordering::Relaxed), entries.len());
        assert_eq!(par, seq);
        let par_paths: Vec<&str> = par.iter().map(|r| r.path.as_str()).collect();
        let entry_paths: Vec<&str> = entries.iter().map(|e| e.rel_path.as_str()).collect();
        assert_eq!(par_paths, entry_paths);
    }
}
