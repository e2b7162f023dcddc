use regex::Regex;
use std::sync::OnceLock;

use crate::inspector::Extractor;
use crate::model::{ClassRecord, FileRecord, FunctionRecord};

fn function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // JS `function`, Ruby/Python-ish `def`, Rust `fn`, Go `func`.
        // The parameter list is optional so Ruby's paren-less `def bar` still counts.
        Regex::new(r"\b(?:function|def|fn|func)\s+(\w+)[ \t]*(?:\(([^)]*)\))?").unwrap()
    })
}

fn class_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bclass\s+(\w+)").unwrap())
}

fn split_parameters(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(text) if !text.trim().is_empty() => text.split(',').map(|p| p.trim().to_string()).collect(),
        _ => vec![],
    }
}

/// Regex-based extraction for every supported language without a real grammar.
///
/// Matches anywhere in the text, comments and string literals included, and never
/// looks at imports, docstrings or definition bounds.
pub fn extract_universal_definitions(source_text: &str) -> (Vec<FunctionRecord>, Vec<ClassRecord>) {
    let functions = function_regex()
        .captures_iter(source_text)
        .map(|caps| FunctionRecord {
            name: caps[1].to_string(),
            parameters: split_parameters(caps.get(2).map(|m| m.as_str())),
            returns: None,
            docstring: None,
            code: None,
        })
        .collect();

    let classes = class_regex()
        .captures_iter(source_text)
        .map(|caps| ClassRecord {
            name: caps[1].to_string(),
            docstring: None,
            code: None,
        })
        .collect();

    (functions, classes)
}

pub struct UniversalExtractor;

impl Extractor for UniversalExtractor {
    fn name(&self) -> &'static str {
        "universal"
    }

    fn extract(&self, file: &str, path: &str, source_text: &str) -> FileRecord {
        let (functions, classes) = extract_universal_definitions(source_text);
        FileRecord {
            functions,
            classes,
            ..FileRecord::new(file, path, source_text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn names(fs: &[FunctionRecord]) -> Vec<&str> {
        fs.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn ruby_def_without_parens_has_no_parameters() {
        let (functions, classes) = extract_universal_definitions("def bar\nend\n");
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "bar");
        assert!(functions[0].parameters.is_empty());
        assert!(functions[0].docstring.is_none());
        assert!(functions[0].code.is_none());
        assert!(classes.is_empty());
    }

    #[test]
    fn parameters_are_split_and_trimmed() {
        let src = indoc! {r#"
            function add(a,  b , c) { return a + b + c; }
            func (s *Server) Start() error { return nil }
            func helper(ctx context.Context, n int) {}
            fn noop() {}
        "#};
        let (functions, _) = extract_universal_definitions(src);
        assert_eq!(names(&functions), vec!["add", "helper", "noop"]);
        assert_eq!(functions[0].parameters, vec!["a", "b", "c"]);
        assert_eq!(functions[1].parameters, vec!["ctx context.Context", "n int"]);
        assert!(functions[2].parameters.is_empty());
    }

    #[test]
    fn classes_are_matched_by_keyword() {
        let src = indoc! {r#"
            public class Greeter {
                static class Inner {}
            }
            class Point
            end
        "#};
        let (_, classes) = extract_universal_definitions(src);
        let got: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(got, vec!["Greeter", "Inner", "Point"]);
        assert!(classes.iter().all(|c| c.docstring.is_none() && c.code.is_none()));
    }

    #[test]
    fn keyword_inside_string_literal_is_a_known_false_positive() {
        let src = r#"const msg = "please call function ghost(a) later";"#;
        let (functions, _) = extract_universal_definitions(src);
        assert_eq!(names(&functions), vec!["ghost"]);
        assert_eq!(functions[0].parameters, vec!["a"]);
    }

    #[test]
    fn keyword_inside_comment_is_a_known_false_positive() {
        let src = "// this class Ghost is not real\nint main() { return 0; }\n";
        let (functions, classes) = extract_universal_definitions(src);
        assert!(functions.is_empty(), "C-style definitions carry no keyword");
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "Ghost");
    }

    #[test]
    fn record_never_carries_imports_or_docstring() {
        let src = "import os\n\"\"\"doc\"\"\"\nfunction f() {}\n";
        let rec = UniversalExtractor.extract("x.js", "src/x.js", src);
        assert_eq!(rec.file, "x.js");
        assert_eq!(rec.path, "src/x.js");
        assert!(rec.imports.is_empty());
        assert!(rec.docstring.is_none());
        assert!(rec.error.is_none());
        assert_eq!(rec.code.as_deref(), Some(src));
        assert_eq!(names(&rec.functions), vec!["f"]);
    }
}
