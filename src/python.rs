use anyhow::{anyhow, Context, Result};
use tree_sitter::{Language, Node, Parser};

use crate::inspector::Extractor;
use crate::model::{ClassRecord, FileRecord, FunctionRecord};

/// Everything the tree-sitter pass pulls out of one Python module.
#[derive(Debug, Default)]
struct PythonDefinitions {
    docstring: Option<String>,
    imports: Vec<String>,
    functions: Vec<FunctionRecord>,
    classes: Vec<ClassRecord>,
}

pub struct PythonExtractor;

impl Extractor for PythonExtractor {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extract(&self, file: &str, path: &str, source_text: &str) -> FileRecord {
        let mut record = FileRecord::new(file, path, source_text);
        match extract_python_definitions(source_text) {
            Ok(defs) => {
                record.docstring = defs.docstring;
                record.imports = defs.imports;
                record.functions = defs.functions;
                record.classes = defs.classes;
            }
            Err(e) => {
                tracing::debug!(path, "python parse failed: {e:#}");
                record.error = Some(format!("AST parse error: {e:#}"));
            }
        }
        record
    }
}

fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

/// Parse `source_text` and collect every definition, however deeply nested.
///
/// Any syntax error anywhere in the module rejects the whole file; a partial
/// tree is never reported.
fn extract_python_definitions(source_text: &str) -> Result<PythonDefinitions> {
    let mut parser = Parser::new();
    parser
        .set_language(&python_language())
        .context("Failed to set tree-sitter language")?;

    let tree = parser
        .parse(source_text, None)
        .ok_or_else(|| anyhow!("parser produced no tree"))?;
    let root = tree.root_node();

    if root.has_error() {
        return Err(anyhow!(describe_syntax_error(root)));
    }

    let source = source_text.as_bytes();
    if let Some(problem) = python3_violation(root, source) {
        return Err(anyhow!(problem));
    }

    let mut defs = PythonDefinitions {
        docstring: docstring_of(root, source),
        ..PythonDefinitions::default()
    };

    // Pre-order walk so records come out in source order.
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "function_definition" => {
                if let Some(f) = function_record(node, source) {
                    defs.functions.push(f);
                }
            }
            "class_definition" => {
                if let Some(c) = class_record(node, source) {
                    defs.classes.push(c);
                }
            }
            "import_statement" => defs.imports.extend(plain_import_names(node, source)),
            "import_from_statement" | "future_import_statement" => {
                defs.imports.push(render_from_import(node, source));
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    Ok(defs)
}

fn describe_syntax_error(root: Node) -> String {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            let what = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                "invalid syntax".to_string()
            };
            return format!("{what} at line {}, column {}", pos.row + 1, pos.column + 1);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    "invalid syntax".to_string()
}

/// Node kinds that begin a logical line. Comprehension clauses are left out:
/// they live inside brackets, where indentation is free.
fn starts_logical_line(kind: &str) -> bool {
    kind.ends_with("_statement")
        || kind.ends_with("_definition")
        || matches!(
            kind,
            "decorator"
                | "elif_clause"
                | "else_clause"
                | "except_clause"
                | "except_group_clause"
                | "finally_clause"
                | "case_clause"
        )
}

/// Code that tree-sitter accepts but a Python 3 compiler rejects: the Python 2
/// `print`/`exec` statements and indentation that mixes tabs and spaces
/// inconsistently.
fn python3_violation(root: Node, source: &[u8]) -> Option<String> {
    let mut indents = IndentStack::default();
    let mut last_line_start = None;

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let kind = node.kind();
        if kind == "print_statement" || kind == "exec_statement" {
            let pos = node.start_position();
            let keyword = kind.trim_end_matches("_statement");
            return Some(format!(
                "Python 2 `{keyword}` statement at line {}, column {}",
                pos.row + 1,
                pos.column + 1
            ));
        }

        if starts_logical_line(kind) {
            let start = node.start_byte();
            let line_start = source[..start]
                .iter()
                .rposition(|b| *b == b'\n' || *b == b'\r')
                .map_or(0, |i| i + 1);
            let leading = &source[line_start..start];
            let at_line_start = leading.iter().all(|&b| matches!(b, b' ' | b'\t' | b'\x0c'));
            if at_line_start && last_line_start != Some(line_start) {
                last_line_start = Some(line_start);
                if let Err(what) = indents.check(leading) {
                    return Some(format!("{what} at line {}", node.start_position().row + 1));
                }
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// Indentation levels measured twice, with tabs as 8 columns and as 1, the way
/// the CPython tokenizer detects `TabError`.
#[derive(Debug)]
struct IndentStack {
    levels: Vec<(usize, usize)>,
}

impl Default for IndentStack {
    fn default() -> Self {
        Self { levels: vec![(0, 0)] }
    }
}

impl IndentStack {
    fn check(&mut self, leading: &[u8]) -> std::result::Result<(), &'static str> {
        const INCONSISTENT: &str = "inconsistent use of tabs and spaces in indentation";

        let (mut col, mut alt) = (0usize, 0usize);
        for &b in leading {
            match b {
                b' ' => {
                    col += 1;
                    alt += 1;
                }
                b'\t' => {
                    col = (col / 8 + 1) * 8;
                    alt += 1;
                }
                _ => {
                    col = 0;
                    alt = 0;
                }
            }
        }

        let (top_col, top_alt) = self.levels.last().copied().unwrap_or((0, 0));
        if col == top_col {
            if alt != top_alt {
                return Err(INCONSISTENT);
            }
        } else if col > top_col {
            if alt <= top_alt {
                return Err(INCONSISTENT);
            }
            self.levels.push((col, alt));
        } else {
            while self.levels.len() > 1 && self.levels.last().is_some_and(|(c, _)| col < *c) {
                self.levels.pop();
            }
            let (top_col, top_alt) = self.levels.last().copied().unwrap_or((0, 0));
            if col != top_col {
                return Err("unindent does not match any outer indentation level");
            }
            if alt != top_alt {
                return Err(INCONSISTENT);
            }
        }
        Ok(())
    }
}

fn node_text<'a>(source: &'a [u8], node: Node) -> &'a str {
    let start = node.start_byte();
    let end = node.end_byte();
    std::str::from_utf8(&source[start..end]).unwrap_or("")
}

fn function_record(node: Node, source: &[u8]) -> Option<FunctionRecord> {
    let name = node_text(source, node.child_by_field_name("name")?).to_string();
    if name.is_empty() {
        return None;
    }
    let parameters = node
        .child_by_field_name("parameters")
        .map(|p| positional_parameters(p, source))
        .unwrap_or_default();
    let docstring = node.child_by_field_name("body").and_then(|b| docstring_of(b, source));

    Some(FunctionRecord {
        name,
        parameters,
        returns: None,
        docstring,
        code: Some(node_text(source, node).to_string()),
    })
}

fn class_record(node: Node, source: &[u8]) -> Option<ClassRecord> {
    let name = node_text(source, node.child_by_field_name("name")?).to_string();
    if name.is_empty() {
        return None;
    }
    let docstring = node.child_by_field_name("body").and_then(|b| docstring_of(b, source));

    Some(ClassRecord {
        name,
        docstring,
        code: Some(node_text(source, node).to_string()),
    })
}

/// Names of the parameters that can be passed positionally, in declaration order.
///
/// Defaults and annotations are dropped. Everything from `*`/`*args` onward is
/// keyword-only or variadic and is not listed, nor is `**kwargs`.
fn positional_parameters(params: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => out.push(node_text(source, child).to_string()),
            "typed_parameter" => {
                let mut inner = child.walk();
                let first = child.named_children(&mut inner).next();
                match first.map(|n| n.kind()) {
                    Some("identifier") => out.extend(first.map(|n| node_text(source, n).to_string())),
                    Some("list_splat_pattern") => break,
                    _ => {}
                }
            }
            "default_parameter" | "typed_default_parameter" => {
                if let Some(name) = child.child_by_field_name("name") {
                    if name.kind() == "identifier" {
                        out.push(node_text(source, name).to_string());
                    }
                }
            }
            "list_splat_pattern" | "keyword_separator" => break,
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

/// `a.b` regardless of any whitespace the source put around the dots.
fn dotted_name_text(node: Node, source: &[u8]) -> String {
    if node.kind() != "dotted_name" {
        return node_text(source, node).trim().to_string();
    }
    let mut cursor = node.walk();
    let parts: Vec<&str> = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "identifier")
        .map(|n| node_text(source, n))
        .collect();
    parts.join(".")
}

/// The imported (not the bound) name of a `name` / `name as alias` node.
fn imported_name(node: Node, source: &[u8]) -> String {
    match node.kind() {
        "aliased_import" => node
            .child_by_field_name("name")
            .map(|n| dotted_name_text(n, source))
            .unwrap_or_default(),
        _ => dotted_name_text(node, source),
    }
}

fn plain_import_names(node: Node, source: &[u8]) -> Vec<String> {
    let mut cursor = node.walk();
    node.children_by_field_name("name", &mut cursor)
        .map(|n| imported_name(n, source))
        .filter(|s| !s.is_empty())
        .collect()
}

/// `from <module> import <a>, <b>`; the module is empty for a bare relative import.
fn render_from_import(node: Node, source: &[u8]) -> String {
    let module = if node.kind() == "future_import_statement" {
        "__future__".to_string()
    } else {
        node.child_by_field_name("module_name")
            .map(|m| match m.kind() {
                "relative_import" => {
                    let mut cursor = m.walk();
                    let dotted = m.named_children(&mut cursor).find(|n| n.kind() == "dotted_name");
                    dotted.map(|d| dotted_name_text(d, source)).unwrap_or_default()
                }
                _ => dotted_name_text(m, source),
            })
            .unwrap_or_default()
    };

    let mut names: Vec<String> = {
        let mut cursor = node.walk();
        node.children_by_field_name("name", &mut cursor)
            .map(|n| imported_name(n, source))
            .filter(|s| !s.is_empty())
            .collect()
    };

    let mut cursor = node.walk();
    if node.named_children(&mut cursor).any(|n| n.kind() == "wildcard_import") {
        names.push("*".to_string());
    }

    format!("from {} import {}", module, names.join(", "))
}

// ---------------------------------------------------------------------------
// Docstrings
// ---------------------------------------------------------------------------

/// Docstring of a module or a definition body: the first statement, when it is
/// a bare (non-bytes, non-f) string literal, evaluated and cleaned.
fn docstring_of(scope: Node, source: &[u8]) -> Option<String> {
    let mut cursor = scope.walk();
    let first = scope.named_children(&mut cursor).find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }

    // `"doc",` is a one-element tuple, not a string.
    let mut inner = first.walk();
    if first.children(&mut inner).any(|n| n.kind() == ",") {
        return None;
    }
    let mut expr = sole_expression(first)?;
    while expr.kind() == "parenthesized_expression" {
        expr = sole_expression(expr)?;
    }

    let raw = match expr.kind() {
        "string" => string_literal_value(node_text(source, expr))?,
        "concatenated_string" => {
            let mut parts = String::new();
            let mut c = expr.walk();
            for part in expr.named_children(&mut c).filter(|n| n.kind() == "string") {
                parts.push_str(&string_literal_value(node_text(source, part))?);
            }
            parts
        }
        _ => return None,
    };

    Some(clean_doc(&raw))
}

fn sole_expression(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let exprs: Vec<Node> = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    match exprs.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

/// Value of a single string literal token, or `None` for bytes and f-strings.
fn string_literal_value(text: &str) -> Option<String> {
    let quote_start = text.find(['"', '\''])?;
    let prefix = text[..quote_start].to_ascii_lowercase();
    if prefix.contains('b') || prefix.contains('f') {
        return None;
    }

    let body = &text[quote_start..];
    let quote = if body.starts_with("\"\"\"") {
        "\"\"\""
    } else if body.starts_with("'''") {
        "'''"
    } else {
        &body[..1]
    };
    if body.len() < quote.len() * 2 || !body.ends_with(quote) {
        return None;
    }
    // Python reads source with universal newlines.
    let inner = body[quote.len()..body.len() - quote.len()]
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    if prefix.contains('r') {
        Some(inner)
    } else {
        Some(unescape(&inner))
    }
}

fn take_radix_digits(chars: &mut std::iter::Peekable<std::str::Chars>, max: usize, radix: u32) -> String {
    let mut digits = String::new();
    while digits.len() < max {
        match chars.peek() {
            Some(c) if c.is_digit(radix) => {
                digits.push(*c);
                chars.next();
            }
            _ => break,
        }
    }
    digits
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(next),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            '0'..='7' => {
                let mut digits = next.to_string();
                digits.push_str(&take_radix_digits(&mut chars, 2, 8));
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => {
                        out.push('\\');
                        out.push_str(&digits);
                    }
                }
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits = take_radix_digits(&mut chars, width, 16);
                let decoded = (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => out.push(c),
                    None => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    out
}

fn expand_tabs(line: &str, tab_size: usize) -> String {
    let mut out = String::with_capacity(line.len());
    let mut col = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = tab_size - (col % tab_size);
            out.extend(std::iter::repeat(' ').take(pad));
            col += pad;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}

/// Normalize docstring indentation the way Python's `inspect.cleandoc` does.
fn clean_doc(doc: &str) -> String {
    let mut lines: Vec<String> = doc.split('\n').map(|l| expand_tabs(l, 8)).collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim_start().is_empty())
        .map(|l| l.chars().count() - l.trim_start().chars().count())
        .min();

    if let Some(first) = lines.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(margin) = margin {
        for line in lines.iter_mut().skip(1) {
            *line = line.chars().skip(margin).collect();
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let leading_blank = lines.iter().take_while(|l| l.is_empty()).count();
    lines.drain(..leading_blank);

    lines.join("\n")
}
