//! Script text parsing.
//!
//! Statements are newline separated. Lines before the first `DIM(...)` are
//! header statements; each `DIM(...)` opens a block that owns the following
//! operation lines; `RUN()` triggers execution and closes the open block.
//! `#` lines are comments.

use super::RUN_STATEMENT;
use crate::domain::{ProcessingError, ProcessingResult};
use crate::registry::{DimensionSelector, DimensionalOperationRegistry, OperationEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyLine {
    Block { source_line: usize, payload: String },
    Operation { source_line: usize, text: String },
}

/// Script statements split by role, without validating their contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptSections {
    pub header: Vec<String>,
    pub body: Vec<BodyLine>,
    pub has_trigger: bool,
}

impl ScriptSections {
    pub fn operation_count(&self) -> usize {
        self.body
            .iter()
            .filter(|line| matches!(line, BodyLine::Operation { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedScript {
    pub header: Vec<OperationEntry>,
    pub registry: DimensionalOperationRegistry,
    pub has_trigger: bool,
}

impl ParsedScript {
    /// `file` argument of the first header statement called `name`.
    pub fn file_argument(&self, name: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|entry| entry.name().eq_ignore_ascii_case(name))
            .and_then(|entry| entry.arg("file"))
            .and_then(|value| value.as_text())
    }
}

/// A batch script split into one parsed script per `RUN()` section, plus the
/// optional `MERGE(...)` statement after the last section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedBatchScript {
    pub datasets: Vec<ParsedScript>,
    pub merge: Option<OperationEntry>,
}

pub fn split_script(source: &str) -> ScriptSections {
    let mut sections = ScriptSections::default();
    let mut in_body = false;

    for (index, line) in source.lines().enumerate() {
        let statement = line.trim();
        if statement.is_empty() || statement.starts_with('#') {
            continue;
        }
        let source_line = index + 1;

        if is_trigger(statement) {
            sections.has_trigger = true;
            in_body = false;
        } else if let Some(payload) = block_payload(statement) {
            in_body = true;
            sections.body.push(BodyLine::Block {
                source_line,
                payload: payload.to_string(),
            });
        } else if in_body {
            sections.body.push(BodyLine::Operation {
                source_line,
                text: statement.to_string(),
            });
        } else {
            sections.header.push(statement.to_string());
        }
    }

    sections
}

/// Parses a single-file script or fragment back into a registry.
pub fn parse_script(source: &str) -> ProcessingResult<ParsedScript> {
    let sections = split_script(source);
    let mut parsed = ParsedScript {
        has_trigger: sections.has_trigger,
        ..ParsedScript::default()
    };

    for statement in &sections.header {
        parsed.header.push(OperationEntry::parse(statement)?);
    }

    let mut current: Option<DimensionSelector> = None;
    for line in sections.body {
        match line {
            BodyLine::Block {
                source_line,
                payload,
            } => {
                let selector = DimensionSelector::from_payload(&payload).map_err(|error| {
                    at_line(source_line, error)
                })?;
                current = Some(selector);
            }
            BodyLine::Operation { source_line, text } => {
                let selector = current.clone().ok_or_else(|| {
                    ProcessingError::input_validation(
                        "INPUT.SCRIPT",
                        format!("line {}: operation outside a DIM block", source_line),
                    )
                })?;
                let entry =
                    OperationEntry::parse(&text).map_err(|error| at_line(source_line, error))?;
                parsed.registry.push_operation(selector, entry);
            }
        }
    }

    Ok(parsed)
}

/// Parses a batch script. Each section ends with its `RUN()`; only a single
/// `MERGE(...)` may follow the last one. Line numbers in errors count from the
/// start of the whole script.
pub fn parse_batch_script(source: &str) -> ProcessingResult<ParsedBatchScript> {
    let lines: Vec<&str> = source.lines().collect();
    let mut batch = ParsedBatchScript::default();
    let mut start = 0;

    for (index, line) in lines.iter().enumerate() {
        if is_trigger(line.trim()) {
            batch.datasets.push(parse_script(&section_text(&lines, start, index + 1))?);
            start = index + 1;
        }
    }
    if batch.datasets.is_empty() {
        return Err(ProcessingError::input_validation(
            "INPUT.SCRIPT",
            "batch script has no RUN() section",
        ));
    }

    let footer = parse_script(&section_text(&lines, start, lines.len()))?;
    if !footer.registry.is_empty() {
        return Err(ProcessingError::input_validation(
            "INPUT.SCRIPT",
            "DIM blocks after the last RUN() are never executed",
        ));
    }
    let mut statements = footer.header.into_iter();
    batch.merge = statements.next();
    if let Some(statement) = batch
        .merge
        .as_ref()
        .filter(|entry| !entry.name().eq_ignore_ascii_case("MERGE"))
    {
        return Err(ProcessingError::input_validation(
            "INPUT.SCRIPT",
            format!("unexpected '{}' after the last RUN()", statement),
        ));
    }
    if let Some(extra) = statements.next() {
        return Err(ProcessingError::input_validation(
            "INPUT.SCRIPT",
            format!("unexpected '{}' after MERGE(...)", extra),
        ));
    }
    Ok(batch)
}

/// Lines `start..end` with the earlier lines blanked, so line numbers hold.
fn section_text(lines: &[&str], start: usize, end: usize) -> String {
    let mut text = "\n".repeat(start);
    for line in &lines[start..end] {
        text.push_str(line);
        text.push('\n');
    }
    text
}

fn is_trigger(statement: &str) -> bool {
    let compact: String = statement.chars().filter(|value| !value.is_whitespace()).collect();
    compact.eq_ignore_ascii_case(RUN_STATEMENT) || compact.eq_ignore_ascii_case("RUN")
}

fn block_payload(statement: &str) -> Option<&str> {
    let head = statement.get(..3)?;
    if !head.eq_ignore_ascii_case("DIM") {
        return None;
    }
    statement[3..]
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn at_line(source_line: usize, error: ProcessingError) -> ProcessingError {
    ProcessingError::input_validation(
        error.placeholder(),
        format!("line {}: {}", source_line, error.message()),
    )
}
