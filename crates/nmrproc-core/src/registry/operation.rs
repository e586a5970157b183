//! Codec for operation statements of the form
//! `OPNAME(key=value, key2='quoted', key3=[list,of,values])`.

use crate::domain::{ProcessingError, ProcessingResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bare(String),
    Quoted(String),
    List(Vec<String>),
}

impl ArgValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Bare(value) | Self::Quoted(value) => Some(value),
            Self::List(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_text()?.trim().parse().ok()
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_text()?.trim().parse().ok()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.as_text()?.trim() {
            "1" | "true" | "True" => Some(true),
            "0" | "false" | "False" => Some(false),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    /// List items with their quotes removed, `None` if any item is not a
    /// plain or quoted value.
    pub fn as_text_list(&self) -> Option<Vec<String>> {
        self.as_list()?
            .iter()
            .map(|item| match parse_value(item).ok()? {
                Self::Bare(value) | Self::Quoted(value) => Some(value),
                Self::List(_) => None,
            })
            .collect()
    }
}

impl Display for ArgValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bare(value) => f.write_str(value),
            Self::Quoted(value) if !value.contains('\'') => write!(f, "'{}'", value),
            Self::Quoted(value) if !value.contains('"') => write!(f, "\"{}\"", value),
            Self::Quoted(value) => write!(f, "'{}'", value.replace('\'', "''")),
            Self::List(values) => write!(f, "[{}]", values.join(",")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationArg {
    pub key: String,
    pub value: ArgValue,
}

/// One processing statement: an operation name plus keyword arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationEntry {
    name: String,
    args: Vec<OperationArg>,
}

impl OperationEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: ArgValue) -> Self {
        self.args.push(OperationArg {
            key: key.into(),
            value,
        });
        self
    }

    pub fn parse(text: &str) -> ProcessingResult<Self> {
        let text = text.trim();
        let (name, rest) = match text.find('(') {
            Some(open) => (text[..open].trim(), Some(&text[open..])),
            None => (text, None),
        };

        if !is_identifier(name) {
            return Err(malformed(text, "operation name must be an identifier"));
        }

        let Some(rest) = rest else {
            return Ok(Self::new(name));
        };
        let Some(inner) = rest
            .strip_prefix('(')
            .and_then(|value| value.strip_suffix(')'))
        else {
            return Err(malformed(text, "argument list must end with ')'"));
        };

        let mut args = Vec::new();
        if !inner.trim().is_empty() {
            for piece in split_top_level(inner).map_err(|reason| malformed(text, reason))? {
                let Some((key, value)) = piece.split_once('=') else {
                    return Err(malformed(text, &format!("argument '{}' has no key", piece)));
                };
                let key = key.trim();
                if !is_identifier(key) {
                    return Err(malformed(text, &format!("invalid argument key '{}'", key)));
                }
                let value = parse_value(value.trim()).map_err(|reason| malformed(text, reason))?;
                args.push(OperationArg {
                    key: key.to_string(),
                    value,
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            args,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[OperationArg] {
        &self.args
    }

    pub fn arg(&self, key: &str) -> Option<&ArgValue> {
        self.args
            .iter()
            .find(|arg| arg.key == key)
            .map(|arg| &arg.value)
    }

    pub fn same_base_name(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }

    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl Display for OperationEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let args = self
            .args
            .iter()
            .map(|arg| format!("{}={}", arg.key, arg.value))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({})", self.name, args)
    }
}

impl FromStr for OperationEntry {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic() || first == '_')
        && chars.all(|value| value.is_ascii_alphanumeric() || value == '_')
}

/// Splits on commas that are outside quotes and brackets.
fn split_top_level(text: &str) -> Result<Vec<String>, &'static str> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0_usize;

    for value in text.chars() {
        match (quote, value) {
            (Some(open), _) if value == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(value),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => {
                depth = depth.checked_sub(1).ok_or("unbalanced closing bracket")?;
            }
            (None, ',') if depth == 0 => {
                pieces.push(current.trim().to_string());
                current.clear();
                continue;
            }
            (None, _) => {}
        }
        current.push(value);
    }

    if quote.is_some() {
        return Err("unterminated quoted string");
    }
    if depth != 0 {
        return Err("unbalanced opening bracket");
    }
    pieces.push(current.trim().to_string());
    if pieces.iter().any(String::is_empty) {
        return Err("empty argument");
    }
    Ok(pieces)
}

fn parse_value(text: &str) -> Result<ArgValue, &'static str> {
    if text.is_empty() {
        return Err("argument value is empty");
    }

    // A quote character inside a value of the same quoting is doubled.
    for (quote, doubled) in [('\'', "''"), ('"', "\"\"")] {
        if let Some(rest) = text.strip_prefix(quote) {
            return rest
                .strip_suffix(quote)
                .filter(|value| !value.replace(doubled, "").contains(quote))
                .map(|value| ArgValue::Quoted(value.replace(doubled, &quote.to_string())))
                .ok_or("quoted value is not closed");
        }
    }

    if let Some(inner) = text.strip_prefix('[') {
        let inner = inner.strip_suffix(']').ok_or("list value is not closed")?;
        if inner.trim().is_empty() {
            return Ok(ArgValue::List(Vec::new()));
        }
        return split_top_level(inner).map(ArgValue::List);
    }

    if text.contains(['\'', '"', '[', ']', '(', ')', '=']) {
        return Err("bare value contains reserved characters");
    }
    Ok(ArgValue::Bare(text.to_string()))
}

fn malformed(text: &str, reason: &str) -> ProcessingError {
    ProcessingError::input_validation(
        "INPUT.OPERATION",
        format!("malformed operation '{}': {}", text, reason),
    )
}
