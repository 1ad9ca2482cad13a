//! Plain-text extraction from uploaded documents.

use crate::error::ExtractError;
use serde_json::Value;
use std::path::Path;

/// Extracted text is capped at this many bytes.
pub const MAX_OUTPUT_BYTES: usize = 100_000;
const TRUNCATION_NOTICE: &str = "\n\n[Content truncated to 100 KB]";

const JSON_TEXT_KEYS: [&str; 5] = ["content", "text", "message", "body", "value"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Json,
    Csv,
}

impl DocumentFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self, ExtractError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "txt" | "md" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(ExtractError::Unsupported {
                extension: if extension.is_empty() {
                    "(none)".into()
                } else {
                    format!(".{extension}")
                },
            }),
        }
    }
}

/// Turn document bytes into prompt-ready text, dispatching on the file
/// extension.
pub fn extract_text(data: &[u8], file_name: &str) -> Result<String, ExtractError> {
    let text = match DocumentFormat::from_file_name(file_name)? {
        DocumentFormat::Text => decode(data),
        DocumentFormat::Json => extract_json(data)?,
        DocumentFormat::Csv => extract_csv(data),
    };
    Ok(truncate(text))
}

/// UTF-8 (BOM stripped), else Latin-1, which maps every byte.
fn decode(data: &[u8]) -> String {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => data.iter().map(|&b| char::from(b)).collect(),
    }
}

fn extract_json(data: &[u8]) -> Result<String, ExtractError> {
    let value: Value = serde_json::from_str(&decode(data))
        .map_err(|e| ExtractError::Malformed(format!("JSON parse error: {e}")))?;

    let mut texts = Vec::new();
    collect_text_fields(&value, &mut texts);
    if texts.is_empty() {
        return serde_json::to_string_pretty(&value)
            .map_err(|e| ExtractError::Malformed(e.to_string()));
    }
    Ok(texts.join("\n"))
}

fn collect_text_fields(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let is_text_key = JSON_TEXT_KEYS.contains(&key.to_lowercase().as_str());
                match val {
                    Value::String(s) if is_text_key && !s.trim().is_empty() => {
                        out.push(s.trim().to_string());
                    }
                    other => collect_text_fields(other, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text_fields(item, out)),
        _ => {}
    }
}

fn extract_csv(data: &[u8]) -> String {
    parse_csv_rows(&decode(data))
        .into_iter()
        .filter_map(|row| {
            let cells: Vec<&str> = row.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).collect();
            (!cells.is_empty()).then(|| cells.join(" | "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// RFC 4180 reader: quoted cells may contain commas, doubled quotes and
/// line breaks.
fn parse_csv_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if cell.is_empty() => in_quotes = true,
            (',', false) => row.push(std::mem::take(&mut cell)),
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n' | '\r', false) => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
            }
            (other, _) => cell.push(other),
        }
    }
    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    rows
}

fn truncate(mut text: String) -> String {
    if text.len() <= MAX_OUTPUT_BYTES {
        return text;
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(TRUNCATION_NOTICE);
    text
}
