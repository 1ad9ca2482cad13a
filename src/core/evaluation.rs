//! Parsing of the evaluation backend's JSON answer.
//!
//! The backend is asked for a single JSON object but answers are often
//! wrapped in code fences or surrounded by prose. Anything that cannot be
//! read as an object degrades to [`Evaluation::fail_closed`], which is never
//! publishable.

use super::types::Platform;
use serde_json::{Map, Value};
use std::str::FromStr;

pub const PARSE_FAILED_SUMMARY: &str = "Analysis parsing failed. Please retry.";
/// Idea type assumed when the backend leaves `idea_type` out or blank.
pub const DEFAULT_IDEA_TYPE: &str = "essay";

/// Global evaluation of one piece of content.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub idea_type: String,
    /// 0–10 when the backend gave a usable number.
    pub novelty_score: Option<u8>,
    pub clarity_score: Option<u8>,
    pub publishable: bool,
    pub risk_level: String,
    pub summary: String,
    pub key_points: Vec<String>,
    /// `None` when the backend omitted the array entirely.
    pub platform_assessments: Option<Vec<PlatformAssessment>>,
}

/// Per-platform view of the same content. Every field except `platform` is
/// optional so that absent values can be inherited from the global record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlatformAssessment {
    pub platform: Option<Platform>,
    pub novelty_score: Option<u8>,
    pub clarity_score: Option<u8>,
    pub publishable: Option<bool>,
    pub risk_level: Option<String>,
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationParseError {
    #[error("no JSON object found in evaluation output")]
    NoObject,
    #[error("evaluation output is JSON but not an object")]
    NotAnObject,
}

impl Evaluation {
    /// Safe stand-in used whenever the backend output is unreadable.
    pub fn fail_closed() -> Self {
        Self {
            idea_type: DEFAULT_IDEA_TYPE.into(),
            novelty_score: Some(0),
            clarity_score: Some(0),
            publishable: false,
            risk_level: "unknown".into(),
            summary: PARSE_FAILED_SUMMARY.into(),
            key_points: Vec::new(),
            platform_assessments: Some(Vec::new()),
        }
    }

    /// Parse backend text, falling back to the fail-closed record.
    pub fn from_backend_text(text: &str) -> Self {
        match Self::parse(text) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    preview = %preview(text),
                    "evaluation output unreadable; using fail-closed record"
                );
                Self::fail_closed()
            }
        }
    }

    pub fn parse(text: &str) -> Result<Self, EvaluationParseError> {
        let object = locate_object(text)?;
        Ok(Self::from_object(&object))
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let platform_assessments = object
            .get("platform_assessments")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_object)
                    .map(PlatformAssessment::from_object)
                    .collect()
            });

        Self {
            idea_type: string_field(object, "idea_type")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|| DEFAULT_IDEA_TYPE.into()),
            novelty_score: object.get("novelty_score").and_then(coerce_score),
            clarity_score: object.get("clarity_score").and_then(coerce_score),
            publishable: object
                .get("publishable")
                .and_then(coerce_bool)
                .unwrap_or(false),
            risk_level: string_field(object, "risk_level")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|| "unknown".into()),
            summary: string_field(object, "summary").unwrap_or_default(),
            key_points: object
                .get("key_points")
                .map(coerce_string_list)
                .unwrap_or_default(),
            platform_assessments,
        }
    }
}

impl PlatformAssessment {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            platform: string_field(object, "platform").and_then(|p| Platform::from_str(&p).ok()),
            novelty_score: object.get("novelty_score").and_then(coerce_score),
            clarity_score: object.get("clarity_score").and_then(coerce_score),
            publishable: object.get("publishable").and_then(coerce_bool),
            risk_level: string_field(object, "risk_level").map(|s| s.to_lowercase()),
            summary: string_field(object, "summary"),
            key_points: object.get("key_points").map(coerce_string_list),
            reason: string_field(object, "reason"),
        }
    }

    /// True only for an explicit `publishable: false`.
    pub fn explicitly_rejects(&self) -> bool {
        self.publishable == Some(false)
    }
}

fn locate_object(text: &str) -> Result<Map<String, Value>, EvaluationParseError> {
    let stripped = strip_code_fence(text);
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return match value {
            Value::Object(map) => Ok(map),
            _ => Err(EvaluationParseError::NotAnObject),
        };
    }

    let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}')) else {
        return Err(EvaluationParseError::NoObject);
    };
    if end <= start {
        return Err(EvaluationParseError::NoObject);
    }
    match serde_json::from_str::<Value>(&stripped[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(EvaluationParseError::NotAnObject),
        Err(_) => Err(EvaluationParseError::NoObject),
    }
}

/// Remove a surrounding ```json ... ``` fence if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Integers, floats (truncated) and numeric strings within 0..=10.
fn coerce_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(truncate_f64))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(truncate_f64))?
        }
        _ => return None,
    };
    u8::try_from(raw).ok().filter(|score| *score <= 10)
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_f64(value: f64) -> i64 {
    if value.is_finite() {
        value.trunc() as i64
    } else {
        -1
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn coerce_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
