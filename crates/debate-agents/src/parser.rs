use std::str::FromStr;

use debate_models::{max_position_size, AnalystReply, Decision};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::AgentError;

/// Extract the first JSON object from a string that may contain surrounding text.
///
/// Handles the usual LLM reply shapes:
/// - Clean JSON: `{"key": "value"}`
/// - Markdown-wrapped: ```json\n{"key": "value"}\n```
/// - Prefix text: `Here is my report:\n{"key": "value"}`
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    if let Some(json_str) = extract_from_markdown_block(trimmed) {
        if serde_json::from_str::<Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    if let Some(json_str) = extract_first_object(trimmed) {
        if serde_json::from_str::<Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    Err(AgentError::Parse(format!(
        "No valid JSON object found in response (length={})",
        text.len()
    )))
}

fn extract_from_markdown_block(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for marker in &start_markers {
        if let Some(start) = text.find(marker) {
            let json_start = start + marker.len();
            if let Some(end) = text[json_start..].find("```") {
                return Some(text[json_start..json_start + end].trim().to_string());
            }
        }
    }

    None
}

/// Find the first balanced { ... } in the text, ignoring braces inside strings.
fn extract_first_object(text: &str) -> Option<String> {
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// Turn raw analyst output into an [`AnalystReply`].
///
/// The JSON must carry `decision` (one of the stored labels), `positionsize`
/// (a non-negative number, plain or quoted) and a non-empty `content`.
/// `position` is optional. Nothing else is inferred from the free text.
pub fn parse_analyst_reply(raw: &str) -> Result<AnalystReply, AgentError> {
    let json_str = extract_json(raw)?;
    let value: Value = serde_json::from_str(&json_str)?;
    let obj = value
        .as_object()
        .ok_or_else(|| AgentError::Parse("reply is not a JSON object".to_string()))?;

    let decision_text = obj
        .get("decision")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::Parse("missing string field: decision".to_string()))?;
    let decision = Decision::from_str(decision_text)
        .map_err(|e| AgentError::Parse(e.to_string()))?;
    if decision.vote().is_none() {
        return Err(AgentError::Parse(format!(
            "'{decision}' is not a decision an analyst can make"
        )));
    }

    let positionsize = match obj.get("positionsize") {
        Some(Value::Number(n)) => parse_size(&n.to_string())?,
        Some(Value::String(s)) => parse_size(s.trim())?,
        Some(other) => {
            return Err(AgentError::Parse(format!(
                "positionsize must be a number, got {other}"
            )))
        }
        None => return Err(AgentError::Parse("missing field: positionsize".to_string())),
    };

    let position = match obj.get("position") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            return Err(AgentError::Parse(format!(
                "position must be a boolean, got {other}"
            )))
        }
    };

    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AgentError::Parse("missing or empty field: content".to_string()))?;

    Ok(AnalystReply {
        decision,
        positionsize,
        position,
        content: content.to_string(),
    })
}

fn parse_size(text: &str) -> Result<Decimal, AgentError> {
    let size = Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| AgentError::Parse(format!("positionsize '{text}': {e}")))?;
    if size < Decimal::ZERO {
        return Err(AgentError::Parse(format!(
            "positionsize must be non-negative, got {size}"
        )));
    }
    if size > max_position_size() {
        return Err(AgentError::Parse(format!(
            "positionsize {size} exceeds the share limit"
        )));
    }
    Ok(size)
}
