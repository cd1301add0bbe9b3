use serde_json::Value;

/// Recovers a JSON object from free-form model output
///
/// Tried in order: the whole text, the first fenced ```json block, the span
/// from the first `{` to the last `}`. Returns `None` if none of them parse to
/// a JSON object.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Some(value) = parse_object(trimmed) {
        return Some(value);
    }

    if let Some(value) = fenced_block(trimmed).and_then(parse_object) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&trimmed[start..=end])
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```json")?;
    let body = &text[open + "```json".len()..];
    let close = body.find("```")?;
    Some(&body[..close])
}
