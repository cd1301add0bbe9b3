use crate::url::{default_save_path, normalize_url};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub(crate) const INTENT_SYSTEM_PROMPT: &str = r#"You are a crawl assistant. Turn the user's instruction into crawl parameters.

Reply with a single JSON object:
{
  "url": "root URL to crawl, including http:// or https://",
  "save_path": "directory to save into, or null if the user did not name one",
  "criteria": "what kind of data should be downloaded",
  "max_depth": 2
}

Rules:
- url must be a complete http(s) URL
- leave save_path null unless the user names a location
- max_depth is a non-negative integer; use null if the user does not mention depth"#;

/// Validated crawl parameters extracted from a user instruction
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlIntent {
    pub url: String,
    pub save_path: PathBuf,
    pub criteria: String,
    pub max_depth: u32,
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    url: Option<String>,
    #[serde(default)]
    save_path: Option<String>,
    #[serde(default)]
    criteria: Option<String>,
    #[serde(default)]
    max_depth: Option<Value>,
}

/// Defaults applied when the model leaves a field out
#[derive(Debug, Clone)]
pub struct IntentDefaults<'a> {
    pub datasets_dir: &'a Path,
    pub max_depth: u32,
}

/// Validates a recovered intent object and fills in defaults
///
/// The URL is mandatory and must be absolute http(s). `max_depth` accepts a
/// non-negative integer (or a numeric string); anything else is a format error.
pub fn validate_intent(value: Value, defaults: &IntentDefaults<'_>) -> Result<CrawlIntent, String> {
    let raw: RawIntent =
        serde_json::from_value(value).map_err(|e| format!("intent does not match schema: {}", e))?;

    let url = raw
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| "intent is missing url".to_string())?;

    normalize_url(&url).map_err(|e| format!("intent url {:?} is not usable: {}", url, e))?;

    let save_path = raw
        .save_path
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| default_save_path(defaults.datasets_dir, &url));

    let criteria = raw
        .criteria
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "all datasets".to_string());

    let max_depth = match raw.max_depth {
        None | Some(Value::Null) => defaults.max_depth,
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|d| u32::try_from(d).ok())
            .ok_or_else(|| format!("max_depth must be a non-negative integer, got {}", n))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("max_depth must be a non-negative integer, got {:?}", s))?,
        Some(other) => return Err(format!("max_depth has unexpected type: {}", other)),
    };

    Ok(CrawlIntent {
        url,
        save_path,
        criteria,
        max_depth,
    })
}
