use crate::url::{is_download_url, normalize_url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use tracing::debug;

pub(crate) const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a dataset analysis assistant. Given a page's text and its links, pick the data files that match the user's criteria and the pages worth following.

Reply with a single JSON object:
{
  "resources": [
    {
      "name": "dataset name",
      "description": "short description",
      "download_urls": ["URL copied from DOWNLOAD_LINKS"],
      "properties": { "nodes": 100, "edges": null, "directed": null }
    }
  ],
  "follow_links": ["URL copied from PAGE_LINKS"]
}

Rules:
1. download_urls must be copied verbatim from DOWNLOAD_LINKS
2. follow_links must be copied verbatim from PAGE_LINKS
3. properties may only contain values stated on the page; use null when absent
4. return empty arrays when nothing matches"#;

/// A downloadable data artifact the gateway found on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub download_urls: Vec<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Validated page-analysis result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageAnalysis {
    pub resources: Vec<ResourceDescriptor>,

    /// Subset of the offered links, in the offered spelling
    pub follow_links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    resources: Vec<RawResource>,
    follow_links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    name: String,
    #[serde(default)]
    description: Option<String>,
    download_urls: Vec<String>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

/// Builds the user prompt for page analysis
///
/// Links are numbered and split into DOWNLOAD_LINKS and PAGE_LINKS by the
/// data-file extension allowlist.
pub fn build_analysis_prompt(text: &str, links: &[String], criteria: &str) -> String {
    let (downloads, pages): (Vec<&String>, Vec<&String>) =
        links.iter().partition(|link| is_download_url(link));

    let mut prompt = String::new();
    let _ = writeln!(prompt, "Page content:\n{}\n", text);

    let _ = writeln!(prompt, "=== DOWNLOAD_LINKS ===");
    write_numbered(&mut prompt, &downloads);

    let _ = writeln!(prompt, "\n=== PAGE_LINKS ===");
    write_numbered(&mut prompt, &pages);

    let _ = write!(prompt, "\nCriteria: {}", criteria);
    prompt
}

fn write_numbered(prompt: &mut String, links: &[&String]) {
    if links.is_empty() {
        let _ = writeln!(prompt, "  (none)");
        return;
    }
    for (i, link) in links.iter().enumerate() {
        let _ = writeln!(prompt, "  [{}] {}", i, link);
    }
}

/// Validates a recovered page-analysis object against the links offered
///
/// # Arguments
///
/// * `value` - JSON object recovered from the reply
/// * `offered_links` - The links sent in the prompt
///
/// # Returns
///
/// * `Ok(PageAnalysis)` - Schema matched; untrusted entries have been filtered
/// * `Err(String)` - Schema mismatch (a format error, eligible for one retry)
///
/// Download URLs that fail the extension allowlist are dropped, and resources
/// left with none are dropped. Follow links are kept only when their normalized
/// form equals that of an offered link.
pub fn validate_analysis(value: Value, offered_links: &[String]) -> Result<PageAnalysis, String> {
    let raw: RawAnalysis = serde_json::from_value(value)
        .map_err(|e| format!("analysis does not match schema: {}", e))?;

    let mut resources = Vec::new();
    for res in raw.resources {
        let mut seen = HashSet::new();
        let download_urls: Vec<String> = res
            .download_urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| {
                let ok = is_download_url(u);
                if !ok {
                    debug!("Dropping non-file download url {} for {}", u, res.name);
                }
                ok
            })
            .filter(|u| seen.insert(u.clone()))
            .collect();

        if download_urls.is_empty() {
            debug!("Dropping resource {} with no valid download urls", res.name);
            continue;
        }

        resources.push(ResourceDescriptor {
            name: res.name,
            description: res.description.unwrap_or_default(),
            download_urls,
            properties: res.properties.unwrap_or_default(),
        });
    }

    let offered: HashMap<String, &String> = offered_links
        .iter()
        .filter_map(|link| normalize_url(link).ok().map(|key| (key, link)))
        .collect();

    let mut seen = HashSet::new();
    let mut follow_links = Vec::new();
    for link in raw.follow_links {
        let matched = normalize_url(link.trim()).ok().and_then(|key| {
            let original = offered.get(&key).copied()?;
            Some((key, original))
        });

        match matched {
            Some((key, original)) => {
                if seen.insert(key) {
                    follow_links.push(original.clone());
                }
            }
            None => debug!("Dropping follow link not offered to the gateway: {}", link),
        }
    }

    Ok(PageAnalysis {
        resources,
        follow_links,
    })
}
