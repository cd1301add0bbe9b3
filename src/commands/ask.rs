//! `ask`: answer questions from the local dataset index

use crate::gateway::ChatClient;
use crate::storage::{DatasetEntry, DatasetIndex};
use crate::AgentError;
use tracing::{info, warn};

const ANSWER_SYSTEM_PROMPT: &str = "You are a dataset question-answering assistant. Answer the user's question using only the retrieved dataset information.

Rules:
1. Use only the retrieved information; never invent facts
2. Say so plainly when the information is insufficient
3. Keep the answer concise, under 200 words
4. When several datasets match, summarize and compare them";

/// Reply when the index has nothing relevant
pub const NOTHING_FOUND: &str =
    "No matching datasets were found in the local index. Run the crawl command first to collect some.";

const STOP_WORDS: &[&str] = &[
    // English
    "the", "a", "an", "is", "are", "was", "were", "be", "of", "to", "for", "in", "on", "at",
    "by", "with", "and", "or", "what", "how", "which", "where", "when", "who", "why", "many",
    "much", "does", "do", "did", "have", "has", "there", "any", "me", "show", "tell", "about",
    "it", "its", "this", "that", "these", "those", "can", "you", "i",
    // Chinese
    "的", "是", "在", "有", "和", "与", "了", "吗", "呢", "吧", "什么", "多少", "哪些", "怎么",
    "如何",
];

/// An answer and the entries it was drawn from
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<DatasetEntry>,
}

fn is_keyword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Splits a question into search keywords
///
/// Lowercases, splits on anything that is not an ASCII alphanumeric or CJK
/// ideograph, and drops stop words and single-character tokens.
pub fn extract_keywords(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .split(|c: char| !is_keyword_char(c))
        .filter(|w| w.chars().count() > 1)
        .filter(|w| !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Renders one entry as the fact block handed to the answer prompt
pub fn format_dataset_info(entry: &DatasetEntry) -> String {
    let mut parts = vec![
        format!("Name: {}", entry.name),
        format!(
            "Description: {}",
            if entry.description.is_empty() {
                "(none)"
            } else {
                entry.description.as_str()
            }
        ),
        format!("Path: {}", entry.local_path.display()),
        format!("Source: {}", entry.source_url),
    ];

    for (key, value) in &entry.properties {
        if !value.is_null() {
            parts.push(format!("{}: {}", key, value));
        }
    }

    if !entry.files.is_empty() {
        let names: Vec<&str> = entry.files.iter().map(|f| f.name.as_str()).collect();
        parts.push(format!("Files: {}", names.join(", ")));
    }

    parts.join("\n")
}

fn format_all(entries: &[DatasetEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| format!("[Dataset {}]\n{}", i + 1, format_dataset_info(e)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Answers a question from the index
///
/// # Arguments
///
/// * `client` - Chat client used to phrase the answer
/// * `index` - Dataset index to search
/// * `question` - The user's question
///
/// # Returns
///
/// * `Ok(Answer)` - An answer; when the chat call fails the retrieved entries
///   are rendered directly instead
/// * `Err(AgentError)` - The index could not be read
pub async fn run_ask(
    client: &dyn ChatClient,
    index: &dyn DatasetIndex,
    question: &str,
) -> Result<Answer, AgentError> {
    let keywords = extract_keywords(question);
    info!("Search keywords: {}", keywords.join(", "));

    let sources = index.search(&keywords)?;
    if sources.is_empty() {
        return Ok(Answer {
            text: NOTHING_FOUND.to_string(),
            sources,
        });
    }

    let facts = format_all(&sources);
    let header = format!(
        "Found {} matching dataset(s) in the local index:",
        sources.len()
    );
    let user_prompt = format!(
        "Question: {}\n\nRetrieved datasets:\n{}\n\nAnswer the question from this information. Begin with \"{}\"",
        question, facts, header
    );

    let text = match client.chat(ANSWER_SYSTEM_PROMPT, &user_prompt).await {
        Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
        Ok(_) => format!("{}\n\n{}", header, facts),
        Err(e) => {
            warn!("Answer generation failed, showing raw entries: {}", e);
            format!("{}\n\n{}", header, facts)
        }
    };

    Ok(Answer { text, sources })
}
