//! Truncation selector: fits clean text into a character budget
//!
//! Lines are kept by priority: table rows first, then list items, then lines
//! carrying a link or a data-file name. Remaining room goes to the other lines
//! in document order. When the table rows alone do not fit, or the text has no
//! prioritized lines, the first `budget` characters are kept instead.
//! The selection is pure: identical input always yields identical output.

use crate::crawler::PageContent;
use crate::url::mentions_data_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Table,
    List,
    LinkContext,
    Other,
}

fn classify(line: &str) -> LineKind {
    let trimmed = line.trim_start();

    if line.contains(" | ") {
        LineKind::Table
    } else if trimmed.starts_with("- ") || is_numbered_item(trimmed) {
        LineKind::List
    } else if line.contains("http://") || line.contains("https://") || mentions_data_file(line) {
        LineKind::LinkContext
    } else {
        LineKind::Other
    }
}

/// Matches `N. text`
fn is_numbered_item(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

/// Cost of a line inside the joined output: its characters plus the newline
fn cost(line: &str) -> usize {
    line.chars().count() + 1
}

/// Reduces `text` to at most `budget` characters
///
/// # Returns
///
/// `(text, truncated)` where `truncated` is true iff the returned text differs
/// from the input.
pub fn truncate_text(text: &str, budget: usize) -> (String, bool) {
    if text.chars().count() <= budget {
        return (text.to_string(), false);
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let kinds: Vec<LineKind> = lines.iter().map(|l| classify(l)).collect();

    // joined length = sum(cost) - 1, so the usable capacity is budget + 1
    let capacity = budget + 1;

    let table_cost: usize = lines
        .iter()
        .zip(&kinds)
        .filter(|(_, k)| **k == LineKind::Table)
        .map(|(l, _)| cost(l))
        .sum();

    let has_priority_lines = kinds.iter().any(|k| *k != LineKind::Other);
    if table_cost > capacity || !has_priority_lines {
        return (prefix(text, budget), true);
    }

    let mut selected = vec![false; lines.len()];
    let mut used = 0;

    for kind in [LineKind::Table, LineKind::List, LineKind::LinkContext] {
        let group: Vec<usize> = (0..lines.len())
            .filter(|&i| kinds[i] == kind && !selected[i])
            .collect();
        let group_cost: usize = group.iter().map(|&i| cost(lines[i])).sum();

        if used + group_cost <= capacity {
            for &i in &group {
                selected[i] = true;
            }
            used += group_cost;
        } else {
            used = select_greedily(&lines, &group, &mut selected, used, capacity);
        }
    }

    let others: Vec<usize> = (0..lines.len()).filter(|&i| !selected[i]).collect();
    select_greedily(&lines, &others, &mut selected, used, capacity);

    let kept: Vec<&str> = lines
        .iter()
        .zip(&selected)
        .filter(|(_, keep)| **keep)
        .map(|(l, _)| *l)
        .collect();
    let output = kept.join("\n");

    let truncated = output != text;
    (output, truncated)
}

/// Adds each candidate line that still fits, in document order
fn select_greedily(
    lines: &[&str],
    candidates: &[usize],
    selected: &mut [bool],
    mut used: usize,
    capacity: usize,
) -> usize {
    for &i in candidates {
        let c = cost(lines[i]);
        if used + c <= capacity {
            selected[i] = true;
            used += c;
        }
    }
    used
}

fn prefix(text: &str, budget: usize) -> String {
    text.chars().take(budget).collect()
}

impl PageContent {
    /// Returns the content with its text fitted into `budget` characters
    pub fn truncate(self, budget: usize) -> PageContent {
        let (clean_text, truncated) = truncate_text(&self.clean_text, budget);
        PageContent {
            clean_text,
            links: self.links,
            truncated: self.truncated || truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::TEXT_BUDGET;

    fn filler(n: usize) -> String {
        (0..n)
            .map(|i| format!("Paragraph {} of plain prose without anything special.", i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_short_text_unchanged() {
        let (out, truncated) = truncate_text("hello\nworld", TEXT_BUDGET);
        assert_eq!(out, "hello\nworld");
        assert!(!truncated);
    }

    #[test]
    fn test_exact_budget_unchanged() {
        let text = "x".repeat(100);
        let (out, truncated) = truncate_text(&text, 100);
        assert_eq!(out, text);
        assert!(!truncated);
    }

    #[test]
    fn test_plain_text_falls_back_to_prefix() {
        let text = filler(400);
        let (out, truncated) = truncate_text(&text, TEXT_BUDGET);
        assert!(truncated);
        assert_eq!(out.chars().count(), TEXT_BUDGET);
        assert!(text.starts_with(&out));
    }

    #[test]
    fn test_table_rows_kept_first() {
        let mut text = filler(300);
        text.push_str("\nName | Nodes | Edges\nroadNet-CA | 1965206 | 2766607");
        let (out, truncated) = truncate_text(&text, 2000);

        assert!(truncated);
        assert!(out.chars().count() <= 2000);
        assert!(out.contains("Name | Nodes | Edges"));
        assert!(out.contains("roadNet-CA | 1965206 | 2766607"));
    }

    #[test]
    fn test_priority_order_and_document_order() {
        let text = format!(
            "{}\n- list item\nsee https://example.com/x.csv\n{}\na | b",
            filler(50),
            filler(50)
        );
        let (out, _) = truncate_text(&text, 300);

        let list = out.find("- list item").unwrap();
        let link = out.find("see https://example.com/x.csv").unwrap();
        let table = out.find("a | b").unwrap();
        // kept lines stay in document order
        assert!(list < link && link < table);
        assert!(out.chars().count() <= 300);
    }

    #[test]
    fn test_oversized_table_falls_back_to_prefix() {
        let rows: Vec<String> = (0..500).map(|i| format!("row {} | value {}", i, i)).collect();
        let text = rows.join("\n");
        let (out, truncated) = truncate_text(&text, 1000);

        assert!(truncated);
        assert_eq!(out, text.chars().take(1000).collect::<String>());
    }

    #[test]
    fn test_numbered_items_are_list_lines() {
        assert_eq!(classify("12. twelfth"), LineKind::List);
        assert_eq!(classify("12 apples"), LineKind::Other);
        assert_eq!(classify("download edges.txt.gz"), LineKind::LinkContext);
    }

    #[test]
    fn test_bound_holds_for_varied_inputs() {
        let inputs = [
            filler(1000),
            "é".repeat(9000),
            format!("{}\n{}", "- item\n".repeat(2000), filler(10)),
            format!("{}\n{}", "a | b\n".repeat(100), filler(500)),
            "x | y".repeat(3000),
        ];

        for input in inputs {
            let (out, truncated) = truncate_text(&input, TEXT_BUDGET);
            assert!(out.chars().count() <= TEXT_BUDGET);
            assert_eq!(truncated, out != input);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = format!("{}\n- a\n- b\nx | y\n{}", filler(200), filler(200));
        assert_eq!(
            truncate_text(&text, TEXT_BUDGET),
            truncate_text(&text, TEXT_BUDGET)
        );
    }

    #[test]
    fn test_page_content_truncate_keeps_links() {
        let content = PageContent {
            clean_text: filler(400),
            links: vec!["https://example.com/a".to_string()],
            truncated: false,
        };

        let truncated = content.truncate(TEXT_BUDGET);
        assert!(truncated.truncated);
        assert_eq!(truncated.links.len(), 1);
    }
}
