//! Terminal reports for crawl summaries, dataset listings and command results

use crate::commands::{Answer, ManageOutcome};
use crate::crawler::CrawlSummary;
use crate::output::format_size;
use crate::storage::DatasetEntry;
use std::fmt::Write;

/// Errors listed before the rest are elided
const MAX_ERRORS_SHOWN: usize = 10;

/// Formats the end-of-crawl report
pub fn format_crawl_summary(summary: &CrawlSummary) -> String {
    let mut out = String::new();

    let title = if summary.interrupted {
        "=== Crawl Interrupted ==="
    } else {
        "=== Crawl Complete ==="
    };
    let _ = writeln!(out, "{}\n", title);

    let _ = writeln!(out, "Target:");
    let _ = writeln!(out, "  Root URL: {}", summary.root_url);
    let _ = writeln!(out, "  Save path: {}", summary.save_path.display());
    let _ = writeln!(out, "  Max depth: {}", summary.max_depth);
    let _ = writeln!(out);

    let _ = writeln!(out, "Results:");
    let _ = writeln!(out, "  Pages visited: {}", summary.pages_visited);
    let _ = writeln!(out, "  Resources found: {}", summary.resources_found);
    let _ = writeln!(out, "  Resources downloaded: {}", summary.resources_downloaded);
    let _ = writeln!(
        out,
        "  Index: {} added, {} updated",
        summary.datasets_added, summary.datasets_updated
    );
    let _ = writeln!(out, "  Duration: {:.1}s", summary.duration.as_secs_f64());

    if !summary.errors.is_empty() {
        let _ = writeln!(out, "\nErrors ({}):", summary.errors.len());
        for error in summary.errors.iter().take(MAX_ERRORS_SHOWN) {
            let _ = writeln!(out, "  - {}", error);
        }
        if summary.errors.len() > MAX_ERRORS_SHOWN {
            let _ = writeln!(
                out,
                "  ... and {} more",
                summary.errors.len() - MAX_ERRORS_SHOWN
            );
        }
    }

    if summary.interrupted {
        let _ = writeln!(
            out,
            "\nProgress was saved; run the same instruction again to continue."
        );
    }

    out
}

/// Formats the index as a numbered list
pub fn format_dataset_list(datasets: &[DatasetEntry]) -> String {
    if datasets.is_empty() {
        return "No datasets in the index yet.\n".to_string();
    }

    let mut out = format!("Datasets ({}):\n", datasets.len());
    for (i, dataset) in datasets.iter().enumerate() {
        let _ = writeln!(out, "\n{}. {}", i + 1, dataset.name);
        if !dataset.description.is_empty() {
            let _ = writeln!(out, "   {}", dataset.description);
        }
        let _ = writeln!(out, "   Path: {}", dataset.local_path.display());
        let _ = writeln!(
            out,
            "   Files: {} ({})",
            dataset.files.len(),
            format_size(dataset.total_size())
        );
        let _ = writeln!(
            out,
            "   Crawled: {}",
            dataset.crawl_time.format("%Y-%m-%d %H:%M UTC")
        );
    }
    out
}

/// Formats an answer followed by the datasets it drew on
pub fn format_answer(answer: &Answer) -> String {
    let mut out = format!("{}\n", answer.text);
    if !answer.sources.is_empty() {
        let _ = writeln!(out, "\nSources:");
        for source in &answer.sources {
            let _ = writeln!(out, "  - {} ({})", source.name, source.local_path.display());
        }
    }
    out
}

/// Formats the result of a manage action
pub fn format_manage_outcome(outcome: &ManageOutcome) -> String {
    match outcome {
        ManageOutcome::Listed(datasets) => format_dataset_list(datasets),
        ManageOutcome::Moved {
            source,
            target,
            items,
            reindexed,
        } => format!(
            "Moved {} item(s) from {} to {}; {} index entr{} updated\n",
            items,
            source.display(),
            target.display(),
            reindexed,
            if *reindexed == 1 { "y" } else { "ies" }
        ),
        ManageOutcome::Copied { source, target } => {
            format!("Copied {} to {}\n", source.display(), target.display())
        }
        ManageOutcome::Deleted { path, unindexed } => format!(
            "Deleted {}; {} index entr{} removed\n",
            path.display(),
            unindexed,
            if *unindexed == 1 { "y" } else { "ies" }
        ),
        ManageOutcome::Cancelled => "Cancelled; nothing was changed.\n".to_string(),
    }
}

pub fn print_crawl_summary(summary: &CrawlSummary) {
    print!("{}", format_crawl_summary(summary));
}

pub fn print_answer(answer: &Answer) {
    print!("{}", format_answer(answer));
}

pub fn print_manage_outcome(outcome: &ManageOutcome) {
    print!("{}", format_manage_outcome(outcome));
}
