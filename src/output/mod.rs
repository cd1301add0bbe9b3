//! Output module for terminal reports
//!
//! This module handles:
//! - The end-of-crawl summary
//! - Dataset listings, answers and manage results
//! - Human-readable sizes

mod report;

pub use report::{
    format_answer, format_crawl_summary, format_dataset_list, format_manage_outcome,
    print_answer, print_crawl_summary, print_manage_outcome,
};

/// Formats a byte count as `B`, `KB`, `MB` or `GB` with one decimal
///
/// # Examples
///
/// ```
/// use crawl_agent::output::format_size;
///
/// assert_eq!(format_size(512), "512B");
/// assert_eq!(format_size(1536), "1.5KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{}B", bytes)
    } else if b < MB {
        format!("{:.1}KB", b / KB)
    } else if b < GB {
        format!("{:.1}MB", b / MB)
    } else {
        format!("{:.1}GB", b / GB)
    }
}
