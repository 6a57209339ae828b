//! CLI output formatting for `build` and `check`.
//!
//! Output is information-centric: every topic is shown by title first, with
//! its id and page path as context. Problems are listed after the summary so
//! a clean run prints a single line.
//!
//! ## Build
//!
//! ```text
//! Index → index.html (12 cards)
//! Generated 41 of 43 topic pages
//!
//! Renamed
//!     Climate Talks (id b7) → topics/climate-talks-b7.html
//!
//! Skipped
//!     (untitled) (id x1)
//!
//! Failed
//!     Broken Topic (id q9)
//!         cannot serialize non-finite number
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 Climate Talks → topics/climate-talks.html
//! 002 Climate Talks → topics/climate-talks-b7.html (renamed from climate-talks)
//! 003 (untitled) → skipped
//!
//! 2 pages, 1 skipped, 1 renamed
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::TOPICS_DIR;
use crate::pipeline::{BuildPlan, BuildReport, SlugAssignment};

const INDENT: &str = "    ";

fn display_title(title: Option<&str>) -> &str {
    match title {
        Some(t) if !t.trim().is_empty() => t,
        _ => "(untitled)",
    }
}

fn page_path(slug: &str) -> String {
    format!("{TOPICS_DIR}/{slug}.html")
}

// ============================================================================
// Build
// ============================================================================

/// One-line summary of generated versus fetched pages.
pub fn format_build_summary(report: &BuildReport) -> String {
    format!(
        "Generated {} of {} topic pages",
        report.generated.len(),
        report.fetched
    )
}

/// Full build output: index line, summary, then renamed/skipped/failed lists.
pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![
        format!("Index → index.html ({} cards)", report.indexed),
        format_build_summary(report),
    ];

    if !report.renamed.is_empty() {
        lines.push(String::new());
        lines.push("Renamed".to_string());
        for renamed in &report.renamed {
            let title = report
                .generated
                .iter()
                .chain(report.failed.iter().map(|f| &f.entry))
                .find(|e| e.id == renamed.id && e.slug == renamed.to)
                .and_then(|e| e.title.as_deref());
            lines.push(format!(
                "{INDENT}{} (id {}) → {}",
                display_title(title),
                renamed.id,
                page_path(&renamed.to)
            ));
        }
    }

    if !report.skipped.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for entry in &report.skipped {
            lines.push(format!(
                "{INDENT}{} (id {})",
                display_title(entry.title.as_deref()),
                entry.id
            ));
        }
    }

    if !report.failed.is_empty() {
        lines.push(String::new());
        lines.push("Failed".to_string());
        for failed in &report.failed {
            lines.push(format!(
                "{INDENT}{} (id {})",
                display_title(failed.entry.title.as_deref()),
                failed.entry.id
            ));
            lines.push(format!("{INDENT}{INDENT}{}", failed.error));
        }
    }

    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Slug plan, one line per topic in fetch order, then a tally.
pub fn format_plan(plan: &BuildPlan) -> Vec<String> {
    let mut lines = Vec::new();
    let (mut pages, mut skipped, mut renamed) = (0, 0, 0);

    for (i, topic) in plan.topics.iter().enumerate() {
        let title = display_title(topic.title.as_deref());
        let target = match &topic.assignment {
            SlugAssignment::Page { slug } => {
                pages += 1;
                page_path(slug)
            }
            SlugAssignment::Renamed { base, slug } => {
                pages += 1;
                renamed += 1;
                format!("{} (renamed from {base})", page_path(slug))
            }
            SlugAssignment::Skipped { .. } => {
                skipped += 1;
                "skipped".to_string()
            }
        };
        lines.push(format!("{:03} {} → {}", i + 1, title, target));
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{pages} pages, {skipped} skipped, {renamed} renamed"
    ));
    lines
}

pub fn print_plan(plan: &BuildPlan) {
    for line in format_plan(plan) {
        println!("{}", line);
    }
}
