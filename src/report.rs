use crate::baseline_file::{BaselineEntry, EntryStatus};
use crate::paths::TrackedPath;
use crate::reconcile::ScanResult;

pub fn print_scan(result: &ScanResult, show_unchanged: bool) {
    for line in format_scan(result, show_unchanged) {
        println!("{}", line);
    }
}

pub fn print_listing(entries: &[(TrackedPath, BaselineEntry)]) {
    for line in format_listing(entries) {
        println!("{}", line);
    }
}

/// One line per path, grouped by classification: changed (`M`), removed
/// (`R`), unknown (`?`, followed by the read error) and, if requested,
/// unchanged (`.`).
fn format_scan(result: &ScanResult, show_unchanged: bool) -> Vec<String> {
    let mut lines = Vec::new();

    for path in &result.changed {
        lines.push(format!("{:<2} {}", "M", path));
    }
    for path in &result.removed {
        lines.push(format!("{:<2} {}", "R", path));
    }
    for unreadable in &result.unknown {
        lines.push(format!("{:<2} {}", "?", unreadable.path));
        lines.push(format!("   error: {}", unreadable.reason));
    }
    if show_unchanged {
        for path in &result.unchanged {
            lines.push(format!("{:<2} {}", ".", path));
        }
    }

    lines
}

fn format_listing(entries: &[(TrackedPath, BaselineEntry)]) -> Vec<String> {
    entries
        .iter()
        .map(|(path, entry)| {
            format!(
                "{} {:<8} {}",
                entry.sha256.as_deref().unwrap_or("-"),
                status_label(entry.status),
                path
            )
        })
        .collect()
}

fn status_label(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Added => "added",
        EntryStatus::Accepted => "accepted",
        EntryStatus::Renamed => "renamed",
    }
}
