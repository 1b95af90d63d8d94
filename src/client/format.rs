//! Output formatting for CLI client commands.
//!
//! Human-readable tables: favorites first, then the rest of the
//! history, each row carrying the entry id used by other commands.

use chrono::{Local, TimeZone};

use crate::history::search::FilteredView;
use crate::history::{EntryKind, IMAGE_LABEL, truncate_preview};
use crate::ipc::protocol::EntryDescriptor;

use super::daemon_client::ChangeEvent;

/// Characters of entry text shown per row.
pub const ROW_PREVIEW_CHARS: usize = 60;

/// Print a filtered history view in two sections.
pub fn print_history(view: &FilteredView<EntryDescriptor>, query: &str) {
    if !view.has_results() {
        if query.trim().is_empty() {
            println!("No clipboard history");
        } else {
            println!("No matches for \"{}\"", query.trim());
        }
        return;
    }

    if !view.favorites.is_empty() {
        println!("Favorites");
        print_rows(&view.favorites);
        if !view.others.is_empty() {
            println!();
        }
    }
    if !view.others.is_empty() {
        println!("History");
        print_rows(&view.others);
    }
    if !query.trim().is_empty() {
        println!("\n{} matching entries", view.len());
    }
}

fn print_rows(entries: &[EntryDescriptor]) {
    println!("{:>8} {:<19} PREVIEW", "ID", "COPIED");
    println!("{}", "-".repeat(80));
    for entry in entries {
        println!("{}", format_row(entry));
    }
}

/// Print a pushed change notification.
pub fn print_change(event: &ChangeEvent) {
    match &event.copied {
        Some(preview) => println!("Copied: {preview}"),
        None => println!(
            "History changed (revision {}, {} entries)",
            event.revision, event.len
        ),
    }
}

pub fn print_added(changed: bool) {
    if changed {
        println!("Added to history");
    } else {
        println!("History unchanged: already at the top, or no room beside favorites");
    }
}

pub fn print_favorite(entry: u64, favorite: bool) {
    if favorite {
        println!("Entry {entry} marked as favorite");
    } else {
        println!("Entry {entry} unmarked as favorite");
    }
}

pub fn print_removed(entry: u64) {
    println!("Entry {entry} removed");
}

pub fn print_missing(entry: u64) {
    println!("No entry {entry} in the history");
}

pub fn print_cleared(changed: bool) {
    if changed {
        println!("Clipboard history cleared");
    } else {
        println!("History was already empty");
    }
}

pub fn print_restored(entry: u64) {
    println!("Entry {entry} copied to clipboard");
}

pub fn print_exported(path: &str) {
    println!("History exported to {path}");
}

pub fn print_imported(count: u32) {
    println!("Imported {count} items");
}

/// One table row: id, capture time, single-line preview.
fn format_row(entry: &EntryDescriptor) -> String {
    format!(
        "{:>8} {:<19} {}",
        entry.entry,
        format_timestamp(entry.timestamp),
        row_preview(entry),
    )
}

fn row_preview(entry: &EntryDescriptor) -> String {
    let label = match (entry.kind, entry.text.as_deref()) {
        (EntryKind::Text, Some(text)) => {
            let flat: String = text
                .chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect();
            truncate_preview(&flat, ROW_PREVIEW_CHARS)
        }
        _ => IMAGE_LABEL.to_string(),
    };
    if entry.favorite {
        format!("* {label}")
    } else {
        label
    }
}

/// Local `YYYY-MM-DD HH:MM:SS` for epoch millis; `-` when unknown.
fn format_timestamp(millis: u64) -> String {
    if millis == 0 {
        return "-".to_string();
    }
    i64::try_from(millis)
        .ok()
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
