//! Human-readable rendering of restore reports, dry-run plans and indexes.

use crate::index::{timestamp, Index};
use crate::restore::{Decision, PlannedItem, RestoreReport};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_restore_report(report: &RestoreReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Restore Summary")));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    let rows = [
        ("Snapshot", report.snapshot_id.clone()),
        ("Destination", report.destination.display().to_string()),
        ("Items", report.total.to_string()),
        ("Created", report.created.to_string()),
        ("Updated", report.updated.to_string()),
        ("Recreated", report.recreated.to_string()),
        ("Skipped", report.skipped.to_string()),
        ("Bytes written", report.bytes_written.to_string()),
        ("Elapsed", format!("{} ms", report.elapsed_ms)),
    ];
    for (label, value) in rows {
        table.add_row(vec![label.to_string(), value]);
    }
    out.push_str(&format!("{}\n", table));

    if !report.symlink_failures.is_empty() {
        out.push_str(&format!(
            "\n{}\n",
            format_section_heading("Symlinks not created")
        ));
        for failure in &report.symlink_failures {
            out.push_str(&format!("  {}\n", failure.yellow()));
        }
    }
    out
}

pub fn format_plan(items: &[PlannedItem]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Restore Plan")));
    if items.is_empty() {
        out.push_str("Index is empty; nothing to restore.\n");
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Decision", "Type", "Path"]);
    for item in items {
        table.add_row(vec![
            item.decision.label().to_string(),
            item.kind.to_string(),
            item.path.display().to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));

    let count = |d: Decision| items.iter().filter(|i| i.decision == d).count();
    out.push_str(&format!(
        "\n{} to create, {} to update, {} to recreate, {} unchanged\n",
        count(Decision::Create),
        count(Decision::UpdateMetadataOnly),
        count(Decision::RecreateContent),
        count(Decision::Skip),
    ));
    out
}

pub fn format_index(index: &Index) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("Snapshot {}", index.recovery_point_id))
    ));
    if index.is_empty() {
        out.push_str("No entries.\n");
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Type", "Mode", "Owner", "Chunks", "Modified", "Path"]);
    for node in index.nodes() {
        table.add_row(vec![
            node.kind_name().to_string(),
            format!("{:04o}", node.permissions()),
            format!("{}:{}", node.uid, node.gid),
            node.content().len().to_string(),
            timestamp::canonical(&node.mod_time),
            node.relative_path.display().to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out.push_str(&format!("\n{} entries\n", index.len()));
    out
}
