//! CSV export: snapshot → `Email,Timestamp,User Agent` spreadsheet file.

use std::path::Path;

use anyhow::{Context as _, Result};

use super::load_snapshot;

/// Render the snapshot at `input` as CSV at `output`.
///
/// Returns the number of exported entries, or `None` when there is no
/// snapshot to export.
pub fn export(input: &Path, output: &Path) -> Result<Option<usize>> {
    let Some(entries) = load_snapshot(input)? else {
        return Ok(None);
    };

    let mut csv = String::from("Email,Timestamp,User Agent\n");
    for entry in &entries {
        csv.push_str(&escape(&entry.email));
        csv.push(',');
        csv.push_str(&escape(&entry.registered_at));
        csv.push(',');
        csv.push_str(&escape(entry.client_info.as_deref().unwrap_or("")));
        csv.push('\n');
    }

    if let Some(dir) = output.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(output, csv)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(Some(entries.len()))
}

/// Quote a field when it contains a delimiter, quote, or newline.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
