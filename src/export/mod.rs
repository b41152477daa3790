//! Offline reporting tools (`galaksiod export ...`).
//!
//! Both exporters read the same input: a flat JSON snapshot of all entries
//! (`data/waitlist.json`, an array of `WaitlistEntry` records). A missing
//! snapshot means an empty waitlist, not a failure — the tools say so and
//! exit cleanly.

pub mod csv;
pub mod notion;

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::waitlist::WaitlistEntry;

pub const DEFAULT_SNAPSHOT_PATH: &str = "data/waitlist.json";

/// Read the snapshot file. `Ok(None)` when the file does not exist.
pub fn load_snapshot(path: &Path) -> Result<Option<Vec<WaitlistEntry>>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()))
        }
    };
    let entries: Vec<WaitlistEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("malformed snapshot at {}", path.display()))?;
    Ok(Some(entries))
}
