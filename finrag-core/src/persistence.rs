//! JSON artifacts on disk: evaluation summaries and question sets.

use crate::error::{RagError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Serialize `data` as 4-space indented JSON and write it atomically.
///
/// The JSON is written to a `.tmp` sibling and renamed over `path`, so a
/// reader never observes a half-written summary. Missing parent directories
/// are created.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut serializer)?;
    buf.push(b'\n');

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &buf)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read and deserialize a JSON file that must exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path).map_err(|e| {
        RagError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    Ok(serde_json::from_str(&data)?)
}
