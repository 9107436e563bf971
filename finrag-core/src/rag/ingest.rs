//! Loading documents and question sets from disk.

use crate::error::{RagError, Result};
use crate::persistence::load_json;
use crate::types::{Document, SampleQuestion};
use std::path::{Path, PathBuf};

/// File extensions read as plain text.
const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "html", "htm"];

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read one file as a document whose id is derived from its path.
pub async fn load_file(path: &Path) -> Result<Document> {
    let text = tokio::fs::read_to_string(path).await?;
    let display = path.display().to_string();
    Ok(Document::new(text)
        .with_id(document_id_for(path))
        .with_source(display))
}

/// Stable id for a file so re-ingesting it replaces earlier chunks.
fn document_id_for(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// Load every supported file under the given files and directories.
///
/// Explicitly named files are read whatever their extension; directories are
/// walked recursively for supported extensions. Unreadable files are skipped
/// with a warning.
pub async fn load_documents(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .flatten()
            {
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(RagError::invalid_input(format!(
                "{} does not exist",
                path.display()
            )));
        }
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        match load_file(file).await {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Skipping file")
            }
        }
    }
    tracing::info!(
        files = files.len(),
        loaded = documents.len(),
        "Loaded documents"
    );
    Ok(documents)
}

/// Read a JSON array of `{"question", "answer"}` objects.
pub fn load_sample_questions(path: &Path) -> Result<Vec<SampleQuestion>> {
    load_json(path)
}
