//! Source file discovery and text extraction.

use std::path::{Path, PathBuf};

use tandem_core::{Error, Result};

/// Extensions the pipeline will pick up when scanning a directory.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["txt", "md", "pdf", "docx", "json"];

/// Discover ingestible files under `path`, recursively, sorted for
/// deterministic processing order. A plain file is returned as-is.
pub fn discover_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    collect_files(path, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Extract text content from a supported file.
///
/// `.txt`/`.md` are read as UTF-8. `.json` uses a top-level `content` string
/// when present, otherwise the pretty-printed value. `.pdf`/`.docx` have no
/// extractor wired in and fail with a validation error the pipeline records
/// per-file.
pub fn extract_text(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" => Ok(std::fs::read_to_string(path)?),
        "json" => {
            let raw = std::fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            if let Some(content) = value.get("content").and_then(|c| c.as_str()) {
                Ok(content.to_string())
            } else {
                Ok(serde_json::to_string_pretty(&value)?)
            }
        }
        "pdf" | "docx" => Err(Error::Validation(format!(
            "no text extractor available for .{ext}: {}",
            path.display()
        ))),
        other => Err(Error::Validation(format!(
            "unsupported file format: .{other}"
        ))),
    }
}
