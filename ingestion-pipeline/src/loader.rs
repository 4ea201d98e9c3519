use std::path::{Path, PathBuf};

use common::{error::AppError, storage::types::document::Document};
use tracing::{debug, warn};

/// Loads all readable documents under `input_dir`, recursively. PDF content
/// goes through the specialized text-layer extractor; text-like files use
/// plain extraction; anything else is skipped with a warning.
///
/// Fails with `SourceNotFound` when the directory does not exist or yields
/// zero documents, which is reported rather than treated as success.
pub async fn load_documents(input_dir: &Path) -> Result<Vec<Document>, AppError> {
    if !input_dir.is_dir() {
        return Err(AppError::SourceNotFound(format!(
            "input directory '{}' does not exist",
            input_dir.display()
        )));
    }

    let mut files = collect_files(input_dir).await?;
    // Stable ingestion order regardless of directory iteration order.
    files.sort();

    let mut documents = Vec::new();
    for path in files {
        match extract_text(&path).await? {
            Some(text) if !text.trim().is_empty() => {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                debug!(file = %path.display(), bytes = text.len(), "loaded document");
                documents.push(Document::new(
                    file_name,
                    path.to_string_lossy().into_owned(),
                    text,
                ));
            }
            Some(_) => warn!(file = %path.display(), "document is empty; skipping"),
            None => {}
        }
    }

    if documents.is_empty() {
        return Err(AppError::SourceNotFound(format!(
            "no readable documents found in '{}'",
            input_dir.display()
        )));
    }

    Ok(documents)
}

async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Dispatches on the guessed MIME type. Returns `Ok(None)` for unsupported
/// file types.
async fn extract_text(path: &Path) -> Result<Option<String>, AppError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    match (mime.type_().as_str(), mime.subtype().as_str()) {
        ("application", "pdf") => Ok(Some(extract_pdf_text(path).await?)),
        ("text", _) => {
            let content = tokio::fs::read_to_string(path).await?;
            Ok(Some(content))
        }
        _ => {
            warn!(file = %path.display(), %mime, "unsupported file type; skipping");
            Ok(None)
        }
    }
}

/// Runs `pdf-extract` over the PDF bytes off the async executor.
async fn extract_pdf_text(path: &Path) -> Result<String, AppError> {
    let pdf_bytes = tokio::fs::read(path).await?;
    let display = path.display().to_string();

    let extraction = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&pdf_bytes).map(|s| s.trim().to_string())
    })
    .await?
    .map_err(|err| {
        AppError::IngestionFailed(format!("failed to extract text from PDF '{display}': {err}"))
    })?;

    Ok(extraction)
}
