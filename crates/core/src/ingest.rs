use crate::{IngestError, SourceDocument};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Expands folders into the PDFs they contain; files are kept as given and
/// in the given order.
pub fn resolve_pdf_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            files.extend(discover_pdf_files(input));
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            return Err(IngestError::InvalidArgument(format!(
                "no such file or folder: {}",
                input.display()
            )));
        }
    }

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(
            "no pdf files found in the given inputs".to_string(),
        ));
    }

    Ok(files)
}

pub async fn load_documents(paths: &[PathBuf]) -> Result<Vec<SourceDocument>, IngestError> {
    let mut documents = Vec::with_capacity(paths.len());

    for path in paths {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let document = SourceDocument::new(name, bytes);

        debug!(path = %path.display(), checksum = %document.checksum, "document loaded");
        documents.push(document);
    }

    Ok(documents)
}
