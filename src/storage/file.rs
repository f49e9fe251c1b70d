//! Dataset file read/write operations
//!
//! A dataset file is a single JSON document holding the transport form of
//! the classifier dataset. Files saved by the browser version of the app
//! wrap that document once more as a JSON string; both layouts are read.

use super::codec::{self, CodecError, TransportForm};
use crate::classifier::ClassifierDataset;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Default dataset file name
pub const DEFAULT_DATASET_FILE: &str = "model.json";

/// Dataset file errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Failed to persist dataset file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Read a dataset from a file
pub fn read_dataset(path: &Path) -> Result<ClassifierDataset, StorageError> {
    let mut content = fs::read_to_string(path)?;
    if let Some(inner) = unwrap_string_document(&content) {
        content = inner;
    }
    let dataset = codec::deserialize_str(&content)?;

    tracing::debug!(
        "Loaded dataset with {} classes from {:?}",
        dataset.num_classes(),
        path
    );

    Ok(dataset)
}

/// Double-encoded documents are a JSON string whose content is the document
fn unwrap_string_document(content: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(serde_json::Value::String(inner)) => Some(inner),
        _ => None,
    }
}

/// Write an already-encoded dataset to a file.
///
/// The content goes to a temporary file in the same directory first and is
/// then renamed over the destination, so readers never see a partial file.
pub fn write_form(form: &TransportForm, path: &Path) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    let mut staging = tempfile::NamedTempFile::new_in(dir)?;
    staging.write_all(form.as_str().as_bytes())?;
    staging.as_file().sync_all()?;
    staging.persist(path)?;

    tracing::debug!("Saved dataset ({} bytes) to {:?}", form.as_str().len(), path);

    Ok(())
}

/// Encode and write a dataset to a file
pub fn write_dataset(dataset: &ClassifierDataset, path: &Path) -> Result<(), StorageError> {
    let form = codec::serialize(dataset)?;
    write_form(&form, path)
}

/// Load a dataset for startup hydration.
///
/// A missing file means a fresh start. An unreadable or corrupt file is
/// logged and also yields an empty dataset.
pub fn load_or_empty(path: &Path) -> ClassifierDataset {
    if !path.exists() {
        tracing::info!("No dataset at {:?}, starting empty", path);
        return ClassifierDataset::new();
    }

    match read_dataset(path) {
        Ok(dataset) => {
            tracing::info!(
                "Hydrated {} classes ({} examples) from {:?}",
                dataset.num_classes(),
                dataset.len(),
                path
            );
            dataset
        }
        Err(e) => {
            tracing::warn!("Ignoring unusable dataset {:?}: {}", path, e);
            ClassifierDataset::new()
        }
    }
}
