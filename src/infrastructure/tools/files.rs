//! # File Manager
//!
//! Read, write, delete, list, and inspect files. Every call passes through the
//! `PathPolicy` before any I/O and comes back as a `FileOperation` record.

use chrono::{DateTime, Local};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use crate::domain::config::FilesConfig;
use crate::domain::error::OperationError;
use crate::domain::payload::{
    DirectoryListing, FileContent, FileEntry, FileInfo, Payload, WriteSummary,
};
use crate::domain::types::FileOperation;
use crate::infrastructure::tools::policy::PathPolicy;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone)]
pub struct FileManager {
    policy: PathPolicy,
    max_file_size_bytes: u64,
}

impl FileManager {
    pub fn new(policy: PathPolicy, max_file_size_bytes: u64) -> Self {
        tracing::info!(
            "FileManager initialized with {} allowed paths",
            policy.allowed().len()
        );
        tracing::debug!("Restricted paths: {:?}", policy.restricted());
        Self {
            policy,
            max_file_size_bytes,
        }
    }

    pub fn from_config(config: &FilesConfig) -> Self {
        let policy = PathPolicy::new(&config.allowed_paths, config.restricted_paths.as_deref());
        Self::new(policy, config.max_file_size_bytes())
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    fn check(&self, path: &str) -> Result<PathBuf, OperationError> {
        self.policy
            .validate(path)
            .map_err(|v| OperationError::validation(v.to_string()))
    }

    fn max_mb(&self) -> f64 {
        self.max_file_size_bytes as f64 / BYTES_PER_MB
    }

    pub async fn read_file(&self, file_path: &str, encoding: &str) -> FileOperation {
        tracing::info!("Reading file: {}", file_path);
        let outcome = self.read_inner(file_path, encoding).await;
        finish("read", file_path, outcome)
    }

    async fn read_inner(&self, file_path: &str, encoding: &str) -> Result<Payload, OperationError> {
        let path = self.check(file_path)?;
        let meta = stat(&path)
            .await?
            .ok_or_else(|| OperationError::not_found(format!("File does not exist: {}", file_path)))?;
        if !meta.is_file() {
            return Err(OperationError::validation(format!(
                "Path is not a file: {}",
                file_path
            )));
        }

        let size = meta.len();
        if size > self.max_file_size_bytes {
            return Err(OperationError::validation(format!(
                "File too large: {:.2} MB (max: {} MB)",
                size as f64 / BYTES_PER_MB,
                self.max_mb()
            )));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| OperationError::io("Error reading file", e))?;
        let content = decode(&bytes, encoding)?;

        tracing::info!("Successfully read file: {} ({} bytes)", file_path, size);
        Ok(Payload::FileContent(FileContent {
            content,
            size_bytes: size,
            encoding: encoding.to_string(),
        }))
    }

    pub async fn write_file(
        &self,
        file_path: &str,
        content: &str,
        encoding: &str,
        create_dirs: bool,
        overwrite: bool,
    ) -> FileOperation {
        tracing::info!("Writing file: {} (overwrite={})", file_path, overwrite);
        let outcome = self
            .write_inner(file_path, content, encoding, create_dirs, overwrite)
            .await;
        finish("write", file_path, outcome)
    }

    async fn write_inner(
        &self,
        file_path: &str,
        content: &str,
        encoding: &str,
        create_dirs: bool,
        overwrite: bool,
    ) -> Result<Payload, OperationError> {
        let path = self.check(file_path)?;

        let existed = stat(&path).await?.is_some();
        if existed && !overwrite {
            return Err(OperationError::validation(format!(
                "File already exists and overwrite=false: {}",
                file_path
            )));
        }

        let bytes = encode(content, encoding)?;
        let size = bytes.len() as u64;
        if size > self.max_file_size_bytes {
            return Err(OperationError::validation(format!(
                "Content too large: {:.2} MB (max: {} MB)",
                size as f64 / BYTES_PER_MB,
                self.max_mb()
            )));
        }

        if create_dirs {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| OperationError::io("Error creating directories", e))?;
            }
        }

        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| OperationError::io("Error writing file", e))?;

        tracing::info!("Successfully wrote file: {} ({} bytes)", file_path, size);
        Ok(Payload::FileWritten(WriteSummary {
            size_bytes: size,
            encoding: encoding.to_string(),
            overwritten: existed,
        }))
    }

    pub async fn delete_file(&self, file_path: &str, confirm: bool) -> FileOperation {
        tracing::info!("Deleting file: {} (confirm={})", file_path, confirm);
        let outcome = self.delete_inner(file_path, confirm).await;
        finish("delete", file_path, outcome)
    }

    async fn delete_inner(&self, file_path: &str, confirm: bool) -> Result<Payload, OperationError> {
        if !confirm {
            return Err(OperationError::validation(
                "Delete operation requires confirmation",
            ));
        }

        let path = self.check(file_path)?;
        let meta = stat(&path)
            .await?
            .ok_or_else(|| OperationError::not_found(format!("File does not exist: {}", file_path)))?;
        if !meta.is_file() {
            return Err(OperationError::validation(format!(
                "Path is not a file: {}",
                file_path
            )));
        }

        let size = meta.len();
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| OperationError::io("Error deleting file", e))?;

        tracing::info!("Successfully deleted file: {}", file_path);
        Ok(Payload::FileDeleted { size_bytes: size })
    }

    pub async fn list_directory(&self, dir_path: &str, pattern: &str) -> FileOperation {
        tracing::info!("Listing directory: {} (pattern={})", dir_path, pattern);
        let outcome = self.list_inner(dir_path, pattern).await;
        finish("list", dir_path, outcome)
    }

    async fn list_inner(&self, dir_path: &str, pattern: &str) -> Result<Payload, OperationError> {
        let dir = self.check(dir_path)?;
        let meta = stat(&dir).await?.ok_or_else(|| {
            OperationError::not_found(format!("Directory does not exist: {}", dir_path))
        })?;
        if !meta.is_dir() {
            return Err(OperationError::validation(format!(
                "Path is not a directory: {}",
                dir_path
            )));
        }

        let full_pattern = format!(
            "{}{}{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            std::path::MAIN_SEPARATOR,
            pattern
        );
        let matches = glob::glob(&full_pattern)
            .map_err(|e| OperationError::validation(format!("Invalid pattern: {}", e)))?;

        let mut files = Vec::new();
        for entry in matches.flatten() {
            // A pattern such as `../*` must not list outside the policy.
            if let Err(violation) = self.policy.validate(&entry) {
                tracing::warn!("Skipping {}: {}", entry.display(), violation);
                continue;
            }
            // Entries can vanish between the glob and the stat.
            let Ok(meta) = tokio::fs::metadata(&entry).await else {
                continue;
            };
            files.push(FileEntry {
                name: entry
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: entry.to_string_lossy().into_owned(),
                is_file: meta.is_file(),
                is_dir: meta.is_dir(),
                size_bytes: meta.is_file().then(|| meta.len()),
                modified: meta.modified().ok().map(DateTime::<Local>::from),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(
            "Successfully listed directory: {} ({} items)",
            dir_path,
            files.len()
        );
        Ok(Payload::DirectoryListing(DirectoryListing {
            count: files.len(),
            files,
            pattern: pattern.to_string(),
        }))
    }

    pub async fn get_file_info(&self, file_path: &str) -> FileOperation {
        tracing::info!("Getting file info: {}", file_path);
        let outcome = self.info_inner(file_path).await;
        finish("info", file_path, outcome)
    }

    async fn info_inner(&self, file_path: &str) -> Result<Payload, OperationError> {
        let path = self.check(file_path)?;
        let meta = stat(&path)
            .await?
            .ok_or_else(|| OperationError::not_found(format!("Path does not exist: {}", file_path)))?;

        Ok(Payload::FileInfo(FileInfo {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_string_lossy().into_owned(),
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
            size_bytes: meta.len(),
            created: meta.created().ok().map(DateTime::<Local>::from),
            modified: meta.modified().ok().map(DateTime::<Local>::from),
            accessed: meta.accessed().ok().map(DateTime::<Local>::from),
        }))
    }
}

fn finish(
    operation: &'static str,
    path: &str,
    outcome: Result<Payload, OperationError>,
) -> FileOperation {
    FileOperation::from_outcome(operation, path, outcome)
}

/// `Ok(None)` when the path does not exist.
async fn stat(path: &Path) -> Result<Option<Metadata>, OperationError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(
            OperationError::PermissionDenied(format!("Permission denied: {}", path.display())),
        ),
        Err(e) => Err(OperationError::io(format!("Cannot stat {}", path.display()), e)),
    }
}

fn normalize_encoding(encoding: &str) -> String {
    encoding.trim().to_ascii_lowercase().replace('_', "-")
}

fn decode(bytes: &[u8], encoding: &str) -> Result<String, OperationError> {
    match normalize_encoding(encoding).as_str() {
        "utf-8" | "utf8" => String::from_utf8(bytes.to_vec()).map_err(|e| {
            OperationError::validation(format!("Error reading file: invalid utf-8 ({})", e))
        }),
        "utf-8-lossy" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        "ascii" => {
            if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                return Err(OperationError::validation(format!(
                    "Error reading file: non-ascii byte at offset {}",
                    pos
                )));
            }
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
        "latin-1" | "latin1" | "iso-8859-1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        other => Err(OperationError::validation(format!(
            "Unsupported encoding: {}",
            other
        ))),
    }
}

fn encode(content: &str, encoding: &str) -> Result<Vec<u8>, OperationError> {
    match normalize_encoding(encoding).as_str() {
        "utf-8" | "utf8" | "utf-8-lossy" => Ok(content.as_bytes().to_vec()),
        "ascii" => {
            if !content.is_ascii() {
                return Err(OperationError::validation(
                    "Content cannot be encoded as ascii",
                ));
            }
            Ok(content.as_bytes().to_vec())
        }
        "latin-1" | "latin1" | "iso-8859-1" => content
            .chars()
            .map(|c| u8::try_from(u32::from(c)).ok())
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| OperationError::validation("Content cannot be encoded as latin-1")),
        other => Err(OperationError::validation(format!(
            "Unsupported encoding: {}",
            other
        ))),
    }
}
