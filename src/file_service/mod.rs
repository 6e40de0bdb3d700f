//! Generic durable-write primitive shared by every file-backed store.
//!
//! Pure bytes-in/bytes-out: this layer knows nothing about JSON schemas or
//! entity types. Writes are full rewrites (truncate, write at offset zero,
//! flush, close); a partial truncate-without-write is an accepted crash
//! window, not mitigated here.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::errors::AppError;

/// Subdirectory backups are written under.
const BACKUP_DIR: &str = "backup";

/// Writer for one logical file, parameterized by base name and extension.
#[derive(Debug, Clone)]
pub struct FileWriter {
    name: String,
    ext: String,
}

impl FileWriter {
    pub fn new(name: &str, ext: &str) -> Self {
        Self {
            name: name.to_string(),
            ext: ext.to_string(),
        }
    }

    /// The primary file name, `<name>.<ext>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.ext)
    }

    /// Backup file name with an ISO-8601 timestamp baked in.
    pub fn backup_file_name(&self) -> String {
        format!(
            "{}_backup_{}.{}",
            self.name,
            Utc::now().to_rfc3339(),
            self.ext
        )
    }

    /// Full path of the primary file under `dir`.
    pub fn file_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Ensure `dir` exists, then open-or-create the target file in
    /// append+read mode.
    pub async fn make_file_handle(
        &self,
        dir: &Path,
        name: Option<&str>,
    ) -> Result<File, AppError> {
        tokio::fs::create_dir_all(dir).await?;
        let target = dir.join(name.map(str::to_string).unwrap_or_else(|| self.file_name()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&target)
            .await?;
        Ok(file)
    }

    /// Truncate to zero length, write `content` at offset zero, close.
    ///
    /// Any failing step aborts the remaining steps and propagates the error.
    pub async fn write_to_file(
        &self,
        dir: &Path,
        content: &str,
        handle: Option<File>,
        name: Option<&str>,
    ) -> Result<(), AppError> {
        let mut file = match handle {
            Some(file) => file,
            None => self.make_file_handle(dir, name).await?,
        };
        file.set_len(0).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        // dropping the handle closes it
        Ok(())
    }

    /// Read the full file contents as text; an empty file yields an empty
    /// string, never a parse error at this layer.
    pub async fn read_file(&self, dir: &Path, handle: Option<File>) -> Result<String, AppError> {
        let mut file = match handle {
            Some(file) => file,
            None => self.make_file_handle(dir, None).await?,
        };
        file.seek(SeekFrom::Start(0)).await?;
        let mut raw = String::new();
        file.read_to_string(&mut raw).await?;
        Ok(raw)
    }

    /// Persist `raw_data` under `<dir>/backup/<name>_backup_<ISO-timestamp>.<ext>`
    /// unless an explicit name is supplied. Returns the backup path.
    pub async fn write_backup(
        &self,
        dir: &Path,
        raw_data: &str,
        name: Option<&str>,
    ) -> Result<PathBuf, AppError> {
        let backup_dir = dir.join(BACKUP_DIR);
        let file_name = name
            .map(str::to_string)
            .unwrap_or_else(|| self.backup_file_name());
        self.write_to_file(&backup_dir, raw_data, None, Some(&file_name))
            .await?;
        Ok(backup_dir.join(file_name))
    }

    /// Truncate the file and write the literal empty-collection marker.
    pub async fn clear_file(&self, dir: &Path, name: Option<&str>) -> Result<(), AppError> {
        self.write_to_file(dir, "[]", None, name).await
    }
}
