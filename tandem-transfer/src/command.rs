//! Subprocess adapter for an rclone-compatible transfer engine
//!
//! Listing uses `lsjson -R`, copies use `copyto` (which preserves
//! modification times), deletes use `deletefile`. Verbosity and the
//! exclusion file are forwarded so the engine's own logging and
//! filtering stay available.

use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::entry::{Entry, EntryKind};
use crate::errors::{Result, TransferError};
use crate::provider::{Endpoint, TransferProvider};

/// Exit codes the engine uses for "directory not found" / "file not found".
/// A delete that hits one of these is already done.
const EXIT_DIR_NOT_FOUND: i32 = 3;
const EXIT_FILE_NOT_FOUND: i32 = 4;

/// One record of `lsjson -R` output
#[derive(Debug, Deserialize)]
struct LsJsonEntry {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Size")]
    size: i64,
    #[serde(rename = "ModTime")]
    mod_time: String,
    #[serde(rename = "IsDir")]
    is_dir: bool,
}

/// [`TransferProvider`] that shells out to the external engine binary
pub struct CommandProvider {
    binary: String,
    verbosity: u8,
    exclude_file: Option<PathBuf>,
}

impl CommandProvider {
    pub fn new(binary: impl Into<String>, verbosity: u8, exclude_file: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            verbosity,
            exclude_file,
        }
    }

    /// Full engine-side path for a tree-relative path under a root
    fn join(root: &Endpoint, path: &str) -> String {
        match root {
            Endpoint::Local(dir) => dir.join(path).to_string_lossy().into_owned(),
            Endpoint::Remote(spec) => spec.join(path),
        }
    }

    fn root_arg(root: &Endpoint) -> String {
        match root {
            Endpoint::Local(dir) => dir.to_string_lossy().into_owned(),
            Endpoint::Remote(spec) => spec.root(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<Output> {
        trace!("invoking {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(output)
    }

    fn command_error(output: &Output) -> TransferError {
        TransferError::CommandFailed {
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    fn verbosity_args(&self) -> Vec<String> {
        (0..self.verbosity).map(|_| "-v".to_string()).collect()
    }

    fn parse_listing(stdout: &[u8]) -> Result<Vec<Entry>> {
        let records: Vec<LsJsonEntry> = serde_json::from_slice(stdout)?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let modified_at = DateTime::parse_from_rfc3339(&record.mod_time)
                .map_err(|e| {
                    TransferError::ListingParse(format!(
                        "bad ModTime {:?} for {}: {e}",
                        record.mod_time, record.path
                    ))
                })?
                .with_timezone(&Utc);

            entries.push(Entry {
                path: record.path,
                size: record.size.max(0) as u64,
                modified_at,
                kind: if record.is_dir {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                },
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl TransferProvider for CommandProvider {
    async fn list(&self, root: &Endpoint) -> Result<Vec<Entry>> {
        let mut args = vec!["lsjson".to_string(), "-R".to_string(), Self::root_arg(root)];
        if let Some(file) = &self.exclude_file {
            args.push("--exclude-from".to_string());
            args.push(file.to_string_lossy().into_owned());
        }
        args.extend(self.verbosity_args());

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(Self::command_error(&output));
        }

        let entries = Self::parse_listing(&output.stdout)?;
        debug!("listed {} entries under {root}", entries.len());
        Ok(entries)
    }

    async fn copy(&self, src: &Endpoint, dst: &Endpoint, path: &str) -> Result<()> {
        let mut args = vec![
            "copyto".to_string(),
            Self::join(src, path),
            Self::join(dst, path),
        ];
        args.extend(self.verbosity_args());

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(Self::command_error(&output));
        }
        Ok(())
    }

    async fn delete(&self, root: &Endpoint, path: &str) -> Result<()> {
        let mut args = vec!["deletefile".to_string(), Self::join(root, path)];
        args.extend(self.verbosity_args());

        let output = self.run(&args).await?;
        if !output.status.success() {
            match output.status.code() {
                Some(EXIT_DIR_NOT_FOUND) | Some(EXIT_FILE_NOT_FOUND) => {
                    warn!("delete of {path} under {root}: already gone");
                    return Ok(());
                }
                _ => return Err(Self::command_error(&output)),
            }
        }
        Ok(())
    }
}
