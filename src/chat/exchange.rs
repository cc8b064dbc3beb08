//! JSONL exchange log - one record per chat request/response pair.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Default exchange log location (~/.rag-playground/exchanges.jsonl).
pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rag-playground")
        .join("exchanges.jsonl")
}

#[derive(Debug, Serialize)]
struct ExchangeRecord<'a> {
    timestamp: DateTime<Utc>,
    model: &'a str,
    request: &'a Value,
    response: &'a Value,
}

/// Append-only JSONL file of chat exchanges.
pub struct ExchangeLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ExchangeLog {
    /// Open (or create) the log file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open exchange log: {:?}", path))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one request/response record.
    pub fn append(&self, model: &str, request: &Value, response: &Value) -> Result<()> {
        let record = ExchangeRecord {
            timestamp: Utc::now(),
            model,
            request,
            response,
        };

        let mut line = serde_json::to_string(&record).context("Failed to serialize exchange")?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("Exchange log lock poisoned"))?;
        file.write_all(line.as_bytes())
            .context("Failed to write exchange log")?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
