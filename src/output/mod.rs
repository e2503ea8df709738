//! CSV output: one holdings file per fund plus the optional summary log.
//!
//! Files are written next to their destination as `<name>.part` and renamed
//! into place once complete, so a failed run never leaves a truncated file.

use crate::models::{HoldingsResult, LogEntry};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn holdings_file_name(result: &HoldingsResult) -> String {
    format!("{}-holdings.csv", result.symbol)
}

/// Write `<SYMBOL>-holdings.csv` into `dir`.
pub fn write_holdings(dir: &Path, result: &HoldingsResult) -> Result<PathBuf> {
    let path = dir.join(holdings_file_name(result));
    write_records(&path, &result.rows)
        .with_context(|| format!("Failed to write holdings for {}", result.symbol))?;
    debug!("{}: {} rows → {:?}", result.symbol, result.row_count(), path);
    Ok(path)
}

/// Write the aggregate log of successfully downloaded funds.
pub fn write_log(dir: &Path, file_name: &str, entries: &[LogEntry]) -> Result<PathBuf> {
    let path = dir.join(file_name);
    write_records(&path, entries).context("Failed to write fund log")?;
    debug!("{} log entries → {:?}", entries.len(), path);
    Ok(path)
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create dir {:?}", parent))?;
    }

    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let written = (|| -> Result<()> {
        let mut writer = csv::Writer::from_path(&part)
            .with_context(|| format!("Could not create {:?}", part))?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = written {
        std::fs::remove_file(&part).ok();
        return Err(e);
    }

    std::fs::rename(&part, path).with_context(|| format!("Could not move {:?} into place", part))?;
    Ok(())
}
