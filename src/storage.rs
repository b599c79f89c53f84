use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::OutcomeRow;

/// Append-only JSONL sink for outcome rows, one line per resolved signal or
/// trade. The reporting side tails this file.
pub struct OutcomeStore {
    path: PathBuf,
}

impl OutcomeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, row: &OutcomeRow) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let line = serde_json::to_string(row).context("Failed to serialize outcome row")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        debug!(
            "Recorded outcome for message {} ({})",
            row.message_id, row.status
        );
        Ok(())
    }

    /// Read every row back, skipping lines that no longer parse.
    pub fn load(&self) -> Result<Vec<OutcomeRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let mut rows = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<OutcomeRow>(&line) {
                Ok(row) => rows.push(row),
                Err(e) => tracing::warn!("Skipping unreadable result row: {}", e),
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::outcome::EntryDecision;
    use crate::models::{Direction, Outcome, OutcomeStatus};
    use crate::test_helpers::make_signal;

    fn temp_store(name: &str) -> OutcomeStore {
        let path = std::env::temp_dir()
            .join(format!("signal_sentry_test_{}_{}", std::process::id(), name))
            .join("results.jsonl");
        let _ = std::fs::remove_file(&path);
        OutcomeStore::new(path)
    }

    #[test]
    fn append_then_load_round_trips() {
        let store = temp_store("roundtrip");
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);
        let outcome = Outcome::resolved(
            OutcomeStatus::Tp,
            sig.created_at,
            EntryDecision::market(Some(101.0)),
            "",
        );

        store
            .append(&OutcomeRow::from_evaluation(&sig, &outcome))
            .unwrap();
        store
            .append(&OutcomeRow::from_evaluation(&sig, &outcome))
            .unwrap();

        let rows = store.load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].message_id, sig.message_id);
        assert_eq!(rows[0].status, OutcomeStatus::Tp);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let store = temp_store("missing");
        assert!(store.load().unwrap().is_empty());
    }
}
