//! JSONL-backed store for the live batch set
//!
//! One batch per line, every field serialized with timestamps as integer
//! epoch-milliseconds. The file is rewritten on mutation; at the sizes a
//! scheduler keeps in flight (tens of batches) that is cheaper than being
//! clever.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::Batch;
use crate::error::{ReaprError, Result};

const BATCHES_FILE: &str = "batches.jsonl";

/// The ordered live set of batches, optionally mirrored to disk
#[derive(Debug)]
pub struct BatchLog {
    path: Option<PathBuf>,
    batches: Vec<Batch>,
    last_updated: DateTime<Utc>,
}

impl BatchLog {
    /// A log that lives only in memory; used by tests and dry runs
    pub fn in_memory() -> Self {
        Self {
            path: None,
            batches: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Open (and create if needed) the log under a data directory,
    /// reloading any batches a previous run left in flight
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(BATCHES_FILE);

        let batches = if path.exists() {
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            let mut batches = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let batch: Batch = serde_json::from_str(&line)?;
                batches.push(batch);
            }
            batches
        } else {
            Vec::new()
        };

        Ok(Self {
            path: Some(path),
            batches,
            last_updated: Utc::now(),
        })
    }

    /// Number of live batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the live set is empty
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// When the live set last changed
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Iterate the live batches
    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.iter()
    }

    /// Iterate the live batches mutably; callers that flip job flags must
    /// follow up with `save`
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Batch> {
        self.batches.iter_mut()
    }

    /// The batch currently registered for a target, if any
    pub fn batch_for_target(&self, host: &str) -> Option<&Batch> {
        self.batches.iter().find(|batch| batch.target == host)
    }

    /// Mutable access to one batch by id
    pub fn get_mut(&mut self, batch_id: &str) -> Option<&mut Batch> {
        self.batches.iter_mut().find(|batch| batch.batch_id == batch_id)
    }

    /// Register a batch; a target may own at most one live batch
    pub fn add(&mut self, batch: Batch) -> Result<()> {
        if self.batch_for_target(&batch.target).is_some() {
            return Err(ReaprError::InvalidState(format!(
                "target {} already has a live batch",
                batch.target
            )));
        }
        self.batches.push(batch);
        self.touch();
        self.save()
    }

    /// Remove and return every fully-finished batch
    pub fn take_finished(&mut self) -> Result<Vec<Batch>> {
        let mut finished = Vec::new();
        let mut remaining = Vec::with_capacity(self.batches.len());
        for batch in self.batches.drain(..) {
            if batch.is_finished() {
                finished.push(batch);
            } else {
                remaining.push(batch);
            }
        }
        self.batches = remaining;
        if !finished.is_empty() {
            self.touch();
            self.save()?;
        }
        Ok(finished)
    }

    /// Rewrite the backing file from the in-memory set
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = File::create(path)?;
        for batch in &self.batches {
            writeln!(file, "{}", serde_json::to_string(batch)?)?;
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}
