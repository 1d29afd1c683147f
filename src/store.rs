use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Last-observed voting power per chain, persisted between runs as a
/// single JSON object keyed by chain name.
#[derive(Debug)]
pub struct VotingPowerStore {
    path: PathBuf,
    entries: HashMap<String, i64>,
}

impl VotingPowerStore {
    /// A missing file starts an empty map; a corrupt file is logged and
    /// also starts an empty map, so state loss never aborts a run.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(error) => {
                    error!(
                        path = %path.display(),
                        error = %error,
                        "voting power state file is corrupt, starting from an empty map"
                    );
                    HashMap::new()
                }
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(error) => {
                error!(
                    path = %path.display(),
                    error = %error,
                    "failed to read voting power state file, starting from an empty map"
                );
                HashMap::new()
            }
        };

        Self { path, entries }
    }

    /// Previous reading for `chain`, defaulting to `current` so a
    /// first-ever observation reads as zero change.
    pub fn previous_or(&self, chain: &str, current: i64) -> i64 {
        self.entries.get(chain).copied().unwrap_or(current)
    }

    pub fn get(&self, chain: &str) -> Option<i64> {
        self.entries.get(chain).copied()
    }

    pub fn upsert(&mut self, chain: &str, voting_power: i64) {
        self.entries.insert(chain.to_owned(), voting_power);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites the whole file with the in-memory map.
    pub fn persist(&self) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(&self.entries)?;
        fs::write(&self.path, serialized)?;
        debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "voting power state persisted"
        );
        Ok(())
    }
}
