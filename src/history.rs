//! Transfer History Persistence
//!
//! An ordered, append-only list of transfers with a JSON file behind it.
//! The file holds `Vec<TransferData>`; loading rebuilds live transfers and
//! `resume_incomplete` re-runs `execute()` on everything that is not done
//! yet. Transfers are never deleted here; eviction is someone else's call.

use std::fs;
use std::path::Path;

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::ChainServices;
use crate::transfer::lifecycle::{Transfer, TransferData};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Ordered list of every transfer the user has started
#[derive(Default)]
pub struct TransferHistory {
    transfers: Vec<Transfer>,
}

impl TransferHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transfer. Order is creation order and never changes.
    pub fn add(&mut self, transfer: Transfer) {
        self.transfers.push(transfer);
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Transfer> {
        self.transfers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Transfer> {
        self.transfers.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.iter()
    }

    /// Transfers still waiting for fulfillment or a user decision
    pub fn incomplete_count(&self) -> usize {
        self.transfers.iter().filter(|t| !t.done()).count()
    }

    /// Write the whole history as pretty JSON.
    ///
    /// Goes through a `.tmp` sibling and an atomic rename so a crash mid
    /// write never leaves a truncated history behind.
    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let records: Vec<TransferData> = self.transfers.iter().map(Transfer::encode).collect();
        let json = serde_json::to_string_pretty(&records)?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;

        info!("Saved {} transfers to {}", records.len(), path.display());
        Ok(())
    }

    /// Load a previously saved history
    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        let json = fs::read_to_string(path)?;
        let records: Vec<TransferData> = serde_json::from_str(&json)?;

        info!("Loaded {} transfers from {}", records.len(), path.display());
        Ok(Self {
            transfers: records.into_iter().map(Transfer::decode).collect(),
        })
    }

    /// Load the history, or start empty when the file does not exist yet
    pub fn load_or_default(path: &Path) -> Result<Self, HistoryError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Re-run `execute()` on every transfer that is not done.
    ///
    /// Resumed transfers run concurrently; they share no state besides the
    /// services handle. Operational failures stay recorded on their
    /// transfer; contract violations are logged and skipped so one broken
    /// record cannot stall the rest. Returns how many transfers were
    /// resumed.
    pub async fn resume_incomplete(&mut self, services: &ChainServices) -> usize {
        let pending: Vec<&mut Transfer> =
            self.transfers.iter_mut().filter(|t| !t.done()).collect();
        let count = pending.len();
        if count == 0 {
            return 0;
        }

        info!("Resuming {} incomplete transfers", count);
        let resumptions = pending.into_iter().map(|transfer| async move {
            if let Err(e) = transfer.execute(services).await {
                warn!("Transfer resume aborted: {}", e);
            }
        });
        join_all(resumptions).await;
        count
    }
}
