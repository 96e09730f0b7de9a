//! Persistence layer.
//!
//! The bet ledger is the only shared mutable state of the engine: a
//! durable table of bets awaiting settlement, keyed by transaction
//! hash, persisted as a JSON file and rewritten atomically (temp file
//! + rename) after every mutation. A process restart resumes from the
//! same rows.
//!
//! Access pattern: intake inserts, the settlement poller reads and
//! deletes, nobody else touches it. Insert enforces both uniqueness
//! invariants (hash, and one live bet per user) under the ledger lock,
//! which closes the check-then-act race between concurrent intakes.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::types::PendingBet;

/// Default ledger file path.
const DEFAULT_LEDGER_FILE: &str = "pending_bets.json";

/// Rejections from [`BetLedger::insert`].
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("a bet with hash {0} is already recorded")]
    DuplicateHash(String),

    #[error("user {0} already has a live bet")]
    UserHasLiveBet(i64),

    #[error("failed to persist ledger: {0}")]
    Persist(String),
}

/// Durable table of pending bets.
pub struct BetLedger {
    path: PathBuf,
    inner: Mutex<HashMap<String, PendingBet>>,
}

impl BetLedger {
    /// Open the ledger at `path`, loading any rows persisted by a
    /// previous run. A missing file is a fresh start, not an error.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let path = PathBuf::from(path.unwrap_or(DEFAULT_LEDGER_FILE));

        let rows: HashMap<String, PendingBet> = if path.exists() {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read ledger from {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse ledger from {}", path.display()))?
        } else {
            info!(path = %path.display(), "No ledger file found, starting fresh");
            HashMap::new()
        };

        if !rows.is_empty() {
            info!(
                path = %path.display(),
                pending = rows.len(),
                "Resumed pending bets from disk"
            );
        }

        Ok(Self {
            path,
            inner: Mutex::new(rows),
        })
    }

    /// Insert a freshly submitted bet. Fails if the hash is already
    /// recorded or the user has any live bet; both checks and the
    /// insert happen under one lock.
    pub fn insert(&self, bet: PendingBet) -> Result<(), InsertError> {
        let mut rows = self.inner.lock().unwrap();

        if rows.contains_key(&bet.hash) {
            return Err(InsertError::DuplicateHash(bet.hash));
        }
        if rows.values().any(|b| b.user_id == bet.user_id) {
            return Err(InsertError::UserHasLiveBet(bet.user_id));
        }

        let hash = bet.hash.clone();
        rows.insert(hash.clone(), bet);

        if let Err(e) = persist(&self.path, &rows) {
            // Roll back so memory never claims more than disk holds
            rows.remove(&hash);
            return Err(InsertError::Persist(e.to_string()));
        }

        debug!(hash, pending = rows.len(), "Pending bet recorded");
        Ok(())
    }

    /// Remove a settled bet. Returns the removed row, or `None` if the
    /// hash was not present. If the removal cannot be persisted the
    /// row is kept, so the poller retries it on the next sweep.
    pub fn remove(&self, hash: &str) -> Result<Option<PendingBet>> {
        let mut rows = self.inner.lock().unwrap();

        let Some(bet) = rows.remove(hash) else {
            return Ok(None);
        };

        if let Err(e) = persist(&self.path, &rows) {
            rows.insert(hash.to_string(), bet);
            return Err(e);
        }

        debug!(hash, pending = rows.len(), "Pending bet removed");
        Ok(Some(bet))
    }

    /// The live bet for a user, if any.
    pub fn live_bet_for(&self, user_id: i64) -> Option<PendingBet> {
        self.inner
            .lock()
            .unwrap()
            .values()
            .find(|b| b.user_id == user_id)
            .cloned()
    }

    /// Snapshot of all pending bets, oldest first, for one sweep.
    pub fn all(&self) -> Vec<PendingBet> {
        let mut bets: Vec<_> = self.inner.lock().unwrap().values().cloned().collect();
        bets.sort_by_key(|b| b.placed_at);
        bets
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

/// Write the ledger atomically: serialise to a sibling temp file, then
/// rename over the target.
fn persist(path: &Path, rows: &HashMap<String, PendingBet>) -> Result<()> {
    let json = serde_json::to_string_pretty(rows).context("Failed to serialise ledger")?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)
        .with_context(|| format!("Failed to write ledger to {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move ledger into place at {}", path.display()))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
