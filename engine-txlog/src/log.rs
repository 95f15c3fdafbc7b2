//! Atomic single-file transaction log: write to a sibling temporary file,
//! then rename it over the target, so a crash mid-write leaves the old
//! file, never a truncated one.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::instrument;

use crate::error::TxResult;
use crate::types::{Intent, IntentStatus, IntentType};

/// Intents older than this are treated as stale and garbage-collected.
pub const DEFAULT_INTENT_TTL_MS: i64 = 60 * 60 * 1000;

pub struct TransactionLog {
    path: PathBuf,
}

/// What the caller should do after consulting the log on startup or before a
/// status read.
#[derive(Debug, PartialEq, Eq)]
pub enum RecoveryAction {
    /// No intent on file; nothing to reconcile.
    Nothing,
    /// An intent older than the TTL was cleared.
    ClearedStale,
    /// A `completed` intent was left on disk by an interrupted clear; cleared.
    ClearedCompletedInterrupted,
    /// A `failed` intent was cleared; the caller should also clear the
    /// session and surface this as a stale failure.
    ClearedFailed,
    /// A `pending` intent was cleared; the operation it described never
    /// began.
    ClearedNeverBegan,
    /// An `executing` intent remains and the tool is still rebasing: yield to
    /// normal conflict handling, do not clear.
    ConsultRebaseState,
    /// An `executing` intent was cleared because the tool is no longer
    /// rebasing; the caller should run the external-completion path.
    ClearedForExternalCompletion,
}

impl TransactionLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reads the current intent, if any. An unparsable file is treated as
    /// absent; the next write replaces it wholesale.
    #[instrument(skip(self))]
    pub fn read(&self) -> TxResult<Option<Intent>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).ok()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip(self, context))]
    pub fn write_intent(
        &self,
        id: String,
        intent_type: IntentType,
        context: Option<String>,
        now_ms: i64,
    ) -> TxResult<Intent> {
        let intent = Intent {
            id,
            intent_type,
            status: IntentStatus::Pending,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            expected_state_before: None,
            context,
            error: None,
        };
        self.persist(&intent)?;
        Ok(intent)
    }

    #[instrument(skip(self, intent))]
    pub fn mark_executing(&self, mut intent: Intent, now_ms: i64) -> TxResult<Intent> {
        intent.status = IntentStatus::Executing;
        intent.updated_at_ms = now_ms;
        self.persist(&intent)?;
        Ok(intent)
    }

    #[instrument(skip(self, intent))]
    pub fn mark_completed(&self, mut intent: Intent, now_ms: i64) -> TxResult<Intent> {
        intent.status = IntentStatus::Completed;
        intent.updated_at_ms = now_ms;
        self.persist(&intent)?;
        Ok(intent)
    }

    #[instrument(skip(self, intent))]
    pub fn mark_failed(&self, mut intent: Intent, error: String, now_ms: i64) -> TxResult<Intent> {
        intent.status = IntentStatus::Failed;
        intent.error = Some(error);
        intent.updated_at_ms = now_ms;
        self.persist(&intent)?;
        Ok(intent)
    }

    /// Removes the log file. Missing is not an error: clearing is idempotent.
    #[instrument(skip(self))]
    pub fn clear(&self) -> TxResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Applies the recovery rules, clearing the log wherever a rule says to.
    /// `is_rebasing` is the tool's observed rebase state, needed only for
    /// the `executing` branch.
    #[instrument(skip(self))]
    pub fn recover(&self, now_ms: i64, ttl_ms: i64, is_rebasing: bool) -> TxResult<RecoveryAction> {
        let Some(intent) = self.read()? else {
            return Ok(RecoveryAction::Nothing);
        };

        if now_ms.saturating_sub(intent.created_at_ms) > ttl_ms {
            self.clear()?;
            return Ok(RecoveryAction::ClearedStale);
        }

        match intent.status {
            IntentStatus::Completed => {
                self.clear()?;
                Ok(RecoveryAction::ClearedCompletedInterrupted)
            }
            IntentStatus::Failed => {
                self.clear()?;
                Ok(RecoveryAction::ClearedFailed)
            }
            IntentStatus::Pending => {
                self.clear()?;
                Ok(RecoveryAction::ClearedNeverBegan)
            }
            IntentStatus::Executing => {
                if is_rebasing {
                    Ok(RecoveryAction::ConsultRebaseState)
                } else {
                    self.clear()?;
                    Ok(RecoveryAction::ClearedForExternalCompletion)
                }
            }
        }
    }

    fn persist(&self, intent: &Intent) -> TxResult<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let payload = serde_json::to_vec_pretty(intent)?;
        let mut temp_file = NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut temp_file, &payload)?;
        temp_file.persist(&self.path)?;
        Ok(())
    }
}
