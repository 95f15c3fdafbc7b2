//! Two-tier session store: an in-memory map shadowing an embedded sqlite
//! durable tier. Writes go to sqlite first and then refresh the cache;
//! reads are served from the cache and fall back to sqlite on a miss.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::instrument;

use crate::error::{SessionError, SessionResult};
use crate::types::StoredSession;

struct Inner {
    conn: Connection,
    memory: HashMap<String, StoredSession>,
}

/// Write-through cache over a single sqlite table, keyed by canonicalised
/// repository path. Every public method takes one lock for its whole
/// duration, so two mutators racing on the same key observe serialised
/// updates.
pub struct SessionStore {
    inner: Mutex<Inner>,
}

fn init_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "
CREATE TABLE IF NOT EXISTS sessions (
    repo_key TEXT PRIMARY KEY,
    version INTEGER NOT NULL,
    payload TEXT NOT NULL,
    updated_at_ms INTEGER NOT NULL
)
",
        [],
    )?;
    Ok(())
}

pub fn normalize_key(repo_path: &Path) -> String {
    repo_path
        .to_string_lossy()
        .trim_end_matches(['/', '\\'])
        .to_string()
}

impl SessionStore {
    pub fn open(path: &Path) -> SessionResult<Self> {
        let conn = Connection::open(path)?;
        init_tables(&conn)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                memory: HashMap::new(),
            }),
        })
    }

    pub fn open_in_memory() -> SessionResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_tables(&conn)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                memory: HashMap::new(),
            }),
        })
    }

    /// Pure read: checks the in-memory cache first, falling back to the
    /// durable tier and warming the cache on a miss.
    #[instrument(skip(self))]
    pub fn get(&self, key: &str) -> SessionResult<Option<StoredSession>> {
        let mut inner = self.inner.lock().expect("poisoned session store");
        if let Some(session) = inner.memory.get(key) {
            return Ok(Some(session.clone()));
        }
        match load(&inner.conn, key)? {
            Some(session) => {
                inner.memory.insert(key.to_string(), session.clone());
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Fails with `AlreadyExists` if a session is already on file for `key`
    /// (CAS against an implicit "no row" expectation).
    #[instrument(skip(self, session))]
    pub fn create(&self, key: &str, session: StoredSession) -> SessionResult<()> {
        let mut inner = self.inner.lock().expect("poisoned session store");
        if load(&inner.conn, key)?.is_some() {
            return Err(SessionError::AlreadyExists(key.to_string()));
        }
        persist(&inner.conn, key, &session)?;
        inner.memory.insert(key.to_string(), session);
        Ok(())
    }

    /// Replaces the stored state, bumping `version` and `updated_at_ms`.
    /// Fails with `NotFound` if no session exists for `key`.
    #[instrument(skip(self, mutate))]
    pub fn update(
        &self,
        key: &str,
        now_ms: i64,
        mutate: impl FnOnce(&mut StoredSession),
    ) -> SessionResult<StoredSession> {
        let mut inner = self.inner.lock().expect("poisoned session store");
        let mut session = match inner.memory.get(key) {
            Some(session) => session.clone(),
            None => load(&inner.conn, key)?.ok_or_else(|| SessionError::NotFound(key.to_string()))?,
        };
        mutate(&mut session);
        session.version += 1;
        session.updated_at_ms = now_ms;
        persist(&inner.conn, key, &session)?;
        inner.memory.insert(key.to_string(), session.clone());
        Ok(session)
    }

    /// Convenience transition used by the reconciler and executor: marks a
    /// single job completed without round-tripping through the full state
    /// machine. Fails if the job is not present in the stored plan.
    #[instrument(skip(self))]
    pub fn mark_job_completed(
        &self,
        key: &str,
        job_id: &str,
        new_sha: &str,
        now_ms: i64,
    ) -> SessionResult<StoredSession> {
        let current = self
            .get(key)?
            .ok_or_else(|| SessionError::NotFound(key.to_string()))?;
        if !current.state.jobs_by_id.contains_key(job_id) {
            return Err(SessionError::JobNotFound {
                key: key.to_string(),
                job_id: job_id.to_string(),
            });
        }
        self.update(key, now_ms, |session| {
            if let Some(job) = session.state.jobs_by_id.get_mut(job_id) {
                job.status = engine_machine::JobStatus::Completed;
                job.rebased_head_sha = Some(new_sha.to_string());
            }
        })
    }

    /// Removes the session from both tiers.
    #[instrument(skip(self))]
    pub fn clear(&self, key: &str) -> SessionResult<()> {
        let mut inner = self.inner.lock().expect("poisoned session store");
        inner.conn.execute("DELETE FROM sessions WHERE repo_key = ?1", [key])?;
        inner.memory.remove(key);
        Ok(())
    }

    /// A snapshot of every session currently on file, read from the durable
    /// tier (the source of truth).
    #[instrument(skip(self))]
    pub fn get_all(&self) -> SessionResult<Vec<(String, StoredSession)>> {
        let inner = self.inner.lock().expect("poisoned session store");
        let mut stmt = inner.conn.prepare("SELECT repo_key, payload FROM sessions")?;
        let rows = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let payload: String = row.get(1)?;
                Ok((key, payload))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(key, payload)| {
                let session: StoredSession = serde_json::from_str(&payload)?;
                Ok((key, session))
            })
            .collect()
    }
}

fn load(conn: &Connection, key: &str) -> SessionResult<Option<StoredSession>> {
    let mut stmt = conn.prepare("SELECT payload FROM sessions WHERE repo_key = ?1")?;
    let mut rows = stmt.query([key])?;
    match rows.next()? {
        Some(row) => {
            let payload: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&payload)?))
        }
        None => Ok(None),
    }
}

fn persist(conn: &Connection, key: &str, session: &StoredSession) -> SessionResult<()> {
    let payload = serde_json::to_string(session)?;
    conn.execute(
        "
INSERT INTO sessions (repo_key, version, payload, updated_at_ms)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(repo_key) DO UPDATE SET
    version = excluded.version,
    payload = excluded.payload,
    updated_at_ms = excluded.updated_at_ms
",
        rusqlite::params![key, session.version, payload, session.updated_at_ms],
    )?;
    Ok(())
}
