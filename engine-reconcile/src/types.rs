use engine_machine::JobId;

/// Result of a single reconciliation pass, run before every status read.
/// `Unchanged` covers both "nothing recorded, tool idle" and "recorded
/// state already agrees with the tool".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Unchanged,
    /// The active job finished outside the engine (the user ran the tool's
    /// own continue/commit directly). The job was marked completed and any
    /// direct children not already queued were enqueued.
    ExternalCompletion { job_id: JobId, new_head_sha: String },
    /// The tool is mid-rebase but no session is on file. Not our rebase;
    /// surfaced as-is rather than adopted.
    OrphanedExternalRebase,
    /// The recorded plan has no active or pending work and the tool is
    /// idle: the session was cleared.
    FullyDone,
}
