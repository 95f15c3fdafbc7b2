use engine_txlog::{IntentType, RecoveryAction, TransactionLog};

fn log_at(dir: &tempfile::TempDir) -> TransactionLog {
    TransactionLog::new(dir.path().join("rebase-intent.json"))
}

#[test]
fn write_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_at(&dir);
    let intent = log
        .write_intent("tx-1".to_string(), IntentType::ExecuteJob, None, 100)
        .unwrap();

    let read_back = log.read().unwrap().expect("intent should be on file");
    assert_eq!(read_back.id, intent.id);
    assert_eq!(read_back.status, engine_txlog::IntentStatus::Pending);
}

#[test]
fn clear_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_at(&dir);
    log.clear().unwrap();
    log.write_intent("tx-1".to_string(), IntentType::Continue, None, 0)
        .unwrap();
    log.clear().unwrap();
    log.clear().unwrap();
    assert!(log.read().unwrap().is_none());
}

#[test]
fn recover_with_no_intent_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_at(&dir);
    let action = log.recover(0, 60_000, false).unwrap();
    assert_eq!(action, RecoveryAction::Nothing);
}

#[test]
fn recover_clears_stale_intent_past_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_at(&dir);
    log.write_intent("tx-1".to_string(), IntentType::ExecuteJob, None, 0)
        .unwrap();

    let action = log.recover(120_000, 60_000, false).unwrap();
    assert_eq!(action, RecoveryAction::ClearedStale);
    assert!(log.read().unwrap().is_none());
}

#[test]
fn recover_clears_pending_intent_that_never_began() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_at(&dir);
    log.write_intent("tx-1".to_string(), IntentType::ExecuteJob, None, 0)
        .unwrap();
    let action = log.recover(10, 60_000, false).unwrap();
    assert_eq!(action, RecoveryAction::ClearedNeverBegan);
}

#[test]
fn recover_clears_completed_intent_left_by_interrupted_clear() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_at(&dir);
    let intent = log
        .write_intent("tx-1".to_string(), IntentType::Finalize, None, 0)
        .unwrap();
    log.mark_completed(intent, 10).unwrap();

    let action = log.recover(20, 60_000, false).unwrap();
    assert_eq!(action, RecoveryAction::ClearedCompletedInterrupted);
}

#[test]
fn recover_clears_failed_intent_as_stale_failure() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_at(&dir);
    let intent = log
        .write_intent("tx-1".to_string(), IntentType::ExecuteJob, None, 0)
        .unwrap();
    log.mark_failed(intent, "boom".to_string(), 10).unwrap();

    let action = log.recover(20, 60_000, false).unwrap();
    assert_eq!(action, RecoveryAction::ClearedFailed);
}

#[test]
fn recover_yields_to_conflict_handling_while_still_rebasing() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_at(&dir);
    let intent = log
        .write_intent("tx-1".to_string(), IntentType::ExecuteJob, None, 0)
        .unwrap();
    log.mark_executing(intent, 5).unwrap();

    let action = log.recover(10, 60_000, true).unwrap();
    assert_eq!(action, RecoveryAction::ConsultRebaseState);
    assert!(log.read().unwrap().is_some());
}

#[test]
fn recover_clears_executing_intent_once_tool_is_no_longer_rebasing() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_at(&dir);
    let intent = log
        .write_intent("tx-1".to_string(), IntentType::ExecuteJob, None, 0)
        .unwrap();
    log.mark_executing(intent, 5).unwrap();

    let action = log.recover(10, 60_000, false).unwrap();
    assert_eq!(action, RecoveryAction::ClearedForExternalCompletion);
    assert!(log.read().unwrap().is_none());
}
