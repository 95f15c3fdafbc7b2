use std::path::{Path, PathBuf};

use engine_context::ContextService;
use engine_testing::FakeAdapter;
use engine_vcs::{Sha, VcsAdapter, Worktree};

#[test]
fn reuse_main_returns_non_temporary_context() {
    let adapter = FakeAdapter::new();
    let service = ContextService::new();
    let repo = PathBuf::from("/repo");

    let ctx = service
        .acquire(&adapter, &repo, "rebase", true, "main")
        .unwrap();

    assert!(!ctx.is_temporary);
    assert!(!ctx.requires_cleanup);
    assert_eq!(ctx.execution_path, repo);

    // Releasing a non-temporary context is a no-op: nothing was pooled.
    service.release(&ctx);
    assert!(service.current(&repo).is_none());
}

#[test]
fn auxiliary_context_is_pooled_and_released() {
    let adapter = FakeAdapter::new();
    let root = adapter.seed_root("root");
    adapter.set_branch("main", &root);
    adapter.set_current_branch(Some("main"));
    let service = ContextService::new();
    let repo = PathBuf::from("/repo");

    let ctx = service
        .acquire(&adapter, &repo, "rebase", false, "main")
        .unwrap();
    assert!(ctx.is_temporary);
    assert!(ctx.requires_cleanup);
    assert!(ctx.execution_path.exists());

    let current = service.current(&repo).expect("context should be recorded");
    assert_eq!(current.execution_path, ctx.execution_path);

    let path = ctx.execution_path.clone();
    service.release(&ctx);
    assert!(service.current(&repo).is_none());
    assert!(!path.exists());
}

#[test]
fn detach_refuses_dirty_sibling_worktree() {
    let adapter = FakeAdapter::new();
    adapter.add_worktree(Worktree {
        path: "/repo-wt-feature".to_string(),
        head_sha: Sha("deadbeef".to_string()),
        branch: Some("feature".to_string()),
        is_main: false,
        is_stale: false,
        is_dirty: true,
    });
    let service = ContextService::new();

    let err = service
        .detect_and_detach(&adapter, Path::new("/repo"), "feature")
        .unwrap_err();
    assert!(matches!(err, engine_context::ContextError::WorktreeDirty { .. }));
}

#[test]
fn detach_and_restore_clean_sibling_worktree() {
    let adapter = FakeAdapter::new();
    adapter.add_worktree(Worktree {
        path: "/repo-wt-feature".to_string(),
        head_sha: Sha("deadbeef".to_string()),
        branch: Some("feature".to_string()),
        is_main: false,
        is_stale: false,
        is_dirty: false,
    });
    let service = ContextService::new();

    let detached = service
        .detect_and_detach(&adapter, Path::new("/repo"), "feature")
        .unwrap()
        .expect("clean sibling worktree should be detachable");
    assert_eq!(detached.branch, "feature");

    service.restore_detached(&adapter, &detached).unwrap();
}

#[test]
fn detach_is_noop_when_branch_not_checked_out_elsewhere() {
    let adapter = FakeAdapter::new();
    let service = ContextService::new();
    let result = service
        .detect_and_detach(&adapter, Path::new("/repo"), "feature")
        .unwrap();
    assert!(result.is_none());
}
