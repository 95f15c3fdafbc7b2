//! Exercises `GitAdapter` against a real, throwaway `git init` repository.

use std::path::Path;
use std::process::Command;

use engine_vcs::{CheckoutOptions, PushForce, ResetMode, Sha, VcsAdapter};

struct TestRepo {
    dir: tempfile::TempDir,
    adapter: engine_vcs::GitAdapter,
}

impl TestRepo {
    fn init() -> Self {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init", "-q", "-b", "main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test"]);
        Self {
            dir,
            adapter: engine_vcs::GitAdapter::default(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn commit(&self, file: &str, contents: &str, message: &str) -> Sha {
        std::fs::write(self.path().join(file), contents).unwrap();
        run_git(self.path(), &["add", file]);
        run_git(self.path(), &["commit", "-q", "-m", message]);
        self.adapter.resolve_ref(self.path(), "HEAD").unwrap()
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .current_dir(dir)
        .args(args)
        .status()
        .expect("git must be on PATH to run this test");
    assert!(status.success(), "git {args:?} failed");
}

#[test]
fn resolve_ref_and_current_branch_track_head() {
    let repo = TestRepo::init();
    let sha = repo.commit("a.txt", "one", "first");

    assert_eq!(repo.adapter.resolve_ref(repo.path(), "HEAD").unwrap(), sha);
    assert_eq!(
        repo.adapter.current_branch(repo.path()).unwrap(),
        Some("main".to_string())
    );
}

#[test]
fn resolve_ref_returns_empty_sha_for_unknown_ref() {
    let repo = TestRepo::init();
    repo.commit("a.txt", "one", "first");

    let resolved = repo.adapter.resolve_ref(repo.path(), "refs/heads/does-not-exist").unwrap();
    assert!(resolved.is_empty());
}

#[test]
fn working_tree_status_reports_untracked_and_modified_files() {
    let repo = TestRepo::init();
    repo.commit("a.txt", "one", "first");

    let clean = repo.adapter.working_tree_status(repo.path()).unwrap();
    assert!(clean.is_clean());

    std::fs::write(repo.path().join("a.txt"), "changed").unwrap();
    std::fs::write(repo.path().join("b.txt"), "new").unwrap();
    let dirty = repo.adapter.working_tree_status(repo.path()).unwrap();
    assert!(!dirty.is_clean());
    assert!(dirty.modified.contains(&"a.txt".to_string()));
    assert!(dirty.not_added.contains(&"b.txt".to_string()));
}

#[test]
fn checkout_refuses_to_overwrite_dirty_tree_without_force() {
    let repo = TestRepo::init();
    repo.commit("a.txt", "one", "first");
    std::fs::write(repo.path().join("a.txt"), "changed").unwrap();

    let err = repo
        .adapter
        .checkout(repo.path(), "HEAD", CheckoutOptions::default())
        .unwrap_err();
    assert!(matches!(err, engine_vcs::VcsError::DirtyWorktree { .. }));
}

#[test]
fn is_ancestor_and_merge_base_agree_on_a_linear_history() {
    let repo = TestRepo::init();
    let first = repo.commit("a.txt", "one", "first");
    let second = repo.commit("a.txt", "two", "second");

    assert!(repo.adapter.is_ancestor(repo.path(), &first.0, &second.0).unwrap());
    assert!(!repo.adapter.is_ancestor(repo.path(), &second.0, &first.0).unwrap());
    assert_eq!(
        repo.adapter.merge_base(repo.path(), &first.0, &second.0).unwrap(),
        Some(first)
    );
}

#[test]
fn rebase_fast_forwards_cleanly_when_there_is_no_conflict() {
    let repo = TestRepo::init();
    let root = repo.commit("a.txt", "one", "first");
    run_git(repo.path(), &["checkout", "-q", "-b", "feature"]);
    let feature_head = repo.commit("b.txt", "feature", "feature work");
    run_git(repo.path(), &["checkout", "-q", "main"]);
    let main_head = repo.commit("c.txt", "main", "main work");

    let outcome = repo
        .adapter
        .rebase(repo.path(), &main_head, &root, "feature")
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.conflicts.is_empty());
    assert_ne!(outcome.current_commit.unwrap(), feature_head);
}

#[test]
fn rebase_reports_conflicts_then_continues_after_resolution() {
    let repo = TestRepo::init();
    let root = repo.commit("a.txt", "base", "base");
    run_git(repo.path(), &["checkout", "-q", "-b", "feature"]);
    let feature_head = repo.commit("a.txt", "feature change", "feature edits a.txt");
    run_git(repo.path(), &["checkout", "-q", "main"]);
    let main_head = repo.commit("a.txt", "main change", "main edits a.txt too");
    let _ = feature_head;

    let outcome = repo
        .adapter
        .rebase(repo.path(), &main_head, &root, "feature")
        .unwrap();
    assert!(!outcome.success);
    assert!(!outcome.conflicts.is_empty());

    let state = repo.adapter.get_rebase_state(repo.path()).unwrap();
    assert!(state.is_some());

    std::fs::write(repo.path().join("a.txt"), "resolved").unwrap();
    run_git(repo.path(), &["add", "a.txt"]);
    let resumed = repo.adapter.rebase_continue(repo.path()).unwrap();
    assert!(resumed.success);
    assert!(repo.adapter.get_rebase_state(repo.path()).unwrap().is_none());
}

#[test]
fn rebase_abort_restores_the_branch_to_its_pre_rebase_head() {
    let repo = TestRepo::init();
    let root = repo.commit("a.txt", "base", "base");
    run_git(repo.path(), &["checkout", "-q", "-b", "feature"]);
    let feature_head = repo.commit("a.txt", "feature change", "feature edits a.txt");
    run_git(repo.path(), &["checkout", "-q", "main"]);
    let main_head = repo.commit("a.txt", "main change", "main edits a.txt too");

    repo.adapter.rebase(repo.path(), &main_head, &root, "feature").unwrap();
    repo.adapter.rebase_abort(repo.path()).unwrap();

    assert!(repo.adapter.get_rebase_state(repo.path()).unwrap().is_none());
    run_git(repo.path(), &["checkout", "-q", "feature"]);
    assert_eq!(repo.adapter.resolve_ref(repo.path(), "HEAD").unwrap(), feature_head);
}

#[test]
fn is_index_locked_reflects_a_stray_lock_file() {
    let repo = TestRepo::init();
    repo.commit("a.txt", "one", "first");
    assert!(!repo.adapter.is_index_locked(repo.path()).unwrap());

    std::fs::write(repo.path().join(".git/index.lock"), "").unwrap();
    assert!(repo.adapter.is_index_locked(repo.path()).unwrap());
}

#[test]
fn reset_hard_moves_head_and_discards_changes() {
    let repo = TestRepo::init();
    let first = repo.commit("a.txt", "one", "first");
    repo.commit("a.txt", "two", "second");

    repo.adapter.reset(repo.path(), ResetMode::Hard, &first.0).unwrap();
    assert_eq!(repo.adapter.resolve_ref(repo.path(), "HEAD").unwrap(), first);
    assert!(repo.adapter.working_tree_status(repo.path()).unwrap().is_clean());
}

#[test]
fn push_without_a_remote_fails_rather_than_panicking() {
    let repo = TestRepo::init();
    repo.commit("a.txt", "one", "first");

    let err = repo
        .adapter
        .push(repo.path(), "origin", "main", PushForce::None, false)
        .unwrap_err();
    assert!(matches!(err, engine_vcs::VcsError::Other(_)));
}
