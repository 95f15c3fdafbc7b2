//! An in-memory [`VcsAdapter`] used to unit-test the planner, state machine,
//! and executor without a real repository on disk. A pure in-memory model
//! rather than a driver for a temporary `git init` repository: the tests
//! consuming it exercise planner/machine/executor logic, not `git2` itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use engine_vcs::{
    Branch, CheckoutOptions, Commit, PatchApplyOutcome, PushForce, RebaseOutcome,
    RebaseStateInfo, Remote, ResetMode, Sha, VcsAdapter, VcsError, VcsResult, WorkingTreeStatus,
    Worktree,
};

#[derive(Clone, Debug)]
struct FakeCommit {
    message: String,
    parent: Option<Sha>,
}

#[derive(Clone, Debug)]
struct ActiveRebase {
    onto: Sha,
    to: String,
    /// Remaining commits to replay, oldest first.
    pending: Vec<Sha>,
    /// The new head built so far.
    new_head: Sha,
    /// Snapshot of `to`'s head before the rebase started, for abort.
    original_head: Sha,
    conflicted_on: Option<Sha>,
}

#[derive(Default)]
struct FakeState {
    commits: HashMap<String, FakeCommit>,
    branches: HashMap<String, Sha>,
    worktrees: Vec<Worktree>,
    current_branch: Option<String>,
    rebase: Option<ActiveRebase>,
    index_locked: bool,
    next_oid: u64,
    /// Branches which, the next time they're rebased onto anything, produce a
    /// conflict on the given commit instead of succeeding.
    conflict_plan: HashMap<String, Sha>,
    dirty_paths: Vec<String>,
    /// Every `push` call made through the adapter, in order.
    pushes: Vec<(String, PushForce)>,
}

/// An in-memory stand-in repository plus adapter. One [`FakeAdapter`] models
/// exactly one repository; `repo_path` arguments are accepted for interface
/// compatibility but ignored.
pub struct FakeAdapter {
    state: Mutex<FakeState>,
}

impl Default for FakeAdapter {
    fn default() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
        }
    }
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_oid(state: &mut FakeState) -> Sha {
        state.next_oid += 1;
        Sha(format!("{:040x}", state.next_oid))
    }

    /// Seed a root commit (no parent) and return its sha.
    pub fn seed_root(&self, message: &str) -> Sha {
        let mut state = self.state.lock().unwrap();
        let oid = Self::fresh_oid(&mut state);
        state.commits.insert(
            oid.0.clone(),
            FakeCommit {
                message: message.to_string(),
                parent: None,
            },
        );
        oid
    }

    /// Seed a commit on top of `parent` and return its sha.
    pub fn seed_commit(&self, parent: &Sha, message: &str) -> Sha {
        let mut state = self.state.lock().unwrap();
        let oid = Self::fresh_oid(&mut state);
        state.commits.insert(
            oid.0.clone(),
            FakeCommit {
                message: message.to_string(),
                parent: Some(parent.clone()),
            },
        );
        oid
    }

    pub fn set_branch(&self, name: &str, sha: &Sha) {
        let mut state = self.state.lock().unwrap();
        state.branches.insert(name.to_string(), sha.clone());
    }

    pub fn head_of(&self, name: &str) -> Sha {
        self.state
            .lock()
            .unwrap()
            .branches
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_current_branch(&self, name: Option<&str>) {
        self.state.lock().unwrap().current_branch = name.map(str::to_string);
    }

    pub fn add_worktree(&self, worktree: Worktree) {
        self.state.lock().unwrap().worktrees.push(worktree);
    }

    pub fn set_dirty_paths(&self, paths: Vec<String>) {
        self.state.lock().unwrap().dirty_paths = paths;
    }

    pub fn set_index_locked(&self, locked: bool) {
        self.state.lock().unwrap().index_locked = locked;
    }

    /// Arrange for the next rebase of `branch` to conflict on `commit`
    /// instead of succeeding.
    pub fn plan_conflict(&self, branch: &str, commit: &Sha) {
        self.state
            .lock()
            .unwrap()
            .conflict_plan
            .insert(branch.to_string(), commit.clone());
    }

    fn ancestors_between(state: &FakeState, from_exclusive: &Sha, to_inclusive: &Sha) -> Vec<Sha> {
        let mut chain = Vec::new();
        let mut cursor = Some(to_inclusive.clone());
        while let Some(current) = cursor {
            if &current == from_exclusive {
                break;
            }
            chain.push(current.clone());
            cursor = state.commits.get(&current.0).and_then(|c| c.parent.clone());
        }
        chain.reverse();
        chain
    }

    /// Replays `originals` (oldest first) as fresh commits on top of `head`,
    /// returning the rebuilt tip.
    fn replay_onto(state: &mut FakeState, head: Sha, originals: &[Sha]) -> Sha {
        let mut head = head;
        for original in originals {
            let message = state
                .commits
                .get(&original.0)
                .map(|c| c.message.clone())
                .unwrap_or_default();
            let new_oid = Self::fresh_oid(state);
            state.commits.insert(
                new_oid.0.clone(),
                FakeCommit {
                    message,
                    parent: Some(head.clone()),
                },
            );
            head = new_oid;
        }
        head
    }

    fn externally_complete(&self, branch: &str, new_head: &Sha) {
        let mut state = self.state.lock().unwrap();
        state.branches.insert(branch.to_string(), new_head.clone());
        state.rebase = None;
    }

    /// Simulate a user running `rebase --continue` outside of the engine and
    /// the tool finishing on its own, for external-completion scenarios.
    pub fn simulate_external_completion(&self, branch: &str, new_head: &Sha) {
        self.externally_complete(branch, new_head);
    }

    /// The `(ref, force)` pairs pushed through this adapter so far.
    pub fn pushed(&self) -> Vec<(String, PushForce)> {
        self.state.lock().unwrap().pushes.clone()
    }
}

impl VcsAdapter for FakeAdapter {
    fn list_branches(&self, _repo_path: &Path, _remote_only: bool) -> VcsResult<Vec<Branch>> {
        let state = self.state.lock().unwrap();
        let trunk_names = ["main", "master", "develop", "trunk"];
        Ok(state
            .branches
            .iter()
            .map(|(name, sha)| Branch {
                ref_name: name.clone(),
                head_sha: sha.clone(),
                is_trunk: trunk_names.contains(&name.as_str()),
                is_remote: false,
            })
            .collect())
    }

    fn list_remotes(&self, _repo_path: &Path) -> VcsResult<Vec<Remote>> {
        Ok(Vec::new())
    }

    fn list_worktrees(&self, _repo_path: &Path, skip_dirty: bool) -> VcsResult<Vec<Worktree>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .worktrees
            .iter()
            .filter(|w| !skip_dirty || !w.is_dirty)
            .cloned()
            .collect())
    }

    fn log(
        &self,
        _repo_path: &Path,
        reference: &str,
        depth: Option<usize>,
        max: Option<usize>,
    ) -> VcsResult<Vec<Commit>> {
        let start = self.resolve_ref(Path::new(""), reference)?;
        let state = self.state.lock().unwrap();
        let mut out = Vec::new();
        let mut cursor = Some(start);
        let mut i = 0;
        while let Some(sha) = cursor {
            if sha.is_empty() {
                break;
            }
            if let Some(depth) = depth {
                if i >= depth {
                    break;
                }
            }
            if let Some(max) = max {
                if out.len() >= max {
                    break;
                }
            }
            let commit = match state.commits.get(&sha.0) {
                Some(c) => c,
                None => break,
            };
            out.push(Commit {
                sha: sha.clone(),
                message: commit.message.clone(),
                time_ms: 0,
                parent_sha: commit.parent.clone(),
                children_sha: Vec::new(),
            });
            cursor = commit.parent.clone();
            i += 1;
        }
        Ok(out)
    }

    fn resolve_ref(&self, _repo_path: &Path, reference: &str) -> VcsResult<Sha> {
        let state = self.state.lock().unwrap();
        if let Some(sha) = state.branches.get(reference) {
            return Ok(sha.clone());
        }
        if reference == "HEAD" {
            if let Some(branch) = &state.current_branch {
                if let Some(sha) = state.branches.get(branch) {
                    return Ok(sha.clone());
                }
            }
        }
        if state.commits.contains_key(reference) {
            return Ok(Sha(reference.to_string()));
        }
        Ok(Sha::default())
    }

    fn current_branch(&self, _repo_path: &Path) -> VcsResult<Option<String>> {
        Ok(self.state.lock().unwrap().current_branch.clone())
    }

    fn working_tree_status(&self, _repo_path: &Path) -> VcsResult<WorkingTreeStatus> {
        let state = self.state.lock().unwrap();
        Ok(WorkingTreeStatus {
            modified: state.dirty_paths.clone(),
            current_branch: state.current_branch.clone(),
            current_commit_sha: state
                .current_branch
                .as_ref()
                .and_then(|b| state.branches.get(b))
                .cloned(),
            detached: state.current_branch.is_none(),
            is_rebasing: state.rebase.is_some(),
            ..Default::default()
        })
    }

    fn checkout(
        &self,
        repo_path: &Path,
        reference: &str,
        options: CheckoutOptions,
    ) -> VcsResult<()> {
        if !options.force {
            let status = self.working_tree_status(repo_path)?;
            if !status.is_clean() {
                return Err(VcsError::DirtyWorktree {
                    path: repo_path.to_path_buf(),
                });
            }
        }
        let mut state = self.state.lock().unwrap();
        if !options.detach {
            if options.create && !state.branches.contains_key(reference) {
                let head = state
                    .current_branch
                    .as_ref()
                    .and_then(|b| state.branches.get(b))
                    .cloned()
                    .unwrap_or_default();
                state.branches.insert(reference.to_string(), head);
            }
            state.current_branch = Some(reference.to_string());
        } else {
            state.current_branch = None;
        }
        Ok(())
    }

    fn branch_create(&self, _repo_path: &Path, name: &str, target: &Sha) -> VcsResult<()> {
        let mut state = self.state.lock().unwrap();
        for worktree in &state.worktrees {
            if worktree.branch.as_deref() == Some(name) {
                return Err(VcsError::WorktreeConflict {
                    branch: name.to_string(),
                    path: PathBuf::from(&worktree.path),
                });
            }
        }
        state.branches.insert(name.to_string(), target.clone());
        Ok(())
    }

    fn branch_delete(&self, _repo_path: &Path, name: &str) -> VcsResult<()> {
        self.state.lock().unwrap().branches.remove(name);
        Ok(())
    }

    fn branch_rename(&self, _repo_path: &Path, old_name: &str, new_name: &str) -> VcsResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(sha) = state.branches.remove(old_name) {
            state.branches.insert(new_name.to_string(), sha);
        }
        Ok(())
    }

    fn reset(&self, _repo_path: &Path, _mode: ResetMode, reference: &str) -> VcsResult<()> {
        let target = self.resolve_ref(Path::new(""), reference)?;
        let mut state = self.state.lock().unwrap();
        if let Some(branch) = state.current_branch.clone() {
            state.branches.insert(branch, target);
        }
        Ok(())
    }

    fn rebase(
        &self,
        repo_path: &Path,
        onto: &Sha,
        from: &Sha,
        to: &str,
    ) -> VcsResult<RebaseOutcome> {
        if self.is_index_locked(repo_path)? {
            return Err(VcsError::IndexLocked {
                path: repo_path.to_path_buf(),
            });
        }
        let mut state = self.state.lock().unwrap();
        let to_head = state
            .branches
            .get(to)
            .cloned()
            .ok_or_else(|| VcsError::UnresolvableRef {
                reference: to.to_string(),
            })?;
        let conflict_at = state.conflict_plan.remove(to);
        let originals = Self::ancestors_between(&state, from, &to_head);

        let mut rebase = ActiveRebase {
            onto: onto.clone(),
            to: to.to_string(),
            pending: Vec::new(),
            new_head: onto.clone(),
            original_head: to_head,
            conflicted_on: None,
        };

        // Replay each original commit as a new commit on top of the new base.
        for (i, original) in originals.iter().enumerate() {
            if conflict_at.as_ref() == Some(original) {
                rebase.conflicted_on = Some(original.clone());
                rebase.pending = originals[i + 1..].to_vec();
                let branch = rebase.to.clone();
                let conflicted_head = rebase.new_head.clone();
                state.rebase = Some(rebase);
                drop(state);
                return Ok(RebaseOutcome::conflicted(
                    vec![format!("conflict replaying {original} onto {branch}")],
                    Some(conflicted_head),
                ));
            }
            let message = state
                .commits
                .get(&original.0)
                .map(|c| c.message.clone())
                .unwrap_or_default();
            let new_oid = Self::fresh_oid(&mut state);
            state.commits.insert(
                new_oid.0.clone(),
                FakeCommit {
                    message,
                    parent: Some(rebase.new_head.clone()),
                },
            );
            rebase.new_head = new_oid;
        }

        state.branches.insert(to.to_string(), rebase.new_head.clone());
        state.rebase = None;
        let new_head = rebase.new_head;
        Ok(RebaseOutcome::ok(new_head))
    }

    fn rebase_continue(&self, _repo_path: &Path) -> VcsResult<RebaseOutcome> {
        let mut state = self.state.lock().unwrap();
        let mut rebase = state
            .rebase
            .take()
            .ok_or_else(|| VcsError::Other("no rebase in progress".to_string()))?;
        // The conflicted commit was resolved by the caller, so it is replayed
        // first, then the rest of the queue.
        let mut to_replay: Vec<Sha> = rebase.conflicted_on.take().into_iter().collect();
        to_replay.extend(rebase.pending.drain(..));
        let new_head = Self::replay_onto(&mut state, rebase.new_head, &to_replay);
        state.branches.insert(rebase.to, new_head.clone());
        Ok(RebaseOutcome::ok(new_head))
    }

    fn rebase_abort(&self, _repo_path: &Path) -> VcsResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(rebase) = state.rebase.take() {
            state.branches.insert(rebase.to, rebase.original_head);
        }
        Ok(())
    }

    fn rebase_skip(&self, _repo_path: &Path) -> VcsResult<RebaseOutcome> {
        let mut state = self.state.lock().unwrap();
        let mut rebase = state
            .rebase
            .take()
            .ok_or_else(|| VcsError::Other("no rebase in progress".to_string()))?;
        // Skip drops the conflicted commit on the floor and replays the rest.
        rebase.conflicted_on = None;
        let pending: Vec<Sha> = rebase.pending.drain(..).collect();
        let new_head = Self::replay_onto(&mut state, rebase.new_head, &pending);
        state.branches.insert(rebase.to, new_head.clone());
        Ok(RebaseOutcome::ok(new_head))
    }

    fn get_rebase_state(&self, _repo_path: &Path) -> VcsResult<Option<RebaseStateInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state.rebase.as_ref().map(|r| RebaseStateInfo {
            branch: r.to.clone(),
            onto: r.onto.clone(),
            original_head: r.original_head.clone(),
            current_step: 0,
            total_steps: r.pending.len(),
        }))
    }

    fn merge_base(&self, _repo_path: &Path, one: &str, two: &str) -> VcsResult<Option<Sha>> {
        let one = self
            .resolve_ref(Path::new(""), one)
            .unwrap_or_default();
        let two = self
            .resolve_ref(Path::new(""), two)
            .unwrap_or_default();
        let state = self.state.lock().unwrap();
        let mut one_ancestors = std::collections::HashSet::new();
        let mut cursor = Some(one);
        while let Some(sha) = cursor {
            one_ancestors.insert(sha.clone());
            cursor = state.commits.get(&sha.0).and_then(|c| c.parent.clone());
        }
        let mut cursor = Some(two);
        while let Some(sha) = cursor {
            if one_ancestors.contains(&sha) {
                return Ok(Some(sha));
            }
            cursor = state.commits.get(&sha.0).and_then(|c| c.parent.clone());
        }
        Ok(None)
    }

    fn is_ancestor(&self, repo_path: &Path, ancestor: &str, descendant: &str) -> VcsResult<bool> {
        let ancestor_sha = self.resolve_ref(repo_path, ancestor)?;
        let descendant_sha = self.resolve_ref(repo_path, descendant)?;
        let state = self.state.lock().unwrap();
        let mut cursor = Some(descendant_sha.clone());
        while let Some(sha) = cursor {
            if sha == ancestor_sha {
                return Ok(true);
            }
            cursor = state.commits.get(&sha.0).and_then(|c| c.parent.clone());
        }
        Ok(false)
    }

    fn format_patch(&self, _repo_path: &Path, _range: &str) -> VcsResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn apply_patch(&self, _repo_path: &Path, _patch: &[u8]) -> VcsResult<PatchApplyOutcome> {
        Ok(PatchApplyOutcome {
            success: true,
            conflicts: Vec::new(),
        })
    }

    fn push(
        &self,
        _repo_path: &Path,
        _remote: &str,
        reference: &str,
        force: PushForce,
        _set_upstream: bool,
    ) -> VcsResult<()> {
        self.state
            .lock()
            .unwrap()
            .pushes
            .push((reference.to_string(), force));
        Ok(())
    }

    fn fetch(&self, _repo_path: &Path, _remote: &str) -> VcsResult<()> {
        Ok(())
    }

    fn is_index_locked(&self, _repo_path: &Path) -> VcsResult<bool> {
        Ok(self.state.lock().unwrap().index_locked)
    }
}
