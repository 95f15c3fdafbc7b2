//! `git2` + subprocess-backed implementation of [`VcsAdapter`].
//!
//! Reads (`log`, `resolve_ref`, `list_branches`, `list_worktrees`,
//! `working_tree_status`) go through `git2`, with its `ENOTFOUND` errors
//! turned into `Option`s rather than propagated. Operations that must run
//! hooks or support the exact CLI behaviour a user would see (`checkout`,
//! `rebase`, `push`) shell out to the `git` binary via [`GitRunInfo`].

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use chrono::DateTime;
use git2::{BranchType as Git2BranchType, RepositoryState};
use itertools::Itertools;
use tracing::instrument;

use crate::error::{VcsError, VcsResult};
use crate::run::GitRunInfo;
use crate::types::{
    Branch, CheckoutOptions, Commit, PatchApplyOutcome, PushForce, RebaseOutcome,
    RebaseStateInfo, Remote, ResetMode, Sha, WorkingTreeStatus, Worktree,
};
use crate::VcsAdapter;

/// Goes through `chrono` rather than hand-rolling the epoch-seconds-to-millis
/// conversion, so a `git2::Time` with a nonsensical value (pre-epoch,
/// overflowing) becomes a clean zero instead of silently wrapping.
fn commit_time_ms(commit: &git2::Commit) -> i64 {
    DateTime::from_timestamp(commit.time().seconds(), 0)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

pub struct GitAdapter {
    pub git_run_info: GitRunInfo,
}

impl Default for GitAdapter {
    fn default() -> Self {
        Self {
            git_run_info: GitRunInfo::default(),
        }
    }
}

impl GitAdapter {
    fn open(&self, repo_path: &Path) -> VcsResult<git2::Repository> {
        Ok(git2::Repository::open(repo_path)?)
    }

    fn run(&self, repo_path: &Path, operation: &str, args: &[&str]) -> VcsResult<(i32, String, String)> {
        let args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
        let result = self.git_run_info.run(repo_path, operation, &args)?;
        Ok((
            result.exit_code,
            result.stdout.to_str_lossy().into_owned(),
            result.stderr.to_str_lossy().into_owned(),
        ))
    }

    fn conflicted_paths(&self, repo: &git2::Repository) -> VcsResult<Vec<String>> {
        let index = repo.index()?;
        let mut paths = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
                paths.push(entry.path.to_str_lossy().into_owned());
            }
        }
        // A path can appear up to three times (ours/theirs/ancestor entries
        // each surface it).
        Ok(paths.into_iter().sorted().dedup().collect())
    }

    fn index_lock_path(&self, repo: &git2::Repository) -> PathBuf {
        repo.path().join("index.lock")
    }
}

impl VcsAdapter for GitAdapter {
    #[instrument(skip(self))]
    fn list_branches(&self, repo_path: &Path, remote_only: bool) -> VcsResult<Vec<Branch>> {
        let repo = self.open(repo_path)?;
        let filter = if remote_only {
            Some(Git2BranchType::Remote)
        } else {
            None
        };
        let main_branch_names = ["main", "master", "develop", "trunk"];
        let mut out = Vec::new();
        for branch in repo.branches(filter)? {
            let (branch, branch_type) = branch?;
            let name = match branch.name()? {
                Some(name) => name.to_string(),
                None => continue,
            };
            let head_sha = match branch.get().target() {
                Some(oid) => Sha(oid.to_string()),
                None => continue,
            };
            let is_remote = branch_type == Git2BranchType::Remote;
            let short_name = name.rsplit('/').next().unwrap_or(&name);
            out.push(Branch {
                ref_name: name.clone(),
                head_sha,
                is_trunk: main_branch_names.contains(&short_name.to_lowercase().as_str()),
                is_remote,
            });
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    fn list_remotes(&self, repo_path: &Path) -> VcsResult<Vec<Remote>> {
        let repo = self.open(repo_path)?;
        let names = repo.remotes()?;
        let mut out = Vec::new();
        for name in names.iter().flatten() {
            let remote = repo.find_remote(name)?;
            out.push(Remote {
                name: name.to_string(),
                url: remote.url().unwrap_or_default().to_string(),
            });
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    fn list_worktrees(&self, repo_path: &Path, skip_dirty: bool) -> VcsResult<Vec<Worktree>> {
        let repo = self.open(repo_path)?;
        let mut out = Vec::new();

        let main_status = self.working_tree_status(repo_path)?;
        let main_head = repo.head().ok().and_then(|h| h.target());
        out.push(Worktree {
            path: repo_path.to_string_lossy().into_owned(),
            head_sha: main_head.map(|oid| Sha(oid.to_string())).unwrap_or_default(),
            branch: main_status.current_branch.clone(),
            is_main: true,
            is_stale: false,
            is_dirty: !main_status.is_clean(),
        });

        for name in repo.worktrees()?.iter().flatten() {
            let worktree = repo.find_worktree(name)?;
            let path = worktree.path().to_path_buf();
            let is_stale = worktree.validate().is_err();
            let (head_sha, branch, is_dirty) = if is_stale {
                (Sha::default(), None, false)
            } else {
                match git2::Repository::open(&path) {
                    Ok(wt_repo) => {
                        let head_sha = wt_repo
                            .head()
                            .ok()
                            .and_then(|h| h.target())
                            .map(|oid| Sha(oid.to_string()))
                            .unwrap_or_default();
                        let branch = wt_repo
                            .head()
                            .ok()
                            .filter(|h| h.is_branch())
                            .and_then(|h| h.shorthand().map(str::to_string));
                        let status = self.working_tree_status(&path)?;
                        (head_sha, branch, !status.is_clean())
                    }
                    Err(_) => (Sha::default(), None, false),
                }
            };
            if skip_dirty && is_dirty {
                continue;
            }
            out.push(Worktree {
                path: path.to_string_lossy().into_owned(),
                head_sha,
                branch,
                is_main: false,
                is_stale,
                is_dirty,
            });
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    fn log(
        &self,
        repo_path: &Path,
        reference: &str,
        depth: Option<usize>,
        max: Option<usize>,
    ) -> VcsResult<Vec<Commit>> {
        let repo = self.open(repo_path)?;
        let obj = repo.revparse_single(reference)?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push(obj.id())?;
        let mut out = Vec::new();
        for (i, oid) in revwalk.enumerate() {
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
            let oid = oid?;
            let commit = repo.find_commit(oid)?;
            out.push(Commit {
                sha: Sha(oid.to_string()),
                message: commit.message().unwrap_or_default().to_string(),
                time_ms: commit_time_ms(&commit),
                parent_sha: commit.parent_id(0).ok().map(|id| Sha(id.to_string())),
                children_sha: Vec::new(),
            });
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    fn resolve_ref(&self, repo_path: &Path, reference: &str) -> VcsResult<Sha> {
        let repo = self.open(repo_path)?;
        let result = match repo.revparse_single(reference) {
            Ok(obj) => Ok(Sha(obj.id().to_string())),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(Sha::default()),
            Err(err) => Err(err.into()),
        };
        result
    }

    #[instrument(skip(self))]
    fn current_branch(&self, repo_path: &Path) -> VcsResult<Option<String>> {
        let repo = self.open(repo_path)?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(err) if err.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(str::to_string))
    }

    #[instrument(skip(self))]
    fn working_tree_status(&self, repo_path: &Path) -> VcsResult<WorkingTreeStatus> {
        let repo = self.open(repo_path)?;
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true).renames_head_to_index(true);
        let statuses = repo.statuses(Some(&mut opts))?;

        let mut status = WorkingTreeStatus::default();
        for entry in statuses.iter() {
            let path = entry.path().unwrap_or_default().to_string();
            let flags = entry.status();
            if flags.is_conflicted() {
                status.conflicted.push(path);
                continue;
            }
            if flags.is_index_new() {
                status.created.push(path.clone());
            }
            if flags.is_index_modified() || flags.is_wt_modified() {
                status.modified.push(path.clone());
            }
            if flags.is_index_deleted() || flags.is_wt_deleted() {
                status.deleted.push(path.clone());
            }
            if flags.is_index_renamed() || flags.is_wt_renamed() {
                status.renamed.push(path.clone());
            }
            if flags.is_wt_new() {
                status.not_added.push(path.clone());
            }
            if flags.is_index_new()
                || flags.is_index_modified()
                || flags.is_index_deleted()
                || flags.is_index_renamed()
            {
                status.staged.push(path);
            }
        }

        status.is_rebasing = matches!(
            repo.state(),
            RepositoryState::Rebase
                | RepositoryState::RebaseInteractive
                | RepositoryState::RebaseMerge
        );
        let head = repo.head().ok();
        status.detached = head.as_ref().map(|h| !h.is_branch()).unwrap_or(false);
        status.current_branch = head
            .as_ref()
            .filter(|h| h.is_branch())
            .and_then(|h| h.shorthand().map(str::to_string));
        status.current_commit_sha = head
            .as_ref()
            .and_then(|h| h.target())
            .map(|oid| Sha(oid.to_string()));
        Ok(status)
    }

    #[instrument(skip(self))]
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
        let mut args = vec!["checkout"];
        if options.force {
            args.push("--force");
        }
        if options.detach {
            args.push("--detach");
        }
        if options.create {
            args.push("-b");
        }
        args.push(reference);
        let (exit_code, _stdout, stderr) = self.run(repo_path, "checkout", &args)?;
        if exit_code != 0 {
            return Err(VcsError::Other(format!("checkout failed: {stderr}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn branch_create(&self, repo_path: &Path, name: &str, target: &Sha) -> VcsResult<()> {
        let repo = self.open(repo_path)?;
        let oid = git2::Oid::from_str(&target.0)?;
        let commit = repo.find_commit(oid)?;
        self.guard_worktree_conflict(repo_path, name)?;
        repo.branch(name, &commit, false)?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn branch_delete(&self, repo_path: &Path, name: &str) -> VcsResult<()> {
        self.guard_worktree_conflict(repo_path, name)?;
        let repo = self.open(repo_path)?;
        let mut branch = repo
            .find_branch(name, Git2BranchType::Local)?;
        branch.delete()?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn branch_rename(&self, repo_path: &Path, old_name: &str, new_name: &str) -> VcsResult<()> {
        self.guard_worktree_conflict(repo_path, old_name)?;
        let repo = self.open(repo_path)?;
        let mut branch = repo.find_branch(old_name, Git2BranchType::Local)?;
        branch.rename(new_name, false)?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn reset(&self, repo_path: &Path, mode: ResetMode, reference: &str) -> VcsResult<()> {
        let repo = self.open(repo_path)?;
        let obj = repo.revparse_single(reference)?;
        let kind = match mode {
            ResetMode::Soft => git2::ResetType::Soft,
            ResetMode::Mixed => git2::ResetType::Mixed,
            ResetMode::Hard => git2::ResetType::Hard,
        };
        repo.reset(&obj, kind, None)?;
        Ok(())
    }

    #[instrument(skip(self))]
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
        let (exit_code, _stdout, stderr) = self.run(
            repo_path,
            "rebase",
            &["rebase", "--onto", &onto.0, &from.0, to],
        )?;
        self.interpret_rebase_result(repo_path, exit_code, &stderr, to)
    }

    #[instrument(skip(self))]
    fn rebase_continue(&self, repo_path: &Path) -> VcsResult<RebaseOutcome> {
        let branch = self
            .get_rebase_state(repo_path)?
            .map(|state| state.branch)
            .unwrap_or_default();
        let (exit_code, _stdout, stderr) =
            self.run(repo_path, "rebase --continue", &["rebase", "--continue"])?;
        self.interpret_rebase_result(repo_path, exit_code, &stderr, &branch)
    }

    #[instrument(skip(self))]
    fn rebase_abort(&self, repo_path: &Path) -> VcsResult<()> {
        let (exit_code, _stdout, stderr) =
            self.run(repo_path, "rebase --abort", &["rebase", "--abort"])?;
        if exit_code != 0 {
            return Err(VcsError::Other(format!("rebase --abort failed: {stderr}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn rebase_skip(&self, repo_path: &Path) -> VcsResult<RebaseOutcome> {
        let branch = self
            .get_rebase_state(repo_path)?
            .map(|state| state.branch)
            .unwrap_or_default();
        let (exit_code, _stdout, stderr) =
            self.run(repo_path, "rebase --skip", &["rebase", "--skip"])?;
        self.interpret_rebase_result(repo_path, exit_code, &stderr, &branch)
    }

    #[instrument(skip(self))]
    fn get_rebase_state(&self, repo_path: &Path) -> VcsResult<Option<RebaseStateInfo>> {
        let repo = self.open(repo_path)?;
        if !matches!(
            repo.state(),
            RepositoryState::Rebase
                | RepositoryState::RebaseInteractive
                | RepositoryState::RebaseMerge
        ) {
            return Ok(None);
        }
        let git_dir = repo.path();
        let (rebase_dir, onto_file, head_name_file) = if git_dir.join("rebase-merge").is_dir() {
            (
                git_dir.join("rebase-merge"),
                "onto",
                "head-name",
            )
        } else {
            (git_dir.join("rebase-apply"), "onto", "head-name")
        };
        let onto = std::fs::read_to_string(rebase_dir.join(onto_file))
            .ok()
            .map(|s| Sha(s.trim().to_string()))
            .unwrap_or_default();
        let branch = std::fs::read_to_string(rebase_dir.join(head_name_file))
            .ok()
            .map(|s| s.trim().trim_start_matches("refs/heads/").to_string())
            .unwrap_or_default();
        let original_head = std::fs::read_to_string(rebase_dir.join("orig-head"))
            .ok()
            .map(|s| Sha(s.trim().to_string()))
            .unwrap_or_default();
        let current_step = std::fs::read_to_string(rebase_dir.join("msgnum"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        let total_steps = std::fs::read_to_string(rebase_dir.join("end"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        Ok(Some(RebaseStateInfo {
            branch,
            onto,
            original_head,
            current_step,
            total_steps,
        }))
    }

    #[instrument(skip(self))]
    fn merge_base(&self, repo_path: &Path, one: &str, two: &str) -> VcsResult<Option<Sha>> {
        let repo = self.open(repo_path)?;
        let one = repo.revparse_single(one)?.id();
        let two = repo.revparse_single(two)?.id();
        match repo.merge_base(one, two) {
            Ok(oid) => Ok(Some(Sha(oid.to_string()))),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip(self))]
    fn is_ancestor(&self, repo_path: &Path, ancestor: &str, descendant: &str) -> VcsResult<bool> {
        let repo = self.open(repo_path)?;
        let ancestor = repo.revparse_single(ancestor)?.id();
        let descendant = repo.revparse_single(descendant)?.id();
        Ok(repo.graph_descendant_of(descendant, ancestor)? || ancestor == descendant)
    }

    #[instrument(skip(self))]
    fn format_patch(&self, repo_path: &Path, range: &str) -> VcsResult<Vec<u8>> {
        let (exit_code, stdout, stderr) =
            self.run(repo_path, "format-patch", &["format-patch", "--stdout", range])?;
        if exit_code != 0 {
            return Err(VcsError::Other(format!("format-patch failed: {stderr}")));
        }
        Ok(stdout.into_bytes())
    }

    #[instrument(skip(self, patch))]
    fn apply_patch(&self, repo_path: &Path, patch: &[u8]) -> VcsResult<PatchApplyOutcome> {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new()?;
        tmp.write_all(patch)?;
        let path = tmp.path().to_string_lossy().into_owned();
        let (exit_code, _stdout, stderr) = self.run(repo_path, "apply", &["apply", "--3way", &path])?;
        if exit_code == 0 {
            Ok(PatchApplyOutcome {
                success: true,
                conflicts: Vec::new(),
            })
        } else {
            let repo = self.open(repo_path)?;
            let conflicts = self.conflicted_paths(&repo).unwrap_or_default();
            Ok(PatchApplyOutcome {
                success: false,
                conflicts: if conflicts.is_empty() {
                    vec![stderr]
                } else {
                    conflicts
                },
            })
        }
    }

    #[instrument(skip(self))]
    fn push(
        &self,
        repo_path: &Path,
        remote: &str,
        reference: &str,
        force: PushForce,
        set_upstream: bool,
    ) -> VcsResult<()> {
        let mut args = vec!["push".to_string()];
        match force {
            PushForce::None => {}
            PushForce::Force => args.push("--force".to_string()),
            PushForce::ForceWithLease { expect } => {
                // An explicit expect value: a bare --force-with-lease would
                // let git fall back to the remote-tracking ref, which may be
                // stale or already updated by a background fetch.
                args.push(format!("--force-with-lease={reference}:{expect}"));
            }
        }
        if set_upstream {
            args.push("--set-upstream".to_string());
        }
        args.push(remote.to_string());
        args.push(reference.to_string());
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        let (exit_code, _stdout, stderr) = self.run(repo_path, "push", &args_ref)?;
        if exit_code != 0 {
            if stderr.contains("non-fast-forward") || stderr.contains("stale info") {
                return Err(VcsError::NonFastForward {
                    branch: reference.to_string(),
                    remote: remote.to_string(),
                });
            }
            return Err(VcsError::Other(format!("push failed: {stderr}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn fetch(&self, repo_path: &Path, remote: &str) -> VcsResult<()> {
        let (exit_code, _stdout, stderr) = self.run(repo_path, "fetch", &["fetch", remote])?;
        if exit_code != 0 {
            return Err(VcsError::Network {
                remote: remote.to_string(),
                source: eyre::eyre!(stderr),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn is_index_locked(&self, repo_path: &Path) -> VcsResult<bool> {
        let repo = self.open(repo_path)?;
        Ok(self.index_lock_path(&repo).exists())
    }
}

impl GitAdapter {
    fn guard_worktree_conflict(&self, repo_path: &Path, branch: &str) -> VcsResult<()> {
        for worktree in self.list_worktrees(repo_path, false)? {
            if worktree.branch.as_deref() == Some(branch) && !worktree.is_main {
                return Err(VcsError::WorktreeConflict {
                    branch: branch.to_string(),
                    path: PathBuf::from(&worktree.path),
                });
            }
        }
        Ok(())
    }

    fn interpret_rebase_result(
        &self,
        repo_path: &Path,
        exit_code: i32,
        stderr: &str,
        branch: &str,
    ) -> VcsResult<RebaseOutcome> {
        if exit_code == 0 {
            let head = self.resolve_ref(repo_path, "HEAD")?;
            return Ok(RebaseOutcome::ok(head));
        }
        let repo = self.open(repo_path)?;
        if matches!(
            repo.state(),
            RepositoryState::Rebase | RepositoryState::RebaseInteractive | RepositoryState::RebaseMerge
        ) {
            let conflicts = self.conflicted_paths(&repo)?;
            if !conflicts.is_empty() {
                let head = self.resolve_ref(repo_path, "HEAD").ok();
                return Ok(RebaseOutcome::conflicted(conflicts, head));
            }
        }
        Err(VcsError::Conflict {
            branch: branch.to_string(),
            conflicts: vec![stderr.to_string()],
        })
    }
}
