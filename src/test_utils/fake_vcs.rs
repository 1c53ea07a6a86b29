//! In-memory [`GitBackend`] for deterministic tests.
//!
//! [`FakeVcs`] keeps two tables: upstream repositories keyed by URL and
//! clones keyed by path. Clones are real directories on disk so that
//! metadata files can be read after a checkout, but all history lives in
//! memory. Mutating commands are recorded in call order, which lets tests
//! assert exact command sequences.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::ORIGIN_REMOTE;
use crate::core::ZkgError;
use crate::git::GitBackend;
use crate::utils::fs::copy_over_path;

static NEXT_COMMIT: AtomicU64 = AtomicU64::new(1);

fn next_commit_id() -> String {
    format!("{:040x}", NEXT_COMMIT.fetch_add(1, Ordering::Relaxed))
}

/// Files of one commit: relative path to content.
pub type FakeTree = BTreeMap<String, String>;

/// Where `HEAD` points in a fake repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeHead {
    /// On a branch.
    Branch(String),
    /// Detached at a commit.
    Detached(String),
    /// No commits yet.
    Unborn,
}

/// State of one fake repository.
#[derive(Debug, Clone)]
pub struct FakeRepo {
    /// Commit id to file tree.
    pub commits: BTreeMap<String, FakeTree>,
    /// Local branch name to commit id.
    pub branches: BTreeMap<String, String>,
    /// Remote-tracking branches of origin, name to commit id.
    pub remote_branches: BTreeMap<String, String>,
    /// Tag name to commit id.
    pub tags: BTreeMap<String, String>,
    /// Current `HEAD`.
    pub head: FakeHead,
    /// URL of the origin remote.
    pub origin_url: Option<String>,
    /// Whether an origin remote is configured.
    pub has_origin: bool,
    /// Target of `origin/HEAD`, e.g. `origin/main`.
    pub remote_head: Option<String>,
    /// Whether history is truncated.
    pub shallow: bool,
    /// Whether shallow clones of this repository fail.
    pub reject_shallow: bool,
    needs_reset: bool,
    needs_clean: bool,
}

impl FakeRepo {
    /// A repository with one empty commit on `branch`.
    pub fn new(branch: &str) -> Self {
        let commit = next_commit_id();
        let mut repo = Self::empty();
        repo.commits.insert(commit.clone(), FakeTree::new());
        repo.branches.insert(branch.to_string(), commit);
        repo.head = FakeHead::Branch(branch.to_string());
        repo
    }

    /// A repository without any commits.
    pub fn empty() -> Self {
        Self {
            commits: BTreeMap::new(),
            branches: BTreeMap::new(),
            remote_branches: BTreeMap::new(),
            tags: BTreeMap::new(),
            head: FakeHead::Unborn,
            origin_url: None,
            has_origin: true,
            remote_head: None,
            shallow: false,
            reject_shallow: false,
            needs_reset: false,
            needs_clean: false,
        }
    }

    /// Commit `HEAD` resolves to.
    pub fn head_commit(&self) -> Option<String> {
        match &self.head {
            FakeHead::Branch(b) => self.branches.get(b).cloned(),
            FakeHead::Detached(c) => Some(c.clone()),
            FakeHead::Unborn => None,
        }
    }

    fn head_tree(&self) -> FakeTree {
        self.head_commit().and_then(|c| self.commits.get(&c).cloned()).unwrap_or_default()
    }

    /// Adds a commit on `branch` (created if missing) holding `files` on top
    /// of the branch's current tree. Returns the new commit id.
    pub fn commit_on(&mut self, branch: &str, files: &[(&str, &str)]) -> String {
        let mut tree = self
            .branches
            .get(branch)
            .and_then(|c| self.commits.get(c).cloned())
            .unwrap_or_else(|| self.head_tree());
        for (path, content) in files {
            tree.insert((*path).to_string(), (*content).to_string());
        }
        let commit = next_commit_id();
        self.commits.insert(commit.clone(), tree);
        self.branches.insert(branch.to_string(), commit.clone());
        if self.head == FakeHead::Unborn {
            self.head = FakeHead::Branch(branch.to_string());
        }
        commit
    }

    /// Adds a file to the checked out branch in a new commit.
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        let branch = match &self.head {
            FakeHead::Branch(b) => b.clone(),
            _ => "main".to_string(),
        };
        self.commit_on(&branch, &[(path, content)]);
        self
    }

    /// Tags a new commit derived from `HEAD`.
    pub fn with_tag(self, name: &str) -> Self {
        self.with_tag_files(name, &[])
    }

    /// Tags a new commit derived from `HEAD` with extra `files`.
    pub fn with_tag_files(mut self, name: &str, files: &[(&str, &str)]) -> Self {
        let mut tree = self.head_tree();
        for (path, content) in files {
            tree.insert((*path).to_string(), (*content).to_string());
        }
        let commit = next_commit_id();
        self.commits.insert(commit.clone(), tree);
        self.tags.insert(name.to_string(), commit);
        self
    }

    /// Adds a branch at a new commit derived from `HEAD`.
    pub fn with_branch(mut self, name: &str) -> Self {
        let tree = self.head_tree();
        let commit = next_commit_id();
        self.commits.insert(commit.clone(), tree);
        self.branches.insert(name.to_string(), commit);
        self
    }

    /// Sets the URL a clone of this repository inherits for origin.
    pub fn with_origin_url(mut self, url: &str) -> Self {
        self.origin_url = Some(url.to_string());
        self
    }

    /// Sets the target of `origin/HEAD`.
    pub fn with_remote_head(mut self, head: &str) -> Self {
        self.remote_head = Some(head.to_string());
        self
    }

    /// Removes the origin remote.
    pub fn without_origin(mut self) -> Self {
        self.has_origin = false;
        self
    }

    /// Detaches `HEAD` at its current commit.
    pub fn detached(mut self) -> Self {
        if let Some(commit) = self.head_commit() {
            self.head = FakeHead::Detached(commit);
        }
        self
    }

    /// Makes shallow clones of this repository fail.
    pub fn rejecting_shallow(mut self) -> Self {
        self.reject_shallow = true;
        self
    }

    /// Whether a copied working copy has been reset and cleaned.
    pub fn is_pristine(&self) -> bool {
        !self.needs_reset && !self.needs_clean
    }

    fn import_from(&mut self, upstream: &Self) {
        for (id, tree) in &upstream.commits {
            self.commits.entry(id.clone()).or_insert_with(|| tree.clone());
        }
        self.remote_branches = upstream.branches.clone();
        for (tag, commit) in &upstream.tags {
            self.tags.insert(tag.clone(), commit.clone());
        }
    }

    fn resolve(&self, reference: &str) -> Option<String> {
        if reference == "HEAD" {
            return self.head_commit();
        }
        if let Some(c) = self.branches.get(reference).or_else(|| self.tags.get(reference)) {
            return Some(c.clone());
        }
        if let Some(name) = reference.strip_prefix(&format!("{ORIGIN_REMOTE}/"))
            && let Some(c) = self.remote_branches.get(name)
        {
            return Some(c.clone());
        }
        self.commits.contains_key(reference).then(|| reference.to_string())
    }
}

/// In-memory version-control backend.
#[derive(Debug, Default)]
pub struct FakeVcs {
    upstreams: DashMap<String, FakeRepo>,
    clones: DashMap<PathBuf, FakeRepo>,
    calls: Mutex<Vec<String>>,
}

impl FakeVcs {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a repository that can be cloned from `url`.
    pub fn add_upstream(&self, url: &str, repo: FakeRepo) {
        self.upstreams.insert(url.to_string(), repo);
    }

    /// Applies `f` to the upstream registered for `url`.
    pub fn update_upstream(&self, url: &str, f: impl FnOnce(&mut FakeRepo)) {
        if let Some(mut repo) = self.upstreams.get_mut(url) {
            f(&mut repo);
        }
    }

    /// Registers an existing clone at `path` and materializes its `HEAD` on disk.
    pub fn add_clone(&self, path: &Path, repo: FakeRepo) {
        let tree = repo.head_tree();
        if let Err(e) = materialize(path, &tree) {
            tracing::warn!("Failed to materialize fake clone {}: {}", path.display(), e);
        }
        self.clones.insert(path.to_path_buf(), repo);
    }

    /// Snapshot of the clone at `path`.
    pub fn repo(&self, path: &Path) -> Option<FakeRepo> {
        self.clones.get(path).map(|r| r.value().clone())
    }

    /// Mutating commands issued so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn with_clone<T>(&self, repo: &Path, f: impl FnOnce(&mut FakeRepo) -> Result<T>) -> Result<T> {
        let mut entry = self.clones.get_mut(repo).ok_or_else(|| ZkgError::GitRepoInvalid {
            path: repo.display().to_string(),
        })?;
        f(&mut entry)
    }

    fn read_clone<T>(&self, repo: &Path, f: impl FnOnce(&FakeRepo) -> T) -> Result<T> {
        let entry = self.clones.get(repo).ok_or_else(|| ZkgError::GitRepoInvalid {
            path: repo.display().to_string(),
        })?;
        Ok(f(&entry))
    }

    fn upstream_of(&self, repo: &FakeRepo, path: &Path) -> Result<FakeRepo> {
        repo.origin_url
            .as_ref()
            .and_then(|url| self.upstreams.get(url).map(|r| r.value().clone()))
            .ok_or_else(|| {
                command_error("fetch", path, "fatal: 'origin' does not appear to be a git repository")
            })
    }
}

fn command_error(operation: &str, repo: &Path, stderr: &str) -> anyhow::Error {
    ZkgError::GitCommandError {
        operation: operation.to_string(),
        repository: repo.display().to_string(),
        stderr: stderr.to_string(),
    }
    .into()
}

/// Replaces the working tree at `path` (everything but `.git`) with `tree`.
fn materialize(path: &Path, tree: &FakeTree) -> Result<()> {
    fs::create_dir_all(path.join(".git"))?;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        crate::utils::fs::delete_path(&entry.path())?;
    }
    for (rel, content) in tree {
        let file = path.join(rel);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file, content)?;
    }
    Ok(())
}

/// Removes files under `dir` that `tree` does not track.
fn remove_untracked(root: &Path, dir: &Path, tracked: &BTreeSet<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if dir == root && entry.file_name() == ".git" {
            continue;
        }
        if path.is_dir() && !path.is_symlink() {
            remove_untracked(root, &path, tracked)?;
            if fs::read_dir(&path)?.next().is_none() {
                fs::remove_dir(&path)?;
            }
            continue;
        }
        let rel = path.strip_prefix(root)?.to_string_lossy().replace('\\', "/");
        if !tracked.contains(&rel) {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[async_trait]
impl GitBackend for FakeVcs {
    async fn clone(&self, url: &str, dest: &Path, shallow: bool) -> Result<()> {
        self.record(format!(
            "clone {url} {}{}",
            dest.display(),
            if shallow { " shallow" } else { "" }
        ));

        let upstream = self.upstreams.get(url).map(|r| r.value().clone()).ok_or_else(|| {
            ZkgError::GitCloneFailed {
                url: url.to_string(),
                reason: format!("fatal: repository '{url}' does not exist"),
            }
        })?;

        if shallow && upstream.reject_shallow {
            return Err(ZkgError::GitCloneFailed {
                url: url.to_string(),
                reason: "fatal: attempt to fetch/clone from a shallow repository".to_string(),
            }
            .into());
        }

        let mut clone = upstream.clone();
        clone.remote_branches = upstream.branches.clone();
        clone.origin_url = Some(upstream.origin_url.clone().unwrap_or_else(|| url.to_string()));
        clone.has_origin = true;
        clone.shallow = shallow;
        clone.reject_shallow = false;
        if clone.remote_head.is_none()
            && let FakeHead::Branch(b) = &upstream.head
        {
            clone.remote_head = Some(format!("{ORIGIN_REMOTE}/{b}"));
        }

        materialize(dest, &clone.head_tree())?;
        self.clones.insert(dest.to_path_buf(), clone);
        Ok(())
    }

    async fn copy_working_copy(&self, src: &Path, dest: &Path) -> Result<()> {
        self.record(format!("copy {} {}", src.display(), dest.display()));

        let source = self
            .clones
            .get(src)
            .map(|r| r.value().clone())
            .or_else(|| self.upstreams.get(&src.display().to_string()).map(|r| r.value().clone()))
            .ok_or_else(|| ZkgError::GitRepoInvalid {
                path: src.display().to_string(),
            })?;

        copy_over_path(src, dest)?;

        let mut copy = source;
        copy.shallow = src.join(".git").join("shallow").exists();
        copy.reject_shallow = false;
        copy.needs_reset = true;
        copy.needs_clean = true;
        self.clones.insert(dest.to_path_buf(), copy);
        Ok(())
    }

    async fn checkout(&self, repo: &Path, reference: &str) -> Result<()> {
        self.record(format!("checkout {} {reference}", repo.display()));

        let tree = self.with_clone(repo, |r| {
            if r.branches.contains_key(reference) {
                r.head = FakeHead::Branch(reference.to_string());
            } else if let Some(commit) = r.remote_branches.get(reference).cloned() {
                r.branches.insert(reference.to_string(), commit);
                r.head = FakeHead::Branch(reference.to_string());
            } else if let Some(commit) = r.resolve(reference) {
                r.head = FakeHead::Detached(commit);
            } else {
                return Err(ZkgError::GitCheckoutFailed {
                    reference: reference.to_string(),
                    repository: repo.display().to_string(),
                    reason: format!(
                        "error: pathspec '{reference}' did not match any file(s) known to git"
                    ),
                }
                .into());
            }
            Ok(r.head_tree())
        })?;

        materialize(repo, &tree)
    }

    async fn submodule_sync(&self, repo: &Path) -> Result<()> {
        self.record(format!("submodule sync {}", repo.display()));
        self.read_clone(repo, |_| ())
    }

    async fn submodule_update(&self, repo: &Path) -> Result<()> {
        self.record(format!("submodule update {}", repo.display()));
        self.read_clone(repo, |_| ())
    }

    async fn pull(&self, repo: &Path) -> Result<()> {
        self.record(format!("pull {}", repo.display()));

        let snapshot = self.read_clone(repo, Clone::clone)?;
        let FakeHead::Branch(branch) = snapshot.head.clone() else {
            return Err(command_error("pull", repo, "You are not currently on a branch."));
        };
        let upstream = self.upstream_of(&snapshot, repo)?;

        let tree = self.with_clone(repo, |r| {
            r.import_from(&upstream);
            if let Some(commit) = upstream.branches.get(&branch) {
                r.branches.insert(branch.clone(), commit.clone());
            }
            Ok(r.head_tree())
        })?;

        materialize(repo, &tree)
    }

    async fn fetch(&self, repo: &Path) -> Result<()> {
        self.record(format!("fetch {}", repo.display()));

        let snapshot = self.read_clone(repo, Clone::clone)?;
        let upstream = self.upstream_of(&snapshot, repo)?;
        self.with_clone(repo, |r| {
            r.import_from(&upstream);
            Ok(())
        })
    }

    async fn reset_hard(&self, repo: &Path) -> Result<()> {
        self.record(format!("reset --hard {}", repo.display()));
        self.with_clone(repo, |r| {
            r.needs_reset = false;
            Ok(())
        })
    }

    async fn clean(&self, repo: &Path) -> Result<()> {
        self.record(format!("clean -ffdx {}", repo.display()));
        let tracked: BTreeSet<String> = self.with_clone(repo, |r| {
            r.needs_clean = false;
            Ok(r.head_tree().into_keys().collect())
        })?;
        remove_untracked(repo, repo, &tracked)
    }

    async fn set_remote_url(&self, repo: &Path, url: &str) -> Result<()> {
        self.record(format!("remote set-url {} {url}", repo.display()));
        self.with_clone(repo, |r| {
            if !r.has_origin {
                return Err(command_error("remote", repo, "error: No such remote 'origin'"));
            }
            r.origin_url = Some(url.to_string());
            Ok(())
        })
    }

    async fn remotes(&self, repo: &Path) -> Result<Vec<String>> {
        self.read_clone(repo, |r| {
            if r.has_origin { vec![ORIGIN_REMOTE.to_string()] } else { Vec::new() }
        })
    }

    async fn remote_head(&self, repo: &Path) -> Result<Option<String>> {
        self.read_clone(repo, |r| r.remote_head.clone())
    }

    async fn local_branches(&self, repo: &Path) -> Result<Vec<String>> {
        self.read_clone(repo, |r| r.branches.keys().cloned().collect())
    }

    async fn current_branch(&self, repo: &Path) -> Result<Option<String>> {
        self.read_clone(repo, |r| match &r.head {
            FakeHead::Branch(b) => Some(b.clone()),
            _ => None,
        })
    }

    async fn head_commit(&self, repo: &Path) -> Result<String> {
        self.read_clone(repo, FakeRepo::head_commit)?.ok_or_else(|| {
            command_error("rev-parse", repo, "fatal: ambiguous argument 'HEAD': unknown revision")
        })
    }

    async fn resolve_commit(&self, repo: &Path, reference: &str) -> Result<String> {
        self.read_clone(repo, |r| r.resolve(reference))?.ok_or_else(|| {
            command_error("rev-parse", repo, &format!("fatal: Needed a single revision: {reference}"))
        })
    }

    async fn tags(&self, repo: &Path) -> Result<Vec<String>> {
        self.read_clone(repo, |r| r.tags.keys().cloned().collect())
    }

    async fn is_shallow(&self, repo: &Path) -> Result<bool> {
        self.read_clone(repo, |r| r.shallow)
    }
}
