use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use engram_core::config::Settings;
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::git::{run_git, run_git_in};
use crate::lock::MirrorLock;
use crate::url::cache_key;

/// Options for [`RepoCache::submodule_add_from_cache`].
#[derive(Debug, Clone, Default)]
pub struct SubmoduleAddOptions {
    /// Pass `--force` to `git submodule add` (re-add over a stale path).
    pub force: bool,
    /// Use the mirror as-is when it exists, without fetching.
    pub skip_fetch: bool,
}

/// What to check out in [`RepoCache::clone_with_sparse_checkout`].
#[derive(Debug, Clone, Default)]
pub struct SparseCheckout {
    /// Commit hash, branch or tag. `None` = the remote's default branch.
    pub git_ref: Option<String>,
    /// Gitignore-style include patterns. Empty = full checkout.
    pub sparse: Vec<String>,
}

/// Bare mirrors under a user-level cache root, one per normalized remote.
#[derive(Debug, Clone)]
pub struct RepoCache {
    root: PathBuf,
}

impl RepoCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.cache_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mirror_path(&self, url: &str) -> PathBuf {
        self.root.join(cache_key(url))
    }

    /// True iff a bare mirror for this remote exists locally.
    pub fn is_cached(&self, url: &str) -> bool {
        is_bare_repo(&self.mirror_path(url))
    }

    /// Create the mirror if absent, or fetch into it when `refresh` is set.
    /// Creation and fetch run under the entry's exclusive lock; a new mirror
    /// is cloned aside and renamed into place, so a crash never leaves a
    /// half-written mirror behind.
    pub fn ensure_mirror(&self, url: &str, refresh: bool) -> Result<PathBuf, CacheError> {
        let path = self.mirror_path(url);
        let mirror_err = |e: CacheError| CacheError::Mirror {
            url: url.to_string(),
            reason: e.reason(),
        };

        let _lock = MirrorLock::acquire(&path)?;

        if is_bare_repo(&path) {
            if refresh {
                debug!(url, mirror = %path.display(), "Refreshing mirror");
                run_git_in(&path, ["fetch", "--prune", "--quiet", "origin"]).map_err(mirror_err)?;
            }
            return Ok(path);
        }

        info!(url, mirror = %path.display(), "Creating mirror");
        let partial = sibling(&path, ".partial");
        remove_if_exists(&partial)?;
        let cloned = run_git(
            None,
            [
                OsString::from("clone"),
                "--mirror".into(),
                "--quiet".into(),
                url.into(),
                partial.clone().into(),
            ],
        );
        if let Err(e) = cloned {
            remove_if_exists(&partial)?;
            return Err(mirror_err(e));
        }
        remove_if_exists(&path)?;
        fs::rename(&partial, &path)?;
        Ok(path)
    }

    /// Register `url` as a submodule at `relative_path` inside `project_root`,
    /// borrowing objects from the mirror.
    pub fn submodule_add_from_cache(
        &self,
        url: &str,
        relative_path: &Path,
        project_root: &Path,
        opts: &SubmoduleAddOptions,
    ) -> Result<(), CacheError> {
        let mirror = self.ensure_mirror(url, !opts.skip_fetch)?;

        let mut args: Vec<OsString> = vec!["submodule".into(), "add".into(), "--quiet".into()];
        if opts.force {
            args.push("--force".into());
        }
        args.extend([
            "--reference".into(),
            mirror.into(),
            url.into(),
            relative_path.into(),
        ]);

        run_git(Some(project_root), args).map_err(|e| CacheError::Submodule {
            path: relative_path.to_path_buf(),
            reason: e.reason(),
        })?;
        info!(url, path = %relative_path.display(), "Added submodule from cache");
        Ok(())
    }

    /// Standalone working copy of `url` at `target_dir`, which must not exist.
    pub fn clone_from_cache(&self, url: &str, target_dir: &Path) -> Result<(), CacheError> {
        if target_dir.exists() {
            return Err(CacheError::TargetExists(target_dir.to_path_buf()));
        }
        let mirror = self.ensure_mirror(url, true)?;

        let result = run_git(
            None,
            [
                OsString::from("clone"),
                "--quiet".into(),
                "--reference".into(),
                mirror.into(),
                url.into(),
                target_dir.into(),
            ],
        );
        if let Err(e) = result {
            remove_if_exists(target_dir)?;
            return Err(CacheError::Clone {
                url: url.to_string(),
                reason: e.reason(),
            });
        }
        info!(url, target = %target_dir.display(), "Cloned from cache");
        Ok(())
    }

    /// Clone `remote` into `content_dir` with only the `sparse` paths checked
    /// out, at `git_ref` (default branch if unset). Returns the commit hash
    /// that was checked out.
    ///
    /// The checkout is built in a sibling directory and renamed into place on
    /// success: `content_dir` ends up either absent or complete.
    pub fn clone_with_sparse_checkout(
        &self,
        remote: &str,
        content_dir: &Path,
        checkout: &SparseCheckout,
    ) -> Result<String, CacheError> {
        if content_dir.exists() {
            return Err(CacheError::TargetExists(content_dir.to_path_buf()));
        }
        let mirror = self.ensure_mirror(remote, true)?;

        if let Some(parent) = content_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = sibling(content_dir, ".partial");
        remove_if_exists(&partial)?;

        let commit = match sparse_checkout_into(&mirror, remote, &partial, checkout) {
            Ok(commit) => commit,
            Err(e) => {
                remove_if_exists(&partial)?;
                return Err(CacheError::Checkout {
                    remote: remote.to_string(),
                    reason: e.reason(),
                });
            }
        };

        fs::rename(&partial, content_dir)?;
        info!(
            remote,
            commit = %commit,
            dir = %content_dir.display(),
            "Sparse checkout complete"
        );
        Ok(commit)
    }

    /// Check out a registered-but-uninitialized submodule. When `url` is
    /// known its mirror is used as a reference; if the mirror cannot be
    /// prepared the init proceeds without it.
    pub fn init_submodule(
        &self,
        project_root: &Path,
        relative_path: &Path,
        url: Option<&str>,
    ) -> Result<(), CacheError> {
        let mirror = url.and_then(|u| match self.ensure_mirror(u, false) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(url = u, error = %e, "Mirror unavailable, initializing without cache");
                None
            }
        });

        let mut args: Vec<OsString> = vec![
            "submodule".into(),
            "update".into(),
            "--init".into(),
            "--quiet".into(),
        ];
        if let Some(mirror) = mirror {
            args.push("--reference".into());
            args.push(mirror.into());
        }
        args.push("--".into());
        args.push(relative_path.into());

        run_git(Some(project_root), args).map_err(|e| CacheError::Submodule {
            path: relative_path.to_path_buf(),
            reason: e.reason(),
        })?;
        Ok(())
    }
}

/// A submodule is initialized once its checkout has a `.git` entry.
pub fn is_submodule_initialized(project_root: &Path, relative_path: &Path) -> bool {
    project_root.join(relative_path).join(".git").exists()
}

fn sparse_checkout_into(
    mirror: &Path,
    remote: &str,
    dir: &Path,
    checkout: &SparseCheckout,
) -> Result<String, CacheError> {
    run_git(
        None,
        [
            OsString::from("clone"),
            "--quiet".into(),
            "--no-checkout".into(),
            "--reference".into(),
            mirror.into(),
            remote.into(),
            dir.into(),
        ],
    )?;

    if !checkout.sparse.is_empty() {
        run_git_in(dir, ["config", "core.sparseCheckout", "true"])?;
        let git_dir = PathBuf::from(run_git_in(dir, ["rev-parse", "--absolute-git-dir"])?);
        let info_dir = git_dir.join("info");
        fs::create_dir_all(&info_dir)?;
        let mut patterns = checkout.sparse.join("\n");
        patterns.push('\n');
        fs::write(info_dir.join("sparse-checkout"), patterns)?;
    }

    let commit = resolve_commit(dir, checkout.git_ref.as_deref())?;
    // read-tree honours core.sparseCheckout when populating the work tree.
    run_git_in(dir, ["read-tree", "-mu", commit.as_str()])?;
    if checkout.git_ref.is_some() {
        run_git_in(dir, ["update-ref", "--no-deref", "HEAD", commit.as_str()])?;
    }
    Ok(commit)
}

/// Resolve a user-facing ref to a commit hash: as given, then as a remote
/// branch.
fn resolve_commit(dir: &Path, git_ref: Option<&str>) -> Result<String, CacheError> {
    let Some(git_ref) = git_ref else {
        return run_git_in(dir, ["rev-parse", "--verify", "HEAD^{commit}"]);
    };

    let candidates = [
        format!("{git_ref}^{{commit}}"),
        format!("origin/{git_ref}^{{commit}}"),
    ];
    let mut last_err = None;
    for candidate in &candidates {
        match run_git_in(dir, ["rev-parse", "--verify", "--quiet", candidate.as_str()]) {
            Ok(commit) => return Ok(commit),
            Err(e) => last_err = Some(e),
        }
    }
    Err(CacheError::Git {
        command: format!("rev-parse {git_ref}"),
        stderr: last_err
            .map(|e| e.reason())
            .filter(|r| !r.starts_with("exited"))
            .unwrap_or_else(|| format!("unknown revision '{git_ref}'")),
    })
}

fn is_bare_repo(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir()
}

/// `<dir>/.<name><suffix>`: hidden sibling used for build-then-rename.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{suffix}"))
}

fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::git_available;
    use std::sync::Once;
    use tempfile::TempDir;

    static GIT_ENV: Once = Once::new();

    /// Local-path remotes need the file protocol, and commits need an identity.
    fn git_env() {
        GIT_ENV.call_once(|| {
            std::env::set_var("GIT_CONFIG_COUNT", "4");
            std::env::set_var("GIT_CONFIG_KEY_0", "protocol.file.allow");
            std::env::set_var("GIT_CONFIG_VALUE_0", "always");
            std::env::set_var("GIT_CONFIG_KEY_1", "user.name");
            std::env::set_var("GIT_CONFIG_VALUE_1", "test");
            std::env::set_var("GIT_CONFIG_KEY_2", "user.email");
            std::env::set_var("GIT_CONFIG_VALUE_2", "test@test");
            std::env::set_var("GIT_CONFIG_KEY_3", "init.defaultBranch");
            std::env::set_var("GIT_CONFIG_VALUE_3", "main");
        });
    }

    /// A bare "remote" with README.md, docs/guide.md, src/lib.rs on `main`,
    /// tag `v1` on the first commit. Returns (remote path, first commit, head).
    fn make_remote(tmp: &Path) -> (PathBuf, String, String) {
        let work = tmp.join("work");
        fs::create_dir_all(work.join("docs")).unwrap();
        fs::create_dir_all(work.join("src")).unwrap();
        run_git_in(&work, ["init", "-q"]).unwrap();
        fs::write(work.join("README.md"), "# readme\n").unwrap();
        fs::write(work.join("docs/guide.md"), "guide v1\n").unwrap();
        fs::write(work.join("src/lib.rs"), "// lib\n").unwrap();
        run_git_in(&work, ["add", "-A"]).unwrap();
        run_git_in(&work, ["commit", "-q", "-m", "first"]).unwrap();
        let first = run_git_in(&work, ["rev-parse", "HEAD"]).unwrap();
        run_git_in(&work, ["tag", "v1"]).unwrap();
        fs::write(work.join("docs/guide.md"), "guide v2\n").unwrap();
        run_git_in(&work, ["commit", "-q", "-am", "second"]).unwrap();
        let head = run_git_in(&work, ["rev-parse", "HEAD"]).unwrap();

        let bare = tmp.join("remote.git");
        run_git(
            None,
            [
                OsString::from("clone"),
                "-q".into(),
                "--bare".into(),
                work.into(),
                bare.clone().into(),
            ],
        )
        .unwrap();
        (bare, first, head)
    }

    fn make_project(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        run_git_in(dir, ["init", "-q"]).unwrap();
        fs::write(dir.join("README.md"), "project\n").unwrap();
        run_git_in(dir, ["add", "-A"]).unwrap();
        run_git_in(dir, ["commit", "-q", "-m", "init"]).unwrap();
    }

    /// Relative paths of all files under `dir`, ignoring `.git`.
    fn files_under(dir: &Path) -> Vec<String> {
        fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.file_name().is_some_and(|n| n == ".git") {
                    continue;
                }
                if path.is_dir() {
                    walk(base, &path, out);
                } else {
                    out.push(path.strip_prefix(base).unwrap().to_string_lossy().into_owned());
                }
            }
        }
        let mut out = Vec::new();
        walk(dir, dir, &mut out);
        out.sort();
        out
    }

    #[test]
    fn test_ensure_mirror_creates_then_reuses() {
        if !git_available() {
            return;
        }
        git_env();
        let tmp = TempDir::new().unwrap();
        let (remote, _, head) = make_remote(tmp.path());
        let cache = RepoCache::new(tmp.path().join("cache"));
        let url = remote.to_string_lossy().into_owned();

        assert!(!cache.is_cached(&url));
        let mirror = cache.ensure_mirror(&url, true).unwrap();
        assert!(cache.is_cached(&url));
        assert_eq!(mirror, cache.mirror_path(&url));
        assert_eq!(run_git_in(&mirror, ["rev-parse", "main"]).unwrap(), head);

        // Second call fetches into the same mirror.
        assert_eq!(cache.ensure_mirror(&url, true).unwrap(), mirror);
        assert!(!sibling(&mirror, ".partial").exists());
    }

    #[test]
    fn test_unreachable_remote_is_mirror_error() {
        if !git_available() {
            return;
        }
        git_env();
        let tmp = TempDir::new().unwrap();
        let cache = RepoCache::new(tmp.path().join("cache"));
        let url = tmp.path().join("does-not-exist.git");
        let url = url.to_string_lossy();

        let err = cache.ensure_mirror(&url, true).unwrap_err();
        assert!(matches!(err, CacheError::Mirror { .. }));
        assert!(!cache.is_cached(&url));
        assert!(!sibling(&cache.mirror_path(&url), ".partial").exists());
    }

    #[test]
    fn test_clone_from_cache() {
        if !git_available() {
            return;
        }
        git_env();
        let tmp = TempDir::new().unwrap();
        let (remote, _, head) = make_remote(tmp.path());
        let cache = RepoCache::new(tmp.path().join("cache"));
        let url = remote.to_string_lossy().into_owned();
        let target = tmp.path().join("clone");

        cache.clone_from_cache(&url, &target).unwrap();
        assert_eq!(run_git_in(&target, ["rev-parse", "HEAD"]).unwrap(), head);
        assert!(target.join(".git/objects/info/alternates").exists());

        let err = cache.clone_from_cache(&url, &target).unwrap_err();
        assert!(matches!(err, CacheError::TargetExists(_)));
    }

    #[test]
    fn test_concurrent_submodule_adds_share_one_mirror() {
        if !git_available() {
            return;
        }
        git_env();
        let tmp = TempDir::new().unwrap();
        let (remote, _, head) = make_remote(tmp.path());
        let url = remote.to_string_lossy().into_owned();
        let cache = RepoCache::new(tmp.path().join("cache"));

        let projects: Vec<PathBuf> = ["p1", "p2"].iter().map(|p| tmp.path().join(p)).collect();
        for p in &projects {
            make_project(p);
        }

        let handles: Vec<_> = projects
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, project)| {
                let cache = cache.clone();
                let url = url.clone();
                std::thread::spawn(move || {
                    let rel = PathBuf::from(format!(".engrams/mod{i}"));
                    cache
                        .submodule_add_from_cache(&url, &rel, &project, &SubmoduleAddOptions::default())
                        .map(|()| project.join(rel))
                })
            })
            .collect();

        let direct = tmp.path().join("direct");
        run_git(
            None,
            [OsString::from("clone"), "-q".into(), url.clone().into(), direct.clone().into()],
        )
        .unwrap();
        let direct_log = run_git_in(&direct, ["log", "--format=%H"]).unwrap();

        for handle in handles {
            let checkout = handle.join().unwrap().unwrap();
            assert_eq!(run_git_in(&checkout, ["rev-parse", "HEAD"]).unwrap(), head);
            assert_eq!(run_git_in(&checkout, ["log", "--format=%H"]).unwrap(), direct_log);
            assert!(is_submodule_initialized(
                checkout.parent().unwrap().parent().unwrap(),
                Path::new(".engrams").join(checkout.file_name().unwrap()).as_path()
            ));
        }
        assert!(cache.is_cached(&url));
    }

    #[test]
    fn test_submodule_failure_is_distinct_from_mirror_failure() {
        if !git_available() {
            return;
        }
        git_env();
        let tmp = TempDir::new().unwrap();
        let (remote, _, _) = make_remote(tmp.path());
        let url = remote.to_string_lossy().into_owned();
        let cache = RepoCache::new(tmp.path().join("cache"));

        // Not a git repository: mirror succeeds, registration fails.
        let not_a_project = tmp.path().join("plain");
        fs::create_dir_all(&not_a_project).unwrap();
        let err = cache
            .submodule_add_from_cache(
                &url,
                Path::new(".engrams/x"),
                &not_a_project,
                &SubmoduleAddOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, CacheError::Submodule { .. }), "{err}");
        assert!(cache.is_cached(&url));
    }

    #[test]
    fn test_sparse_checkout_only_selected_paths() {
        if !git_available() {
            return;
        }
        git_env();
        let tmp = TempDir::new().unwrap();
        let (remote, _, head) = make_remote(tmp.path());
        let url = remote.to_string_lossy().into_owned();
        let cache = RepoCache::new(tmp.path().join("cache"));
        let content = tmp.path().join("engram").join("content");

        let commit = cache
            .clone_with_sparse_checkout(
                &url,
                &content,
                &SparseCheckout {
                    git_ref: None,
                    sparse: vec!["docs/".into()],
                },
            )
            .unwrap();

        assert_eq!(commit, head);
        assert_eq!(files_under(&content), vec!["docs/guide.md"]);
        assert_eq!(
            fs::read_to_string(content.join("docs/guide.md")).unwrap(),
            "guide v2\n"
        );
    }

    #[test]
    fn test_sparse_checkout_at_locked_commit_and_tag() {
        if !git_available() {
            return;
        }
        git_env();
        let tmp = TempDir::new().unwrap();
        let (remote, first, _) = make_remote(tmp.path());
        let url = remote.to_string_lossy().into_owned();
        let cache = RepoCache::new(tmp.path().join("cache"));

        for (dir, git_ref) in [("by-hash", first.clone()), ("by-tag", "v1".to_string())] {
            let content = tmp.path().join(dir).join("content");
            let commit = cache
                .clone_with_sparse_checkout(
                    &url,
                    &content,
                    &SparseCheckout {
                        git_ref: Some(git_ref),
                        sparse: vec!["docs/".into()],
                    },
                )
                .unwrap();
            assert_eq!(commit, first);
            assert_eq!(
                fs::read_to_string(content.join("docs/guide.md")).unwrap(),
                "guide v1\n"
            );
        }
    }

    #[test]
    fn test_failed_sparse_checkout_leaves_nothing() {
        if !git_available() {
            return;
        }
        git_env();
        let tmp = TempDir::new().unwrap();
        let (remote, _, _) = make_remote(tmp.path());
        let url = remote.to_string_lossy().into_owned();
        let cache = RepoCache::new(tmp.path().join("cache"));
        let content = tmp.path().join("engram").join("content");

        let err = cache
            .clone_with_sparse_checkout(
                &url,
                &content,
                &SparseCheckout {
                    git_ref: Some("no-such-ref".into()),
                    sparse: vec!["docs/".into()],
                },
            )
            .unwrap_err();

        assert!(matches!(err, CacheError::Checkout { .. }), "{err}");
        assert!(!content.exists());
        assert!(!sibling(&content, ".partial").exists());
    }
}
