//! Fixtures for tests that drive the real `git` binary.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

use engram_cache::git::{git_available, run_git, run_git_in};

pub const DESC: &str = "This is a sufficiently long description for testing.";

static GIT_ENV: Once = Once::new();

/// Enable file-protocol remotes and give commits an identity. Returns false
/// (and the test should bail) when git is not installed.
pub fn git_ready() -> bool {
    if !git_available() {
        return false;
    }
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
    true
}

/// Bare repository at `<tmp>/<name>.git` whose single commit holds `files`.
pub fn bare_remote(tmp: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let work = tmp.join(format!("{name}-work"));
    fs::create_dir_all(&work).unwrap();
    run_git_in(&work, ["init", "-q"]).unwrap();
    for (path, text) in files {
        let path = work.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }
    run_git_in(&work, ["add", "-A"]).unwrap();
    run_git_in(&work, ["commit", "-q", "-m", "initial"]).unwrap();

    let bare = tmp.join(format!("{name}.git"));
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
    bare
}

/// An engram repository: manifest plus README.
pub fn engram_remote(tmp: &Path, name: &str) -> PathBuf {
    let manifest = format!("name = \"{name}\"\nversion = \"0.1.0\"\ndescription = \"{DESC}\"\n");
    bare_remote(
        tmp,
        name,
        &[("engram.toml", manifest.as_str()), ("README.md", "Body of the engram.")],
    )
}

/// A git project with one commit.
pub fn project(tmp: &Path) -> PathBuf {
    let root = tmp.join("project");
    fs::create_dir_all(&root).unwrap();
    run_git_in(&root, ["init", "-q"]).unwrap();
    fs::write(root.join("README.md"), "project\n").unwrap();
    run_git_in(&root, ["add", "-A"]).unwrap();
    run_git_in(&root, ["commit", "-q", "-m", "init"]).unwrap();
    root
}
