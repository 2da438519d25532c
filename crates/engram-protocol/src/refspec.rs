use git2::{Remote, Repository};
use tracing::debug;

use crate::error::ProtocolError;

/// Refspec for pushing the index. Not forced, and it never carries the
/// remote-tracking copies.
pub const ENGRAM_PUSH_REFSPEC: &str = "refs/engrams/index:refs/engrams/index";

/// Where a remote's index lands on fetch. The local index ref is only ever
/// moved by [`crate::fetch_index`], never by the fetch itself.
pub fn tracking_ref(remote_name: &str) -> String {
    format!("refs/engrams/remotes/{remote_name}/index")
}

/// Fetch refspec for one remote: its index into [`tracking_ref`].
pub fn fetch_refspec(remote_name: &str) -> String {
    format!("+refs/engrams/index:{}", tracking_ref(remote_name))
}

/// Add the engram refspecs to one remote so that a plain `git fetch` / `git
/// push` carries the index. Returns whether the config changed.
pub fn configure_remote(repo: &Repository, remote_name: &str) -> Result<bool, ProtocolError> {
    let remote = repo
        .find_remote(remote_name)
        .map_err(|_| ProtocolError::RemoteNotFound(remote_name.into()))?;

    let fetch_spec = fetch_refspec(remote_name);
    let needs_fetch = !has_refspec(&remote, &fetch_spec, Direction::Fetch);
    let needs_push = !has_refspec(&remote, ENGRAM_PUSH_REFSPEC, Direction::Push);
    drop(remote);

    if needs_fetch {
        repo.remote_add_fetch(remote_name, &fetch_spec)?;
    }
    if needs_push {
        repo.remote_add_push(remote_name, ENGRAM_PUSH_REFSPEC)?;
    }

    let changed = needs_fetch || needs_push;
    if changed {
        debug!(remote = remote_name, "Configured engram refspecs");
    }
    Ok(changed)
}

/// [`configure_remote`] for every remote. Returns the remotes that changed.
pub fn configure_auto_fetch(repo: &Repository) -> Result<Vec<String>, ProtocolError> {
    let remotes = repo.remotes()?;
    let mut configured = Vec::new();

    for name in remotes.iter().flatten() {
        if configure_remote(repo, name)? {
            configured.push(name.to_string());
        }
    }

    Ok(configured)
}

enum Direction {
    Fetch,
    Push,
}

fn has_refspec(remote: &Remote<'_>, wanted: &str, direction: Direction) -> bool {
    let specs = match direction {
        Direction::Fetch => remote.fetch_refspecs(),
        Direction::Push => remote.push_refspecs(),
    };
    specs.is_ok_and(|specs| specs.iter().flatten().any(|s| s == wanted))
}
