use std::cell::Cell;

use engram_core::storage::refs::{index_tip, update_index_ref};
use engram_core::storage::INDEX_REF;
use git2::{
    Cred, CredentialType, ErrorCode, FetchOptions, Oid, PushOptions, RemoteCallbacks, Repository,
};
use tracing::{debug, info};

use crate::error::ProtocolError;
use crate::refspec::{fetch_refspec, tracking_ref};

/// Credential callbacks give up after this many attempts instead of letting
/// libgit2 loop on a rejected key.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Result of [`fetch_index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub remote: String,
    /// Local index tip before the fetch.
    pub previous: Option<Oid>,
    /// Local index tip after the fetch.
    pub tip: Option<Oid>,
    /// The remote's index tip, `None` if the remote has no index.
    pub remote_tip: Option<Oid>,
}

impl FetchResult {
    pub fn updated(&self) -> bool {
        self.previous != self.tip
    }

    /// The local index has commits the remote does not.
    pub fn ahead(&self) -> bool {
        self.tip.is_some() && self.tip != self.remote_tip
    }
}

/// Result of [`push_index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResult {
    pub remote: String,
    pub tip: Oid,
}

/// Fetch the index of `remote_name` into its tracking ref, then fast-forward
/// the local index to it. A remote without an index is not an error; the
/// result simply has no remote tip.
///
/// Local commits are never dropped: if the local index is ahead it is kept
/// as is, and if both sides have new commits the result is
/// [`ProtocolError::Diverged`].
pub fn fetch_index(repo: &Repository, remote_name: &str) -> Result<FetchResult, ProtocolError> {
    let previous = index_tip(repo)?;
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|_| ProtocolError::RemoteNotFound(remote_name.into()))?;

    let attempts = Cell::new(0);
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(remote_callbacks(&attempts));

    let refspec = fetch_refspec(remote_name);
    remote
        .fetch(&[refspec.as_str()], Some(&mut opts), Some("engram: fetch index"))
        .map_err(|e| ProtocolError::Fetch {
            remote: remote_name.into(),
            reason: e.message().to_string(),
        })?;

    let remote_tip = match repo.find_reference(&tracking_ref(remote_name)) {
        Ok(reference) => reference.target(),
        Err(e) if e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let tip = integrate(repo, remote_name, previous, remote_tip)?;

    let result = FetchResult {
        remote: remote_name.into(),
        previous,
        tip,
        remote_tip,
    };
    if result.updated() {
        info!(remote = remote_name, tip = ?tip, "Fetched engram index");
    } else if result.ahead() {
        debug!(remote = remote_name, "Local engram index is ahead of remote");
    } else {
        debug!(remote = remote_name, "Engram index already up to date");
    }
    Ok(result)
}

/// Move the local index to `theirs` if that is a fast-forward. Returns the
/// resulting local tip.
fn integrate(
    repo: &Repository,
    remote_name: &str,
    local: Option<Oid>,
    theirs: Option<Oid>,
) -> Result<Option<Oid>, ProtocolError> {
    let Some(theirs) = theirs else {
        return Ok(local);
    };
    match local {
        None => {
            update_index_ref(repo, theirs, None)?;
            Ok(Some(theirs))
        }
        Some(ours) if ours == theirs => Ok(Some(ours)),
        Some(ours) if repo.graph_descendant_of(theirs, ours)? => {
            update_index_ref(repo, theirs, Some(ours))?;
            Ok(Some(theirs))
        }
        Some(ours) if repo.graph_descendant_of(ours, theirs)? => Ok(Some(ours)),
        Some(ours) => Err(ProtocolError::Diverged {
            remote: remote_name.into(),
            local: ours.to_string(),
            theirs: theirs.to_string(),
        }),
    }
}

/// Push the local index to `remote_name`. Not forced: if the remote index has
/// commits this one does not, the push is rejected and the caller should fetch,
/// reapply and push again.
pub fn push_index(repo: &Repository, remote_name: &str) -> Result<PushResult, ProtocolError> {
    let tip = index_tip(repo)?.ok_or(ProtocolError::NoIndex)?;
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|_| ProtocolError::RemoteNotFound(remote_name.into()))?;

    let rejected = Cell::new(None::<String>);
    let attempts = Cell::new(0);
    let refspec = format!("{INDEX_REF}:{INDEX_REF}");

    let pushed = {
        let mut callbacks = remote_callbacks(&attempts);
        callbacks.push_update_reference(|refname, status| {
            if let Some(msg) = status {
                rejected.set(Some(format!("{refname}: {msg}")));
            }
            Ok(())
        });
        let mut opts = PushOptions::new();
        opts.remote_callbacks(callbacks);
        remote.push(&[refspec.as_str()], Some(&mut opts))
    };

    let push_err = |reason: String| ProtocolError::Push {
        remote: remote_name.into(),
        reason,
    };
    match pushed {
        Ok(()) => {}
        Err(e) if e.code() == ErrorCode::NotFastForward => {
            return Err(push_err(e.message().to_string()))
        }
        Err(e) => return Err(e.into()),
    }
    if let Some(reason) = rejected.take() {
        return Err(push_err(reason));
    }

    info!(remote = remote_name, tip = %tip, "Pushed engram index");
    Ok(PushResult {
        remote: remote_name.into(),
        tip,
    })
}

/// SSH agent for SSH remotes, the user's credential helper for HTTPS.
fn remote_callbacks(attempts: &Cell<usize>) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed| {
        attempts.set(attempts.get() + 1);
        if attempts.get() > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username.unwrap_or("git"));
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            let config = git2::Config::open_default()?;
            return Cred::credential_helper(&config, url, username);
        }
        Cred::default()
    });
    callbacks
}
