use git2::{ErrorCode, Oid, Repository};

use crate::error::CoreError;

/// The ref prefix for all engram refs.
pub const ENGRAM_REF_PREFIX: &str = "refs/engrams/";

/// The ref holding the engram index history.
pub const INDEX_REF: &str = "refs/engrams/index";

/// Current target of the index ref, or `None` if it does not exist yet.
pub fn index_tip(repo: &Repository) -> Result<Option<Oid>, CoreError> {
    match repo.find_reference(INDEX_REF) {
        Ok(reference) => Ok(reference.target()),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Move the index ref to `new` only if it still points at `expected`
/// (`None` = must not exist yet). A lost race is an `IndexConflict`.
pub fn update_index_ref(
    repo: &Repository,
    new: Oid,
    expected: Option<Oid>,
) -> Result<(), CoreError> {
    let result = match expected {
        None => repo.reference(INDEX_REF, new, false, "engram: create index"),
        Some(old) => repo.reference_matching(INDEX_REF, new, true, old, "engram: update index"),
    };

    match result {
        Ok(_) => Ok(()),
        Err(e)
            if matches!(
                e.code(),
                ErrorCode::Exists | ErrorCode::Modified | ErrorCode::NotFound | ErrorCode::Locked
            ) =>
        {
            let actual = index_tip(repo)?;
            Err(CoreError::IndexConflict {
                expected: describe(expected),
                actual: describe(actual),
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn describe(oid: Option<Oid>) -> String {
    oid.map(|o| o.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}
