use git2::{Oid, Repository};

use super::objects::INDEX_BLOB;
use crate::error::CoreError;
use crate::model::{parse_index, EngramIndex};

/// Read the index document stored in an index commit.
pub fn read_index_commit(repo: &Repository, commit_oid: Oid) -> Result<EngramIndex, CoreError> {
    let commit = repo.find_commit(commit_oid)?;
    let tree = commit.tree()?;
    let entry = tree
        .get_name(INDEX_BLOB)
        .ok_or_else(|| CoreError::MissingBlob(INDEX_BLOB.to_string()))?;
    let blob = repo.find_blob(entry.id())?;
    parse_index(blob.content())
}
