use git2::{Oid, Repository, Signature};

use crate::error::CoreError;
use crate::model::{serialize_index, EngramIndex};

/// Blob name of the serialized index inside each index commit's tree.
pub const INDEX_BLOB: &str = "index.json";

/// Write the index as Git objects and return the new commit Oid.
///
/// Object layout:
///   commit (message = "engram: index (<n> entries)", parent = previous tip)
///     -> tree
///        -> blob "index.json"
///
/// The ref is not touched here; see `refs::update_index_ref`.
pub fn create_index_commit(
    repo: &Repository,
    index: &EngramIndex,
    parent: Option<Oid>,
) -> Result<Oid, CoreError> {
    let bytes = serialize_index(index)?;
    let blob_oid = repo.blob(&bytes)?;

    let mut builder = repo.treebuilder(None)?;
    builder.insert(INDEX_BLOB, blob_oid, 0o100644)?;
    let tree_oid = builder.write()?;
    let tree = repo.find_tree(tree_oid)?;

    let parents = match parent {
        Some(oid) => vec![repo.find_commit(oid)?],
        None => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

    let sig = Signature::now("engram", "engram@local")?;
    let message = format!("engram: index ({} entries)", index.len());
    let commit_oid = repo.commit(None, &sig, &sig, &message, &tree, &parent_refs)?;

    Ok(commit_oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IndexEntry, Manifest};
    use tempfile::TempDir;

    fn index_with(name: &str) -> EngramIndex {
        let manifest = Manifest {
            name: name.into(),
            description: "This is a sufficiently long description for testing.".into(),
            version: None,
            disclosure_triggers: None,
            activation_triggers: None,
            wrap: None,
        };
        let mut index = EngramIndex::new();
        index.insert(
            name.into(),
            IndexEntry::new(manifest, format!("https://github.com/o/{name}.git")),
        );
        index
    }

    #[test]
    fn test_create_index_commit() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();

        let first = create_index_commit(&repo, &index_with("alpha"), None).unwrap();
        let commit = repo.find_commit(first).unwrap();
        assert!(commit.message().unwrap().contains("1 entries"));
        assert_eq!(commit.parent_count(), 0);
        let tree = commit.tree().unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.get_name(INDEX_BLOB).is_some());

        let second = create_index_commit(&repo, &index_with("beta"), Some(first)).unwrap();
        let commit = repo.find_commit(second).unwrap();
        assert_eq!(commit.parent_id(0).unwrap(), first);
    }
}
