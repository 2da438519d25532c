use std::collections::HashSet;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hex digits of the path hash appended on collision.
const SUFFIX_LEN: usize = 6;

/// Lowercase ASCII alphanumerics, every other run collapsed to one `_`,
/// no leading or trailing `_`. `"My Cool-Engram!"` -> `"my_cool_engram"`.
pub fn sanitize_tool_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        out.push_str("engram");
    }
    out
}

/// Tool identifier for an engram, unique within `taken` (which it extends).
/// On collision the identifier gets a suffix hashed from `directory`, so the
/// same engram directory keeps the same identifier across runs.
pub fn generate_tool_name(name: &str, directory: &Path, taken: &mut HashSet<String>) -> String {
    let base = sanitize_tool_name(name);
    if taken.insert(base.clone()) {
        return base;
    }

    let digest = format!("{:x}", Sha256::digest(directory.to_string_lossy().as_bytes()));
    let mut candidate = format!("{base}_{}", &digest[..SUFFIX_LEN]);
    let mut n = 2;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{base}_{}_{n}", &digest[..SUFFIX_LEN]);
        n += 1;
    }
    candidate
}
