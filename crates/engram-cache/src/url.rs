use std::borrow::Cow;
use std::path::PathBuf;

/// Canonical identity of a remote: `host/path.git`, host lowercased, scheme,
/// credentials and trailing slashes dropped, `.git` suffix exactly once.
///
/// All of these map to `github.com/owner/repo.git`:
/// `https://github.com/owner/repo`, `git@github.com:owner/repo.git`,
/// `ssh://git@GitHub.com/owner/repo.git/`.
///
/// Local paths (`/srv/repo`, `file:///srv/repo`) map under `file/`.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();

    let (host, path) = if let Some(rest) = url.strip_prefix("file://") {
        ("file".to_string(), local_path(rest))
    } else if let Some((_, rest)) = url.split_once("://") {
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        (normalize_host(authority), Cow::Borrowed(path))
    } else if let Some((authority, path)) = scp_like(url) {
        (normalize_host(authority), Cow::Borrowed(path))
    } else {
        ("file".to_string(), local_path(url))
    };

    // `..` pops a segment but never climbs above the root.
    let mut segments: Vec<&str> = Vec::new();
    for s in path.split(|c: char| c == '/' || c == '\\') {
        match s {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let last = segments
        .pop()
        .map(|s| s.trim_end_matches(".git"))
        .filter(|s| !s.is_empty())
        .unwrap_or("repo");
    let last = format!("{last}.git");

    let mut out = host;
    for s in segments {
        out.push('/');
        out.push_str(s);
    }
    out.push('/');
    out.push_str(&last);
    out
}

/// Relative local paths are resolved against the current directory, so two
/// spellings of one repository share a mirror and different ones do not.
fn local_path(path: &str) -> Cow<'_, str> {
    match std::path::absolute(path) {
        Ok(abs) => Cow::Owned(abs.to_string_lossy().into_owned()),
        Err(_) => Cow::Borrowed(path),
    }
}

/// Relative directory of a remote's mirror under the cache root.
pub fn cache_key(url: &str) -> PathBuf {
    normalize_url(url).split('/').collect()
}

/// `user@host:path` (scp syntax). A Windows drive letter is not a host.
fn scp_like(url: &str) -> Option<(&str, &str)> {
    let (authority, path) = url.split_once(':')?;
    if authority.contains('/') || authority.len() <= 1 {
        return None;
    }
    Some((authority, path))
}

fn normalize_host(authority: &str) -> String {
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    host.to_ascii_lowercase().replace(':', "_")
}
