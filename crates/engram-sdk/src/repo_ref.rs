use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const MAX_INPUT_LEN: usize = 2048;
const MAX_NAME_LEN: usize = 100;

/// Shorthand host aliases, as in `gh:owner/repo`.
const HOST_ALIASES: [(&str, &str); 8] = [
    ("github", "github.com"),
    ("gh", "github.com"),
    ("gitlab", "gitlab.com"),
    ("gl", "gitlab.com"),
    ("codeberg", "codeberg.org"),
    ("cb", "codeberg.org"),
    ("sourcehut", "git.sr.ht"),
    ("srht", "git.sr.ht"),
];

/// A validated repository reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    /// Always `https://<host>/<owner>/<repo>.git` for parsed input.
    pub url: String,
}

/// Parse `owner/repo`, `alias:owner/repo`, `https://host/owner/repo[.git]` or
/// `git@host:owner/repo[.git]`. `None` for anything else.
pub fn parse_repo_ref(input: &str) -> Option<RepoRef> {
    let input = input.trim();
    if input.is_empty() || input.len() > MAX_INPUT_LEN {
        return None;
    }

    let (host, path) = if let Some(rest) = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
    {
        rest.split_once('/')?
    } else if let Some(rest) = input.strip_prefix("git@") {
        rest.split_once(':')?
    } else if let Some((alias, path)) = input.split_once(':') {
        let host = HOST_ALIASES
            .iter()
            .find(|(a, _)| *a == alias)
            .map(|(_, h)| *h)?;
        (host, path)
    } else {
        ("github.com", input)
    };

    let mut parts = path.trim_end_matches('/').splitn(3, '/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    if parts.next().is_some() || host.is_empty() || host.contains('/') {
        return None;
    }
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if !valid_name(owner) || !valid_name(repo) {
        return None;
    }

    Some(RepoRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        url: format!("https://{}/{owner}/{repo}.git", host.to_ascii_lowercase()),
    })
}

/// Aliases accepted before `:` in shorthand references.
pub fn supported_aliases() -> Vec<&'static str> {
    HOST_ALIASES.iter().map(|(a, _)| *a).collect()
}

/// Default engram name for a repository: `eg.foo` installs as `foo`.
pub fn engram_name_for(repo: &str) -> &str {
    repo.strip_prefix("eg.").unwrap_or(repo)
}

fn valid_name(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) = PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").ok())
        .as_ref()
    else {
        return false;
    };
    name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && !name.starts_with('-')
        && pattern.is_match(name)
}
