/// Shell-style brace expansion: `"build.{sh,ts}"` -> `["build.sh", "build.ts"]`.
///
/// Each `{...}` group is one level of comma-separated alternatives; several
/// groups expand to their cross product, in order. Unbalanced braces are kept
/// as literal text, so a malformed pattern still matches as a plain substring.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = find_group(pattern) else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    body.split(',')
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}

/// Leftmost innermost `{...}` pair: the first `}` that has an open `{` before
/// it, paired with the nearest such `{`.
fn find_group(pattern: &str) -> Option<(usize, usize)> {
    let mut open = None;
    for (i, c) in pattern.char_indices() {
        match c {
            '{' => open = Some(i),
            '}' => {
                if let Some(start) = open {
                    return Some((start, i));
                }
            }
            _ => {}
        }
    }
    None
}
