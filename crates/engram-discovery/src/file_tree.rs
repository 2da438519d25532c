use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use ignore::WalkBuilder;
use tracing::debug;

/// Directory description files. Shown as metadata, never listed.
const DIR_ONELINERS: [&str; 2] = [".oneliner", ".oneliner.txt"];

const EXCLUDED: [&str; 2] = [".git", "node_modules"];

/// Lines of a file searched for a `oneliner:` tag.
const ONELINER_SCAN_LINES: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct FileTreeOptions {
    /// Append `  # <description>` from `oneliner:` tags and `.oneliner` files.
    pub include_metadata: bool,
    /// Deepest level listed; the directory's children are level 1.
    pub max_depth: Option<usize>,
}

/// Flat listing of `dir`: one absolute path per line, directories suffixed
/// with `/`, siblings sorted by name. `.ignore` and `.gitignore` files inside
/// `dir` are honoured. Empty if `dir` does not exist.
pub fn render_tree(dir: &Path, opts: &FileTreeOptions) -> String {
    if !dir.is_dir() {
        return String::new();
    }
    let root = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());

    let walker = WalkBuilder::new(&root)
        .hidden(false)
        .ignore(true)
        .git_ignore(true)
        .require_git(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .max_depth(opts.max_depth)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|e| {
            let name = e.file_name();
            !EXCLUDED.iter().chain(DIR_ONELINERS.iter()).any(|x| name == *x)
        })
        .build();

    let mut lines = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping walk error: {e}");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        let path = entry.path();

        let mut line = path.display().to_string();
        if is_dir {
            line.push('/');
        }
        if opts.include_metadata {
            let description = if is_dir {
                dir_oneliner(path)
            } else {
                file_oneliner(path)
            };
            if let Some(description) = description {
                line.push_str("  # ");
                line.push_str(&description);
            }
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn dir_oneliner(dir: &Path) -> Option<String> {
    DIR_ONELINERS.iter().find_map(|name| {
        let text = fs::read_to_string(dir.join(name)).ok()?;
        let first = text.lines().next()?.trim();
        (!first.is_empty()).then(|| first.to_string())
    })
}

/// `oneliner: <text>` in a comment near the top of the file, e.g.
/// `# oneliner: Database backup utilities`.
fn file_oneliner(file: &Path) -> Option<String> {
    let reader = BufReader::new(File::open(file).ok()?);
    reader
        .lines()
        .take(ONELINER_SCAN_LINES)
        .map_while(Result::ok)
        .find_map(|line| parse_oneliner(&line))
}

fn parse_oneliner(line: &str) -> Option<String> {
    let body = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '#' | '/' | '*' | '-' | ';' | '<' | '!' | '%'))
        .trim_start();
    let text = body.strip_prefix("oneliner:")?;
    let text = text
        .trim()
        .trim_end_matches("*/")
        .trim_end_matches("-->")
        .trim();
    (!text.is_empty()).then(|| text.to_string())
}
