//! Unified diff splitting: one text blob per file.
//!
//! A patch block usually starts with a `---` separator and a diffstat, then
//! carries one `diff -` section per file and ends with a `-- ` signature.
//! Only the `diff -` sections are kept.

use crate::error::{InboxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No `diff -` line seen yet.
    Idle,
    /// Between `diff -` and the first hunk.
    Header,
    Hunk,
    /// After a `-- ` signature separator; lines are discarded.
    Footer,
}

/// Git extended header lines that may appear between `diff --git` and `---`.
const EXTENDED_HEADERS: [&str; 13] = [
    "old mode ",
    "new mode ",
    "deleted file mode ",
    "new file mode ",
    "copy from ",
    "copy to ",
    "rename old ",
    "rename new ",
    "rename from ",
    "rename to ",
    "similarity index ",
    "dissimilarity index ",
    "Binary files ",
];

/// Split a patch into per-file diff texts.
///
/// Each returned string holds the lines of one `diff -` section joined with
/// `\n` (no trailing newline). Leading statistics are skipped. Empty input
/// yields an empty vector.
///
/// # Errors
/// [`InboxError::Parse`] when a hunk contains a line that is not context,
/// addition or removal.
pub fn split_diffs(input: &str) -> Result<Vec<String>> {
    let mut diffs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut state = State::Idle;

    for line in input.lines() {
        if state == State::Idle && line == "---" {
            continue;
        }

        if line.starts_with("diff -") {
            if !current.is_empty() {
                diffs.push(std::mem::take(&mut current));
            }
            current.push(line);
            state = State::Header;
            continue;
        }

        match state {
            State::Idle | State::Footer => {}
            State::Header | State::Hunk if line.starts_with("@@ ") => {
                current.push(line);
                state = State::Hunk;
            }
            State::Header => {
                if is_file_header(line) {
                    current.push(line);
                }
            }
            State::Hunk if line.starts_with("-- ") => state = State::Footer,
            State::Hunk => {
                if !is_hunk_line(line) {
                    return Err(InboxError::parse(
                        "",
                        format!("incorrect line in hunk: {line}"),
                    ));
                }
                current.push(line);
            }
        }
    }

    if !current.is_empty() {
        diffs.push(current);
    }

    Ok(diffs.into_iter().map(|lines| lines.join("\n")).collect())
}

fn is_file_header(line: &str) -> bool {
    line.starts_with("index ")
        || line.starts_with("--- ")
        || line.starts_with("+++ ")
        || EXTENDED_HEADERS.iter().any(|h| line.starts_with(h))
}

/// Context, addition, removal, `\ No newline at end of file`, or an empty
/// context line some mailers leave behind.
fn is_hunk_line(line: &str) -> bool {
    matches!(line.bytes().next(), None | Some(b' ' | b'+' | b'-' | b'\\'))
}

/// One file's section of a patch, with the paths it touches.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileDiff {
    /// Path before the change; `None` for new files or when unknown.
    pub old_path: Option<String>,
    /// Path after the change; `None` for deleted files or when unknown.
    pub new_path: Option<String>,
    /// The diff text as returned by [`split_diffs`].
    pub text: String,
}

impl FileDiff {
    /// Wrap a diff section and work out its paths from `---`/`+++` lines,
    /// falling back to the `diff --git a/… b/…` line.
    pub fn new(text: String) -> Self {
        let mut old_path = None;
        let mut new_path = None;
        let mut git_paths = None;

        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("diff --git ") {
                git_paths = parse_git_paths(rest);
            } else if let Some(rest) = line.strip_prefix("--- ") {
                old_path = strip_side(rest, "a/");
            } else if let Some(rest) = line.strip_prefix("+++ ") {
                new_path = strip_side(rest, "b/");
            } else if line.starts_with("@@ ") {
                break;
            }
        }

        if old_path.is_none() && new_path.is_none() {
            if let Some((old, new)) = git_paths {
                old_path = Some(old);
                new_path = Some(new);
            }
        }

        Self {
            old_path,
            new_path,
            text,
        }
    }

    /// The path best describing this file: the new path, or the old one for deletions.
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }
}

/// `"a/x b/x"` → `("x", "x")`.
fn parse_git_paths(rest: &str) -> Option<(String, String)> {
    let (old, new) = rest.split_once(" b/")?;
    Some((old.strip_prefix("a/")?.to_string(), new.to_string()))
}

/// Strip the `a/`/`b/` prefix and trailing timestamp; `/dev/null` means no file.
fn strip_side(rest: &str, prefix: &str) -> Option<String> {
    let path = rest.split('\t').next().unwrap_or(rest).trim();
    if path == "/dev/null" || path.is_empty() {
        return None;
    }
    Some(path.strip_prefix(prefix).unwrap_or(path).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = r"---
 a.go | 2 +-
 b.go | 1 +
 2 files changed

diff --git a/a.go b/a.go
index 123..456 100644
--- a/a.go
+++ b/a.go
@@ -1,2 +1,2 @@
 package a
-var x = 1
+var x = 2
diff --git a/b.go b/b.go
new file mode 100644
--- /dev/null
+++ b/b.go
@@ -0,0 +1 @@
+package b
-- 
2.40.0
";

    #[test]
    fn test_split_two_files() {
        let diffs = split_diffs(TWO_FILES).unwrap();
        assert_eq!(diffs.len(), 2);
        assert_eq!(
            diffs[0],
            "diff --git a/a.go b/a.go\nindex 123..456 100644\n--- a/a.go\n+++ b/a.go\n\
             @@ -1,2 +1,2 @@\n package a\n-var x = 1\n+var x = 2"
        );
        assert!(diffs[1].starts_with("diff --git a/b.go b/b.go\nnew file mode 100644\n"));
        assert!(diffs[1].ends_with("+package b"));
        assert!(!diffs[1].contains("2.40.0"));
    }

    #[test]
    fn test_empty_input() {
        assert!(split_diffs("").unwrap().is_empty());
        assert!(split_diffs("---\n just stats\n").unwrap().is_empty());
    }

    #[test]
    fn test_bad_hunk_line() {
        let err = split_diffs("diff --git a/x b/x\n@@ -1,2 +1,2 @@\nfoo\n").unwrap_err();
        assert!(matches!(err, InboxError::Parse { ref reason, .. } if reason.contains("foo")));
    }

    #[test]
    fn test_empty_and_no_newline_lines_in_hunk() {
        let diffs =
            split_diffs("diff -u a b\n@@ -1 +1 @@\n-a\n\n+b\n\\ No newline at end of file\n")
                .unwrap();
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].ends_with("+b\n\\ No newline at end of file"));
    }

    #[test]
    fn test_multiple_hunks() {
        let diffs =
            split_diffs("diff --git a/x b/x\n@@ -1 +1 @@\n-a\n+b\n@@ -9 +9 @@\n c\n").unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].lines().count(), 6);
    }

    #[test]
    fn test_diff_after_footer_starts_new_file() {
        let text = "diff --git a/x b/x\n@@ -1 +1 @@\n-a\n+b\n-- \nsig\n\
                    diff --git a/y b/y\n@@ -1 +1 @@\n-c\n+d\n";
        let diffs = split_diffs(text).unwrap();
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0], "diff --git a/x b/x\n@@ -1 +1 @@\n-a\n+b");
        assert_eq!(diffs[1], "diff --git a/y b/y\n@@ -1 +1 @@\n-c\n+d");
    }

    #[test]
    fn test_removed_line_starting_with_dashes_ends_hunk() {
        // Removing a line that reads "- item" looks exactly like a signature
        // separator, so the rest of the section is dropped.
        let text = "diff --git a/l.md b/l.md\n@@ -1,3 +1,2 @@\n top\n-- item\n+ other\n";
        let diffs = split_diffs(text).unwrap();
        assert_eq!(diffs, vec!["diff --git a/l.md b/l.md\n@@ -1,3 +1,2 @@\n top"]);
    }

    #[test]
    fn test_file_diff_paths() {
        let diffs = split_diffs(TWO_FILES).unwrap();
        let a = FileDiff::new(diffs[0].clone());
        assert_eq!(a.old_path.as_deref(), Some("a.go"));
        assert_eq!(a.new_path.as_deref(), Some("a.go"));

        let b = FileDiff::new(diffs[1].clone());
        assert_eq!(b.old_path, None);
        assert_eq!(b.path(), Some("b.go"));
    }

    #[test]
    fn test_file_diff_paths_from_git_line() {
        let d = FileDiff::new("diff --git a/img.png b/img.png\nBinary files differ".to_string());
        assert_eq!(d.path(), Some("img.png"));
    }
}
