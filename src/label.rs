// src/label.rs

use crate::model::TouchedFiles;

/// Words that mark a commit message as a bug fix
pub const BUGFIX_KEYWORDS: [&str; 4] = ["fix", "bug", "error", "patch"];

/// The commit that follows the one being labeled
#[derive(Debug, Clone, Copy)]
pub struct Lookahead<'a> {
    pub message: &'a str,
    pub touched: &'a TouchedFiles,
}

/// Weak supervision: 1 when the next commit touches `path` and looks like a
/// fix, 0 otherwise, `None` when there is no next commit.
pub fn label(next: Option<Lookahead<'_>>, path: &str) -> Option<u8> {
    let next = next?;
    if next.touched.contains_key(path) && is_bugfix_message(next.message) {
        Some(1)
    } else {
        Some(0)
    }
}

/// Whole-word, case-insensitive match against [`BUGFIX_KEYWORDS`].
pub fn is_bugfix_message(message: &str) -> bool {
    message
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .any(|word| BUGFIX_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineStats;

    fn touched(paths: &[&str]) -> TouchedFiles {
        paths.iter().map(|p| (p.to_string(), LineStats::new(1, 0))).collect()
    }

    #[test]
    fn keywords_match_whole_words_only() {
        assert!(is_bugfix_message("fix: update a"));
        assert!(is_bugfix_message("Fix crash on startup"));
        assert!(is_bugfix_message("handle ERROR path"));
        assert!(is_bugfix_message("security patch\n\nmore text"));
        assert!(is_bugfix_message("bug-fix for parser"));
        assert!(!is_bugfix_message("fixes the thing"));
        assert!(!is_bugfix_message("hotfix release"));
        assert!(!is_bugfix_message("debug logging"));
        assert!(!is_bugfix_message("prefix_fix handling"));
        assert!(!is_bugfix_message(""));
    }

    #[test]
    fn no_successor_means_unknown() {
        assert_eq!(label(None, "a.txt"), None);
    }

    #[test]
    fn fix_touching_path_labels_one() {
        let files = touched(&["a.txt"]);
        let next = Lookahead { message: "fix: update a", touched: &files };
        assert_eq!(label(Some(next), "a.txt"), Some(1));
    }

    #[test]
    fn fix_elsewhere_labels_zero() {
        let files = touched(&["b.txt"]);
        let next = Lookahead { message: "fix: update b", touched: &files };
        assert_eq!(label(Some(next), "a.txt"), Some(0));
    }

    #[test]
    fn non_fix_touching_path_labels_zero() {
        let files = touched(&["a.txt"]);
        let next = Lookahead { message: "add feature", touched: &files };
        assert_eq!(label(Some(next), "a.txt"), Some(0));
    }
}
