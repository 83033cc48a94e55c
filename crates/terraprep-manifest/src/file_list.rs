//! Rewriting line-oriented file lists through recorded rules

use std::path::Path;
use tracing::debug;

use crate::errors::ManifestError;
use crate::io::write_atomically;
use crate::planner::{RewriteRules, GS_SCHEME};

/// Remote URIs listed in a file list, in order.
pub fn remote_entries(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(GS_SCHEME))
}

/// Rewrite every remote line by longest-prefix match against `rules`.
///
/// Blank lines and lines that are already local paths are kept byte for
/// byte, line endings included. A remote line keeps its line ending; a remote
/// line without a matching rule is an error.
pub fn rewrite_file_list(content: &str, rules: &RewriteRules) -> Result<String, ManifestError> {
    let mut output = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let entry = body.trim();
        if entry.starts_with(GS_SCHEME) {
            let local = rules
                .rewrite(entry)
                .ok_or_else(|| ManifestError::UnmappableUri(entry.to_string()))?;
            output.push_str(&local.to_string_lossy());
            output.push_str(&line[body.len()..]);
        } else {
            output.push_str(line);
        }
    }
    Ok(output)
}

/// Rewrite a file list on disk. The file is replaced only on success.
pub fn rewrite_file_list_in_place(path: &Path, rules: &RewriteRules) -> Result<(), ManifestError> {
    let content = std::fs::read_to_string(path)?;
    let rewritten = rewrite_file_list(&content, rules)?;
    if rewritten == content {
        debug!("File list {:?} already local", path);
        return Ok(());
    }
    write_atomically(path, rewritten.as_bytes())?;
    debug!("Rewrote file list {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn rules() -> RewriteRules {
        let mut rules = RewriteRules::new();
        rules.insert("gs://bucket/a", Path::new("/d/a"));
        rules.insert("gs://bucket/a/b", Path::new("/d/a/b"));
        rules
    }

    #[test]
    fn test_rewrite_preserves_order() {
        let content = "gs://bucket/a/b/file.txt\ngs://bucket/a/x.txt\n";
        let result = rewrite_file_list(content, &rules());
        assert!(result.is_ok_and(|r| r == "/d/a/b/file.txt\n/d/a/x.txt\n"));
    }

    #[test]
    fn test_local_and_blank_lines_pass_through() {
        let content = "/d/a/x.txt\n\ngs://bucket/a/y.txt";
        let result = rewrite_file_list(content, &rules());
        assert!(result.is_ok_and(|r| r == "/d/a/x.txt\n\n/d/a/y.txt"));
    }

    #[test]
    fn test_local_lines_are_kept_verbatim() {
        let content = "  /keep/me  \r\n\t\n/last";
        let result = rewrite_file_list(content, &RewriteRules::new());
        assert!(result.is_ok_and(|r| r == content));

        let content = "/keep/me\r\n  gs://bucket/a/x.txt \r\n";
        let result = rewrite_file_list(content, &rules());
        assert!(result.is_ok_and(|r| r == "/keep/me\r\n/d/a/x.txt\r\n"));
    }

    #[test]
    fn test_unmapped_line_is_an_error() {
        let content = "gs://bucket/a/x.txt\ngs://elsewhere/z.txt\n";
        let result = rewrite_file_list(content, &rules());
        assert!(matches!(
            result,
            Err(ManifestError::UnmappableUri(uri)) if uri == "gs://elsewhere/z.txt"
        ));
    }

    #[test]
    fn test_remote_entries() {
        let content = "gs://b/1\n/local/2\n  gs://b/3  \n";
        let entries: Vec<&str> = remote_entries(content).collect();
        assert_eq!(entries, vec!["gs://b/1", "gs://b/3"]);
    }

    #[test]
    fn test_in_place_rewrite_leaves_file_untouched_on_error() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join("list.txt");
        let original = "gs://bucket/a/x.txt\ngs://nowhere/y\n";
        if fs::write(&path, original).is_err() {
            return;
        }

        assert!(rewrite_file_list_in_place(&path, &rules()).is_err());
        assert!(fs::read_to_string(&path).is_ok_and(|c| c == original));

        if fs::write(&path, "gs://bucket/a/x.txt\n").is_err() {
            return;
        }
        assert!(rewrite_file_list_in_place(&path, &rules()).is_ok());
        assert!(fs::read_to_string(&path).is_ok_and(|c| c == "/d/a/x.txt\n"));

        let local = "  /d/a/x.txt\r\n";
        if fs::write(&path, local).is_err() {
            return;
        }
        assert!(rewrite_file_list_in_place(&path, &rules()).is_ok());
        assert!(fs::read_to_string(&path).is_ok_and(|c| c == local));
    }
}
