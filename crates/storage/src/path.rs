//! Path validation and filename sanitization.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Validate a storage-relative path.
///
/// Rejects absolute paths and any `..` component (directory traversal);
/// `.` components are dropped during canonicalization.
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut validated = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => validated.push(part),
            Component::CurDir => {},
            _ => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
        }
    }
    Ok(validated)
}

/// Characters illegal on common filesystems, replaced with fullwidth
/// lookalikes so the name survives on anything (NTFS included) without
/// losing information.
const REPLACEMENTS: [(char, char); 9] = [
    ('<', '＜'),
    ('>', '＞'),
    (':', '꞉'),
    ('"', '＂'),
    ('/', '∕'),
    ('\\', '∖'),
    ('|', 'ǀ'),
    ('?', '？'),
    ('*', '∗'),
];

/// Sanitize a single filename (not a path) for maximum compatibility.
///
/// Control characters are dropped, illegal characters swapped for their
/// fullwidth lookalikes, and trailing dots/spaces trimmed (a Windows
/// restriction). An empty result becomes `unnamed_file`.
pub fn sanitize_file_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for ch in name.chars() {
        if (ch as u32) < 32 {
            continue;
        }
        match REPLACEMENTS.iter().find(|(illegal, _)| *illegal == ch) {
            Some((_, replacement)) => result.push(*replacement),
            None => result.push(ch),
        }
    }
    let result = result.trim_end_matches([' ', '.']).to_string();
    if result.is_empty() { "unnamed_file".to_string() } else { result }
}

/// Strip configured escape literals out of a path segment.
pub fn strip_literals(segment: &str, literals: &str) -> String {
    segment.chars().filter(|ch| *ch == '/' || *ch == '\\' || !literals.contains(*ch)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_plain_path() {
        assert_eq!(validate("Actor/ABC-123").unwrap(), PathBuf::from("Actor/ABC-123"));
        assert_eq!(validate("./Actor/ABC-123").unwrap(), PathBuf::from("Actor/ABC-123"));
    }

    #[test]
    fn test_validate_rejects_traversal() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("/absolute").is_err());
    }

    #[test]
    fn test_sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_file_name("a:b?c"), "a꞉b？c");
        assert_eq!(sanitize_file_name("x/y"), "x∕y");
    }

    #[test]
    fn test_sanitize_trims_trailing_dots_and_spaces() {
        assert_eq!(sanitize_file_name("name. . "), "name");
        assert_eq!(sanitize_file_name("   "), "unnamed_file");
    }

    #[test]
    fn test_sanitize_drops_control_characters() {
        assert_eq!(sanitize_file_name("a\u{1}b"), "ab");
    }

    #[test]
    fn test_strip_literals_keeps_separators() {
        assert_eq!(strip_literals("a(b)/c", "()"), "ab/c");
    }
}
