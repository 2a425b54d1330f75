//! Fragment detection and grouping.
//!
//! A *fragment* is one physical file of a multi-part title
//! (`movie-cd1.mp4`, `movie[2].mkv`, `movie-B.avi`). Detection runs an
//! ordered table of named rules over the file stem; the first rule that
//! matches wins, which keeps the precedence between overlapping patterns
//! explicit and testable per rule. A file no rule matches is standalone.
//!
//! The rules, in priority order:
//!
//! 1. **keyword** — trailing `-cd1` / `_part2` / `.disc3` markers.
//! 2. **bracket** — trailing `[1]`, `[2]`, …
//! 3. **letter** — trailing `-A` / `_b`, mapped to an ordinal (`A` → 1).
//! 4. **digit** — trailing `-1` … `-9`, a single digit only. The
//!    restriction is deliberate: longer runs like `movie2021` or
//!    `movie-2021` are year-like noise, not part numbers.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// One raw file's fragment identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentInfo {
    pub file_path: PathBuf,
    /// Stem with the fragment marker stripped.
    pub base_name: String,
    /// 1-based part number; `0` means "not a fragment".
    pub part_number: u32,
    /// The literal matched marker, e.g. `-cd1`.
    pub part_suffix: String,
    /// File extension, dot included.
    pub extension: String,
}

/// The ordered set of fragments sharing one base identity.
///
/// Invariants: at least one member, sorted ascending by `part_number`.
/// Equal part numbers keep their input order (the sort is stable), so two
/// files that both claim part 2 don't shuffle between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentGroup {
    /// Lower-cased base name + extension; the clustering key.
    pub base_name: String,
    pub fragments: Vec<FragmentInfo>,
}

impl FragmentGroup {
    /// The representative file: first member after sorting.
    pub fn main_file(&self) -> &Path {
        &self.fragments[0].file_path
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Paths of every member, in part order.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.fragments.iter().map(|f| f.file_path.clone()).collect()
    }

    /// `true` when the part numbers are not exactly `1..=len`.
    ///
    /// Advisory only — a group with holes is still processed, the caller
    /// just gets to log about it.
    pub fn has_missing_parts(&self) -> bool {
        self.fragments.iter().enumerate().any(|(index, fragment)| fragment.part_number != index as u32 + 1)
    }
}

struct Rule {
    name: &'static str,
    pattern: Regex,
    ordinal: fn(&Captures) -> u32,
}

fn digit_ordinal(captures: &Captures) -> u32 {
    captures.get(1).map_or(0, |m| m.as_str().parse().unwrap_or(0))
}

fn letter_ordinal(captures: &Captures) -> u32 {
    captures
        .get(1)
        .and_then(|m| m.as_str().chars().next())
        .map_or(0, |letter| letter.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
}

/// Detection rules in priority order; first match wins.
static RULES: LazyLock<[Rule; 4]> = LazyLock::new(|| {
    [
        Rule {
            name: "keyword",
            pattern: Regex::new(r"(?i)[-_.](?:cd|part|disc)(\d+)$").unwrap(),
            ordinal: digit_ordinal,
        },
        Rule { name: "bracket", pattern: Regex::new(r"\[(\d+)\]$").unwrap(), ordinal: digit_ordinal },
        Rule { name: "letter", pattern: Regex::new(r"(?i)[-_]([a-z])$").unwrap(), ordinal: letter_ordinal },
        Rule { name: "digit", pattern: Regex::new(r"[-_]([1-9])$").unwrap(), ordinal: digit_ordinal },
    ]
});

fn split_stem(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(index) if index > 0 => (&filename[..index], &filename[index..]),
        _ => (filename, ""),
    }
}

/// Whether `filename` (no directory components) looks like a fragment.
pub fn is_fragment(filename: &str) -> bool {
    let (stem, _ext) = split_stem(filename);
    RULES.iter().any(|rule| rule.pattern.is_match(stem))
}

/// Parse a file path into its fragment identity.
///
/// Files no rule matches come back with `part_number == 0` and their stem
/// untouched; callers treat those as standalone.
pub fn parse(file_path: impl Into<PathBuf>) -> FragmentInfo {
    let file_path = file_path.into();
    let filename = file_path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
    let (stem, extension) = split_stem(&filename);

    for rule in RULES.iter() {
        if let Some(captures) = rule.pattern.captures(stem) {
            let matched = captures.get(0).expect("capture 0 always present");
            let part_number = (rule.ordinal)(&captures);
            tracing::trace!(rule = rule.name, filename = %filename, part_number, "fragment rule matched");
            return FragmentInfo {
                base_name: stem[..matched.start()].to_string(),
                part_number,
                part_suffix: matched.as_str().to_string(),
                extension: extension.to_string(),
                file_path,
            };
        }
    }
    FragmentInfo {
        base_name: stem.to_string(),
        part_number: 0,
        part_suffix: String::new(),
        extension: extension.to_string(),
        file_path,
    }
}

/// Cluster a file list into fragment groups and standalone files.
///
/// Group identity is the lower-cased base name + extension, so
/// `Movie-CD1.MP4` and `movie-cd2.mp4` land together. Groups come back in
/// discovery order (first member seen decides), standalone files in input
/// order. Within a group, members are sorted ascending by part number;
/// the sort is stable so equal part numbers keep input order.
pub fn group(file_paths: impl IntoIterator<Item = PathBuf>) -> (Vec<FragmentGroup>, Vec<PathBuf>) {
    let mut clusters: Vec<(String, Vec<FragmentInfo>)> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    let mut standalone = Vec::new();

    for file_path in file_paths {
        let filename = file_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !is_fragment(filename) {
            standalone.push(file_path);
            continue;
        }
        let info = parse(file_path);
        if info.part_number == 0 {
            standalone.push(info.file_path);
            continue;
        }
        let key = format!("{}{}", info.base_name, info.extension).to_lowercase();
        match index_by_key.get(&key) {
            Some(&index) => clusters[index].1.push(info),
            None => {
                index_by_key.insert(key.clone(), clusters.len());
                clusters.push((key, vec![info]));
            },
        }
    }

    let groups = clusters
        .into_iter()
        .map(|(base_name, mut fragments)| {
            fragments.sort_by_key(|f| f.part_number);
            FragmentGroup { base_name, fragments }
        })
        .collect();
    (groups, standalone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("movie-cd1.mp4", true)]
    #[case("movie-CD2.mp4", true)]
    #[case("movie_part3.mkv", true)]
    #[case("movie.disc2.avi", true)]
    #[case("movie[2].mp4", true)]
    #[case("movie-A.mp4", true)]
    #[case("movie_b.mp4", true)]
    #[case("movie-1.mp4", true)]
    #[case("movie-9.mp4", true)]
    #[case("movie.mp4", false)]
    #[case("movie-0.mp4", false)]
    #[case("movie-12.mp4", false)]
    #[case("movie2021.mp4", false)]
    #[case("movie-2021.mp4", false)]
    #[case("ABC-123.mp4", false)]
    fn test_is_fragment(#[case] filename: &str, #[case] expected: bool) {
        assert_eq!(is_fragment(filename), expected, "{filename}");
    }

    #[rstest]
    #[case("dir/Movie-CD2.MKV", "Movie", 2, "-CD2", ".MKV")]
    #[case("dir/movie.part12.mp4", "movie", 12, ".part12", ".mp4")]
    #[case("dir/movie[3].mp4", "movie", 3, "[3]", ".mp4")]
    #[case("dir/movie-A.mp4", "movie", 1, "-A", ".mp4")]
    #[case("dir/movie_c.mp4", "movie", 3, "_c", ".mp4")]
    #[case("dir/movie-7.mp4", "movie", 7, "-7", ".mp4")]
    fn test_parse_fragment(
        #[case] path: &str,
        #[case] base: &str,
        #[case] part: u32,
        #[case] suffix: &str,
        #[case] ext: &str,
    ) {
        let info = parse(path);
        assert_eq!(info.base_name, base);
        assert_eq!(info.part_number, part);
        assert_eq!(info.part_suffix, suffix);
        assert_eq!(info.extension, ext);
    }

    #[test]
    fn test_parse_standalone() {
        let info = parse("dir/movie2021.mp4");
        assert_eq!(info.part_number, 0);
        assert_eq!(info.base_name, "movie2021");
        assert!(info.part_suffix.is_empty());
    }

    #[test]
    fn test_keyword_beats_digit_rule() {
        // "-cd1" would also match the bare-digit rule; keyword must win so
        // the base name drops the whole marker.
        let info = parse("movie-cd1.mp4");
        assert_eq!(info.part_suffix, "-cd1");
        assert_eq!(info.base_name, "movie");
    }

    #[test]
    fn test_group_clusters_and_sorts() {
        let (groups, standalone) = group([
            PathBuf::from("in/movie-cd2.mp4"),
            PathBuf::from("in/other.mp4"),
            PathBuf::from("in/Movie-CD1.mp4"),
            PathBuf::from("in/movie-cd3.mp4"),
        ]);
        assert_eq!(standalone, [PathBuf::from("in/other.mp4")]);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.base_name, "movie.mp4");
        assert_eq!(group.len(), 3);
        let parts: Vec<u32> = group.fragments.iter().map(|f| f.part_number).collect();
        assert_eq!(parts, [1, 2, 3]);
        assert_eq!(group.main_file(), Path::new("in/Movie-CD1.mp4"));
        assert!(!group.has_missing_parts());
    }

    #[test]
    fn test_group_discovery_order() {
        let (groups, _) = group([
            PathBuf::from("b-cd1.mp4"),
            PathBuf::from("a-cd1.mp4"),
            PathBuf::from("a-cd2.mp4"),
            PathBuf::from("b-cd2.mp4"),
        ]);
        let names: Vec<&str> = groups.iter().map(|g| g.base_name.as_str()).collect();
        assert_eq!(names, ["b.mp4", "a.mp4"]);
    }

    #[test]
    fn test_group_extension_distinguishes() {
        // Same base, different container: two groups.
        let (groups, _) = group([
            PathBuf::from("movie-cd1.mp4"),
            PathBuf::from("movie-cd1.mkv"),
            PathBuf::from("movie-cd2.mp4"),
        ]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_missing_parts() {
        let (groups, _) = group([PathBuf::from("movie-cd1.mp4"), PathBuf::from("movie-cd3.mp4")]);
        assert!(groups[0].has_missing_parts());
    }

    #[test]
    fn test_equal_part_numbers_keep_input_order() {
        let (groups, _) = group([
            PathBuf::from("x/movie-cd2.mp4"),
            PathBuf::from("y/movie-CD2.mp4"),
            PathBuf::from("z/movie-cd1.mp4"),
        ]);
        let group = &groups[0];
        assert_eq!(group.main_file(), Path::new("z/movie-cd1.mp4"));
        // The two part-2 claims stay in the order they were seen.
        assert_eq!(group.fragments[1].file_path, Path::new("x/movie-cd2.mp4"));
        assert_eq!(group.fragments[2].file_path, Path::new("y/movie-CD2.mp4"));
        assert!(group.has_missing_parts());
    }
}
