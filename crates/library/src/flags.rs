//! Presentation flags and destination naming.
//!
//! Flags are parsed from a filename with their own grammar, independent of
//! fragment detection — `ABC-123-C-cd2.mp4` is both part 2 of a group and
//! a Chinese-subtitled release. The same flags later drive destination
//! naming and sidecar tagging, so the suffix composition lives here too.

use regex::Regex;
use std::sync::LazyLock;

/// Naming convention for multi-part destination files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingStyle {
    /// Traditional Kodi stacking names: `-cd1`, `-cd2`, …
    #[default]
    Kodi,
    /// Jellyfin stacking names: `-part1`, `-part2`, …
    Jellyfin,
}

/// Markers parsed from a filename that affect naming and tagging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFlags {
    pub leak: bool,
    pub chinese_subtitle: bool,
    pub hack: bool,
    pub four_k: bool,
    pub iso: bool,
    /// Literal part token (`-CD1`) for files carrying one, or the
    /// synthesized `1-N` descriptor for fragment-group items.
    pub part: Option<String>,
    pub multi_part: bool,
}

static PART: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-_]CD\d+").unwrap());
static CHINESE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]C(\.\w+$|-\w+)|\d+ch(\.\w+$|-\w+)").unwrap());

impl MediaFlags {
    /// Parse the flag grammar out of a bare filename.
    pub fn parse(filename: &str) -> Self {
        let upper = filename.to_uppercase();
        let lower = filename.to_lowercase();
        let mut flags = Self::default();

        if let Some(matched) = PART.find(&upper) {
            flags.part = Some(matched.as_str().to_string());
            flags.multi_part = true;
        }

        if CHINESE.is_match(filename)
            || filename.contains("中文")
            || filename.contains("字幕")
            || lower.contains(".chs")
            || lower.contains(".cht")
        {
            flags.chinese_subtitle = true;
        }

        if filename.contains("流出") || lower.contains("uncensored") || lower.contains("leak") || upper.contains("-L")
        {
            flags.leak = true;
        }

        if upper.contains("HACK") || filename.contains("破解") || upper.contains("-U") || upper.contains("-UC") {
            flags.hack = true;
        }

        if upper.contains("4K") {
            flags.four_k = true;
        }
        if upper.contains(".ISO") {
            flags.iso = true;
        }

        // Combined markers set both of their component flags.
        if upper.contains("-UC") {
            flags.hack = true;
            flags.chinese_subtitle = true;
        }
        if upper.contains("-LC") {
            flags.leak = true;
            flags.chinese_subtitle = true;
        }

        flags
    }

    /// The presentation suffix: `-leak`, `-C` and `-hack` composed in that
    /// order, with the subtitle marker suppressed when leak or hack is
    /// present (those releases carry subtitles implicitly).
    pub fn suffix(&self) -> String {
        let mut suffix = String::new();
        if self.leak {
            suffix.push_str("-leak");
        }
        if self.chinese_subtitle && !self.hack && !self.leak {
            suffix.push_str("-C");
        }
        if self.hack {
            suffix.push_str("-hack");
        }
        suffix
    }

    /// Whether this item covers the first part of a title (or all of it).
    ///
    /// Asset staging for stills/trailer/portraits only happens once per
    /// title; parts 2..N never re-download.
    pub fn is_first_part(&self) -> bool {
        match &self.part {
            None => true,
            Some(part) => {
                let part = part.to_lowercase();
                part == "-cd1" || part.starts_with("1-")
            },
        }
    }

    /// The literal part token usable in a file name. The synthesized
    /// `1-N` group descriptor is not a name component.
    pub(crate) fn part_token(&self) -> &str {
        match &self.part {
            Some(part) if part.starts_with('-') || part.starts_with('_') => part,
            _ => "",
        }
    }
}

/// Destination name for a single-file (or per-part-flagged) item:
/// `{number}{part}{suffix}{ext}`.
pub fn file_name(number: &str, flags: &MediaFlags, extension: &str) -> String {
    format!("{number}{}{}{extension}", flags.part_token(), flags.suffix())
}

/// Destination name for member `index` (1-based) of a fragment group:
/// `{number}{suffix}-part{index}{ext}` (Jellyfin) or
/// `{number}{suffix}-cd{index}{ext}` (Kodi).
pub fn part_file_name(
    number: &str,
    flags: &MediaFlags,
    style: NamingStyle,
    index: usize,
    extension: &str,
) -> String {
    let marker = match style {
        NamingStyle::Jellyfin => "part",
        NamingStyle::Kodi => "cd",
    };
    format!("{number}{}-{marker}{index}{extension}", flags.suffix())
}
