//! Path templating for output-folder layout.
//!
//! Converts [`MediaRecord`] metadata into deterministic filesystem paths
//! using user-configured [upon] templates. The template syntax follows
//! upon's Mustache-like conventions (`{{ variable }}`,
//! `{{ value|formatter }}`), extended with two addons:
//!
//! - **`slug`** — Converts strings to URL-safe slugs, stripping quotation
//!   marks first to avoid artifacts like leading/trailing hyphens.
//! - **`truncate`** — Truncates strings to a maximum byte length at a
//!   character boundary, usable as either `truncate(value, n)` or
//!   `{{ value|truncate: n }}`.
//!
//! # Template Variables
//!
//! `number`, `title`, `actor`, `studio`, `director`, `release`, `year`,
//! `series`, `label` — all strings taken from the record. `actor` collapses
//! to a placeholder when the combined name list is unreasonably long, and
//! `title` is pre-truncated to the configured maximum, so the common
//! `{{ actor }}/{{ number }}` layout never produces oversized components.
//!
//! # Example
//!
//! ```
//! use reel_scrape::MediaRecord;
//! use reel_storage::PathGenerator;
//!
//! let record = MediaRecord {
//!     number: "ABC-123".into(),
//!     actor: "Some Actor".into(),
//!     ..MediaRecord::default()
//! };
//! let generator: PathGenerator = "{{ actor }}/{{ number }}".parse().unwrap();
//! assert_eq!(generator.generate(&record).unwrap(), "Some Actor/ABC-123");
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::path::validate as validate_path;
use exn::{OptionExt, ResultExt};
use reel_scrape::MediaRecord;
use std::str::FromStr;
use upon::{Engine, Template};

/// Placeholder used when a record's actor list is too long to be a path
/// component (ensemble titles routinely list dozens of names).
const ENSEMBLE_ACTOR: &str = "Various";
const MAX_ACTOR_LEN: usize = 100;

/// Generates deterministic filesystem paths from [`MediaRecord`] metadata
/// and a user-defined template string.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at creation time rather than at render time. The
/// compiled template is reusable across many [`generate`](Self::generate)
/// calls.
pub struct PathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
    max_title_len: usize,
}
impl FromStr for PathGenerator {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        // Compile the template early so we can fail-fast in construction.
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template, max_title_len: 0 })
    }
}
impl PathGenerator {
    /// Pre-truncate the `title` variable to at most `len` bytes (character
    /// boundary respected). `0` disables truncation.
    pub fn with_max_title_len(mut self, len: usize) -> Self {
        self.max_title_len = len;
        self
    }

    /// Renders the template against the given record, returning the
    /// normalized relative path.
    ///
    /// The resulting path is trimmed, segment-wise normalized, and
    /// validated to ensure it stays within the library root (no directory
    /// traversal).
    pub fn generate(&self, record: &MediaRecord) -> Result<String> {
        let path = self
            .template
            .render(&self.engine, self.parameters(record))
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        Self::normalize(path)
    }

    /// Trims each path segment, joins them with `/`, then validates.
    fn normalize(s: impl Into<String>) -> Result<String> {
        let path =
            s.into().trim().split('/').map(str::trim).filter(|p| !p.is_empty()).collect::<Vec<_>>().join("/");
        validate_path(&path).or_raise(|| ErrorKind::Template).and_then(|p| {
            p.to_str().map(|p| p.to_string())
            // Infallible: input was String, so won't fail. Here for completeness.
            .ok_or_raise(|| ErrorKind::Template)
        })
    }

    /// Builds the [`upon::Value`] map exposed to the template engine.
    fn parameters(&self, record: &MediaRecord) -> upon::Value {
        let actor = if record.actor.len() > MAX_ACTOR_LEN {
            ENSEMBLE_ACTOR.to_string()
        } else {
            record.actor.clone()
        };
        let title = if self.max_title_len > 0 {
            addons::truncate_to_char_boundary(&record.title, self.max_title_len)
        } else {
            record.title.clone()
        };
        upon::value! {
            number: &record.number,
            title: title,
            actor: actor,
            studio: &record.studio,
            director: &record.director,
            release: &record.release,
            year: &record.year,
            series: &record.series,
            label: &record.label,
        }
    }
}

/// Custom [`upon`] extensions for path-safe string manipulation.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Custom formatter that converts strings to URL-safe slugs.
    ///
    /// Strips quotation marks before slugifying to avoid awkward slug
    /// output like `"hello"` becoming `-hello-`.
    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                // Various quotation marks: '"''""„"`«»
                let marks = [
                    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}',
                    '\u{0060}', '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
                ];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                write!(f, "{}", slugify!(&stripped))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Truncates a string to a maximum byte length at a character boundary.
    ///
    /// This prevents cutting UTF-8 characters in the middle, which would
    /// produce invalid strings.
    pub(crate) fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> String {
        if s.len() <= max_bytes {
            return s.to_string();
        }
        let mut end = max_bytes;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }

    /// Registers the `slug` formatter and `truncate` function on the given engine.
    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("truncate", |s: &str, max: usize| truncate_to_char_boundary(s, max));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(number: &str, title: &str, actor: &str) -> MediaRecord {
        MediaRecord {
            number: number.to_string(),
            title: title.to_string(),
            actor: actor.to_string(),
            studio: "Studio".to_string(),
            year: "2024".to_string(),
            ..MediaRecord::default()
        }
    }

    #[test]
    fn test_generates_basic_path() {
        let generator: PathGenerator = "{{ actor }}/{{ number }}".parse().unwrap();
        let path = generator.generate(&make_record("ABC-123", "Title", "Some Actor")).unwrap();
        assert_eq!(path, "Some Actor/ABC-123");
    }

    #[test]
    fn test_slug_formatter() {
        let generator: PathGenerator = "{{ actor|slug }}/{{ number }}".parse().unwrap();
        let path = generator.generate(&make_record("ABC-123", "Title", "Some Actor")).unwrap();
        assert_eq!(path, "some-actor/ABC-123");
    }

    #[test]
    fn test_invalid_template_fails_at_parse() {
        let generator: std::result::Result<PathGenerator, _> = "{{ unclosed".parse();
        assert!(generator.is_err());
    }

    #[test]
    fn test_long_actor_collapses() {
        let actor = "A, ".repeat(50);
        let generator: PathGenerator = "{{ actor }}/{{ number }}".parse().unwrap();
        let path = generator.generate(&make_record("ABC-123", "Title", &actor)).unwrap();
        assert_eq!(path, "Various/ABC-123");
    }

    #[test]
    fn test_title_truncation() {
        let generator =
            "{{ number }}/{{ title }}".parse::<PathGenerator>().unwrap().with_max_title_len(6);
        let path = generator.generate(&make_record("ABC-123", "A Very Long Title", "X")).unwrap();
        assert_eq!(path, "ABC-123/A Very");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // Multi-byte characters are never split.
        assert_eq!(addons::truncate_to_char_boundary("日本語テスト", 7), "日本");
    }

    #[test]
    fn test_empty_segments_dropped() {
        let generator: PathGenerator = "{{ series }}/{{ number }}".parse().unwrap();
        // Record with no series: leading empty segment disappears.
        let path = generator.generate(&make_record("ABC-123", "Title", "Actor")).unwrap();
        assert_eq!(path, "ABC-123");
    }
}
