//! Identifier extraction from filenames.
//!
//! Turns a raw filename into the stable identifier ("number") used for
//! metadata lookup and destination naming: `ssis-001-C.mp4` → `SSIS-001`.
//! User-configured patterns run first, then a table of source-specific
//! rules for labels whose numbering doesn't fit the standard
//! `letters-digits` shape, then the generic extraction with a cleanup pass
//! for web-prefix and quality-tag noise.
//!
//! Extraction is best-effort by design: a `None` here drops the file from
//! the queue with a warning rather than enqueuing an item with an empty
//! identifier.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Web prefixes and quality tags stripped before extraction.
static CLEANUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\w+\.(cc|com|net|me|club|jp|tv|xyz|biz|wiki|info|tw|us|de)@|^22-sht\.me|^(fhd|hd|sd|1080p|720p|4K)(-|_)|(-|_)(fhd|hd|sd|1080p|720p|4K|x264|x265|uncensored|hack|leak)",
    )
    .unwrap()
});
static BRACKET_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\d{4}-\d{1,2}-\d{1,2}\] - ").unwrap());
static CD_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)[-_]cd\d{1,2}").unwrap());
static FC2: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)FC2[-_]?(?:PPV[-_]?)?(\d+)").unwrap());
static COMPLEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)([a-z]+[-_][a-z]+)[-_](\d+)").unwrap());
static STANDARD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)([a-z]+)[-_](\d+)").unwrap());
static FALLBACK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z0-9-_]+").unwrap());
static PURE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{6,})$").unwrap());
static NO_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([a-zA-Z]+)(\d+)$").unwrap());
static SQUASHED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([a-zA-Z]{3,})(\d{3,})$").unwrap());

struct SourceRule {
    trigger: Regex,
    extract: fn(&str) -> Option<String>,
}

/// Labels whose numbering needs bespoke handling. Triggers are matched
/// against the whole stem; the first triggered rule that extracts wins.
static SOURCE_RULES: LazyLock<Vec<SourceRule>> = LazyLock::new(|| {
    vec![
        SourceRule {
            trigger: Regex::new(r"(?i)tokyo.*hot").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> =
                    LazyLock::new(|| Regex::new(r"(?i)(cz|gedo|k|n|red-|se)\d{2,4}").unwrap());
                N.find(stem).map(|m| m.as_str().to_string())
            },
        },
        SourceRule {
            trigger: Regex::new(r"(?i)carib").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{6}(-|_)\d{3}").unwrap());
                N.find(stem).map(|m| m.as_str().replace('_', "-"))
            },
        },
        SourceRule {
            trigger: Regex::new(r"(?i)1pon|mura|paco").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{6}(-|_)\d{3}").unwrap());
                N.find(stem).map(|m| m.as_str().replace('-', "_"))
            },
        },
        SourceRule {
            trigger: Regex::new(r"(?i)10mu").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{6}(-|_)\d{2}").unwrap());
                N.find(stem).map(|m| m.as_str().replace('-', "_"))
            },
        },
        SourceRule {
            trigger: Regex::new(r"(?i)x-art").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> =
                    LazyLock::new(|| Regex::new(r"(?i)x-art\.\d{2}\.\d{2}\.\d{2}").unwrap());
                N.find(stem).map(|m| m.as_str().to_string())
            },
        },
        SourceRule {
            trigger: Regex::new(r"(?i)xxx-av").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)xxx-av[^\d]*(\d{3,5})").unwrap());
                N.captures(stem).map(|c| format!("xxx-av-{}", &c[1]))
            },
        },
        SourceRule {
            trigger: Regex::new(r"(?i)heydouga").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})[-_](\d{3,4})").unwrap());
                N.captures(stem).map(|c| format!("heydouga-{}-{}", &c[1], &c[2]))
            },
        },
        SourceRule {
            trigger: Regex::new(r"(?i)heyzo").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)heyzo[^\d]*(\d{4})").unwrap());
                N.captures(stem).map(|c| format!("HEYZO-{}", &c[1]))
            },
        },
        SourceRule {
            trigger: Regex::new(r"(?i)mdbk").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)mdbk(-|_)(\d{4})").unwrap());
                N.find(stem).map(|m| m.as_str().to_string())
            },
        },
        SourceRule {
            trigger: Regex::new(r"(?i)mdtm").unwrap(),
            extract: |stem| {
                static N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)mdtm(-|_)(\d{4})").unwrap());
                N.find(stem).map(|m| m.as_str().to_string())
            },
        },
    ]
});

/// Extract the identifier from `filename` (extension optional).
///
/// `custom_patterns` are user-supplied regexes tried before anything else;
/// the first capture group of the **last** match in the stem wins, which
/// copes with release-group prefixes that also look like identifiers.
pub fn extract(filename: &str, custom_patterns: &[Regex]) -> Option<String> {
    let stem = match filename.rfind('.') {
        Some(index) if index > 0 => &filename[..index],
        _ => filename,
    };

    for pattern in custom_patterns {
        if let Some(captures) = pattern.captures_iter(stem).last() {
            let matched = captures.get(1).or_else(|| captures.get(0)).map(|m| m.as_str());
            if let Some(matched) = matched.filter(|m| !m.is_empty()) {
                let number = normalize(matched);
                debug!(pattern = pattern.as_str(), number = %number, "custom pattern matched");
                return Some(number);
            }
        }
    }

    for rule in SOURCE_RULES.iter() {
        if rule.trigger.is_match(stem)
            && let Some(number) = (rule.extract)(stem)
        {
            return Some(normalize(&number));
        }
    }

    let number = if stem.contains('-') || stem.contains('_') {
        extract_with_separator(stem)
    } else {
        extract_without_separator(stem)
    };
    number.map(|n| normalize(&n)).filter(|n| !n.is_empty())
}

/// Standard extraction for stems containing `-` or `_`.
fn extract_with_separator(stem: &str) -> Option<String> {
    let clean = CLEANUP.replace_all(stem, "");
    let clean = BRACKET_DATE.replace_all(&clean, "");

    if clean.to_lowercase().contains("fc2") {
        let squashed = clean.replace("--", "-").replace('_', "-");
        if let Some(captures) = FC2.captures(&squashed) {
            return Some(format!("FC2-{}", &captures[1]));
        }
    }

    let clean = CD_SUFFIX.replace_all(&clean, "");

    // Dual-prefix labels first (MKY-NS-001), plain letters-digits second.
    if let Some(captures) = COMPLEX.captures(&clean) {
        let prefix = captures[1].to_uppercase().replace('_', "-");
        return Some(format!("{prefix}-{}", &captures[2]));
    }
    if let Some(captures) = STANDARD.captures(&clean) {
        return Some(format!("{}-{}", captures[1].to_uppercase(), &captures[2]));
    }
    FALLBACK.find(&clean).map(|m| m.as_str().to_uppercase())
}

/// Extraction for stems with no separator (squashed and digit-only forms).
fn extract_without_separator(stem: &str) -> Option<String> {
    let clean = CLEANUP.replace_all(stem, "");
    let clean = CD_SUFFIX.replace_all(&clean, "");

    if let Some(captures) = PURE_DIGITS.captures(&clean) {
        return Some(captures[1].to_string());
    }
    if let Some(captures) = NO_SEPARATOR.captures(&clean) {
        return Some(format!("{}-{}", captures[1].to_uppercase(), &captures[2]));
    }
    let trimmed = clean.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_uppercase()) }
}

/// Normalize an extracted identifier into its canonical form.
fn normalize(number: &str) -> String {
    let mut number = number.replace('_', "-");
    for prefix in ["ppv-", "fc-"] {
        if number.to_lowercase().starts_with(prefix) && !number.to_lowercase().starts_with("fc2") {
            number = number[prefix.len()..].to_string();
        }
    }
    let number = number.trim_end_matches('-');
    match SQUASHED.captures(number) {
        Some(captures) => format!("{}-{}", captures[1].to_uppercase(), &captures[2]),
        None => number.to_uppercase(),
    }
}

/// Whether `number` denotes an uncensored title.
///
/// Built-in shape checks plus any configured `extra_prefixes` (already
/// uppercased by the configuration layer).
pub fn is_uncensored(number: &str, extra_prefixes: &[String]) -> bool {
    static CARIBBEAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{6}[-_]\d{2,3}$").unwrap());
    static TOKYO_HOT: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)^(cz|gedo|k|n|red-|se)\d{2,4}$").unwrap());
    static OTHER: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(heyzo-.+|xxx-av-.+|heydouga-.+|x-art\.\d{2}\.\d{2}\.\d{2})$").unwrap()
    });

    if PURE_DIGITS.is_match(number) || CARIBBEAN.is_match(number) || TOKYO_HOT.is_match(number) || OTHER.is_match(number)
    {
        return true;
    }
    let upper = number.to_uppercase();
    extra_prefixes.iter().any(|prefix| upper.starts_with(prefix.as_str()))
}
