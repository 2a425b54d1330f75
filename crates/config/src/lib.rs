//! Layered configuration for the `reel` pipeline.
//!
//! Settings are merged from three layers, later layers winning:
//! built-in defaults, an optional TOML file, and `REEL_*` environment
//! variables (double underscore separating sections, e.g.
//! `REEL_COMMON__MULTI_THREADING=4`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
pub use reel_storage::LinkMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which of the three processing modes a batch runs in.
///
/// Selected once per batch from configuration; items never transition
/// between modes. The wire representation is the historical integer
/// (`1`/`2`/`3`), and anything else is rejected while the configuration is
/// being extracted — before any item starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Mode {
    /// Scrape metadata, stage assets, and move files into the library.
    Scraping,
    /// Move files into the library without staging assets.
    Organizing,
    /// Scrape in place: emit assets and sidecars next to the file, no moves.
    Analysis,
}
impl TryFrom<u8> for Mode {
    type Error = String;
    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Scraping),
            2 => Ok(Self::Organizing),
            3 => Ok(Self::Analysis),
            other => Err(format!("unsupported processing mode: {other}")),
        }
    }
}
impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Scraping => 1,
            Mode::Organizing => 2,
            Mode::Analysis => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Common {
    pub main_mode: Mode,
    pub source_folder: String,
    pub success_output_folder: String,
    pub failed_output_folder: String,
    pub link_mode: LinkMode,
    /// Physically move failed sources into the holding area (as opposed to
    /// only recording them in the failure list).
    pub failed_move: bool,
    pub del_empty_folder: bool,
    /// `true` selects Jellyfin-style `-partN` stacking names, `false` the
    /// traditional Kodi `-cdN` names.
    pub jellyfin: bool,
    /// Seconds to wait before dispatching each unit of work.
    pub sleep: u64,
    /// Maximum simultaneously active items; `0` means fully sequential.
    pub multi_threading: usize,
    /// Stop after this many queue items; `0` means no limit.
    pub stop_counter: usize,
}
impl Default for Common {
    fn default() -> Self {
        Self {
            main_mode: Mode::Scraping,
            source_folder: "./".into(),
            success_output_folder: "output".into(),
            failed_output_folder: "failed".into(),
            link_mode: LinkMode::Move,
            failed_move: true,
            del_empty_folder: true,
            jellyfin: false,
            sleep: 3,
            multi_threading: 0,
            stop_counter: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NameRule {
    /// Output folder layout, an `upon` template over the metadata record.
    pub location_rule: String,
    /// Base name for sidecar stubs, an `upon` template over the record.
    pub naming_rule: String,
    pub max_title_len: usize,
    /// Name art files `{number}-poster.jpg` instead of bare `poster.jpg`.
    pub image_naming_with_number: bool,
    /// Whitespace-separated custom identifier regexes, tried first.
    pub number_regexs: String,
}
impl Default for NameRule {
    fn default() -> Self {
        Self {
            location_rule: "{{ actor }}/{{ number }}".into(),
            naming_rule: "{{ number }}".into(),
            max_title_len: 50,
            image_naming_with_number: false,
            number_regexs: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Media {
    /// Comma-separated video extensions that count as library media.
    pub media_type: String,
    /// Comma-separated subtitle extensions searched during relocation.
    pub sub_type: String,
}
impl Default for Media {
    fn default() -> Self {
        Self {
            media_type: ".mp4,.avi,.rmvb,.wmv,.mov,.mkv,.flv,.ts,.webm,.iso,.mpg,.m4v".into(),
            sub_type: ".smi,.srt,.idx,.sub,.sup,.psb,.ssa,.ass,.usf,.xss,.ssf,.rt,.lrc,.sbv,.vtt,.ttml".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Escape {
    /// Comma-separated directory names skipped while walking the source.
    pub folders: String,
    /// Characters stripped from generated paths.
    pub literals: String,
}
impl Default for Escape {
    fn default() -> Self {
        Self { folders: "failed,output".into(), literals: "\\()".into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Uncensored {
    /// Comma-separated identifier prefixes always treated as uncensored.
    pub uncensored_prefix: String,
}

/// A plain on/off section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Switch {
    pub switch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Face {
    /// Only run face-aware cropping for uncensored titles.
    pub uncensored_only: bool,
    /// Crop a poster out of the cover even when the source didn't ask for it.
    pub always_imagecut: bool,
}
impl Default for Face {
    fn default() -> Self {
        Self { uncensored_only: true, always_imagecut: false }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorPhoto {
    pub download_for_kodi: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scraper {
    /// Base URL of the JSON metadata service.
    pub api_url: String,
    /// Preferred adapter name forwarded to the service; empty lets the
    /// service pick.
    pub source: String,
}
impl Default for Scraper {
    fn default() -> Self {
        Self { api_url: "http://127.0.0.1:8080".into(), source: String::new() }
    }
}

/// The full configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub common: Common,
    pub scraper: Scraper,
    pub name_rule: NameRule,
    pub media: Media,
    pub escape: Escape,
    pub uncensored: Uncensored,
    pub extrafanart: Switch,
    pub trailer: Switch,
    pub watermark: Switch,
    pub strm: Switch,
    pub actor_photo: ActorPhoto,
    pub face: Face,
}

impl Settings {
    /// Merge defaults, an optional TOML file, and `REEL_*` environment
    /// variables into a validated [`Settings`].
    ///
    /// With no explicit `file`, `./reel.toml` is tried first, then the
    /// platform config directory (`~/.config/reel/config.toml` on Linux).
    ///
    /// # Errors
    /// Returns [`ErrorKind::Load`] when a layer cannot be read or a value
    /// fails extraction (including an unsupported `main_mode`).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        match file {
            Some(file) => figment = figment.merge(Toml::file_exact(file)),
            None => {
                if let Some(dirs) = ProjectDirs::from("", "", "reel") {
                    figment = figment.merge(Toml::file(dirs.config_dir().join("config.toml")));
                }
                figment = figment.merge(Toml::file("reel.toml"));
            },
        }
        figment
            .merge(Env::prefixed("REEL_").split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)
    }

    /// Video extensions, lowercased, leading dot kept.
    pub fn media_extensions(&self) -> Vec<String> {
        split_extensions(&self.media.media_type)
    }

    /// Subtitle extensions, lowercased, leading dot kept.
    pub fn subtitle_extensions(&self) -> Vec<String> {
        split_extensions(&self.media.sub_type)
    }

    /// Directory names to skip while walking the source folder.
    pub fn escape_folders(&self) -> Vec<String> {
        self.escape
            .folders
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Uncensored identifier prefixes, uppercased.
    pub fn uncensored_prefixes(&self) -> Vec<String> {
        self.uncensored
            .uncensored_prefix
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase)
            .collect()
    }
}

fn split_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.common.main_mode, Mode::Scraping);
        assert_eq!(settings.common.multi_threading, 0);
        assert!(settings.common.failed_move);
        assert_eq!(settings.name_rule.location_rule, "{{ actor }}/{{ number }}");
        assert!(settings.media_extensions().contains(&".mkv".to_string()));
        assert!(settings.subtitle_extensions().contains(&".srt".to_string()));
    }

    #[rstest]
    #[case(1, Mode::Scraping)]
    #[case(2, Mode::Organizing)]
    #[case(3, Mode::Analysis)]
    fn test_mode_from_wire_value(#[case] wire: u8, #[case] expected: Mode) {
        assert_eq!(Mode::try_from(wire).unwrap(), expected);
    }

    #[test]
    fn test_mode_rejects_unknown_value() {
        assert!(Mode::try_from(0).is_err());
        assert!(Mode::try_from(4).is_err());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[common]\nmain_mode = 3\nmulti_threading = 8\n\n[name_rule]\nlocation_rule = \"{{{{ number }}}}\"\n"
        )
        .unwrap();
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.common.main_mode, Mode::Analysis);
        assert_eq!(settings.common.multi_threading, 8);
        assert_eq!(settings.name_rule.location_rule, "{{ number }}");
        // Untouched sections keep their defaults.
        assert_eq!(settings.common.sleep, 3);
    }

    #[test]
    fn test_invalid_mode_fails_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[common]\nmain_mode = 7\n").unwrap();
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }

    #[test]
    fn test_prefix_lists_are_trimmed() {
        let settings = Settings {
            uncensored: Uncensored { uncensored_prefix: "fc2, carib ,,heyzo".into() },
            ..Settings::default()
        };
        assert_eq!(settings.uncensored_prefixes(), ["FC2", "CARIB", "HEYZO"]);
    }
}
