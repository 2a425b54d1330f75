//! The metadata record returned by lookup adapters.

use serde::Deserialize;
use std::collections::HashMap;

/// How the poster image should be derived from the cover.
///
/// Sources report this alongside the record; `3` means a dedicated small
/// cover exists and no crop is needed, `1` forces a crop, `0` leaves the
/// cover untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "u8")]
pub enum ImageCut {
    /// Use the cover as-is.
    #[default]
    None,
    /// Crop the poster out of the cover.
    Crop,
    /// A separate small cover is available; download it instead of cropping.
    SmallCover,
}
impl From<u8> for ImageCut {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Crop,
            3 => Self::SmallCover,
            _ => Self::None,
        }
    }
}

/// One title's metadata as returned by a [`MetadataSource`](crate::MetadataSource).
///
/// The record is opaque to the processing pipeline: fields are read for
/// naming, sidecar emission, and asset staging but never written back.
/// Everything is optional in practice except `number`; adapters that cannot
/// produce a number must return `NotFound` instead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaRecord {
    /// The stable identifier, e.g. `ABC-123`.
    pub number: String,
    pub title: String,
    pub original_title: String,
    pub actor: String,
    pub actor_list: Vec<String>,
    /// Actor name → portrait URL.
    pub actor_photo: HashMap<String, String>,
    pub release: String,
    pub year: String,
    pub runtime: String,
    pub director: String,
    pub studio: String,
    pub label: String,
    pub series: String,
    pub tag: Vec<String>,
    pub outline: String,
    /// Full-size cover URL; empty when the source has none.
    pub cover: String,
    /// Small cover URL, only meaningful with [`ImageCut::SmallCover`].
    pub cover_small: String,
    pub trailer: String,
    pub extrafanart: Vec<String>,
    pub website: String,
    /// Which adapter produced the record.
    pub source: String,
    #[serde(rename = "imagecut")]
    pub image_cut: ImageCut,
    pub uncensored: bool,
    #[serde(rename = "userrating")]
    pub user_rating: f64,
    #[serde(rename = "uservotes")]
    pub user_votes: u64,
    /// Extra HTTP headers required when fetching this record's assets
    /// (referer-locked CDNs and the like).
    pub headers: HashMap<String, String>,
}
