//! NFO metadata emission.
//!
//! Produces Kodi-compatible `<movie>` documents with CDATA sections for the
//! free-text fields. The NFO is written last in the processing pipeline and
//! doubles as the durability marker for an item, so emission failures are
//! fatal to the item even when everything before succeeded.

use crate::error::{ErrorKind, Result};
use reel_scrape::MediaRecord;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Fragment context for multi-part titles.
#[derive(Debug, Clone, Default)]
pub struct MultiPart {
    pub total_parts: usize,
    pub current_part: usize,
    /// Original file names of every member, first part onwards.
    pub fragment_files: Vec<String>,
    /// Combined size of all members, in bytes.
    pub total_size: u64,
}

/// Everything the writer needs besides the record itself.
#[derive(Debug, Clone, Default)]
pub struct NfoOptions {
    pub chinese_subtitle: bool,
    pub leak: bool,
    pub uncensored: bool,
    pub hack: bool,
    pub four_k: bool,
    pub iso: bool,
    /// Art file names as placed next to the video.
    pub poster: String,
    pub thumb: String,
    /// Fanart reference; empty when the target player derives its own.
    pub fanart: String,
    pub include_trailer: bool,
    pub multi_part: Option<MultiPart>,
}

/// Emit the NFO for `record` at `nfo_path`.
///
/// The document is rendered in full before any I/O, then written to a
/// sibling temp file and renamed into place so a crash never leaves a
/// half-written sidecar behind.
pub async fn write(record: &MediaRecord, options: &NfoOptions, nfo_path: &Path) -> Result<()> {
    let document = render(record, options);

    if let Some(parent) = nfo_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ErrorKind::Write(nfo_path.to_path_buf(), e))?;
    }
    let staging = nfo_path.with_extension("nfo.part");
    tokio::fs::write(&staging, document.as_bytes())
        .await
        .map_err(|e| ErrorKind::Write(staging.clone(), e))?;
    tokio::fs::rename(&staging, nfo_path)
        .await
        .map_err(|e| ErrorKind::Write(nfo_path.to_path_buf(), e))?;

    info!(nfo = %nfo_path.display(), "generated metadata sidecar");
    Ok(())
}

fn render(record: &MediaRecord, options: &NfoOptions) -> String {
    let title = display_title(record);
    let mut out = String::with_capacity(2048);
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8" ?>"#);
    let _ = writeln!(out, "<movie>");
    let _ = writeln!(out, "  <title><![CDATA[{title}]]></title>");
    let _ = writeln!(out, "  <originaltitle><![CDATA[{}]]></originaltitle>", record.original_title);
    let _ = writeln!(out, "  <sorttitle><![CDATA[{title}]]></sorttitle>");
    let _ = writeln!(out, "  <set>{}</set>", escape(&record.series));
    let _ = writeln!(out, "  <studio>{}</studio>", escape(&record.studio));
    let _ = writeln!(out, "  <year>{}</year>", escape(&record.year));
    let outline = outline(record);
    let _ = writeln!(out, "  <outline><![CDATA[{outline}]]></outline>");
    let _ = writeln!(out, "  <plot><![CDATA[{outline}]]></plot>");
    let _ = writeln!(out, "  <runtime>{}</runtime>", escape(record.runtime.replace(' ', "").as_str()));
    let _ = writeln!(out, "  <director>{}</director>", escape(&record.director));
    let _ = writeln!(out, "  <poster>{}</poster>", escape(&options.poster));
    let _ = writeln!(out, "  <thumb>{}</thumb>", escape(&options.thumb));
    if !options.fanart.is_empty() {
        let _ = writeln!(out, "  <fanart>{}</fanart>", escape(&options.fanart));
    }

    for name in &record.actor_list {
        let _ = writeln!(out, "  <actor>");
        let _ = writeln!(out, "    <name>{}</name>", escape(name));
        if let Some(thumb) = record.actor_photo.get(name).filter(|t| !t.is_empty()) {
            let _ = writeln!(out, "    <thumb>{}</thumb>", escape(thumb));
        }
        let _ = writeln!(out, "  </actor>");
    }

    let _ = writeln!(out, "  <maker>{}</maker>", escape(&record.studio));
    let _ = writeln!(out, "  <label>{}</label>", escape(&record.label));

    let mut tags: Vec<&str> = presentation_tags(options);
    tags.extend(record.tag.iter().map(String::as_str));
    for tag in &tags {
        let _ = writeln!(out, "  <tag>{}</tag>", escape(tag));
        let _ = writeln!(out, "  <genre>{}</genre>", escape(tag));
    }

    let _ = writeln!(out, "  <num>{}</num>", escape(&record.number));
    let _ = writeln!(out, "  <premiered>{}</premiered>", escape(&record.release));
    let _ = writeln!(out, "  <releasedate>{}</releasedate>", escape(&record.release));
    let _ = writeln!(out, "  <release>{}</release>", escape(&record.release));

    if record.user_rating > 0.0 {
        let _ = writeln!(out, "  <rating>{:.1}</rating>", record.user_rating * 2.0);
        let _ = writeln!(out, "  <criticrating>{:.1}</criticrating>", record.user_rating * 20.0);
        let _ = writeln!(out, "  <ratings>");
        let _ = writeln!(out, r#"    <rating name="{}" max="5" default="true">"#, escape(&record.source));
        let _ = writeln!(out, "      <value>{:.1}</value>", record.user_rating);
        let _ = writeln!(out, "      <votes>{}</votes>", record.user_votes);
        let _ = writeln!(out, "    </rating>");
        let _ = writeln!(out, "  </ratings>");
    }

    let _ = writeln!(out, "  <cover>{}</cover>", escape(&record.cover));
    if options.include_trailer && !record.trailer.is_empty() {
        let _ = writeln!(out, "  <trailer>{}</trailer>", escape(&record.trailer));
    }
    let _ = writeln!(out, "  <website>{}</website>", escape(&record.website));

    if let Some(parts) = &options.multi_part {
        let _ = writeln!(out, "  <ismultipart>true</ismultipart>");
        let _ = writeln!(out, "  <totalparts>{}</totalparts>", parts.total_parts);
        let _ = writeln!(out, "  <currentpart>{}</currentpart>", parts.current_part);
        let _ = writeln!(out, "  <totalfilesize>{}</totalfilesize>", parts.total_size);
        for file in &parts.fragment_files {
            let _ = writeln!(out, "  <fragmentfile>{}</fragmentfile>", escape(file));
        }
    }

    let _ = writeln!(out, "</movie>");
    out
}

fn display_title(record: &MediaRecord) -> String {
    if record.title.is_empty() {
        record.number.clone()
    } else {
        format!("{}-{}", record.number, record.title)
    }
}

fn outline(record: &MediaRecord) -> String {
    if record.outline.is_empty() {
        String::new()
    } else {
        // Prefix with the identifier so search inside players finds it.
        format!("{}#{}", record.number, record.outline)
    }
}

fn presentation_tags(options: &NfoOptions) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if options.chinese_subtitle {
        tags.push("Chinese Subtitle");
    }
    if options.leak {
        tags.push("Leak");
    }
    if options.uncensored {
        tags.push("Uncensored");
    }
    if options.hack {
        tags.push("Hack");
    }
    if options.four_k {
        tags.push("4K");
    }
    if options.iso {
        tags.push("ISO");
    }
    tags
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MediaRecord {
        MediaRecord {
            number: "ABC-123".into(),
            title: "A Title".into(),
            actor_list: vec!["Actor One".into()],
            studio: "Studio & Co".into(),
            year: "2023".into(),
            release: "2023-05-01".into(),
            outline: "Something happens.".into(),
            user_rating: 4.2,
            user_votes: 99,
            source: "javdb".into(),
            ..MediaRecord::default()
        }
    }

    #[tokio::test]
    async fn test_write_creates_document() {
        let dir = tempfile::tempdir().unwrap();
        let nfo_path = dir.path().join("ABC-123.nfo");
        let options = NfoOptions { poster: "poster.jpg".into(), thumb: "thumb.jpg".into(), ..NfoOptions::default() };

        write(&record(), &options, &nfo_path).await.unwrap();
        let body = tokio::fs::read_to_string(&nfo_path).await.unwrap();
        assert!(body.starts_with(r#"<?xml version="1.0" encoding="UTF-8" ?>"#));
        assert!(body.contains("<title><![CDATA[ABC-123-A Title]]></title>"));
        assert!(body.contains("<num>ABC-123</num>"));
        assert!(body.contains("<studio>Studio &amp; Co</studio>"));
        assert!(body.contains("<outline><![CDATA[ABC-123#Something happens.]]></outline>"));
        // No leftover staging file.
        assert!(!dir.path().join("ABC-123.nfo.part").exists());
    }

    #[tokio::test]
    async fn test_presentation_tags_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let nfo_path = dir.path().join("ABC-123.nfo");
        let options = NfoOptions { leak: true, four_k: true, ..NfoOptions::default() };

        write(&record(), &options, &nfo_path).await.unwrap();
        let body = tokio::fs::read_to_string(&nfo_path).await.unwrap();
        assert!(body.contains("<tag>Leak</tag>"));
        assert!(body.contains("<genre>4K</genre>"));
        assert!(!body.contains("<tag>Hack</tag>"));
    }

    #[tokio::test]
    async fn test_multi_part_block() {
        let dir = tempfile::tempdir().unwrap();
        let nfo_path = dir.path().join("ABC-123.nfo");
        let options = NfoOptions {
            multi_part: Some(MultiPart {
                total_parts: 2,
                current_part: 1,
                fragment_files: vec!["ABC-123-cd1.mp4".into(), "ABC-123-cd2.mp4".into()],
                total_size: 1024,
            }),
            ..NfoOptions::default()
        };

        write(&record(), &options, &nfo_path).await.unwrap();
        let body = tokio::fs::read_to_string(&nfo_path).await.unwrap();
        assert!(body.contains("<totalparts>2</totalparts>"));
        assert!(body.contains("<fragmentfile>ABC-123-cd2.mp4</fragmentfile>"));
    }

    #[tokio::test]
    async fn test_rating_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let nfo_path = dir.path().join("ABC-123.nfo");
        write(&record(), &NfoOptions::default(), &nfo_path).await.unwrap();
        let body = tokio::fs::read_to_string(&nfo_path).await.unwrap();
        assert!(body.contains("<rating>8.4</rating>"));
        assert!(body.contains("<votes>99</votes>"));
    }
}
