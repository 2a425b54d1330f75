//! Local filesystem media store.
//!
//! All mutation of the library layout goes through [`MediaStore`]: creating
//! templated output folders, placing (moving/linking) videos, relocating
//! subtitles, routing failed sources into the holding area, and sweeping
//! empty directories after a batch. Paths are absolute here — unlike a
//! storage backend behind a root, the store spans the source tree, the
//! success tree, and the failed tree at once.

use crate::error::{ErrorKind, Result};
use crate::path::{sanitize_file_name, strip_literals};
use crate::template::PathGenerator;
use reel_scrape::MediaRecord;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// How placed files reach their destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum LinkMode {
    /// Physically move the file (rename, copy+delete across devices).
    #[default]
    Move,
    /// Leave the source in place and symlink it from the destination.
    Symlink,
    /// Hard link, falling back to a symlink across filesystems.
    HardLink,
}
impl From<u8> for LinkMode {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Symlink,
            2 => Self::HardLink,
            // Unknown link modes behave like a plain move.
            _ => Self::Move,
        }
    }
}
impl From<LinkMode> for u8 {
    fn from(mode: LinkMode) -> Self {
        match mode {
            LinkMode::Move => 0,
            LinkMode::Symlink => 1,
            LinkMode::HardLink => 2,
        }
    }
}

/// Everything the store needs to know, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub success_root: PathBuf,
    pub failed_root: PathBuf,
    pub link_mode: LinkMode,
    /// Physically move failed sources (as opposed to doing nothing).
    pub failed_move: bool,
    /// Only append failed sources to `failed_list.txt` — used when files
    /// are linked rather than moved, or when scraping in place, because
    /// relocating the source would break the links / the library.
    pub record_failures_only: bool,
    /// Subtitle extensions (lowercase, dot included).
    pub subtitle_extensions: Vec<String>,
    /// Characters stripped from generated folder paths.
    pub escape_literals: String,
    pub location_rule: String,
    pub max_title_len: usize,
}

/// Name of the append-only list of failed sources in the holding area.
const FAILED_LIST: &str = "failed_list.txt";
/// Provenance log for files physically moved into the holding area.
const MOVE_RECORD: &str = "where_was_i_before_being_moved.txt";

pub struct MediaStore {
    options: StoreOptions,
    template: PathGenerator,
}

impl MediaStore {
    /// Build a store from resolved options.
    ///
    /// # Errors
    /// Returns [`ErrorKind::Template`] when the location rule does not
    /// compile — a configuration problem surfaced before any item runs.
    pub fn new(options: StoreOptions) -> Result<Self> {
        let template =
            options.location_rule.parse::<PathGenerator>()?.with_max_title_len(options.max_title_len);
        Ok(Self { options, template })
    }

    /// Render the location rule for `record` and create the directory.
    ///
    /// Each rendered segment is stripped of escape literals and sanitized.
    /// If the templated path cannot be created, falls back to a bare
    /// `{number}` folder so a weird metadata value never fails the item on
    /// its own.
    pub async fn create_output_folder(&self, record: &MediaRecord) -> Result<PathBuf> {
        let rendered = self.template.generate(record)?;
        let relative: PathBuf = rendered
            .split('/')
            .map(|segment| sanitize_file_name(&strip_literals(segment, &self.options.escape_literals)))
            .collect();
        let full = self.options.success_root.join(relative);
        debug!(path = %full.display(), "evaluated output folder");

        match fs::create_dir_all(&full).await {
            Ok(()) => Ok(full),
            Err(err) => {
                let fallback = self.options.success_root.join(sanitize_file_name(&record.number));
                warn!(
                    original = %full.display(),
                    fallback = %fallback.display(),
                    error = %err,
                    "falling back to number-only output folder"
                );
                fs::create_dir_all(&fallback).await.map_err(|e| map_io_error(e, &fallback))?;
                Ok(fallback)
            },
        }
    }

    /// Place `src` at `dest` according to the configured link mode.
    ///
    /// The destination file name is sanitized; parent directories are
    /// created. Refuses with [`ErrorKind::AlreadyExists`] when the
    /// destination is occupied — placement never overwrites.
    pub async fn place(&self, src: &Path, dest: &Path) -> Result<()> {
        let dest = sanitized_destination(dest)?;
        if fs::try_exists(&dest).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::AlreadyExists(dest));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(|e| map_io_error(e, parent))?;
        }

        match self.options.link_mode {
            LinkMode::Move => move_file(src, &dest).await,
            LinkMode::Symlink => symlink_file(src, &dest).await,
            LinkMode::HardLink => match fs::hard_link(src, &dest).await {
                Ok(()) => {
                    info!(from = %src.display(), to = %dest.display(), "created hard link");
                    Ok(())
                },
                Err(err) => {
                    debug!(error = %err, "hard link failed, trying soft link");
                    symlink_file(src, &dest).await
                },
            },
        }
    }

    /// Find subtitle files sharing `video`'s base name in its directory.
    ///
    /// Matches the exact base name plus the `base.lang` / `base_lang`
    /// suffix conventions, case-insensitively. I/O problems merely end the
    /// search — missing subtitles are never an error.
    pub async fn find_subtitles(&self, video: &Path) -> Vec<PathBuf> {
        let Some(dir) = video.parent() else { return Vec::new() };
        let base = match video.file_stem().and_then(|s| s.to_str()) {
            Some(base) => base.to_lowercase(),
            None => return Vec::new(),
        };

        let mut found = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to read directory for subtitle search");
                return found;
            },
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
            if !self.options.subtitle_extensions.iter().any(|s| s.trim_start_matches('.').eq_ignore_ascii_case(ext)) {
                continue;
            }
            let stem = name[..name.len() - ext.len() - 1].to_lowercase();
            if stem == base || stem.starts_with(&format!("{base}.")) || stem.starts_with(&format!("{base}_")) {
                debug!(subtitle = name, "found subtitle file");
                found.push(path);
            }
        }
        found
    }

    /// Move subtitles next to the placed video, renamed to its base name.
    ///
    /// Language/type suffixes (`movie.zh.srt`, `movie_forced.srt`) survive
    /// the rename. Already-present destinations and per-file failures are
    /// skipped so one stubborn subtitle never blocks the rest.
    pub async fn move_subtitles(&self, subtitles: &[PathBuf], video_file_name: &str, dest_dir: &Path) -> Result<()> {
        let video_base = match video_file_name.rsplit_once('.') {
            Some((base, _ext)) => base,
            None => video_file_name,
        };

        for subtitle in subtitles {
            let Some(name) = subtitle.file_name().and_then(|n| n.to_str()) else { continue };
            let (original_base, ext) = match name.rsplit_once('.') {
                Some((base, ext)) => (base, ext),
                None => continue,
            };
            // Preserve everything after the first dot/underscore as the
            // language or type suffix.
            let suffix = match (original_base.find('.'), original_base.find('_')) {
                (Some(dot), _) => original_base[dot..].to_string(),
                (None, Some(underscore)) => format!(".{}", &original_base[underscore + 1..]),
                (None, None) => String::new(),
            };
            let new_name = format!("{video_base}{suffix}.{ext}");
            let dest = dest_dir.join(&new_name);

            if fs::try_exists(&dest).await.unwrap_or(false) {
                debug!(subtitle = %new_name, "subtitle already at destination");
                continue;
            }
            match self.place(subtitle, &dest).await {
                Ok(()) => info!(from = name, to = %new_name, "moved subtitle file"),
                Err(err) => warn!(subtitle = name, error = %err, "failed to move subtitle file"),
            }
        }
        Ok(())
    }

    /// Route a failed source file into the holding area.
    ///
    /// Depending on configuration this either appends the path to
    /// `failed_list.txt` (link modes and in-place scraping, where moving
    /// the source would do damage) or physically moves the file, leaving a
    /// provenance line in `where_was_i_before_being_moved.txt`.
    pub async fn isolate(&self, path: &Path) -> Result<()> {
        let failed_root = &self.options.failed_root;
        fs::create_dir_all(failed_root).await.map_err(|e| map_io_error(e, failed_root))?;

        if self.options.record_failures_only {
            return self.append_to_failed_list(path).await;
        }
        if !self.options.failed_move {
            return Ok(());
        }

        // Source already gone (perhaps placed before a later step failed);
        // nothing to isolate.
        if !fs::try_exists(path).await.map_err(ErrorKind::Io)? {
            warn!(source = %path.display(), "source no longer exists, skipping isolation");
            return Ok(());
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("unnamed_file");
        let dest = failed_root.join(sanitize_file_name(name));
        if fs::try_exists(&dest).await.map_err(ErrorKind::Io)? {
            // A copy is already quarantined; drop the duplicate source so
            // the next run doesn't trip over it again.
            warn!(file = name, "file already exists in failed folder, removing duplicate source");
            fs::remove_file(path).await.map_err(|e| map_io_error(e, path))?;
            return Ok(());
        }

        self.record_move(path, &dest).await;
        move_file(path, &dest).await?;
        info!(file = name, "moved to failed folder");
        Ok(())
    }

    async fn append_to_failed_list(&self, path: &Path) -> Result<()> {
        let list = self.options.failed_root.join(FAILED_LIST);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&list)
            .await
            .map_err(|e| map_io_error(e, &list))?;
        file.write_all(format!("{}\n", path.display()).as_bytes()).await.map_err(ErrorKind::Io)?;
        info!(source = %path.display(), "added to failed list");
        Ok(())
    }

    /// Best effort provenance line; failures only logged.
    async fn record_move(&self, from: &Path, to: &Path) {
        let record = self.options.failed_root.join(MOVE_RECORD);
        let timestamp =
            OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "unknown-time".to_string());
        let line = format!("{timestamp} FROM[{}]TO[{}]\n", from.display(), to.display());
        let result = async {
            let mut file = fs::OpenOptions::new().create(true).append(true).open(&record).await?;
            file.write_all(line.as_bytes()).await
        }
        .await;
        if let Err(err) = result {
            warn!(error = %err, "failed to write move record");
        }
    }

    /// Remove empty directories beneath `root` (deepest first), never the
    /// root itself. All errors are swallowed; the sweep is cosmetic.
    pub async fn remove_empty_dirs(&self, root: &Path) -> Result<()> {
        let mut directories = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    stack.push(entry.path());
                    directories.push(entry.path());
                }
            }
        }
        // Deepest first so a directory that only contained empty
        // directories is itself empty by the time we reach it.
        directories.sort_by_key(|path| std::cmp::Reverse(path.components().count()));
        for dir in directories {
            if fs::remove_dir(&dir).await.is_ok() {
                info!(dir = %dir.display(), "removed empty folder");
            }
        }
        Ok(())
    }
}

fn sanitized_destination(dest: &Path) -> Result<PathBuf> {
    let name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidPath(dest.to_path_buf())))?;
    Ok(match dest.parent() {
        Some(parent) => parent.join(sanitize_file_name(name)),
        None => PathBuf::from(sanitize_file_name(name)),
    })
}

async fn move_file(src: &Path, dest: &Path) -> Result<()> {
    match fs::rename(src, dest).await {
        Ok(()) => {
            info!(from = %src.display(), to = %dest.display(), "moved file");
            Ok(())
        },
        // Rename can't cross filesystems; fall back to copy + delete.
        Err(_) => copy_and_delete(src, dest).await,
    }
}

async fn copy_and_delete(src: &Path, dest: &Path) -> Result<()> {
    if let Err(err) = fs::copy(src, dest).await {
        // Remove the partial copy before reporting.
        _ = fs::remove_file(dest).await;
        return Err(exn::Exn::from(map_io_error(err, src)));
    }
    if let Err(err) = fs::remove_file(src).await {
        warn!(source = %src.display(), error = %err, "failed to delete source after copy");
    }
    info!(from = %src.display(), to = %dest.display(), "copied and deleted");
    Ok(())
}

async fn symlink_file(src: &Path, dest: &Path) -> Result<()> {
    // Prefer a relative target so the library tree survives being moved
    // wholesale; fall back to the absolute source path.
    if let Some(parent) = dest.parent()
        && let Some(relative) = relative_to(parent, src)
        && platform_symlink(&relative, dest).await.is_ok()
    {
        info!(link = %dest.display(), target = %relative.display(), "created soft link");
        return Ok(());
    }
    let absolute = fs::canonicalize(src).await.map_err(|e| map_io_error(e, src))?;
    platform_symlink(&absolute, dest).await.map_err(|e| map_io_error(e, dest))?;
    info!(link = %dest.display(), target = %absolute.display(), "created soft link");
    Ok(())
}

#[cfg(unix)]
async fn platform_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::symlink(target, link).await
}
#[cfg(windows)]
async fn platform_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::symlink_file(target, link).await
}

/// Compute a relative path from `base` to `target` without touching the
/// filesystem. Only defined when both are absolute or both relative.
fn relative_to(base: &Path, target: &Path) -> Option<PathBuf> {
    if base.is_absolute() != target.is_absolute() {
        return None;
    }
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();
    let common = base.iter().zip(target.iter()).take_while(|(a, b)| a == b).count();
    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component);
    }
    Some(relative)
}

fn map_io_error(err: std::io::Error, path: &Path) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        _ => ErrorKind::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(root: &Path) -> StoreOptions {
        StoreOptions {
            success_root: root.join("output"),
            failed_root: root.join("failed"),
            link_mode: LinkMode::Move,
            failed_move: true,
            record_failures_only: false,
            subtitle_extensions: vec![".srt".into(), ".ass".into()],
            escape_literals: "()".into(),
            location_rule: "{{ actor }}/{{ number }}".into(),
            max_title_len: 50,
        }
    }

    fn record(number: &str, actor: &str) -> MediaRecord {
        MediaRecord { number: number.into(), actor: actor.into(), ..MediaRecord::default() }
    }

    #[tokio::test]
    async fn test_create_output_folder_from_rule() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(options(temp_dir.path())).unwrap();
        let folder = store.create_output_folder(&record("ABC-123", "Some Actor")).await.unwrap();
        assert_eq!(folder, temp_dir.path().join("output/Some Actor/ABC-123"));
        assert!(folder.is_dir());
    }

    #[tokio::test]
    async fn test_create_output_folder_sanitizes_segments() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(options(temp_dir.path())).unwrap();
        let folder = store.create_output_folder(&record("ABC-123", "A:B (x)")).await.unwrap();
        // Escape literals removed, illegal characters replaced.
        assert_eq!(folder, temp_dir.path().join("output/A꞉B x/ABC-123"));
    }

    #[tokio::test]
    async fn test_place_moves_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(options(temp_dir.path())).unwrap();
        let src = temp_dir.path().join("src.mp4");
        fs::write(&src, b"video").await.unwrap();
        let dest = temp_dir.path().join("output/ABC-123.mp4");

        store.place(&src, &dest).await.unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_place_refuses_existing_destination() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(options(temp_dir.path())).unwrap();
        let src = temp_dir.path().join("src.mp4");
        fs::write(&src, b"new").await.unwrap();
        let dest = temp_dir.path().join("dest.mp4");
        fs::write(&dest, b"old").await.unwrap();

        let err = store.place(&src, &dest).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        // Neither side was touched.
        assert_eq!(fs::read(&dest).await.unwrap(), b"old");
        assert!(src.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_place_symlink_mode() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut opts = options(temp_dir.path());
        opts.link_mode = LinkMode::Symlink;
        let store = MediaStore::new(opts).unwrap();
        let src = temp_dir.path().join("src.mp4");
        fs::write(&src, b"video").await.unwrap();
        let dest = temp_dir.path().join("output/ABC-123.mp4");

        store.place(&src, &dest).await.unwrap();
        assert!(src.exists());
        assert!(fs::symlink_metadata(&dest).await.unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&dest).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_find_subtitles_matches_conventions() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(options(temp_dir.path())).unwrap();
        let video = temp_dir.path().join("movie.mp4");
        for name in ["movie.srt", "movie.zh.srt", "movie_forced.ass", "other.srt", "movie.txt"] {
            fs::write(temp_dir.path().join(name), b"sub").await.unwrap();
        }

        let mut found: Vec<String> = store
            .find_subtitles(&video)
            .await
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        found.sort();
        assert_eq!(found, ["movie.srt", "movie.zh.srt", "movie_forced.ass"]);
    }

    #[tokio::test]
    async fn test_move_subtitles_preserves_language_suffix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(options(temp_dir.path())).unwrap();
        let subtitle = temp_dir.path().join("movie.zh.srt");
        fs::write(&subtitle, b"sub").await.unwrap();
        let dest_dir = temp_dir.path().join("output");
        fs::create_dir_all(&dest_dir).await.unwrap();

        store.move_subtitles(&[subtitle], "ABC-123.mp4", &dest_dir).await.unwrap();
        assert!(dest_dir.join("ABC-123.zh.srt").exists());
    }

    #[tokio::test]
    async fn test_isolate_moves_and_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(options(temp_dir.path())).unwrap();
        let source = temp_dir.path().join("bad.mp4");
        fs::write(&source, b"video").await.unwrap();

        store.isolate(&source).await.unwrap();
        assert!(!source.exists());
        assert!(temp_dir.path().join("failed/bad.mp4").exists());
        let provenance = fs::read_to_string(temp_dir.path().join("failed").join(MOVE_RECORD)).await.unwrap();
        assert!(provenance.contains("bad.mp4"));
    }

    #[tokio::test]
    async fn test_isolate_record_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut opts = options(temp_dir.path());
        opts.record_failures_only = true;
        let store = MediaStore::new(opts).unwrap();
        let source = temp_dir.path().join("bad.mp4");
        fs::write(&source, b"video").await.unwrap();

        store.isolate(&source).await.unwrap();
        // File stays put, only the list is written.
        assert!(source.exists());
        let list = fs::read_to_string(temp_dir.path().join("failed").join(FAILED_LIST)).await.unwrap();
        assert!(list.contains("bad.mp4"));
    }

    #[tokio::test]
    async fn test_isolate_missing_source_is_fine() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(options(temp_dir.path())).unwrap();
        store.isolate(&temp_dir.path().join("gone.mp4")).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_empty_dirs_deepest_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(options(temp_dir.path())).unwrap();
        let root = temp_dir.path().join("output");
        fs::create_dir_all(root.join("a/b/c")).await.unwrap();
        fs::create_dir_all(root.join("keep")).await.unwrap();
        fs::write(root.join("keep/file.mp4"), b"x").await.unwrap();

        store.remove_empty_dirs(&root).await.unwrap();
        assert!(!root.join("a").exists());
        assert!(root.join("keep/file.mp4").exists());
        // The root itself survives.
        assert!(root.exists());
    }

    #[test]
    fn test_link_mode_from_wire_value() {
        assert_eq!(LinkMode::from(0), LinkMode::Move);
        assert_eq!(LinkMode::from(1), LinkMode::Symlink);
        assert_eq!(LinkMode::from(2), LinkMode::HardLink);
        // Unknown values degrade to a plain move.
        assert_eq!(LinkMode::from(9), LinkMode::Move);
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to(Path::new("/a/b/out"), Path::new("/a/src/file.mp4")).unwrap(),
            PathBuf::from("../../src/file.mp4")
        );
        assert_eq!(relative_to(Path::new("/a"), Path::new("/a/file.mp4")).unwrap(), PathBuf::from("file.mp4"));
        assert!(relative_to(Path::new("rel"), Path::new("/abs")).is_none());
    }
}
