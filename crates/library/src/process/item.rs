//! Per-item processing: the shared sub-step sequence behind all three modes.
//!
//! Mode selection happens exactly once, at the single `match` in
//! [`process_item`]; the sub-steps themselves don't inspect the mode.
//! Best-effort steps (assets, watermarks, subtitles) log and continue;
//! placement and sidecar emission are fatal for the item.

use super::Context;
use super::error::{ErrorKind, Result};
use crate::flags::{self, MediaFlags};
use crate::ident;
use crate::queue::QueueItem;
use exn::ResultExt;
use reel_assets::{WatermarkFlags, image_extension};
use reel_config::Mode;
use reel_scrape::{ImageCut, MediaRecord};
use reel_sidecar::{MultiPart, NfoOptions, nfo, strm};
use reel_storage::error::ErrorKind as StorageErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Art file names as placed next to the video.
struct ArtNames {
    poster: String,
    thumb: String,
    fanart: String,
}

/// Result of the placement step, consumed by subtitles and sidecars.
struct Placed {
    /// File name of the (first) placed video, used to anchor subtitle and
    /// sidecar naming.
    main_file_name: String,
    /// Destination paths of every placed part, in part order.
    part_paths: Vec<PathBuf>,
}

pub(crate) async fn process_item(ctx: &Context, item: &QueueItem) -> Result<()> {
    let record = ctx
        .source
        .lookup(&item.number, ctx.source_override.as_deref(), ctx.url_override.as_deref())
        .await
        .or_raise(|| ErrorKind::Lookup)?;
    let uncensored =
        record.uncensored || ident::is_uncensored(&item.number, &ctx.settings.uncensored_prefixes());

    match ctx.mode() {
        Mode::Scraping => scraping(ctx, item, &record, uncensored).await,
        Mode::Organizing => organizing(ctx, item, &record, uncensored).await,
        Mode::Analysis => analysis(ctx, item, &record, uncensored).await,
    }
}

/// Mode 1: stage assets, place files, emit sidecars.
async fn scraping(ctx: &Context, item: &QueueItem, record: &MediaRecord, uncensored: bool) -> Result<()> {
    let output = ctx.store.create_output_folder(record).await.or_raise(|| ErrorKind::Placement)?;
    let art = art_names(ctx, record, &item.flags);

    stage_assets(ctx, item, record, uncensored, &output, &art).await;
    apply_watermarks(ctx, &item.flags, uncensored, &output, &art).await;

    let placed = place_video(ctx, item, record, &output).await?;
    relocate_subtitles(ctx, item, &placed, &output).await;
    emit_sidecars(ctx, item, record, uncensored, &output, Some(&placed), &art).await
}

/// Mode 2: place files and emit the metadata sidecar, no asset staging.
async fn organizing(ctx: &Context, item: &QueueItem, record: &MediaRecord, uncensored: bool) -> Result<()> {
    let output = ctx.store.create_output_folder(record).await.or_raise(|| ErrorKind::Placement)?;
    let art = art_names(ctx, record, &item.flags);

    let placed = place_video(ctx, item, record, &output).await?;
    relocate_subtitles(ctx, item, &placed, &output).await;
    emit_sidecars(ctx, item, record, uncensored, &output, Some(&placed), &art).await
}

/// Mode 3: scrape in place — assets and sidecars land next to the file,
/// nothing moves.
async fn analysis(ctx: &Context, item: &QueueItem, record: &MediaRecord, uncensored: bool) -> Result<()> {
    let output = item.file_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let art = art_names(ctx, record, &item.flags);

    stage_assets(ctx, item, record, uncensored, &output, &art).await;
    apply_watermarks(ctx, &item.flags, uncensored, &output, &art).await;
    emit_sidecars(ctx, item, record, uncensored, &output, None, &art).await
}

fn art_names(ctx: &Context, record: &MediaRecord, flags: &MediaFlags) -> ArtNames {
    let ext = image_extension(&record.cover);
    if ctx.settings.name_rule.image_naming_with_number {
        let prefix = format!("{}{}", record.number, flags.suffix());
        ArtNames {
            fanart: format!("{prefix}-fanart{ext}"),
            poster: format!("{prefix}-poster{ext}"),
            thumb: format!("{prefix}-thumb{ext}"),
        }
    } else {
        ArtNames {
            fanart: format!("fanart{ext}"),
            poster: format!("poster{ext}"),
            thumb: format!("thumb{ext}"),
        }
    }
}

/// Download cover art and first-part extras, then derive the poster.
/// Everything in here is best-effort.
async fn stage_assets(
    ctx: &Context,
    item: &QueueItem,
    record: &MediaRecord,
    uncensored: bool,
    output: &Path,
    art: &ArtNames,
) {
    let thumb_path = output.join(&art.thumb);

    if !record.cover.is_empty() {
        match ctx.downloader.fetch(&record.cover, &thumb_path, &record.headers).await {
            Ok(()) => {
                // Kodi-style libraries want a separate fanart copy; Jellyfin
                // derives its own.
                if !ctx.settings.common.jellyfin
                    && let Err(err) =
                        ctx.downloader.fetch(&record.cover, &output.join(&art.fanart), &record.headers).await
                {
                    warn!(error = %err, "failed to download fanart copy");
                }
            },
            Err(err) => warn!(error = %err, "failed to download cover"),
        }
    }

    if record.image_cut == ImageCut::SmallCover && !record.cover_small.is_empty() {
        if let Err(err) =
            ctx.downloader.fetch(&record.cover_small, &output.join(&art.poster), &record.headers).await
        {
            warn!(error = %err, "failed to download small cover");
        }
    }

    if item.flags.is_first_part() {
        if ctx.settings.extrafanart.switch && !record.extrafanart.is_empty() {
            match ctx.downloader.fetch_stills(&record.extrafanart, output, &record.headers).await {
                Ok(count) => debug!(count, "downloaded extra stills"),
                Err(err) => warn!(error = %err, "failed to download extra stills"),
            }
        }
        if ctx.settings.trailer.switch && !record.trailer.is_empty() {
            let trailer_name = format!("{}{}-trailer.mp4", record.number, item.flags.suffix());
            if let Err(err) =
                ctx.downloader.fetch(&record.trailer, &output.join(trailer_name), &record.headers).await
            {
                warn!(error = %err, "failed to download trailer");
            }
        }
        if ctx.settings.actor_photo.download_for_kodi && !record.actor_photo.is_empty() {
            if let Err(err) = ctx.downloader.fetch_portraits(&record.actor_photo, output).await {
                warn!(error = %err, "failed to download actor portraits");
            }
        }
    }

    derive_poster(ctx, record, uncensored, &thumb_path, &output.join(&art.poster)).await;
}

/// Copy or crop the poster out of the cover. Code-only series (FC2) never
/// need a facial crop, so they get a plain copy.
async fn derive_poster(ctx: &Context, record: &MediaRecord, uncensored: bool, thumb: &Path, poster: &Path) {
    if !fs::try_exists(thumb).await.unwrap_or(false) {
        return;
    }
    if record.number.to_uppercase().starts_with("FC2") {
        debug!(number = %record.number, "code-only series, copying cover to poster");
        if let Err(err) = ctx.editor.copy(thumb, poster).await {
            warn!(error = %err, "failed to copy poster");
        }
        return;
    }
    if record.image_cut != ImageCut::None || ctx.settings.face.always_imagecut {
        let skip_face_detection = ctx.settings.face.uncensored_only && !uncensored;
        let mode = if ctx.settings.face.always_imagecut { ImageCut::Crop } else { record.image_cut };
        match ctx.editor.crop(mode, thumb, poster, skip_face_detection).await {
            Ok(()) => info!(poster = %poster.display(), "derived poster from cover"),
            Err(err) => warn!(error = %err, "failed to crop poster"),
        }
    }
}

async fn apply_watermarks(ctx: &Context, flags: &MediaFlags, uncensored: bool, output: &Path, art: &ArtNames) {
    if !ctx.settings.watermark.switch {
        return;
    }
    let watermark_flags = WatermarkFlags {
        chinese_subtitle: flags.chinese_subtitle,
        leak: flags.leak,
        uncensored,
        hack: flags.hack,
        four_k: flags.four_k,
        iso: flags.iso,
    };
    if let Err(err) =
        ctx.watermarker.apply(&output.join(&art.poster), &output.join(&art.thumb), watermark_flags).await
    {
        warn!(error = %err, "failed to apply watermarks");
    }
}

/// Move every member of a fragment group — or the single file — into the
/// output folder.
///
/// A missing source means the member was already moved on a previous run;
/// an occupied destination means the same. Both are skipped per-file. Any
/// other move failure is fatal for the item.
async fn place_video(ctx: &Context, item: &QueueItem, record: &MediaRecord, output: &Path) -> Result<Placed> {
    let Some(group) = &item.group else {
        let extension = dot_extension(&item.file_path);
        let dest_name = flags::file_name(&record.number, &item.flags, &extension);
        let dest = output.join(&dest_name);
        match ctx.store.place(&item.file_path, &dest).await {
            Ok(()) => {},
            Err(err) if matches!(&*err, StorageErrorKind::AlreadyExists(_)) => {
                info!(dest = %dest.display(), "destination already populated, skipping move");
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Placement),
        }
        return Ok(Placed { main_file_name: dest_name, part_paths: vec![dest] });
    };

    info!(parts = group.len(), "moving fragment files to output directory");
    let mut part_paths = Vec::with_capacity(group.len());
    let mut main_file_name = String::new();
    for (index, fragment) in group.fragments.iter().enumerate() {
        let dest_name = flags::part_file_name(
            &record.number,
            &item.flags,
            ctx.naming_style(),
            index + 1,
            &fragment.extension,
        );
        let dest = output.join(&dest_name);
        if index == 0 {
            main_file_name = dest_name.clone();
        }
        part_paths.push(dest.clone());

        if !fs::try_exists(&fragment.file_path).await.unwrap_or(false) {
            debug!(source = %fragment.file_path.display(), "fragment already moved or missing");
            continue;
        }
        match ctx.store.place(&fragment.file_path, &dest).await {
            Ok(()) => info!(part = index + 1, dest = %dest.display(), "moved fragment"),
            Err(err) if matches!(&*err, StorageErrorKind::AlreadyExists(_)) => {
                debug!(dest = %dest.display(), "fragment destination already exists, skipping");
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Placement),
        }
    }
    Ok(Placed { main_file_name, part_paths })
}

/// Relocate subtitles found next to the group's first member (or the
/// single file). Best-effort.
async fn relocate_subtitles(ctx: &Context, item: &QueueItem, placed: &Placed, output: &Path) {
    let anchor = match &item.group {
        Some(group) => group.main_file(),
        None => item.file_path.as_path(),
    };
    let subtitles = ctx.store.find_subtitles(anchor).await;
    if subtitles.is_empty() {
        return;
    }
    info!(count = subtitles.len(), "found subtitle file(s) for video");
    if let Err(err) = ctx.store.move_subtitles(&subtitles, &placed.main_file_name, output).await {
        warn!(error = %err, "failed to move some subtitle files");
    }
}

/// Emit the playback stubs and, last of all, the NFO.
///
/// The NFO is the durability marker: it comes after every other artifact,
/// and a failure here fails the item even though placed files stay placed.
async fn emit_sidecars(
    ctx: &Context,
    item: &QueueItem,
    record: &MediaRecord,
    uncensored: bool,
    output: &Path,
    placed: Option<&Placed>,
    art: &ArtNames,
) -> Result<()> {
    if ctx.mode() == Mode::Scraping
        && ctx.settings.strm.switch
        && let Some(placed) = placed
    {
        let base_name = ctx.stub_base_name(record);
        // Stubs land beside the title folder so they index as their own
        // library entries.
        let stub_dir = output.parent().unwrap_or(output);
        if item.is_fragment() {
            strm::write_multi_part(&base_name, &placed.part_paths, stub_dir)
                .await
                .or_raise(|| ErrorKind::Sidecar)?;
        } else if let Some(video) = placed.part_paths.first() {
            strm::write_single(&base_name, video, stub_dir).await.or_raise(|| ErrorKind::Sidecar)?;
        }
    }

    let multi_part = match &item.group {
        Some(group) => {
            // Sources have already moved by this point; measure the placed
            // parts instead, falling back to the originals when nothing
            // was placed (in-place scraping).
            let size_paths = match placed {
                Some(placed) => placed.part_paths.clone(),
                None => group.file_paths(),
            };
            Some(MultiPart {
                total_parts: group.len(),
                current_part: 1,
                fragment_files: group
                    .fragments
                    .iter()
                    .filter_map(|f| f.file_path.file_name().map(|n| n.to_string_lossy().into_owned()))
                    .collect(),
                total_size: total_size(size_paths).await,
            })
        },
        None => None,
    };
    let options = NfoOptions {
        chinese_subtitle: item.flags.chinese_subtitle,
        leak: item.flags.leak,
        uncensored,
        hack: item.flags.hack,
        four_k: item.flags.four_k,
        iso: item.flags.iso,
        poster: art.poster.clone(),
        thumb: art.thumb.clone(),
        fanart: if ctx.settings.common.jellyfin { String::new() } else { art.fanart.clone() },
        include_trailer: ctx.settings.trailer.switch,
        multi_part,
    };

    let nfo_path = match ctx.mode() {
        // In-place scraping: the NFO base name must match the video file
        // exactly for players to pair them.
        Mode::Analysis => item.file_path.with_extension("nfo"),
        _ => output.join(format!("{}{}{}.nfo", record.number, item.flags.part_token(), item.flags.suffix())),
    };
    nfo::write(record, &options, &nfo_path).await.or_raise(|| ErrorKind::Sidecar)
}

/// Sum of member file sizes; members that already moved contribute zero.
async fn total_size(paths: Vec<PathBuf>) -> u64 {
    let mut total = 0;
    for path in paths {
        if let Ok(metadata) = fs::metadata(&path).await {
            total += metadata.len();
        }
    }
    total
}

fn dot_extension(path: &Path) -> String {
    path.extension().map(|ext| format!(".{}", ext.to_string_lossy())).unwrap_or_default()
}
