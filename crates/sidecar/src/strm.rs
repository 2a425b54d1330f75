//! STRM playback-stub emission.
//!
//! A stub is a one-line text file holding the absolute path of the real
//! video, letting media servers index content that lives outside their
//! library roots. Multi-part titles get one stub per part so stacking
//! still works ([`write_multi_part`]).

use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Write a stub for a single-file title.
///
/// The stub lands at `dest_dir/{base_name}.strm` and points at
/// `video_path`. An existing stub is overwritten (the path inside may have
/// changed since the last run).
pub async fn write_single(base_name: &str, video_path: &Path, dest_dir: &Path) -> Result<PathBuf> {
    write_stub(&dest_dir.join(format!("{base_name}.strm")), video_path).await
}

/// Write one stub per part for a multi-part title.
///
/// Stubs are named `{base_name}-cd{i}.strm` with 1-based indices matching
/// the order of `part_paths`.
pub async fn write_multi_part(base_name: &str, part_paths: &[PathBuf], dest_dir: &Path) -> Result<Vec<PathBuf>> {
    if part_paths.is_empty() {
        exn::bail!(ErrorKind::EmptyStub);
    }
    let mut written = Vec::with_capacity(part_paths.len());
    for (index, part) in part_paths.iter().enumerate() {
        let stub = dest_dir.join(format!("{base_name}-cd{}.strm", index + 1));
        written.push(write_stub(&stub, part).await?);
    }
    Ok(written)
}

async fn write_stub(stub_path: &Path, video_path: &Path) -> Result<PathBuf> {
    if let Some(parent) = stub_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ErrorKind::Write(stub_path.to_path_buf(), e))?;
    }
    let mut line = video_path.to_string_lossy().into_owned();
    line.push('\n');
    tokio::fs::write(stub_path, line.as_bytes())
        .await
        .map_err(|e| ErrorKind::Write(stub_path.to_path_buf(), e))?;
    info!(stub = %stub_path.display(), "generated playback stub");
    Ok(stub_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_stub_contents() {
        let dir = tempfile::tempdir().unwrap();
        let stub = write_single("ABC-123", Path::new("/media/out/ABC-123.mp4"), dir.path()).await.unwrap();
        assert_eq!(stub, dir.path().join("ABC-123.strm"));
        let body = tokio::fs::read_to_string(&stub).await.unwrap();
        assert_eq!(body, "/media/out/ABC-123.mp4\n");
    }

    #[tokio::test]
    async fn test_multi_part_stub_per_part() {
        let dir = tempfile::tempdir().unwrap();
        let parts =
            vec![PathBuf::from("/media/out/ABC-123-cd1.mp4"), PathBuf::from("/media/out/ABC-123-cd2.mp4")];
        let stubs = write_multi_part("ABC-123", &parts, dir.path()).await.unwrap();
        assert_eq!(stubs.len(), 2);
        assert!(dir.path().join("ABC-123-cd1.strm").exists());
        let body = tokio::fs::read_to_string(dir.path().join("ABC-123-cd2.strm")).await.unwrap();
        assert_eq!(body, "/media/out/ABC-123-cd2.mp4\n");
    }

    #[tokio::test]
    async fn test_multi_part_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_multi_part("ABC-123", &[], dir.path()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::EmptyStub));
    }
}
