//! Source-folder media discovery.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Walk `source` collecting files whose extension is in `media_extensions`
/// (lowercase, dot included), skipping any directory whose name appears in
/// `escape_dirs`. Unreadable directories are skipped with a warning; the
/// result is sorted for deterministic queue order.
pub async fn media_files(source: &Path, media_extensions: &[String], escape_dirs: &[String]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![source.to_path_buf()];

    while let Some(current) = stack.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %current.display(), error = %err, "skipping unreadable directory");
                continue;
            },
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(_) => continue,
            };
            if file_type.is_dir() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if escape_dirs.iter().any(|escape| !escape.is_empty() && name == escape.as_str()) {
                    continue;
                }
                stack.push(path);
            } else if file_type.is_file()
                && let Some(ext) = path.extension().and_then(|e| e.to_str())
                && media_extensions.iter().any(|m| m.trim_start_matches('.').eq_ignore_ascii_case(ext))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}
