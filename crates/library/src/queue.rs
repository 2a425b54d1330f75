//! Processing queue construction.
//!
//! Turns a flat file list into an ordered queue: fragment groups first (in
//! discovery order), each represented by its first-sorted member, then
//! standalone files in input order. Items whose representative filename
//! yields no stable identifier are dropped with a warning — an empty
//! identifier must never reach lookup.

use crate::flags::MediaFlags;
use crate::fragment::{self, FragmentGroup};
use crate::ident;
use regex::Regex;
use std::path::PathBuf;
use tracing::{info, warn};

/// One unit of work: a standalone file or a fragment-group representative.
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Representative file driving metadata lookup (the group's main file
    /// for fragment items).
    pub file_path: PathBuf,
    /// Extracted identifier, never empty.
    pub number: String,
    pub flags: MediaFlags,
    pub group: Option<FragmentGroup>,
}

impl QueueItem {
    pub fn is_fragment(&self) -> bool {
        self.group.is_some()
    }
}

/// Build the processing queue from `files`.
///
/// `stop_counter` truncates the *input* list first (0 = no limit), mirroring
/// how a batch limit applies before grouping. `custom_patterns` are the
/// user's identifier regexes.
pub fn build(mut files: Vec<PathBuf>, custom_patterns: &[Regex], stop_counter: usize) -> Vec<QueueItem> {
    if stop_counter > 0 && stop_counter < files.len() {
        info!(limit = stop_counter, "processing limited by stop counter");
        files.truncate(stop_counter);
    }

    let (groups, standalone) = fragment::group(files);
    info!(groups = groups.len(), standalone = standalone.len(), "built fragment groups");

    let mut queue = Vec::with_capacity(groups.len() + standalone.len());
    for group in groups {
        if group.has_missing_parts() {
            warn!(group = %group.base_name, "fragment group has missing parts, processing anyway");
        }
        let Some(item) = item_for(group.main_file().to_path_buf(), Some(group.clone()), custom_patterns)
        else {
            continue;
        };
        info!(
            group = %group.base_name,
            main_file = %item.file_path.display(),
            parts = group.len(),
            "queued fragment group"
        );
        queue.push(item);
    }
    for file_path in standalone {
        if let Some(item) = item_for(file_path, None, custom_patterns) {
            queue.push(item);
        }
    }
    queue
}

fn item_for(file_path: PathBuf, group: Option<FragmentGroup>, custom_patterns: &[Regex]) -> Option<QueueItem> {
    let filename = file_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let number = match ident::extract(filename, custom_patterns) {
        Some(number) => number,
        None => {
            warn!(file = %file_path.display(), "could not extract identifier, dropping item");
            return None;
        },
    };
    let mut flags = MediaFlags::parse(filename);
    if let Some(group) = &group {
        flags.part = Some(format!("1-{}", group.len()));
        flags.multi_part = true;
    }
    Some(QueueItem { file_path, number, flags, group })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("in/{n}"))).collect()
    }

    #[test]
    fn test_groups_before_standalone() {
        let queue = build(paths(&["AAA-111.mp4", "BBB-222-cd1.mp4", "BBB-222-cd2.mp4"]), &[], 0);
        assert_eq!(queue.len(), 2);
        assert!(queue[0].is_fragment());
        assert_eq!(queue[0].number, "BBB-222");
        assert_eq!(queue[0].file_path, PathBuf::from("in/BBB-222-cd1.mp4"));
        assert!(!queue[1].is_fragment());
        assert_eq!(queue[1].number, "AAA-111");
    }

    #[test]
    fn test_group_item_gets_part_descriptor() {
        let queue = build(paths(&["BBB-222-cd1.mp4", "BBB-222-cd2.mp4", "BBB-222-cd3.mp4"]), &[], 0);
        assert_eq!(queue[0].flags.part.as_deref(), Some("1-3"));
        assert!(queue[0].flags.multi_part);
        assert!(queue[0].flags.is_first_part());
    }

    #[test]
    fn test_unidentifiable_item_dropped() {
        let queue = build(paths(&["---.mp4", "AAA-111.mp4"]), &[], 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].number, "AAA-111");
    }

    #[test]
    fn test_stop_counter_truncates_input() {
        let queue = build(paths(&["AAA-111.mp4", "BBB-222.mp4", "CCC-333.mp4"]), &[], 2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[1].number, "BBB-222");
    }

    #[test]
    fn test_standalone_keeps_flags() {
        let queue = build(paths(&["AAA-111-C.mp4"]), &[], 0);
        assert!(queue[0].flags.chinese_subtitle);
        assert!(queue[0].flags.part.is_none());
    }
}
