use crate::slot::{classify, Slot};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// One path queued for modification, with its slot-abstracted template.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PathEntry {
    pub original: String,
    pub normalized: Option<String>,
}

/// Everything that must be touched for one (fighter, slot) pair.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct SlotRecord {
    /// Renameable units: slot folders and flat slot-coded files. At most the
    /// top-level slot folder per nesting branch; descendants move with it.
    pub paths_to_modify: Vec<PathEntry>,
    /// Every leaf file carrying the slot, regardless of nesting.
    pub files_to_modify: Vec<PathEntry>,
}

pub type PathData = BTreeMap<String, BTreeMap<Slot, SlotRecord>>;

#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct ScanResult {
    pub path_data: PathData,
    /// All discovered slots, sorted ascending, de-duplicated across fighters.
    pub current_slots: Vec<Slot>,
}

/// Indexes a mod's file list by fighter and slot. Side-effect free; malformed
/// paths are skipped, never fatal.
pub fn scan_files(files: &[String]) -> ScanResult {
    let mut path_data: PathData = BTreeMap::new();
    let mut slots = BTreeSet::new();

    for raw in files {
        let info = classify(raw);
        let (Some(slot), Some(fighter)) = (info.slot, info.fighter_name) else {
            continue;
        };
        slots.insert(slot);

        let record = path_data.entry(fighter).or_default().entry(slot).or_default();

        let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
        if last.contains('.') {
            record.files_to_modify.push(PathEntry {
                original: raw.clone(),
                normalized: info.normalized.clone(),
            });
        }

        // Anything nested below a captured slot folder is renamed implicitly
        // when the folder moves, so it must not be queued separately.
        if info.has_slot_folder_ancestor && !info.is_slot_folder {
            continue;
        }

        record.paths_to_modify.push(PathEntry {
            original: raw.clone(),
            normalized: info.normalized,
        });
    }

    debug!(
        fighters = path_data.len(),
        slots = slots.len(),
        "scan complete"
    );

    ScanResult {
        path_data,
        current_slots: slots.into_iter().collect(),
    }
}

/// Enumerates the mod directory and scans it. An unreadable tree is fatal;
/// scanning is all-or-nothing per invocation.
pub fn scan_dir(root: &Path) -> Result<ScanResult> {
    Ok(scan_files(&list_relative_paths(root)?))
}

/// All paths (files and directories) under `root`, relative, forward-slashed.
pub fn list_relative_paths(root: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        out.push(rel.to_string_lossy().replace('\\', "/"));
    }
    Ok(out)
}

/// Like [`list_relative_paths`], restricted to regular files.
pub fn list_relative_files(root: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        out.push(rel.to_string_lossy().replace('\\', "/"));
    }
    Ok(out)
}

/// The single fighter this mod's content maps to, if there is exactly one.
/// Kirby is ignored when it only contributes copy-ability variant files,
/// since those piggyback on another fighter's slots.
pub fn primary_fighter(result: &ScanResult) -> Option<&str> {
    fn is_kirby_copy(path: &str) -> bool {
        path.contains("kirby/model/copy_") || path.contains("kirby\\model\\copy_")
    }

    let mut names = result.path_data.iter().filter_map(|(name, slots)| {
        if name != "kirby" {
            return Some(name.as_str());
        }
        let has_own_content = slots.values().any(|record| {
            record
                .files_to_modify
                .iter()
                .chain(&record.paths_to_modify)
                .any(|entry| !is_kirby_copy(&entry.original))
        });
        has_own_content.then_some(name.as_str())
    });

    let first = names.next()?;
    if names.next().is_some() {
        return None;
    }
    Some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nested_members_of_slot_folder_are_not_queued_as_paths() {
        let result = scan_files(&paths(&[
            "fighter/mario/model/body/c03",
            "fighter/mario/model/body/c03/model.numdlb",
            "fighter/mario/model/body/c03/textures/def_mario_001_col.nutexb",
        ]));

        let record = &result.path_data["mario"][&Slot::new(3)];
        assert_eq!(record.paths_to_modify.len(), 1);
        assert_eq!(
            record.paths_to_modify[0].original,
            "fighter/mario/model/body/c03"
        );
        assert_eq!(record.files_to_modify.len(), 2);
    }

    #[test]
    fn flat_files_are_queued_for_rename() {
        let result = scan_files(&paths(&["ui/replace/chara/chara_0/chara_0_mario_03.bntx"]));
        let record = &result.path_data["mario"][&Slot::new(3)];
        assert_eq!(record.paths_to_modify.len(), 1);
        assert_eq!(record.files_to_modify.len(), 1);
    }

    #[test]
    fn current_slots_sorted_and_deduplicated() {
        let result = scan_files(&paths(&[
            "fighter/mario/model/body/c10",
            "fighter/mario/model/body/c02",
            "fighter/luigi/model/body/c02",
        ]));
        assert_eq!(
            result.current_slots,
            vec![Slot::new(2), Slot::new(10)]
        );
    }

    #[test]
    fn unclassified_paths_are_skipped_without_error() {
        let result = scan_files(&paths(&[
            "stage/battlefield/normal/param.lvd",
            "readme.txt",
            "",
        ]));
        assert!(result.path_data.is_empty());
        assert!(result.current_slots.is_empty());
    }

    #[test]
    fn scanning_is_deterministic() {
        let input = paths(&[
            "fighter/mario/model/body/c03",
            "fighter/mario/model/body/c03/model.numdlb",
            "ui/replace/chara/chara_0/chara_0_mario_03.bntx",
        ]);
        assert_eq!(scan_files(&input), scan_files(&input));
    }

    #[test]
    fn primary_fighter_ignores_kirby_copy_variants() {
        let result = scan_files(&paths(&[
            "fighter/mario/model/body/c00/model.numdlb",
            "fighter/kirby/model/copy_mario_cap/c00/model.numdlb",
        ]));
        assert_eq!(primary_fighter(&result), Some("mario"));
    }

    #[test]
    fn primary_fighter_keeps_kirby_with_own_content() {
        let result = scan_files(&paths(&["fighter/kirby/model/body/c00/model.numdlb"]));
        assert_eq!(primary_fighter(&result), Some("kirby"));
    }

    #[test]
    fn primary_fighter_none_for_multi_fighter_mods() {
        let result = scan_files(&paths(&[
            "fighter/mario/model/body/c00/model.numdlb",
            "fighter/luigi/model/body/c00/model.numdlb",
        ]));
        assert_eq!(primary_fighter(&result), None);
    }
}
