use crate::config::ReferencePaths;
use crate::configgen::ConfigGenerator;
use crate::names::{self, CustomNames};
use crate::scan::{self, ScanResult};
use crate::slot::{Slot, SLOT_PLACEHOLDER};
use crate::vanilla::VanillaData;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Desired slot moves, source slot to destination slot.
pub type SlotMap = std::collections::BTreeMap<Slot, Slot>;

/// A rename that could not be carried out. Renames are not rolled back, so
/// the caller sees exactly which step left the tree half-moved.
#[derive(Debug, thiserror::Error)]
#[error("{stage} rename failed: {from:?} -> {to:?}")]
pub struct MoveError {
    pub stage: &'static str,
    pub from: PathBuf,
    pub to: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug)]
pub struct ReslotReport {
    /// Directories and files renamed.
    pub changed: usize,
    /// Slots present after the moves, deduplicated and sorted.
    pub final_slots: Vec<Slot>,
    pub warnings: Vec<String>,
}

struct StagedMove {
    original: PathBuf,
    temp: PathBuf,
    target: PathBuf,
}

/// Applies a slot map to a scanned mod tree.
///
/// Renaming runs in two phases, every source to a hidden temp name first and
/// every temp to its destination second, so that swaps (c00 to c01 while c01
/// moves to c00) never collide. Afterwards, if any resulting slot is
/// extended or custom names were supplied, the config artifact, character
/// database, and message table are regenerated.
pub fn apply(
    mod_root: &Path,
    scan: &ScanResult,
    map: &SlotMap,
    custom: &CustomNames,
    refs: &ReferencePaths,
) -> Result<ReslotReport> {
    let mut moves = Vec::new();
    let mut warnings = Vec::new();

    for (fighter, records) in &scan.path_data {
        for (slot, record) in records {
            let Some(target) = map.get(slot) else { continue };
            if target == slot {
                continue;
            }
            debug!(%fighter, %slot, %target, "staging slot move");
            // paths_to_modify holds the renameable units only; files nested
            // under a slot folder travel with it.
            for entry in &record.paths_to_modify {
                let Some(normalized) = &entry.normalized else {
                    warn!(path = %entry.original, "no slot token to rewrite, left in place");
                    warnings.push(format!(
                        "{}: no slot token to rewrite, left in place",
                        entry.original
                    ));
                    continue;
                };
                // Normalization keeps the original `c`; only the digits are
                // templated out.
                let final_rel = normalized.replace(SLOT_PLACEHOLDER, &target.padded());
                moves.push(StagedMove {
                    original: mod_root.join(&entry.original),
                    temp: mod_root.join(temp_rel(&final_rel, *slot)),
                    target: mod_root.join(final_rel),
                });
            }
        }
    }

    for staged in &moves {
        fs::rename(&staged.original, &staged.temp).map_err(|source| MoveError {
            stage: "stage",
            from: staged.original.clone(),
            to: staged.temp.clone(),
            source,
        })?;
    }
    for staged in &moves {
        fs::rename(&staged.temp, &staged.target).map_err(|source| MoveError {
            stage: "commit",
            from: staged.temp.clone(),
            to: staged.target.clone(),
            source,
        })?;
    }
    info!(renamed = moves.len(), "slot moves committed");

    let final_slots: Vec<Slot> = scan
        .current_slots
        .iter()
        .map(|slot| map.get(slot).copied().unwrap_or(*slot))
        .collect::<BTreeSet<Slot>>()
        .into_iter()
        .collect();

    let needs_registration =
        final_slots.iter().any(|slot| slot.is_extra()) || !custom.is_empty();
    if needs_registration {
        match scan::primary_fighter(scan) {
            Some(fighter) => {
                let fighter = fighter.to_string();
                regenerate_artifacts(mod_root, &fighter, &final_slots, custom, refs)?;
            }
            None => {
                warnings.push(
                    "mod does not target exactly one fighter; config and name artifacts skipped"
                        .to_string(),
                );
            }
        }
    }

    Ok(ReslotReport {
        changed: moves.len(),
        final_slots,
        warnings,
    })
}

/// Deletes one slot's content from the tree. Returns the number of flat
/// files removed; slot directories are cleaned up but not counted.
pub fn remove_slot(mod_root: &Path, scan: &ScanResult, slot: Slot) -> Result<usize> {
    let mut removed = 0;

    for records in scan.path_data.values() {
        let Some(record) = records.get(&slot) else { continue };
        for entry in &record.files_to_modify {
            let path = mod_root.join(&entry.original);
            fs::remove_file(&path)
                .with_context(|| format!("remove file {}", path.display()))?;
            removed += 1;
        }
        for entry in &record.paths_to_modify {
            let path = mod_root.join(&entry.original);
            if path.is_dir() {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("remove directory {}", path.display()))?;
            }
        }
    }

    info!(%slot, removed, "slot content removed");
    Ok(removed)
}

fn regenerate_artifacts(
    mod_root: &Path,
    fighter: &str,
    final_slots: &[Slot],
    custom: &CustomNames,
    refs: &ReferencePaths,
) -> Result<()> {
    let fighter_index = names::fighter_index(&refs.names_data, fighter)?;

    let vanilla = VanillaData::load(&refs.vanilla)?;
    let generator = ConfigGenerator::new(&vanilla, mod_root, fighter)?;
    let config = generator.generate(final_slots)?;
    generator.write(&config)?;

    names::update_chara_db(
        mod_root,
        &refs.chara_db_template,
        fighter_index,
        final_slots,
        custom,
    )?;

    if !custom.is_empty() {
        let default = names::default_custom_name(&refs.messages_data, fighter);
        let defaults: CustomNames = final_slots
            .iter()
            .map(|slot| (*slot, default.clone()))
            .collect();
        names::write_msg_name(mod_root, fighter, final_slots, custom, &defaults)?;
    }

    Ok(())
}

/// Temp name for a pending rename: a dot-prefixed sibling of the final path,
/// tagged with the source slot so two sources merging into one destination
/// directory cannot clash in temp space.
fn temp_rel(final_rel: &str, source: Slot) -> String {
    match final_rel.rsplit_once('/') {
        Some((parent, name)) => format!("{parent}/.temp_{}_{name}", source.code()),
        None => format!(".temp_{}_{final_rel}", source.code()),
    }
}
