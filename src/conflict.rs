use crate::mods::ModFolder;
use crate::scan;
use anyhow::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

/// One file claimed by more than one enabled mod.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Conflict {
    pub path: String,
    pub mods: Vec<String>,
}

fn readme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^readme\.").unwrap())
}

fn is_ignored(rel_path: &str) -> bool {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    name.eq_ignore_ascii_case("desktop.ini") || readme_re().is_match(name)
}

/// Scans the enabled mods for files that appear in more than one of them.
/// Disabled mods never participate.
pub fn detect_conflicts(mods: &[ModFolder]) -> Result<Vec<Conflict>> {
    let mut owners: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for folder in mods.iter().filter(|m| m.enabled) {
        for rel in scan::list_relative_files(&folder.path)? {
            if is_ignored(&rel) {
                continue;
            }
            owners.entry(rel).or_default().push(folder.name.clone());
        }
    }

    let conflicts: Vec<Conflict> = owners
        .into_iter()
        .filter(|(_, mods)| mods.len() > 1)
        .map(|(path, mods)| Conflict { path, mods })
        .collect();
    debug!(count = conflicts.len(), "conflict scan finished");
    Ok(conflicts)
}
