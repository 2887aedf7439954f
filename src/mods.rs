use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sibling directory of the mods folder that holds disabled mods.
pub const DISABLED_FOLDER: &str = "{disabled_mod}";

#[derive(Debug, Clone, Serialize)]
pub struct ModFolder {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub enabled: bool,
}

/// Lists mod folders under `mods_path`, then the disabled set from the
/// `{disabled_mod}` sibling. Dot-prefixed folders are disabled in place.
pub fn list_mods(mods_path: &Path) -> Result<Vec<ModFolder>> {
    let mut mods = Vec::new();
    collect(mods_path, true, &mut mods)
        .with_context(|| format!("list mods in {}", mods_path.display()))?;

    if let Some(parent) = mods_path.parent() {
        let disabled_dir = parent.join(DISABLED_FOLDER);
        if disabled_dir.is_dir() {
            collect(&disabled_dir, false, &mut mods)
                .with_context(|| format!("list mods in {}", disabled_dir.display()))?;
        }
    }

    debug!(count = mods.len(), "listed mod folders");
    Ok(mods)
}

fn collect(dir: &Path, enabled: bool, out: &mut Vec<ModFolder>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name == DISABLED_FOLDER {
            continue;
        }
        let dotted = name.starts_with('.');
        out.push(ModFolder {
            name: name.trim_start_matches('.').to_string(),
            path: entry.path(),
            enabled: enabled && !dotted,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_enabled_dotted_and_parked_mods() {
        let tmp = tempfile::tempdir().unwrap();
        let mods = tmp.path().join("mods");
        fs::create_dir_all(mods.join("CoolMario")).unwrap();
        fs::create_dir_all(mods.join(".HiddenLink")).unwrap();
        fs::create_dir_all(tmp.path().join(DISABLED_FOLDER).join("ParkedKirby")).unwrap();
        fs::write(mods.join("notes.txt"), b"x").unwrap();

        let mut listed = list_mods(&mods).unwrap();
        listed.sort_by(|a, b| a.name.cmp(&b.name));

        let summary: Vec<(&str, bool)> = listed
            .iter()
            .map(|m| (m.name.as_str(), m.enabled))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("CoolMario", true),
                ("HiddenLink", false),
                ("ParkedKirby", false),
            ]
        );
    }

    #[test]
    fn missing_mods_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_mods(&tmp.path().join("absent")).is_err());
    }
}
