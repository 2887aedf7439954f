use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// The game's canonical asset manifest: a nested directory tree whose leaves
/// index into one flat array of file paths. Loaded once per process and
/// passed around by reference; never mutated.
#[derive(Debug, Deserialize)]
pub struct VanillaData {
    pub dirs: DirNode,
    pub file_array: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DirNode {
    #[serde(default)]
    pub directories: HashMap<String, DirNode>,
    #[serde(default)]
    pub files: Vec<i64>,
}

impl VanillaData {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read vanilla manifest {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse vanilla manifest {}", path.display()))
    }

    fn fighter_dir(&self, fighter: &str) -> Option<&DirNode> {
        self.dirs
            .directories
            .get("fighter")?
            .directories
            .get(fighter)
    }

    /// Resolves file indices to paths, keeping only the slot-0 files.
    fn resolve_c00(&self, indices: &[i64]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&raw| {
                let idx = usize::try_from(raw).ok()?;
                let name = self.file_array.get(idx)?;
                if name.contains("/c00/") || name.contains("_c00.") {
                    Some(name.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

/// A fighter's canonical slot-0 file listing, split by asset category.
#[derive(Debug, Default, Clone)]
pub struct FighterFiles {
    pub fighter: Vec<String>,
    pub camera: Vec<String>,
    pub movie: Vec<String>,
    pub result: Vec<String>,
    pub kirby_copy: Vec<String>,
    /// Concatenation of all five categories, in category order.
    pub all: Vec<String>,
}

impl FighterFiles {
    pub fn collect(vanilla: &VanillaData, fighter: &str) -> Result<Self> {
        let mut out = FighterFiles::default();

        if let Some(dir) = vanilla.fighter_dir(fighter) {
            let category = |name: &str| -> &[i64] {
                dir.directories
                    .get(name)
                    .and_then(|d| d.directories.get("c00"))
                    .map(|d| d.files.as_slice())
                    .unwrap_or_default()
            };
            let base = dir
                .directories
                .get("c00")
                .map(|d| d.files.as_slice())
                .unwrap_or_default();

            out.fighter = vanilla.resolve_c00(base);
            out.camera = vanilla.resolve_c00(category("camera"));
            out.movie = vanilla.resolve_c00(category("movie"));
            out.result = vanilla.resolve_c00(category("result"));
            out.kirby_copy = vanilla.resolve_c00(category("kirbycopy"));

            out.all = out
                .fighter
                .iter()
                .chain(&out.camera)
                .chain(&out.movie)
                .chain(&out.result)
                .chain(&out.kirby_copy)
                .cloned()
                .collect();
        }

        if out.all.is_empty() {
            bail!("no data found for fighter '{fighter}' in vanilla manifest");
        }
        Ok(out)
    }
}
