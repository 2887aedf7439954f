use crate::scan;
use crate::slot::{classify, Slot};
use crate::vanilla::{FighterFiles, VanillaData};
use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Slot the base-echo inheritance rules point at.
const BASE_ECHO_SLOT: &str = "c00";

fn slot_detect_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([/_])(c\d{2,3})([/.])").unwrap())
}

fn file_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.[^/\\]+$").unwrap())
}

/// Rewrites the first delimited slot token in `file` to `code`.
fn with_slot(file: &str, code: &str) -> String {
    slot_detect_re()
        .replace(file, |caps: &Captures| {
            format!("{}{}{}", &caps[1], code, &caps[3])
        })
        .into_owned()
}

/// The declarative config artifact the game-loading runtime consumes.
/// Key order matches what that runtime (and every diff tool in the modding
/// ecosystem) expects; maps and value sets are sorted for determinism.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ModConfig {
    #[serde(rename = "new-dir-infos")]
    pub new_dir_infos: Vec<String>,
    #[serde(rename = "new-dir-infos-base")]
    pub new_dir_infos_base: BTreeMap<String, String>,
    #[serde(rename = "share-to-vanilla")]
    pub share_to_vanilla: BTreeMap<String, BTreeSet<String>>,
    #[serde(rename = "share-to-added")]
    pub share_to_added: BTreeMap<String, BTreeSet<String>>,
    #[serde(rename = "new-dir-files")]
    pub new_dir_files: BTreeMap<String, BTreeSet<String>>,
}

pub struct ConfigGenerator {
    mod_root: PathBuf,
    fighter: String,
    files: FighterFiles,
}

impl ConfigGenerator {
    /// Fails when the fighter has no canonical files in the vanilla manifest.
    pub fn new(vanilla: &VanillaData, mod_root: &Path, fighter: &str) -> Result<Self> {
        Ok(Self {
            mod_root: mod_root.to_path_buf(),
            fighter: fighter.to_string(),
            files: FighterFiles::collect(vanilla, fighter)?,
        })
    }

    pub fn generate(&self, final_slots: &[Slot]) -> Result<ModConfig> {
        let extra: Vec<Slot> = final_slots.iter().copied().filter(|s| s.is_extra()).collect();
        let mut config = ModConfig::default();
        let f = self.fighter.as_str();

        for slot in &extra {
            let code = slot.code();
            config.new_dir_infos.push(format!("fighter/{f}/{code}"));
            config.new_dir_infos.push(format!("fighter/{f}/camera/{code}"));
            config
                .new_dir_infos
                .push(format!("fighter/{f}/kirbycopy/{code}"));
            config.new_dir_infos.push(format!("fighter/{f}/movie/{code}"));
            config.new_dir_infos.push(format!("fighter/{f}/result/{code}"));

            config.new_dir_infos_base.insert(
                format!("fighter/{f}/{code}/camera"),
                format!("fighter/{f}/{BASE_ECHO_SLOT}/camera"),
            );
            config.new_dir_infos_base.insert(
                format!("fighter/{f}/kirbycopy/{code}/bodymotion"),
                format!("fighter/{f}/kirbycopy/{BASE_ECHO_SLOT}/bodymotion"),
            );
            config.new_dir_infos_base.insert(
                format!("fighter/{f}/kirbycopy/{code}/cmn"),
                format!("fighter/{f}/kirbycopy/{BASE_ECHO_SLOT}/cmn"),
            );
            config.new_dir_infos_base.insert(
                format!("fighter/{f}/kirbycopy/{code}/sound"),
                format!("fighter/{f}/kirbycopy/{BASE_ECHO_SLOT}/sound"),
            );
            config.new_dir_infos_base.insert(
                format!("fighter/{f}/{code}/cmn"),
                format!("fighter/{f}/{BASE_ECHO_SLOT}/cmn"),
            );
        }

        // Every new directory is declared in new-dir-files even when it ends
        // up with no files; the runtime treats a missing key as a missing dir.
        for slot in &extra {
            let code = slot.code();
            for dir in [
                format!("fighter/{f}/camera/{code}"),
                format!("fighter/{f}/kirbycopy/{code}"),
                format!("fighter/{f}/movie/{code}"),
                format!("fighter/{f}/result/{code}"),
                format!("fighter/{f}/{code}"),
            ] {
                config.new_dir_files.entry(dir).or_default();
            }
        }

        // Duplicate the canonical slot-0 listing at every extra slot. The
        // engine expects each file to exist there even when its bytes are
        // inherited through the sharing tables below.
        for slot in &extra {
            let code = slot.code();
            self.add_category(&mut config, &code, format!("fighter/{f}/{code}"), &self.files.fighter);
            self.add_category(
                &mut config,
                &code,
                format!("fighter/{f}/camera/{code}"),
                &self.files.camera,
            );
            self.add_category(
                &mut config,
                &code,
                format!("fighter/{f}/movie/{code}"),
                &self.files.movie,
            );
            self.add_category(
                &mut config,
                &code,
                format!("fighter/{f}/result/{code}"),
                &self.files.result,
            );
            self.add_category(
                &mut config,
                &code,
                format!("fighter/{f}/kirbycopy/{code}"),
                &self.files.kirby_copy,
            );
        }

        let custom = self.collect_custom_files(&mut config)?;

        if !extra.is_empty() {
            for file in &self.files.all {
                // Placeholder fighters carry no real assets to share.
                if file.contains("dummy_fighter") {
                    continue;
                }

                if file.starts_with("fighter/kirby/model/")
                    || file.starts_with(&format!("fighter/{f}/model/"))
                    || file.starts_with("sound/bank/")
                {
                    let targets: Vec<String> = extra
                        .iter()
                        .map(|slot| with_slot(file, &slot.code()))
                        .filter(|target| !custom.contains(target))
                        .collect();
                    if !targets.is_empty() {
                        config
                            .share_to_vanilla
                            .entry(file.clone())
                            .or_default()
                            .extend(targets);
                    }
                }

                if file.starts_with(&format!("camera/fighter/{f}/"))
                    || file.starts_with(&format!("fighter/{f}/motion/"))
                    || file.starts_with(&format!("fighter/kirby/motion/copy_{f}_"))
                {
                    // Keyed by the slot-0 form: every extra slot aliases the
                    // single base-slot camera/motion asset.
                    let base = with_slot(file, BASE_ECHO_SLOT);
                    let targets: Vec<String> = extra
                        .iter()
                        .map(|slot| with_slot(file, &slot.code()))
                        .filter(|target| !custom.contains(target))
                        .collect();
                    if !targets.is_empty() {
                        config
                            .share_to_added
                            .entry(base)
                            .or_default()
                            .extend(targets);
                    }
                }
            }
        }

        debug!(
            dirs = config.new_dir_infos.len(),
            shared_vanilla = config.share_to_vanilla.len(),
            shared_added = config.share_to_added.len(),
            "config synthesized"
        );
        Ok(config)
    }

    fn add_category(&self, config: &mut ModConfig, code: &str, dir: String, files: &[String]) {
        let set = config.new_dir_files.entry(dir).or_default();
        for file in files {
            set.insert(with_slot(file, code));
        }
    }

    /// Scans the mod's actual tree for files already present at a slot and
    /// registers them in new-dir-files, remembering them so the sharing
    /// tables never alias over bytes the mod supplies itself.
    fn collect_custom_files(&self, config: &mut ModConfig) -> Result<HashSet<String>> {
        let mut custom = HashSet::new();
        if !self.mod_root.exists() {
            return Ok(custom);
        }

        let f = self.fighter.as_str();
        for raw in scan::list_relative_files(&self.mod_root)? {
            let fixed = raw.replace('\\', "/");
            let info = classify(&fixed);
            let (Some(slot), Some(normalized)) = (info.slot, info.normalized.as_deref()) else {
                continue;
            };
            if !file_name_re().is_match(normalized) {
                continue;
            }
            custom.insert(fixed.clone());

            let code = slot.code();
            let dir = if fixed.starts_with(&format!("camera/fighter/{f}/")) {
                Some(format!("fighter/{f}/camera/{code}"))
            } else if fixed.starts_with(&format!("fighter/kirby/model/copy_{f}_")) {
                Some(format!("fighter/{f}/kirbycopy/{code}"))
            } else if fixed.starts_with(&format!("fighter/{f}/movie/")) {
                Some(format!("fighter/{f}/movie/{code}"))
            } else if fixed.starts_with(&format!("fighter/{f}/result/")) {
                Some(format!("fighter/{f}/result/{code}"))
            } else if fixed.starts_with(&format!("fighter/{f}/model/"))
                || fixed.starts_with(&format!("fighter/{f}/motion/"))
                || fixed.starts_with(&format!("fighter/{f}/sound/"))
                || fixed.starts_with(&format!("fighter/{f}/effect/"))
                || fixed.starts_with(&format!("effect/fighter/{f}/"))
            {
                Some(format!("fighter/{f}/{code}"))
            } else {
                None
            };

            // Files whose slot-0 form is canonical were already synthesized
            // into new-dir-files above.
            if self.files.all.contains(&with_slot(&fixed, BASE_ECHO_SLOT)) {
                continue;
            }

            if let Some(dir) = dir {
                config.new_dir_files.entry(dir).or_default().insert(fixed);
            }
        }
        Ok(custom)
    }

    /// Writes the artifact as 2-space-indented UTF-8 JSON next to the mod's
    /// content, the form downstream loaders and human diffs expect.
    pub fn write(&self, config: &ModConfig) -> Result<PathBuf> {
        let path = self.mod_root.join("config.json");
        let raw = serde_json::to_string_pretty(config).context("serialize config.json")?;
        fs::write(&path, raw).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn vanilla() -> VanillaData {
        serde_json::from_value(serde_json::json!({
            "dirs": {
                "directories": {
                    "fighter": {
                        "directories": {
                            "mario": {
                                "directories": {
                                    "c00": { "files": [0, 2, 3] },
                                    "camera": { "directories": { "c00": { "files": [1] } } },
                                    "movie": { "directories": { "c00": { "files": [] } } },
                                    "result": { "directories": { "c00": { "files": [] } } },
                                    "kirbycopy": { "directories": { "c00": { "files": [] } } }
                                }
                            }
                        }
                    }
                }
            },
            "file_array": [
                "fighter/mario/model/body/c00/model.nutexb",
                "camera/fighter/mario/c00/attack.nuanmb",
                "fighter/mario/motion/body/c00/walk.nuanmb",
                "sound/bank/fighter/se_mario_c00.nus3audio"
            ]
        }))
        .unwrap()
    }

    #[test]
    fn with_slot_rewrites_delimited_tokens() {
        assert_eq!(
            with_slot("fighter/mario/model/body/c00/model.nutexb", "c48"),
            "fighter/mario/model/body/c48/model.nutexb"
        );
        assert_eq!(
            with_slot("sound/bank/fighter/se_mario_c00.nus3audio", "c48"),
            "sound/bank/fighter/se_mario_c48.nus3audio"
        );
    }

    #[test]
    fn new_dir_files_has_exactly_five_dirs_per_extra_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ConfigGenerator::new(&vanilla(), tmp.path(), "mario").unwrap();
        let config = generator.generate(&[Slot::new(0), Slot::new(48)]).unwrap();

        let keys: Vec<&String> = config.new_dir_files.keys().collect();
        assert_eq!(
            keys,
            vec![
                "fighter/mario/c48",
                "fighter/mario/camera/c48",
                "fighter/mario/kirbycopy/c48",
                "fighter/mario/movie/c48",
                "fighter/mario/result/c48",
            ]
        );
        // Empty categories stay declared.
        assert!(config.new_dir_files["fighter/mario/movie/c48"].is_empty());
    }

    #[test]
    fn canonical_files_are_duplicated_and_shared_to_vanilla() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ConfigGenerator::new(&vanilla(), tmp.path(), "mario").unwrap();
        let config = generator.generate(&[Slot::new(48)]).unwrap();

        assert!(config.new_dir_files["fighter/mario/c48"]
            .contains("fighter/mario/model/body/c48/model.nutexb"));
        assert_eq!(
            config.share_to_vanilla["fighter/mario/model/body/c00/model.nutexb"],
            BTreeSet::from(["fighter/mario/model/body/c48/model.nutexb".to_string()])
        );
    }

    #[test]
    fn motion_and_camera_share_back_to_the_base_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ConfigGenerator::new(&vanilla(), tmp.path(), "mario").unwrap();
        let config = generator.generate(&[Slot::new(9), Slot::new(10)]).unwrap();

        let targets = &config.share_to_added["fighter/mario/motion/body/c00/walk.nuanmb"];
        assert_eq!(
            targets,
            &BTreeSet::from([
                "fighter/mario/motion/body/c09/walk.nuanmb".to_string(),
                "fighter/mario/motion/body/c10/walk.nuanmb".to_string(),
            ])
        );
    }

    #[test]
    fn custom_mod_files_are_never_aliased() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("fighter/mario/model/body/c48");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("model.nutexb"), b"custom").unwrap();

        let generator = ConfigGenerator::new(&vanilla(), tmp.path(), "mario").unwrap();
        let config = generator.generate(&[Slot::new(48)]).unwrap();

        assert!(!config
            .share_to_vanilla
            .contains_key("fighter/mario/model/body/c00/model.nutexb"));
        // The file is still listed for its directory.
        assert!(config.new_dir_files["fighter/mario/c48"]
            .contains("fighter/mario/model/body/c48/model.nutexb"));
    }

    #[test]
    fn no_extra_slots_yields_empty_config() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ConfigGenerator::new(&vanilla(), tmp.path(), "mario").unwrap();
        let config = generator
            .generate(&[Slot::new(0), Slot::new(7)])
            .unwrap();
        assert!(config.new_dir_infos.is_empty());
        assert!(config.new_dir_files.is_empty());
        assert!(config.share_to_vanilla.is_empty());
        assert!(config.share_to_added.is_empty());
    }

    #[test]
    fn artifact_keys_keep_loader_order() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ConfigGenerator::new(&vanilla(), tmp.path(), "mario").unwrap();
        let config = generator.generate(&[Slot::new(8)]).unwrap();
        let raw = serde_json::to_string_pretty(&config).unwrap();

        let order: Vec<usize> = [
            "new-dir-infos",
            "new-dir-infos-base",
            "share-to-vanilla",
            "share-to-added",
            "new-dir-files",
        ]
        .iter()
        .map(|key| raw.find(&format!("\"{key}\"")).unwrap())
        .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
