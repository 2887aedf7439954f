use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mods_path: PathBuf,
    #[serde(default)]
    pub reference_dir: PathBuf,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig {
            mods_path: PathBuf::new(),
            reference_dir: base_dir.join("reference"),
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn reference_paths(&self) -> ReferencePaths {
        ReferencePaths::in_dir(&self.reference_dir)
    }
}

/// Locations of the read-only reference data the remapper consults: the
/// vanilla file manifest, the fighter and message name tables, and the
/// character database template.
#[derive(Debug, Clone)]
pub struct ReferencePaths {
    pub vanilla: PathBuf,
    pub names_data: PathBuf,
    pub messages_data: PathBuf,
    pub chara_db_template: PathBuf,
}

impl ReferencePaths {
    pub fn in_dir(dir: &std::path::Path) -> Self {
        ReferencePaths {
            vanilla: dir.join("vanilla.json"),
            names_data: dir.join("names.data"),
            messages_data: dir.join("messages.data"),
            chara_db_template: dir.join("ui_chara_db.prcxml"),
        }
    }
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("slotsmith"))
}
