use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// Placeholder substituted for the slot digits in a normalized path.
pub const SLOT_PLACEHOLDER: &str = "###";

/// Highest slot number the game accepts without runtime registration.
pub const CANONICAL_MAX: u32 = 7;

/// A costume slot number. Rendered as `cNN`, zero-padded to two digits;
/// three-digit slots render with all their digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u32);

impl Slot {
    pub fn new(number: u32) -> Self {
        Slot(number)
    }

    pub fn number(self) -> u32 {
        self.0
    }

    pub fn is_extra(self) -> bool {
        self.0 > CANONICAL_MAX
    }

    pub fn padded(self) -> String {
        format!("{:02}", self.0)
    }

    pub fn code(self) -> String {
        format!("c{:02}", self.0)
    }

    /// Parses `c03`, `C103` or bare digits.
    pub fn parse(token: &str) -> Option<Self> {
        let digits = token
            .strip_prefix('c')
            .or_else(|| token.strip_prefix('C'))
            .unwrap_or(token);
        digits.parse().ok().map(Slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{:02}", self.0)
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Slot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Slot::parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid slot code: {raw}")))
    }
}

/// What a single relative path inside a mod tells us about fighters and slots.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PathInfo {
    pub slot: Option<Slot>,
    pub fighter_name: Option<String>,
    pub normalized: Option<String>,
    /// The path's final segment is itself a slot folder.
    pub is_slot_folder: bool,
    /// Some segment after the fighter marker is a slot folder.
    pub has_slot_folder_ancestor: bool,
}

fn slot_folder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)c\d{2,3}$").unwrap())
}

fn slot_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(c)(\d{2,3})").unwrap())
}

fn flat_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)_([^_]+)_(c)?(\d{2,3})(\.[^./\\]+)$").unwrap())
}

/// Classifies one relative path: which fighter namespace it belongs to, which
/// slot it carries, and what the path looks like with the slot abstracted out.
///
/// Matching is deliberately permissive: any `c` followed by two or three
/// digits counts as a slot token, so unrelated numbers embedded in asset
/// names can classify spuriously. Callers tolerate that.
pub fn classify(path: &str) -> PathInfo {
    let parts: Vec<&str> = path.split(['/', '\\']).collect();
    let fighter_idx = parts.iter().position(|part| *part == "fighter");

    let mut fighter_name = None;
    let mut is_slot_folder = false;
    let mut has_slot_folder_ancestor = false;

    if let Some(idx) = fighter_idx {
        if parts.len() > idx + 1 {
            // The slot folder can sit at any depth below the fighter marker.
            for (i, part) in parts.iter().enumerate().skip(idx + 1) {
                if slot_folder_re().is_match(part) {
                    has_slot_folder_ancestor = true;
                    is_slot_folder = i == parts.len() - 1;
                    fighter_name = Some(parts[idx + 1].to_string());
                    break;
                }
            }
        }
    }

    let token_match = slot_token_re().captures(path);
    let flat_match = flat_name_re().captures(path);

    // Flat-namespaced files (UI sheets etc.) carry the fighter in their name.
    if fighter_name.is_none() {
        if let Some(m) = &flat_match {
            fighter_name = Some(m[1].to_string());
        }
    }

    let slot = if let Some(m) = &token_match {
        Slot::parse(&m[0])
    } else if let Some(m) = &flat_match {
        Slot::parse(&m[3])
    } else {
        None
    };

    let normalized = if let Some(m) = &token_match {
        let full = m.get(0).expect("capture 0 always present");
        Some(format!(
            "{}{}{}{}",
            &path[..full.start()],
            &m[1],
            SLOT_PLACEHOLDER,
            &path[full.end()..]
        ))
    } else if let Some(m) = &flat_match {
        let full = m.get(0).expect("capture 0 always present");
        let c_prefix = m.get(2).map(|c| c.as_str()).unwrap_or("");
        Some(format!(
            "{}_{}_{}{}{}",
            &path[..full.start()],
            &m[1],
            c_prefix,
            SLOT_PLACEHOLDER,
            &m[4]
        ))
    } else {
        None
    };

    PathInfo {
        slot,
        fighter_name,
        normalized,
        is_slot_folder,
        has_slot_folder_ancestor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_parses_and_renders() {
        assert_eq!(Slot::parse("c03"), Some(Slot::new(3)));
        assert_eq!(Slot::parse("C120"), Some(Slot::new(120)));
        assert_eq!(Slot::parse("08"), Some(Slot::new(8)));
        assert_eq!(Slot::parse("cxx"), None);
        assert_eq!(Slot::new(3).code(), "c03");
        assert_eq!(Slot::new(120).code(), "c120");
        assert!(Slot::new(8).is_extra());
        assert!(!Slot::new(7).is_extra());
    }

    #[test]
    fn classifies_slot_folder() {
        let info = classify("fighter/mario/model/body/c03");
        assert_eq!(info.slot, Some(Slot::new(3)));
        assert_eq!(info.fighter_name.as_deref(), Some("mario"));
        assert_eq!(
            info.normalized.as_deref(),
            Some("fighter/mario/model/body/c###")
        );
        assert!(info.is_slot_folder);
        assert!(info.has_slot_folder_ancestor);
    }

    #[test]
    fn classifies_file_under_slot_folder() {
        let info = classify("fighter/mario/model/body/c03/model.numdlb");
        assert_eq!(info.slot, Some(Slot::new(3)));
        assert_eq!(info.fighter_name.as_deref(), Some("mario"));
        assert!(!info.is_slot_folder);
        assert!(info.has_slot_folder_ancestor);
        assert_eq!(
            info.normalized.as_deref(),
            Some("fighter/mario/model/body/c###/model.numdlb")
        );
    }

    #[test]
    fn classifies_flat_ui_file_without_folder_hierarchy() {
        let info = classify("ui/replace/chara/chara_0/chara_0_mario_03.bntx");
        assert_eq!(info.slot, Some(Slot::new(3)));
        assert_eq!(info.fighter_name.as_deref(), Some("mario"));
        assert!(!info.has_slot_folder_ancestor);
        assert_eq!(
            info.normalized.as_deref(),
            Some("ui/replace/chara/chara_0/chara_0_mario_###.bntx")
        );
    }

    #[test]
    fn no_fighter_marker_never_classifies_folders() {
        let info = classify("stage/battlefield/normal/param.lvd");
        assert_eq!(info.slot, None);
        assert_eq!(info.fighter_name, None);
        assert_eq!(info.normalized, None);
    }

    #[test]
    fn slot_matching_is_case_insensitive() {
        let info = classify("fighter/mario/model/body/C05/model.numdlb");
        assert_eq!(info.slot, Some(Slot::new(5)));
        // The original letter survives in the normalized template.
        assert_eq!(
            info.normalized.as_deref(),
            Some("fighter/mario/model/body/C###/model.numdlb")
        );
    }

    #[test]
    fn backslash_paths_classify() {
        let info = classify(r"fighter\mario\model\body\c03\model.numdlb");
        assert_eq!(info.slot, Some(Slot::new(3)));
        assert_eq!(info.fighter_name.as_deref(), Some("mario"));
    }

    #[test]
    fn normalization_round_trips_through_substitution() {
        let original = "fighter/mario/model/body/c03/model.numdlb";
        let info = classify(original);
        let back = info
            .normalized
            .as_deref()
            .unwrap()
            .replace(SLOT_PLACEHOLDER, &Slot::new(3).padded());
        assert_eq!(back, original);

        let reslotted = info
            .normalized
            .as_deref()
            .unwrap()
            .replace(SLOT_PLACEHOLDER, &Slot::new(120).padded());
        assert_eq!(classify(&reslotted).slot, Some(Slot::new(120)));
    }

    #[test]
    fn three_digit_slot_token_normalizes_whole_token() {
        let info = classify("fighter/mario/model/body/c103/model.numdlb");
        assert_eq!(info.slot, Some(Slot::new(103)));
        assert_eq!(
            info.normalized.as_deref(),
            Some("fighter/mario/model/body/c###/model.numdlb")
        );
    }

    #[test]
    fn slot_serde_uses_codes() {
        let json = serde_json::to_string(&Slot::new(8)).unwrap();
        assert_eq!(json, "\"c08\"");
        let slot: Slot = serde_json::from_str("\"c08\"").unwrap();
        assert_eq!(slot, Slot::new(8));
    }
}
