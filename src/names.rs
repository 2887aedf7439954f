use crate::slot::Slot;
use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Announcer call used when a slot has no custom voice line.
pub const DEFAULT_ANNOUNCER: &str = "vc_narration_characall";

/// Extended slots are registered at name-table index slot + 8; this offset is
/// a fixed convention of the runtime.
const LABEL_INDEX_OFFSET: u32 = 8;

/// Per-slot display strings. Persisted into the prcxml/xmsbt resources, not
/// into the config artifact.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CustomName {
    #[serde(default)]
    pub csp_name: String,
    #[serde(default)]
    pub vs_name: String,
    #[serde(default)]
    pub boxing_ring: String,
    #[serde(default)]
    pub announcer: String,
}

impl CustomName {
    pub fn is_empty(&self) -> bool {
        !self.has_text() && self.announcer.is_empty()
    }

    fn has_text(&self) -> bool {
        !self.csp_name.is_empty() || !self.vs_name.is_empty() || !self.boxing_ring.is_empty()
    }
}

pub type CustomNames = BTreeMap<Slot, CustomName>;

/// Looks up a fighter's numeric index in the comma-separated name table:
/// internal name in the first column (case-insensitive), index in the third.
pub fn fighter_index(names_data: &Path, fighter: &str) -> Result<u32> {
    let raw = fs::read_to_string(names_data)
        .with_context(|| format!("read fighter name table {}", names_data.display()))?;
    for line in raw.lines() {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() >= 3 && parts[0].eq_ignore_ascii_case(fighter.trim()) {
            return parts[2]
                .parse()
                .with_context(|| format!("parse index for fighter {fighter}"));
        }
    }
    bail!(
        "fighter name \"{fighter}\" not found in {}",
        names_data.display()
    );
}

/// Escapes the five XML metacharacters after converting literal `\n`
/// sequences into real line breaks.
pub fn escape_text(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Injects this fighter's extended-slot parameters into the database
/// template and writes it to `<mod>/ui/param/database/ui_chara_db.prcxml`.
///
/// Per extended slot, a `nXY_index` byte (slot + 8); per custom announcer, a
/// `characall_label` hash40; and a `color_num` byte when the highest slot
/// exceeds the canonical ceiling.
pub fn update_chara_db(
    mod_root: &Path,
    template_path: &Path,
    fighter_index: u32,
    final_slots: &[Slot],
    custom: &CustomNames,
) -> Result<()> {
    let mut params = String::new();

    let max_slot = final_slots.iter().map(|s| s.number()).max().unwrap_or(0);
    if max_slot > crate::slot::CANONICAL_MAX {
        let _ = write!(params, "<byte hash=\"color_num\">{}</byte>", max_slot + 1);
    }

    for slot in final_slots {
        let custom_announcer = custom
            .get(slot)
            .map(|n| n.announcer.as_str())
            .filter(|a| !a.is_empty() && *a != DEFAULT_ANNOUNCER);

        if slot.is_extra() || custom_announcer.is_some() {
            let index = slot.number() + LABEL_INDEX_OFFSET;
            let _ = write!(
                params,
                "<byte hash=\"n{}_index\">{index}</byte>",
                slot.padded()
            );
            if let Some(label) = custom_announcer {
                let _ = write!(
                    params,
                    "<hash40 hash=\"characall_label_c{index:02}\">{label}</hash40>"
                );
            }
        }
    }

    let template = fs::read_to_string(template_path)
        .with_context(|| format!("read database template {}", template_path.display()))?;
    let content = if params.is_empty() {
        template
    } else {
        inject_struct(&template, fighter_index, &params)?
    };

    let out_dir = mod_root.join("ui/param/database");
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("create {}", out_dir.display()))?;
    let out_path = out_dir.join("ui_chara_db.prcxml");
    fs::write(&out_path, content).with_context(|| format!("write {}", out_path.display()))?;
    debug!(path = %out_path.display(), "wrote character database");
    Ok(())
}

/// Replaces `<hash40 index="N">dummy</hash40>` with a `<struct>` carrying
/// `params`. The template is located by streaming it through a real parser
/// and splicing on byte offsets, so every other byte survives untouched.
fn inject_struct(template: &str, index: u32, params: &str) -> Result<String> {
    let needle = index.to_string();
    let mut reader = Reader::from_str(template);

    let mut elem_start = None;
    let mut inside = false;
    let mut is_dummy = false;
    let mut span: Option<(usize, usize)> = None;

    loop {
        let before = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(e)) if !inside && e.name().as_ref() == b"hash40" => {
                let matches = attr_value(&e, b"index").is_some_and(|v| v == needle);
                if matches {
                    inside = true;
                    is_dummy = false;
                    elem_start = Some(before);
                }
            }
            Ok(Event::Text(t)) if inside => {
                if t.unescape().map_or(false, |v| v.as_ref() == "dummy") {
                    is_dummy = true;
                }
            }
            Ok(Event::End(e)) if inside && e.name().as_ref() == b"hash40" => {
                if is_dummy {
                    span = Some((elem_start.unwrap_or(0), reader.buffer_position()));
                    break;
                }
                inside = false;
            }
            Ok(Event::Eof) => break,
            Err(err) => bail!("parse database template: {err}"),
            _ => {}
        }
    }

    let Some((start, end)) = span else {
        // Template may already carry a struct for this fighter.
        warn!(index, "no dummy placeholder for fighter index; template left as-is");
        return Ok(template.to_string());
    };

    let mut out = String::with_capacity(template.len() + params.len());
    out.push_str(&template[..start]);
    let _ = write!(out, "<struct index=\"{index}\">{params}</struct>");
    out.push_str(&template[end..]);
    Ok(out)
}

/// Regenerates `<mod>/ui/message/msg_name.xmsbt` from the custom-name set.
/// Returns whether anything was written; an empty set writes nothing.
pub fn write_msg_name(
    mod_root: &Path,
    fighter: &str,
    slots: &[Slot],
    custom: &CustomNames,
    defaults: &CustomNames,
) -> Result<bool> {
    let mut entries = String::new();

    for slot in slots {
        let Some(names) = custom.get(slot) else { continue };
        if !names.has_text() {
            continue;
        }
        let default = defaults.get(slot);
        let fallback = |value: &str, default: Option<&str>| -> String {
            if !value.is_empty() {
                value.to_string()
            } else {
                default.unwrap_or_default().to_string()
            }
        };

        let csp = fallback(&names.csp_name, default.map(|d| d.csp_name.as_str()));
        let boxing = fallback(&names.boxing_ring, default.map(|d| d.boxing_ring.as_str()));
        // A blank versus name follows the select name, uppercased, before it
        // falls back to the stock default.
        let vs = if !names.vs_name.is_empty() {
            names.vs_name.clone()
        } else if !names.csp_name.is_empty() {
            names.csp_name.to_uppercase()
        } else {
            fallback("", default.map(|d| d.vs_name.as_str()))
        };

        // Must line up with the nXY_index value registered in the database.
        let label_index = format!("{:02}", slot.number() + LABEL_INDEX_OFFSET);

        for (prefix, text) in [
            ("nam_chr0", &csp),
            ("nam_chr1", &csp),
            ("nam_chr2", &vs),
            ("nam_stage_name", &boxing),
        ] {
            let _ = writeln!(entries, "\t<entry label=\"{prefix}_{label_index}_{fighter}\">");
            let _ = writeln!(entries, "\t\t<text>{}</text>", escape_text(text));
            let _ = writeln!(entries, "\t</entry>");
        }
    }

    if entries.is_empty() {
        debug!("no custom names to write");
        return Ok(false);
    }

    let content = format!("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<xmsbt>\n{entries}</xmsbt>");
    let out_dir = mod_root.join("ui/message");
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("create {}", out_dir.display()))?;
    let out_path = out_dir.join("msg_name.xmsbt");
    fs::write(&out_path, content).with_context(|| format!("write {}", out_path.display()))?;
    debug!(path = %out_path.display(), "wrote message table");
    Ok(true)
}

/// Reads the custom names a mod already carries. Every failure mode (files
/// absent, malformed XML, labels missing in padded and unpadded form) falls
/// back rather than erroring, because read-back feeds an editing session.
pub fn read_existing_custom_names(mod_root: &Path, fighter: &str, slots: &[Slot]) -> CustomNames {
    let mut out = CustomNames::new();

    let prcxml_path = mod_root.join("ui/param/database/ui_chara_db.prcxml");
    let hash_values = fs::read_to_string(&prcxml_path)
        .ok()
        .and_then(|content| parse_hash_values(&content));

    let mut label_index = BTreeMap::new();
    for slot in slots {
        let registered = hash_values.as_ref().and_then(|values| {
            values
                .get(&format!("n{}_index", slot.number()))
                .or_else(|| values.get(&format!("n{:02}_index", slot.number())))
                .and_then(|v| v.parse::<u32>().ok())
        });
        label_index.insert(*slot, registered.unwrap_or(slot.number() + LABEL_INDEX_OFFSET));
    }

    let msg_path = mod_root.join("ui/message/msg_name.xmsbt");
    if let Some(entries) = fs::read_to_string(&msg_path)
        .ok()
        .and_then(|content| parse_entry_texts(&content))
    {
        for slot in slots {
            let index = label_index[slot];
            let lookup = |prefix: &str| -> String {
                entries
                    .get(&format!("{prefix}_{index:02}_{fighter}"))
                    .or_else(|| entries.get(&format!("{prefix}_{index}_{fighter}")))
                    .map(|v| v.replace('\n', "\\n"))
                    .unwrap_or_default()
            };
            let names = CustomName {
                csp_name: lookup("nam_chr1"),
                vs_name: lookup("nam_chr2"),
                boxing_ring: lookup("nam_stage_name"),
                announcer: String::new(),
            };
            if names.has_text() {
                out.insert(*slot, names);
            }
        }
    }

    if let Some(values) = &hash_values {
        for slot in slots {
            let index = label_index[slot];
            if let Some(announcer) = values.get(&format!("characall_label_c{index:02}")) {
                if !announcer.is_empty() {
                    out.entry(*slot).or_default().announcer = announcer.clone();
                }
            }
        }
    }

    out
}

/// Default display strings for a fighter, taken from the stock message table
/// at the index-08 labels. Missing or unparseable data yields empty strings.
pub fn default_custom_name(messages_data: &Path, fighter: &str) -> CustomName {
    let Some(entries) = fs::read_to_string(messages_data)
        .ok()
        .and_then(|content| parse_entry_texts(&content))
    else {
        warn!(path = %messages_data.display(), "message table unavailable; no default names");
        return CustomName::default();
    };

    CustomName {
        csp_name: entries
            .get(&format!("nam_chr1_08_{fighter}"))
            .cloned()
            .unwrap_or_default(),
        vs_name: entries
            .get(&format!("nam_chr2_08_{fighter}"))
            .cloned()
            .unwrap_or_default(),
        boxing_ring: entries
            .get(&format!("nam_stage_name_08_{fighter}"))
            .map(|v| v.replace('\n', " "))
            .unwrap_or_default(),
        announcer: DEFAULT_ANNOUNCER.to_string(),
    }
}

/// `<entry label="...">` → `<text>` content, or `None` on malformed XML.
fn parse_entry_texts(content: &str) -> Option<HashMap<String, String>> {
    let mut reader = Reader::from_str(content);
    let mut map = HashMap::new();
    let mut current_label: Option<String> = None;
    let mut in_text = false;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"entry" => current_label = attr_value(&e, b"label"),
                b"text" => {
                    in_text = true;
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => text.push_str(&t.unescape().ok()?),
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"text" => {
                    in_text = false;
                    if let Some(label) = &current_label {
                        map.insert(label.clone(), text.clone());
                    }
                }
                b"entry" => current_label = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }
    Some(map)
}

/// `<byte hash="...">`/`<hash40 hash="...">` → text content, or `None` on
/// malformed XML.
fn parse_hash_values(content: &str) -> Option<HashMap<String, String>> {
    let mut reader = Reader::from_str(content);
    let mut map = HashMap::new();
    let mut current_hash: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e))
                if matches!(e.name().as_ref(), b"byte" | b"hash40") =>
            {
                current_hash = attr_value(&e, b"hash");
                text.clear();
            }
            Ok(Event::Text(t)) if current_hash.is_some() => {
                text.push_str(&t.unescape().ok()?)
            }
            Ok(Event::End(e)) if matches!(e.name().as_ref(), b"byte" | b"hash40") => {
                if let Some(hash) = current_hash.take() {
                    map.insert(hash, text.clone());
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }
    Some(map)
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            if let Ok(value) = attr.unescape_value() {
                return Some(value.to_string());
            }
        }
    }
    None
}
