use crate::{
    conflict,
    config::{AppConfig, ReferencePaths},
    configgen::ConfigGenerator,
    mods, names,
    names::CustomNames,
    reslot::{self, SlotMap},
    scan::{self, ScanResult},
    slot::Slot,
    vanilla::VanillaData,
};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

struct GlobalOptions {
    format: OutputFormat,
    reference_dir: Option<PathBuf>,
    mods_path: Option<PathBuf>,
}

enum CliCommand {
    Scan {
        mod_path: PathBuf,
    },
    Reslot {
        mod_path: PathBuf,
        map: SlotMap,
        removals: Vec<Slot>,
        names_file: Option<PathBuf>,
    },
    Config {
        mod_path: PathBuf,
        fighter: Option<String>,
    },
    Names {
        mod_path: PathBuf,
        fighter: Option<String>,
    },
    ModsList,
    Conflicts,
    Paths,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args);
    let command = parse_command(&tokens)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("slotsmith v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => run_command(command, &global),
    }
}

fn parse_global_options(args: &[String]) -> (GlobalOptions, Vec<String>) {
    let mut format = OutputFormat::Text;
    let mut reference_dir = None;
    let mut mods_path = None;
    let mut tokens = Vec::new();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            if let Some(parsed) = OutputFormat::parse(value) {
                format = parsed;
            }
            continue;
        }
        if arg == "--format" {
            if let Some(value) = iter.next() {
                if let Some(parsed) = OutputFormat::parse(value) {
                    format = parsed;
                }
            }
            continue;
        }
        if let Some(value) = arg.strip_prefix("--reference-dir=") {
            reference_dir = Some(PathBuf::from(value));
            continue;
        }
        if arg == "--reference-dir" {
            if let Some(value) = iter.next() {
                reference_dir = Some(PathBuf::from(value));
            }
            continue;
        }
        if let Some(value) = arg.strip_prefix("--mods-path=") {
            mods_path = Some(PathBuf::from(value));
            continue;
        }
        if arg == "--mods-path" {
            if let Some(value) = iter.next() {
                mods_path = Some(PathBuf::from(value));
            }
            continue;
        }
        tokens.push(arg.to_string());
    }

    (
        GlobalOptions {
            format,
            reference_dir,
            mods_path,
        },
        tokens,
    )
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    match head.as_str() {
        "--help" | "-h" | "help" => Ok(CliCommand::Help),
        "--version" | "-V" | "version" => Ok(CliCommand::Version),
        "scan" => Ok(CliCommand::Scan {
            mod_path: require_mod_path(tokens, "scan")?,
        }),
        "reslot" => parse_reslot(tokens),
        "config" => Ok(CliCommand::Config {
            mod_path: require_mod_path(tokens, "config")?,
            fighter: parse_fighter_flag(tokens, "config")?,
        }),
        "names" => Ok(CliCommand::Names {
            mod_path: require_mod_path(tokens, "names")?,
            fighter: parse_fighter_flag(tokens, "names")?,
        }),
        "mods" => Ok(CliCommand::ModsList),
        "conflicts" => Ok(CliCommand::Conflicts),
        "paths" => Ok(CliCommand::Paths),
        other => bail!("Unknown command: {other} (try 'slotsmith help')"),
    }
}

fn require_mod_path(tokens: &[String], command: &str) -> Result<PathBuf> {
    let path = tokens
        .get(1)
        .with_context(|| format!("{command} requires a mod path"))?;
    Ok(PathBuf::from(path))
}

fn parse_fighter_flag(tokens: &[String], command: &str) -> Result<Option<String>> {
    let mut fighter = None;
    let mut iter = tokens.iter().skip(2);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--fighter" => {
                fighter = Some(
                    iter.next()
                        .context("--fighter requires a name")?
                        .to_string(),
                );
            }
            value if value.starts_with("--fighter=") => {
                fighter = Some(value.trim_start_matches("--fighter=").to_string());
            }
            other => bail!("Unknown {command} option: {other}"),
        }
    }
    Ok(fighter)
}

fn parse_reslot(tokens: &[String]) -> Result<CliCommand> {
    let mod_path = require_mod_path(tokens, "reslot")?;
    let mut map = SlotMap::new();
    let mut removals = Vec::new();
    let mut names_file = None;

    let mut iter = tokens.iter().skip(2).peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--map" | "-m" => {
                let value = iter.next().context("--map requires cXX=cYY")?;
                let (from, to) = parse_slot_pair(value)?;
                map.insert(from, to);
            }
            value if value.starts_with("--map=") => {
                let (from, to) = parse_slot_pair(value.trim_start_matches("--map="))?;
                map.insert(from, to);
            }
            "--remove" => {
                let value = iter.next().context("--remove requires a slot")?;
                removals.push(parse_slot(value)?);
            }
            value if value.starts_with("--remove=") => {
                removals.push(parse_slot(value.trim_start_matches("--remove="))?);
            }
            "--names-file" => {
                names_file = Some(PathBuf::from(
                    iter.next().context("--names-file requires a path")?,
                ));
            }
            value if value.starts_with("--names-file=") => {
                names_file = Some(PathBuf::from(value.trim_start_matches("--names-file=")));
            }
            other => bail!("Unknown reslot option: {other}"),
        }
    }

    if map.is_empty() && removals.is_empty() && names_file.is_none() {
        bail!("reslot needs at least one --map, --remove, or --names-file");
    }
    Ok(CliCommand::Reslot {
        mod_path,
        map,
        removals,
        names_file,
    })
}

fn parse_slot(value: &str) -> Result<Slot> {
    Slot::parse(value).with_context(|| format!("not a slot code: {value}"))
}

fn parse_slot_pair(value: &str) -> Result<(Slot, Slot)> {
    let (from, to) = value
        .split_once('=')
        .with_context(|| format!("expected cXX=cYY, got {value}"))?;
    Ok((parse_slot(from)?, parse_slot(to)?))
}

fn run_command(command: CliCommand, global: &GlobalOptions) -> Result<()> {
    let config = AppConfig::load_or_create()?;
    let refs = match &global.reference_dir {
        Some(dir) => ReferencePaths::in_dir(dir),
        None => config.reference_paths(),
    };
    let mods_path = global
        .mods_path
        .clone()
        .unwrap_or_else(|| config.mods_path.clone());

    match command {
        CliCommand::Scan { mod_path } => run_scan(&mod_path, global.format),
        CliCommand::Reslot {
            mod_path,
            map,
            removals,
            names_file,
        } => run_reslot(
            &mod_path,
            &map,
            &removals,
            names_file.as_deref(),
            &refs,
            global.format,
        ),
        CliCommand::Config { mod_path, fighter } => {
            run_config(&mod_path, fighter.as_deref(), &refs)
        }
        CliCommand::Names { mod_path, fighter } => {
            run_names(&mod_path, fighter.as_deref(), global.format)
        }
        CliCommand::ModsList => run_mods_list(&mods_path, global.format),
        CliCommand::Conflicts => run_conflicts(&mods_path, global.format),
        CliCommand::Paths => run_paths(&refs, &mods_path, global.format),
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn scan_mod(mod_path: &Path) -> Result<ScanResult> {
    if !mod_path.is_dir() {
        bail!("mod path is not a directory: {}", mod_path.display());
    }
    scan::scan_dir(mod_path)
}

fn run_scan(mod_path: &Path, format: OutputFormat) -> Result<()> {
    let result = scan_mod(mod_path)?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            if result.path_data.is_empty() {
                println!("No slotted content found.");
                return Ok(());
            }
            for (fighter, records) in &result.path_data {
                println!("{fighter}:");
                for (slot, record) in records {
                    println!(
                        "  {slot}  {} slotted paths, {} files",
                        record.paths_to_modify.len(),
                        record.files_to_modify.len()
                    );
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ReslotOutput {
    removed_files: usize,
    renamed: usize,
    final_slots: Vec<Slot>,
    warnings: Vec<String>,
}

fn run_reslot(
    mod_path: &Path,
    map: &SlotMap,
    removals: &[Slot],
    names_file: Option<&Path>,
    refs: &ReferencePaths,
    format: OutputFormat,
) -> Result<()> {
    let custom = match names_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read names file {}", path.display()))?;
            serde_json::from_str::<CustomNames>(&raw)
                .with_context(|| format!("parse names file {}", path.display()))?
        }
        None => CustomNames::new(),
    };

    let mut removed_files = 0;
    if !removals.is_empty() {
        let scanned = scan_mod(mod_path)?;
        for slot in removals {
            removed_files += reslot::remove_slot(mod_path, &scanned, *slot)?;
        }
    }

    // Rescan after removals so stale records never feed the rename phase.
    let scanned = scan_mod(mod_path)?;
    let report = reslot::apply(mod_path, &scanned, map, &custom, refs)?;

    let output = ReslotOutput {
        removed_files,
        renamed: report.changed,
        final_slots: report.final_slots,
        warnings: report.warnings,
    };
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if output.removed_files > 0 {
                println!("Removed {} files.", output.removed_files);
            }
            println!("Renamed {} entries.", output.renamed);
            let slots: Vec<String> = output.final_slots.iter().map(|slot| slot.code()).collect();
            println!("Final slots: {}", slots.join(", "));
            for warning in &output.warnings {
                eprintln!("Warning: {warning}");
            }
        }
    }
    Ok(())
}

fn run_config(mod_path: &Path, fighter: Option<&str>, refs: &ReferencePaths) -> Result<()> {
    let scanned = scan_mod(mod_path)?;
    let fighter = match fighter {
        Some(name) => name.to_string(),
        None => scan::primary_fighter(&scanned)
            .context("mod does not target exactly one fighter; pass --fighter")?
            .to_string(),
    };

    let vanilla = VanillaData::load(&refs.vanilla)?;
    let generator = ConfigGenerator::new(&vanilla, mod_path, &fighter)?;
    let config = generator.generate(&scanned.current_slots)?;
    let path = generator.write(&config)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_names(mod_path: &Path, fighter: Option<&str>, format: OutputFormat) -> Result<()> {
    let scanned = scan_mod(mod_path)?;
    let fighter = match fighter {
        Some(name) => name.to_string(),
        None => scan::primary_fighter(&scanned)
            .context("mod does not target exactly one fighter; pass --fighter")?
            .to_string(),
    };
    let names = names::read_existing_custom_names(mod_path, &fighter, &scanned.current_slots);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
        OutputFormat::Text => {
            if names.is_empty() {
                println!("No custom names found.");
                return Ok(());
            }
            for (slot, name) in &names {
                println!("{slot}:");
                if !name.csp_name.is_empty() {
                    println!("  select:  {}", name.csp_name);
                }
                if !name.vs_name.is_empty() {
                    println!("  versus:  {}", name.vs_name);
                }
                if !name.boxing_ring.is_empty() {
                    println!("  ring:    {}", name.boxing_ring);
                }
                if !name.announcer.is_empty() {
                    println!("  call:    {}", name.announcer);
                }
            }
        }
    }
    Ok(())
}

fn run_mods_list(mods_path: &Path, format: OutputFormat) -> Result<()> {
    if mods_path.as_os_str().is_empty() {
        bail!("mods path not configured (set it in config.json or pass --mods-path)");
    }
    let listed = mods::list_mods(mods_path)?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&listed)?);
        }
        OutputFormat::Text => {
            for item in listed {
                let enabled = if item.enabled { "x" } else { " " };
                println!("[{enabled}] {}", item.name);
            }
        }
    }
    Ok(())
}

fn run_conflicts(mods_path: &Path, format: OutputFormat) -> Result<()> {
    if mods_path.as_os_str().is_empty() {
        bail!("mods path not configured (set it in config.json or pass --mods-path)");
    }
    let listed = mods::list_mods(mods_path)?;
    let conflicts = conflict::detect_conflicts(&listed)?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&conflicts)?);
        }
        OutputFormat::Text => {
            if conflicts.is_empty() {
                println!("No conflicts detected.");
                return Ok(());
            }
            for entry in conflicts {
                println!("{}", entry.path);
                for owner in entry.mods {
                    println!("  -> {owner}");
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PathsOutput {
    mods_path: String,
    vanilla: String,
    names_data: String,
    messages_data: String,
    chara_db_template: String,
    missing: Vec<String>,
}

fn run_paths(refs: &ReferencePaths, mods_path: &Path, format: OutputFormat) -> Result<()> {
    let mut missing = Vec::new();
    for (label, path) in [
        ("vanilla", &refs.vanilla),
        ("names_data", &refs.names_data),
        ("messages_data", &refs.messages_data),
        ("chara_db_template", &refs.chara_db_template),
    ] {
        if !path.exists() {
            missing.push(label.to_string());
        }
    }

    let output = PathsOutput {
        mods_path: mods_path.display().to_string(),
        vanilla: refs.vanilla.display().to_string(),
        names_data: refs.names_data.display().to_string(),
        messages_data: refs.messages_data.display().to_string(),
        chara_db_template: refs.chara_db_template.display().to_string(),
        missing,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Mods path: {}", output.mods_path);
            println!("Vanilla manifest: {}", output.vanilla);
            println!("Fighter names: {}", output.names_data);
            println!("Message defaults: {}", output.messages_data);
            println!("Database template: {}", output.chara_db_template);
            if !output.missing.is_empty() {
                println!("Missing reference files: {}", output.missing.join(", "));
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("slotsmith v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  slotsmith scan <mod>                      Show slotted content per fighter");
    println!("  slotsmith reslot <mod> --map c00=c08      Move slot content");
    println!("  slotsmith reslot <mod> --remove c03       Delete one slot's content");
    println!("  slotsmith reslot <mod> --names-file <f>   Apply custom names from JSON");
    println!("  slotsmith config <mod> [--fighter <name>] Regenerate config.json");
    println!("  slotsmith names <mod> [--fighter <name>]  Show a mod's custom names");
    println!("  slotsmith mods                            List mod folders");
    println!("  slotsmith conflicts                       Report files claimed by several mods");
    println!("  slotsmith paths                           Show configured paths");
    println!();
    println!("Global options:");
    println!("  --format <json|text>                      Output format");
    println!("  --reference-dir <dir>                     Override the reference data directory");
    println!("  --mods-path <dir>                         Override the mods directory");
    println!("  -h, --help                                Show help");
    println!("  -V, --version                             Show version");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_pairs_parse_both_spellings() {
        let (from, to) = parse_slot_pair("c00=c08").unwrap();
        assert_eq!(from, Slot::new(0));
        assert_eq!(to, Slot::new(8));
        let (from, to) = parse_slot_pair("2=11").unwrap();
        assert_eq!(from, Slot::new(2));
        assert_eq!(to, Slot::new(11));
        assert!(parse_slot_pair("c00").is_err());
    }

    #[test]
    fn reslot_requires_at_least_one_action() {
        let tokens = vec!["reslot".to_string(), "/tmp/mod".to_string()];
        assert!(parse_reslot(&tokens).is_err());
    }

    #[test]
    fn global_options_are_extracted_from_anywhere() {
        let args = vec![
            "--format".to_string(),
            "json".to_string(),
            "scan".to_string(),
            "/tmp/mod".to_string(),
        ];
        let (global, tokens) = parse_global_options(&args);
        assert!(global.format == OutputFormat::Json);
        assert_eq!(tokens, vec!["scan", "/tmp/mod"]);
    }
}
