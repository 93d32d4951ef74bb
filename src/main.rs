//! MCPGuard command-line interface
//!
//! Thin orchestration over the library: reads tool definitions from a JSON
//! file (the recorded output of a `tools/list` query), runs the scanner or
//! the verify engine, and prints the result as text or JSON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod definition;
mod fingerprint;
mod manifest;
mod scanner;
mod verify;

use definition::Definition;
use manifest::ManifestStore;
use scanner::{
    Allowlist, CollectionScanResult, PatternRegistry, ScanStatus, Scanner, ScannerConfig, Severity,
};
use verify::VerifyEngine;

/// MCPGuard - injection scanning and tool pinning for MCP servers
#[derive(Parser)]
#[command(
    name = "mcpguard",
    version,
    about = "Scan MCP tool descriptions for injection and pin them against tampering"
)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Directory holding the manifest and its backups
    #[arg(long, default_value = ".mcpguard", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan tool descriptions for injection patterns
    Scan {
        /// JSON file with the tool definitions to scan
        definitions: PathBuf,

        /// Collection (server) name for the report
        collection: String,

        /// Custom pattern file (JSON array or {"patterns": [...]})
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Use only the custom patterns, excluding all built-in rules
        #[arg(long, requires = "rules")]
        custom_only: bool,

        /// Allowlist file of known-safe phrases, one per line
        #[arg(long)]
        allowlist: Option<PathBuf>,
    },

    /// Verify definitions against the pinned baseline (pins on first run)
    Verify {
        definitions: PathBuf,
        collection: String,
    },

    /// Compare definitions against the baseline without modifying it
    Diff {
        definitions: PathBuf,
        collection: String,
    },

    /// Re-pin a changed tool or a whole collection
    Approve {
        definitions: PathBuf,
        collection: String,

        /// Approve a single tool instead of the whole collection
        #[arg(long)]
        tool: Option<String>,
    },

    /// Delete a pinned tool or a whole collection from the baseline
    Remove {
        collection: String,

        /// Remove a single tool instead of the whole collection
        #[arg(long)]
        tool: Option<String>,
    },

    /// List manifest backups, newest first
    Backups,

    /// Restore the manifest from a backup
    Rollback {
        /// Backup timestamp (milliseconds, from `backups`); latest if omitted
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// List active detection rules
    Rules {
        /// Custom pattern file to include
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Show only the custom patterns
        #[arg(long, requires = "rules")]
        custom_only: bool,
    },
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::new("mcpguard=warn"),
        1 => EnvFilter::new("mcpguard=info"),
        2 => EnvFilter::new("mcpguard=debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Accepted shapes of a definitions file: a bare array, or the raw
/// `tools/list` result object.
#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionsFile {
    ToolsResult { tools: Vec<Definition> },
    List(Vec<Definition>),
}

fn load_definitions(path: &Path) -> Result<Vec<Definition>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read definitions file '{}'", path.display()))?;
    let file: DefinitionsFile = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse definitions file '{}'", path.display()))?;
    Ok(match file {
        DefinitionsFile::ToolsResult { tools } => tools,
        DefinitionsFile::List(list) => list,
    })
}

fn build_registry(rules: Option<&Path>, custom_only: bool) -> Result<PatternRegistry> {
    let custom = match rules {
        Some(path) => PatternRegistry::load_custom_file(path)
            .with_context(|| format!("failed to load custom rules from '{}'", path.display()))?,
        None => Vec::new(),
    };
    Ok(if custom_only {
        PatternRegistry::custom_only(custom)
    } else {
        PatternRegistry::builtin().with_custom(custom)
    })
}

fn build_scanner(
    rules: Option<&Path>,
    custom_only: bool,
    allowlist: Option<&Path>,
) -> Result<Scanner> {
    let allowlist = match allowlist {
        Some(path) => Allowlist::from_file(path)
            .with_context(|| format!("failed to read allowlist '{}'", path.display()))?,
        None => Allowlist::default(),
    };
    Ok(Scanner::new(ScannerConfig {
        rules: build_registry(rules, custom_only)?,
        allowlist,
    }))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn severity_label(severity: Severity) -> String {
    match severity {
        Severity::Critical => "critical".red().bold().to_string(),
        Severity::Warning => "warning".yellow().to_string(),
        Severity::Info => "info".dimmed().to_string(),
    }
}

fn status_label(status: ScanStatus) -> String {
    match status {
        ScanStatus::Critical => "critical".red().bold().to_string(),
        ScanStatus::Warning => "warning".yellow().to_string(),
        ScanStatus::Clean => "clean".green().to_string(),
    }
}

fn print_scan_text(result: &CollectionScanResult) {
    println!(
        "{} {} ({} tools): {}",
        "Scanned".bold(),
        result.collection_name,
        result.item_count,
        status_label(result.status)
    );

    for item in &result.results {
        println!();
        println!("  {} [{}]", item.item_name.cyan(), status_label(item.status));
        for finding in &item.findings {
            println!(
                "    [{}] {} at offset {}: \"{}\"",
                severity_label(finding.severity),
                finding.rule_id,
                finding.offset,
                finding.matched_text
            );
        }
    }

    let clean = result.item_count - result.results.len();
    if clean > 0 {
        println!();
        println!("  {} tool(s) clean", clean);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = ManifestStore::new(&cli.data_dir);

    match cli.command {
        Commands::Scan {
            definitions,
            collection,
            rules,
            custom_only,
            allowlist,
        } => {
            let defs = load_definitions(&definitions)?;
            let scanner = build_scanner(rules.as_deref(), custom_only, allowlist.as_deref())?;
            let result = scanner.scan_collection(&defs, &collection);
            match cli.format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Text => print_scan_text(&result),
            }
        }

        Commands::Verify {
            definitions,
            collection,
        } => {
            let defs = load_definitions(&definitions)?;
            let outcome = VerifyEngine::new(store).verify(&defs, &collection)?;
            match cli.format {
                OutputFormat::Json => print_json(&outcome)?,
                OutputFormat::Text => {
                    println!("{}: {}", collection.bold(), outcome.status);
                    print_diff_text(&outcome.diff);
                }
            }
        }

        Commands::Diff {
            definitions,
            collection,
        } => {
            let defs = load_definitions(&definitions)?;
            let diff = VerifyEngine::new(store).diff(&defs, &collection)?;
            match cli.format {
                OutputFormat::Json => print_json(&diff)?,
                OutputFormat::Text => {
                    if !diff.manifest_exists {
                        println!("{}", "no manifest yet; run verify to pin a baseline".yellow());
                    } else if !diff.collection_exists {
                        println!(
                            "{}",
                            format!("collection '{collection}' is not pinned yet").yellow()
                        );
                    }
                    print_diff_text(&diff);
                }
            }
        }

        Commands::Approve {
            definitions,
            collection,
            tool,
        } => {
            let defs = load_definitions(&definitions)?;
            let outcome = VerifyEngine::new(store).approve(&defs, &collection, tool.as_deref())?;
            match cli.format {
                OutputFormat::Json => print_json(&outcome)?,
                OutputFormat::Text => println!(
                    "{} approved {} fingerprint(s) in '{}'",
                    "✔".green(),
                    outcome.approved.len(),
                    outcome.collection_name
                ),
            }
        }

        Commands::Remove { collection, tool } => {
            let outcome = VerifyEngine::new(store).remove(&collection, tool.as_deref())?;
            match cli.format {
                OutputFormat::Json => print_json(&outcome)?,
                OutputFormat::Text => {
                    if outcome.removed {
                        println!("{} removed", "✔".green());
                    } else {
                        println!("nothing to remove");
                    }
                }
            }
        }

        Commands::Backups => {
            let records = store.backups().list()?;
            match cli.format {
                OutputFormat::Json => print_json(&records)?,
                OutputFormat::Text => {
                    if records.is_empty() {
                        println!("no backups");
                    }
                    for record in records {
                        println!(
                            "{}  {}  {}",
                            record.timestamp,
                            record.iso_date,
                            record.path.display().to_string().dimmed()
                        );
                    }
                }
            }
        }

        Commands::Rollback { timestamp } => {
            let outcome = store.backups().rollback(store.manifest_path(), timestamp)?;
            match cli.format {
                OutputFormat::Json => print_json(&outcome)?,
                OutputFormat::Text => println!(
                    "{} restored manifest from {}",
                    "✔".green(),
                    outcome.restored_from.iso_date
                ),
            }
        }

        Commands::Rules { rules, custom_only } => {
            let registry = build_registry(rules.as_deref(), custom_only)?;
            for rule in registry.rules() {
                let category = rule.category.as_deref().unwrap_or("-");
                let description = rule.description.as_deref().unwrap_or("");
                println!(
                    "{:<28} {:<9} {:<16} {}",
                    rule.id.cyan(),
                    severity_label(rule.severity),
                    category,
                    description
                );
            }
        }
    }

    Ok(())
}

fn print_diff_text(diff: &verify::DiffResult) {
    for name in &diff.added {
        println!("  {} {}", "+".green(), name);
    }
    for name in &diff.removed {
        println!("  {} {}", "-".red(), name);
    }
    for change in &diff.changed {
        println!(
            "  {} {} ({} -> {} chars, pinned {})",
            "~".yellow(),
            change.name,
            change.old_len,
            change.new_len,
            change.old_pinned_at.to_rfc3339()
        );
        println!(
            "      {} {}",
            "old".dimmed(),
            change.old_hash[..16.min(change.old_hash.len())].to_string().dimmed()
        );
        println!(
            "      {} {}",
            "new".dimmed(),
            change.new_hash[..16.min(change.new_hash.len())].to_string().dimmed()
        );
    }
    if diff.unchanged_count > 0 {
        println!("  {} tool(s) unchanged", diff.unchanged_count);
    }
}
