//! Command output
//!
//! Reports print as text by default, as JSON with `--json`. `--quiet`
//! suppresses everything but errors.

use ankisync_core::{ImportReport, SyncReport};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    Quiet,
}

impl OutputFormat {
    /// `--quiet` beats `--json`
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Notices first, then a summary line and the touched notes
    pub fn print_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => {
                for notice in &report.notices {
                    eprintln!("⚠ {}", notice);
                }
                println!("✓ {}", summarize(report));
                print_names("Created", &report.created);
                print_names("Updated", &report.modified);
                print_names("Moved", &report.changed_deck);
                print_names("New decks", &report.added_decks);
                if !report.deleted.is_empty() {
                    let ids: Vec<String> = report.deleted.iter().map(i64::to_string).collect();
                    print_names("Deleted notes", &ids);
                }
                print_names("Malformed", &report.malformed);
                if report.has_problems() {
                    eprintln!("⚠ Skipped documents are retried on the next pass");
                }
            }
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => {}
        }
    }

    /// Print the result of a note type import
    pub fn print_import(&self, report: &ImportReport) {
        match self.format {
            OutputFormat::Human => {
                println!("✓ Imported {} note type(s)", report.imported.len());
                print_names("Note types", &report.imported);
                print_names("Removed", &report.removed);
                for name in &report.failed {
                    eprintln!("⚠ Failed to write template for {}", name);
                }
            }
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => {}
        }
    }

    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Goes to stderr
    pub fn warning(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("⚠ {}", msg),
            OutputFormat::Json => {
                eprintln!("{}", serde_json::json!({"status": "warning", "message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// One-line summary of a pass
fn summarize(report: &SyncReport) -> String {
    let mut summary = format!(
        "Sync complete: {} created, {} updated, {} deleted, {} unchanged",
        report.created.len(),
        report.modified.len(),
        report.deleted.len(),
        report.cached.len()
    );
    if !report.errors.is_empty() {
        summary.push_str(&format!(", {} error(s)", report.errors.len()));
    }
    if !report.malformed.is_empty() {
        summary.push_str(&format!(", {} malformed", report.malformed.len()));
    }
    summary
}

fn print_names(label: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!("  {}:", label);
    for name in names {
        println!("    {}", name);
    }
}
