#![cfg(not(tarpaulin_include))]

use clap::{Parser, Subcommand};
use ims_forms::config::{ImsConfig, SheetType};
use ims_forms::downloader;
use ims_forms::records;
use ims_forms::{Accessor, FileStore, ReconciliationReport};
use std::error::Error;
use std::fs;
use std::path::PathBuf;

/// Operator tools for the IMS form worksheets
#[derive(Parser)]
#[command(name = "ims-cli", version)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "IMS_CONFIG", default_value = "ims.json")]
    config: PathBuf,

    /// Sheet type name or store id
    #[arg(long, short = 't', default_value = "LW FILES")]
    sheet_type: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List worksheets and whether each has a form configuration
    List,
    /// Print a worksheet's records
    Read {
        sheet: String,
        /// Only rows containing this text
        #[arg(long, short)]
        search: Option<String>,
    },
    /// Compare form configurations with the live headers
    Check {
        /// Single form to check; all configured forms when omitted
        form: Option<String>,
    },
    /// Write a worksheet's records to a CSV file
    Export { sheet: String, output: PathBuf },
    /// Replace a worksheet's contents with a CSV file
    Import { sheet: String, input: PathBuf },
    /// Create a worksheet for every configured form that has none
    Provision,
    /// Rename a header in every worksheet that has it
    RenameHeader { old: String, new: String },
}

fn print_report(form: &str, report: &ReconciliationReport) {
    if report.is_clean() && report.notes.is_empty() {
        println!("✓ {}", form);
        return;
    }
    let marker = if report.is_clean() { "✓" } else { "✗" };
    println!("{} {}", marker, form);
    for name in &report.missing {
        println!("    missing: {}", name);
    }
    for name in &report.extra {
        println!("    extra:   {}", name);
    }
    if report.is_permutation() {
        println!("    columns are in a different order");
    }
    for note in &report.notes {
        println!("    note:    {}", note);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = ImsConfig::load_or_default(&cli.config)?;
    let sheet_type: SheetType = config.sheet_type(&cli.sheet_type)?.clone();
    let store = FileStore::new(config.data_dir());
    store.create_store(&sheet_type.store_id)?;
    let accessor = Accessor::new(store, config.access_settings());

    match cli.command {
        Command::List => {
            let forms = config.load_forms(&sheet_type).unwrap_or_default();
            for name in accessor.list_worksheets(&sheet_type.store_id)? {
                let has_config = if forms.contains(&name) { "✅" } else { "❌" };
                println!("{} {}", has_config, name);
            }
            let usage = accessor.quota_usage();
            println!("API usage: {}/{} ({:.1}%)", usage.used, usage.max, usage.percent());
        }
        Command::Read { sheet, search } => {
            let data = accessor.read(&sheet, &sheet_type.store_id)?;
            if data.is_empty() {
                println!("No data in '{}'", sheet);
                return Ok(());
            }
            println!("row\t{}", data.headers.join("\t"));
            let hits = records::search(&data.records, search.as_deref().unwrap_or(""));
            for hit in &hits {
                println!("{}\t{}", hit.row, data.row_cells(hit.record).join("\t"));
            }
            println!("{} of {} records", hits.len(), data.records.len());
        }
        Command::Check { form } => {
            let forms = config.load_forms(&sheet_type)?;
            let selected: Vec<&str> = match &form {
                Some(id) => vec![id.as_str()],
                None => forms.ids().collect(),
            };
            let existing = accessor.list_worksheets(&sheet_type.store_id)?;
            for id in selected {
                let Some(schema) = forms.get(id) else {
                    println!("? {}: no form configuration", id);
                    continue;
                };
                if !existing.iter().any(|w| w == id) {
                    println!("✗ {}: worksheet does not exist", id);
                    continue;
                }
                let report = accessor.reconcile(schema, id, &sheet_type.store_id)?;
                print_report(id, &report);
            }
        }
        Command::Export { sheet, output } => {
            let data = accessor.read(&sheet, &sheet_type.store_id)?;
            fs::write(&output, downloader::to_csv(&data))?;
            println!("Wrote {} records to {}", data.records.len(), output.display());
        }
        Command::Import { sheet, input } => {
            let count = accessor
                .store()
                .import_csv(&sheet_type.store_id, &sheet, &input)?;
            accessor.invalidate_store(&sheet_type.store_id);
            println!("Imported {} rows into '{}'", count, sheet);
        }
        Command::Provision => {
            let forms = config.load_forms(&sheet_type)?;
            let existing = accessor.list_worksheets(&sheet_type.store_id)?;
            let mut created = 0;
            for (id, schema) in forms.iter() {
                if existing.iter().any(|w| w == id) {
                    continue;
                }
                accessor.create_worksheet(id, &sheet_type.store_id, &schema.expected_headers())?;
                println!("✅ Created sheet: {}", id);
                created += 1;
            }
            println!("{} of {} forms needed a worksheet", created, forms.len());
        }
        Command::RenameHeader { old, new } => {
            let mut updated = Vec::new();
            for name in accessor.list_worksheets(&sheet_type.store_id)? {
                match accessor.rename_header(&name, &sheet_type.store_id, &old, &new) {
                    Ok(true) => updated.push(name),
                    Ok(false) => {}
                    Err(e) => eprintln!("Error in {}: {}", name, e),
                }
            }
            if updated.is_empty() {
                println!("No worksheet has a '{}' header", old);
            } else {
                println!("Updated sheets:");
                for name in updated {
                    println!(" - {}", name);
                }
            }
        }
    }

    Ok(())
}
