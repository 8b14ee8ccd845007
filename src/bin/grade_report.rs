//! Grade Report Tool - Inspect assignment spreadsheets and produce reports
//!
//! This tool loads an exported assignment-results workbook, lets the user
//! filter by category and resolve duplicate email records, then writes a
//! styled xlsx plus portrait and landscape PDF reports.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use gradebook_toolkit::extract::ExtractConfig;
use gradebook_toolkit::filter::ColumnRoles;
use gradebook_toolkit::pipeline::{ExportOptions, Session, SessionConfig};
use gradebook_toolkit::resolve::{ResolutionState, ResolutionStatus};
use std::io::{BufRead, Write as IoWrite};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grade-report")]
#[command(about = "Assignment spreadsheet cleanup and report generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the extracted table: title, headers, and row counts
    Inspect {
        /// Input xlsx file
        #[arg(short, long)]
        input: PathBuf,

        /// Spreadsheet column positions to extract, in output order (0-based)
        #[arg(long, default_value = "0,1,2,3,4,5", value_delimiter = ',')]
        columns: Vec<u32>,

        /// Print the first N data rows
        #[arg(long, default_value = "5")]
        preview: usize,
    },

    /// List the distinct category values available for filtering
    Categories {
        /// Input xlsx file
        #[arg(short, long)]
        input: PathBuf,

        /// Spreadsheet column positions to extract, in output order (0-based)
        #[arg(long, default_value = "0,1,2,3,4,5", value_delimiter = ',')]
        columns: Vec<u32>,

        /// Substring matched against headers to find the category column
        #[arg(long, default_value = "assignment")]
        category_keyword: String,
    },

    /// List duplicate groups sharing a key value, with candidate rows
    Duplicates {
        /// Input xlsx file
        #[arg(short, long)]
        input: PathBuf,

        /// Spreadsheet column positions to extract, in output order (0-based)
        #[arg(long, default_value = "0,1,2,3,4,5", value_delimiter = ',')]
        columns: Vec<u32>,

        /// Restrict to rows matching these category values
        #[arg(short, long)]
        category: Vec<String>,

        /// Substring matched against headers to find the category column
        #[arg(long, default_value = "assignment")]
        category_keyword: String,

        /// Substring matched against headers to find the key column
        #[arg(long, default_value = "email")]
        key_keyword: String,
    },

    /// Resolve duplicates and write the xlsx and PDF artifacts
    Export {
        /// Input xlsx file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the artifacts
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Spreadsheet column positions to extract, in output order (0-based)
        #[arg(long, default_value = "0,1,2,3,4,5", value_delimiter = ',')]
        columns: Vec<u32>,

        /// Restrict to rows matching these category values
        #[arg(short, long)]
        category: Vec<String>,

        /// Keep a specific row for a duplicate group. Format: "key=rowid"
        /// (row ids as printed by the duplicates subcommand). Repeatable.
        #[arg(long)]
        choose: Vec<String>,

        /// JSON file of saved resolution choices to apply
        #[arg(long)]
        choices: Option<PathBuf>,

        /// Write the final resolution choices to this JSON file
        #[arg(long)]
        save_choices: Option<PathBuf>,

        /// Prompt on stdin for any group still unresolved
        #[arg(long)]
        interactive: bool,

        /// Skip the spreadsheet artifact
        #[arg(long)]
        skip_xlsx: bool,

        /// Skip both PDF artifacts
        #[arg(long)]
        skip_pdf: bool,

        /// Substring matched against headers to find the category column
        #[arg(long, default_value = "assignment")]
        category_keyword: String,

        /// Substring matched against headers to find the key column
        #[arg(long, default_value = "email")]
        key_keyword: String,
    },
}

fn session_config(columns: &[u32], category_keyword: &str, key_keyword: &str) -> SessionConfig {
    SessionConfig {
        extract: ExtractConfig {
            source_columns: columns.to_vec(),
            ..ExtractConfig::default()
        },
        roles: ColumnRoles {
            category_keyword: category_keyword.to_string(),
            key_keyword: key_keyword.to_string(),
        },
        ..SessionConfig::default()
    }
}

fn inspect(input: &PathBuf, columns: &[u32], preview: usize) -> Result<()> {
    let roles = ColumnRoles::default();
    let config = session_config(columns, &roles.category_keyword, &roles.key_keyword);
    let session = Session::open(input, config)?;

    println!("Title:   {}", session.title());
    println!("Headers: {}", session.table().headers().join(" | "));
    println!("Rows:    {}", session.table().row_count());
    println!(
        "Scanned: {} data row(s), {} matched",
        session.diagnostics().rows_scanned,
        session.diagnostics().rows_matched
    );
    let role_name = |col: Option<usize>| match col {
        Some(i) => format!("{} (column {})", session.table().headers()[i], i),
        None => "not found".to_string(),
    };
    println!("Category column: {}", role_name(session.roles().category));
    println!("Key column:      {}", role_name(session.roles().key));
    for row in session.table().rows().iter().take(preview) {
        let line: Vec<String> = row.iter().map(|c| c.to_display()).collect();
        println!("  {}", line.join(" | "));
    }
    match session.status() {
        ResolutionStatus::KeyColumnMissing => {
            println!("Duplicates: no key column; resolution and export disabled")
        }
        ResolutionStatus::NoDuplicates => println!("Duplicates: none"),
        ResolutionStatus::Pending { unresolved } => {
            println!("Duplicates: {} unresolved group(s)", unresolved)
        }
        ResolutionStatus::Resolved => println!("Duplicates: resolved"),
    }
    Ok(())
}

fn list_categories(input: &PathBuf, columns: &[u32], category_keyword: &str) -> Result<()> {
    let config = session_config(columns, category_keyword, "email");
    let session = Session::open(input, config)?;
    let values = session.categories()?;
    println!("{} category value(s):", values.len());
    for value in values {
        println!("  {}", value);
    }
    Ok(())
}

fn list_duplicates(
    input: &PathBuf,
    columns: &[u32],
    categories: &[String],
    category_keyword: &str,
    key_keyword: &str,
) -> Result<()> {
    let config = session_config(columns, category_keyword, key_keyword);
    let mut session = Session::open(input, config)?;
    if !categories.is_empty() {
        session.select_categories(categories.to_vec())?;
    }

    let groups = session.duplicate_groups().to_vec();
    if groups.is_empty() {
        println!("No duplicate groups.");
        return Ok(());
    }
    println!("{} duplicate group(s):", groups.len());
    for group in &groups {
        println!("{} ({} rows):", group.key, group.rows.len());
        for &row_id in &group.rows {
            println!("  [{}] {}", row_id, session.candidate_summary(row_id));
        }
    }
    Ok(())
}

/// Parse one "key=rowid" choice argument.
fn parse_choice(raw: &str) -> Result<(String, usize)> {
    let (key, row) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid --choose '{}': expected key=rowid", raw))?;
    let row_id: usize = row
        .trim()
        .parse()
        .with_context(|| format!("Invalid row id in --choose '{}'", raw))?;
    Ok((key.trim().to_string(), row_id))
}

/// Prompt on stdin for each unresolved group until all are resolved.
fn resolve_interactively(session: &mut Session) -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let pending = session.unresolved_keys();
        if pending.is_empty() {
            return Ok(());
        }
        let key = pending[0].clone();
        let group = session
            .duplicate_groups()
            .iter()
            .find(|g| g.key == key)
            .cloned()
            .ok_or_else(|| anyhow!("Unresolved key '{}' has no group", key))?;

        println!("Duplicate records for {}:", key);
        for (i, &row_id) in group.rows.iter().enumerate() {
            println!("  {}. {}", i + 1, session.candidate_summary(row_id));
        }
        print!("Keep which record? [1-{}]: ", group.rows.len());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let line = match lines.next() {
            Some(line) => line.context("Failed to read stdin")?,
            None => anyhow::bail!("stdin closed with {} group(s) unresolved", pending.len()),
        };
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=group.rows.len()).contains(&n) => {
                session.choose(&key, group.rows[n - 1])?;
            }
            _ => println!("Please enter a number between 1 and {}.", group.rows.len()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn export(
    input: &PathBuf,
    out_dir: &PathBuf,
    columns: &[u32],
    categories: &[String],
    choose: &[String],
    choices_file: Option<&PathBuf>,
    save_choices: Option<&PathBuf>,
    interactive: bool,
    options: &ExportOptions,
    category_keyword: &str,
    key_keyword: &str,
) -> Result<()> {
    let config = session_config(columns, category_keyword, key_keyword);
    let mut session = Session::open(input, config)?;
    if !categories.is_empty() {
        session.select_categories(categories.to_vec())?;
    }

    if let Some(path) = choices_file {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let state: ResolutionState = serde_json::from_str(&data)
            .with_context(|| format!("Invalid choices file {}", path.display()))?;
        let applied = session.apply_resolution_state(&state)?;
        println!("Applied {} saved choice(s).", applied);
    }
    for raw in choose {
        let (key, row_id) = parse_choice(raw)?;
        session.choose(&key, row_id)?;
    }
    if interactive {
        resolve_interactively(&mut session)?;
    }

    if let ResolutionStatus::Pending { unresolved } = session.status() {
        anyhow::bail!(
            "{} duplicate group(s) unresolved; use --choose, --choices, or --interactive \
             (run the duplicates subcommand to list them)",
            unresolved
        );
    }

    if let Some(path) = save_choices {
        if let Some(state) = session.resolution_state() {
            let json = serde_json::to_string_pretty(&state)
                .context("Failed to serialize resolution choices")?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved choices to {}", path.display());
        }
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let outcome = session.export_all(out_dir, options)?;
    println!("{}", outcome.summary());
    if !outcome.is_complete() {
        anyhow::bail!("one or more artifacts failed");
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            input,
            columns,
            preview,
        } => {
            inspect(&input, &columns, preview)?;
        }
        Commands::Categories {
            input,
            columns,
            category_keyword,
        } => {
            list_categories(&input, &columns, &category_keyword)?;
        }
        Commands::Duplicates {
            input,
            columns,
            category,
            category_keyword,
            key_keyword,
        } => {
            list_duplicates(&input, &columns, &category, &category_keyword, &key_keyword)?;
        }
        Commands::Export {
            input,
            out_dir,
            columns,
            category,
            choose,
            choices,
            save_choices,
            interactive,
            skip_xlsx,
            skip_pdf,
            category_keyword,
            key_keyword,
        } => {
            let options = ExportOptions {
                xlsx: !skip_xlsx,
                pdf: !skip_pdf,
            };
            export(
                &input,
                &out_dir,
                &columns,
                &category,
                &choose,
                choices.as_ref(),
                save_choices.as_ref(),
                interactive,
                &options,
                &category_keyword,
                &key_keyword,
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(
            parse_choice("a@x=3").unwrap(),
            ("a@x".to_string(), 3usize)
        );
        assert_eq!(
            parse_choice(" a@x = 12 ").unwrap(),
            ("a@x".to_string(), 12usize)
        );
        assert!(parse_choice("a@x").is_err());
        assert!(parse_choice("a@x=three").is_err());
    }

    #[test]
    fn test_duplicates_accepts_role_keywords() {
        let cli = Cli::try_parse_from([
            "grade-report",
            "duplicates",
            "-i",
            "results.xlsx",
            "--category-keyword",
            "group",
            "--key-keyword",
            "contact",
        ])
        .unwrap();
        match cli.command {
            Commands::Duplicates {
                category_keyword,
                key_keyword,
                ..
            } => {
                assert_eq!(category_keyword, "group");
                assert_eq!(key_keyword, "contact");
            }
            _ => panic!("parsed the wrong subcommand"),
        }
    }
}
