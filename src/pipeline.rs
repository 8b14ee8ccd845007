//! End-to-end session wiring for programmatic use by the CLI.
//!
//! A [`Session`] owns one loaded workbook and carries the derived state
//! through the workflow: extract, category filter, duplicate resolution,
//! export. Derived stages recompute only when their inputs change; changing
//! the category selection rebuilds the filtered table and discards any
//! resolution choices made against the previous filtered set.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::ReportError;
use crate::extract::{
    extract_from_bytes, extract_from_path, ExtractConfig, ExtractDiagnostics, Extracted,
};
use crate::filter::{apply_filter, distinct_values, ColumnRoles, ResolvedRoles};
use crate::pdf_report::{export_pdf, Orientation};
use crate::report::{artifact_filenames, output_basename, ReportLabels};
use crate::resolve::{DuplicateGroup, ResolutionState, ResolutionStatus, Resolver};
use crate::table::Table;
use crate::xlsx_export::export_xlsx;

/// Everything tunable about a session in one place.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub extract: ExtractConfig,
    pub roles: ColumnRoles,
    pub labels: ReportLabels,
}

/// Which artifact families `export_all` writes.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub xlsx: bool,
    pub pdf: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions { xlsx: true, pdf: true }
    }
}

/// Result of one export run. Artifact failures are collected per file, not
/// short-circuited, so one bad exporter never blocks the others.
#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(String, String)>,
}

impl ExportOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable run summary, one line per artifact.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for path in &self.written {
            let _ = writeln!(out, "wrote {}", path.display());
        }
        for (name, message) in &self.failures {
            let _ = writeln!(out, "FAILED {}: {}", name, message);
        }
        let _ = write!(
            out,
            "{} written, {} failed",
            self.written.len(),
            self.failures.len()
        );
        out
    }
}

/// One loaded workbook plus all state derived from it.
pub struct Session {
    config: SessionConfig,
    input_stem: String,
    title: String,
    table: Table,
    diagnostics: ExtractDiagnostics,
    roles: ResolvedRoles,
    selection: Vec<String>,
    filtered: Table,
    resolver: Option<Resolver>,
}

impl Session {
    /// Load a workbook from disk and run extraction.
    pub fn open(path: &Path, config: SessionConfig) -> Result<Session> {
        let extracted = extract_from_path(path, &config.extract)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        Ok(Session::from_extracted(extracted, stem, config))
    }

    /// Load a workbook already held in memory (uploads, tests).
    pub fn from_bytes(bytes: &[u8], stem: &str, config: SessionConfig) -> Result<Session> {
        let extracted = extract_from_bytes(bytes, &config.extract)?;
        Ok(Session::from_extracted(extracted, stem.to_string(), config))
    }

    fn from_extracted(extracted: Extracted, input_stem: String, config: SessionConfig) -> Session {
        let Extracted {
            title,
            table,
            diagnostics,
        } = extracted;
        // Headers never change after extraction, so roles resolve once.
        let roles = config.roles.resolve(&table);
        let filtered = table.clone();
        let mut session = Session {
            config,
            input_stem,
            title,
            table,
            diagnostics,
            roles,
            selection: Vec::new(),
            filtered,
            resolver: None,
        };
        session.rebuild_resolver();
        session
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn filtered(&self) -> &Table {
        &self.filtered
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn labels(&self) -> &ReportLabels {
        &self.config.labels
    }

    /// Extraction counters for the loaded source.
    pub fn diagnostics(&self) -> &ExtractDiagnostics {
        &self.diagnostics
    }

    /// Which role columns were located in the extracted headers.
    pub fn roles(&self) -> ResolvedRoles {
        self.roles
    }

    /// Distinct category values available for filtering, sorted.
    pub fn categories(&self) -> Result<Vec<String>, ReportError> {
        let column = self.roles.category_column(&self.config.roles)?;
        distinct_values(&self.table, column)
    }

    /// Replace the category selection and recompute the filtered table.
    ///
    /// An empty selection means "no filter". Resolution choices survive a
    /// selection change only when the resulting filtered set is identical
    /// to the previous one.
    pub fn select_categories(&mut self, selection: Vec<String>) -> Result<(), ReportError> {
        if selection == self.selection {
            return Ok(());
        }
        let filtered = if selection.is_empty() {
            self.table.clone()
        } else {
            let column = self.roles.category_column(&self.config.roles)?;
            apply_filter(&self.table, column, &selection)
        };
        self.selection = selection;
        self.filtered = filtered;
        self.rebuild_resolver();
        Ok(())
    }

    /// Rebuild the resolver against the current filtered table. Existing
    /// choices carry over only when the filtered set is unchanged.
    fn rebuild_resolver(&mut self) {
        let Some(key_column) = self.roles.key else {
            self.resolver = None;
            return;
        };
        let fresh = Resolver::detect(&self.filtered, key_column);
        match &self.resolver {
            Some(old) if old.state().signature == fresh.state().signature => {}
            _ => self.resolver = Some(fresh),
        }
    }

    pub fn status(&self) -> ResolutionStatus {
        match &self.resolver {
            Some(resolver) => resolver.status(),
            None => ResolutionStatus::KeyColumnMissing,
        }
    }

    pub fn duplicate_groups(&self) -> &[DuplicateGroup] {
        match &self.resolver {
            Some(resolver) => resolver.groups(),
            None => &[],
        }
    }

    pub fn candidate_summary(&self, row_id: usize) -> String {
        match &self.resolver {
            Some(resolver) => resolver.candidate_summary(row_id),
            None => String::new(),
        }
    }

    /// Record the kept row for one duplicate group.
    pub fn choose(&mut self, key: &str, row_id: usize) -> Result<(), ReportError> {
        match &mut self.resolver {
            Some(resolver) => resolver.choose(key, row_id),
            None => Err(ReportError::UnknownGroup {
                key: key.to_string(),
            }),
        }
    }

    pub fn unresolved_keys(&self) -> Vec<String> {
        match &self.resolver {
            Some(resolver) => resolver
                .unresolved_keys()
                .into_iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Snapshot resolution choices for persistence.
    pub fn resolution_state(&self) -> Option<ResolutionState> {
        self.resolver.as_ref().map(|r| r.state())
    }

    /// Restore persisted choices; returns how many applied. Fails when the
    /// saved state belongs to a different filtered set.
    pub fn apply_resolution_state(&mut self, state: &ResolutionState) -> Result<usize> {
        match &mut self.resolver {
            Some(resolver) => resolver.apply_state(state),
            None => anyhow::bail!("no duplicate detection available for this table"),
        }
    }

    /// The unique rows plus one chosen row per group, in original order.
    ///
    /// Without a key column duplicates cannot be detected at all, so export
    /// is disabled rather than silently passing the filtered table through.
    pub fn resolved_table(&self) -> Result<Table, ReportError> {
        match &self.resolver {
            Some(resolver) => resolver.resolved_table(),
            None => Err(ReportError::ColumnNotFound {
                role: "key",
                keyword: self.config.roles.key_keyword.clone(),
            }),
        }
    }

    /// Basename shared by all artifacts of this session.
    pub fn output_basename(&self) -> String {
        output_basename(&self.input_stem, &self.selection, &self.config.labels)
    }

    /// Write the spreadsheet and both PDF reports into `dir`.
    ///
    /// Requires a complete resolution. Each artifact is produced and written
    /// independently; failures are collected in the outcome.
    pub fn export_all(&self, dir: &Path, options: &ExportOptions) -> Result<ExportOutcome> {
        let resolved = self
            .resolved_table()
            .context("cannot export before duplicates are resolved")?;

        let basename = self.output_basename();
        let (xlsx_name, portrait_name, landscape_name) = artifact_filenames(&basename);
        let mut outcome = ExportOutcome::default();

        let emit = |outcome: &mut ExportOutcome,
                    artifact: &'static str,
                    name: &str,
                    result: Result<Vec<u8>>| {
            match result.and_then(|bytes| {
                let path = dir.join(name);
                std::fs::write(&path, bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                Ok(path)
            }) {
                Ok(path) => {
                    log::info!("wrote {}", path.display());
                    outcome.written.push(path);
                }
                Err(err) => {
                    let err = ReportError::serialization(artifact, format!("{:#}", err));
                    log::error!("{}", err);
                    outcome.failures.push((name.to_string(), err.to_string()));
                }
            }
        };

        if options.xlsx {
            emit(
                &mut outcome,
                "spreadsheet",
                &xlsx_name,
                export_xlsx(&resolved, &self.title, &self.config.labels, &[]),
            );
        }
        if options.pdf {
            emit(
                &mut outcome,
                "portrait report",
                &portrait_name,
                export_pdf(&resolved, &self.title, Orientation::Portrait, &self.config.labels),
            );
            emit(
                &mut outcome,
                "landscape report",
                &landscape_name,
                export_pdf(&resolved, &self.title, Orientation::Landscape, &self.config.labels),
            );
        }

        Ok(outcome)
    }
}
