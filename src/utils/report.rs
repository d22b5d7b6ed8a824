/// Genotyping reports derived from a CountMatrix
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::defs::{
    PipelineError, DOMINANT_SUMMARY, GENOTYPE_REPORT, GENOTYPE_REPORT_CONDENSED, GENOTYPE_SUMMARY,
};
use crate::utils::counts::{CountMatrix, DominantType};

/// Written in place of a reference name when a sample has no columns at all.
pub const NO_TYPE: &str = "NA";

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub full: PathBuf,
    pub condensed: PathBuf,
    pub dominant: PathBuf,
    pub summary: PathBuf,
}

impl ReportPaths {
    pub fn new(out_dir: &Path) -> Self {
        ReportPaths {
            full: out_dir.join(GENOTYPE_REPORT),
            condensed: out_dir.join(GENOTYPE_REPORT_CONDENSED),
            dominant: out_dir.join(DOMINANT_SUMMARY),
            summary: out_dir.join(GENOTYPE_SUMMARY),
        }
    }
}


/// Dominant-type table: `\tDominant_HPV_Type\tMapped_Reads` then one row per sample.
pub fn render_dominant_table(dominants: &[DominantType]) -> String {
    let mut out = String::from("\tDominant_HPV_Type\tMapped_Reads\n");
    for d in dominants {
        let _ = writeln!(
            out,
            "{}\t{}\t{}",
            d.sample,
            d.reference.as_deref().unwrap_or(NO_TYPE),
            d.reads
        );
    }
    out
}


/// Free-text summary of a run.
///
/// # Arguments
///
/// * `full` - Complete count table.
/// * `condensed` - `full` without all-zero columns; its columns are the detected types.
/// * `dominants` - Output of `full.dominant_types()`.
///
/// # Returns
/// The report text.
pub fn render_text_summary(full: &CountMatrix, condensed: &CountMatrix, dominants: &[DominantType]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "HPV Genotyping Summary Report");
    let _ = writeln!(out, "==================================");
    let _ = writeln!(out, "Total samples processed: {}\n", full.samples().len());

    let _ = writeln!(out, "Detected HPV Types (non-zero):");
    for hpv_type in condensed.columns() {
        let _ = writeln!(out, "  - {}: {} mapped reads", hpv_type, full.column_total(hpv_type));
    }

    let _ = writeln!(out, "\nDominant HPV Type per Sample:");
    for d in dominants {
        let _ = writeln!(
            out,
            "  - {}: {} ({} reads)",
            d.sample,
            d.reference.as_deref().unwrap_or(NO_TYPE),
            d.reads
        );
    }
    out
}


/// Writes the full, condensed, dominant and text reports into `out_dir`.
///
/// # Arguments
///
/// * `out_dir` - Output directory; must exist.
/// * `full` - Aggregated count table.
///
/// # Returns
/// The report paths and the dominant calls (for printing).
pub fn write_reports(out_dir: &Path, full: &CountMatrix) -> Result<(ReportPaths, Vec<DominantType>), PipelineError> {
    let paths = ReportPaths::new(out_dir);

    full.write_tsv(&paths.full)?;
    info!("Full genotype table written to {}", paths.full.display());

    let condensed = full.condensed();
    condensed.write_tsv(&paths.condensed)?;
    info!(
        "Condensed genotype table ({} of {} references) written to {}",
        condensed.columns().len(),
        full.columns().len(),
        paths.condensed.display()
    );

    let dominants = full.dominant_types();
    fs::write(&paths.dominant, render_dominant_table(&dominants))
        .map_err(|e| PipelineError::IOError(format!("Failed to write {}: {}", paths.dominant.display(), e)))?;
    info!("Summary of dominant HPV types saved to {}", paths.dominant.display());

    fs::write(&paths.summary, render_text_summary(full, &condensed, &dominants))
        .map_err(|e| PipelineError::IOError(format!("Failed to write {}: {}", paths.summary.display(), e)))?;
    info!("Summary file written to {}", paths.summary.display());

    Ok((paths, dominants))
}
