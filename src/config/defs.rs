use std::path::{Path, PathBuf};
use crate::cli::Arguments;
use lazy_static::lazy_static;
use std::collections::HashMap;
use thiserror::Error;

// External software
pub const FASTP_TAG: &str = "fastp";
pub const BOWTIE2_TAG: &str = "bowtie2";
pub const BOWTIE2_BUILD_TAG: &str = "bowtie2-build";
pub const SAMTOOLS_TAG: &str = "samtools";


lazy_static! {
    /// Oldest (major, minor) known to accept the arguments generated in utils::command.
    pub static ref TOOL_VERSIONS: HashMap<&'static str, (u32, u32)> = {
        let mut m = HashMap::new();
        m.insert(FASTP_TAG, (0, 20));
        m.insert(BOWTIE2_TAG, (2, 3));
        m.insert(BOWTIE2_BUILD_TAG, (2, 3));
        m.insert(SAMTOOLS_TAG, (1, 10));

        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamtoolsSubcommand {
    View,
    Sort,
    Index,
    Idxstats,
}

impl SamtoolsSubcommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamtoolsSubcommand::View => "view",
            SamtoolsSubcommand::Sort => "sort",
            SamtoolsSubcommand::Index => "index",
            SamtoolsSubcommand::Idxstats => "idxstats",
        }
    }
}

// Defaults
pub const DEFAULT_REFERENCE: &str = "References/HPV_pave_Downloaded_06_28_2025.fa";
pub const DEFAULT_INDEX_PREFIX: &str = "References/HPV_bowtie2_index";
pub const DEFAULT_OUT_DIR: &str = "hpv_typing_results";
pub const DEFAULT_SAMPLES: &[&str] = &[
    "SRR1186008", "SRR1186009", "SRR1186010",
    "SRR1186011", "SRR1186012", "SRR1186013",
    "SRR1186014", "SRR1186015", "SRR1186016",
];

// Static Filenames
pub const BT2_INDEX_SENTINEL_EXT: &str = ".1.bt2";
pub const FASTQ_EXT: &str = "fastq";
pub const MATE1_SUFFIX: &str = "_1";
pub const TRIMMED_SUFFIX: &str = ".trimmed.fastq";
pub const FASTP_HTML_SUFFIX: &str = "_fastp.html";
pub const FASTP_JSON_SUFFIX: &str = "_fastp.json";
pub const SAM_SUFFIX: &str = ".sam";
pub const BAM_SUFFIX: &str = ".bam";
pub const SORTED_BAM_SUFFIX: &str = ".sorted.bam";

pub const GENOTYPE_REPORT: &str = "HPV_genotype_report.tsv";
pub const GENOTYPE_REPORT_CONDENSED: &str = "HPV_genotype_report_condensed.tsv";
pub const DOMINANT_SUMMARY: &str = "HPV_dominant_summary.tsv";
pub const GENOTYPE_SUMMARY: &str = "HPV_genotype_summary.txt";
pub const BARPLOT_PNG: &str = "HPV_genotype_barplot.png";
pub const HEATMAP_PNG: &str = "HPV_genotype_heatmap.png";

// idxstats reports reads with no placement under this name
pub const IDXSTATS_UNPLACED: &str = "*";


#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Tool execution failed: {tool}: {error}")]
    ToolExecution { tool: String, error: String },

    #[error("Unexpected output from {tool}: {error}")]
    ToolOutput { tool: String, error: String },

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    IOError(String),

    #[error("Plotting failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IOError(err.to_string())
    }
}


pub struct RunConfig {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub args: Arguments,
}

impl RunConfig {
    /// Executable for a tool tag: `<tool_dir>/<tool>` when --tool-dir is set, else the bare name for PATH lookup.
    pub fn program(&self, tool: &str) -> PathBuf {
        match &self.args.tool_dir {
            Some(dir) => {
                let dir = Path::new(dir);
                let dir = if dir.is_absolute() { dir.to_path_buf() } else { self.cwd.join(dir) };
                dir.join(tool)
            }
            None => PathBuf::from(tool),
        }
    }
}
