use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::defs::{
    BAM_SUFFIX, FASTP_HTML_SUFFIX, FASTP_JSON_SUFFIX, FASTQ_EXT, MATE1_SUFFIX, SAM_SUFFIX,
    SORTED_BAM_SUFFIX, TRIMMED_SUFFIX,
};


/// Resolves `path` against `cwd` unless it is already absolute.
pub fn absolute_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}


/// Candidate raw read files for a sample, in priority order:
/// `<dir>/<id>/<id>.fastq` then `<dir>/<id>/<id>_1.fastq`.
pub fn raw_read_candidates(input_dir: &Path, sample: &str) -> [PathBuf; 2] {
    let sample_dir = input_dir.join(sample);
    [
        sample_dir.join(format!("{}.{}", sample, FASTQ_EXT)),
        sample_dir.join(format!("{}{}.{}", sample, MATE1_SUFFIX, FASTQ_EXT)),
    ]
}

/// First existing candidate from raw_read_candidates, or None if the sample has no reads.
pub fn resolve_raw_reads(input_dir: &Path, sample: &str) -> Option<PathBuf> {
    raw_read_candidates(input_dir, sample)
        .into_iter()
        .find(|p| p.is_file())
}


/// Every file the per-sample steps write. All derive from (out_dir, sample).
#[derive(Debug, Clone, PartialEq)]
pub struct SampleArtifacts {
    pub trimmed_fastq: PathBuf,
    pub fastp_html: PathBuf,
    pub fastp_json: PathBuf,
    pub sam: PathBuf,
    pub bam: PathBuf,
    pub sorted_bam: PathBuf,
}

impl SampleArtifacts {
    pub fn new(out_dir: &Path, sample: &str) -> Self {
        let with = |suffix: &str| out_dir.join(format!("{}{}", sample, suffix));
        SampleArtifacts {
            trimmed_fastq: with(TRIMMED_SUFFIX),
            fastp_html: with(FASTP_HTML_SUFFIX),
            fastp_json: with(FASTP_JSON_SUFFIX),
            sam: with(SAM_SUFFIX),
            bam: with(BAM_SUFFIX),
            sorted_bam: with(SORTED_BAM_SUFFIX),
        }
    }
}


/// Finds `*.sorted.bam` directly under `out_dir`.
///
/// # Arguments
///
/// * `out_dir` - Pipeline output directory.
///
/// # Returns
/// (sample id, path) pairs sorted by file name. The sample id is the file name
/// without the `.sorted.bam` suffix.
pub fn discover_sorted_bams(out_dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(out_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let sample = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(SORTED_BAM_SUFFIX))
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        if let Some(sample) = sample {
            found.push((sample, path));
        }
    }
    found.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(found)
}
