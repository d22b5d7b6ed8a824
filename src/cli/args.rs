use clap::Parser;

use crate::config::defs::{
    DEFAULT_INDEX_PREFIX, DEFAULT_OUT_DIR, DEFAULT_REFERENCE, DEFAULT_SAMPLES,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "hpv-genotyping", version, about = "HPV genotyping by alignment against a reference panel")]
pub struct Arguments {

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = 'r', long = "reference", default_value = DEFAULT_REFERENCE, help = "Multi-FASTA of HPV reference genomes")]
    pub reference: String,

    #[arg(short = 'x', long = "index-prefix", default_value = DEFAULT_INDEX_PREFIX, help = "bowtie2 index prefix; built from --reference if <prefix>.1.bt2 is absent")]
    pub index_prefix: String,

    #[arg(
        short = 's',
        long = "samples",
        value_delimiter = ',',
        default_values_t = DEFAULT_SAMPLES.iter().map(|s| s.to_string()).collect::<Vec<String>>(),
        help = "Comma-separated list of sample accessions (e.g., SRR1186008,SRR1186009)"
    )]
    pub samples: Vec<String>,

    #[arg(short = 'd', long = "input-dir", default_value = ".", help = "Directory holding one <sample>/ folder per sample")]
    pub input_dir: String,

    #[arg(short = 'o', long = "out", default_value = DEFAULT_OUT_DIR, help = "Output directory for all generated files. Created if missing.")]
    pub out_dir: String,

    #[arg(short = 't', long, default_value_t = 8)]
    pub threads: usize,

    #[arg(short = 'q', long = "quality", default_value_t = 20)]
    pub quality: u8,

    #[arg(short = 'u', long = "unqualified-percent", default_value_t = 30)]
    pub unqualified_percent: u8,

    #[arg(short = 'l', long = "min-length", default_value_t = 50)]
    pub min_length: usize,

    #[arg(long, default_value_t = false)]
    pub no_plots: bool,

    #[arg(long, default_value_t = false)]
    pub skip_version_check: bool,

    #[arg(long = "tool-dir", help = "Directory holding fastp, bowtie2, bowtie2-build and samtools. Looked up on PATH when absent.")]
    pub tool_dir: Option<String>,
}

impl Default for Arguments {
    fn default() -> Self {
        Arguments {
            verbose: false,
            reference: DEFAULT_REFERENCE.to_string(),
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            samples: DEFAULT_SAMPLES.iter().map(|s| s.to_string()).collect(),
            input_dir: ".".to_string(),
            out_dir: DEFAULT_OUT_DIR.to_string(),
            threads: 8,
            quality: 20,
            unqualified_percent: 30,
            min_length: 50,
            no_plots: false,
            skip_version_check: false,
            tool_dir: None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_parse() {
        let parsed = Arguments::parse_from(["hpv-genotyping"]);
        let defaults = Arguments::default();
        assert_eq!(parsed.samples, defaults.samples);
        assert_eq!(parsed.samples.len(), 9);
        assert_eq!(parsed.threads, 8);
        assert_eq!(parsed.quality, 20);
        assert_eq!(parsed.unqualified_percent, 30);
        assert_eq!(parsed.min_length, 50);
        assert_eq!(parsed.reference, defaults.reference);
        assert_eq!(parsed.out_dir, "hpv_typing_results");
    }

    #[test]
    fn test_sample_list_override() {
        let parsed = Arguments::parse_from(["hpv-genotyping", "-s", "S1,S2", "-t", "2", "--no-plots"]);
        assert_eq!(parsed.samples, vec!["S1".to_string(), "S2".to_string()]);
        assert_eq!(parsed.threads, 2);
        assert!(parsed.no_plots);
        assert!(parsed.tool_dir.is_none());
    }

    #[test]
    fn test_tool_dir() {
        let parsed = Arguments::parse_from(["hpv-genotyping", "--tool-dir", "/opt/bio/bin"]);
        assert_eq!(parsed.tool_dir.as_deref(), Some("/opt/bio/bin"));
    }
}
