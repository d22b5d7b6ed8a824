use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::defs::{
    PipelineError, RunConfig, SamtoolsSubcommand, BARPLOT_PNG, BOWTIE2_BUILD_TAG, BOWTIE2_TAG,
    FASTP_TAG, HEATMAP_PNG, SAMTOOLS_TAG,
};
use crate::utils::command::bowtie2::{index_sentinel, Bowtie2BuildConfig, Bowtie2Config};
use crate::utils::command::fastp::FastpConfig;
use crate::utils::command::samtools::SamtoolsConfig;
use crate::utils::command::{check_versions, generate_cli};
use crate::utils::counts::CountMatrix;
use crate::utils::file::{absolute_path, discover_sorted_bams, resolve_raw_reads, SampleArtifacts};
use crate::utils::plotting::{plot_heatmap, plot_stacked_bars};
use crate::utils::report::{render_dominant_table, write_reports, ReportPaths};
use crate::utils::sambam::idxstats;
use crate::utils::streams::run_tool;


fn tool_error(tool: &str) -> impl Fn(anyhow::Error) -> PipelineError + '_ {
    move |e| PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: e.to_string(),
    }
}


/// Builds the bowtie2 index unless `<prefix>.1.bt2` is already there.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `reference` - Reference multi-FASTA.
/// * `index_prefix` - bowtie2 index prefix.
///
/// # Returns
/// true if the index was built, false if an existing one was reused.
pub async fn ensure_bowtie2_index(config: &RunConfig, reference: &Path, index_prefix: &Path) -> Result<bool, PipelineError> {
    if index_sentinel(index_prefix).exists() {
        info!("Found bowtie2 index at {}; skipping build", index_prefix.display());
        return Ok(false);
    }
    if !reference.is_file() {
        return Err(PipelineError::MissingInput(format!(
            "Reference FASTA {} not found and no index at {}",
            reference.display(),
            index_prefix.display()
        )));
    }
    if let Some(parent) = index_prefix.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let build_config = Bowtie2BuildConfig {
        reference: reference.to_path_buf(),
        bt2_index_path: index_prefix.to_path_buf(),
    };
    let args = generate_cli(BOWTIE2_BUILD_TAG, config, Some(&build_config)).map_err(tool_error(BOWTIE2_BUILD_TAG))?;
    run_tool(BOWTIE2_BUILD_TAG, &config.program(BOWTIE2_BUILD_TAG), &args, "Building Bowtie2 index").await?;
    Ok(true)
}


/// Trims, aligns, converts, sorts and indexes one sample.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `sample` - Sample accession.
/// * `raw_reads` - Resolved raw FASTQ.
/// * `index_prefix` - bowtie2 index prefix.
///
/// # Returns
/// The sample's artifact paths. Any failed step aborts with its error.
pub async fn process_sample(
    config: &RunConfig,
    sample: &str,
    raw_reads: &Path,
    index_prefix: &Path,
) -> Result<SampleArtifacts, PipelineError> {
    let artifacts = SampleArtifacts::new(&config.out_dir, sample);

    let fastp_config = FastpConfig {
        input: raw_reads.to_path_buf(),
        output: artifacts.trimmed_fastq.clone(),
        html_report: artifacts.fastp_html.clone(),
        json_report: artifacts.fastp_json.clone(),
    };
    let fastp_args = generate_cli(FASTP_TAG, config, Some(&fastp_config)).map_err(tool_error(FASTP_TAG))?;
    run_tool(FASTP_TAG, &config.program(FASTP_TAG), &fastp_args, &format!("Trimming {}", sample)).await?;

    let bt2_config = Bowtie2Config {
        bt2_index_path: index_prefix.to_path_buf(),
        reads: artifacts.trimmed_fastq.clone(),
        sam_out: artifacts.sam.clone(),
    };
    let bt2_args = generate_cli(BOWTIE2_TAG, config, Some(&bt2_config)).map_err(tool_error(BOWTIE2_TAG))?;
    run_tool(BOWTIE2_TAG, &config.program(BOWTIE2_TAG), &bt2_args, &format!("Aligning {} with Bowtie2", sample)).await?;

    let view_config = SamtoolsConfig {
        subcommand: SamtoolsSubcommand::View,
        subcommand_fields: vec![
            ("-b".to_string(), None),
            ("-S".to_string(), None),
            ("-o".to_string(), Some(artifacts.bam.to_string_lossy().to_string())),
        ],
        positional: vec![artifacts.sam.to_string_lossy().to_string()],
    };
    let view_args = generate_cli(SAMTOOLS_TAG, config, Some(&view_config)).map_err(tool_error(SAMTOOLS_TAG))?;
    run_tool(SAMTOOLS_TAG, &config.program(SAMTOOLS_TAG), &view_args, &format!("Converting to BAM: {}", sample)).await?;

    let sort_config = SamtoolsConfig {
        subcommand: SamtoolsSubcommand::Sort,
        subcommand_fields: vec![("-o".to_string(), Some(artifacts.sorted_bam.to_string_lossy().to_string()))],
        positional: vec![artifacts.bam.to_string_lossy().to_string()],
    };
    let sort_args = generate_cli(SAMTOOLS_TAG, config, Some(&sort_config)).map_err(tool_error(SAMTOOLS_TAG))?;
    run_tool(SAMTOOLS_TAG, &config.program(SAMTOOLS_TAG), &sort_args, &format!("Sorting BAM: {}", sample)).await?;

    let index_config = SamtoolsConfig {
        subcommand: SamtoolsSubcommand::Index,
        subcommand_fields: Vec::new(),
        positional: vec![artifacts.sorted_bam.to_string_lossy().to_string()],
    };
    let index_args = generate_cli(SAMTOOLS_TAG, config, Some(&index_config)).map_err(tool_error(SAMTOOLS_TAG))?;
    run_tool(SAMTOOLS_TAG, &config.program(SAMTOOLS_TAG), &index_args, &format!("Indexing BAM: {}", sample)).await?;

    Ok(artifacts)
}


/// Runs every listed sample in order. Samples without a FASTQ are skipped.
///
/// # Returns
/// (processed sample ids, skipped sample ids)
pub async fn process_samples(config: &RunConfig, index_prefix: &Path) -> Result<(Vec<String>, Vec<String>), PipelineError> {
    let input_dir = absolute_path(Path::new(&config.args.input_dir), &config.cwd);
    let mut processed = Vec::new();
    let mut skipped = Vec::new();

    for sample in &config.args.samples {
        let raw_reads = match resolve_raw_reads(&input_dir, sample) {
            Some(path) => path,
            None => {
                warn!("No FASTQ found for {}; skipping", sample);
                skipped.push(sample.clone());
                continue;
            }
        };
        process_sample(config, sample, &raw_reads, index_prefix).await?;
        processed.push(sample.clone());
    }
    Ok((processed, skipped))
}


/// Counts mapped reads per reference for every sorted BAM in the output directory.
pub async fn aggregate_counts(config: &RunConfig) -> Result<CountMatrix, PipelineError> {
    let bams = discover_sorted_bams(&config.out_dir)?;
    let mut matrix = CountMatrix::new();
    for (sample, bam) in bams {
        let counts = idxstats(config, &bam).await?;
        matrix.insert_sample(&sample, counts);
    }
    info!("Aggregated counts for {} samples over {} references", matrix.samples().len(), matrix.columns().len());
    Ok(matrix)
}


/// Renders the bar chart and heatmap from the condensed table on disk.
pub fn render_plots(paths: &ReportPaths, out_dir: &Path) -> Result<Option<(PathBuf, PathBuf)>, PipelineError> {
    let condensed = CountMatrix::read_tsv(&paths.condensed)?;
    if condensed.is_empty() || condensed.columns().is_empty() {
        warn!("No reads mapped to any reference; skipping plots");
        return Ok(None);
    }

    let barplot = out_dir.join(BARPLOT_PNG);
    plot_stacked_bars(&condensed, &barplot).map_err(|e| PipelineError::Plot(e.to_string()))?;
    info!("Bar plot written to {}", barplot.display());

    let heatmap = out_dir.join(HEATMAP_PNG);
    plot_heatmap(&condensed, &heatmap).map_err(|e| PipelineError::Plot(e.to_string()))?;
    info!("Heatmap written to {}", heatmap.display());

    Ok(Some((barplot, heatmap)))
}


/// Run function for the HPV genotyping pipeline
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run(config: &RunConfig) -> Result<(), PipelineError> {
    if config.args.samples.is_empty() {
        return Err(PipelineError::InvalidConfig("Sample list is empty".to_string()));
    }
    if config.args.threads == 0 {
        return Err(PipelineError::InvalidConfig("--threads must be at least 1".to_string()));
    }

    let reference = absolute_path(Path::new(&config.args.reference), &config.cwd);
    let index_prefix = absolute_path(Path::new(&config.args.index_prefix), &config.cwd);

    if !config.args.skip_version_check {
        let mut tools = vec![FASTP_TAG, BOWTIE2_TAG, SAMTOOLS_TAG];
        if !index_sentinel(&index_prefix).exists() {
            tools.push(BOWTIE2_BUILD_TAG);
        }
        check_versions(config, tools).await?;
    }

    ensure_bowtie2_index(config, &reference, &index_prefix).await?;

    let (processed, skipped) = process_samples(config, &index_prefix).await?;
    info!("Processed {} samples, skipped {}", processed.len(), skipped.len());

    let matrix = aggregate_counts(config).await?;
    let (paths, dominants) = write_reports(&config.out_dir, &matrix)?;
    println!("{}", render_dominant_table(&dominants));

    if config.args.no_plots {
        info!("Plotting disabled");
    } else {
        render_plots(&paths, &config.out_dir)?;
    }

    info!("Genotyping pipeline completed. Results saved in {}", config.out_dir.display());
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use crate::cli::Arguments;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> RunConfig {
        let out_dir = dir.join("out");
        fs::create_dir_all(&out_dir).unwrap();
        RunConfig {
            cwd: dir.to_path_buf(),
            out_dir,
            args: Arguments {
                samples: vec!["MISSING1".to_string(), "MISSING2".to_string()],
                skip_version_check: true,
                ..Arguments::default()
            },
        }
    }

    #[tokio::test]
    async fn test_missing_samples_are_skipped() -> Result<(), PipelineError> {
        let dir = tempdir()?;
        let config = config_in(dir.path());
        let (processed, skipped) = process_samples(&config, &dir.path().join("idx")).await?;
        assert!(processed.is_empty());
        assert_eq!(skipped, vec!["MISSING1".to_string(), "MISSING2".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_existing_index_is_reused() -> Result<(), PipelineError> {
        let dir = tempdir()?;
        let config = config_in(dir.path());
        let prefix = dir.path().join("HPV_bowtie2_index");
        fs::write(dir.path().join("HPV_bowtie2_index.1.bt2"), b"")?;
        let built = ensure_bowtie2_index(&config, &dir.path().join("absent.fa"), &prefix).await?;
        assert!(!built);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_reference_without_index() -> Result<(), PipelineError> {
        let dir = tempdir()?;
        let config = config_in(dir.path());
        let err = ensure_bowtie2_index(&config, &dir.path().join("absent.fa"), &dir.path().join("idx"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_no_bams_gives_empty_matrix() -> Result<(), PipelineError> {
        let dir = tempdir()?;
        let config = config_in(dir.path());
        let matrix = aggregate_counts(&config).await?;
        assert!(matrix.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_rejects_empty_sample_list() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.args.samples.clear();
        assert!(matches!(run(&config).await, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_render_plots_skips_empty_table() -> Result<(), PipelineError> {
        let dir = tempdir()?;
        let paths = ReportPaths::new(dir.path());
        CountMatrix::new().write_tsv(&paths.condensed)?;
        assert!(render_plots(&paths, dir.path())?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_without_tools_is_tool_execution() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        config.args.tool_dir = Some("bin".to_string());
        config.args.skip_version_check = false;

        let err = run(&config).await.unwrap_err();
        assert!(matches!(err, PipelineError::ToolExecution { ref tool, .. } if tool == FASTP_TAG), "got {:?}", err);
    }


    /// Shell stand-ins for the external tools. Each appends one line per call to `calls.log`.
    #[cfg(unix)]
    mod with_stub_tools {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        const FASTP_STUB: &str = r#"
if [ "$1" = "--version" ]; then echo "fastp 0.23.4" >&2; exit 0; fi
echo fastp >> "LOG"
"#;

        const BOWTIE2_STUB: &str = r#"
if [ "$1" = "--version" ]; then echo "/usr/bin/bowtie2-align-s version 2.5.1"; exit 0; fi
echo bowtie2 >> "LOG"
"#;

        const BOWTIE2_FAILING_STUB: &str = r#"
if [ "$1" = "--version" ]; then echo "/usr/bin/bowtie2-align-s version 2.5.1"; exit 0; fi
echo bowtie2 >> "LOG"
echo "Error: reads file does not look like a FASTQ file" >&2
exit 1
"#;

        const BOWTIE2_BUILD_STUB: &str = r#"
if [ "$1" = "--version" ]; then echo "/usr/bin/bowtie2-build-s version 2.5.1"; exit 0; fi
echo bowtie2-build >> "LOG"
: > "$4.1.bt2"
"#;

        // sort -o <out> <in> leaves an empty sorted BAM for idxstats to find
        const SAMTOOLS_STUB: &str = r#"
if [ "$1" = "--version" ]; then echo "samtools 1.20"; exit 0; fi
echo "samtools $1" >> "LOG"
case "$1" in
  sort) : > "$3" ;;
  idxstats) printf 'HPV16\t7906\t12\t0\nHPV18\t7857\t3\t0\n*\t0\t0\t5\n' ;;
esac
"#;

        struct Stubs {
            dir: tempfile::TempDir,
            config: RunConfig,
        }

        impl Stubs {
            fn new(samples: &[&str], with_reads: &[&str]) -> Self {
                let dir = tempdir().unwrap();
                let mut config = config_in(dir.path());
                fs::create_dir_all(dir.path().join("bin")).unwrap();
                config.args.tool_dir = Some("bin".to_string());
                config.args.samples = samples.iter().map(|s| s.to_string()).collect();
                config.args.index_prefix = "idx/hpv".to_string();
                config.args.no_plots = true;
                for sample in with_reads {
                    let sample_dir = dir.path().join(sample);
                    fs::create_dir_all(&sample_dir).unwrap();
                    fs::write(sample_dir.join(format!("{}.fastq", sample)), b"@r1\nACGT\n+\nIIII\n").unwrap();
                }
                let stubs = Stubs { dir, config };
                stubs.install(FASTP_TAG, FASTP_STUB);
                stubs.install(BOWTIE2_TAG, BOWTIE2_STUB);
                stubs.install(SAMTOOLS_TAG, SAMTOOLS_STUB);
                stubs
            }

            fn install(&self, tool: &str, body: &str) {
                let log = self.dir.path().join("calls.log");
                let path = self.dir.path().join("bin").join(tool);
                let script = format!("#!/bin/sh{}", body.replace("LOG", &log.to_string_lossy()));
                fs::write(&path, script).unwrap();
                fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            }

            fn write_index(&self) {
                fs::create_dir_all(self.dir.path().join("idx")).unwrap();
                fs::write(self.dir.path().join("idx/hpv.1.bt2"), b"").unwrap();
            }

            fn calls(&self) -> Vec<String> {
                fs::read_to_string(self.dir.path().join("calls.log"))
                    .unwrap_or_default()
                    .lines()
                    .map(|l| l.to_string())
                    .collect()
            }
        }

        #[tokio::test]
        async fn test_steps_run_in_order_and_missing_sample_is_skipped() -> Result<(), PipelineError> {
            let stubs = Stubs::new(&["S1", "MISSING"], &["S1"]);
            let index_prefix = stubs.dir.path().join("idx/hpv");

            let (processed, skipped) = process_samples(&stubs.config, &index_prefix).await?;

            assert_eq!(processed, vec!["S1".to_string()]);
            assert_eq!(skipped, vec!["MISSING".to_string()]);
            assert_eq!(
                stubs.calls(),
                vec!["fastp", "bowtie2", "samtools view", "samtools sort", "samtools index"]
            );
            Ok(())
        }

        #[tokio::test]
        async fn test_failed_alignment_aborts_remaining_samples() {
            let stubs = Stubs::new(&["S1", "S2"], &["S1", "S2"]);
            stubs.install(BOWTIE2_TAG, BOWTIE2_FAILING_STUB);
            let index_prefix = stubs.dir.path().join("idx/hpv");

            let err = process_samples(&stubs.config, &index_prefix).await.unwrap_err();

            match err {
                PipelineError::ToolExecution { tool, error } => {
                    assert_eq!(tool, BOWTIE2_TAG);
                    assert!(error.contains("does not look like a FASTQ"), "stderr tail missing: {}", error);
                }
                other => panic!("Expected ToolExecution, got {:?}", other),
            }
            assert_eq!(stubs.calls(), vec!["fastp", "bowtie2"]);
        }

        #[tokio::test]
        async fn test_run_writes_reports_from_idxstats() -> Result<(), PipelineError> {
            let stubs = Stubs::new(&["S1", "MISSING"], &["S1"]);
            stubs.write_index();
            let mut config = stubs.config;
            config.args.skip_version_check = false;

            run(&config).await?;

            let paths = ReportPaths::new(&config.out_dir);
            let full = CountMatrix::read_tsv(&paths.full)?;
            assert_eq!(full.samples(), &["S1".to_string()]);
            assert_eq!(full.columns(), &["HPV16".to_string(), "HPV18".to_string()]);
            assert_eq!(full.get("S1", "HPV16"), 12);
            let dominant = fs::read_to_string(&paths.dominant)?;
            assert!(dominant.lines().any(|l| l.starts_with("S1\tHPV16\t12")), "{}", dominant);
            Ok(())
        }

        #[tokio::test]
        async fn test_missing_index_builds_with_bowtie2_build() -> Result<(), PipelineError> {
            let stubs = Stubs::new(&["S1"], &["S1"]);
            stubs.install(BOWTIE2_BUILD_TAG, BOWTIE2_BUILD_STUB);
            fs::write(stubs.dir.path().join("ref.fa"), b">HPV16\nACGT\n")?;
            let mut config = stubs.config;
            config.args.reference = "ref.fa".to_string();
            config.args.skip_version_check = false;

            run(&config).await?;

            let calls = fs::read_to_string(stubs.dir.path().join("calls.log"))?;
            assert_eq!(calls.lines().next(), Some("bowtie2-build"));
            assert!(stubs.dir.path().join("idx/hpv.1.bt2").exists());
            Ok(())
        }

        #[tokio::test]
        async fn test_missing_bowtie2_build_fails_before_any_sample() {
            let stubs = Stubs::new(&["S1"], &["S1"]);
            fs::write(stubs.dir.path().join("ref.fa"), b">HPV16\nACGT\n").unwrap();
            let mut config = stubs.config;
            config.args.reference = "ref.fa".to_string();
            config.args.skip_version_check = false;

            let err = run(&config).await.unwrap_err();

            assert!(
                matches!(err, PipelineError::ToolExecution { ref tool, .. } if tool == BOWTIE2_BUILD_TAG),
                "got {:?}",
                err
            );
            assert!(!stubs.dir.path().join("calls.log").exists());
        }
    }
}
