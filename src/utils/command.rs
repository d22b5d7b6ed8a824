/// Functions and structs for building external tool command lines
use std::any::Any;

use anyhow::{anyhow, Result};
use log::{info, warn};

use crate::config::defs::{PipelineError, RunConfig, BOWTIE2_BUILD_TAG, BOWTIE2_TAG, FASTP_TAG, SAMTOOLS_TAG, TOOL_VERSIONS};
use crate::utils::streams::run_tool_output;


pub mod fastp {
    use std::path::PathBuf;
    use crate::config::defs::{PipelineError, RunConfig};

    #[derive(Debug, Clone)]
    pub struct FastpConfig {
        pub input: PathBuf,
        pub output: PathBuf,
        pub html_report: PathBuf,
        pub json_report: PathBuf,
    }

    pub async fn fastp_presence_check(config: &RunConfig) -> Result<String, PipelineError> {
        // fastp reports its version on stderr
        super::presence_check(config, super::FASTP_TAG, "--version", 1).await
    }

    pub fn arg_generator(config: &RunConfig, fastp_config: &FastpConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-i".to_string());
        args_vec.push(fastp_config.input.to_string_lossy().to_string());
        args_vec.push("-o".to_string());
        args_vec.push(fastp_config.output.to_string_lossy().to_string());
        args_vec.push("-q".to_string());
        args_vec.push(config.args.quality.to_string());
        args_vec.push("-u".to_string());
        args_vec.push(config.args.unqualified_percent.to_string());
        args_vec.push("-l".to_string());
        args_vec.push(config.args.min_length.to_string());
        args_vec.push("--thread".to_string());
        args_vec.push(config.args.threads.to_string());
        args_vec.push("-h".to_string());
        args_vec.push(fastp_config.html_report.to_string_lossy().to_string());
        args_vec.push("-j".to_string());
        args_vec.push(fastp_config.json_report.to_string_lossy().to_string());
        args_vec
    }
}

pub mod bowtie2 {
    use std::path::{Path, PathBuf};
    use crate::config::defs::{PipelineError, RunConfig, BT2_INDEX_SENTINEL_EXT};

    #[derive(Debug, Clone)]
    pub struct Bowtie2Config {
        pub bt2_index_path: PathBuf,
        pub reads: PathBuf,
        pub sam_out: PathBuf,
    }

    #[derive(Debug, Clone)]
    pub struct Bowtie2BuildConfig {
        pub reference: PathBuf,
        pub bt2_index_path: PathBuf,
    }

    pub async fn bowtie2_presence_check(config: &RunConfig) -> Result<String, PipelineError> {
        // "/usr/bin/bowtie2-align-s version 2.5.1"
        super::presence_check(config, super::BOWTIE2_TAG, "--version", 2).await
    }

    pub async fn bowtie2_build_presence_check(config: &RunConfig) -> Result<String, PipelineError> {
        // "/usr/bin/bowtie2-build-s version 2.5.1"
        super::presence_check(config, super::BOWTIE2_BUILD_TAG, "--version", 2).await
    }

    /// First file bowtie2-build writes for `prefix`; its presence marks a usable index.
    pub fn index_sentinel(prefix: &Path) -> PathBuf {
        let mut name = prefix.as_os_str().to_os_string();
        name.push(BT2_INDEX_SENTINEL_EXT);
        PathBuf::from(name)
    }

    pub fn arg_generator(config: &RunConfig, bt2_config: &Bowtie2Config) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-x".to_string());
        args_vec.push(bt2_config.bt2_index_path.to_string_lossy().to_string());
        args_vec.push("-U".to_string());
        args_vec.push(bt2_config.reads.to_string_lossy().to_string());
        args_vec.push("-p".to_string());
        args_vec.push(config.args.threads.to_string());
        args_vec.push("-S".to_string());
        args_vec.push(bt2_config.sam_out.to_string_lossy().to_string());
        args_vec
    }

    pub fn build_arg_generator(config: &RunConfig, build_config: &Bowtie2BuildConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("--threads".to_string());
        args_vec.push(config.args.threads.to_string());
        args_vec.push(build_config.reference.to_string_lossy().to_string());
        args_vec.push(build_config.bt2_index_path.to_string_lossy().to_string());
        args_vec
    }
}

pub mod samtools {
    use crate::config::defs::{PipelineError, RunConfig, SamtoolsSubcommand};

    /// Options are emitted in order, flags before positionals.
    #[derive(Debug, Clone)]
    pub struct SamtoolsConfig {
        pub subcommand: SamtoolsSubcommand,
        pub subcommand_fields: Vec<(String, Option<String>)>,
        pub positional: Vec<String>,
    }

    pub async fn samtools_presence_check(config: &RunConfig) -> Result<String, PipelineError> {
        // "samtools 1.20"
        super::presence_check(config, super::SAMTOOLS_TAG, "--version", 1).await
    }

    pub fn arg_generator(samtools_config: &SamtoolsConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push(samtools_config.subcommand.as_str().to_string());
        for (flag, value) in &samtools_config.subcommand_fields {
            args_vec.push(flag.clone());
            if let Some(v) = value {
                args_vec.push(v.clone());
            }
        }
        args_vec.extend(samtools_config.positional.iter().cloned());
        args_vec
    }
}


/// Builds the argument vector for `tool`.
///
/// # Arguments
///
/// * `tool` - One of the *_TAG constants.
/// * `config` - RunConfig, for shared parameters such as threads.
/// * `tool_config` - The tool's own config struct (FastpConfig, Bowtie2Config, ...).
///
/// # Returns
/// Vec of arguments, not including the executable.
pub fn generate_cli(tool: &str, config: &RunConfig, tool_config: Option<&dyn Any>) -> Result<Vec<String>> {
    let tool_config = tool_config.ok_or_else(|| anyhow!("{} requires a tool config", tool))?;

    let cmd = match tool {
        FASTP_TAG => {
            let cfg = tool_config
                .downcast_ref::<fastp::FastpConfig>()
                .ok_or_else(|| anyhow!("{} requires FastpConfig", tool))?;
            fastp::arg_generator(config, cfg)
        }
        BOWTIE2_TAG => {
            let cfg = tool_config
                .downcast_ref::<bowtie2::Bowtie2Config>()
                .ok_or_else(|| anyhow!("{} requires Bowtie2Config", tool))?;
            bowtie2::arg_generator(config, cfg)
        }
        BOWTIE2_BUILD_TAG => {
            let cfg = tool_config
                .downcast_ref::<bowtie2::Bowtie2BuildConfig>()
                .ok_or_else(|| anyhow!("{} requires Bowtie2BuildConfig", tool))?;
            bowtie2::build_arg_generator(config, cfg)
        }
        SAMTOOLS_TAG => {
            let cfg = tool_config
                .downcast_ref::<samtools::SamtoolsConfig>()
                .ok_or_else(|| anyhow!("{} requires SamtoolsConfig", tool))?;
            samtools::arg_generator(cfg)
        }
        _ => return Err(anyhow!("Unknown tool: {}", tool)),
    };

    Ok(cmd)
}


/// Runs `<tool> <flag>` and pulls the version token from the first line printed
/// on stdout, or on stderr if stdout was empty.
///
/// A tool that cannot be spawned or exits non-zero is a ToolExecution error;
/// output without a version token is a ToolOutput error.
async fn presence_check(config: &RunConfig, tool: &str, flag: &str, token_index: usize) -> Result<String, PipelineError> {
    let (stdout_lines, stderr_lines) = run_tool_output(tool, &config.program(tool), &[flag.to_string()]).await?;
    version_token(tool, flag, &stdout_lines, &stderr_lines, token_index)
}


fn version_token(tool: &str, flag: &str, stdout_lines: &[String], stderr_lines: &[String], token_index: usize) -> Result<String, PipelineError> {
    let output_err = |error: String| PipelineError::ToolOutput {
        tool: tool.to_string(),
        error,
    };

    let first_line = stdout_lines
        .iter()
        .chain(stderr_lines.iter())
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| output_err(format!("No output from {} {}", tool, flag)))?;
    let version = first_line
        .split_whitespace()
        .nth(token_index)
        .ok_or_else(|| output_err(format!("Invalid {} {} output: {}", tool, flag, first_line)))?
        .to_string();
    Ok(version)
}


/// Parses the leading "major.minor" of a version string such as "2.5.1" or "v0.23.4".
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim_start_matches('v').split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()
        .map(|m| m.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
        .and_then(|m| m.parse().ok())
        .unwrap_or(0);
    Some((major, minor))
}


pub async fn check_version(config: &RunConfig, tool: &str) -> Result<String, PipelineError> {
    match tool {
        FASTP_TAG => fastp::fastp_presence_check(config).await,
        BOWTIE2_TAG => bowtie2::bowtie2_presence_check(config).await,
        BOWTIE2_BUILD_TAG => bowtie2::bowtie2_build_presence_check(config).await,
        SAMTOOLS_TAG => samtools::samtools_presence_check(config).await,
        _ => Err(PipelineError::InvalidConfig(format!("Unknown tool: {}", tool))),
    }
}


/// Confirms every tool runs. Versions older than TOOL_VERSIONS are only warned about.
pub async fn check_versions(config: &RunConfig, tools: Vec<&str>) -> Result<(), PipelineError> {
    for tool in tools {
        let version = check_version(config, tool).await?;
        info!("{} version {}", tool, version);
        match (parse_version(&version), TOOL_VERSIONS.get(tool)) {
            (Some(found), Some(&minimum)) if found < minimum => {
                warn!("{} {} is older than the tested minimum {}.{}", tool, version, minimum.0, minimum.1);
            }
            (None, _) => warn!("Could not parse {} version '{}'", tool, version),
            _ => {}
        }
    }
    Ok(())
}
