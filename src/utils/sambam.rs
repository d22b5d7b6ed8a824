use std::path::Path;

use crate::config::defs::{PipelineError, RunConfig, SamtoolsSubcommand, IDXSTATS_UNPLACED, SAMTOOLS_TAG};
use crate::utils::command::generate_cli;
use crate::utils::command::samtools::SamtoolsConfig;
use crate::utils::streams::run_tool_capture;


/// Parses `samtools idxstats` output into (reference, mapped reads).
///
/// Each line must be exactly: name, length, mapped, unmapped (tab-separated).
/// The `*` line for unplaced reads is not a reference and is dropped, so the
/// full report has no `*` column. Its mapped count is always 0; its unmapped
/// count is not reported anywhere.
///
/// # Arguments
///
/// * `lines` - stdout lines of idxstats.
///
/// # Returns
/// Vec of (reference name, mapped count) in the order reported.
pub fn parse_idxstats(lines: &[String]) -> Result<Vec<(String, u64)>, PipelineError> {
    let mut counts = Vec::with_capacity(lines.len());
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 4 {
            return Err(PipelineError::ToolOutput {
                tool: SAMTOOLS_TAG.to_string(),
                error: format!(
                    "Invalid idxstats line: expected 4 fields, found {} in line: '{}'",
                    fields.len(),
                    line
                ),
            });
        }
        if fields[0] == IDXSTATS_UNPLACED {
            continue;
        }
        let mapped: u64 = fields[2].trim().parse().map_err(|e| PipelineError::ToolOutput {
            tool: SAMTOOLS_TAG.to_string(),
            error: format!("Invalid mapped count '{}' for {}: {}", fields[2], fields[0], e),
        })?;
        counts.push((fields[0].to_string(), mapped));
    }
    Ok(counts)
}


/// Runs `samtools idxstats` on an indexed BAM and parses the result.
pub async fn idxstats(config: &RunConfig, bam: &Path) -> Result<Vec<(String, u64)>, PipelineError> {
    let idxstats_config = SamtoolsConfig {
        subcommand: SamtoolsSubcommand::Idxstats,
        subcommand_fields: Vec::new(),
        positional: vec![bam.to_string_lossy().to_string()],
    };
    let args = generate_cli(SAMTOOLS_TAG, config, Some(&idxstats_config))?;
    let lines = run_tool_capture(SAMTOOLS_TAG, &config.program(SAMTOOLS_TAG), &args, &format!("idxstats {}", bam.display())).await?;
    parse_idxstats(&lines)
}
