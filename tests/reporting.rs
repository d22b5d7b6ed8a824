use std::fs;

use anyhow::Result;
use hpv_genotyping::utils::counts::CountMatrix;
use hpv_genotyping::utils::report::write_reports;
use hpv_genotyping::utils::sambam::parse_idxstats;
use tempfile::tempdir;


fn idxstats_lines(text: &str) -> Vec<String> {
    text.lines().map(|l| l.to_string()).collect()
}

/// Matrix as the aggregator would build it from three idxstats runs.
fn aggregated() -> Result<CountMatrix> {
    let runs = [
        ("SRR1186008", "HPV6\t8012\t0\t0\nHPV16\t7906\t1200\t3\nHPV18\t7857\t40\t0\n*\t0\t0\t900\n"),
        ("SRR1186009", "HPV6\t8012\t0\t0\nHPV16\t7906\t0\t0\nHPV18\t7857\t310\t1\n*\t0\t0\t12\n"),
        ("SRR1186010", "HPV6\t8012\t0\t0\nHPV16\t7906\t75\t0\nHPV18\t7857\t75\t0\n*\t0\t0\t4\n"),
    ];
    let mut matrix = CountMatrix::new();
    for (sample, out) in runs {
        matrix.insert_sample(sample, parse_idxstats(&idxstats_lines(out))?);
    }
    Ok(matrix)
}

#[test]
fn test_condensed_agrees_with_full() -> Result<()> {
    let full = aggregated()?;
    let condensed = full.condensed();

    assert_eq!(full.columns(), &["HPV6".to_string(), "HPV16".to_string(), "HPV18".to_string()]);
    assert_eq!(condensed.columns(), &["HPV16".to_string(), "HPV18".to_string()]);
    for column in condensed.columns() {
        assert!(condensed.column_total(column) > 0, "{} is all-zero", column);
        for sample in full.samples() {
            assert_eq!(condensed.get(sample, column), full.get(sample, column));
        }
    }
    for column in full.columns() {
        if full.column_total(column) > 0 {
            assert!(condensed.columns().contains(column));
        }
    }
    Ok(())
}

#[test]
fn test_dominant_matches_row_maximum() -> Result<()> {
    let full = aggregated()?;
    for (i, dominant) in full.dominant_types().iter().enumerate() {
        let row = full.row(i);
        let max = *row.iter().max().unwrap();
        assert_eq!(dominant.reads, max);
        let first_max = row.iter().position(|&v| v == max).unwrap();
        assert_eq!(dominant.reference.as_deref(), Some(full.columns()[first_max].as_str()));
    }
    // 75/75 tie goes to the earlier column
    assert_eq!(full.dominant_types()[2].reference.as_deref(), Some("HPV16"));
    Ok(())
}

#[test]
fn test_reports_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let full = aggregated()?;
    let (paths, _) = write_reports(dir.path(), &full)?;

    let reread = CountMatrix::read_tsv(&paths.condensed)?;
    let condensed = full.condensed();
    assert_eq!(reread.samples(), condensed.samples());
    assert_eq!(reread.columns(), condensed.columns());
    for (i, _) in condensed.samples().iter().enumerate() {
        assert_eq!(reread.row(i), condensed.row(i));
    }

    let reread_full = CountMatrix::read_tsv(&paths.full)?;
    assert_eq!(reread_full.columns(), full.columns());

    let summary = fs::read_to_string(&paths.summary)?;
    assert!(summary.contains("Total samples processed: 3"));
    assert!(summary.contains("  - HPV16: 1275 mapped reads"));
    assert!(summary.contains("  - HPV18: 425 mapped reads"));
    assert!(!summary.contains("HPV6:"));
    assert!(summary.contains("  - SRR1186009: HPV18 (310 reads)"));

    let dominant = fs::read_to_string(&paths.dominant)?;
    assert_eq!(
        dominant,
        "\tDominant_HPV_Type\tMapped_Reads\nSRR1186008\tHPV16\t1200\nSRR1186009\tHPV18\t310\nSRR1186010\tHPV16\t75\n"
    );
    Ok(())
}

#[test]
fn test_two_sample_two_type_scenario() -> Result<()> {
    let mut matrix = CountMatrix::new();
    matrix.insert_sample("S1", [("HPV16", 100), ("HPV18", 0)]);
    matrix.insert_sample("S2", [("HPV16", 0), ("HPV18", 50)]);

    assert_eq!(matrix.condensed().columns().len(), 2);
    let calls: Vec<String> = matrix
        .dominant_types()
        .iter()
        .map(|d| format!("{}: {} ({})", d.sample, d.reference.as_deref().unwrap_or("NA"), d.reads))
        .collect();
    assert_eq!(calls, vec!["S1: HPV16 (100)", "S2: HPV18 (50)"]);
    Ok(())
}
