/// Sample x reference mapped-read count table
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::defs::PipelineError;


/// Mapped-read counts keyed by sample then reference.
///
/// Row order is insertion order. Column order is the order in which references
/// were first seen across inserted rows. Absent cells read as 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountMatrix {
    samples: Vec<String>,
    columns: Vec<String>,
    rows: Vec<HashMap<String, u64>>,
}

/// Highest-count reference of one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DominantType {
    pub sample: String,
    /// None only when the matrix has no columns.
    pub reference: Option<String>,
    pub reads: u64,
}

impl CountMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a sample row. Unseen references are appended as columns.
    pub fn insert_sample<I, S>(&mut self, sample: &str, counts: I)
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut row = HashMap::new();
        for (reference, count) in counts {
            let reference = reference.into();
            if !self.columns.contains(&reference) {
                self.columns.push(reference.clone());
            }
            row.insert(reference, count);
        }
        match self.samples.iter().position(|s| s == sample) {
            Some(idx) => self.rows[idx] = row,
            None => {
                self.samples.push(sample.to_string());
                self.rows.push(row);
            }
        }
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, sample: &str, reference: &str) -> u64 {
        self.samples
            .iter()
            .position(|s| s == sample)
            .map(|idx| self.cell(idx, reference))
            .unwrap_or(0)
    }

    fn cell(&self, row_idx: usize, reference: &str) -> u64 {
        self.rows[row_idx].get(reference).copied().unwrap_or(0)
    }

    /// Counts of row `row_idx` in column order.
    pub fn row(&self, row_idx: usize) -> Vec<u64> {
        self.columns.iter().map(|c| self.cell(row_idx, c)).collect()
    }

    pub fn sample_total(&self, row_idx: usize) -> u64 {
        self.row(row_idx).iter().sum()
    }

    pub fn column_total(&self, reference: &str) -> u64 {
        (0..self.samples.len()).map(|i| self.cell(i, reference)).sum()
    }

    /// Copy without the columns that are zero in every row.
    pub fn condensed(&self) -> CountMatrix {
        let kept: Vec<String> = self
            .columns
            .iter()
            .filter(|c| (0..self.samples.len()).any(|i| self.cell(i, c) != 0))
            .cloned()
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|(reference, _)| kept.contains(reference))
                    .map(|(reference, count)| (reference.clone(), *count))
                    .collect::<HashMap<String, u64>>()
            })
            .collect();
        CountMatrix {
            samples: self.samples.clone(),
            columns: kept,
            rows,
        }
    }

    /// Per-sample maximum. Equal counts resolve to the earliest column.
    pub fn dominant_types(&self) -> Vec<DominantType> {
        (0..self.samples.len())
            .map(|i| {
                let mut best: Option<(&String, u64)> = None;
                for column in &self.columns {
                    let count = self.cell(i, column);
                    if best.map_or(true, |(_, b)| count > b) {
                        best = Some((column, count));
                    }
                }
                DominantType {
                    sample: self.samples[i].clone(),
                    reference: best.map(|(c, _)| c.clone()),
                    reads: best.map(|(_, n)| n).unwrap_or(0),
                }
            })
            .collect()
    }

    /// Row indices ordered by descending total; equal totals keep row order.
    pub fn samples_by_total_desc(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        order.sort_by(|&a, &b| self.sample_total(b).cmp(&self.sample_total(a)));
        order
    }

    /// Writes a TSV whose header is an empty index cell followed by the columns.
    pub fn write_tsv(&self, path: &Path) -> Result<(), PipelineError> {
        let file = File::create(path)
            .map_err(|e| PipelineError::IOError(format!("Failed to create {}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), PipelineError> {
        let mut header = String::new();
        for column in &self.columns {
            header.push('\t');
            header.push_str(column);
        }
        writeln!(writer, "{}", header)?;
        for (i, sample) in self.samples.iter().enumerate() {
            let values: Vec<String> = self.row(i).iter().map(|v| v.to_string()).collect();
            if values.is_empty() {
                writeln!(writer, "{}", sample)?;
            } else {
                writeln!(writer, "{}\t{}", sample, values.join("\t"))?;
            }
        }
        Ok(())
    }

    /// Reads a table written by write_tsv.
    pub fn read_tsv(path: &Path) -> Result<CountMatrix, PipelineError> {
        let file = File::open(path)
            .map_err(|e| PipelineError::IOError(format!("Failed to open {}: {}", path.display(), e)))?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(line) => line?,
            None => return Ok(CountMatrix::new()),
        };
        let columns: Vec<String> = header.split('\t').skip(1).map(|c| c.to_string()).collect();

        let mut matrix = CountMatrix::new();
        matrix.columns = columns.clone();
        for (line_no, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let sample = fields.next().unwrap_or_default().to_string();
            let values: Vec<&str> = fields.collect();
            if values.len() != columns.len() {
                return Err(PipelineError::IOError(format!(
                    "{} line {}: expected {} counts, found {}",
                    path.display(),
                    line_no + 2,
                    columns.len(),
                    values.len()
                )));
            }
            let mut row = Vec::with_capacity(values.len());
            for (column, value) in columns.iter().zip(values) {
                let count: u64 = value.trim().parse().map_err(|e| {
                    PipelineError::IOError(format!(
                        "{} line {}: invalid count '{}' for {}: {}",
                        path.display(),
                        line_no + 2,
                        value,
                        column,
                        e
                    ))
                })?;
                row.push((column.clone(), count));
            }
            matrix.insert_sample(&sample, row);
        }
        Ok(matrix)
    }
}
