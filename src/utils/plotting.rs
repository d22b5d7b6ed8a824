use anyhow::{anyhow, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

use crate::utils::counts::CountMatrix;

// Anchor colours of matplotlib's viridis at 0, .25, .5, .75, 1
const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

const BAR_HALF_WIDTH: f64 = 0.35;

// Heatmap canvas is split into the cell grid and a colour bar this wide
const HEATMAP_SIZE: (u32, u32) = (1200, 600);
const COLORBAR_WIDTH: u32 = 130;
const COLORBAR_STEPS: usize = 64;

/// Linear interpolation along VIRIDIS for `t` in [0, 1].
pub fn viridis(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f64;
    let idx = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - idx as f64;
    let (r0, g0, b0) = VIRIDIS[idx];
    let (r1, g1, b1) = VIRIDIS[idx + 1];
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    RGBColor(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}


/// Colour bar bands as (low, high, colour), covering 0..=max_count bottom to top.
pub fn colorbar_bands(max_count: u64, steps: usize) -> Vec<(f64, f64, RGBColor)> {
    let steps = steps.max(1);
    let max = max_count.max(1) as f64;
    let last = (steps - 1).max(1) as f64;
    (0..steps)
        .map(|i| {
            let low = max * i as f64 / steps as f64;
            let high = max * (i + 1) as f64 / steps as f64;
            (low, high, viridis(i as f64 / last))
        })
        .collect()
}


/// Stacked segments of one bar as (reference index, bottom, top), zero-height layers skipped.
pub fn stack_segments(row: &[u64]) -> Vec<(usize, u64, u64)> {
    let mut bottom = 0;
    let mut segments = Vec::new();
    for (idx, &count) in row.iter().enumerate() {
        if count == 0 {
            continue;
        }
        segments.push((idx, bottom, bottom + count));
        bottom += count;
    }
    segments
}


/// Stacked bar chart: one bar per sample, highest total first, one layer per reference.
pub fn plot_stacked_bars(counts: &CountMatrix, output_path: &Path) -> Result<()> {
    if counts.is_empty() || counts.columns().is_empty() {
        return Err(anyhow!("No genotype counts available for plotting"));
    }

    let order = counts.samples_by_total_desc();
    let n = order.len();
    let max_total = order.iter().map(|&i| counts.sample_total(i)).max().unwrap_or(1).max(1);

    let root = BitMapBackend::new(output_path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("HPV Genotype Abundance per Sample (Stacked Bar)", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..(max_total as f64 * 1.1))?;

    chart.configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .y_desc("Mapped Reads")
        .y_label_formatter(&|y| format!("{:.0}", y))
        .draw()?;

    for (col_idx, reference) in counts.columns().iter().enumerate() {
        let color = Palette99::pick(col_idx).to_rgba();
        let mut bars = Vec::new();
        for (pos, &row_idx) in order.iter().enumerate() {
            let row = counts.row(row_idx);
            if let Some(&(_, bottom, top)) = stack_segments(&row).iter().find(|s| s.0 == col_idx) {
                let x = pos as f64;
                bars.push([(x - BAR_HALF_WIDTH, bottom as f64), (x + BAR_HALF_WIDTH, top as f64)]);
            }
        }
        chart.draw_series(bars.iter().map(|corners| Rectangle::new(*corners, color.filled())))?
            .label(reference.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        chart.draw_series(bars.iter().map(|corners| Rectangle::new(*corners, BLACK.stroke_width(1))))?;
    }

    chart.configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    let label_style = ("sans-serif", 13).into_font().color(&BLACK).pos(Pos::new(HPos::Center, VPos::Top));
    for (pos, &row_idx) in order.iter().enumerate() {
        let (px, py) = chart.backend_coord(&(pos as f64, 0.0));
        root.draw(&Text::new(counts.samples()[row_idx].clone(), (px, py + 8), label_style.clone()))?;
    }

    root.present()?;
    Ok(())
}


/// Heatmap of raw counts: references down, samples across, each cell annotated,
/// with a "Read Count" colour bar on the right.
pub fn plot_heatmap(counts: &CountMatrix, output_path: &Path) -> Result<()> {
    if counts.is_empty() || counts.columns().is_empty() {
        return Err(anyhow!("No genotype counts available for plotting"));
    }

    let samples = counts.samples();
    let references = counts.columns();
    let n_samples = samples.len() as f64;
    let n_refs = references.len() as f64;
    let max_count = (0..samples.len())
        .flat_map(|i| counts.row(i))
        .max()
        .unwrap_or(0)
        .max(1);

    let root = BitMapBackend::new(output_path, HEATMAP_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let (grid_area, bar_area) = root.split_horizontally(HEATMAP_SIZE.0 - COLORBAR_WIDTH);

    let mut chart = ChartBuilder::on(&grid_area)
        .caption("HPV Genotype Read Count Heatmap", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(140)
        .build_cartesian_2d(0f64..n_samples, 0f64..n_refs)?;

    chart.configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .y_labels(0)
        .x_desc("Sample")
        .y_desc("HPV Genotype")
        .draw()?;

    // Row 0 (first reference) is drawn at the top
    let mut cells = Vec::with_capacity(samples.len() * references.len());
    for (x, sample) in samples.iter().enumerate() {
        for (r, reference) in references.iter().enumerate() {
            let y = references.len() - 1 - r;
            cells.push((x as f64, y as f64, counts.get(sample, reference)));
        }
    }

    chart.draw_series(cells.iter().map(|&(x, y, count)| {
        let fill = viridis(count as f64 / max_count as f64);
        Rectangle::new([(x, y), (x + 1.0, y + 1.0)], fill.filled())
    }))?;

    let anchor = Pos::new(HPos::Center, VPos::Center);
    chart.draw_series(cells.iter().map(|&(x, y, count)| {
        let ink = if (count as f64 / max_count as f64) < 0.6 { WHITE } else { BLACK };
        Text::new(
            count.to_string(),
            (x + 0.5, y + 0.5),
            ("sans-serif", 14).into_font().color(&ink).pos(anchor),
        )
    }))?;

    let x_style = ("sans-serif", 13).into_font().color(&BLACK).pos(Pos::new(HPos::Center, VPos::Top));
    for (x, sample) in samples.iter().enumerate() {
        let (px, py) = chart.backend_coord(&(x as f64 + 0.5, 0.0));
        root.draw(&Text::new(sample.clone(), (px, py + 8), x_style.clone()))?;
    }
    let y_style = ("sans-serif", 13).into_font().color(&BLACK).pos(Pos::new(HPos::Right, VPos::Center));
    for (r, reference) in references.iter().enumerate() {
        let y = (references.len() - 1 - r) as f64 + 0.5;
        let (px, py) = chart.backend_coord(&(0.0, y));
        root.draw(&Text::new(reference.clone(), (px - 8, py), y_style.clone()))?;
    }

    let mut colorbar = ChartBuilder::on(&bar_area)
        .margin_top(40)
        .margin_bottom(70)
        .margin_left(5)
        .margin_right(10)
        .right_y_label_area_size(70)
        .build_cartesian_2d(0f64..1f64, 0f64..max_count as f64)?;

    colorbar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .x_labels(0)
        .y_desc("Read Count")
        .y_label_formatter(&|y| format!("{:.0}", y))
        .draw()?;

    colorbar.draw_series(
        colorbar_bands(max_count, COLORBAR_STEPS)
            .into_iter()
            .map(|(low, high, fill)| Rectangle::new([(0.0, low), (1.0, high)], fill.filled())),
    )?;
    colorbar.draw_series(std::iter::once(Rectangle::new(
        [(0.0, 0.0), (1.0, max_count as f64)],
        BLACK.stroke_width(1),
    )))?;

    root.present()?;
    Ok(())
}
