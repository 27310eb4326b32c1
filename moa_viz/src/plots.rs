use std::cmp::Ordering;
use std::path::Path;
use log::{debug, info};
use plotters::prelude::*;
use crate::embedding::EmbeddingTable;
use crate::error::VizError;

/// File name of scatter plot inside data directory.
pub const SCATTER_FILE: &str = "tsne.svg";

/// Ten categorical colors, one per actor.
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0x17, 0xbe, 0xcf),
];

const POINT_ALPHA: f64 = 0.15;

pub struct PlotSeries {
    pub data: Vec<f32>,
    pub description: String,
    pub color: RGBColor,
}

/// Range of values padded by 5% on both sides, `(-1, 1)` when there are no values.
fn padded_range<I: Iterator<Item = f64>>(values: I) -> (f64, f64){
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite(){
        return (-1.0, 1.0)
    }
    let margin = match max - min{
        span if span > 0.0 => span * 0.05,
        _ => 1.0,
    };
    (min - margin, max + margin)
}

/// Scatter plot of embedded points, one layer per actor `0..num_actors`.
pub fn plot_embedding(file: &Path, table: &EmbeddingTable, num_actors: usize) -> Result<(), Box<dyn std::error::Error>>{
    if num_actors > PALETTE.len(){
        return Err(VizError::TooManyActors {actors: num_actors, palette: PALETTE.len()}.into())
    }
    let (x_min, x_max) = padded_range(table.points().iter().map(|p| p.x));
    let (y_min, y_max) = padded_range(table.points().iter().map(|p| p.y));
    debug!("Plotting embedding in x: {x_min}..{x_max}, y: {y_min}..{y_max}");

    let root = SVGBackend::new(&file, (800, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("t-SNE", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart.configure_mesh()
        .x_desc("x-tsne")
        .y_desc("y-tsne")
        .disable_mesh().draw()?;

    for (actor, &color) in PALETTE.iter().take(num_actors).enumerate(){
        let style = color.mix(POINT_ALPHA).filled();
        chart
            .draw_series(table.with_label(actor).map(|p| Circle::new((p.x, p.y), 3, style)))?
            .label(format!("Actor {actor}"))
            .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight).margin(5)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .label_font(("sans-serif", 14))
        .draw()?;

    root.present()?;
    info!("Saved scatter plot of {} points to {}", table.len(), file.display());
    Ok(())
}

/// Line plot of series of equal length, e.g. statistics of training updates.
pub fn plot_many_series(file: &Path, title: &str, series: &[PlotSeries], x_desc: &str, y_desc: &str) -> Result<(), Box<dyn std::error::Error>>{
    let root  = SVGBackend::new(&file, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let values = || series.iter().flat_map(|s| s.data.iter().copied());
    let global_min = values().min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map(|m| m.min(0.0)).unwrap_or(0.0);
    let global_max = values().max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map(|m| m.max(0.0)).unwrap_or(0.0);
    let global_max = match global_max > global_min{
        true => global_max,
        false => global_min + 1.0,
    };
    let length = series.iter().map(|s| s.data.len()).max().unwrap_or(0).max(1);
    debug!("Plotting globals: min = {}; max = {}", global_min, global_max);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30).into_font())
        .margin(5)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0.0..length as f32, global_min..global_max)?;

    chart.configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .disable_mesh().draw()?;

    for s in series{
        chart
            .draw_series(LineSeries::new(
                s.data.iter().enumerate().map(|(x, y)| (x as f32, *y)),
                &s.color,
            ))?
            .label(s.description.as_str())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &s.color));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerLeft).margin(5)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .label_font(("sans-serif", 14))
        .draw()?;

    root.present()?;

    Ok(())
}

#[cfg(test)]
mod tests{
    use plotters::style::RGBColor;
    use moa_core::table::EmbeddedPoint;
    use crate::embedding::EmbeddingTable;
    use crate::plots::{padded_range, plot_embedding, plot_many_series, PlotSeries};

    fn temp_dir(name: &str) -> std::path::PathBuf{
        let dir = std::env::temp_dir().join(format!("moa_viz_plots_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn too_many_actors_is_error(){
        let dir = temp_dir("too_many");
        let table = EmbeddingTable::new(1, vec![EmbeddedPoint::new(0, vec![0.0], 0, 0.0, 0.0)]);
        assert!(plot_embedding(&dir.join("tsne.svg"), &table, 11).is_err());
        assert!(!dir.join("tsne.svg").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn scatter_is_written(){
        let dir = temp_dir("scatter");
        let points = (0..12).map(|i| EmbeddedPoint::new(i, vec![i as f32], i % 3, i as f64, -(i as f64))).collect();
        let table = EmbeddingTable::new(1, points);
        let file = dir.join("tsne.svg");
        plot_embedding(&file, &table, 3).unwrap();
        let svg = std::fs::read_to_string(&file).unwrap();
        assert!(svg.contains("Actor 2"));
        assert!(svg.contains("t-SNE"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn series_plot_is_written(){
        let dir = temp_dir("series");
        let file = dir.join("returns.svg");
        plot_many_series(&file, "returns", &[PlotSeries{
            data: vec![1.0, 5.0, 3.0],
            description: "mean return".into(),
            color: RGBColor(0, 0, 255),
        }], "update", "return").unwrap();
        assert!(file.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn range_padding(){
        assert_eq!(padded_range(std::iter::empty()), (-1.0, 1.0));
        assert_eq!(padded_range([2.0].into_iter()), (1.0, 3.0));
        let (lo, hi) = padded_range([0.0, 10.0].into_iter());
        assert!((lo + 0.5).abs() < 1e-12 && (hi - 10.5).abs() < 1e-12);
    }
}
