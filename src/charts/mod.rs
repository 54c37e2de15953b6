pub mod theme;

use std::error::Error;

use plotters::{
    prelude::{BitMapBackend, IntoDrawingArea, SeriesLabelPosition},
    series::{AreaSeries, LineSeries},
    style::{Color, ShapeStyle},
};

use crate::constants::files::CHART_IMAGE_FORMAT;
use crate::history::EpisodeHistory;
use crate::types::Data;
use crate::utils::create_folder_if_not_exists;

type ChartResult = Result<(), Box<dyn Error>>;

fn padded_range<'a>(values: impl Iterator<Item = &'a f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if min > max {
        return None;
    }
    let range = (max - min).max(0.01);
    Some((min - range * 0.05, max + range * 0.05))
}

/// Trailing mean over `window` points, NaN until the first window fills
fn trailing_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return values.to_vec();
    }
    let mut means = vec![f64::NAN; window - 1];
    means.extend(
        values
            .windows(window)
            .map(|points| points.iter().sum::<f64>() / window as f64),
    );
    means
}

/// Portfolio value as an area, the equal-weight benchmark and a moving
/// average of the value as lines.
pub fn value_chart(dir: &str, name: &str, values: &Data, benchmark: &Data) -> ChartResult {
    let Some((y_min, y_max)) = padded_range(values.iter().chain(benchmark.iter())) else {
        return Ok(());
    };

    let path = format!("{dir}/{name}.{CHART_IMAGE_FORMAT}");
    let root = BitMapBackend::new(path.as_str(), (2560, 800)).into_drawing_area();
    root.fill(&theme::BASE)?;

    let x_max = values.len().max(benchmark.len()) as u32;
    let mut chart = plotters::chart::ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 20, &theme::TEXT))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .label_style(("sans-serif", 15, &theme::TEXT))
        .axis_style(&theme::SURFACE1)
        .light_line_style(&theme::SURFACE0)
        .x_desc("step")
        .draw()?;

    chart
        .draw_series(
            AreaSeries::new(
                values.iter().enumerate().map(|(step, value)| (step as u32, *value)),
                y_min,
                theme::BLUE.mix(0.2),
            )
            .border_style(ShapeStyle::from(&theme::BLUE).stroke_width(1)),
        )?
        .label("portfolio")
        .legend(|(x, y)| {
            plotters::element::Rectangle::new([(x, y - 5), (x + 20, y + 5)], theme::BLUE.mix(0.8).filled())
        });

    chart
        .draw_series(LineSeries::new(
            benchmark.iter().enumerate().map(|(step, value)| (step as u32, *value)),
            ShapeStyle::from(&theme::PEACH).stroke_width(1),
        ))?
        .label("equal weight")
        .legend(|(x, y)| {
            plotters::element::Rectangle::new([(x, y - 5), (x + 20, y + 5)], theme::PEACH.mix(0.8).filled())
        });

    let window = (values.len() / 10).clamp(5, 50);
    let ma = trailing_mean(values, window);
    chart
        .draw_series(LineSeries::new(
            ma.iter()
                .enumerate()
                .filter(|(_, v)| !v.is_nan())
                .map(|(step, v)| (step as u32, *v)),
            ShapeStyle::from(&theme::YELLOW).stroke_width(1),
        ))?
        .label("MA")
        .legend(|(x, y)| {
            plotters::element::Rectangle::new([(x, y - 5), (x + 20, y + 5)], theme::YELLOW.mix(0.8).filled())
        });

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(theme::SURFACE0.mix(0.7))
        .border_style(&theme::SURFACE1)
        .label_font(("sans-serif", 14, &theme::TEXT))
        .draw()?;

    root.present()?;
    Ok(())
}

/// One line per asset weight over the episode
pub fn weights_chart(dir: &str, name: &str, weights: &[Vec<f64>]) -> ChartResult {
    let num_assets = weights.first().map_or(0, Vec::len);
    if num_assets == 0 {
        return Ok(());
    }

    let path = format!("{dir}/{name}.{CHART_IMAGE_FORMAT}");
    let root = BitMapBackend::new(path.as_str(), (2560, 600)).into_drawing_area();
    root.fill(&theme::BASE)?;

    let mut chart = plotters::chart::ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 20, &theme::TEXT))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0..weights.len() as u32, 0.0..1.0)?;

    chart
        .configure_mesh()
        .label_style(("sans-serif", 15, &theme::TEXT))
        .axis_style(&theme::SURFACE1)
        .light_line_style(&theme::SURFACE0)
        .x_desc("step")
        .y_desc("weight")
        .draw()?;

    for asset in 0..num_assets {
        let color = theme::SERIES[asset % theme::SERIES.len()].mix(0.8);
        chart
            .draw_series(LineSeries::new(
                weights
                    .iter()
                    .enumerate()
                    .map(|(step, w)| (step as u32, w.get(asset).copied().unwrap_or(0.0))),
                ShapeStyle::from(&color).stroke_width(1),
            ))?
            .label(format!("asset {asset}"))
            .legend(move |(x, y)| {
                plotters::element::Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled())
            });
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(theme::SURFACE0.mix(0.7))
        .border_style(&theme::SURFACE1)
        .label_font(("sans-serif", 14, &theme::TEXT))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Writes `value` and `weights` charts into `{dir}/{episode}`
pub fn episode_charts(dir: &str, episode: usize, history: &EpisodeHistory, benchmark: &Data) -> ChartResult {
    let episode_dir = format!("{dir}/{episode}");
    create_folder_if_not_exists(&episode_dir)?;

    value_chart(&episode_dir, "value", &history.values, benchmark)?;
    weights_chart(&episode_dir, "weights", &history.weights)
}
