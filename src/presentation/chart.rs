//! SVG charts: time series, temperature bands, wind roses, correlation
//! matrices, seasonal comparisons and stacked multi-metric panels

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use plotters::coord::Shift;
use plotters::coord::types::RangedDateTime;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::indices::temperature_variable;
use crate::analysis::{correlation, seasonal_statistics};
use crate::models::{Variable, WeatherRecord};
use crate::{Result, WeatherError};

const CHART_SIZE: (u32, u32) = (1024, 576);
const ROSE_SIZE: (u32, u32) = (720, 720);
const PANEL_HEIGHT: u32 = 240;

/// Compass sectors of a wind rose
pub const ROSE_SECTORS: usize = 16;

const TEMPERATURE_LINES: [(Variable, RGBColor); 4] = [
    (Variable::TemperatureMax, RGBColor(214, 39, 40)),
    (Variable::TemperatureMean, RGBColor(255, 127, 14)),
    (Variable::TemperatureMin, RGBColor(31, 119, 180)),
    (Variable::Temperature, RGBColor(148, 103, 189)),
];

const CORRELATION_CANDIDATES: [Variable; 8] = [
    Variable::Temperature,
    Variable::TemperatureMax,
    Variable::TemperatureMin,
    Variable::TemperatureMean,
    Variable::Precipitation,
    Variable::Humidity,
    Variable::WindSpeed,
    Variable::Pressure,
];

const COMPASS: [&str; 4] = ["N", "E", "S", "W"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// One variable over time
    Series,
    /// Max, mean and min temperature lines
    Temperature,
    /// Direction frequency per compass sector
    WindRose,
    /// Pairwise correlation matrix
    Correlation,
    /// Per-season mean with min/max range
    Seasonal,
    /// One panel per variable sharing the time axis
    MultiMetric,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChartKind::Series => "series",
            ChartKind::Temperature => "temperature",
            ChartKind::WindRose => "wind_rose",
            ChartKind::Correlation => "correlation",
            ChartKind::Seasonal => "seasonal",
            ChartKind::MultiMetric => "multi_metric",
        })
    }
}

impl FromStr for ChartKind {
    type Err = WeatherError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "series" => Ok(ChartKind::Series),
            "temperature" => Ok(ChartKind::Temperature),
            "wind_rose" => Ok(ChartKind::WindRose),
            "correlation" => Ok(ChartKind::Correlation),
            "seasonal" => Ok(ChartKind::Seasonal),
            "multi_metric" => Ok(ChartKind::MultiMetric),
            other => Err(WeatherError::validation(format!(
                "unknown chart kind '{other}', expected series, temperature, wind_rose, \
                 correlation, seasonal or multi_metric"
            ))),
        }
    }
}

/// A rendered chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartArtifact {
    pub title: String,
    pub kind: ChartKind,
    /// Variables drawn, in drawing order
    pub variables: Vec<Variable>,
    pub svg: String,
}

fn render_error(err: impl std::fmt::Display) -> WeatherError {
    WeatherError::render(format!("chart rendering failed: {err}"))
}

fn place(records: &[WeatherRecord]) -> Result<String> {
    records
        .first()
        .map(|r| r.location.display_name())
        .ok_or_else(|| WeatherError::empty_series("no records to chart"))
}

fn series_points(records: &[WeatherRecord], variable: Variable) -> Vec<(NaiveDateTime, f64)> {
    records
        .iter()
        .filter_map(|r| r.get(variable).map(|v| (r.timestamp.naive_utc(), v)))
        .collect()
}

fn time_range(points: &[(NaiveDateTime, f64)], pad: bool) -> (NaiveDateTime, NaiveDateTime) {
    let (mut min_dt, mut max_dt) = points
        .iter()
        .fold((points[0].0, points[0].0), |(min, max), (dt, _)| {
            (min.min(*dt), max.max(*dt))
        });
    if pad || min_dt == max_dt {
        min_dt -= Duration::hours(12);
        max_dt += Duration::hours(12);
    }
    (min_dt, max_dt)
}

fn value_range(values: impl Iterator<Item = f64>, from_zero: bool) -> (f64, f64) {
    let (min_v, max_v) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
        (min.min(v), max.max(v))
    });
    let padding = if (max_v - min_v).abs() > 1e-6 {
        (max_v - min_v) * 0.1
    } else {
        1.0
    };
    let start = if from_zero { min_v.min(0.0) } else { min_v - padding };
    (start, max_v + padding)
}

/// Draw one variable on `area`: bars for precipitation, a line otherwise
fn draw_time_panel(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    caption: &str,
    caption_size: u32,
    variable: Variable,
    points: &[(NaiveDateTime, f64)],
) -> Result<()> {
    let bars = variable == Variable::Precipitation;
    let (min_dt, max_dt) = time_range(points, bars);
    let (y_start, y_end) = value_range(points.iter().map(|(_, v)| *v), bars);

    let bar_half_width = if points.len() > 1 {
        (max_dt - min_dt) / (points.len() as i32 * 3)
    } else {
        Duration::hours(6)
    };

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", caption_size))
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(64)
        .build_cartesian_2d(RangedDateTime::from(min_dt..max_dt), y_start..y_end)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc(format!("{} ({})", variable.label(), variable.unit()))
        .x_label_formatter(&|dt: &NaiveDateTime| dt.format("%Y-%m-%d").to_string())
        .light_line_style(BLACK.mix(0.1))
        .draw()
        .map_err(render_error)?;

    if bars {
        chart
            .draw_series(points.iter().map(|(dt, v)| {
                Rectangle::new(
                    [(*dt - bar_half_width, 0.0), (*dt + bar_half_width, *v)],
                    BLUE.mix(0.6).filled(),
                )
            }))
            .map_err(render_error)?;
    } else {
        chart
            .draw_series(LineSeries::new(points.iter().copied(), RED.stroke_width(2)))
            .map_err(render_error)?;
    }
    Ok(())
}

/// Render one variable of a series. Precipitation is drawn as bars,
/// everything else as a line. Missing values are left out of the plot.
pub fn render_series_chart(records: &[WeatherRecord], variable: Variable) -> Result<ChartArtifact> {
    if records.is_empty() {
        return Err(WeatherError::empty_series(format!(
            "no records to chart for {variable}"
        )));
    }

    let points = series_points(records, variable);
    if points.is_empty() {
        return Err(WeatherError::empty_series(format!(
            "series has no values for {variable}"
        )));
    }

    let title = format!("{} at {}", variable.label(), place(records)?);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;
        draw_time_panel(&root, &title, 28, variable, &points)?;
        root.present().map_err(render_error)?;
    }

    tracing::debug!(variable = %variable, points = points.len(), "Rendered chart");
    Ok(ChartArtifact {
        title,
        kind: ChartKind::Series,
        variables: vec![variable],
        svg,
    })
}

/// Max, mean and min temperature as separate lines with a legend. The
/// instantaneous temperature is drawn only when no daily column has values.
pub fn render_temperature_chart(records: &[WeatherRecord]) -> Result<ChartArtifact> {
    let title = format!("Temperature at {}", place(records)?);

    let mut lines: Vec<(Variable, RGBColor, Vec<(NaiveDateTime, f64)>)> = TEMPERATURE_LINES
        .into_iter()
        .filter(|(v, _)| *v != Variable::Temperature)
        .map(|(v, color)| (v, color, series_points(records, v)))
        .filter(|(_, _, points)| !points.is_empty())
        .collect();
    if lines.is_empty() {
        let (variable, color) = TEMPERATURE_LINES[3];
        let points = series_points(records, variable);
        if !points.is_empty() {
            lines.push((variable, color, points));
        }
    }
    if lines.is_empty() {
        return Err(WeatherError::empty_series("series has no temperature values"));
    }

    let all: Vec<(NaiveDateTime, f64)> = lines
        .iter()
        .flat_map(|(_, _, points)| points.iter().copied())
        .collect();
    let (min_dt, max_dt) = time_range(&all, false);
    let (y_start, y_end) = value_range(all.iter().map(|(_, v)| *v), false);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 28))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(64)
            .build_cartesian_2d(RangedDateTime::from(min_dt..max_dt), y_start..y_end)
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Temperature (°C)")
            .x_label_formatter(&|dt: &NaiveDateTime| dt.format("%Y-%m-%d").to_string())
            .light_line_style(BLACK.mix(0.1))
            .draw()
            .map_err(render_error)?;

        for (variable, color, points) in &lines {
            let color = *color;
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                .map_err(render_error)?
                .label(variable.label())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }

    Ok(ChartArtifact {
        title,
        kind: ChartKind::Temperature,
        variables: lines.into_iter().map(|(v, _, _)| v).collect(),
        svg,
    })
}

/// Compass sector a direction in degrees falls in, sector 0 centred on north
#[must_use]
pub fn rose_sector(degrees: f64) -> usize {
    let width = 360.0 / ROSE_SECTORS as f64;
    let normalized = degrees.rem_euclid(360.0);
    ((normalized + width / 2.0) / width) as usize % ROSE_SECTORS
}

fn compass_point(degrees: f64, radius: f64) -> (f64, f64) {
    let radians = degrees.to_radians();
    (radius * radians.sin(), radius * radians.cos())
}

/// Share of observations per compass sector, coloured by the mean wind
/// speed in the sector. Records need both direction and speed.
pub fn render_wind_rose(records: &[WeatherRecord]) -> Result<ChartArtifact> {
    let title = format!("Wind rose at {}", place(records)?);

    let observations: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| Some((r.get(Variable::WindDirection)?, r.get(Variable::WindSpeed)?)))
        .collect();
    if observations.is_empty() {
        return Err(WeatherError::empty_series(
            "series has no wind direction and speed pairs",
        ));
    }

    let mut counts = [0usize; ROSE_SECTORS];
    let mut speed_sums = [0.0f64; ROSE_SECTORS];
    for (direction, speed) in &observations {
        let sector = rose_sector(*direction);
        counts[sector] += 1;
        speed_sums[sector] += speed;
    }
    let total = observations.len() as f64;
    let shares: Vec<f64> = counts.iter().map(|c| *c as f64 / total * 100.0).collect();
    let mean_speeds: Vec<f64> = counts
        .iter()
        .zip(speed_sums)
        .map(|(c, sum)| if *c == 0 { 0.0 } else { sum / *c as f64 })
        .collect();
    let fastest = mean_speeds.iter().copied().fold(0.0, f64::max).max(1.0);
    let reach = shares.iter().copied().fold(0.0, f64::max) * 1.2;

    let width = 360.0 / ROSE_SECTORS as f64;
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, ROSE_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 28))
            .margin(24)
            .build_cartesian_2d(-reach..reach, -reach..reach)
            .map_err(render_error)?;

        let rings = 4;
        for ring in 1..=rings {
            let radius = reach / 1.2 * f64::from(ring) / f64::from(rings);
            let circle: Vec<(f64, f64)> = (0..=72)
                .map(|step| compass_point(f64::from(step) * 5.0, radius))
                .collect();
            chart
                .draw_series(std::iter::once(PathElement::new(circle, BLACK.mix(0.15))))
                .map_err(render_error)?;
            chart
                .draw_series(std::iter::once(Text::new(
                    format!("{:.0}%", radius),
                    compass_point(45.0, radius),
                    ("sans-serif", 14).into_font().color(&BLACK.mix(0.6)),
                )))
                .map_err(render_error)?;
        }

        chart
            .draw_series(shares.iter().enumerate().filter(|(_, s)| **s > 0.0).map(|(i, share)| {
                let centre = i as f64 * width;
                let mut outline = vec![(0.0, 0.0)];
                outline.extend(
                    (0..=8).map(|step| {
                        compass_point(centre - width / 2.0 + width * f64::from(step) / 8.0, *share)
                    }),
                );
                let intensity = 0.25 + 0.75 * mean_speeds[i] / fastest;
                Polygon::new(outline, BLUE.mix(intensity.min(1.0)).filled())
            }))
            .map_err(render_error)?;

        chart
            .draw_series(COMPASS.iter().enumerate().map(|(i, label)| {
                Text::new(
                    (*label).to_string(),
                    compass_point(i as f64 * 90.0, reach * 0.92),
                    ("sans-serif", 20),
                )
            }))
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }

    tracing::debug!(observations = observations.len(), "Rendered wind rose");
    Ok(ChartArtifact {
        title,
        kind: ChartKind::WindRose,
        variables: vec![Variable::WindDirection, Variable::WindSpeed],
        svg,
    })
}

/// Correlation matrix of every numeric variable with values. Cells without
/// enough complete pairs are left grey.
pub fn render_correlation_heatmap(records: &[WeatherRecord]) -> Result<ChartArtifact> {
    let title = format!("Correlations at {}", place(records)?);

    let variables: Vec<Variable> = CORRELATION_CANDIDATES
        .into_iter()
        .filter(|v| records.iter().filter(|r| r.get(*v).is_some()).count() >= 2)
        .collect();
    if variables.len() < 2 {
        return Err(WeatherError::empty_series(
            "need at least two variables with values to correlate",
        ));
    }

    let n = variables.len() as i32;
    let cells: Vec<(i32, i32, Option<f64>)> = (0..n)
        .flat_map(|x| (0..n).map(move |y| (x, y)))
        .map(|(x, y)| {
            let r = if x == y {
                Some(1.0)
            } else {
                correlation(records, variables[x as usize], variables[y as usize])
            };
            (x, y, r)
        })
        .collect();

    let names: Vec<&str> = variables.iter().map(|v| v.label()).collect();
    let label = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => names
            .get(*i as usize)
            .map(|s| (*s).to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (900, 820)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 28))
            .margin(16)
            .x_label_area_size(64)
            .y_label_area_size(140)
            .build_cartesian_2d((0..n).into_segmented(), (0..n).into_segmented())
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(variables.len() + 1)
            .y_labels(variables.len() + 1)
            .x_label_formatter(&label)
            .y_label_formatter(&label)
            .draw()
            .map_err(render_error)?;

        chart
            .draw_series(cells.iter().map(|(x, y, r)| {
                let fill = match r {
                    Some(r) if *r >= 0.0 => RED.mix(*r).filled(),
                    Some(r) => BLUE.mix(-*r).filled(),
                    None => BLACK.mix(0.08).filled(),
                };
                Rectangle::new(
                    [
                        (SegmentValue::Exact(*x), SegmentValue::Exact(*y)),
                        (SegmentValue::Exact(*x + 1), SegmentValue::Exact(*y + 1)),
                    ],
                    fill,
                )
            }))
            .map_err(render_error)?;

        chart
            .draw_series(cells.iter().map(|(x, y, r)| {
                Text::new(
                    r.map_or_else(|| "n/a".to_string(), |r| format!("{r:.2}")),
                    (SegmentValue::CenterOf(*x), SegmentValue::CenterOf(*y)),
                    ("sans-serif", 16),
                )
            }))
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }

    Ok(ChartArtifact {
        title,
        kind: ChartKind::Correlation,
        variables,
        svg,
    })
}

/// Mean temperature per season as bars with the seasonal min/max range
pub fn render_seasonal_comparison(records: &[WeatherRecord]) -> Result<ChartArtifact> {
    let title = format!("Seasons at {}", place(records)?);

    let variable = temperature_variable(records)
        .ok_or_else(|| WeatherError::empty_series("series has no temperature column"))?;
    let seasons = seasonal_statistics(records, variable);
    if seasons.is_empty() {
        return Err(WeatherError::empty_series("series has no temperature values"));
    }

    let n = seasons.len() as i32;
    let (y_start, y_end) = value_range(seasons.iter().flat_map(|s| [s.min, s.max]), true);
    let label = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => seasons
            .get(*i as usize)
            .map(|s| s.season.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 28))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(64)
            .build_cartesian_2d((0..n).into_segmented(), y_start..y_end)
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(seasons.len() + 1)
            .x_label_formatter(&label)
            .y_desc(format!("{} ({})", variable.label(), variable.unit()))
            .light_line_style(BLACK.mix(0.1))
            .draw()
            .map_err(render_error)?;

        chart
            .draw_series(seasons.iter().enumerate().map(|(i, s)| {
                let i = i as i32;
                let mut bar = Rectangle::new(
                    [
                        (SegmentValue::Exact(i), 0.0),
                        (SegmentValue::Exact(i + 1), s.mean),
                    ],
                    RGBColor(255, 127, 14).mix(0.7).filled(),
                );
                bar.set_margin(0, 0, 24, 24);
                bar
            }))
            .map_err(render_error)?;

        chart
            .draw_series(seasons.iter().enumerate().map(|(i, s)| {
                ErrorBar::new_vertical(
                    SegmentValue::CenterOf(i as i32),
                    s.min,
                    s.mean,
                    s.max,
                    BLACK.stroke_width(2),
                    16,
                )
            }))
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }

    Ok(ChartArtifact {
        title,
        kind: ChartKind::Seasonal,
        variables: vec![variable],
        svg,
    })
}

/// Stacked panels sharing the time axis, one per variable with values.
/// With no variables given, temperature, precipitation and humidity are
/// drawn.
pub fn render_multi_metric_chart(
    records: &[WeatherRecord],
    variables: &[Variable],
) -> Result<ChartArtifact> {
    let title = format!("Weather at {}", place(records)?);

    let requested: Vec<Variable> = if variables.is_empty() {
        temperature_variable(records)
            .into_iter()
            .chain([Variable::Precipitation, Variable::Humidity])
            .collect()
    } else {
        variables.to_vec()
    };
    let panels: Vec<(Variable, Vec<(NaiveDateTime, f64)>)> = requested
        .into_iter()
        .map(|v| (v, series_points(records, v)))
        .filter(|(_, points)| !points.is_empty())
        .collect();
    if panels.is_empty() {
        return Err(WeatherError::empty_series(
            "none of the requested variables has values",
        ));
    }

    let height = PANEL_HEIGHT * panels.len() as u32 + 64;
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (CHART_SIZE.0, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;
        let root = root
            .titled(&title, ("sans-serif", 28))
            .map_err(render_error)?;

        let areas = root.split_evenly((panels.len(), 1));
        for (area, (variable, points)) in areas.iter().zip(&panels) {
            draw_time_panel(area, variable.label(), 18, *variable, points)?;
        }
        root.present().map_err(render_error)?;
    }

    Ok(ChartArtifact {
        title,
        kind: ChartKind::MultiMetric,
        variables: panels.into_iter().map(|(v, _)| v).collect(),
        svg,
    })
}

/// Render a chart of the given kind. `variable` picks the series chart's
/// column and the only panel of a multi-metric chart; the other kinds
/// ignore it.
pub fn render_chart(
    records: &[WeatherRecord],
    kind: ChartKind,
    variable: Option<Variable>,
) -> Result<ChartArtifact> {
    match kind {
        ChartKind::Series => {
            let variable = variable
                .or_else(|| temperature_variable(records))
                .ok_or_else(|| WeatherError::empty_series("series has no temperature column"))?;
            render_series_chart(records, variable)
        }
        ChartKind::Temperature => render_temperature_chart(records),
        ChartKind::WindRose => render_wind_rose(records),
        ChartKind::Correlation => render_correlation_heatmap(records),
        ChartKind::Seasonal => render_seasonal_comparison(records),
        ChartKind::MultiMetric => {
            render_multi_metric_chart(records, &variable.into_iter().collect::<Vec<_>>())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn saigon() -> Location {
        Location::new(10.8231, 106.6297, "TP.HCM")
    }

    fn records(variable: Variable, values: &[Option<f64>]) -> Vec<WeatherRecord> {
        let start = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                WeatherRecord::new(start + Duration::days(i as i64), saigon()).with(variable, *v)
            })
            .collect()
    }

    fn daily_year() -> Vec<WeatherRecord> {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        (0..365)
            .map(|day| {
                let season = (f64::from(day) / 365.0 * std::f64::consts::TAU).sin();
                WeatherRecord::new(start + Duration::days(i64::from(day)), saigon())
                    .with(Variable::TemperatureMax, Some(32.0 + 3.0 * season))
                    .with(Variable::TemperatureMin, Some(24.0 + 2.0 * season))
                    .with(Variable::Precipitation, Some(if day % 3 == 0 { 8.0 } else { 0.0 }))
                    .with(Variable::Humidity, Some(70.0 + 10.0 * season))
                    .with(Variable::WindSpeed, Some(10.0 + f64::from(day % 7)))
                    .with(Variable::WindDirection, Some(f64::from(day * 37 % 360)))
            })
            .collect()
    }

    #[test]
    fn test_empty_series_is_rejected() {
        let err = render_series_chart(&[], Variable::Temperature).unwrap_err();
        assert!(matches!(err, WeatherError::EmptySeries { .. }));
    }

    #[test]
    fn test_all_missing_is_rejected() {
        let series = records(Variable::Humidity, &[None, None]);
        let err = render_series_chart(&series, Variable::Humidity).unwrap_err();
        assert!(matches!(err, WeatherError::EmptySeries { .. }));
    }

    #[test]
    fn test_line_chart_renders_svg() {
        let series = records(
            Variable::TemperatureMax,
            &[Some(31.0), Some(33.5), None, Some(30.2)],
        );
        let chart = render_series_chart(&series, Variable::TemperatureMax).unwrap();
        assert!(chart.svg.contains("<svg"));
        assert!(chart.svg.contains("polyline"));
        assert_eq!(chart.title, "Max temperature at TP.HCM");
        assert_eq!(chart.kind, ChartKind::Series);
        assert_eq!(chart.variables, vec![Variable::TemperatureMax]);
    }

    #[test]
    fn test_precipitation_renders_bars() {
        let series = records(Variable::Precipitation, &[Some(0.0), Some(12.0), Some(4.5)]);
        let chart = render_series_chart(&series, Variable::Precipitation).unwrap();
        assert!(chart.svg.contains("<rect"));
    }

    #[test]
    fn test_single_point_chart() {
        let series = records(Variable::Pressure, &[Some(1009.0)]);
        assert!(render_series_chart(&series, Variable::Pressure).is_ok());
    }

    #[test]
    fn test_temperature_chart_draws_each_daily_column() {
        let chart = render_temperature_chart(&daily_year()[..10]).unwrap();
        assert_eq!(
            chart.variables,
            vec![Variable::TemperatureMax, Variable::TemperatureMin]
        );
        assert!(chart.svg.matches("<polyline").count() >= 2);
        assert!(chart.svg.contains("Max temperature"));
        assert!(chart.svg.contains("Min temperature"));
    }

    #[test]
    fn test_temperature_chart_falls_back_to_instant_readings() {
        let series = records(Variable::Temperature, &[Some(29.0), Some(30.5)]);
        let chart = render_temperature_chart(&series).unwrap();
        assert_eq!(chart.variables, vec![Variable::Temperature]);
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(11.0, 0)]
    #[case(11.3, 1)]
    #[case(90.0, 4)]
    #[case(180.0, 8)]
    #[case(349.0, 0)]
    #[case(-90.0, 12)]
    #[case(360.0, 0)]
    fn test_rose_sectors(#[case] degrees: f64, #[case] sector: usize) {
        assert_eq!(rose_sector(degrees), sector);
    }

    #[test]
    fn test_wind_rose_renders_sectors_and_compass() {
        let chart = render_wind_rose(&daily_year()).unwrap();
        assert_eq!(chart.kind, ChartKind::WindRose);
        assert!(chart.svg.contains("<polygon"));
        for label in COMPASS {
            assert!(chart.svg.contains(&format!(">{label}<")), "{label}");
        }
    }

    #[test]
    fn test_correlation_heatmap_labels_cells() {
        let chart = render_correlation_heatmap(&daily_year()).unwrap();
        assert_eq!(
            chart.variables,
            vec![
                Variable::TemperatureMax,
                Variable::TemperatureMin,
                Variable::Precipitation,
                Variable::Humidity,
                Variable::WindSpeed,
            ]
        );
        assert!(chart.svg.matches("1.00").count() >= 5);
        assert!(chart.svg.contains("<rect"));
    }

    #[test]
    fn test_seasonal_comparison_covers_each_season() {
        let chart = render_seasonal_comparison(&daily_year()).unwrap();
        assert_eq!(chart.variables, vec![Variable::TemperatureMax]);
        for season in ["Winter", "Spring", "Summer", "Autumn"] {
            assert!(chart.svg.contains(season), "{season}");
        }
    }

    #[test]
    fn test_multi_metric_chart_stacks_panels() {
        let chart = render_multi_metric_chart(&daily_year()[..30], &[]).unwrap();
        assert_eq!(
            chart.variables,
            vec![
                Variable::TemperatureMax,
                Variable::Precipitation,
                Variable::Humidity
            ]
        );

        let chosen =
            render_multi_metric_chart(&daily_year()[..30], &[Variable::WindSpeed, Variable::Pressure])
                .unwrap();
        assert_eq!(chosen.variables, vec![Variable::WindSpeed]);
    }

    #[rstest]
    #[case(ChartKind::Series)]
    #[case(ChartKind::Temperature)]
    #[case(ChartKind::WindRose)]
    #[case(ChartKind::Correlation)]
    #[case(ChartKind::Seasonal)]
    #[case(ChartKind::MultiMetric)]
    fn test_every_kind_rejects_empty_input(#[case] kind: ChartKind) {
        let err = render_chart(&[], kind, None).unwrap_err();
        assert!(matches!(err, WeatherError::EmptySeries { .. }), "{kind}");
    }

    #[rstest]
    #[case(ChartKind::Temperature)]
    #[case(ChartKind::WindRose)]
    #[case(ChartKind::Correlation)]
    #[case(ChartKind::Seasonal)]
    fn test_every_kind_rejects_missing_columns(#[case] kind: ChartKind) {
        let series = records(Variable::Pressure, &[Some(1009.0), Some(1011.0)]);
        let err = render_chart(&series, kind, None).unwrap_err();
        assert!(matches!(err, WeatherError::EmptySeries { .. }), "{kind}");
    }

    #[test]
    fn test_multi_metric_without_values_is_rejected() {
        let series = records(Variable::Humidity, &[None, None]);
        let err = render_multi_metric_chart(&series, &[Variable::Humidity]).unwrap_err();
        assert!(matches!(err, WeatherError::EmptySeries { .. }));
    }

    #[test]
    fn test_chart_kind_parsing() {
        assert_eq!("wind-rose".parse::<ChartKind>().unwrap(), ChartKind::WindRose);
        assert_eq!("Multi_Metric".parse::<ChartKind>().unwrap(), ChartKind::MultiMetric);
        assert!("pie".parse::<ChartKind>().is_err());
        assert_eq!(ChartKind::Correlation.to_string(), "correlation");
    }
}
