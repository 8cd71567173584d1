//! Daily, weekly, monthly and climate reports rendered as markdown

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::alerts::heat_temperature;
use crate::analysis::indices::{complete_series, temperature_variable};
use crate::analysis::{
    Alert, AlertThresholds, TrendDirection, compute_climate_indices, describe_conditions,
    monthly_aggregates, seasonal_statistics, statistics, summarize_with_thresholds, trend,
};
use crate::models::{Location, Variable, WeatherRecord};
use crate::{Result, WeatherError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Daily,
    Weekly,
    Monthly,
    Climate,
}

impl ReportKind {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            ReportKind::Daily => "Daily weather report",
            ReportKind::Weekly => "Weekly weather report",
            ReportKind::Monthly => "Monthly weather report",
            ReportKind::Climate => "Long-term climate report",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportKind::Daily => "daily",
            ReportKind::Weekly => "weekly",
            ReportKind::Monthly => "monthly",
            ReportKind::Climate => "climate",
        })
    }
}

impl FromStr for ReportKind {
    type Err = WeatherError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(ReportKind::Daily),
            "weekly" => Ok(ReportKind::Weekly),
            "monthly" => Ok(ReportKind::Monthly),
            "climate" => Ok(ReportKind::Climate),
            other => Err(WeatherError::validation(format!(
                "unknown report kind '{other}', expected daily, weekly, monthly or climate"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub heading: String,
    pub body: String,
    /// Charts the section refers to
    pub charts: Vec<Variable>,
}

impl ReportSection {
    fn new(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
            charts: Vec::new(),
        }
    }

    fn with_charts(mut self, charts: Vec<Variable>) -> Self {
        self.charts = charts;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub title: String,
    pub location: Location,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<ReportSection>,
}

fn bullet(label: &str, value: Option<String>) -> String {
    format!("- **{label}:** {}", value.unwrap_or_else(|| "N/A".to_string()))
}

fn period_line(records: &[WeatherRecord]) -> String {
    match (records.first(), records.last()) {
        (Some(first), Some(last)) => format!(
            "**Period:** {} to {}",
            first.timestamp.format("%Y-%m-%d"),
            last.timestamp.format("%Y-%m-%d")
        ),
        _ => "**Period:** N/A".to_string(),
    }
}

fn chart_variables(records: &[WeatherRecord]) -> Vec<Variable> {
    let mut charts: Vec<Variable> = temperature_variable(records).into_iter().collect();
    if records.iter().any(|r| r.values.contains_key(&Variable::Precipitation)) {
        charts.push(Variable::Precipitation);
    }
    charts
}

fn daily_sections(records: &[WeatherRecord], thresholds: &AlertThresholds) -> Vec<ReportSection> {
    let Some(latest) = records.last() else {
        return Vec::new();
    };
    let temperature = heat_temperature(latest);
    let precipitation = latest.get(Variable::Precipitation);
    let wind = latest.get(Variable::WindSpeed);

    let figures = [
        bullet("Date", Some(latest.timestamp.format("%Y-%m-%d").to_string())),
        bullet("Temperature", temperature.map(|t| format!("{t:.1} °C"))),
        bullet(
            "Humidity",
            latest.get(Variable::Humidity).map(|h| format!("{h:.0} %")),
        ),
        bullet("Precipitation", precipitation.map(|p| format!("{p:.1} mm"))),
        bullet("Wind speed", wind.map(|w| format!("{w:.1} km/h"))),
    ]
    .join("\n");

    let mut notes = vec![format!(
        "Conditions: {}.",
        describe_conditions(temperature, precipitation, wind)
    )];
    match temperature {
        Some(t) if t >= thresholds.heat => {
            notes.push("Heat warning: avoid being outside around midday.".to_string());
        }
        Some(t) if t <= 15.0 => notes.push("Cold weather: dress warmly.".to_string()),
        Some(_) => notes.push("Pleasant weather for outdoor activities.".to_string()),
        None => {}
    }
    if precipitation.is_some_and(|p| p > 10.0) {
        notes.push("Rain expected: take an umbrella.".to_string());
    }

    vec![
        ReportSection::new("Key figures", figures),
        ReportSection::new("Remarks", notes.join("\n\n")),
    ]
}

fn temperature_section(records: &[WeatherRecord], heading: &str) -> Option<ReportSection> {
    let variable = temperature_variable(records)?;
    let stats = statistics(records, variable)?;
    let body = [
        bullet("Average", Some(format!("{:.1} °C", stats.mean))),
        bullet("Highest", Some(format!("{:.1} °C", stats.max))),
        bullet("Lowest", Some(format!("{:.1} °C", stats.min))),
        bullet("Variability", Some(format!("{:.1} °C", stats.std_dev))),
    ]
    .join("\n");
    Some(ReportSection::new(heading, body).with_charts(vec![variable]))
}

fn precipitation_section(records: &[WeatherRecord]) -> Option<ReportSection> {
    let stats = statistics(records, Variable::Precipitation)?;
    let total = stats.mean * stats.count as f64;
    let rainy = records
        .iter()
        .filter(|r| r.get(Variable::Precipitation).is_some_and(|p| p > 0.0))
        .count();
    let body = [
        bullet("Total", Some(format!("{total:.1} mm"))),
        bullet("Rainy days", Some(rainy.to_string())),
        bullet("Wettest day", Some(format!("{:.1} mm", stats.max))),
    ]
    .join("\n");
    Some(ReportSection::new("Precipitation", body).with_charts(vec![Variable::Precipitation]))
}

fn weekly_sections(records: &[WeatherRecord]) -> Vec<ReportSection> {
    let mut sections: Vec<ReportSection> = [
        temperature_section(records, "Temperature"),
        precipitation_section(records),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut notes = Vec::new();
    if let Some(stats) = temperature_variable(records).and_then(|v| statistics(records, v)) {
        if stats.mean > 30.0 {
            notes.push("A hot week with high average temperatures.");
        } else if stats.mean < 20.0 {
            notes.push("A cool week with low average temperatures.");
        } else {
            notes.push("Mild temperatures throughout the week.");
        }
        if stats.max - stats.min > 15.0 {
            notes.push("Large temperature swings during the week.");
        }
    }
    if let Some(stats) = statistics(records, Variable::Precipitation) {
        let total = stats.mean * stats.count as f64;
        if total > 50.0 {
            notes.push("A wet week with plenty of rain.");
        } else if total == 0.0 {
            notes.push("A dry week without rain.");
        }
    }
    if let Some(t) = temperature_variable(records).and_then(|v| trend(records, v)) {
        notes.push(match t.direction {
            TrendDirection::Rising => "Temperatures rose over the period.",
            TrendDirection::Falling => "Temperatures fell over the period.",
            TrendDirection::Stable => "Temperatures stayed stable over the period.",
        });
    }
    if !notes.is_empty() {
        sections.push(ReportSection::new("Trend analysis", notes.join("\n")));
    }
    sections
}

fn monthly_sections(records: &[WeatherRecord]) -> Vec<ReportSection> {
    let mut sections: Vec<ReportSection> = [
        temperature_section(records, "Temperature"),
        precipitation_section(records),
    ]
    .into_iter()
    .flatten()
    .collect();

    let months = monthly_aggregates(records);
    if !months.is_empty() {
        let fmt_opt = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |v| format!("{v:.1}"));
        let mut table = String::from(
            "| Month | Mean °C | Max °C | Min °C | Rain mm | Rainy days |\n|---|---|---|---|---|---|",
        );
        for month in &months {
            table.push_str(&format!(
                "\n| {} | {} | {} | {} | {} | {} |",
                month.label(),
                fmt_opt(month.mean_temperature),
                fmt_opt(month.max_temperature),
                fmt_opt(month.min_temperature),
                fmt_opt(month.total_precipitation),
                month.rainy_days
            ));
        }
        sections.push(ReportSection::new("Monthly breakdown", table));
    }

    let mut notes = Vec::new();
    if let Some(rain) = statistics(records, Variable::Precipitation) {
        let rainy = records
            .iter()
            .filter(|r| r.get(Variable::Precipitation).is_some_and(|p| p > 0.0))
            .count() as f64;
        let ratio = rainy / rain.count as f64;
        if ratio > 0.5 {
            notes.push("Rain fell on more than half of the days.");
        } else if ratio < 0.1 {
            notes.push("Very few rainy days.");
        }
    }
    let indices = compute_climate_indices(records);
    if indices.get("hot_days").is_some_and(|d| *d > 10.0) {
        notes.push("Many hot days above 30 °C.");
    }
    if !notes.is_empty() {
        sections.push(ReportSection::new("Assessment", notes.join("\n")));
    }
    sections
}

fn climate_sections(records: &[WeatherRecord]) -> Vec<ReportSection> {
    let indices = compute_climate_indices(records);
    let mut sections = Vec::new();

    if !indices.is_empty() {
        let body = indices
            .iter()
            .map(|(name, value)| format!("- **{}:** {value:.1}", name.replace('_', " ")))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(ReportSection::new("Climate indices", body).with_charts(chart_variables(records)));
    }

    if let Some(variable) = temperature_variable(records) {
        let seasons = seasonal_statistics(records, variable);
        if seasons.len() > 1 {
            let body = seasons
                .iter()
                .map(|s| format!("- **{}:** {:.1} °C", s.season, s.mean))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(ReportSection::new("Seasonal temperatures", body));
        }
    }

    let temperature = temperature_variable(records)
        .and_then(|v| complete_series(records, v))
        .and_then(|t| crate::analysis::stats::mean(&t));
    let rain = indices.get("total_precipitation").copied();
    if let (Some(t), Some(r)) = (temperature, rain) {
        let class = if t > 26.0 && r > 1500.0 {
            "Humid tropical: hot and wet all year."
        } else if t > 26.0 && r < 1000.0 {
            "Dry tropical: hot with little rain."
        } else if t > 20.0 && t <= 26.0 {
            "Subtropical: mild with distinct seasons."
        } else {
            "Temperate: cool with seasonal variation."
        };
        sections.push(ReportSection::new("Classification", class));
    }

    if records.len() > 365 {
        if let Some(t) = temperature_variable(records).and_then(|v| trend(records, v)) {
            let per_year = t.slope * 365.0;
            if per_year.abs() > 0.1 {
                let verb = if per_year > 0.0 { "rising" } else { "falling" };
                sections.push(ReportSection::new(
                    "Long-term trend",
                    format!("Temperatures are {verb} by {:.1} °C per year.", per_year.abs()),
                ));
            }
        }
    }
    sections
}

fn alert_section(alerts: &[Alert]) -> Option<ReportSection> {
    if alerts.is_empty() {
        return None;
    }
    let body = alerts
        .iter()
        .map(|a| format!("- {}", a.message()))
        .collect::<Vec<_>>()
        .join("\n");
    Some(ReportSection::new("Alerts", body))
}

/// Assemble a report with the default alert thresholds
pub fn build_report(
    kind: ReportKind,
    location: &Location,
    records: &[WeatherRecord],
    alerts: &[Alert],
) -> Result<Report> {
    build_report_with_thresholds(kind, location, records, alerts, &AlertThresholds::default())
}

/// Assemble a report. Fails with `EmptySeries` for zero records.
pub fn build_report_with_thresholds(
    kind: ReportKind,
    location: &Location,
    records: &[WeatherRecord],
    alerts: &[Alert],
    thresholds: &AlertThresholds,
) -> Result<Report> {
    if records.is_empty() {
        return Err(WeatherError::empty_series(format!(
            "no records for a {kind} report"
        )));
    }

    let mut sections = match kind {
        ReportKind::Daily => daily_sections(records, thresholds),
        ReportKind::Weekly => weekly_sections(records),
        ReportKind::Monthly => monthly_sections(records),
        ReportKind::Climate => climate_sections(records),
    };
    sections.extend(alert_section(alerts));
    sections.push(ReportSection::new(
        "Summary",
        summarize_with_thresholds(records, thresholds),
    ));

    let mut intro = ReportSection::new("Overview", period_line(records));
    if kind != ReportKind::Climate {
        intro = intro.with_charts(chart_variables(records));
    }
    sections.insert(0, intro);

    Ok(Report {
        kind,
        title: format!("{} - {}", kind.title(), location.display_name()),
        location: location.clone(),
        generated_at: Utc::now(),
        sections,
    })
}

/// Render a report as a markdown document
#[must_use]
pub fn render_report(report: &Report) -> String {
    let mut out = format!("# {}\n", report.title);
    for section in &report.sections {
        out.push_str(&format!("\n## {}\n\n{}\n", section.heading, section.body));
        for chart in &section.charts {
            out.push_str(&format!("\n![{} chart](chart-{}.svg)\n", chart.label(), chart));
        }
    }
    out.push_str(&format!(
        "\n*Generated at {}*\n",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    out
}
