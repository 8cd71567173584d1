//! Charts, maps, reports and exports built from normalized records

pub mod chart;
pub mod export;
pub mod map;
pub mod report;

pub use chart::{
    ChartArtifact, ChartKind, render_chart, render_correlation_heatmap, render_multi_metric_chart,
    render_seasonal_comparison, render_series_chart, render_temperature_chart, render_wind_rose,
};
pub use export::{from_csv, to_csv, to_spreadsheet};
pub use map::{MapArtifact, render_map};
pub use report::{
    Report, ReportKind, ReportSection, build_report, build_report_with_thresholds, render_report,
};
