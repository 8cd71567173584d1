use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use weatherdash::analysis::summarize_with_thresholds;
use weatherdash::cache::{FjallStore, WeatherCache};
use weatherdash::config::{AppConfig, LoggingConfig};
use weatherdash::models::record::columns;
use weatherdash::presentation::render_report;
use weatherdash::service::{SeriesRequest, WeatherService};
use weatherdash::{
    CachedSeries, ChartKind, Location, OpenMeteoClient, ReportKind, Variable, WeatherError, web,
};

type Service = WeatherService<OpenMeteoClient, FjallStore>;

#[derive(Parser, Debug)]
#[command(name = "weatherdash", version, about = "Weather dashboard backed by Open-Meteo")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP dashboard
    Serve {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Current conditions
    Current {
        /// Preset name, place name or "lat,lon"
        location: Option<String>,
    },
    /// Daily forecast
    Forecast {
        location: Option<String>,
        /// Number of days (1-16)
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Daily history
    History {
        location: Option<String>,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Current conditions side by side (preset locations by default)
    Compare { locations: Vec<String> },
    /// Markdown report
    Report {
        location: Option<String>,
        /// daily, weekly, monthly or climate
        #[arg(short, long, default_value = "daily")]
        kind: ReportKind,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render a series as an SVG chart
    Chart {
        location: Option<String>,
        /// series, temperature, wind_rose, correlation, seasonal or multi_metric
        #[arg(short, long, default_value = "series")]
        kind: ChartKind,
        /// Column for series and multi_metric charts, e.g. humidity
        #[arg(long)]
        variable: Option<Variable>,
        #[arg(short, long, value_enum, default_value_t = SeriesMode::Forecast)]
        mode: SeriesMode,
        #[arg(short, long)]
        days: Option<u32>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Output SVG file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Export a series as CSV or XLSX
    Export {
        location: Option<String>,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        #[arg(short, long, value_enum, default_value_t = SeriesMode::Forecast)]
        mode: SeriesMode,
        #[arg(short, long)]
        days: Option<u32>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Output file, required for XLSX
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Csv,
    Xlsx,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SeriesMode {
    Current,
    Forecast,
    Historical,
}

impl SeriesMode {
    fn request(
        self,
        days: Option<u32>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> SeriesRequest {
        match self {
            SeriesMode::Current => SeriesRequest::Current,
            SeriesMode::Forecast => SeriesRequest::Forecast { days },
            SeriesMode::Historical => SeriesRequest::Historical { start, end },
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("weatherdash={level},tower_http={level}")));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_service(config: AppConfig) -> Result<Service> {
    let cache_dir = config.cache.resolved_location();
    let store = FjallStore::open(&cache_dir)
        .with_context(|| format!("Failed to open cache at {}", cache_dir.display()))?;
    let cache = WeatherCache::new(store, config.cache.freshness_policy());
    let client =
        OpenMeteoClient::new(config.weather.clone()).context("Failed to create weather client")?;
    Ok(WeatherService::new(client, cache, config))
}

fn print_series(service: &Service, location: &Location, series: &CachedSeries) {
    println!("{}", location.display_name());
    if series.stale {
        println!(
            "(offline: showing data fetched at {})",
            series.fetched_at.format("%Y-%m-%d %H:%M UTC")
        );
    }

    let variables = columns(&series.records);
    for record in &series.records {
        let values: Vec<String> = variables
            .iter()
            .map(|v| format!("{}: {}", v.label(), record.format_value(*v)))
            .collect();
        println!(
            "  {}  {}",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            values.join(", ")
        );
    }

    println!();
    println!(
        "{}",
        summarize_with_thresholds(&series.records, &service.config().alerts)
    );
    for alert in service.alerts(&series.records) {
        println!("! {}", alert.message());
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    if let Command::Serve { port } = cli.command {
        return web::run(config, port).await;
    }

    let service = build_service(config)?;
    match cli.command {
        Command::Serve { .. } => {}
        Command::Current { location } => {
            let location = service.resolve(location.as_deref()).await?;
            let series = service.current(&location).await?;
            print_series(&service, &location, &series);
        }
        Command::Forecast { location, days } => {
            let location = service.resolve(location.as_deref()).await?;
            let series = service.forecast(&location, days).await?;
            print_series(&service, &location, &series);
        }
        Command::History {
            location,
            start,
            end,
        } => {
            let location = service.resolve(location.as_deref()).await?;
            let series = service.historical(&location, start, end).await?;
            print_series(&service, &location, &series);
        }
        Command::Compare { locations } => {
            let locations = if locations.is_empty() {
                service.presets()
            } else {
                let mut resolved = Vec::with_capacity(locations.len());
                for input in &locations {
                    resolved.push(service.resolve(Some(input)).await?);
                }
                resolved
            };
            for snapshot in service.compare(&locations).await? {
                let line = match (&snapshot.record, &snapshot.error) {
                    (Some(record), _) => record
                        .values
                        .keys()
                        .map(|v| format!("{} {}", v.label(), record.format_value(*v)))
                        .collect::<Vec<_>>()
                        .join(", "),
                    (None, Some(error)) => error.clone(),
                    (None, None) => "no data".to_string(),
                };
                let marker = if snapshot.stale { " (stale)" } else { "" };
                println!("{}{marker}: {line}", snapshot.location.display_name());
            }
        }
        Command::Report {
            location,
            kind,
            output,
        } => {
            let location = service.resolve(location.as_deref()).await?;
            let report = service.report(kind, &location).await?;
            let text = render_report(&report);
            match output {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => print!("{text}"),
            }
        }
        Command::Chart {
            location,
            kind,
            variable,
            mode,
            days,
            start,
            end,
            output,
        } => {
            let location = service.resolve(location.as_deref()).await?;
            let chart = service
                .chart(&location, mode.request(days, start, end), kind, variable)
                .await?;
            std::fs::write(&output, chart.svg)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{} written to {}", chart.title, output.display());
        }
        Command::Export {
            location,
            format,
            mode,
            days,
            start,
            end,
            output,
        } => {
            let location = service.resolve(location.as_deref()).await?;
            let request = mode.request(days, start, end);
            match (format, output) {
                (ExportFormat::Csv, None) => {
                    print!("{}", service.export_csv(&location, request).await?);
                }
                (ExportFormat::Csv, Some(path)) => {
                    let csv = service.export_csv(&location, request).await?;
                    std::fs::write(&path, csv)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                (ExportFormat::Xlsx, Some(path)) => {
                    let bytes = service.export_spreadsheet(&location, request).await?;
                    std::fs::write(&path, bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                (ExportFormat::Xlsx, None) => {
                    anyhow::bail!("XLSX export needs --output");
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load_from_path(cli.config.clone()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(2);
        }
    };
    init_tracing(&config.logging, cli.verbose);

    if let Err(err) = run(cli, config).await {
        tracing::debug!("{err:?}");
        match err.downcast_ref::<WeatherError>() {
            Some(weather_err) => eprintln!("{}", weather_err.user_message()),
            None => eprintln!("Error: {err:#}"),
        }
        std::process::exit(1);
    }
}
