use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::{Alert, summarize_with_thresholds};
use crate::cache::{CacheStore, CachedSeries};
use crate::models::{Location, Variable};
use crate::presentation::{ChartKind, Report, ReportKind, render_report};
use crate::service::{LocationSnapshot, SeriesRequest, WeatherService};
use crate::weather::WeatherSource;
use crate::WeatherError;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Separator between locations in `locations=` parameters. Commas belong to
/// coordinate pairs.
const LOCATION_SEPARATOR: char = ';';

/// Error returned to HTTP clients as a plain text message
#[derive(Debug)]
pub struct ApiError(WeatherError);

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            WeatherError::Validation { .. } => StatusCode::BAD_REQUEST,
            WeatherError::InvalidLocation { .. } | WeatherError::EmptySeries { .. } => {
                StatusCode::NOT_FOUND
            }
            WeatherError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            WeatherError::Network { .. } | WeatherError::Api { .. } => StatusCode::BAD_GATEWAY,
            WeatherError::Render { .. }
            | WeatherError::Cache { .. }
            | WeatherError::Config { .. }
            | WeatherError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }

        let mut response = (status, self.0.user_message()).into_response();
        if let WeatherError::RateLimit {
            retry_after_secs: Some(secs),
            ..
        } = self.0
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub location: Option<String>,
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoricalQuery {
    pub location: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationsQuery {
    pub locations: Option<String>,
}

/// Selects a series: `mode` is current, forecast (default) or historical
#[derive(Debug, Default, Deserialize)]
pub struct SeriesQuery {
    pub location: Option<String>,
    pub mode: Option<String>,
    pub days: Option<u32>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub variable: Option<String>,
    /// Chart kind, `series` by default
    pub chart: Option<String>,
}

impl SeriesQuery {
    fn request(&self) -> Result<SeriesRequest, WeatherError> {
        match self.mode.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("forecast") => Ok(SeriesRequest::Forecast { days: self.days }),
            Some("current") => Ok(SeriesRequest::Current),
            Some("historical") => Ok(SeriesRequest::Historical {
                start: self.start,
                end: self.end,
            }),
            Some(other) => Err(WeatherError::validation(format!(
                "unknown mode '{other}', expected current, forecast or historical"
            ))),
        }
    }

    fn variable(&self) -> Result<Option<Variable>, WeatherError> {
        self.variable.as_deref().map(str::parse).transpose()
    }

    fn chart_kind(&self) -> Result<ChartKind, WeatherError> {
        self.chart
            .as_deref()
            .map_or(Ok(ChartKind::Series), str::parse)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub location: Option<String>,
    pub kind: Option<String>,
    /// `markdown` (default) or `json`
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub location: Location,
    #[serde(flatten)]
    pub series: CachedSeries,
    pub summary: String,
}

pub fn router<W, S>() -> Router<Arc<WeatherService<W, S>>>
where
    W: WeatherSource + 'static,
    S: CacheStore + 'static,
{
    Router::new()
        .route("/current", get(get_current::<W, S>))
        .route("/forecast", get(get_forecast::<W, S>))
        .route("/historical", get(get_historical::<W, S>))
        .route("/compare", get(get_compare::<W, S>))
        .route("/alerts", get(get_alerts::<W, S>))
        .route("/report", get(get_report::<W, S>))
        .route("/chart.svg", get(get_chart::<W, S>))
        .route("/map.html", get(get_map::<W, S>))
        .route("/export.csv", get(get_export_csv::<W, S>))
        .route("/export.xlsx", get(get_export_xlsx::<W, S>))
}

fn series_response<W: WeatherSource, S: CacheStore>(
    service: &WeatherService<W, S>,
    location: Location,
    series: CachedSeries,
) -> Json<SeriesResponse> {
    let summary = summarize_with_thresholds(&series.records, &service.config().alerts);
    Json(SeriesResponse {
        location,
        series,
        summary,
    })
}

async fn resolve_many<W: WeatherSource, S: CacheStore>(
    service: &WeatherService<W, S>,
    input: Option<&str>,
) -> Result<Vec<Location>, WeatherError> {
    let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
        return Ok(service.presets());
    };
    let mut locations = Vec::new();
    for part in input.split(LOCATION_SEPARATOR).filter(|p| !p.trim().is_empty()) {
        locations.push(service.resolve(Some(part)).await?);
    }
    Ok(locations)
}

async fn get_current<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<LocationQuery>,
) -> ApiResult<Json<SeriesResponse>> {
    let location = service.resolve(query.location.as_deref()).await?;
    let series = service.current(&location).await?;
    Ok(series_response(&service, location, series))
}

async fn get_forecast<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<ForecastQuery>,
) -> ApiResult<Json<SeriesResponse>> {
    let location = service.resolve(query.location.as_deref()).await?;
    let series = service.forecast(&location, query.days).await?;
    Ok(series_response(&service, location, series))
}

async fn get_historical<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<HistoricalQuery>,
) -> ApiResult<Json<SeriesResponse>> {
    let location = service.resolve(query.location.as_deref()).await?;
    let series = service
        .historical(&location, query.start, query.end)
        .await?;
    Ok(series_response(&service, location, series))
}

async fn get_compare<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<LocationsQuery>,
) -> ApiResult<Json<Vec<LocationSnapshot>>> {
    let locations = resolve_many(&service, query.locations.as_deref()).await?;
    Ok(Json(service.compare(&locations).await?))
}

async fn get_alerts<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<Json<Vec<Alert>>> {
    let location = service.resolve(query.location.as_deref()).await?;
    let series = service.fetch(&location, query.request()?).await?;
    Ok(Json(service.alerts(&series.records)))
}

async fn get_report<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    let kind: ReportKind = query.kind.as_deref().unwrap_or("daily").parse()?;
    let location = service.resolve(query.location.as_deref()).await?;
    let report: Report = service.report(kind, &location).await?;

    match query.format.as_deref().unwrap_or("markdown") {
        "json" => Ok(Json(report).into_response()),
        "markdown" => Ok((
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            render_report(&report),
        )
            .into_response()),
        other => Err(WeatherError::validation(format!(
            "unknown format '{other}', expected markdown or json"
        ))
        .into()),
    }
}

async fn get_chart<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<Response> {
    let request = query.request()?;
    let kind = query.chart_kind()?;
    let variable = query.variable()?;
    let location = service.resolve(query.location.as_deref()).await?;
    let chart = service.chart(&location, request, kind, variable).await?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], chart.svg).into_response())
}

async fn get_map<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<LocationsQuery>,
) -> ApiResult<Html<String>> {
    let locations = resolve_many(&service, query.locations.as_deref()).await?;
    Ok(Html(service.map(&locations).await?.html))
}

fn attachment(name: &str) -> String {
    format!("attachment; filename=\"{name}\"")
}

async fn get_export_csv<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<Response> {
    let request = query.request()?;
    let location = service.resolve(query.location.as_deref()).await?;
    let csv = service.export_csv(&location, request).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment("weather.csv")),
        ],
        csv,
    )
        .into_response())
}

async fn get_export_xlsx<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<Response> {
    let request = query.request()?;
    let location = service.resolve(query.location.as_deref()).await?;
    let bytes = service.export_spreadsheet(&location, request).await?;
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, attachment("weather.xlsx")),
        ],
        bytes,
    )
        .into_response())
}
