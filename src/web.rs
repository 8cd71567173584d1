use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{Router, extract::State, response::Html, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::cache::{CacheStore, FjallStore, WeatherCache};
use crate::config::AppConfig;
use crate::service::WeatherService;
use crate::weather::{OpenMeteoClient, WeatherSource};

/// Upper bound for one dashboard request, on top of the upstream timeout
const REQUEST_SLACK: Duration = Duration::from_secs(5);

pub fn app<W, S>(service: Arc<WeatherService<W, S>>) -> Router
where
    W: WeatherSource + 'static,
    S: CacheStore + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let timeout = service.config().weather.timeout() + REQUEST_SLACK;

    Router::new()
        .route("/", get(index::<W, S>))
        .nest("/api", api::router::<W, S>())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .with_state(service)
}

async fn index<W: WeatherSource, S: CacheStore>(
    State(service): State<Arc<WeatherService<W, S>>>,
) -> Html<String> {
    let presets: String = service
        .presets()
        .iter()
        .map(|location| {
            let query = urlencoding::encode(&location.name);
            format!(
                "<li>{name}: <a href=\"/api/current?location={query}\">current</a> \
                 <a href=\"/api/forecast?location={query}\">forecast</a> \
                 <a href=\"/api/chart.svg?location={query}\">chart</a> \
                 <a href=\"/api/report?location={query}&kind=weekly\">weekly report</a> \
                 <a href=\"/api/export.csv?location={query}\">csv</a></li>\n",
                name = location.name
                    .replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;"),
            )
        })
        .collect();

    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>weatherdash</title></head>\n\
         <body>\n<h1>weatherdash {version}</h1>\n\
         <p><a href=\"/api/map.html\">Map</a> | <a href=\"/api/compare\">Compare presets</a></p>\n\
         <ul>\n{presets}</ul>\n</body>\n</html>\n",
        version = crate::VERSION,
    ))
}

/// Serve the dashboard on `port` with the on-disk cache from `config`
pub async fn run(config: AppConfig, port: u16) -> anyhow::Result<()> {
    let cache_dir = config.cache.resolved_location();
    let store = FjallStore::open(&cache_dir)
        .with_context(|| format!("Failed to open cache at {}", cache_dir.display()))?;
    let cache = WeatherCache::new(store, config.cache.freshness_policy());
    let client = OpenMeteoClient::new(config.weather.clone())
        .context("Failed to create weather client")?;
    let service = Arc::new(WeatherService::new(client, cache, config));

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://localhost:{}", port);
    axum::serve(listener, app(service))
        .await
        .context("Web server stopped")?;
    Ok(())
}
