//! Axum-based administrative HTTP surface
//!
//! Four routes, all deliberately unauthenticated on the local network: the
//! HTML status page, the settings update endpoint the page's forms post to,
//! a remote reboot, and a plain 404 fallback. Nothing here ever answers 5xx;
//! bad input gets a descriptive 200 so a browser on a ladder in the garage
//! still shows something useful.

use crate::driver::DiverterDriver;
use crate::error::{Result, ThermaeError};
use crate::updater::APP_VERSION;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

const REBOOT_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<Mutex<DiverterDriver>>,
}

/// Administrative HTTP server
pub struct WebServer {
    state: AppState,
}

impl WebServer {
    /// Create a server sharing the driver
    pub fn new(driver: Arc<Mutex<DiverterDriver>>) -> Self {
        Self {
            state: AppState { driver },
        }
    }

    /// Bind and serve until the process exits
    pub async fn start(&self, host: &str, port: u16) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| ThermaeError::web(format!("Invalid bind address: {}", e)))?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web server listening on {}", addr);
        axum::serve(listener, build_router(self.state.clone()))
            .await
            .map_err(|e| ThermaeError::web(e.to_string()))
    }
}

/// Build the administrative router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/get", get(update_settings))
        .route("/reboot", get(reboot))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Values rendered on the status page
struct StatusView {
    now: String,
    uptime: String,
    node_name: String,
    local_addr: String,
    hostname: String,
    free_mem_kb: Option<u64>,
    version: String,
    grid_watts: i32,
    energized: bool,
    threshold_watts: i32,
    interval_ms: u64,
    update_available: Option<String>,
}

async fn status_page(State(state): State<AppState>) -> Html<String> {
    let drv = state.driver.lock().await;
    let view = StatusView {
        now: chrono::Local::now().format("%H:%M:%S").to_string(),
        uptime: format_uptime(drv.uptime_secs()),
        node_name: drv.node_name().to_string(),
        local_addr: local_ip().unwrap_or_else(|| "unknown".to_string()),
        hostname: hostname().unwrap_or_else(|| "unknown".to_string()),
        free_mem_kb: free_memory_kb(),
        version: APP_VERSION.to_string(),
        grid_watts: drv.grid_watts(),
        energized: drv.contactor_energized(),
        threshold_watts: drv.threshold_watts(),
        interval_ms: drv.interval_ms(),
        update_available: drv
            .update_status()
            .filter(|s| s.update_available)
            .and_then(|s| s.latest_version),
    };
    Html(render_status_page(&view))
}

fn render_status_page(view: &StatusView) -> String {
    let mut page = String::from("<h2>You have reached the Hot Water System Redirector</h2>");
    page.push_str(&format!(
        "<b>This triggers at {} minute intervals and when the export power value reaches {} Watts</b>",
        view.interval_ms / 60_000,
        view.threshold_watts
    ));
    page.push_str("<p></p><table style=\"width:600\">");
    page.push_str(&format!(
        "<tr><td>Current time</td><td><b>{}</b></td></tr>",
        view.now
    ));
    page.push_str(&format!(
        "<tr><td>Uptime</td><td><b>{}</b></td></tr>",
        view.uptime
    ));
    page.push_str(&format!(
        "<tr><td>Node Name</td><td><b>{}</b></td></tr>",
        view.node_name
    ));
    page.push_str(&format!(
        "<tr><td>Local IP is:</td><td><b>{}</b></td></tr>",
        view.local_addr
    ));
    page.push_str(&format!(
        "<tr><td>Host</td><td><b>{}</b></td></tr>",
        view.hostname
    ));
    if let Some(kb) = view.free_mem_kb {
        page.push_str(&format!(
            "<tr><td>Free Memory</td><td><b>{} kB</b></td></tr>",
            kb
        ));
    }
    page.push_str(&format!(
        "<tr><td>Software Version</td><td><b>{}</b></td></tr>",
        view.version
    ));
    if let Some(latest) = &view.update_available {
        page.push_str(&format!(
            "<tr><td>Update Available</td><td><b>{}</b></td></tr>",
            latest
        ));
    }
    page.push_str("<tr></tr>");
    page.push_str(&format!(
        "<tr><td>Grid Value</td><td><b>{} W</b></td></tr>",
        view.grid_watts
    ));
    page.push_str(&format!(
        "<tr><td>Contactor Status</td><td><b>{}</b></td></tr>",
        if view.energized { "On" } else { "Off" }
    ));
    page.push_str(&format!(
        "<tr><td>Trigger Threshold</td><td><b>{} W</b></td></tr>",
        view.threshold_watts
    ));
    page.push_str(&format!(
        "<tr><td>Trigger Interval</td><td><b>{} ms</b></td></tr>",
        view.interval_ms
    ));
    page.push_str("</table>");
    page.push_str(
        "<p><form action=\"/get\" method=\"get\">Threshold (Watts): \
         <input type=\"number\" name=\"watts\" min=\"0\"> \
         <input type=\"submit\" value=\"Set\"></form>",
    );
    page.push_str(
        "<form action=\"/get\" method=\"get\">Interval (Seconds): \
         <input type=\"number\" name=\"seconds\" min=\"1\"> \
         <input type=\"submit\" value=\"Set\"></form></p>",
    );
    page
}

// String fields so the extractor itself can never reject a request; the
// numeric parse happens in the handler and falls through to the hint.
#[derive(Deserialize)]
struct SettingsQuery {
    watts: Option<String>,
    seconds: Option<String>,
}

async fn update_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> Html<String> {
    let mut drv = state.driver.lock().await;
    if let Some(watts) = parse_param::<i32>(query.watts.as_deref()) {
        drv.set_threshold_watts(watts);
        return Html(format!(
            "<h2>Trigger threshold set to {} Watts</h2><a href=\"/\">Back</a>",
            drv.threshold_watts()
        ));
    }
    if let Some(seconds) = parse_param::<u32>(query.seconds.as_deref()) {
        drv.set_interval_seconds(seconds);
        return Html(format!(
            "<h2>Trigger interval set to {} seconds</h2><a href=\"/\">Back</a>",
            drv.interval_ms() / 1000
        ));
    }
    Html("<h2>Nothing to set: expected watts or seconds</h2><a href=\"/\">Back</a>".to_string())
}

fn parse_param<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

async fn reboot(State(state): State<AppState>) -> Html<String> {
    let node = state.driver.lock().await.node_name().to_string();
    let driver = state.driver.clone();
    tokio::spawn(async move {
        tokio::time::sleep(REBOOT_DELAY).await;
        driver.lock().await.request_reboot();
    });
    Html(format!(
        "<h1>Rebooting {} in {} seconds</h1>",
        node,
        REBOOT_DELAY.as_secs()
    ))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Render seconds of uptime as days/hours/minutes/seconds
fn format_uptime(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let mins = (total_secs % 3_600) / 60;
    let secs = total_secs % 60;
    format!("{}d {}h {}m {}s", days, hours, mins, secs)
}

/// MemAvailable from /proc/meminfo, in kB
fn free_memory_kb() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemAvailable:") {
            return rest.trim().trim_end_matches(" kB").trim().parse().ok();
        }
    }
    None
}

fn hostname() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
}

/// Best-effort local address discovery via a connected (but unsent) UDP socket
fn local_ip() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:80").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}
