mod api;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uiadriver::{Driver, DriverConfig};

#[derive(Parser, Debug)]
#[command(name = "uiadriver-server")]
#[command(about = "W3C WebDriver server for Windows UI Automation")]
struct Args {
    /// Address to bind
    #[arg(long, env = "UIADRIVER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "UIADRIVER_PORT", default_value_t = 4723)]
    port: u16,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, env = "UIADRIVER_LOG", default_value = "info")]
    log_level: String,

    /// Enable CORS for all origins
    #[arg(long)]
    cors: bool,

    /// How long to wait for an application window when a session starts
    #[arg(long, default_value_t = 10.0)]
    session_timeout_secs: f64,

    /// Retry window for transient accessibility failures
    #[arg(long, default_value_t = 5.0)]
    read_timeout_secs: f64,

    /// Device-independent to physical pixel ratio for coordinate locators
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
}

impl Args {
    fn driver_config(&self) -> anyhow::Result<DriverConfig> {
        anyhow::ensure!(self.scale > 0.0, "--scale must be positive");
        Ok(DriverConfig {
            session_timeout: Duration::try_from_secs_f64(self.session_timeout_secs)?,
            read_timeout: Duration::try_from_secs_f64(self.read_timeout_secs)?,
            scale: self.scale,
            ..DriverConfig::default()
        })
    }
}

fn router(driver: Driver) -> Router {
    Router::new()
        .route("/status", get(api::status))
        .route("/session", post(api::new_session))
        .route("/session/{sid}", axum::routing::delete(api::delete_session))
        .route(
            "/session/{sid}/timeouts",
            get(api::get_timeouts).post(api::set_timeouts),
        )
        .route("/session/{sid}/source", get(api::page_source))
        .route("/session/{sid}/screenshot", get(api::screenshot))
        .route("/session/{sid}/snapshot", post(api::create_snapshot))
        .route("/session/{sid}/element", post(api::find_element))
        .route("/session/{sid}/elements", post(api::find_elements))
        .route("/session/{sid}/element/active", get(api::active_element))
        .route(
            "/session/{sid}/element/{eid}/element",
            post(api::find_element_from_element),
        )
        .route(
            "/session/{sid}/element/{eid}/elements",
            post(api::find_elements_from_element),
        )
        .route("/session/{sid}/element/{eid}/click", post(api::element_click))
        .route("/session/{sid}/element/{eid}/clear", post(api::element_clear))
        .route("/session/{sid}/element/{eid}/value", post(api::element_send_keys))
        .route("/session/{sid}/element/{eid}/text", get(api::element_text))
        .route("/session/{sid}/element/{eid}/name", get(api::element_tag_name))
        .route(
            "/session/{sid}/element/{eid}/attribute/{name}",
            get(api::element_attribute),
        )
        .route("/session/{sid}/element/{eid}/rect", get(api::element_rect))
        .route("/session/{sid}/element/{eid}/enabled", get(api::element_enabled))
        .route("/session/{sid}/element/{eid}/selected", get(api::element_selected))
        .route("/session/{sid}/element/{eid}/displayed", get(api::element_displayed))
        .layer(TraceLayer::new_for_http())
        .with_state(driver)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting uiadriver-server v{}", env!("CARGO_PKG_VERSION"));

    let driver = Driver::new(args.driver_config()?)?;

    let mut app = router(driver);
    if args.cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(cors = args.cors, "listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
