//! StoragePool Operator
//!
//! Runs the StoragePool service against the Kubernetes cluster and the
//! configured storage-management endpoint, exposing health and metrics.

use clap::Parser;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storagepool_operator::{
    Collaborators, ConfigInfo, ConfigMapFeatureGate, Error, HttpEndpointConnector,
    KubeControllerFactory, KubeCrdRegistrar, Result, ServiceRegistry, ServiceStats,
    SessionChangeListener, StoragePoolService,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// StoragePool Operator - capacity, migration and decommission of storage pools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the service configuration (YAML)
    #[arg(long, env = "STORAGEPOOL_CONFIG", default_value = "/etc/storagepool/config.yaml")]
    config: String,

    /// Override the cluster ID from the configuration file
    #[arg(long, env = "CLUSTER_ID")]
    cluster_id: Option<String>,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting StoragePool Operator");
    info!("  Version: {}", storagepool_operator::VERSION);
    info!("  Config: {}", args.config);

    let mut config = ConfigInfo::load(&args.config)?;
    if let Some(cluster_id) = &args.cluster_id {
        config.cluster_id = cluster_id.clone();
        config.validate()?;
    }
    info!("  Cluster: {}", config.cluster_id);
    info!("  Endpoint: {}", config.endpoint.base_url());

    let client = kube::Client::try_default().await?;

    let service = StoragePoolService::new(Collaborators {
        registrar: Arc::new(KubeCrdRegistrar::new(client.clone())),
        connector: Arc::new(HttpEndpointConnector::new()),
        feature_gate: Arc::new(ConfigMapFeatureGate::new(client.clone(), &config.feature_states)),
        factory: Arc::new(KubeControllerFactory::new(client, config.provisioner.clone())),
        listener: Arc::new(SessionChangeListener::new(config.listener_interval())),
    });

    // Readiness stays false until initialization publishes the service
    let health_addr = args.health_addr.clone();
    let registry = service.registry().clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, registry).await {
            error!("Health server error: {}", e);
        }
    });

    let metrics_addr = args.metrics_addr.clone();
    let stats = service.stats().clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, stats).await {
            error!("Metrics server error: {}", e);
        }
    });

    if let Err(e) = service.initialize(&config).await {
        error!(
            "StoragePool service failed to start (transient: {}): {}",
            e.is_transient(),
            e
        );
        return Err(e);
    }

    let keepalive = service.spawn_keepalive(config.endpoint.clone(), config.keepalive_interval());

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    service.shutdown().await;
    if let Err(e) = keepalive.await {
        error!("Session keepalive task failed: {}", e);
    }

    info!("Operator shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let directive = |d: &str| -> Result<tracing_subscriber::filter::Directive> {
        d.parse()
            .map_err(|e| Error::Configuration(format!("Invalid log directive {}: {}", d, e)))
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("kube=info")?)
        .add_directive(directive("reqwest=info")?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

// =============================================================================
// Health Server
// =============================================================================

fn text_response(status: hyper::StatusCode, body: &'static str) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(hyper::Body::from(body));
    *response.status_mut() = status;
    response
}

async fn run_health_server(addr: &str, registry: Arc<ServiceRegistry>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let registry = registry.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let ready = registry.is_populated();
                async move {
                    let response = match req.uri().path() {
                        "/healthz" | "/livez" => text_response(StatusCode::OK, "ok"),
                        "/readyz" if ready => text_response(StatusCode::OK, "ok"),
                        "/readyz" => text_response(StatusCode::SERVICE_UNAVAILABLE, "initializing"),
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

/// Gauges mirroring [`ServiceStats`], refreshed on every scrape
struct StatsGauges {
    resets_applied: prometheus::IntGauge,
    resets_rejected: prometheus::IntGauge,
    reconnects: prometheus::IntGauge,
    activator_polls: prometheus::IntGauge,
    activation_failures: prometheus::IntGauge,
    decommission_active: prometheus::IntGauge,
}

impl StatsGauges {
    fn register() -> Result<Self> {
        let gauge = |name: &str, help: &str| {
            prometheus::register_int_gauge!(name, help)
                .map_err(|e| Error::Internal(format!("Failed to register {}: {}", name, e)))
        };
        Ok(Self {
            resets_applied: gauge(
                "storagepool_connection_resets_applied",
                "Connection resets installed in every controller",
            )?,
            resets_rejected: gauge(
                "storagepool_connection_resets_rejected",
                "Connection resets rejected or ignored",
            )?,
            reconnects: gauge(
                "storagepool_endpoint_reconnects",
                "Fresh endpoint sessions opened after startup",
            )?,
            activator_polls: gauge(
                "storagepool_decommission_gate_checks",
                "Feature gate checks made by the decommission activator",
            )?,
            activation_failures: gauge(
                "storagepool_decommission_start_failures",
                "Failed decommission controller starts",
            )?,
            decommission_active: gauge(
                "storagepool_decommission_active",
                "Whether the decommission controller is running",
            )?,
        })
    }

    fn update(&self, stats: &ServiceStats) {
        let snapshot = stats.snapshot();
        let count = |value: u64| i64::try_from(value).unwrap_or(i64::MAX);
        self.resets_applied.set(count(snapshot.resets_applied));
        self.resets_rejected.set(count(snapshot.resets_rejected));
        self.reconnects.set(count(snapshot.reconnects));
        self.activator_polls.set(count(snapshot.activator_polls));
        self.activation_failures.set(count(snapshot.activation_failures));
        self.decommission_active
            .set(i64::from(snapshot.decommission_active));
    }
}

async fn run_metrics_server(addr: &str, stats: Arc<ServiceStats>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};
    use prometheus::{Encoder, TextEncoder};

    let gauges = Arc::new(StatsGauges::register()?);

    let make_svc = make_service_fn(move |_conn| {
        let gauges = gauges.clone();
        let stats = stats.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let gauges = gauges.clone();
                let stats = stats.clone();
                async move {
                    if req.uri().path() != "/metrics" {
                        return Ok::<_, Infallible>(text_response(StatusCode::NOT_FOUND, "not found"));
                    }

                    gauges.update(&stats);
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();
                    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
                        error!("Failed to encode metrics: {}", e);
                        return Ok(text_response(StatusCode::INTERNAL_SERVER_ERROR, "encode error"));
                    }

                    let mut response = Response::new(Body::from(buffer));
                    if let Ok(content_type) = encoder.format_type().parse() {
                        response
                            .headers_mut()
                            .insert(hyper::header::CONTENT_TYPE, content_type);
                    }
                    Ok(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
