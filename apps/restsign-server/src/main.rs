//! RestSign Server - HTTP server enforcing HMAC-SHA256 request signatures.
//!
//! Every request is canonicalized, audit-logged and, on endpoints that
//! enforce signing, verified against the `hisv` header before it reaches the
//! echo handler. Unsigned or mis-signed requests get a 416 plain-text reply.
//!
//! # Usage
//!
//! ```text
//! SIGN_SECRET=change-me SIGN_ROUTES_FILE=routes.json restsign-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `SIGN_SECRET` | *(required)* | Shared HMAC secret |
//! | `SIGN_ROUTES_FILE` | *(unset)* | JSON route table |
//! | `SIGN_DEFAULT_IGNORE` | `true` | Skip verification where the route table is silent |
//! | `SIGN_LOG_VALUE_MAX_CHARS` | `200` | Cap of logged parameter values |
//! | `SIGN_LOG_BODY_MAX_CHARS` | `4096` | Cap of logged bodies |
//! | `SIGN_FILE_DIGEST` | `md5` | Digest of uploaded files (`md5`, `sha256`) |
//! | `SIGN_PUBLIC_SCHEME` | `http` | Scheme used to rebuild request URLs |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod handler;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use restsign_auth::{PolicyTable, RequestAuditor};
use restsign_core::{RestSignConfig, RouteTableConfig};
use restsign_http::RestHandler;
use restsign_http::service::{RestSignHttpConfig, RestSignService};

use crate::handler::EchoHandler;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Load the route table and resolve it into endpoint policies.
fn build_policies(config: &RestSignConfig) -> Result<PolicyTable> {
    let Some(path) = config.routes_file.as_deref() else {
        return Ok(PolicyTable::with_default(config.default_ignore_sign));
    };

    let routes = RouteTableConfig::load(path)
        .with_context(|| format!("failed to load route table {path}"))?;
    PolicyTable::resolve(&routes, config.default_ignore_sign)
        .with_context(|| format!("invalid route table {path}"))
}

/// Build the HTTP service from the application configuration.
fn build_service<H: RestHandler>(handler: H, config: &RestSignConfig) -> Result<RestSignService<H>> {
    config.validate().context("invalid configuration")?;

    let auditor = RequestAuditor::from_config(config).context("invalid signing configuration")?;
    let policies = build_policies(config)?;
    let http_config = RestSignHttpConfig {
        public_scheme: config.public_scheme.clone(),
    };

    Ok(RestSignService::new(handler, auditor, policies, http_config))
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve<H: RestHandler>(listener: TcpListener, service: RestSignService<H>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Perform a health check by connecting to the gateway and requesting the health endpoint.
///
/// Exits with code 0 if healthy, 1 otherwise.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let config = RestSignConfig::from_env();
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let config = RestSignConfig::from_env();

    init_tracing(&config.log_level)?;

    info!(
        gateway_listen = %config.gateway_listen,
        routes_file = ?config.routes_file,
        default_ignore_sign = config.default_ignore_sign,
        file_digest = %config.file_digest,
        version = VERSION,
        "starting RestSign Server",
    );

    let service = build_service(EchoHandler, &config)?;

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
