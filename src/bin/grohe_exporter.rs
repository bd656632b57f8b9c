// grohe_exporter - Grohe Sense metrics exporter for Prometheus
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use clap::Parser;
use grohe_exporter::api::{http_client, login, ApiClient, DEFAULT_API_URL};
use grohe_exporter::collector::HierarchyCollector;
use grohe_exporter::http::{http_route, RequestContext};
use grohe_exporter::metrics::MetricsExposition;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{io, process};
use tokio::signal::unix::{self, SignalKind};
use tracing::{Instrument, Level};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9441);
const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Export Grohe Sense temperature, humidity, and notifications as Prometheus metrics
///
/// Log in to the Grohe cloud API and, for each scrape by Prometheus, fetch the latest
/// temperature and humidity measurements and notifications of every appliance in every
/// room of every location of the account. Notifications are exposed as the timestamp of
/// the most recent one per category.
///
/// The account is logged in to once at startup. Failures fetching part of the locations,
/// rooms, and appliances result in missing metrics for that part, not a failed scrape.
#[derive(Debug, Parser)]
#[command(name = "grohe_exporter", version = clap::crate_version!())]
struct GroheExporterApplication {
    /// Username (email address) of the Grohe account
    #[arg(long, env = "GROHE_USERNAME")]
    username: String,

    /// Password of the Grohe account
    #[arg(long, env = "GROHE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Base URL of the Grohe API
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Timeout for each request made to the Grohe API, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[arg(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Address to bind to. By default, grohe_exporter will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[arg(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,

    /// Path to expose metrics at
    #[arg(long, default_value = DEFAULT_METRICS_PATH)]
    metrics_path: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let opts = GroheExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let startup = Instant::now();
    let http = http_client(Duration::from_secs(opts.timeout_secs)).unwrap_or_else(|e| {
        tracing::error!(message = "failed to initialize HTTP client", kind = e.kind().as_label(), error = %e);
        process::exit(1)
    });

    let credential = login(&http, &opts.api_url, &opts.username, &opts.password)
        .instrument(tracing::span!(Level::DEBUG, "grohe_login"))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(
                message = "failed to log in to API",
                api_url = %opts.api_url,
                username = %opts.username,
                kind = e.kind().as_label(),
                error = %e,
            );
            process::exit(1)
        });

    tracing::info!(message = "logged in to API", api_url = %opts.api_url, username = %opts.username);

    let client = ApiClient::new(http, opts.api_url.clone(), credential);
    let exposition = MetricsExposition::new(HierarchyCollector::new(client));
    let context = Arc::new(RequestContext::new(exposition, opts.metrics_path.clone()));
    let service = make_service_fn(move |_| {
        let context = context.clone();

        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                http_route(req, context.clone()).instrument(tracing::span!(Level::DEBUG, "grohe_request"))
            }))
        }
    });

    let server = Server::try_bind(&opts.bind).unwrap_or_else(|e| {
        tracing::error!(message = "error starting server", address = %opts.bind, error = %e);
        process::exit(1)
    });

    tracing::info!(message = "starting server", address = %opts.bind, metrics_path = %opts.metrics_path);

    server
        .serve(service)
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!(message = "server shutdown", runtime_secs = %startup.elapsed().as_secs());
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
