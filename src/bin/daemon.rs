//! conndash-daemon: samples the kernel conntrack table on a fixed
//! interval and serves the latest snapshot as JSON.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, routing::get};
use clap::Parser;
use log::{info, warn};
use tokio::{net::TcpListener, sync::RwLock, time::sleep};

use conndash::conntrack;
use conndash::summary;
use conndash::types::{Connection, ConnectionsResponse, SummaryResponse};

const NO_DATA_MESSAGE: &str =
    "No conntrack data found. Make sure connections are active or run the daemon with sudo.";

#[derive(Parser, Debug)]
#[command(name = "conndash-daemon", about = "Serve conntrack snapshots over HTTP")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8000", env = "CONNDASH_ADDR")]
    addr: SocketAddr,

    /// Proc file to fall back to when the conntrack tool is unavailable.
    #[arg(long, default_value = "/proc/net/nf_conntrack", env = "CONNTRACK_PATH")]
    conntrack_path: String,

    /// Seconds between table samples.
    #[arg(long, default_value_t = 2)]
    sample_interval: u64,
}

type SharedConnections = Arc<RwLock<Vec<Connection>>>;

#[derive(Clone)]
struct AppState {
    connections: SharedConnections,
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let state: SharedConnections = Arc::new(RwLock::new(Vec::new()));
    let host = hostname::get().ok().map(|h| h.to_string_lossy().into_owned());

    {
        let state = state.clone();
        let path = args.conntrack_path.clone();
        let interval = Duration::from_secs(args.sample_interval.max(1));
        tokio::spawn(async move {
            loop {
                let flows = conntrack::sample(&path).await;
                if flows.is_empty() {
                    warn!("conntrack sample came back empty");
                }
                {
                    let mut w = state.write().await;
                    *w = flows;
                }
                sleep(interval).await;
            }
        });
    }

    let app_state = AppState { connections: state, host };
    let app = Router::new()
        .route("/api/connections", get(list_connections))
        .route("/api/summary", get(get_summary))
        .with_state(app_state);

    info!("listening on {}", args.addr);
    let listener = TcpListener::bind(args.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn list_connections(State(state): State<AppState>) -> Json<ConnectionsResponse> {
    let snapshot = state.connections.read().await.clone();
    if snapshot.is_empty() {
        // An empty table may mean "nothing tracked" or "not allowed to look".
        if let Some(error) = conntrack::probe_permission().await {
            return Json(ConnectionsResponse {
                success: false,
                error: Some(error),
                host: state.host.clone(),
                ..ConnectionsResponse::default()
            });
        }
        return Json(ConnectionsResponse {
            success: true,
            message: Some(NO_DATA_MESSAGE.to_string()),
            host: state.host.clone(),
            ..ConnectionsResponse::default()
        });
    }
    let count = snapshot.len();
    Json(ConnectionsResponse {
        success: true,
        data: snapshot,
        count,
        host: state.host.clone(),
        ..ConnectionsResponse::default()
    })
}

async fn get_summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let snapshot = state.connections.read().await.clone();
    if snapshot.is_empty() {
        let error = match conntrack::probe_permission().await {
            Some(e) => e,
            None => NO_DATA_MESSAGE.to_string(),
        };
        let mut data = summary::summarize(&[]);
        data.error = Some(error);
        return Json(SummaryResponse {
            success: false,
            data,
            host: state.host.clone(),
        });
    }
    Json(SummaryResponse {
        success: true,
        data: summary::summarize(&snapshot),
        host: state.host.clone(),
    })
}
