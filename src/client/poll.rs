//! Periodic fetch loop feeding the shared snapshot the UI renders from.
//!
//! Failures never stop the loop; the next tick retries. The two
//! endpoints land independently, so a half-failed poll still refreshes
//! the half that worked.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{debug, warn};
use tokio::sync::{RwLock, mpsc};
use tokio::time::MissedTickBehavior;

use crate::client::fetch;
use crate::types::{Connection, ConnectionsResponse, Summary, SummaryResponse};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Latest data the poller produced. Replaced piecewise on each poll.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub connections: Vec<Connection>,
    pub summary: Summary,
    pub last_update: Option<DateTime<Local>>,
    /// Banner text when the last poll (or the daemon itself) failed.
    pub error: Option<String>,
    pub host: Option<String>,
}

pub type SharedSnapshot = Arc<RwLock<Snapshot>>;

/// Control messages from the UI to the poll loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollCommand {
    RefreshNow,
    SetAutoRefresh(bool),
    Shutdown,
}

pub fn new_shared() -> SharedSnapshot {
    Arc::new(RwLock::new(Snapshot::default()))
}

/// Drive the poll loop until `Shutdown` (or the command channel closes).
pub async fn run(
    base_url: String,
    interval: Duration,
    shared: SharedSnapshot,
    mut commands: mpsc::Receiver<PollCommand>,
) {
    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut auto = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if auto {
                    poll_once(&client, &base_url, &shared).await;
                }
            }
            cmd = commands.recv() => match cmd {
                Some(PollCommand::RefreshNow) => poll_once(&client, &base_url, &shared).await,
                Some(PollCommand::SetAutoRefresh(enabled)) => auto = enabled,
                Some(PollCommand::Shutdown) | None => break,
            }
        }
    }
}

async fn poll_once(client: &reqwest::Client, base_url: &str, shared: &SharedSnapshot) {
    let summary = fetch::fetch_summary(client, base_url).await;
    let connections = fetch::fetch_connections(client, base_url).await;

    let mut snap = shared.write().await;
    snap.error = None;
    apply_summary(&mut snap, summary, base_url);
    apply_connections(&mut snap, connections, base_url);
}

/// Fold a summary fetch into the snapshot. A `success: false` payload
/// still replaces the summary (it carries zeroes plus the error text);
/// a transport error keeps the previous summary.
fn apply_summary(snap: &mut Snapshot, result: anyhow::Result<SummaryResponse>, base_url: &str) {
    match result {
        Ok(resp) => {
            if !resp.success {
                if let Some(msg) = resp.data.error.clone() {
                    snap.error = Some(msg);
                }
            }
            if resp.host.is_some() {
                snap.host = resp.host;
            }
            snap.summary = resp.data;
            snap.last_update = Some(Local::now());
            debug!("summary refreshed: {} connections", snap.summary.total_connections);
        }
        Err(e) => {
            warn!("summary fetch failed: {e}");
            snap.error = Some(format!(
                "Failed to load summary: {e}. Is the daemon running at {base_url}?"
            ));
        }
    }
}

/// Fold a connection-list fetch into the snapshot. A failure envelope
/// empties the list (the daemon had nothing usable); a transport error
/// keeps the previous list so the table degrades instead of flickering.
fn apply_connections(
    snap: &mut Snapshot,
    result: anyhow::Result<ConnectionsResponse>,
    base_url: &str,
) {
    match result {
        Ok(resp) => {
            if !resp.success {
                if let Some(msg) = resp.error.clone() {
                    snap.error = Some(msg);
                }
            }
            if resp.host.is_some() {
                snap.host = resp.host;
            }
            snap.connections = resp.data;
            snap.last_update = Some(Local::now());
            debug!("connection list refreshed: {} rows", snap.connections.len());
        }
        Err(e) => {
            warn!("connections fetch failed: {e}");
            snap.error = Some(format!(
                "Failed to load connections: {e}. Is the daemon running at {base_url}?"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Connection;

    fn one_connection() -> Connection {
        Connection {
            protocol: "tcp".into(),
            state: "ESTABLISHED".into(),
            src: "10.0.0.1".into(),
            dst: "1.1.1.1".into(),
            ..Connection::default()
        }
    }

    #[test]
    fn successful_halves_both_land() {
        let mut snap = Snapshot::default();
        let summary = SummaryResponse {
            success: true,
            data: Summary { total_connections: 1, ..Summary::default() },
            host: Some("node-a".into()),
        };
        let conns = ConnectionsResponse {
            success: true,
            data: vec![one_connection()],
            count: 1,
            ..ConnectionsResponse::default()
        };
        apply_summary(&mut snap, Ok(summary), "http://x");
        apply_connections(&mut snap, Ok(conns), "http://x");

        assert_eq!(snap.summary.total_connections, 1);
        assert_eq!(snap.connections.len(), 1);
        assert_eq!(snap.host.as_deref(), Some("node-a"));
        assert!(snap.error.is_none());
        assert!(snap.last_update.is_some());
    }

    #[test]
    fn transport_error_keeps_previous_half() {
        let mut snap = Snapshot {
            connections: vec![one_connection()],
            summary: Summary { total_connections: 1, ..Summary::default() },
            ..Snapshot::default()
        };
        apply_connections(&mut snap, Err(anyhow::anyhow!("connection refused")), "http://x");

        assert_eq!(snap.connections.len(), 1, "previous rows survive");
        let banner = snap.error.as_deref().unwrap();
        assert!(banner.contains("connection refused"));
        assert!(banner.contains("http://x"));
    }

    #[test]
    fn partial_failure_still_renders_successful_half() {
        let mut snap = Snapshot::default();
        apply_summary(&mut snap, Err(anyhow::anyhow!("timeout")), "http://x");
        let conns = ConnectionsResponse {
            success: true,
            data: vec![one_connection()],
            count: 1,
            ..ConnectionsResponse::default()
        };
        apply_connections(&mut snap, Ok(conns), "http://x");

        assert_eq!(snap.connections.len(), 1, "connection rows land despite summary failure");
        assert!(snap.error.as_deref().unwrap().contains("summary"));
    }

    #[test]
    fn summary_failure_banner_set_when_connections_also_fail() {
        let mut snap = Snapshot::default();
        apply_summary(&mut snap, Err(anyhow::anyhow!("timeout")), "http://x");
        apply_connections(&mut snap, Err(anyhow::anyhow!("timeout")), "http://x");
        assert!(snap.error.as_deref().unwrap().contains("connections"));
    }

    #[test]
    fn failure_envelope_replaces_with_error_payload() {
        let mut snap = Snapshot {
            connections: vec![one_connection()],
            ..Snapshot::default()
        };
        let resp = ConnectionsResponse {
            success: false,
            error: Some("Permission denied".into()),
            ..ConnectionsResponse::default()
        };
        apply_connections(&mut snap, Ok(resp), "http://x");

        assert!(snap.connections.is_empty());
        assert_eq!(snap.error.as_deref(), Some("Permission denied"));
    }

    #[test]
    fn failed_summary_envelope_lands_zeroed_payload() {
        let mut snap = Snapshot {
            summary: Summary { total_connections: 9, ..Summary::default() },
            ..Snapshot::default()
        };
        let resp = SummaryResponse {
            success: false,
            data: Summary {
                total_connections: 0,
                error: Some("No conntrack data found.".into()),
                ..Summary::default()
            },
            host: None,
        };
        apply_summary(&mut snap, Ok(resp), "http://x");

        assert_eq!(snap.summary.total_connections, 0);
        assert_eq!(snap.error.as_deref(), Some("No conntrack data found."));
    }
}
