use reqwest::Client;

use crate::types::{ConnectionsResponse, SummaryResponse};

/// GET `/api/summary`. Transport, status and decode failures are `Err`;
/// a `success: false` envelope is `Ok` so the caller can render the
/// zeroed payload and its error text.
pub async fn fetch_summary(client: &Client, base_url: &str) -> anyhow::Result<SummaryResponse> {
    let url = format!("{}/api/summary", base_url.trim_end_matches('/'));
    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        anyhow::bail!("status {}", resp.status());
    }
    Ok(resp.json().await?)
}

/// GET `/api/connections`.
pub async fn fetch_connections(
    client: &Client,
    base_url: &str,
) -> anyhow::Result<ConnectionsResponse> {
    let url = format!("{}/api/connections", base_url.trim_end_matches('/'));
    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        anyhow::bail!("status {}", resp.status());
    }
    Ok(resp.json().await?)
}

#[cfg(test)]
mod tests {
    use crate::types::{ConnectionsResponse, SummaryResponse};

    #[test]
    fn decodes_success_connections_envelope() {
        let json = r#"{
            "success": true,
            "data": [
                {"protocol": "tcp", "state": "ESTABLISHED",
                 "src": "10.0.0.1", "dst": "1.1.1.1",
                 "sport": "40000", "dport": "443",
                 "flags": "ASSURED", "mark": "0", "use": "1"}
            ],
            "count": 1
        }"#;
        let resp: ConnectionsResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        assert_eq!(resp.count, 1);
        assert_eq!(resp.data[0].r#use.as_deref(), Some("1"));
        assert_eq!(resp.data[0].flags.as_deref(), Some("ASSURED"));
    }

    #[test]
    fn decodes_failure_connections_envelope() {
        let json = r#"{"success": false, "data": [], "count": 0,
                       "error": "Permission denied"}"#;
        let resp: ConnectionsResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.success);
        assert!(resp.data.is_empty());
        assert_eq!(resp.error.as_deref(), Some("Permission denied"));
    }

    #[test]
    fn decodes_summary_envelope_with_sparse_fields() {
        let json = r#"{"success": true,
                       "data": {"total_connections": 3,
                                "by_protocol": {"TCP": 2, "UDP": 1},
                                "timestamp": "2026-01-01T00:00:00+00:00"}}"#;
        let resp: SummaryResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        assert_eq!(resp.data.total_connections, 3);
        assert_eq!(resp.data.by_protocol["TCP"], 2);
        assert!(resp.data.top_source_ips.is_empty());
    }

    #[test]
    fn decodes_failed_summary_with_error_inside_data() {
        let json = r#"{"success": false,
                       "data": {"total_connections": 0,
                                "error": "No conntrack data found."}}"#;
        let resp: SummaryResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.data.error.as_deref(), Some("No conntrack data found."));
    }
}
