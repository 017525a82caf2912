use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One tracked flow as reported by conntrack. Field values stay in the
/// string form the kernel tools print them in; absent fields are omitted
/// on the wire and rendered as "-".
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Connection {
    pub protocol: String,
    pub state: String,
    pub src: String,
    pub dst: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#use: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct IpCount {
    pub ip: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PortCount {
    pub port: String,
    pub count: u64,
}

/// Aggregate view of one connection snapshot.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Summary {
    pub total_connections: usize,
    #[serde(default)]
    pub by_protocol: BTreeMap<String, u64>,
    #[serde(default)]
    pub by_state: BTreeMap<String, u64>,
    #[serde(default)]
    pub top_source_ips: Vec<IpCount>,
    #[serde(default)]
    pub top_destination_ips: Vec<IpCount>,
    #[serde(default)]
    pub top_destination_ports: Vec<PortCount>,
    #[serde(default)]
    pub top_source_ports: Vec<PortCount>,
    #[serde(default)]
    pub protocol_state_matrix: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Envelope for `GET /api/connections`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConnectionsResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<Connection>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Envelope for `GET /api/summary`. Failures still carry a zeroed
/// `data` payload with the error text inside it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub data: Summary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl Connection {
    /// Display form of an optional field.
    pub fn field_or_dash(value: Option<&str>) -> &str {
        match value {
            Some(v) if !v.is_empty() => v,
            _ => "-",
        }
    }

    pub fn sport_display(&self) -> &str {
        Self::field_or_dash(self.sport.as_deref())
    }

    pub fn dport_display(&self) -> &str {
        Self::field_or_dash(self.dport.as_deref())
    }

    pub fn flags_display(&self) -> &str {
        Self::field_or_dash(self.flags.as_deref())
    }

    pub fn mark_display(&self) -> &str {
        Self::field_or_dash(self.mark.as_deref())
    }

    pub fn use_display(&self) -> &str {
        Self::field_or_dash(self.r#use.as_deref())
    }
}
