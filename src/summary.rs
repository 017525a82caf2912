//! Aggregations over a connection snapshot, served by `/api/summary`.

use std::collections::BTreeMap;

use chrono::Local;

use crate::types::{Connection, IpCount, PortCount, Summary};

pub const TOP_N: usize = 10;

pub fn by_protocol(connections: &[Connection]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for conn in connections {
        *counts.entry(conn.protocol.to_uppercase()).or_insert(0) += 1;
    }
    counts
}

pub fn by_state(connections: &[Connection]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for conn in connections {
        *counts.entry(conn.state.clone()).or_insert(0) += 1;
    }
    counts
}

fn top_ips<'a, F>(connections: &'a [Connection], top_n: usize, field: F) -> Vec<IpCount>
where
    F: Fn(&'a Connection) -> &'a str,
{
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for conn in connections {
        *counts.entry(field(conn)).or_insert(0) += 1;
    }
    let mut ranked: Vec<IpCount> = counts
        .into_iter()
        .map(|(ip, count)| IpCount { ip: ip.to_string(), count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(top_n);
    ranked
}

pub fn top_source_ips(connections: &[Connection], top_n: usize) -> Vec<IpCount> {
    top_ips(connections, top_n, |c| &c.src)
}

pub fn top_destination_ips(connections: &[Connection], top_n: usize) -> Vec<IpCount> {
    top_ips(connections, top_n, |c| &c.dst)
}

#[derive(Clone, Copy)]
pub enum PortField {
    Source,
    Destination,
}

/// Top ports by connection count. Ties break toward the higher port
/// number so repeated snapshots rank identically.
pub fn top_ports(connections: &[Connection], field: PortField, top_n: usize) -> Vec<PortCount> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for conn in connections {
        let port = match field {
            PortField::Source => conn.sport.as_deref(),
            PortField::Destination => conn.dport.as_deref(),
        };
        if let Some(port) = port {
            *counts.entry(port).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<PortCount> = counts
        .into_iter()
        .map(|(port, count)| PortCount { port: port.to_string(), count })
        .collect();
    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| port_num(&b.port).cmp(&port_num(&a.port)))
    });
    ranked.truncate(top_n);
    ranked
}

fn port_num(port: &str) -> u64 {
    port.parse().unwrap_or(0)
}

pub fn protocol_state_matrix(
    connections: &[Connection],
) -> BTreeMap<String, BTreeMap<String, u64>> {
    let mut matrix: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for conn in connections {
        *matrix
            .entry(conn.protocol.to_uppercase())
            .or_default()
            .entry(conn.state.clone())
            .or_insert(0) += 1;
    }
    matrix
}

/// Build the full summary payload for the current snapshot.
pub fn summarize(connections: &[Connection]) -> Summary {
    Summary {
        total_connections: connections.len(),
        by_protocol: by_protocol(connections),
        by_state: by_state(connections),
        top_source_ips: top_source_ips(connections, TOP_N),
        top_destination_ips: top_destination_ips(connections, TOP_N),
        top_destination_ports: top_ports(connections, PortField::Destination, TOP_N),
        top_source_ports: top_ports(connections, PortField::Source, TOP_N),
        protocol_state_matrix: protocol_state_matrix(connections),
        timestamp: Local::now().to_rfc3339(),
        error: None,
    }
}
