//! Shapes `Summary` payloads into widget-ready chart data. No drawing
//! happens here; `tui` feeds these into ratatui widgets.

use std::collections::BTreeMap;

use ratatui::style::Color;

use crate::types::{IpCount, PortCount, Summary};

/// Fixed palette cycled by index, mirroring the dashboard accent colors.
pub const PALETTE: [Color; 15] = [
    Color::Rgb(0x66, 0x7e, 0xea),
    Color::Rgb(0x76, 0x4b, 0xa2),
    Color::Rgb(0xf0, 0x93, 0xfb),
    Color::Rgb(0x4f, 0xac, 0xfe),
    Color::Rgb(0x00, 0xf2, 0xfe),
    Color::Rgb(0x43, 0xe9, 0x7b),
    Color::Rgb(0xfa, 0x70, 0x9a),
    Color::Rgb(0xfe, 0xe1, 0x40),
    Color::Rgb(0x30, 0xcf, 0xd0),
    Color::Rgb(0xa8, 0xed, 0xea),
    Color::Rgb(0xfe, 0xd6, 0xe3),
    Color::Rgb(0xff, 0xec, 0xd2),
    Color::Rgb(0xfc, 0xb6, 0x9f),
    Color::Rgb(0xff, 0x9a, 0x9e),
    Color::Rgb(0xfe, 0xcf, 0xef),
];

pub fn palette_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

/// One slice of the protocol-share chart.
#[derive(Clone, Debug, PartialEq)]
pub struct ShareSlice {
    pub label: String,
    pub count: u64,
    pub percent: f64,
    pub color: Color,
}

/// Protocol share with percent-of-total, descending by count.
pub fn protocol_share(by_protocol: &BTreeMap<String, u64>) -> Vec<ShareSlice> {
    let total: u64 = by_protocol.values().sum();
    let mut slices: Vec<ShareSlice> = by_protocol
        .iter()
        .map(|(label, &count)| ShareSlice {
            label: label.clone(),
            count,
            percent: if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            },
            color: Color::Reset,
        })
        .collect();
    slices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    for (i, slice) in slices.iter_mut().enumerate() {
        slice.color = palette_color(i);
    }
    slices
}

/// Count map to (label, value) bars, descending by value.
pub fn count_bars(counts: &BTreeMap<String, u64>) -> Vec<(String, u64)> {
    let mut bars: Vec<(String, u64)> =
        counts.iter().map(|(k, &v)| (k.clone(), v)).collect();
    bars.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    bars
}

pub fn ip_bars(top: &[IpCount]) -> Vec<(String, u64)> {
    top.iter().map(|e| (e.ip.clone(), e.count)).collect()
}

pub fn port_bars(top: &[PortCount]) -> Vec<(String, u64)> {
    top.iter()
        .map(|e| (format!("Port {}", e.port), e.count))
        .collect()
}

/// Grouped-bar rendition of the protocol x state matrix: one group per
/// protocol, one bar per state, states colored consistently across
/// groups.
#[derive(Clone, Debug, Default)]
pub struct MatrixChart {
    /// Legend: every state seen in any protocol, with its color.
    pub states: Vec<(String, Color)>,
    /// (protocol, per-state values aligned with `states`).
    pub groups: Vec<(String, Vec<u64>)>,
}

pub fn matrix_chart(matrix: &BTreeMap<String, BTreeMap<String, u64>>) -> MatrixChart {
    let mut state_names: Vec<String> = Vec::new();
    for states in matrix.values() {
        for state in states.keys() {
            if !state_names.contains(state) {
                state_names.push(state.clone());
            }
        }
    }

    let states = state_names
        .iter()
        .enumerate()
        .map(|(i, s)| (s.clone(), palette_color(i)))
        .collect();

    let groups = matrix
        .iter()
        .map(|(protocol, counts)| {
            let values = state_names
                .iter()
                .map(|s| counts.get(s).copied().unwrap_or(0))
                .collect();
            (protocol.clone(), values)
        })
        .collect();

    MatrixChart { states, groups }
}

/// Badge color per protocol; unknown protocols share a fallback.
pub fn protocol_color(protocol: &str) -> Color {
    match protocol.to_lowercase().as_str() {
        "tcp" => Color::Rgb(0x43, 0xe9, 0x7b),
        "udp" => Color::Rgb(0x4f, 0xac, 0xfe),
        "icmp" | "icmpv6" => Color::Rgb(0xfe, 0xe1, 0x40),
        "gre" => Color::Rgb(0xf0, 0x93, 0xfb),
        "esp" | "ah" => Color::Rgb(0x76, 0x4b, 0xa2),
        _ => Color::Rgb(0x9a, 0xa5, 0xb1),
    }
}

/// Badge color per conntrack state.
pub fn state_color(state: &str) -> Color {
    match state.to_uppercase().as_str() {
        "ESTABLISHED" => Color::Rgb(0x43, 0xe9, 0x7b),
        "TIME_WAIT" | "TIME-WAIT" => Color::Rgb(0xfe, 0xe1, 0x40),
        "SYN_SENT" | "SYN_RECV" => Color::Rgb(0x4f, 0xac, 0xfe),
        "FIN_WAIT" | "CLOSE_WAIT" | "LAST_ACK" | "CLOSE" => Color::Rgb(0xfa, 0x70, 0x9a),
        "NONE" | "UNKNOWN" => Color::Rgb(0x9a, 0xa5, 0xb1),
        _ => Color::Rgb(0x66, 0x7e, 0xea),
    }
}

/// Flag badge color; ASSURED and UNREPLIED get their own.
pub fn flag_color(flag: &str) -> Color {
    match flag.to_uppercase().as_str() {
        "ASSURED" => Color::Rgb(0x43, 0xe9, 0x7b),
        "UNREPLIED" => Color::Rgb(0xfa, 0x70, 0x9a),
        _ => Color::Rgb(0x66, 0x7e, 0xea),
    }
}
