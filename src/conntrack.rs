//! Reads the kernel connection-tracking table.
//!
//! Sources are tried in order: `conntrack -L`, `conntrack -L -o extended`,
//! `/proc/net/nf_conntrack`, `/proc/net/ip_conntrack`. Any failure falls
//! through to the next source; an empty table is not an error.

use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use tokio::process::Command;
use tokio::time::timeout;

use crate::types::Connection;

const CONNTRACK_TIMEOUT: Duration = Duration::from_secs(5);

/// States the `conntrack` tool prints between the timeout column and the
/// key=value pairs. Stateless protocols (udp, icmp) omit the column.
const KNOWN_STATES: &[&str] = &[
    "TIME_WAIT",
    "ESTABLISHED",
    "CLOSE",
    "CLOSE_WAIT",
    "SYN_SENT",
    "SYN_RECV",
    "FIN_WAIT",
    "LAST_ACK",
    "LISTEN",
    "NEW",
    "RELATED",
];

/// Fetch the current connection table, trying each source in turn.
pub async fn sample(proc_path: &str) -> Vec<Connection> {
    if let Some(out) = run_conntrack(&["-L"]).await {
        let conns = parse_conntrack_output(&out);
        if !conns.is_empty() {
            return conns;
        }
    }
    if let Some(out) = run_conntrack(&["-L", "-o", "extended"]).await {
        let conns = parse_conntrack_output(&out);
        if !conns.is_empty() {
            return conns;
        }
    }
    for path in [proc_path, "/proc/net/ip_conntrack"] {
        match tokio::fs::read_to_string(path).await {
            Ok(content) if !content.trim().is_empty() => {
                debug!("parsed conntrack table from {path}");
                return parse_proc_content(&content);
            }
            Ok(_) => {}
            Err(e) => debug!("cannot read {path}: {e}"),
        }
    }
    Vec::new()
}

/// When a sample comes back empty, distinguish "no connections" from
/// "not allowed to look". Returns an error string for the latter.
pub async fn probe_permission() -> Option<String> {
    let child = Command::new("conntrack")
        .arg("-L")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();
    let output = timeout(Duration::from_secs(2), child).await.ok()?.ok()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if stderr.contains("root") || stderr.contains("permission") {
            return Some(
                "Permission denied: conntrack requires root access. \
                 Run the daemon with sudo or grant CAP_NET_ADMIN."
                    .to_string(),
            );
        }
    }
    None
}

async fn run_conntrack(args: &[&str]) -> Option<String> {
    let child = Command::new("conntrack")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output();
    match timeout(CONNTRACK_TIMEOUT, child).await {
        Ok(Ok(output)) if output.status.success() => {
            let out = String::from_utf8_lossy(&output.stdout).into_owned();
            if out.trim().is_empty() { None } else { Some(out) }
        }
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            debug!("conntrack {args:?} failed to run: {e}");
            None
        }
        Err(_) => {
            warn!("conntrack {args:?} timed out after {CONNTRACK_TIMEOUT:?}");
            None
        }
    }
}

/// Parse `conntrack -L` output.
pub fn parse_conntrack_output(output: &str) -> Vec<Connection> {
    output.lines().filter_map(parse_conntrack_line).collect()
}

/// One `conntrack -L` line:
/// `tcp 6 94 TIME_WAIT src=10.0.0.1 dst=10.0.0.2 sport=43022 dport=443 ... [ASSURED] mark=0 use=1`
/// The state column is absent for stateless protocols; key=value pairs
/// repeat for the reply direction, so only the first src/dst/sport/dport
/// is taken. mark/use take the last occurrence.
fn parse_conntrack_line(line: &str) -> Option<Connection> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }

    let mut conn = Connection {
        protocol: parts[0].to_string(),
        ..Connection::default()
    };

    let state_token = parts[3];
    let looks_like_state = KNOWN_STATES.contains(&state_token)
        || (!state_token.contains('=')
            && !state_token.chars().all(|c| c.is_ascii_digit())
            && !state_token.starts_with('['));
    let kv_start = if looks_like_state {
        conn.state = state_token.to_string();
        4
    } else {
        conn.state = "NONE".to_string();
        3
    };

    let mut src = None;
    let mut dst = None;
    let mut flags: Vec<&str> = Vec::new();
    for part in &parts[kv_start..] {
        if let Some((key, value)) = part.split_once('=') {
            match key {
                "src" if src.is_none() => src = Some(value.to_string()),
                "dst" if dst.is_none() => dst = Some(value.to_string()),
                "sport" if conn.sport.is_none() => conn.sport = Some(value.to_string()),
                "dport" if conn.dport.is_none() => conn.dport = Some(value.to_string()),
                "mark" => conn.mark = Some(value.to_string()),
                "use" => conn.r#use = Some(value.to_string()),
                _ => {}
            }
        } else if part.starts_with('[') && part.ends_with(']') {
            flags.push(part.trim_matches(['[', ']']));
        }
    }
    if !flags.is_empty() {
        conn.flags = Some(flags.join(","));
    }

    conn.src = src?;
    conn.dst = dst?;
    Some(conn)
}

/// Parse `/proc/net/nf_conntrack` content.
pub fn parse_proc_content(content: &str) -> Vec<Connection> {
    content.lines().filter_map(parse_proc_line).collect()
}

/// One proc line:
/// `ipv4 2 tcp 6 119 TIME_WAIT src=192.168.1.100 dst=10.0.0.1 sport=54321 dport=80 ...`
/// Protocol sits at column 2; the state is the first bare uppercase token
/// after it (stateless rows go straight to key=value pairs).
fn parse_proc_line(line: &str) -> Option<Connection> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }

    let mut conn = Connection {
        protocol: parts[2].to_string(),
        state: "UNKNOWN".to_string(),
        ..Connection::default()
    };

    let mut src = None;
    let mut dst = None;
    let mut flags: Vec<&str> = Vec::new();
    for part in &parts[3..] {
        if let Some((key, value)) = part.split_once('=') {
            match key {
                "src" if src.is_none() => src = Some(value.to_string()),
                "dst" if dst.is_none() => dst = Some(value.to_string()),
                "sport" if conn.sport.is_none() => conn.sport = Some(value.to_string()),
                "dport" if conn.dport.is_none() => conn.dport = Some(value.to_string()),
                "mark" => conn.mark = Some(value.to_string()),
                "use" => conn.r#use = Some(value.to_string()),
                _ => {}
            }
        } else if part.starts_with('[') && part.ends_with(']') {
            flags.push(part.trim_matches(['[', ']']));
        } else if conn.state == "UNKNOWN" && !part.chars().all(|c| c.is_ascii_digit()) {
            conn.state = part.to_string();
        }
    }
    if !flags.is_empty() {
        conn.flags = Some(flags.join(","));
    }

    conn.src = src?;
    conn.dst = dst?;
    Some(conn)
}
