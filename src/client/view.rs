//! Filtering, sorting and display-limiting of the connection table.
//!
//! Everything here is a pure function over `ViewState` plus the most
//! recent snapshot, so the displayed rows are always a deterministic
//! subset of the last fetch.

use std::cmp::Ordering;

use crate::types::Connection;

/// Table columns that can drive the sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortColumn {
    Protocol,
    State,
    Src,
    Sport,
    Dst,
    Dport,
    Flags,
    Mark,
    Use,
}

impl SortColumn {
    pub const ALL: [SortColumn; 9] = [
        SortColumn::Protocol,
        SortColumn::State,
        SortColumn::Src,
        SortColumn::Sport,
        SortColumn::Dst,
        SortColumn::Dport,
        SortColumn::Flags,
        SortColumn::Mark,
        SortColumn::Use,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SortColumn::Protocol => "Proto",
            SortColumn::State => "State",
            SortColumn::Src => "Source",
            SortColumn::Sport => "SPort",
            SortColumn::Dst => "Destination",
            SortColumn::Dport => "DPort",
            SortColumn::Flags => "Flags",
            SortColumn::Mark => "Mark",
            SortColumn::Use => "Use",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Display-limit presets cycled by the UI; `None` shows everything.
pub const LIMIT_CHOICES: [Option<usize>; 5] = [Some(25), Some(50), Some(100), Some(250), None];

pub const DEFAULT_LIMIT: Option<usize> = Some(100);

/// Everything the user can twiddle. Not persisted anywhere.
#[derive(Clone, Debug)]
pub struct ViewState {
    pub search: String,
    pub protocol_filter: Option<String>,
    pub state_filter: Option<String>,
    pub sort: Option<(SortColumn, SortDirection)>,
    pub limit: Option<usize>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            search: String::new(),
            protocol_filter: None,
            state_filter: None,
            sort: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ViewState {
    /// Clicking the current sort column toggles direction; a new column
    /// resets to ascending.
    pub fn toggle_sort(&mut self, column: SortColumn) {
        self.sort = match self.sort {
            Some((current, SortDirection::Ascending)) if current == column => {
                Some((column, SortDirection::Descending))
            }
            Some((current, SortDirection::Descending)) if current == column => {
                Some((column, SortDirection::Ascending))
            }
            _ => Some((column, SortDirection::Ascending)),
        };
    }

    pub fn cycle_limit(&mut self) {
        let idx = LIMIT_CHOICES.iter().position(|l| *l == self.limit).unwrap_or(0);
        self.limit = LIMIT_CHOICES[(idx + 1) % LIMIT_CHOICES.len()];
    }
}

fn matches(conn: &Connection, view: &ViewState) -> bool {
    let search = view.search.to_lowercase();
    let match_search = search.is_empty()
        || conn.src.to_lowercase().contains(&search)
        || conn.dst.to_lowercase().contains(&search)
        || conn.sport.as_deref().is_some_and(|p| p.contains(&search))
        || conn.dport.as_deref().is_some_and(|p| p.contains(&search))
        || conn.protocol.to_lowercase().contains(&search)
        || conn.state.to_lowercase().contains(&search);

    let match_protocol = view
        .protocol_filter
        .as_deref()
        .is_none_or(|p| conn.protocol == p);
    let match_state = view.state_filter.as_deref().is_none_or(|s| conn.state == s);

    match_search && match_protocol && match_state
}

/// Filter the raw snapshot, then apply the active sort.
pub fn apply<'a>(connections: &'a [Connection], view: &ViewState) -> Vec<&'a Connection> {
    let mut filtered: Vec<&Connection> =
        connections.iter().filter(|c| matches(c, view)).collect();
    if let Some((column, direction)) = view.sort {
        sort(&mut filtered, column, direction);
    }
    filtered
}

/// Stable per-column sort.
pub fn sort(rows: &mut [&Connection], column: SortColumn, direction: SortDirection) {
    rows.sort_by(|a, b| {
        let ord = compare(a, b, column);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

fn compare(a: &Connection, b: &Connection, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Sport => numeric_key(a.sport.as_deref()).cmp(&numeric_key(b.sport.as_deref())),
        SortColumn::Dport => numeric_key(a.dport.as_deref()).cmp(&numeric_key(b.dport.as_deref())),
        SortColumn::Mark => numeric_key(a.mark.as_deref()).cmp(&numeric_key(b.mark.as_deref())),
        SortColumn::Use => numeric_key(a.r#use.as_deref()).cmp(&numeric_key(b.r#use.as_deref())),
        SortColumn::Src => ip_key(&a.src).cmp(&ip_key(&b.src)),
        SortColumn::Dst => ip_key(&a.dst).cmp(&ip_key(&b.dst)),
        SortColumn::Flags => flag_key(a.flags.as_deref()).cmp(&flag_key(b.flags.as_deref())),
        SortColumn::Protocol => a.protocol.to_lowercase().cmp(&b.protocol.to_lowercase()),
        SortColumn::State => a.state.to_lowercase().cmp(&b.state.to_lowercase()),
    }
}

/// Port/mark/use compare numerically; anything unparsable sorts as 0.
fn numeric_key(value: Option<&str>) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Dotted-quad packed into a u32 so "10.0.0.10" outranks "10.0.0.2";
/// anything else (including "-") sorts as 0.
fn ip_key(addr: &str) -> u32 {
    let mut octets = addr.split('.');
    let parsed: Option<[u32; 4]> = (|| {
        let a = octets.next()?.parse().ok()?;
        let b = octets.next()?.parse().ok()?;
        let c = octets.next()?.parse().ok()?;
        let d = octets.next()?.parse().ok()?;
        if octets.next().is_some() {
            return None;
        }
        Some([a, b, c, d])
    })();
    match parsed {
        Some([a, b, c, d]) => (a << 24) | (b << 16) | (c << 8) | d,
        None => 0,
    }
}

/// "-" and missing flags normalize to empty, comparison is
/// case-insensitive.
fn flag_key(flags: Option<&str>) -> String {
    match flags {
        Some("-") | None => String::new(),
        Some(f) => f.to_lowercase(),
    }
}

/// Truncate to the display limit. Returns the visible rows and how many
/// filtered rows got hidden.
pub fn limited<'a, 'b>(
    rows: &'b [&'a Connection],
    limit: Option<usize>,
) -> (&'b [&'a Connection], usize) {
    match limit {
        Some(n) if rows.len() > n => (&rows[..n], rows.len() - n),
        _ => (rows, 0),
    }
}

/// Distinct values of one field, for the filter-cycling UI.
pub fn distinct_values<F>(connections: &[Connection], field: F) -> Vec<String>
where
    F: Fn(&Connection) -> &str,
{
    let mut values: Vec<String> = connections.iter().map(|c| field(c).to_string()).collect();
    values.sort();
    values.dedup();
    values
}

/// Advance `current` through `options`: None -> first -> ... -> last -> None.
pub fn cycle_filter(current: &Option<String>, options: &[String]) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    match current {
        None => Some(options[0].clone()),
        Some(value) => match options.iter().position(|o| o == value) {
            Some(idx) if idx + 1 < options.len() => Some(options[idx + 1].clone()),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(protocol: &str, state: &str, src: &str, dst: &str, dport: &str) -> Connection {
        Connection {
            protocol: protocol.into(),
            state: state.into(),
            src: src.into(),
            dst: dst.into(),
            sport: Some("40000".into()),
            dport: Some(dport.into()),
            ..Connection::default()
        }
    }

    fn fixture() -> Vec<Connection> {
        vec![
            conn("tcp", "ESTABLISHED", "10.0.0.2", "1.1.1.1", "80"),
            conn("udp", "NONE", "10.0.0.10", "8.8.8.8", "53"),
            conn("tcp", "TIME_WAIT", "192.168.1.5", "1.0.0.1", "8"),
            conn("icmp", "NONE", "10.0.0.1", "10.0.0.2", "443"),
        ]
    }

    #[test]
    fn empty_view_passes_everything() {
        let conns = fixture();
        assert_eq!(apply(&conns, &ViewState::default()).len(), conns.len());
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let conns = fixture();
        let view = ViewState { search: "ESTAB".into(), ..ViewState::default() };
        let rows = apply(&conns, &view);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state, "ESTABLISHED");

        let view = ViewState { search: "8.8.".into(), ..ViewState::default() };
        assert_eq!(apply(&conns, &view).len(), 1);
    }

    #[test]
    fn search_matches_ports() {
        let conns = fixture();
        let view = ViewState { search: "443".into(), ..ViewState::default() };
        let rows = apply(&conns, &view);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].protocol, "icmp");
    }

    #[test]
    fn protocol_and_state_filters_are_exact() {
        let conns = fixture();
        let view = ViewState {
            protocol_filter: Some("tcp".into()),
            ..ViewState::default()
        };
        assert_eq!(apply(&conns, &view).len(), 2);

        let view = ViewState {
            protocol_filter: Some("tcp".into()),
            state_filter: Some("TIME_WAIT".into()),
            ..ViewState::default()
        };
        let rows = apply(&conns, &view);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].src, "192.168.1.5");
    }

    #[test]
    fn filtering_is_idempotent() {
        let conns = fixture();
        let view = ViewState { search: "10.0".into(), ..ViewState::default() };
        let once: Vec<Connection> = apply(&conns, &view).into_iter().cloned().collect();
        let twice: Vec<&Connection> = apply(&once, &view);
        assert_eq!(once.len(), twice.len());
        assert!(once.iter().zip(twice).all(|(a, b)| a == b));
    }

    #[test]
    fn ports_sort_numerically_not_lexicographically() {
        let conns = vec![
            conn("tcp", "NONE", "1.1.1.1", "2.2.2.2", "80"),
            conn("tcp", "NONE", "1.1.1.1", "2.2.2.2", "8"),
        ];
        let mut rows: Vec<&Connection> = conns.iter().collect();
        sort(&mut rows, SortColumn::Dport, SortDirection::Ascending);
        assert_eq!(rows[0].dport.as_deref(), Some("8"));
        assert_eq!(rows[1].dport.as_deref(), Some("80"));
    }

    #[test]
    fn addresses_sort_as_packed_integers() {
        let conns = vec![
            conn("tcp", "NONE", "10.0.0.10", "2.2.2.2", "1"),
            conn("tcp", "NONE", "10.0.0.2", "2.2.2.2", "1"),
        ];
        let mut rows: Vec<&Connection> = conns.iter().collect();
        sort(&mut rows, SortColumn::Src, SortDirection::Ascending);
        assert_eq!(rows[0].src, "10.0.0.2");
        assert_eq!(rows[1].src, "10.0.0.10");
    }

    #[test]
    fn dash_address_sorts_first() {
        let conns = vec![
            conn("tcp", "NONE", "10.0.0.2", "2.2.2.2", "1"),
            conn("tcp", "NONE", "-", "2.2.2.2", "1"),
        ];
        let mut rows: Vec<&Connection> = conns.iter().collect();
        sort(&mut rows, SortColumn::Src, SortDirection::Ascending);
        assert_eq!(rows[0].src, "-");
    }

    #[test]
    fn flags_normalize_dash_to_empty() {
        let mut a = conn("tcp", "NONE", "1.1.1.1", "2.2.2.2", "1");
        a.flags = Some("-".into());
        let mut b = conn("tcp", "NONE", "1.1.1.1", "2.2.2.2", "1");
        b.flags = Some("ASSURED".into());
        let conns = vec![b, a];
        let mut rows: Vec<&Connection> = conns.iter().collect();
        sort(&mut rows, SortColumn::Flags, SortDirection::Ascending);
        assert_eq!(rows[0].flags.as_deref(), Some("-"));
    }

    #[test]
    fn descending_inverts_relative_order_of_distinct_keys() {
        let conns = fixture();
        let mut asc: Vec<&Connection> = conns.iter().collect();
        sort(&mut asc, SortColumn::Dport, SortDirection::Ascending);
        let mut desc: Vec<&Connection> = conns.iter().collect();
        sort(&mut desc, SortColumn::Dport, SortDirection::Descending);
        let flipped: Vec<&&Connection> = desc.iter().rev().collect();
        assert!(asc.iter().zip(flipped).all(|(a, b)| std::ptr::eq(*a, *b)));
    }

    #[test]
    fn toggle_sort_cycles_direction_and_resets_on_new_column() {
        let mut view = ViewState::default();
        view.toggle_sort(SortColumn::Dport);
        assert_eq!(view.sort, Some((SortColumn::Dport, SortDirection::Ascending)));
        view.toggle_sort(SortColumn::Dport);
        assert_eq!(view.sort, Some((SortColumn::Dport, SortDirection::Descending)));
        view.toggle_sort(SortColumn::Src);
        assert_eq!(view.sort, Some((SortColumn::Src, SortDirection::Ascending)));
    }

    #[test]
    fn limit_caps_rows_and_reports_hidden() {
        let conns = fixture();
        let rows: Vec<&Connection> = conns.iter().collect();
        let (shown, hidden) = limited(&rows, Some(2));
        assert_eq!(shown.len(), 2);
        assert_eq!(hidden, 2);

        let (shown, hidden) = limited(&rows, Some(100));
        assert_eq!(shown.len(), 4);
        assert_eq!(hidden, 0);

        let (shown, hidden) = limited(&rows, None);
        assert_eq!(shown.len(), 4);
        assert_eq!(hidden, 0);
    }

    #[test]
    fn limit_cycles_through_presets() {
        let mut view = ViewState::default();
        assert_eq!(view.limit, Some(100));
        view.cycle_limit();
        assert_eq!(view.limit, Some(250));
        view.cycle_limit();
        assert_eq!(view.limit, None);
        view.cycle_limit();
        assert_eq!(view.limit, Some(25));
    }

    #[test]
    fn distinct_values_sorted_deduped() {
        let conns = fixture();
        let protocols = distinct_values(&conns, |c| &c.protocol);
        assert_eq!(protocols, vec!["icmp", "tcp", "udp"]);
    }

    #[test]
    fn cycle_filter_walks_options_then_clears() {
        let options = vec!["tcp".to_string(), "udp".to_string()];
        let mut current = None;
        current = cycle_filter(&current, &options);
        assert_eq!(current.as_deref(), Some("tcp"));
        current = cycle_filter(&current, &options);
        assert_eq!(current.as_deref(), Some("udp"));
        current = cycle_filter(&current, &options);
        assert_eq!(current, None);
        assert_eq!(cycle_filter(&None, &[]), None);
    }
}
