//! Parsing of `status` and `connect` output.

use crate::ansi;

/// Printed by `status` when no tunnel is up.
pub const DISCONNECTED_MARKER: &str = "VPN is disconnected";
/// Prefix of the line naming the active location.
pub const CONNECTED_MARKER: &str = "Connected to";
/// Printed by `connect` once the tunnel is established.
pub const CONNECT_SUCCESS_MARKER: &str = "Successfully Connected to";

// Introduces the tunnel mode detail after the location name.
const MODE_SEPARATOR: &str = " in ";

/// What a piece of status text says about the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReading {
    Disconnected,
    Connected(String),
    /// Neither marker was found. Callers keep whatever they knew before.
    Unrecognized,
}

/// Reads connection state out of `status` output.
///
/// An explicit disconnect marker wins over everything else. Otherwise the
/// first line containing "Connected to" names the location; later matches
/// are ignored.
pub fn parse_status(text: &str) -> StatusReading {
    if text.contains(DISCONNECTED_MARKER) {
        return StatusReading::Disconnected;
    }

    let Some(line) = text.lines().find(|line| line.contains(CONNECTED_MARKER)) else {
        return StatusReading::Unrecognized;
    };

    match location_from_line(line) {
        Some(location) => StatusReading::Connected(location),
        None => StatusReading::Unrecognized,
    }
}

/// True when `connect` output reports an established tunnel.
pub fn confirms_connect(output: &str) -> bool {
    output.contains(CONNECT_SUCCESS_MARKER)
}

fn location_from_line(line: &str) -> Option<String> {
    let start = line.find(CONNECTED_MARKER)? + CONNECTED_MARKER.len();
    let rest = ansi::strip(&line[start..]);

    let name = match rest.find(MODE_SEPARATOR) {
        Some(end) => &rest[..end],
        None => rest.as_str(),
    };
    let name = name.trim();

    (!name.is_empty()).then(|| name.to_string())
}
