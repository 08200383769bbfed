//! VPN exit locations: parsing `list-locations` output plus the filtering and
//! sorting the location picker needs.
//!
//! The tool prints a fixed-width table whose country and city names contain
//! spaces, so rows are sliced at the column offsets of the header tokens
//! instead of being split on whitespace.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use log::{debug, warn};

use crate::ansi;

/// Ping assigned to rows whose latency column cannot be read. Sorts last.
pub const UNKNOWN_PING: u32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub iso: String,
    pub country: String,
    pub city: String,
    pub ping: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ping == UNKNOWN_PING {
            write!(f, "{}, {} ({})", self.city, self.country, self.iso)
        } else {
            write!(
                f,
                "{}, {} ({}) {} ms",
                self.city, self.country, self.iso, self.ping
            )
        }
    }
}

/// Character offsets where the COUNTRY, CITY and PING columns begin.
#[derive(Debug, Clone, Copy)]
struct Columns {
    country: usize,
    city: usize,
    ping: usize,
}

impl Columns {
    fn from_header(line: &str) -> Option<Self> {
        if !(line.contains("ISO") && line.contains("COUNTRY")) {
            return None;
        }
        let columns = Self {
            country: char_offset(line, "COUNTRY")?,
            city: char_offset(line, "CITY")?,
            ping: char_offset(line, "PING")?,
        };
        (0 < columns.country && columns.country < columns.city && columns.city < columns.ping)
            .then_some(columns)
    }
}

fn char_offset(line: &str, token: &str) -> Option<usize> {
    line.find(token).map(|byte| line[..byte].chars().count())
}

/// Returns the characters of `line` in `[start, end)`, clamped to its length.
fn column(line: &str, start: usize, end: Option<usize>) -> &str {
    let byte_at = |chars: usize| {
        line.char_indices()
            .nth(chars)
            .map_or(line.len(), |(byte, _)| byte)
    };
    let from = byte_at(start);
    let to = end.map_or(line.len(), byte_at);
    if from >= to { "" } else { &line[from..to] }
}

/// Reads leading digits, the way the tool prints latency ("37", "37 ms").
fn parse_ping(field: &str) -> u32 {
    let digits: String = field.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(UNKNOWN_PING)
}

/// Parses `list-locations` output into locations sorted by ascending ping.
///
/// Returns an empty list when the header row is missing. Rows lacking an ISO
/// code, country or city are skipped; rows with an unreadable ping are kept
/// with [`UNKNOWN_PING`].
pub fn parse_locations(output: &str) -> Vec<Location> {
    let lines: Vec<String> = output.lines().map(ansi::strip).collect();

    let Some((header_idx, columns)) = lines
        .iter()
        .enumerate()
        .find_map(|(idx, line)| Columns::from_header(line).map(|cols| (idx, cols)))
    else {
        warn!("could not determine column positions from location list header");
        return Vec::new();
    };

    let mut locations = Vec::new();
    for line in &lines[header_idx + 1..] {
        // Repeated headers and the trailing "... city, country or ISO code" hint.
        if line.trim().is_empty() || line.contains("ISO") {
            continue;
        }

        let iso = column(line, 0, Some(columns.country)).trim();
        let country = column(line, columns.country, Some(columns.city)).trim();
        let city = column(line, columns.city, Some(columns.ping)).trim();
        let ping = column(line, columns.ping, None).trim();

        if iso.is_empty() || country.is_empty() || city.is_empty() {
            debug!("skipping malformed location row: {line:?}");
            continue;
        }

        locations.push(Location {
            iso: iso.to_string(),
            country: country.to_string(),
            city: city.to_string(),
            ping: parse_ping(ping),
        });
    }

    locations.sort_by_key(|loc| loc.ping);
    debug!("parsed {} locations", locations.len());
    locations
}

/// Keeps locations whose city or country contains `query`, ignoring case.
/// An empty query hands back the input itself.
pub fn filter_locations<'a>(locations: &'a [Location], query: &str) -> Cow<'a, [Location]> {
    if query.is_empty() {
        return Cow::Borrowed(locations);
    }

    let query = query.to_lowercase();
    Cow::Owned(
        locations
            .iter()
            .filter(|loc| {
                loc.city.to_lowercase().contains(&query)
                    || loc.country.to_lowercase().contains(&query)
            })
            .cloned()
            .collect(),
    )
}

/// The location with the lowest ping; the first one on ties.
pub fn find_fastest_location(locations: &[Location]) -> Option<&Location> {
    locations.iter().min_by_key(|loc| loc.ping)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    Iso,
    Country,
    City,
    Ping,
}

impl SortColumn {
    pub const ALL: [SortColumn; 4] = [
        SortColumn::Iso,
        SortColumn::Country,
        SortColumn::City,
        SortColumn::Ping,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SortColumn::Iso => "ISO",
            SortColumn::Country => "Country",
            SortColumn::City => "City",
            SortColumn::Ping => "Ping",
        }
    }

    fn compare(self, a: &Location, b: &Location) -> Ordering {
        match self {
            SortColumn::Iso => cmp_ignore_case(&a.iso, &b.iso),
            SortColumn::Country => cmp_ignore_case(&a.country, &b.country),
            SortColumn::City => cmp_ignore_case(&a.city, &b.city),
            SortColumn::Ping => a.ping.cmp(&b.ping),
        }
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Stable in-place sort. Equal rows keep their relative order in both
/// directions, so re-sorting with the same arguments changes nothing.
pub fn sort_locations(locations: &mut [Location], column: SortColumn, ascending: bool) {
    locations.sort_by(|a, b| {
        let ord = column.compare(a, b);
        if ascending { ord } else { ord.reverse() }
    });
}

/// Column-header sort state of a location picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub column: SortColumn,
    pub ascending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            column: SortColumn::Ping,
            ascending: true,
        }
    }
}

impl SortOrder {
    /// Clicking the active column flips direction; another column starts ascending.
    pub fn select(&mut self, column: SortColumn) {
        if self.column == column {
            self.ascending = !self.ascending;
        } else {
            self.column = column;
            self.ascending = true;
        }
    }

    pub fn apply(&self, locations: &mut [Location]) {
        sort_locations(locations, self.column, self.ascending);
    }

    /// Header label with a direction arrow on the active column.
    pub fn header(&self, column: SortColumn) -> String {
        if column != self.column {
            return column.title().to_string();
        }
        let arrow = if self.ascending { "▲" } else { "▼" };
        format!("{} {arrow}", column.title())
    }
}
