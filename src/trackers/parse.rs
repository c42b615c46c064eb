// src/trackers/parse.rs

//! Parsing and validation of plain-text tracker lists.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use url::Url;

/// Transport scheme of an announce endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Wss,
    Https,
    Ws,
    Http,
}

impl Scheme {
    /// Security order used when deduplicating across buckets.
    pub const ALL: [Scheme; 4] = [Scheme::Wss, Scheme::Https, Scheme::Ws, Scheme::Http];

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "wss" => Some(Scheme::Wss),
            "https" => Some(Scheme::Https),
            "ws" => Some(Scheme::Ws),
            "http" => Some(Scheme::Http),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Wss => "wss",
            Scheme::Https => "https",
            Scheme::Ws => "ws",
            Scheme::Http => "http",
        }
    }

    pub fn tier(self) -> Tier {
        match self {
            Scheme::Wss | Scheme::Https => Tier::Safe,
            Scheme::Ws | Scheme::Http => Tier::Unsafe,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Safe tiers use encrypted transports (https/wss), unsafe ones do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Safe,
    Unsafe,
}

/// One validated announce endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackerRecord {
    url: String,
    scheme: Scheme,
}

impl TrackerRecord {
    /// Validate `line` as an announce URL. The original text is kept as the
    /// record's identity so it can be compared against locator fields.
    pub fn parse(line: &str) -> Option<Self> {
        let parsed = Url::parse(line).ok()?;
        let scheme = Scheme::from_str_opt(parsed.scheme())?;
        parsed.host_str()?;
        Some(Self {
            url: line.to_string(),
            scheme,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn tier(&self) -> Tier {
        self.scheme.tier()
    }
}

/// Split a raw list into candidate lines: trimmed, no blanks, no `#` comments,
/// only lines with a scheme separator, first occurrence wins.
pub fn parse_tracker_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && line.contains("://"))
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}

/// Parse `text` and keep only valid endpoints whose scheme is in `accepted`.
pub fn parse_records(text: &str, accepted: &[Scheme]) -> Vec<TrackerRecord> {
    parse_tracker_list(text)
        .iter()
        .filter_map(|line| TrackerRecord::parse(line))
        .filter(|record| accepted.contains(&record.scheme()))
        .collect()
}
