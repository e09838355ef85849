//! Enumerations and field types shared by the planning engine.
//!
//! This module defines the container a task lives in (a sprint or the Backlog
//! sentinel), the traffic-light status tag, the two supported workbook
//! conventions, and small parse/format helpers used by import and the CLI.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Reserved identity of the Backlog pseudo-sprint.
pub const BACKLOG: &str = "Backlog";

/// Where a task lives on the board.
///
/// Persisted as a plain string: the literal `Backlog` or a sprint id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Container {
    Backlog,
    Sprint(String),
}

impl Container {
    /// Parse a persisted container token. Empty tokens mean "unassigned".
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            None
        } else if is_backlog_token(token) {
            Some(Container::Backlog)
        } else {
            Some(Container::Sprint(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Container::Backlog => BACKLOG,
            Container::Sprint(id) => id,
        }
    }

    pub fn sprint_id(&self) -> Option<&str> {
        match self {
            Container::Backlog => None,
            Container::Sprint(id) => Some(id),
        }
    }

    pub fn is_backlog(&self) -> bool {
        matches!(self, Container::Backlog)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Container {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Container {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Container::from_token(&raw)
            .ok_or_else(|| serde::de::Error::custom("empty container identity"))
    }
}

/// Read an optional container, treating `null` and `""` alike as unassigned.
pub fn optional_container<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Container>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.as_deref().and_then(Container::from_token))
}

/// Case-insensitive match against the Backlog sentinel.
pub fn is_backlog_token(token: &str) -> bool {
    token.trim().eq_ignore_ascii_case(BACKLOG)
}

/// Tri-state delivery confidence tag on a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLight {
    #[serde(alias = "Red")]
    Red,
    #[serde(alias = "Amber")]
    Amber,
    #[serde(alias = "Green")]
    Green,
}

impl TrafficLight {
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficLight::Red => "red",
            TrafficLight::Amber => "amber",
            TrafficLight::Green => "green",
        }
    }
}

/// Parse a traffic-light string from a workbook cell. Anything unknown is unset.
pub fn parse_traffic_light(s: &str) -> Option<TrafficLight> {
    match s.trim().to_lowercase().as_str() {
        "red" => Some(TrafficLight::Red),
        "amber" | "yellow" => Some(TrafficLight::Amber),
        "green" => Some(TrafficLight::Green),
        _ => None,
    }
}

/// Format an optional traffic light for display.
pub fn format_traffic_light(s: Option<TrafficLight>) -> &'static str {
    s.map(TrafficLight::as_str).unwrap_or("-")
}

/// The two external tabular layouts.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Convention {
    /// One issue per row, epics and tasks mixed, JIRA-style columns.
    Flat,
    /// One sheet per entity type with explicit identity columns.
    Structured,
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convention::Flat => f.write_str("flat"),
            Convention::Structured => f.write_str("structured"),
        }
    }
}

/// Normalize a sheet name for matching: trimmed and lowercased.
pub fn normalise_sheet_name(s: &str) -> String {
    s.trim().to_lowercase()
}

/// True when two catalog names collide (case-insensitive, trimmed).
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Validate a `#RRGGBB` colour tag, returning it uppercased.
pub fn normalise_color(s: &str) -> Option<String> {
    let s = s.trim();
    let hex = s.strip_prefix('#')?;
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("#{}", hex.to_uppercase()))
    } else {
        None
    }
}

/// Format story points without a trailing `.0` for whole numbers.
pub fn format_points(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{}", p as i64)
    } else {
        format!("{p}")
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_tokens() {
        assert_eq!(Container::from_token("backlog"), Some(Container::Backlog));
        assert_eq!(Container::from_token(" BACKLOG "), Some(Container::Backlog));
        assert_eq!(Container::from_token("S1"), Some(Container::Sprint("S1".into())));
        assert_eq!(Container::from_token("   "), None);
    }

    #[test]
    fn test_container_serde() {
        let json = serde_json::to_string(&Container::Backlog).unwrap();
        assert_eq!(json, "\"Backlog\"");
        let c: Container = serde_json::from_str("\"S9\"").unwrap();
        assert_eq!(c, Container::Sprint("S9".into()));
    }

    #[test]
    fn test_parse_traffic_light() {
        assert_eq!(parse_traffic_light("Red"), Some(TrafficLight::Red));
        assert_eq!(parse_traffic_light(" amber"), Some(TrafficLight::Amber));
        assert_eq!(parse_traffic_light("blue"), None);
        assert_eq!(parse_traffic_light(""), None);
    }

    #[test]
    fn test_normalise_color() {
        assert_eq!(normalise_color("#aec6cf"), Some("#AEC6CF".into()));
        assert_eq!(normalise_color("aec6cf"), None);
        assert_eq!(normalise_color("#zzz000"), None);
    }

    #[test]
    fn test_format_points() {
        assert_eq!(format_points(5.0), "5");
        assert_eq!(format_points(2.5), "2.5");
    }
}
