//! Duration inputs for lease policy requests.
//!
//! Lease fields accept either an integer number of seconds or a duration
//! string in Go `time.ParseDuration` form extended with days: a sequence of
//! decimal numbers, each with an optional fraction and a unit suffix out of
//! `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h` and `d`. Examples are `"90s"`,
//! `"1.5h"`, `"1h30m"` and `"2d"`. A bare numeric string is seconds.
//!
//! Results are truncated to whole seconds, so `"300ms"` is zero and
//! `"1500ms"` is one second. Negative durations are rejected.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// A duration as it arrives in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Seconds(u64),
    Text(String),
}

impl DurationInput {
    /// Resolve to a [`Duration`]; `field` names the request field in errors.
    pub fn resolve(&self, field: &'static str) -> Result<Duration> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            Self::Text(text) => parse_duration(text)
                .ok_or_else(|| VaultError::malformed(field, format!("invalid duration {text:?}"))),
        }
    }
}

impl From<u64> for DurationInput {
    fn from(secs: u64) -> Self {
        Self::Seconds(secs)
    }
}

impl From<&str> for DurationInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Fraction digits beyond this precision are ignored.
const MAX_FRACTION_DIGITS: usize = 18;

fn component() -> &'static Regex {
    static COMPONENT: OnceLock<Regex> = OnceLock::new();
    COMPONENT.get_or_init(|| {
        Regex::new(r"(\d+)(?:\.(\d*))?(ns|us|µs|μs|ms|s|m|h|d)|\.(\d+)(ns|us|µs|μs|ms|s|m|h|d)")
            .expect("duration pattern is valid")
    })
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SEC,
        "m" => 60 * NANOS_PER_SEC,
        "h" => 3_600 * NANOS_PER_SEC,
        "d" => 86_400 * NANOS_PER_SEC,
        _ => return None,
    })
}

/// Nanoseconds for one `<whole>.<fraction><unit>` component.
fn component_nanos(whole: &str, fraction: &str, unit: &str) -> Option<u128> {
    let unit = unit_nanos(unit)?;
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit)?;

    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    if !fraction.is_empty() {
        let digits: u128 = fraction.parse().ok()?;
        let scale = 10u128.pow(u32::try_from(fraction.len()).ok()?);
        nanos = nanos.checked_add(digits * unit / scale)?;
    }
    Some(nanos)
}

/// Parse `"3600"`, `"90s"`, `"1.5h"`, `"1h30m"`, `"2d"`, truncating to whole
/// seconds. Returns `None` for anything else, including an empty string,
/// negative durations and overflowing values.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total: u128 = 0;
    let mut consumed = 0;
    for caps in component().captures_iter(text) {
        let matched = caps.get(0)?;
        if matched.start() != consumed {
            return None;
        }
        consumed = matched.end();

        let nanos = match (caps.get(1), caps.get(4)) {
            (Some(whole), _) => component_nanos(
                whole.as_str(),
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3)?.as_str(),
            )?,
            (None, Some(fraction)) => {
                component_nanos("", fraction.as_str(), caps.get(5)?.as_str())?
            }
            (None, None) => return None,
        };
        total = total.checked_add(nanos)?;
    }
    if consumed == 0 || consumed != text.len() {
        return None;
    }

    u64::try_from(total / NANOS_PER_SEC).ok().map(Duration::from_secs)
}
