//! Maps heterogeneous RouterOS link-rate strings to a canonical form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical negotiated link speed.
///
/// `Other` preserves the trimmed, lower-cased input verbatim so that two
/// switches reporting the same non-standard string still compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Speed {
    TenMbps,
    HundredMbps,
    OneGbps,
    TwoPointFiveGbps,
    FiveGbps,
    TenGbps,
    Other(String),
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speed::TenMbps => write!(f, "10Mbps"),
            Speed::HundredMbps => write!(f, "100Mbps"),
            Speed::OneGbps => write!(f, "1Gbps"),
            Speed::TwoPointFiveGbps => write!(f, "2.5Gbps"),
            Speed::FiveGbps => write!(f, "5Gbps"),
            Speed::TenGbps => write!(f, "10Gbps"),
            Speed::Other(s) => write!(f, "{s}"),
        }
    }
}

impl From<Speed> for String {
    fn from(speed: Speed) -> String {
        speed.to_string()
    }
}

impl TryFrom<String> for Speed {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(normalize(&s).unwrap_or(Speed::Other(s.trim().to_lowercase())))
    }
}

/// Classifies a free-form speed string into a [`Speed`].
///
/// Case-insensitive, whitespace-trimmed, ordered substring tests — order is
/// load-bearing: `"2.5g"` must be checked before `"5g"` since it contains
/// it, and `"10g"`/`"10m"` before the looser `1g`/`100m` tests.
pub fn normalize(raw: &str) -> Option<Speed> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();

    if lower.contains("10g") {
        Some(Speed::TenGbps)
    } else if lower.contains("2.5g") {
        Some(Speed::TwoPointFiveGbps)
    } else if lower.contains("5g") {
        Some(Speed::FiveGbps)
    } else if lower.contains("1g") || lower.contains("gbps") || lower.contains("gbit") {
        Some(Speed::OneGbps)
    } else if lower.contains("100m") || lower.contains("100-") {
        Some(Speed::HundredMbps)
    } else if lower.contains("10m") || lower.contains("10-") {
        Some(Speed::TenMbps)
    } else {
        Some(Speed::Other(lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_gbps_variations() {
        assert_eq!(normalize("1Gbps"), Some(Speed::OneGbps));
        assert_eq!(normalize("1gbps"), Some(Speed::OneGbps));
        assert_eq!(normalize("1Gbit"), Some(Speed::OneGbps));
        assert_eq!(normalize("1G"), Some(Speed::OneGbps));
    }

    #[test]
    fn hundred_mbps_variations() {
        assert_eq!(normalize("100Mbps"), Some(Speed::HundredMbps));
        assert_eq!(normalize("100mbps"), Some(Speed::HundredMbps));
        assert_eq!(normalize("100M"), Some(Speed::HundredMbps));
        assert_eq!(normalize("100-full"), Some(Speed::HundredMbps));
    }

    #[test]
    fn ten_mbps_variations() {
        assert_eq!(normalize("10Mbps"), Some(Speed::TenMbps));
        assert_eq!(normalize("10M"), Some(Speed::TenMbps));
        assert_eq!(normalize("10-full"), Some(Speed::TenMbps));
    }

    #[test]
    fn ten_gbps() {
        assert_eq!(normalize("10Gbps"), Some(Speed::TenGbps));
        assert_eq!(normalize("10G"), Some(Speed::TenGbps));
    }

    #[test]
    fn two_point_five_and_five_never_alias() {
        // "2.5g" contains "5g" so the 2.5G test must win.
        assert_eq!(normalize("2.5Gbps"), Some(Speed::TwoPointFiveGbps));
        assert_eq!(normalize("5Gbps"), Some(Speed::FiveGbps));
        assert_ne!(normalize("2.5Gbps"), normalize("5Gbps"));
    }

    #[test]
    fn none_and_empty() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
    }

    #[test]
    fn unknown_passes_through_lowered_and_trimmed() {
        assert_eq!(normalize(" Unknown "), Some(Speed::Other("unknown".to_string())));
    }

    #[test]
    fn idempotent_for_every_case() {
        for raw in ["1Gbps", "2.5Gbps", "5Gbps", "10Gbps", "100Mbps", "10Mbps", "weird-speed"] {
            let once = normalize(raw).unwrap();
            let twice = normalize(&once.to_string()).unwrap();
            assert_eq!(once, twice);
        }
    }
}
