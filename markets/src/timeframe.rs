use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of candle timeframes, spec.md §6.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    H6,
    D1,
}

impl Timeframe {
    /// Period in whole seconds.
    pub const fn period_secs(&self) -> u64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::H6 => 21_600,
            Timeframe::D1 => 86_400,
        }
    }

    /// Period in milliseconds, the unit every timestamp in this system uses.
    pub const fn period_ms(&self) -> i64 {
        self.period_secs() as i64 * 1_000
    }

    pub const ALL: [Timeframe; 8] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::D1,
    ];
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::D1 => "1d",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, thiserror::Error, Clone, Eq, PartialEq)]
#[error("unrecognised timeframe: {0}")]
pub struct ParseTimeframeError(pub String);

impl std::str::FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "1m" => Timeframe::M1,
            "5m" => Timeframe::M5,
            "15m" => Timeframe::M15,
            "30m" => Timeframe::M30,
            "1h" => Timeframe::H1,
            "4h" => Timeframe::H4,
            "6h" => Timeframe::H6,
            "1d" => Timeframe::D1,
            other => return Err(ParseTimeframeError(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods_match_spec_table() {
        assert_eq!(Timeframe::M1.period_secs(), 60);
        assert_eq!(Timeframe::M5.period_secs(), 300);
        assert_eq!(Timeframe::M15.period_secs(), 900);
        assert_eq!(Timeframe::M30.period_secs(), 1_800);
        assert_eq!(Timeframe::H1.period_secs(), 3_600);
        assert_eq!(Timeframe::H4.period_secs(), 14_400);
        assert_eq!(Timeframe::H6.period_secs(), 21_600);
        assert_eq!(Timeframe::D1.period_secs(), 86_400);
    }

    #[test]
    fn round_trips_through_display_and_parse() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
    }
}
