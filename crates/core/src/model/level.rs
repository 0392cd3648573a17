use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown proficiency level: {0}")]
pub struct LevelParseError(pub String);

/// Proficiency tier chosen when the session is created, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Beginner,
    Elementary,
    Intermediate,
    UpperIntermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Beginner,
        Level::Elementary,
        Level::Intermediate,
        Level::UpperIntermediate,
        Level::Advanced,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Elementary => "elementary",
            Level::Intermediate => "intermediate",
            Level::UpperIntermediate => "upper_intermediate",
            Level::Advanced => "advanced",
        }
    }

    /// Speech rate for listening narration; slower for lower tiers.
    #[must_use]
    pub fn playback_rate(self) -> f32 {
        match self {
            Level::Beginner => 0.70,
            Level::Elementary => 0.75,
            Level::Intermediate => 0.80,
            Level::UpperIntermediate => 0.85,
            Level::Advanced => 0.90,
        }
    }

    /// Level named by `raw`, or intermediate for tiers this client does not
    /// know.
    #[must_use]
    pub fn parse_or_intermediate(raw: &str) -> Level {
        raw.parse().unwrap_or(Level::Intermediate)
    }

    /// Band range the generated content targets.
    #[must_use]
    pub fn target_band(self) -> &'static str {
        match self {
            Level::Beginner => "3.0-4.0",
            Level::Elementary => "4.0-4.5",
            Level::Intermediate => "5.0-5.5",
            Level::UpperIntermediate => "6.0-6.5",
            Level::Advanced => "7.0-8.0",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| LevelParseError(s.to_owned()))
    }
}

/// Serde adapter for levels reported by the service. Unknown tiers decode to
/// intermediate instead of rejecting the whole record.
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(Level::parse_or_intermediate(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_increase_with_level() {
        let rates: Vec<f32> = Level::ALL.iter().map(|l| l.playback_rate()).collect();
        assert_eq!(rates, vec![0.70, 0.75, 0.80, 0.85, 0.90]);
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn unknown_level_uses_intermediate_rate() {
        assert_eq!(Level::parse_or_intermediate("expert").playback_rate(), 0.80);
        assert_eq!(Level::parse_or_intermediate("advanced").playback_rate(), 0.90);
    }

    #[test]
    fn parses_loose_spellings() {
        assert_eq!(
            "Upper-Intermediate".parse::<Level>().unwrap(),
            Level::UpperIntermediate
        );
        assert!("native".parse::<Level>().is_err());
    }
}
